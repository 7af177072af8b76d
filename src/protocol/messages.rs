use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::FormatError;
use crate::{Cost, NodeId};

/// A router's distance vector, carried in the payload of a control packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Advertisement {
    pub origin: NodeId,
    pub routes: Vec<AdvertisedRoute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdvertisedRoute {
    pub destination: NodeId,
    pub cost: Cost,
}

impl Advertisement {
    pub fn new(origin: NodeId, routes: impl IntoIterator<Item = (NodeId, Cost)>) -> Self {
        Self {
            origin,
            routes: routes
                .into_iter()
                .map(|(destination, cost)| AdvertisedRoute { destination, cost })
                .collect(),
        }
    }

    pub fn encode(&self) -> Result<Bytes, FormatError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| FormatError::Advertisement(e.to_string()))
    }

    /// Parses and validates a whole advertisement. Nothing is returned for a
    /// message with any structural fault, so callers never see half of one.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        let advert: Advertisement =
            serde_json::from_slice(data).map_err(|e| FormatError::Advertisement(e.to_string()))?;

        let mut seen = BTreeSet::new();
        for route in &advert.routes {
            if !seen.insert(route.destination) {
                return Err(FormatError::Advertisement(format!(
                    "destination {} listed twice",
                    route.destination
                )));
            }
        }

        Ok(advert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Packet, PacketCodec};

    #[test]
    fn test_round_trip() {
        let advert = Advertisement::new(NodeId(1), [(NodeId(1), 0), (NodeId(2), 1), (NodeId(3), 7)]);
        let data = advert.encode().unwrap();
        assert_eq!(Advertisement::decode(&data).unwrap(), advert);
    }

    #[test]
    fn test_empty_round_trip() {
        let advert = Advertisement::new(NodeId(9), []);
        assert_eq!(Advertisement::decode(&advert.encode().unwrap()).unwrap(), advert);
    }

    #[test]
    fn test_wire_layout() {
        let advert = Advertisement::new(NodeId(4), [(NodeId(5), 2)]);
        assert_eq!(
            &advert.encode().unwrap()[..],
            br#"{"origin":4,"routes":[{"destination":5,"cost":2}]}"#
        );
    }

    #[test]
    fn test_inside_control_packet_and_trailing_bytes() {
        // Extreme values survive the control frame, and trailing bytes after
        // the JSON object are rejected.
        let codec = PacketCodec::default();
        let advert = Advertisement::new(NodeId(11), [(NodeId(0), 0), (NodeId(22222), u32::MAX)]);

        let frame = codec.encode(&Packet::control(advert.encode().unwrap())).unwrap();
        let Packet::Control { payload } = codec.decode(frame).unwrap() else {
            panic!("expected a control packet");
        };
        assert_eq!(Advertisement::decode(&payload).unwrap(), advert);

        let noisy = br#"{"origin":11,"routes":[{"destination":3,"cost":1}]}--.RA-0-1--"#;
        assert!(Advertisement::decode(noisy).is_err());
    }

    #[test]
    fn test_rejects_structural_faults() {
        let cases: [&[u8]; 7] = [
            b"",
            b"RA--.H1-0-1--",
            br#"{"origin":1}"#,
            br#"{"origin":1,"routes":[{"destination":2}]}"#,
            br#"{"origin":1,"routes":[{"destination":2,"cost":-1}]}"#,
            br#"{"origin":1,"routes":[{"destination":2,"cost":4294967296}]}"#,
            br#"{"origin":1,"routes":[],"extra":true}"#,
        ];
        for case in cases {
            assert!(
                matches!(Advertisement::decode(case), Err(FormatError::Advertisement(_))),
                "accepted {:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_rejects_duplicate_destination() {
        let data = br#"{"origin":1,"routes":[{"destination":2,"cost":1},{"destination":2,"cost":3}]}"#;
        assert!(Advertisement::decode(data).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Distinct destinations in arbitrary order, costs over the whole range.
    fn routes() -> impl Strategy<Value = Vec<(NodeId, Cost)>> {
        proptest::collection::btree_map(any::<u32>(), any::<u32>(), 0..64)
            .prop_map(|m| m.into_iter().map(|(d, c)| (NodeId(d), c)).collect::<Vec<_>>())
            .prop_shuffle()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn advertisement_roundtrip(origin in any::<u32>(), routes in routes()) {
            let advert = Advertisement::new(NodeId(origin), routes);
            let data = advert.encode().unwrap();
            prop_assert_eq!(Advertisement::decode(&data).unwrap(), advert);
        }

        #[test]
        fn repeated_destination_is_rejected(
            origin in any::<u32>(),
            routes in routes().prop_filter("need a route to repeat", |r| !r.is_empty()),
            cost in any::<u32>(),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut routes = routes;
            let (destination, _) = routes[pick.index(routes.len())];
            routes.push((destination, cost));
            let data = Advertisement::new(NodeId(origin), routes).encode().unwrap();
            prop_assert!(Advertisement::decode(&data).is_err());
        }
    }
}
