use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Builder;

use custom_dv::NodeId;
use custom_dv::config::NetworkConfig;
use custom_dv::network::Network;

/// One `--send SRC:DST:PAYLOAD` request.
#[derive(Debug, Clone)]
struct SendRequest {
    from: NodeId,
    to: NodeId,
    payload: String,
}

impl FromStr for SendRequest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let (Some(from), Some(to), Some(payload)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(anyhow!("expected SRC:DST:PAYLOAD, got {:?}", s));
        };
        Ok(SendRequest {
            from: NodeId(from.parse().with_context(|| format!("bad source {:?}", from))?),
            to: NodeId(to.parse().with_context(|| format!("bad destination {:?}", to))?),
            payload: payload.to_string(),
        })
    }
}

#[derive(Parser)]
#[command(name = "custom_dv", about = "Distance-vector routing over a simulated network")]
struct Cli {
    /// Topology file (JSON)
    #[arg(long)]
    topology: PathBuf,

    /// Time given to the routers to converge before traffic is sent
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,

    /// How long to keep running after traffic is sent
    #[arg(long, default_value_t = 1000)]
    duration_ms: u64,

    /// Host traffic, repeatable
    #[arg(long = "send", value_name = "SRC:DST:PAYLOAD")]
    sends: Vec<SendRequest>,

    /// Print the final routing tables as JSON
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let config = NetworkConfig::load_from_file(&cli.topology)?;
    let network = Network::build(&config).with_context(|| format!("invalid topology {}", cli.topology.display()))?;
    for send in &cli.sends {
        if network.host(send.from).is_none() {
            return Err(anyhow!("--send source {} is not a host", send.from));
        }
    }

    let mut running = network.start();
    info!(
        "{} routers running, settling for {}ms",
        running.routers().count(),
        cli.settle_ms
    );
    tokio::time::sleep(Duration::from_millis(cli.settle_ms)).await;

    for send in &cli.sends {
        if let Some(host) = running.host(send.from) {
            host.send(send.to, send.payload.clone()).await?;
        }
    }
    tokio::time::sleep(Duration::from_millis(cli.duration_ms)).await;

    for send in &cli.sends {
        if let Some(host) = running.host_mut(send.to) {
            while let Some(packet) = host.try_recv() {
                info!(
                    "{} got \"{}\"",
                    host,
                    String::from_utf8_lossy(packet.payload())
                );
            }
        }
    }

    let statuses = running.statuses();
    running.stop().await;

    if cli.dump {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    }
    Ok(())
}
