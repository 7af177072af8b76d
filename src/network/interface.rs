use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::error::LinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// One direction of an interface. Exactly one task produces into it and one
/// consumes from it.
#[derive(Debug)]
struct Queue {
    direction: Direction,
    frames: Mutex<VecDeque<Bytes>>,
    capacity: Option<usize>,
    arrival: Arc<Notify>,
    space: Notify,
}

impl Queue {
    fn new(direction: Direction, capacity: Option<usize>, arrival: Arc<Notify>) -> Self {
        Self {
            direction,
            frames: Mutex::new(VecDeque::new()),
            capacity,
            arrival,
            space: Notify::new(),
        }
    }

    fn frames(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_push(&self, frame: Bytes) -> Result<(), Bytes> {
        {
            let mut frames = self.frames();
            if self.capacity.is_some_and(|cap| frames.len() >= cap) {
                return Err(frame);
            }
            frames.push_back(frame);
        }
        self.arrival.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<Bytes> {
        let frame = self.frames().pop_front();
        if frame.is_some() {
            self.space.notify_one();
        }
        frame
    }
}

/// An endpoint of a point-to-point link: an inbound and an outbound FIFO of
/// encoded frames, optionally bounded.
#[derive(Debug)]
pub struct Interface {
    inbound: Queue,
    outbound: Queue,
}

impl Interface {
    /// `capacity` of `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self::with_doorbell(capacity, Arc::new(Notify::new()))
    }

    /// Every inbound arrival rings `doorbell`, so a node draining several
    /// interfaces can sleep on one notification.
    pub fn with_doorbell(capacity: Option<usize>, doorbell: Arc<Notify>) -> Self {
        Self {
            inbound: Queue::new(Direction::Inbound, capacity, doorbell),
            outbound: Queue::new(Direction::Outbound, capacity, Arc::new(Notify::new())),
        }
    }

    fn queue(&self, direction: Direction) -> &Queue {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inbound.capacity
    }

    /// Enqueues without waiting. A full bounded queue rejects the frame and
    /// is left untouched.
    pub fn try_put(&self, direction: Direction, frame: Bytes) -> Result<(), LinkError> {
        let queue = self.queue(direction);
        queue.try_push(frame).map_err(|_| LinkError::QueueFull {
            direction: queue.direction,
            capacity: queue.capacity.unwrap_or_default(),
        })
    }

    /// Enqueues, waiting for space if the queue is full.
    pub async fn put(&self, direction: Direction, frame: Bytes) {
        let queue = self.queue(direction);
        let mut frame = frame;
        loop {
            match queue.try_push(frame) {
                Ok(()) => return,
                Err(rejected) => {
                    frame = rejected;
                    queue.space.notified().await;
                }
            }
        }
    }

    /// Non-blocking poll.
    pub fn get(&self, direction: Direction) -> Option<Bytes> {
        self.queue(direction).pop()
    }

    /// Waits for the next frame. Cancel safe: a frame is only taken from the
    /// queue when the future completes.
    pub async fn recv(&self, direction: Direction) -> Bytes {
        let queue = self.queue(direction);
        loop {
            if let Some(frame) = queue.pop() {
                return frame;
            }
            queue.arrival.notified().await;
        }
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.queue(direction).frames().len()
    }

    pub fn is_empty(&self, direction: Direction) -> bool {
        self.len(direction) == 0
    }
}
