use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("not connected to the bus")]
    Disconnected,
    #[error("bus transport failed: {0}")]
    Transport(String),
}

/// A message as delivered by a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

/// Publishing half of the bus.
///
/// Delivery is best effort. Publishing while the transport is disconnected
/// fails with [`BusError::Disconnected`] and the message is not queued.
pub trait BusPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError>;
}

/// Receiving half of the bus. Owned by the thread that blocks on it.
pub trait BusSubscriber: Send {
    /// Receives messages whose topic starts with `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    /// Waits up to `timeout` for the next message. `Ok(None)` on timeout.
    fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<BusMessage>, BusError>;
}
