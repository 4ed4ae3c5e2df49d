//! Order ingestion
//!
//! ```text
//!  producer ──frame──► TcpIngestListener ──Message──► ChannelSource
//!     ▲                      │                              │
//!     └────status byte───────┘◄──── settle(Disposition) ────┤
//!                                                           ▼
//!                                                     IngestAdapter
//!                                                           │
//!                                                    OrderService::create
//! ```
//!
//! Delivery is at-least-once: a message is only acknowledged once the order
//! is committed (or known to be already committed). Anything else is either
//! left for redelivery ([`Disposition::Retry`]) or dropped as poison
//! ([`Disposition::Reject`]).

mod adapter;
mod source;
mod tcp;

pub use adapter::{IngestAdapter, IngestStats, IngestStatsSnapshot};
pub use source::{ChannelSource, MessageSink, channel};
pub use tcp::{MAX_FRAME_LEN, TcpIngestListener, TcpProducer, read_frame, write_frame};

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::oneshot;

/// Transport-level ingestion failures
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Unknown status byte 0x{0:02x}")]
    InvalidStatus(u8),

    #[error("Peer closed the connection")]
    Disconnected,

    /// The ingestion loop is no longer consuming
    #[error("Ingestion channel closed")]
    Closed,
}

/// Outcome of handling one message, reported back to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (or already processed); commit the offset
    Ack,
    /// Not processed; leave unacknowledged so the transport redelivers
    Retry,
    /// Never processable; not acknowledged and not worth redelivering
    Reject,
}

impl Disposition {
    /// Wire status byte answered to TCP producers
    pub fn status_byte(self) -> u8 {
        match self {
            Disposition::Ack => 0x01,
            Disposition::Retry => 0x02,
            Disposition::Reject => 0x03,
        }
    }

    pub fn from_status_byte(byte: u8) -> Result<Self, IngestError> {
        match byte {
            0x01 => Ok(Disposition::Ack),
            0x02 => Ok(Disposition::Retry),
            0x03 => Ok(Disposition::Reject),
            other => Err(IngestError::InvalidStatus(other)),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Ack => write!(f, "ack"),
            Disposition::Retry => write!(f, "retry"),
            Disposition::Reject => write!(f, "reject"),
        }
    }
}

/// One inbound message awaiting settlement
///
/// Dropping a message without settling it counts as [`Disposition::Retry`]
/// for the transport.
pub struct Message {
    pub payload: Vec<u8>,
    /// Partition key or producer address, for logging
    pub key: Option<String>,
    settle: Option<oneshot::Sender<Disposition>>,
}

impl Message {
    /// Create a message and the receiver the transport awaits its outcome on
    pub fn new(payload: Vec<u8>, key: Option<String>) -> (Self, oneshot::Receiver<Disposition>) {
        let (tx, rx) = oneshot::channel();
        let message = Self {
            payload,
            key,
            settle: Some(tx),
        };
        (message, rx)
    }

    /// Report the outcome to the transport
    pub fn settle(mut self, disposition: Disposition) {
        if let Some(tx) = self.settle.take() {
            // The producer may already be gone; the outcome is moot then
            let _ = tx.send(disposition);
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("key", &self.key)
            .field("len", &self.payload.len())
            .finish()
    }
}

/// Stream of inbound messages
#[async_trait]
pub trait MessageSource: Send {
    /// Next message, or `None` once the source is closed
    async fn recv(&mut self) -> Option<Message>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bytes() {
        for d in [Disposition::Ack, Disposition::Retry, Disposition::Reject] {
            assert_eq!(Disposition::from_status_byte(d.status_byte()).unwrap(), d);
        }
        assert!(matches!(
            Disposition::from_status_byte(0x7f),
            Err(IngestError::InvalidStatus(0x7f))
        ));
    }

    #[tokio::test]
    async fn test_settle_reaches_transport() {
        let (message, outcome) = Message::new(b"{}".to_vec(), None);
        message.settle(Disposition::Reject);
        assert_eq!(outcome.await.unwrap(), Disposition::Reject);
    }

    #[tokio::test]
    async fn test_dropped_message_is_unsettled() {
        let (message, outcome) = Message::new(b"{}".to_vec(), Some("k".into()));
        drop(message);
        assert!(outcome.await.is_err());
    }
}
