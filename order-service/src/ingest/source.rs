//! In-process message channel between transports and the ingestion loop

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{IngestError, Message, MessageSource};

/// Bounded channel; `capacity` messages may wait for the ingestion loop
pub fn channel(capacity: usize) -> (MessageSink, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (MessageSink { tx }, ChannelSource { rx })
}

/// Producer half, cloned into every transport connection
#[derive(Debug, Clone)]
pub struct MessageSink {
    tx: mpsc::Sender<Message>,
}

impl MessageSink {
    /// Queue a message, waiting while the channel is full
    pub async fn send(&self, message: Message) -> Result<(), IngestError> {
        self.tx.send(message).await.map_err(|_| IngestError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, driven by [`super::IngestAdapter::run`]
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Message>,
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (sink, mut source) = channel(4);
        for i in 0..3u8 {
            let (message, _outcome) = Message::new(vec![i], None);
            sink.send(message).await.unwrap();
        }

        for i in 0..3u8 {
            assert_eq!(source.recv().await.unwrap().payload, vec![i]);
        }
    }

    #[tokio::test]
    async fn test_source_closes_with_last_sink() {
        let (sink, mut source) = channel(1);
        drop(sink);
        assert!(source.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_source_dropped_fails() {
        let (sink, source) = channel(1);
        drop(source);
        let (message, _outcome) = Message::new(vec![], None);
        assert!(matches!(sink.send(message).await, Err(IngestError::Closed)));
        assert!(sink.is_closed());
    }
}
