//! Length-prefixed TCP ingest transport
//!
//! Frame: `[u32 LE payload length][payload]`. Each frame is answered with one
//! status byte (see [`Disposition::status_byte`]) before the next frame is
//! read, so a connection carries at most one unsettled message.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;

use super::{Disposition, IngestError, Message, MessageSink};

/// Largest accepted payload
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closes cleanly between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, IngestError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(IngestError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            IngestError::Disconnected
        } else {
            e.into()
        }
    })?;
    Ok(Some(payload))
}

/// Write one frame
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), IngestError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(IngestError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut data = Vec::with_capacity(4 + payload.len());
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Accepts producer connections and forwards their frames to the ingestion loop
pub struct TcpIngestListener {
    listener: TcpListener,
    sink: MessageSink,
    shutdown: CancellationToken,
}

impl TcpIngestListener {
    pub async fn bind(
        addr: &str,
        sink: MessageSink,
        shutdown: CancellationToken,
    ) -> Result<Self, IngestError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            sink,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, IngestError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop; returns once the shutdown token fires
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("Ingest TCP listener on {addr}");
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Ingest TCP listener shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Producer connected: {}", addr);
                            let sink = self.sink.clone();
                            let shutdown = self.shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, sink, shutdown).await {
                                    tracing::warn!(peer = %addr, error = %e, "Producer connection closed with error");
                                } else {
                                    tracing::debug!("Producer {} disconnected", addr);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Serve one producer connection: frame in, status byte out
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    sink: MessageSink,
    shutdown: CancellationToken,
) -> Result<(), IngestError> {
    let (mut reader, mut writer) = stream.into_split();
    let key = addr.to_string();

    loop {
        let payload = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            frame = read_frame(&mut reader) => match frame? {
                Some(payload) => payload,
                None => return Ok(()),
            },
        };

        let (message, outcome) = Message::new(payload, Some(key.clone()));
        let disposition = match sink.send(message).await {
            // Unsettled (ingestion stopped first) means not processed
            Ok(()) => outcome.await.unwrap_or(Disposition::Retry),
            Err(_) => Disposition::Retry,
        };

        writer.write_u8(disposition.status_byte()).await?;
        writer.flush().await?;

        if sink.is_closed() {
            return Err(IngestError::Closed);
        }
    }
}

/// Producer side of the TCP ingest transport
#[derive(Debug)]
pub struct TcpProducer {
    stream: TcpStream,
}

impl TcpProducer {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, IngestError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Send one payload and wait for its disposition
    pub async fn send(&mut self, payload: &[u8]) -> Result<Disposition, IngestError> {
        write_frame(&mut self.stream, payload).await?;

        let status = self.stream.read_u8().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                IngestError::Disconnected
            } else {
                e.into()
            }
        })?;
        Disposition::from_status_byte(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(64);

        write_frame(&mut client, b"hello").await.unwrap();
        write_frame(&mut client, b"").await.unwrap();
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(read_frame(&mut server).await.unwrap(), Some(Vec::new()));
        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_FRAME_LEN as u32 + 1).to_le_bytes();
        client.write_all(&len).await.unwrap();

        assert!(matches!(
            read_frame(&mut server).await,
            Err(IngestError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_disconnect() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        assert!(matches!(
            read_frame(&mut server).await,
            Err(IngestError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_listener_answers_with_settled_disposition() {
        let (sink, mut source) = super::super::channel(4);
        let shutdown = CancellationToken::new();
        let listener = TcpIngestListener::bind("127.0.0.1:0", sink, shutdown.clone())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());

        // Settle every message by its payload
        tokio::spawn(async move {
            use super::super::MessageSource;
            while let Some(message) = source.recv().await {
                let disposition = match message.payload.as_slice() {
                    b"ok" => Disposition::Ack,
                    b"later" => Disposition::Retry,
                    _ => Disposition::Reject,
                };
                message.settle(disposition);
            }
        });

        let mut producer = TcpProducer::connect(addr).await.unwrap();
        assert_eq!(producer.send(b"ok").await.unwrap(), Disposition::Ack);
        assert_eq!(producer.send(b"later").await.unwrap(), Disposition::Retry);
        assert_eq!(producer.send(b"junk").await.unwrap(), Disposition::Reject);

        shutdown.cancel();
    }
}
