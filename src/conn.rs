//! Message-stream adapter over a duplex byte stream.
//!
//! A [`Conn`] turns any `AsyncRead + AsyncWrite` endpoint into a message
//! endpoint.  Reads have a single consumer (the connection's dispatcher);
//! writes come from many tasks (replies from the dispatcher, broadcasts from
//! channel fan-out) and are serialized by a per-connection lock held across
//! the whole batch, so messages never interleave on the wire.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use suzume_tokens::{Codec, CodecError, Message};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite};

/// A byte stream a connection can be built over: a TCP socket, a TLS-wrapped
/// socket, an in-memory duplex pipe in tests.
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Duplex for T {}

type Reader = FramedRead<ReadHalf<Box<dyn Duplex>>, Codec>;
type Writer = FramedWrite<WriteHalf<Box<dyn Duplex>>, Codec>;

/// One client connection, framed into messages.
pub struct Conn {
    reader: Mutex<Reader>,
    writer: Mutex<Writer>,
    closed: watch::Sender<bool>,
    shut: AtomicBool,
}

impl Conn {
    pub fn new(stream: impl Duplex) -> Conn {
        let (read, write) = tokio::io::split(Box::new(stream) as Box<dyn Duplex>);
        Conn {
            reader: Mutex::new(FramedRead::new(read, Codec)),
            writer: Mutex::new(FramedWrite::new(write, Codec)),
            closed: watch::channel(false).0,
            shut: AtomicBool::new(false),
        }
    }

    /// Reads the next message.
    ///
    /// Fails on end of stream, on a malformed frame, and as soon as the
    /// connection is closed, even with a read in flight.
    pub async fn decode(&self) -> Result<Message, CodecError> {
        if *self.closed.borrow() {
            return Err(closed_error());
        }
        let mut closed = self.closed.subscribe();
        let mut reader = self.reader.lock().await;
        tokio::select! {
            _ = closed.wait_for(|&closed| closed) => Err(closed_error()),
            frame = reader.next() => match frame {
                Some(Ok(msg)) => Ok(msg),
                Some(Err(err)) => Err(err),
                None => Err(CodecError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "end of stream",
                ))),
            },
        }
    }

    /// Writes the messages in order, as one atomic batch.
    ///
    /// The first encoding error aborts the rest of the batch.
    pub async fn encode(&self, msgs: &[Message]) -> Result<(), CodecError> {
        if *self.closed.borrow() {
            return Err(closed_error());
        }
        let mut closed = self.closed.subscribe();
        let mut writer = self.writer.lock().await;
        let write_all = async {
            for msg in msgs {
                writer.feed(msg).await?;
            }
            SinkExt::<&Message>::flush(&mut *writer).await
        };
        tokio::select! {
            _ = closed.wait_for(|&closed| closed) => Err(closed_error()),
            res = write_all => res,
        }
    }

    /// Closes the connection.  Idempotent; pending reads and writes fail.
    pub async fn close(&self) {
        if self.shut.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.closed.send(true);
        let mut writer = self.writer.lock().await;
        let _ = SinkExt::<&Message>::flush(&mut *writer).await;
        let _ = writer.get_mut().shutdown().await;
    }
}

fn closed_error() -> CodecError {
    CodecError::Io(io::Error::new(
        io::ErrorKind::ConnectionAborted,
        "connection closed",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::Framed;

    fn pair() -> (Conn, Framed<tokio::io::DuplexStream, Codec>) {
        let (ours, theirs) = tokio::io::duplex(1024);
        (Conn::new(ours), Framed::new(theirs, Codec))
    }

    #[tokio::test]
    async fn encode_batch_keeps_order() {
        let (conn, mut peer) = pair();
        let batch = [
            Message::new("NICK").param("a"),
            Message::new("NICK").param("b"),
            Message::new("NICK").param("c"),
        ];
        conn.encode(&batch).await.unwrap();
        for expected in ["NICK a", "NICK b", "NICK c"] {
            let msg = peer.next().await.unwrap().unwrap();
            assert_eq!(msg.to_string(), expected);
        }
    }

    #[tokio::test]
    async fn decode_fails_on_eof() {
        let (conn, peer) = pair();
        drop(peer);
        assert!(conn.decode().await.is_err());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_io() {
        let (conn, _peer) = pair();
        conn.close().await;
        conn.close().await;
        assert!(conn.decode().await.is_err());
        assert!(conn.encode(&[Message::new("PING")]).await.is_err());
    }

    #[tokio::test]
    async fn close_interrupts_pending_read() {
        let (conn, _peer) = pair();
        let conn = std::sync::Arc::new(conn);
        let reader = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.decode().await })
        };
        tokio::task::yield_now().await;
        conn.close().await;
        let res = tokio::time::timeout(std::time::Duration::from_secs(1), reader)
            .await
            .expect("reader should be interrupted")
            .unwrap();
        assert!(res.is_err());
    }
}
