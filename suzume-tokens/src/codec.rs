//! `tokio_util` codec framing IRC messages on line boundaries.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::Message;

/// Ceiling on the length of a single incoming line, terminator included.
///
/// RFC 2812 fixes lines at 512 bytes; some clients overshoot, so the codec
/// tolerates a few multiples before declaring the peer broken.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Failure while framing messages over the byte stream.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("line exceeds {MAX_LINE_LENGTH} bytes")]
    LineTooLong,
    #[error("malformed message: {0:?}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Frames [`Message`] values over any byte stream.
///
/// Incoming bytes are split on `\n` (tolerating bare `\n` as well as the
/// canonical `\r\n`); blank lines are skipped.  Outgoing messages are
/// rendered in wire form and terminated with `\r\n`.
#[derive(Debug, Default)]
pub struct Codec;

impl Decoder for Codec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > MAX_LINE_LENGTH {
                    return Err(CodecError::LineTooLong);
                }
                return Ok(None);
            };
            if pos > MAX_LINE_LENGTH {
                return Err(CodecError::LineTooLong);
            }

            let line_bytes = src.split_to(pos);
            src.advance(1); // the \n itself

            let line = std::str::from_utf8(&line_bytes)
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?
                .trim_end_matches('\r');

            // A blank line carries no message; keep scanning.
            if line.trim_start_matches(' ').is_empty() {
                continue;
            }

            return match Message::parse(line) {
                Some(msg) => Ok(Some(msg)),
                None => Err(CodecError::Parse(line.to_owned())),
            };
        }
    }
}

impl Encoder<&Message> for Codec {
    type Error = CodecError;

    fn encode(&mut self, msg: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let wire = msg.to_string();
        dst.reserve(wire.len() + 2);
        dst.put_slice(wire.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

impl Encoder<Message> for Codec {
    type Error = CodecError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        Encoder::<&Message>::encode(self, &msg, dst)
    }
}
