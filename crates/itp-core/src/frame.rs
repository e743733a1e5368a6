//! Frame reassembly over a byte stream.
//!
//! A TCP peer may deliver one ITP packet in any number of reads. The reader
//! accumulates bytes until the 12-byte header is present, learns the body
//! length from it, then keeps reading until `12 + body_len` bytes are held.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::request::declared_name_len;
use crate::response::declared_size;
use crate::wire::{WireError, HEADER_LEN};

/// Size of a single read from the stream.
const READ_CHUNK: usize = 16 * 1024;

/// A packet kind whose total length is known once its header is.
pub trait Frame {
    /// Short name used in logs and errors.
    const NAME: &'static str;

    /// Length of the body that follows a complete header.
    fn body_len(header: &[u8]) -> Result<usize, WireError>;
}

/// Request framing: the body is the file name.
pub struct RequestFrame;

impl Frame for RequestFrame {
    const NAME: &'static str = "request";

    fn body_len(header: &[u8]) -> Result<usize, WireError> {
        declared_name_len(header)
    }
}

/// Response framing: the body is the image payload.
pub struct ResponseFrame;

impl Frame for ResponseFrame {
    const NAME: &'static str = "response";

    fn body_len(header: &[u8]) -> Result<usize, WireError> {
        declared_size(header)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("peer closed the connection after {received} of {expected} bytes")]
    Closed { received: usize, expected: usize },

    #[error("declared body of {declared} bytes exceeds limit of {limit}")]
    TooLarge { declared: usize, limit: usize },

    #[error("malformed header: {0}")]
    Wire(#[from] WireError),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Read exactly one `F` packet from `reader`.
///
/// Returns the complete packet (header plus body). Bytes the peer sends past
/// the end of the packet may have been consumed from the stream but are not
/// part of the result. `max_body` bounds the declared body length.
pub async fn read_frame<F, R>(reader: &mut R, max_body: usize) -> Result<Bytes, FrameError>
where
    F: Frame,
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut expected = HEADER_LEN;
    let mut header_seen = false;

    loop {
        if !header_seen && buf.len() >= HEADER_LEN {
            let declared = F::body_len(&buf[..HEADER_LEN])?;
            if declared > max_body {
                return Err(FrameError::TooLarge {
                    declared,
                    limit: max_body,
                });
            }
            expected = HEADER_LEN + declared;
            header_seen = true;
            if expected > buf.len() {
                buf.reserve(expected - buf.len());
            }
            tracing::trace!(
                frame = F::NAME,
                header = hex::encode(&buf[..HEADER_LEN]),
                expected,
                "frame header received"
            );
        }

        if header_seen && buf.len() >= expected {
            buf.truncate(expected);
            return Ok(buf.freeze());
        }

        let want = (expected - buf.len()).min(READ_CHUNK);
        let before = buf.len();
        let n = (&mut *reader).take(want as u64).read_buf(&mut buf).await?;
        if n == 0 {
            return Err(FrameError::Closed {
                received: before,
                expected,
            });
        }
        tracing::trace!(frame = F::NAME, chunk = n, total = buf.len(), "frame bytes received");
    }
}
