//! Wire format between the relay and the backend.
//!
//! Outgoing: one JSON document followed by `\n`.
//!
//! Incoming: short-read framing. Reads go into a fixed buffer and the reply
//! ends at the first read that returns fewer bytes than the buffer holds, or
//! at EOF.
//!
//! # Known limitations
//! - A reply whose length is an exact multiple of the buffer size is only
//!   completed by the following read: more data or EOF. If the backend keeps
//!   the connection open and sends nothing else, that read blocks.
//! - A reply split by the network into a short first segment is cut at that
//!   segment; the remainder is read as the start of the next reply.

use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

/// One reply read from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Concatenated bytes of every read that made up the reply.
    pub bytes: Bytes,
    /// The reply ended because the peer closed its side.
    pub peer_closed: bool,
}

/// Serialize a message as a single JSON line.
pub fn encode_message(message: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut payload = serde_json::to_vec(message)?;
    payload.push(b'\n');
    Ok(payload)
}

/// Read one reply using short-read framing.
pub async fn read_frame<R>(reader: &mut R, buffer_size: usize) -> std::io::Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; buffer_size];
    let mut reply = BytesMut::new();

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(Frame {
                bytes: reply.freeze(),
                peer_closed: true,
            });
        }

        reply.extend_from_slice(&chunk[..n]);

        if n < buffer_size {
            return Ok(Frame {
                bytes: reply.freeze(),
                peer_closed: false,
            });
        }
    }
}
