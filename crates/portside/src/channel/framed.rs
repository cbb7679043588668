//! Length-prefixed framing over a byte stream
//!
//! One message per frame: 4-byte big-endian length followed by the payload.
//! The underlying socket gives no message boundaries, so this is the only
//! application-level framing on every channel.

use crate::error::{PluginError, Result};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted frame size - prevents a misbehaving peer from exhausting
/// memory with a bogus length prefix.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Write one frame and flush it.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(PluginError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. A clean or mid-frame EOF surfaces as
/// [`PluginError::ChannelClosed`].
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Bytes> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(map_eof)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(PluginError::FrameTooLarge {
            len,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(map_eof)?;
    Ok(Bytes::from(payload))
}

fn map_eof(e: std::io::Error) -> PluginError {
    if matches!(
        e.kind(),
        std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::ConnectionReset
    ) {
        PluginError::ChannelClosed
    } else {
        PluginError::Io(e)
    }
}
