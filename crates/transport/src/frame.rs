//! Length-prefixed frame I/O
//!
//! Shared by every socket role: a frame is a `u32` big-endian length
//! followed by that many payload bytes.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::TransportError;

/// Maximum frame size (16MB)
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Read one frame from the stream
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, TransportError>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Bytes::from(payload)))
}

/// Write one frame to the stream and flush it
pub(crate) async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWriteExt + Unpin,
{
    if payload.len() as u64 > MAX_FRAME_SIZE as u64 {
        return Err(TransportError::FrameTooLarge {
            size: payload.len() as u32,
            limit: MAX_FRAME_SIZE,
        });
    }

    let len_bytes = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
