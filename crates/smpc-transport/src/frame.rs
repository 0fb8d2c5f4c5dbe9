//! Length-prefixed frames on an established channel.
//!
//! ```text
//! [length: u16 BE][kind: u8][body: length - 1]
//! ```
//!
//! `length` covers the kind byte and the body, so a frame carries at most
//! `u16::MAX - 1` body bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{io_error, Result, TransportError};

/// Largest body a single frame can carry.
pub const MAX_FRAME_BODY: usize = u16::MAX as usize - 1;

/// Whether a frame body is sent as is or sealed with the channel cipher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Clear,
    Sealed,
}

impl FrameKind {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Clear => 0x00,
            Self::Sealed => 0x01,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Clear),
            0x01 => Ok(Self::Sealed),
            other => Err(TransportError::InvalidFrame(format!(
                "unknown frame kind {other:#04x}"
            ))),
        }
    }
}

/// Encode one frame.
pub fn encode(kind: FrameKind, body: &[u8]) -> Result<Vec<u8>> {
    if body.len() > MAX_FRAME_BODY {
        return Err(TransportError::PayloadTooLarge {
            size: body.len(),
            max: MAX_FRAME_BODY,
        });
    }
    // Bounded by the check above.
    let length = (body.len() + 1) as u16;
    let mut out = Vec::with_capacity(3 + body.len());
    out.extend_from_slice(&length.to_be_bytes());
    out.push(kind.to_byte());
    out.extend_from_slice(body);
    Ok(out)
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, kind: FrameKind, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(kind, body)?;
    writer.write_all(&frame).await.map_err(io_error)?;
    writer.flush().await.map_err(io_error)?;
    Ok(())
}

/// Read one complete frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<(FrameKind, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    reader.read_exact(&mut len_buf).await.map_err(io_error)?;
    let length = u16::from_be_bytes(len_buf) as usize;
    if length == 0 {
        return Err(TransportError::InvalidFrame("empty frame".to_string()));
    }

    let mut kind = [0u8; 1];
    reader.read_exact(&mut kind).await.map_err(io_error)?;
    let kind = FrameKind::from_byte(kind[0])?;

    let mut body = vec![0u8; length - 1];
    reader.read_exact(&mut body).await.map_err(io_error)?;
    Ok((kind, body))
}
