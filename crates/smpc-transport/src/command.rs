//! Control-socket commands.
//!
//! Every inbound connection starts with a 4-byte tag:
//!
//! | Tag    | Follows                                  |
//! |--------|------------------------------------------|
//! | `SIGN` | `[u32 BE length][JSON SignRequest]`      |
//! | `SECU` | first Noise handshake message            |
//! | `HALT` | nothing                                  |
//!
//! A `SIGN` caller receives `[u32 BE length][DER signature]` on success, or
//! sees the connection close without a response on failure.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use smpc_types::SignRequest;

use crate::{io_error, Result, TransportError};

pub const SIGN_TAG: &[u8; 4] = b"SIGN";
pub const SECU_TAG: &[u8; 4] = b"SECU";
pub const HALT_TAG: &[u8; 4] = b"HALT";

/// Largest accepted `SIGN` payload.
pub const MAX_SIGN_PAYLOAD: usize = 1 << 20;

/// Largest accepted signature response. DER secp256k1 signatures fit in 72.
pub const MAX_SIGNATURE_LEN: usize = 1024;

/// A decoded control command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sign a message with the listed nodes; the receiver becomes the root.
    Sign(SignRequest),
    /// A peer opens a secure channel; the handshake follows on the stream.
    Secure,
    /// Stop serving.
    Halt,
}

impl Command {
    pub fn tag(&self) -> &'static [u8; 4] {
        match self {
            Self::Sign(_) => SIGN_TAG,
            Self::Secure => SECU_TAG,
            Self::Halt => HALT_TAG,
        }
    }
}

/// Read a command tag and, for `SIGN`, its payload.
pub async fn read_command<R>(reader: &mut R) -> Result<Command>
where
    R: AsyncRead + Unpin,
{
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag).await.map_err(io_error)?;

    match &tag {
        SIGN_TAG => {
            let payload = read_length_prefixed(reader, MAX_SIGN_PAYLOAD).await?;
            let request = SignRequest::from_json(&payload)
                .map_err(|e| TransportError::InvalidPayload(e.to_string()))?;
            Ok(Command::Sign(request))
        }
        SECU_TAG => Ok(Command::Secure),
        HALT_TAG => Ok(Command::Halt),
        other => Err(TransportError::UnknownCommand(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

/// Write a command. `Secure` writes only the tag.
pub async fn write_command<W>(writer: &mut W, command: &Command) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = command.tag().to_vec();
    if let Command::Sign(request) = command {
        let payload = request
            .to_json()
            .map_err(|e| TransportError::InvalidPayload(e.to_string()))?;
        out.extend_from_slice(&length_prefix(payload.len(), MAX_SIGN_PAYLOAD)?);
        out.extend_from_slice(&payload);
    }
    writer.write_all(&out).await.map_err(io_error)?;
    writer.flush().await.map_err(io_error)?;
    Ok(())
}

/// Write the `SIGN` response.
pub async fn write_signature<W>(writer: &mut W, signature: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = length_prefix(signature.len(), MAX_SIGNATURE_LEN)?.to_vec();
    out.extend_from_slice(signature);
    writer.write_all(&out).await.map_err(io_error)?;
    writer.flush().await.map_err(io_error)?;
    Ok(())
}

/// Read the `SIGN` response.
pub async fn read_signature<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    read_length_prefixed(reader, MAX_SIGNATURE_LEN).await
}

/// Connect to a node, issue `SIGN`, and wait for the signature.
///
/// Returns [`TransportError::Closed`] when the node fails the session.
pub async fn request_signature<A>(addr: A, request: &SignRequest) -> Result<Vec<u8>>
where
    A: ToSocketAddrs,
{
    let mut stream = TcpStream::connect(addr).await.map_err(io_error)?;
    write_command(&mut stream, &Command::Sign(request.clone())).await?;
    read_signature(&mut stream).await
}

/// Connect to a node and tell it to stop serving.
pub async fn send_halt<A>(addr: A) -> Result<()>
where
    A: ToSocketAddrs,
{
    let mut stream = TcpStream::connect(addr).await.map_err(io_error)?;
    write_command(&mut stream, &Command::Halt).await
}

fn length_prefix(len: usize, max: usize) -> Result<[u8; 4]> {
    if len > max {
        return Err(TransportError::PayloadTooLarge { size: len, max });
    }
    let len = u32::try_from(len).map_err(|_| TransportError::PayloadTooLarge { size: len, max })?;
    Ok(len.to_be_bytes())
}

async fn read_length_prefixed<R>(reader: &mut R, max: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(io_error)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max {
        return Err(TransportError::PayloadTooLarge { size: len, max });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(io_error)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smpc_types::NodeInfo;

    #[tokio::test]
    async fn test_sign_command_roundtrip() {
        let roster = vec![NodeInfo::new("127.0.0.1", 4201, &[1u8; 32])];
        let request = SignRequest::new(b"payload", roster);
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_command(&mut a, &Command::Sign(request.clone()))
            .await
            .expect("write");
        assert_eq!(read_command(&mut b).await.expect("read"), Command::Sign(request));
    }

    #[tokio::test]
    async fn test_sign_wire_layout() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let request = SignRequest::new(b"x", Vec::new());
        write_command(&mut a, &Command::Sign(request.clone()))
            .await
            .expect("write");
        drop(a);
        let mut raw = Vec::new();
        b.read_to_end(&mut raw).await.expect("read");
        let json = request.to_json().expect("json");
        assert_eq!(&raw[..4], b"SIGN");
        assert_eq!(&raw[4..8], &(json.len() as u32).to_be_bytes());
        assert_eq!(&raw[8..], json.as_slice());
    }

    #[tokio::test]
    async fn test_halt_and_secure_tags() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"HALTSECU").await.expect("write");
        assert_eq!(read_command(&mut b).await.expect("halt"), Command::Halt);
        assert_eq!(read_command(&mut b).await.expect("secu"), Command::Secure);
    }

    #[tokio::test]
    async fn test_unknown_tag_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"PING").await.expect("write");
        assert!(matches!(
            read_command(&mut b).await,
            Err(TransportError::UnknownCommand(tag)) if tag == "PING"
        ));
    }

    #[tokio::test]
    async fn test_oversized_sign_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"SIGN").await.expect("tag");
        a.write_all(&((MAX_SIGN_PAYLOAD as u32) + 1).to_be_bytes())
            .await
            .expect("len");
        assert!(matches!(
            read_command(&mut b).await,
            Err(TransportError::PayloadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_sign_payload() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"SIGN\x00\x00\x00\x03{}}").await.expect("write");
        assert!(matches!(
            read_command(&mut b).await,
            Err(TransportError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_signature_response() {
        let (mut a, mut b) = tokio::io::duplex(256);
        write_signature(&mut a, &[0x30, 0x06, 1, 2, 3, 4, 5, 6])
            .await
            .expect("write");
        assert_eq!(
            read_signature(&mut b).await.expect("read"),
            vec![0x30, 0x06, 1, 2, 3, 4, 5, 6]
        );
    }
}
