//! Authenticated, encrypted, ordered channel to one peer.
//!
//! A channel is created either by [`SecureChannel::connect`] (sends `SECU`
//! and runs the initiator side of the handshake) or by
//! [`SecureChannel::accept`] (the `SECU` tag has already been read by the
//! command dispatcher). Both sides then exchange their share index as a
//! sealed 32-byte big-endian blob.
//!
//! Two message flavours share the frame layer and never mix:
//!
//! - *sealed*: encrypted with the per-direction transport key
//! - *clear*: sent as is; used for values that are public by construction
//!   (opened shares, point shares)
//!
//! Every receive is exact-size: a frame of the wrong flavour or length is an
//! error, never a partial read.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use smpc_crypto::chacha20::TAG_SIZE;
use smpc_crypto::x25519::{X25519PublicKey, X25519StaticSecret};
use smpc_types::identity::IDENTITY_BLOB_LEN;
use smpc_types::PeerIdentity;

use crate::command::SECU_TAG;
use crate::frame::{read_frame, write_frame, FrameKind, MAX_FRAME_BODY};
use crate::noise::{Initiator, Responder, TransportKeys, MSG1_LEN, MSG2_LEN, MSG3_LEN};
use crate::{io_error, Result, TransportError};

/// Largest plaintext that fits one sealed frame.
pub const MAX_SEALED_CHUNK: usize = MAX_FRAME_BODY - TAG_SIZE;

/// An established channel over any byte stream.
pub struct SecureChannel<S> {
    stream: S,
    keys: TransportKeys,
    peer: PeerIdentity,
    remote_static: X25519PublicKey,
}

impl<S> SecureChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Open a channel to a peer whose static key is known from the roster.
    pub async fn connect(
        mut stream: S,
        local_static: &X25519StaticSecret,
        remote_static: X25519PublicKey,
        me: PeerIdentity,
    ) -> Result<Self> {
        let mut initiator = Initiator::new(local_static.clone(), remote_static);

        let first = initiator.write_first()?;
        let mut opening = Vec::with_capacity(SECU_TAG.len() + MSG1_LEN);
        opening.extend_from_slice(SECU_TAG);
        opening.extend_from_slice(&first);
        stream.write_all(&opening).await.map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;

        let mut second = [0u8; MSG2_LEN];
        stream.read_exact(&mut second).await.map_err(io_error)?;
        initiator.read_second(&second)?;

        let (third, keys) = initiator.write_third()?;
        stream.write_all(&third).await.map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;

        let channel = Self::bootstrap(stream, keys, remote_static, me).await?;
        tracing::debug!(me = %me, peer = %channel.peer, "initiated secure channel");
        channel.check_not_self(me)?;
        Ok(channel)
    }

    /// Run the responder side on a stream whose `SECU` tag was consumed.
    pub async fn accept(
        mut stream: S,
        local_static: &X25519StaticSecret,
        me: PeerIdentity,
    ) -> Result<Self> {
        let mut responder = Responder::new(local_static.clone());

        let mut first = [0u8; MSG1_LEN];
        stream.read_exact(&mut first).await.map_err(io_error)?;
        responder.read_first(&first)?;

        let second = responder.write_second()?;
        stream.write_all(&second).await.map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;

        let mut third = [0u8; MSG3_LEN];
        stream.read_exact(&mut third).await.map_err(io_error)?;
        let (remote_static, keys) = responder.read_third(&third)?;

        let channel = Self::bootstrap(stream, keys, remote_static, me).await?;
        tracing::debug!(me = %me, peer = %channel.peer, "accepted secure channel");
        channel.check_not_self(me)?;
        Ok(channel)
    }

    async fn bootstrap(
        stream: S,
        keys: TransportKeys,
        remote_static: X25519PublicKey,
        me: PeerIdentity,
    ) -> Result<Self> {
        let mut channel = Self {
            stream,
            keys,
            // Placeholder until the peer's blob arrives.
            peer: me,
            remote_static,
        };
        channel.send_sealed(&me.to_blob()).await?;
        let blob = channel.recv_sealed_exact(IDENTITY_BLOB_LEN).await?;
        channel.peer = PeerIdentity::from_blob(&blob)
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        Ok(channel)
    }

    fn check_not_self(&self, me: PeerIdentity) -> Result<()> {
        if self.peer == me {
            return Err(TransportError::DuplicatePeer(me));
        }
        Ok(())
    }

    /// The peer's share index.
    pub fn peer(&self) -> PeerIdentity {
        self.peer
    }

    /// The peer's authenticated static key.
    pub fn remote_static(&self) -> &X25519PublicKey {
        &self.remote_static
    }

    /// Send an encrypted message.
    pub async fn send_sealed(&mut self, plaintext: &[u8]) -> Result<()> {
        let ciphertext = self.keys.send.encrypt(plaintext)?;
        write_frame(&mut self.stream, FrameKind::Sealed, &ciphertext).await
    }

    /// Receive the next encrypted message.
    pub async fn recv_sealed(&mut self) -> Result<Vec<u8>> {
        let body = self.recv_kind(FrameKind::Sealed).await?;
        self.keys.recv.decrypt(&body)
    }

    /// Receive an encrypted message that must be exactly `size` bytes.
    pub async fn recv_sealed_exact(&mut self, size: usize) -> Result<Vec<u8>> {
        let plaintext = self.recv_sealed().await?;
        expect_size(plaintext, size)
    }

    /// Send a document of any size as a sealed length header plus sealed chunks.
    pub async fn send_sealed_document(&mut self, document: &[u8]) -> Result<()> {
        let len = u32::try_from(document.len()).map_err(|_| TransportError::PayloadTooLarge {
            size: document.len(),
            max: u32::MAX as usize,
        })?;
        self.send_sealed(&len.to_be_bytes()).await?;
        for chunk in document.chunks(MAX_SEALED_CHUNK) {
            self.send_sealed(chunk).await?;
        }
        Ok(())
    }

    /// Receive a document written by [`Self::send_sealed_document`].
    pub async fn recv_sealed_document(&mut self, max: usize) -> Result<Vec<u8>> {
        let header = self.recv_sealed_exact(4).await?;
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(&header);
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > max {
            return Err(TransportError::PayloadTooLarge { size: len, max });
        }

        let mut document = Vec::with_capacity(len);
        while document.len() < len {
            let chunk = self.recv_sealed().await?;
            if document.len() + chunk.len() > len {
                return Err(TransportError::SizeMismatch {
                    expected: len,
                    actual: document.len() + chunk.len(),
                });
            }
            document.extend_from_slice(&chunk);
        }
        Ok(document)
    }

    /// Send a message without the channel cipher.
    pub async fn send_clear(&mut self, data: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, FrameKind::Clear, data).await
    }

    /// Receive a clear message that must be exactly `size` bytes.
    pub async fn recv_clear_exact(&mut self, size: usize) -> Result<Vec<u8>> {
        let body = self.recv_kind(FrameKind::Clear).await?;
        expect_size(body, size)
    }

    async fn recv_kind(&mut self, expected: FrameKind) -> Result<Vec<u8>> {
        let (actual, body) = read_frame(&mut self.stream).await?;
        if actual != expected {
            return Err(TransportError::UnexpectedFrame { expected, actual });
        }
        Ok(body)
    }

    /// Close the write half; the peer sees end of stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(io_error)
    }
}

fn expect_size(data: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if data.len() != expected {
        return Err(TransportError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(data)
}
