// MIT License - Copyright (c) 2026 Peter Wright
// Session-key obfuscation

//! Single-byte session-key obfuscation.
//!
//! The panel hands out a one-byte key during the handshake. Outbound frames
//! (except the key request) are XORed with it. Inbound traffic arrives in
//! the clear on the observed firmware, so decrypting it is opt-in via
//! [`KeyedReader`].

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// XOR every byte with `key`. Identity when no key was negotiated.
pub fn obfuscate(data: &[u8], key: Option<u8>) -> Vec<u8> {
    match key {
        Some(key) => data.iter().map(|b| b ^ key).collect(),
        None => data.to_vec(),
    }
}

/// In-place variant of [`obfuscate`].
pub fn obfuscate_in_place(data: &mut [u8], key: Option<u8>) {
    if let Some(key) = key {
        for b in data.iter_mut() {
            *b ^= key;
        }
    }
}

/// `AsyncRead` adapter that XORs every byte read with an optional key.
///
/// The key can be installed after construction, which is how the handshake
/// uses it: the key reply itself is read in the clear.
#[derive(Debug)]
pub struct KeyedReader<R> {
    inner: R,
    key: Option<u8>,
}

impl<R> KeyedReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, key: None }
    }

    pub fn with_key(inner: R, key: Option<u8>) -> Self {
        Self { inner, key }
    }

    pub fn set_key(&mut self, key: Option<u8>) {
        self.key = key;
    }

    pub fn key(&self) -> Option<u8> {
        self.key
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for KeyedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let already_filled = buf.filled().len();
        let key = self.key;
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            obfuscate_in_place(&mut buf.filled_mut()[already_filled..], key);
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_obfuscate_identity_without_key() {
        let data = [0x01, 0xFB, 0xFF];
        assert_eq!(obfuscate(&data, None), data.to_vec());
    }

    #[test]
    fn test_obfuscate_xor() {
        assert_eq!(obfuscate(&[0x00, 0xFF, 0x0F], Some(0xAA)), vec![0xAA, 0x55, 0xA5]);
    }

    #[test]
    fn test_obfuscate_is_involution() {
        let data: Vec<u8> = (0..=255).collect();
        for key in [0x00, 0x01, 0x5A, 0xFF] {
            let once = obfuscate(&data, Some(key));
            assert_eq!(obfuscate(&once, Some(key)), data);
        }
    }

    #[tokio::test]
    async fn test_keyed_reader_decrypts() {
        let wire = obfuscate(b"hello", Some(0x42));
        let mut reader = KeyedReader::with_key(&wire[..], Some(0x42));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_keyed_reader_key_installed_midstream() {
        let mut wire = vec![0x10];
        wire.extend(obfuscate(&[1, 2, 3], Some(0x10)));

        let mut reader = KeyedReader::new(&wire[..]);
        let key = reader.read_u8().await.unwrap();
        reader.set_key(Some(key));

        let mut rest = [0u8; 3];
        reader.read_exact(&mut rest).await.unwrap();
        assert_eq!(rest, [1, 2, 3]);
        assert_eq!(reader.key(), Some(0x10));
    }
}
