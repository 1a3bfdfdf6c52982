use aes::{Aes128, Aes192, Aes256};
use async_trait::async_trait;
use bytes::Bytes;
use ofb::Ofb;
use ofb::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

use crate::error::TransformError;
use crate::transform::{StageInput, StageOutput, StageStats, Transform};

/// IV length of the AES block, prefixed to every encrypted object.
pub const IV_LEN: usize = 16;

fn decode_key(hex_key: &str) -> Result<Vec<u8>, TransformError> {
    let key = hex::decode(hex_key).map_err(|e| {
        TransformError::InvalidConfig(format!("encryption key is not valid hex: {e}"))
    })?;
    match key.len() {
        16 | 24 | 32 => Ok(key),
        n => Err(TransformError::InvalidConfig(format!(
            "encryption key must be 16, 24 or 32 bytes, got {n}"
        ))),
    }
}

/// OFB keystream over the AES variant selected by the key length.
enum OfbStream {
    Aes128(Ofb<Aes128>),
    Aes192(Ofb<Aes192>),
    Aes256(Ofb<Aes256>),
}

impl OfbStream {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self, TransformError> {
        let init = |e: ofb::cipher::InvalidLength| TransformError::Cipher(e.to_string());
        match key.len() {
            16 => Ok(OfbStream::Aes128(Ofb::new_from_slices(key, iv).map_err(init)?)),
            24 => Ok(OfbStream::Aes192(Ofb::new_from_slices(key, iv).map_err(init)?)),
            32 => Ok(OfbStream::Aes256(Ofb::new_from_slices(key, iv).map_err(init)?)),
            n => Err(TransformError::InvalidConfig(format!(
                "encryption key must be 16, 24 or 32 bytes, got {n}"
            ))),
        }
    }

    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            OfbStream::Aes128(c) => c.apply_keystream(buf),
            OfbStream::Aes192(c) => c.apply_keystream(buf),
            OfbStream::Aes256(c) => c.apply_keystream(buf),
        }
    }
}

/// AES-OFB encryption. Every object gets a fresh random IV, written as a
/// 16-byte prefix ahead of the ciphertext, so re-encrypting the same
/// plaintext never yields the same output.
#[derive(Debug)]
pub struct Encrypt {
    key: Vec<u8>,
}

impl Encrypt {
    pub fn new(hex_key: &str) -> Result<Self, TransformError> {
        Ok(Self { key: decode_key(hex_key)? })
    }
}

#[async_trait]
impl Transform for Encrypt {
    fn name(&self) -> &'static str {
        "encrypt"
    }

    async fn apply(
        &self,
        input: &mut StageInput,
        output: &mut StageOutput,
    ) -> Result<StageStats, TransformError> {
        let mut stats = StageStats::default();

        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        let mut cipher = OfbStream::new(&self.key, &iv)?;

        output.put_chunk(Bytes::copy_from_slice(&iv)).await?;
        stats.bytes_out += IV_LEN as u64;

        while let Some(chunk) = input.next_chunk().await? {
            stats.bytes_in += chunk.len() as u64;
            let mut buf = chunk.to_vec();
            cipher.apply(&mut buf);
            stats.bytes_out += buf.len() as u64;
            output.put_chunk(Bytes::from(buf)).await?;
        }
        Ok(stats)
    }
}

/// AES-OFB decryption. Reads the 16-byte IV prefix, which may straddle
/// chunk boundaries, then streams the rest through the keystream.
#[derive(Debug)]
pub struct Decrypt {
    key: Vec<u8>,
}

impl Decrypt {
    pub fn new(hex_key: &str) -> Result<Self, TransformError> {
        Ok(Self { key: decode_key(hex_key)? })
    }
}

#[async_trait]
impl Transform for Decrypt {
    fn name(&self) -> &'static str {
        "decrypt"
    }

    async fn apply(
        &self,
        input: &mut StageInput,
        output: &mut StageOutput,
    ) -> Result<StageStats, TransformError> {
        let mut stats = StageStats::default();

        let mut iv = Vec::with_capacity(IV_LEN);
        let mut cipher: Option<OfbStream> = None;

        while let Some(chunk) = input.next_chunk().await? {
            stats.bytes_in += chunk.len() as u64;
            let mut rest: &[u8] = &chunk;

            if cipher.is_none() {
                let take = (IV_LEN - iv.len()).min(rest.len());
                iv.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
                if iv.len() == IV_LEN {
                    cipher = Some(OfbStream::new(&self.key, &iv)?);
                }
            }

            // rest is only non-empty once the IV is complete.
            if let Some(cipher) = cipher.as_mut() {
                if !rest.is_empty() {
                    let mut buf = rest.to_vec();
                    cipher.apply(&mut buf);
                    stats.bytes_out += buf.len() as u64;
                    output.put_chunk(Bytes::from(buf)).await?;
                }
            }
        }

        if cipher.is_none() {
            return Err(TransformError::Cipher(
                "ciphertext shorter than the 16-byte IV prefix".to_string(),
            ));
        }
        Ok(stats)
    }
}
