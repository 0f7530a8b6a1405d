//! # Value Transform
//!
//! Reversible transform for callers that want to store obscured payloads.
//! Stores never call it: a caller transforms before `add` and inverts after
//! a read. The output is plain base64 text, safe inside a JSON string.
//!
//! ## Format
//! `base64(nonce[12] || ciphertext || tag[16])`, AES-256-GCM with the key
//! derived as SHA-256 of the passphrase.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

/// Result type for transform operations
pub type CipherResult<T> = Result<T, CipherError>;

/// Transform errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Input is not valid base64")]
    InvalidEncoding,

    #[error("Input too short: {0} bytes")]
    Truncated(usize),

    /// Wrong passphrase or tampered input
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,

    #[error("Cipher failure")]
    Internal,
}

/// An opaque, keyed, reversible string transform.
pub trait ValueTransform {
    /// Obscures `text` under `key`.
    fn transform(&self, text: &str, key: &str) -> CipherResult<String>;

    /// Recovers the text produced by [`ValueTransform::transform`].
    fn inverse(&self, text: &str, key: &str) -> CipherResult<String>;
}

/// AES-256-GCM with a random nonce per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmTransform;

impl AesGcmTransform {
    fn cipher(key: &str) -> CipherResult<Aes256Gcm> {
        let digest = Sha256::digest(key.as_bytes());
        Aes256Gcm::new_from_slice(&digest).map_err(|_| CipherError::Internal)
    }
}

impl ValueTransform for AesGcmTransform {
    fn transform(&self, text: &str, key: &str) -> CipherResult<String> {
        let cipher = Self::cipher(key)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), text.as_bytes())
            .map_err(|_| CipherError::Internal)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    fn inverse(&self, text: &str, key: &str) -> CipherResult<String> {
        let raw = BASE64
            .decode(text.trim().as_bytes())
            .map_err(|_| CipherError::InvalidEncoding)?;
        if raw.len() <= NONCE_LEN {
            return Err(CipherError::Truncated(raw.len()));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = Self::cipher(key)?
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::AuthenticationFailed)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}
