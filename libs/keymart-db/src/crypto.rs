//! AES-256-GCM encryption of single credential fields.
//!
//! Every call to [`FieldCipher::encrypt`] draws a fresh random 96-bit nonce
//! from the system CSPRNG and produces `base64(nonce || ciphertext || tag)`.
//! Nonce reuse would be catastrophic for GCM security.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("ciphertext is not valid base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext shorter than nonce + tag")]
    Truncated,
    #[error("AES-256-GCM open failed -- wrong key or corrupted data")]
    Aead,
    #[error("decrypted value is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Symmetric cipher for single string values. Cheap to clone; the suite and
/// nonce length are fixed system-wide.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipher(..)")
    }
}

impl FieldCipher {
    /// Build a cipher from a base64-encoded 256-bit key.
    pub fn from_base64(key_b64: &str) -> anyhow::Result<Self> {
        let bytes = B64
            .decode(key_b64.trim())
            .map_err(|e| anyhow::anyhow!("AES key is not valid base64: {e}"))?;
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("AES key must be 32 bytes, got {}", bytes.len()))?;
        Ok(Self { key })
    }

    /// Generate a random key, base64-encoded. Used for provisioning and tests.
    pub fn generate_key() -> anyhow::Result<String> {
        let rng = SystemRandom::new();
        let mut key = [0u8; 32];
        rng.fill(&mut key)
            .map_err(|_| anyhow::anyhow!("failed to generate random key"))?;
        Ok(B64.encode(key))
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Two calls on equal plaintext produce different tokens; both decrypt to
    /// the same value.
    pub fn encrypt(&self, plaintext: &str) -> anyhow::Result<String> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| anyhow::anyhow!("failed to create AES-256-GCM key"))?;
        let sealing = LessSafeKey::new(unbound);

        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes)
            .map_err(|_| anyhow::anyhow!("failed to generate random nonce"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        sealing
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| anyhow::anyhow!("AES-256-GCM encryption failed"))?;

        let mut token = Vec::with_capacity(NONCE_LEN + in_out.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&in_out);
        Ok(B64.encode(token))
    }

    /// Strict decrypt. Malformed tokens, wrong keys and tampered data all
    /// surface as [`DecryptError`].
    pub fn decrypt(&self, token: &str) -> Result<String, DecryptError> {
        let data = B64.decode(token)?;
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(DecryptError::Truncated);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);

        let unbound = UnboundKey::new(&AES_256_GCM, &self.key).map_err(|_| DecryptError::Aead)?;
        let opening = LessSafeKey::new(unbound);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| DecryptError::Aead)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = opening
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| DecryptError::Aead)?;
        Ok(String::from_utf8(plaintext.to_vec())?)
    }

    /// Tolerant decrypt used by the list/export paths: any failure collapses
    /// to an empty string instead of aborting the surrounding operation.
    pub fn decrypt_or_empty(&self, token: &str) -> String {
        self.decrypt(token).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::from_base64(&FieldCipher::generate_key().unwrap()).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let c = cipher();
        let token = c.encrypt("hunter2").unwrap();
        assert_eq!(c.decrypt(&token).unwrap(), "hunter2");
    }

    #[test]
    fn roundtrip_empty_and_unicode() {
        let c = cipher();
        for s in ["", "päss wörd", "секрет", "🔑"] {
            let token = c.encrypt(s).unwrap();
            assert_eq!(c.decrypt(&token).unwrap(), s);
        }
    }

    #[test]
    fn same_plaintext_yields_different_tokens() {
        let c = cipher();
        let t1 = c.encrypt("same input twice").unwrap();
        let t2 = c.encrypt("same input twice").unwrap();
        assert_ne!(t1, t2);
        assert_eq!(c.decrypt(&t1).unwrap(), c.decrypt(&t2).unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let token = cipher().encrypt("secret data").unwrap();
        assert!(matches!(cipher().decrypt(&token), Err(DecryptError::Aead)));
    }

    #[test]
    fn tampered_token_fails() {
        let c = cipher();
        let token = c.encrypt("do not tamper").unwrap();
        let mut raw = B64.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(matches!(c.decrypt(&B64.encode(raw)), Err(DecryptError::Aead)));
    }

    #[test]
    fn malformed_tokens_fail() {
        let c = cipher();
        assert!(matches!(c.decrypt("%%%"), Err(DecryptError::Encoding(_))));
        assert!(matches!(c.decrypt("AAAA"), Err(DecryptError::Truncated)));
    }

    #[test]
    fn tolerant_decrypt_collapses_to_empty() {
        let c = cipher();
        assert_eq!(c.decrypt_or_empty("not a token"), "");
        let token = c.encrypt("still works").unwrap();
        assert_eq!(c.decrypt_or_empty(&token), "still works");
    }
}
