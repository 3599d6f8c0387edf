use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::VaultError;

/// Minimum length of the configured encryption secret.
pub const MIN_SECRET_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// AES-256-GCM sealing for tokens at rest.
///
/// The key is the SHA-256 digest of the configured secret. Sealed values are
/// `base64(nonce || ciphertext || tag)` with a fresh random nonce per call.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(secret: &SecretString) -> Result<Self, VaultError> {
        let secret = secret.expose_secret();
        if secret.chars().count() < MIN_SECRET_LEN {
            return Err(VaultError::WeakSecret {
                min: MIN_SECRET_LEN,
            });
        }

        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| VaultError::Encrypt)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Opens a value produced by [`encrypt`](TokenCipher::encrypt). Fails if
    /// the value was altered or sealed under a different secret.
    pub fn decrypt(&self, sealed: &str) -> Result<SecretString, VaultError> {
        let bytes = STANDARD
            .decode(sealed)
            .map_err(|error| VaultError::Decrypt(error.to_string()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(VaultError::Decrypt(String::from("sealed value is truncated")));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Decrypt(String::from("authentication failed")))?;
        let plaintext = String::from_utf8(plaintext)
            .map_err(|_| VaultError::Decrypt(String::from("token is not utf-8")))?;

        Ok(SecretString::from(plaintext))
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher([REDACTED])")
    }
}
