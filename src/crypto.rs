//! Symmetric encryption for provider tokens and access credentials.
//!
//! AES-256-CFB with a key derived from the process-wide secret
//! (`NEXTAUTH_SECRET`, right-padded with `'0'` bytes or truncated to 32
//! bytes) and IV = SHA-256(key)[:16]. Ciphertext is stored as URL-safe
//! base64. The scheme is built from the `aes`/`cfb-mode` RustCrypto crates
//! alongside `sha2`, which is also used for content hashing elsewhere.

use aes::cipher::{AsyncStreamCipher, KeyIvInit};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};

type Encryptor = cfb_mode::Encryptor<aes::Aes256>;
type Decryptor = cfb_mode::Decryptor<aes::Aes256>;

/// Derives a fixed-size key from an arbitrary-length secret by right-padding
/// with `'0'` bytes or truncating to exactly 32 bytes (AES-256 key size).
fn derive_key(secret: &str) -> [u8; 32] {
    let mut key = [b'0'; 32];
    let bytes = secret.as_bytes();
    let n = bytes.len().min(32);
    key[..n].copy_from_slice(&bytes[..n]);
    key
}

fn derive_iv(key: &[u8; 32]) -> [u8; 16] {
    let digest = Sha256::digest(key);
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&digest[..16]);
    iv
}

/// Encrypts a UTF-8 string, returning URL-safe base64 ciphertext.
pub fn encrypt(secret: &str, plaintext: &str) -> String {
    let key = derive_key(secret);
    let iv = derive_iv(&key);
    let mut buf = plaintext.as_bytes().to_vec();
    Encryptor::new(&key.into(), &iv.into()).encrypt(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Decrypts URL-safe base64 ciphertext produced by [`encrypt`].
pub fn decrypt(secret: &str, ciphertext: &str) -> Result<String> {
    let key = derive_key(secret);
    let iv = derive_iv(&key);
    let mut buf = URL_SAFE_NO_PAD
        .decode(ciphertext)
        .map_err(|_| PipelineError::DecryptionFailed)?;
    Decryptor::new(&key.into(), &iv.into()).decrypt(&mut buf);
    String::from_utf8(buf).map_err(|_| PipelineError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_strings() {
        let secret = "test-secret-value";
        for s in ["", "hello world", "sk-abcdef0123456789", "unicode: \u{1F600}"] {
            let ct = encrypt(secret, s);
            assert_eq!(decrypt(secret, &ct).unwrap(), s);
        }
    }

    #[test]
    fn different_secrets_produce_different_ciphertext() {
        let ct_a = encrypt("secret-a", "payload");
        let ct_b = encrypt("secret-b", "payload");
        assert_ne!(ct_a, ct_b);
    }

    #[test]
    fn bad_ciphertext_surfaces_decryption_failed() {
        let err = decrypt("secret", "not valid base64!!").unwrap_err();
        assert!(matches!(err, PipelineError::DecryptionFailed));
    }
}
