//! Passphrase sealing of stored documents.
//!
//! Sealed layout: `HEADER (7) || version (1) || salt (32) || nonce (12) || ciphertext`.
//! The header and version travel in clear so a reader can tell a sealed
//! document from a plain JSON one, and are bound to the ciphertext as
//! associated data.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Argon2, Params};
use rand::RngCore;
use zeroize::Zeroizing;

const HEADER: &[u8] = b"LUNACAL";
const VERSION: u8 = 1;
const PREFIX_LEN: usize = 8;
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("sealing failed")]
    Seal,
    #[error("document is not sealed")]
    NotSealed,
    #[error("sealed with unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("sealed data is truncated")]
    Truncated,
    #[error("wrong passphrase")]
    WrongPassphrase,
}

/// Whether `bytes` start with the sealed-document header.
pub fn is_sealed(bytes: &[u8]) -> bool {
    bytes.starts_with(HEADER)
}

fn prefix() -> [u8; PREFIX_LEN] {
    let mut prefix = [0u8; PREFIX_LEN];
    prefix[..HEADER.len()].copy_from_slice(HEADER);
    prefix[HEADER.len()] = VERSION;
    prefix
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let params = Params::new(65536, 3, 1, Some(KEY_LEN)).map_err(|_| CryptoError::KeyDerivation)?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key[..])
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(key)
}

/// Encrypt `plaintext` under a key derived from `passphrase` and a fresh salt.
pub fn seal(passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::Seal)?;
    let prefix = prefix();
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: &prefix,
            },
        )
        .map_err(|_| CryptoError::Seal)?;

    let mut sealed = Vec::with_capacity(PREFIX_LEN + SALT_LEN + NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&prefix);
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt bytes produced by [`seal`].
pub fn open(passphrase: &str, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if !is_sealed(sealed) {
        return Err(CryptoError::NotSealed);
    }
    let version = *sealed.get(HEADER.len()).ok_or(CryptoError::Truncated)?;
    if version != VERSION {
        return Err(CryptoError::UnsupportedVersion(version));
    }
    if sealed.len() < PREFIX_LEN + SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Truncated);
    }
    let (prefix, rest) = sealed.split_at(PREFIX_LEN);
    let (salt, rest) = rest.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt)?;
    let cipher =
        Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::WrongPassphrase)?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: prefix,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::WrongPassphrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open() {
        let sealed = seal("correct horse", br#"{"2024-01-01":{"period":true}}"#).unwrap();
        assert!(is_sealed(&sealed));
        let opened = open("correct horse", &sealed).unwrap();
        assert_eq!(opened.as_slice(), br#"{"2024-01-01":{"period":true}}"#);
    }

    #[test]
    fn sealing_twice_differs() {
        let a = seal("pass", b"same").unwrap();
        let b = seal("pass", b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_passphrase_is_reported() {
        let sealed = seal("correct", b"secret").unwrap();
        assert!(matches!(open("wrong", &sealed), Err(CryptoError::WrongPassphrase)));
    }

    #[test]
    fn plain_json_is_not_sealed() {
        let plain = br#"{"2024-01-01":{"period":true}}"#;
        assert!(!is_sealed(plain));
        assert!(matches!(open("any", plain), Err(CryptoError::NotSealed)));
    }

    #[test]
    fn version_byte_is_checked() {
        let mut sealed = seal("pass", b"data").unwrap();
        sealed[HEADER.len()] = 9;
        assert!(matches!(
            open("pass", &sealed),
            Err(CryptoError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn truncated_data_fails() {
        assert!(matches!(open("any", b"LUNACAL\x01short"), Err(CryptoError::Truncated)));
    }
}
