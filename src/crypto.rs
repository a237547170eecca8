use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zeroize::{ZeroizeOnDrop, Zeroizing};

/// AES-256 key length
pub const KEY_LEN: usize = 32;
/// AES-GCM nonce length
pub const IV_LEN: usize = 12;
/// Random salt length for key derivation
pub const SALT_LEN: usize = 16;
/// PBKDF2-HMAC-SHA256 work factor
pub const PBKDF2_ITERATIONS: u32 = 100_000;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("failed to create cipher")]
    InvalidKey,
    #[error("invalid nonce length {0}")]
    InvalidNonce(usize),
    #[error("encryption failed")]
    Encryption,
    #[error("authentication failed")]
    Decryption,
}

/// Wrapper for handling sensitive data like passwords
#[derive(Debug, Clone, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Create a new SecretString
    pub fn new(value: String) -> Self {
        Self { inner: value }
    }

    /// Convert to bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Password-based key derivation function
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kdf {
    /// PBKDF2-HMAC-SHA256 with [`PBKDF2_ITERATIONS`] rounds
    #[default]
    Pbkdf2,
    /// Argon2id with the crate's default cost parameters
    Argon2id,
}

impl Kdf {
    /// Derive a 256-bit key from a password and salt
    pub fn derive_key(
        &self,
        password: &SecretString,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        match self {
            Kdf::Pbkdf2 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(
                    password.as_bytes(),
                    salt,
                    PBKDF2_ITERATIONS,
                    &mut key[..],
                );
            }
            Kdf::Argon2id => {
                Argon2::default()
                    .hash_password_into(password.as_bytes(), salt, &mut key[..])
                    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
            }
        }
        Ok(key)
    }
}

impl fmt::Display for Kdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kdf::Pbkdf2 => write!(f, "pbkdf2"),
            Kdf::Argon2id => write!(f, "argon2id"),
        }
    }
}

impl FromStr for Kdf {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pbkdf2" => Ok(Kdf::Pbkdf2),
            "argon2id" | "argon2" => Ok(Kdf::Argon2id),
            other => Err(format!("unknown KDF '{}' (expected pbkdf2 or argon2id)", other)),
        }
    }
}

/// Fresh random AES-256 key
pub fn generate_key<R: Rng + CryptoRng>(rng: &mut R) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rng.fill_bytes(&mut key[..]);
    key
}

/// Fresh random GCM nonce
pub fn generate_iv<R: Rng + CryptoRng>(rng: &mut R) -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);
    iv
}

/// Fresh random KDF salt
pub fn generate_salt<R: Rng + CryptoRng>(rng: &mut R) -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    salt
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)
}

/// Encrypt data using AES-256-GCM
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidNonce(iv.len()));
    }
    cipher(key)?
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt and authenticate data using AES-256-GCM
pub fn decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidNonce(iv.len()));
    }
    cipher(key)?
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

/// Lowercase hex SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
