use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::errors::ClientError;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// Argon2id cost parameters, written into the session file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Number of passes
    pub time_cost: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 19 MiB, 2 passes, 1 lane. A session record is tiny and re-read on
    /// every start, so this stays well under a second on desktop hardware.
    fn default() -> Self {
        Self {
            memory_cost: 19_456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Derive the AES-256 key for a session file from its passphrase and salt.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<[u8; KEY_LEN], ClientError> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| ClientError::Encryption(format!("Invalid Argon2 params: {e}")))?;

    let mut key = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| ClientError::Encryption(format!("Argon2 key derivation failed: {e}")))?;
    Ok(key)
}

/// AES-256-GCM seal. The 16-byte tag is appended to the ciphertext.
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>, ClientError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ClientError::Encryption(format!("Failed to create cipher: {e}")))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| ClientError::Encryption(format!("Encryption failed: {e}")))
}

/// AES-256-GCM open. A wrong passphrase and a tampered file look the same.
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>, ClientError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ClientError::Encryption(format!("Failed to create cipher: {e}")))?;
    Ok(cipher.decrypt(Nonce::from_slice(nonce), ciphertext)?)
}

fn random_bytes<const N: usize>(what: &str) -> Result<[u8; N], ClientError> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf)
        .map_err(|e| ClientError::Encryption(format!("Failed to generate random {what}: {e}")))?;
    Ok(buf)
}

/// Fresh random salt; one per save.
pub fn generate_salt() -> Result<[u8; SALT_LEN], ClientError> {
    random_bytes("salt")
}

/// Fresh random nonce; one per save.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], ClientError> {
    random_bytes("nonce")
}
