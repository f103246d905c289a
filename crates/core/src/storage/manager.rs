use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::errors::ClientError;
use crate::models::session::SessionRecord;

use super::encryption::{self, KdfParams};
use super::format::{self, SessionFileHeader};

/// Where a logged-in session survives process restarts.
pub trait SessionStore: Send + Sync {
    /// The persisted record, or `None` when logged out.
    fn load(&self) -> Result<Option<SessionRecord>, ClientError>;

    fn save(&self, record: &SessionRecord) -> Result<(), ClientError>;

    /// Forget the persisted record. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), ClientError>;
}

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Option<SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `record`, as if saved by an earlier run.
    pub fn with_record(record: SessionRecord) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(record))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<SessionRecord>>, ClientError> {
        self.slot
            .lock()
            .map_err(|_| ClientError::FileIO("session store lock poisoned".into()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionRecord>, ClientError> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, record: &SessionRecord) -> Result<(), ClientError> {
        *self.lock()? = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.lock()? = None;
        Ok(())
    }
}

/// Encrypt a session record into session-file bytes.
///
/// Flow: record → bincode → AES-256-GCM(Argon2id(passphrase, fresh salt)) → PFSN bytes
pub fn seal_record(
    record: &SessionRecord,
    passphrase: &str,
    kdf_params: &KdfParams,
) -> Result<Vec<u8>, ClientError> {
    let plaintext = bincode::serialize(record)
        .map_err(|e| ClientError::Serialization(format!("Failed to serialize session: {e}")))?;

    let salt = encryption::generate_salt()?;
    let nonce = encryption::generate_nonce()?;
    let key = encryption::derive_key(passphrase, &salt, kdf_params)?;
    let ciphertext = encryption::encrypt(&plaintext, &key, &nonce)?;

    let header = SessionFileHeader {
        version: format::CURRENT_VERSION,
        kdf_params: *kdf_params,
        salt,
        nonce,
    };
    format::write_file(&header, &ciphertext)
}

/// Decrypt session-file bytes back into a record.
pub fn open_record(data: &[u8], passphrase: &str) -> Result<SessionRecord, ClientError> {
    let (header, ciphertext) = format::read_file(data)?;
    let key = encryption::derive_key(passphrase, &header.salt, &header.kdf_params)?;
    let plaintext = encryption::decrypt(ciphertext, &key, &header.nonce)?;
    bincode::deserialize(&plaintext)
        .map_err(|e| ClientError::Deserialization(format!("Failed to deserialize session: {e}")))
}

/// Session record encrypted at rest in a single file (native only).
#[cfg(not(target_arch = "wasm32"))]
pub struct EncryptedFileSessionStore {
    path: PathBuf,
    passphrase: String,
    kdf_params: KdfParams,
}

#[cfg(not(target_arch = "wasm32"))]
impl EncryptedFileSessionStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: passphrase.into(),
            kdf_params: KdfParams::default(),
        }
    }

    /// Override the Argon2id cost used for future saves.
    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of `path` used while writing. Appended to the full file name
    /// so it can never equal `path` itself.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".partial");
        self.path.with_file_name(name)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl std::fmt::Debug for EncryptedFileSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileSessionStore")
            .field("path", &self.path)
            .field("kdf_params", &self.kdf_params)
            .finish()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SessionStore for EncryptedFileSessionStore {
    fn load(&self) -> Result<Option<SessionRecord>, ClientError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        open_record(&bytes, &self.passphrase).map(Some)
    }

    fn save(&self, record: &SessionRecord) -> Result<(), ClientError> {
        let bytes = seal_record(record, &self.passphrase, &self.kdf_params)?;
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.temp_path();
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
