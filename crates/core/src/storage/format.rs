use super::encryption::{KdfParams, NONCE_LEN, SALT_LEN};
use crate::errors::ClientError;

/// Magic bytes identifying a persisted session file.
pub const MAGIC: &[u8; 4] = b"PFSN";

/// Current session file version.
pub const CURRENT_VERSION: u16 = 1;

/// magic(4) + version(2) + kdf(12) + salt(16) + nonce(12) + ciphertext_len(4)
pub const HEADER_SIZE: usize = 4 + 2 + 12 + SALT_LEN + NONCE_LEN + 4;

/// A session record is a username and a token; anything bigger is not ours.
pub const MAX_CIPHERTEXT_LEN: u32 = 64 * 1024;

/// Parsed header of a session file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFileHeader {
    pub version: u16,
    pub kdf_params: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
}

/// Serialize header and ciphertext.
///
/// ```text
/// [PFSN] [version u16 LE] [memory u32 LE] [time u32 LE] [lanes u32 LE]
/// [salt 16B] [nonce 12B] [ciphertext_len u32 LE] [ciphertext]
/// ```
pub fn write_file(header: &SessionFileHeader, ciphertext: &[u8]) -> Result<Vec<u8>, ClientError> {
    let len = u32::try_from(ciphertext.len())
        .ok()
        .filter(|len| *len <= MAX_CIPHERTEXT_LEN)
        .ok_or_else(|| {
            ClientError::Serialization(format!(
                "Session ciphertext of {} bytes exceeds {MAX_CIPHERTEXT_LEN}",
                ciphertext.len()
            ))
        })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&header.version.to_le_bytes());
    buf.extend_from_slice(&header.kdf_params.memory_cost.to_le_bytes());
    buf.extend_from_slice(&header.kdf_params.time_cost.to_le_bytes());
    buf.extend_from_slice(&header.kdf_params.parallelism.to_le_bytes());
    buf.extend_from_slice(&header.salt);
    buf.extend_from_slice(&header.nonce);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(ciphertext);
    Ok(buf)
}

/// Sequential reader over the raw file bytes.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self, field: &str) -> Result<[u8; N], ClientError> {
        let end = self.offset + N;
        let bytes: [u8; N] = self
            .data
            .get(self.offset..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ClientError::InvalidFileFormat(format!("Truncated while reading {field}")))?;
        self.offset = end;
        Ok(bytes)
    }

    fn u16(&mut self, field: &str) -> Result<u16, ClientError> {
        Ok(u16::from_le_bytes(self.take(field)?))
    }

    fn u32(&mut self, field: &str) -> Result<u32, ClientError> {
        Ok(u32::from_le_bytes(self.take(field)?))
    }
}

/// Parse a session file into its header and ciphertext.
///
/// KDF costs are bounded so a crafted file cannot make the client allocate
/// gigabytes or spin for minutes before failing decryption.
pub fn read_file(data: &[u8]) -> Result<(SessionFileHeader, &[u8]), ClientError> {
    if data.len() < HEADER_SIZE {
        return Err(ClientError::InvalidFileFormat(
            "File too small to be a session file".into(),
        ));
    }
    let mut reader = Reader { data, offset: 0 };

    if &reader.take::<4>("magic")? != MAGIC {
        return Err(ClientError::InvalidFileFormat(
            "Invalid magic bytes, not a session file".into(),
        ));
    }

    let version = reader.u16("version")?;
    if version == 0 || version > CURRENT_VERSION {
        return Err(ClientError::UnsupportedVersion(version));
    }

    let kdf_params = KdfParams {
        memory_cost: reader.u32("memory_cost")?,
        time_cost: reader.u32("time_cost")?,
        parallelism: reader.u32("parallelism")?,
    };
    if !(8..=262_144).contains(&kdf_params.memory_cost) {
        return Err(ClientError::InvalidFileFormat(format!(
            "KDF memory_cost out of range: {} KiB",
            kdf_params.memory_cost
        )));
    }
    if !(1..=10).contains(&kdf_params.time_cost) {
        return Err(ClientError::InvalidFileFormat(format!(
            "KDF time_cost out of range: {}",
            kdf_params.time_cost
        )));
    }
    if !(1..=8).contains(&kdf_params.parallelism) {
        return Err(ClientError::InvalidFileFormat(format!(
            "KDF parallelism out of range: {}",
            kdf_params.parallelism
        )));
    }

    let salt = reader.take::<SALT_LEN>("salt")?;
    let nonce = reader.take::<NONCE_LEN>("nonce")?;
    let len = reader.u32("ciphertext length")?;
    if len > MAX_CIPHERTEXT_LEN {
        return Err(ClientError::InvalidFileFormat(format!(
            "Ciphertext length {len} exceeds {MAX_CIPHERTEXT_LEN}"
        )));
    }

    let start = reader.offset;
    let ciphertext = data.get(start..start + len as usize).ok_or_else(|| {
        ClientError::InvalidFileFormat(format!(
            "File truncated: expected {len} bytes of ciphertext, got {}",
            data.len() - start
        ))
    })?;

    Ok((
        SessionFileHeader {
            version,
            kdf_params,
            salt,
            nonce,
        },
        ciphertext,
    ))
}
