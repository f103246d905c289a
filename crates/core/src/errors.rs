use chrono::NaiveDate;
use thiserror::Error;

/// Generic message shown when a fetch fails without a usable server message.
pub const GENERIC_FETCH_FAILURE: &str = "Failed to load data from the server.";

/// Generic message shown when login fails without a server message.
pub const GENERIC_LOGIN_FAILURE: &str = "Failed to log in.";

/// Unified error type for the entire portfolio-client-core library.
/// Every public function returns `Result<T, ClientError>`.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Authentication ──────────────────────────────────────────────
    #[error("Login failed: {0}")]
    InvalidCredentials(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Not logged in")]
    NotLoggedIn,

    // ── API / Network ───────────────────────────────────────────────
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    // ── Validation (rejected before dispatch) ───────────────────────
    #[error("Start date {start} is after end date {end}; range is invalid")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid ticker: '{0}'")]
    InvalidTicker(String),

    #[error("Invalid day count: {0} (must be at least 1)")]
    InvalidDayCount(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No ticker selected")]
    NoSelection,

    // ── Mutation ────────────────────────────────────────────────────
    #[error("Update rejected: {0}")]
    MutationRejected(String),

    // ── Session storage ─────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: wrong passphrase or corrupted file")]
    Decryption,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),
}

/// Coarse error category, one per user-facing failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Auth,
    Fetch,
    Validation,
    Mutation,
    Storage,
}

impl ClientError {
    /// Which failure family this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::InvalidCredentials(_)
            | ClientError::SessionExpired(_)
            | ClientError::NotLoggedIn => ErrorKind::Auth,
            ClientError::Network(_)
            | ClientError::Api { .. }
            | ClientError::MalformedPayload(_) => ErrorKind::Fetch,
            ClientError::InvalidRange { .. }
            | ClientError::InvalidQuantity(_)
            | ClientError::InvalidTicker(_)
            | ClientError::InvalidDayCount(_)
            | ClientError::InvalidConfig(_)
            | ClientError::NoSelection => ErrorKind::Validation,
            ClientError::MutationRejected(_) => ErrorKind::Mutation,
            ClientError::InvalidFileFormat(_)
            | ClientError::UnsupportedVersion(_)
            | ClientError::Encryption(_)
            | ClientError::Decryption
            | ClientError::Serialization(_)
            | ClientError::Deserialization(_)
            | ClientError::FileIO(_) => ErrorKind::Storage,
        }
    }

    /// The single message shown to the user.
    ///
    /// Server-supplied messages are passed through verbatim; everything
    /// else falls back to the `Display` text or a generic reason.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            ClientError::InvalidCredentials(msg)
            | ClientError::SessionExpired(msg)
            | ClientError::MutationRejected(msg)
                if !msg.is_empty() =>
            {
                msg.clone()
            }
            ClientError::InvalidCredentials(_) => GENERIC_LOGIN_FAILURE.to_string(),
            ClientError::Api { message, .. } if !message.is_empty() => message.clone(),
            ClientError::Api { .. }
            | ClientError::Network(_)
            | ClientError::MalformedPayload(_) => GENERIC_FETCH_FAILURE.to_string(),
            other => other.to_string(),
        }
    }

    /// True when the server signalled that the credential is no longer valid.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired(_))
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for ClientError {
    fn from(e: bincode::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::MalformedPayload(e.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        // Query strings carry the username; keep them out of surfaced errors.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        ClientError::Network(sanitized)
    }
}

impl From<aes_gcm::Error> for ClientError {
    fn from(_: aes_gcm::Error) -> Self {
        ClientError::Decryption
    }
}
