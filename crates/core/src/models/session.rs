use serde::{Deserialize, Serialize};

use crate::errors::ClientError;

/// Proof of an authenticated identity attached to every authorised request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Token returned by `/login`, sent as `Authorization: Bearer <token>`.
    Bearer(String),
    /// Session cookie pairs from `/login` (`name=value; ...`), sent as a
    /// `Cookie` header. Empty when the browser holds the cookie (wasm32).
    Cookie(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credential::Cookie(_) => f.write_str("Cookie(<redacted>)"),
        }
    }
}

impl Credential {
    /// The bearer token, if this credential carries one.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Credential::Bearer(token) => Some(token),
            Credential::Cookie(_) => None,
        }
    }

    /// The `Cookie` header value, if this is a cookie session.
    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        match self {
            Credential::Bearer(_) => None,
            Credential::Cookie(cookie) => Some(cookie),
        }
    }
}

/// An established login. Only constructible with a non-empty username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    credential: Credential,
}

impl Session {
    pub fn new(username: impl Into<String>, credential: Credential) -> Result<Self, ClientError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(ClientError::InvalidCredentials(
                "Username must not be empty".into(),
            ));
        }
        Ok(Self {
            username,
            credential,
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Snapshot suitable for persisting across restarts.
    #[must_use]
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            username: self.username.clone(),
            token: self.credential.token().map(str::to_string),
            cookie: self.credential.cookie().map(str::to_string),
        }
    }

    /// Rebuild a session from a persisted record.
    ///
    /// A record with neither a token nor a cookie cannot authorise anything
    /// and is rejected.
    pub fn from_record(record: SessionRecord) -> Result<Self, ClientError> {
        let token = record.token.filter(|t| !t.trim().is_empty());
        let credential = match (token, record.cookie) {
            (Some(token), _) => Credential::Bearer(token),
            (None, Some(cookie)) => Credential::Cookie(cookie),
            (None, None) => {
                return Err(ClientError::Deserialization(
                    "Persisted session has no credential".into(),
                ));
            }
        };
        Self::new(record.username, credential)
    }
}

/// Persisted form of a [`Session`], written by a `SessionStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub cookie: Option<String>,
}
