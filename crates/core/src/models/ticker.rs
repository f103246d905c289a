use serde::{Deserialize, Serialize};

use crate::errors::ClientError;

/// Stock symbol identifying a holding (e.g. "AAPL", "GOOG").
///
/// Always trimmed and uppercased on construction, so equality and hashing
/// are case-insensitive with respect to user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Normalize and validate a ticker symbol.
    ///
    /// Rejects empty input and characters that cannot appear in a symbol
    /// (anything other than ASCII alphanumerics, `.`, `-` and `^`).
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ClientError::InvalidTicker(raw.to_string()));
        }
        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
        {
            return Err(ClientError::InvalidTicker(raw.to_string()));
        }
        Ok(Self(symbol))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Ticker {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Ticker {
    type Error = ClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
