use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ticker::Ticker;
use crate::errors::ClientError;

/// Kind of holding update sent to `/update_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    /// Buy more shares of a ticker (creates the holding if absent)
    Add,
    /// Drop the holding entirely; quantity is ignored
    Remove,
    /// Set the held quantity to an exact value
    Modify,
}

impl MutationAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Add => "add",
            MutationAction::Remove => "remove",
            MutationAction::Modify => "modify",
        }
    }
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated holding update.
///
/// `add` and `modify` require a quantity of at least one share;
/// `remove` always carries zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    action: MutationAction,
    ticker: Ticker,
    quantity: u64,
}

impl MutationRequest {
    pub fn add(ticker: Ticker, quantity: u64) -> Result<Self, ClientError> {
        Self::with_quantity(MutationAction::Add, ticker, quantity)
    }

    pub fn modify(ticker: Ticker, quantity: u64) -> Result<Self, ClientError> {
        Self::with_quantity(MutationAction::Modify, ticker, quantity)
    }

    pub fn remove(ticker: Ticker) -> Self {
        Self {
            action: MutationAction::Remove,
            ticker,
            quantity: 0,
        }
    }

    /// Build a request for any action; `quantity` is ignored for `Remove`.
    pub fn new(action: MutationAction, ticker: Ticker, quantity: u64) -> Result<Self, ClientError> {
        match action {
            MutationAction::Remove => Ok(Self::remove(ticker)),
            MutationAction::Add | MutationAction::Modify => {
                Self::with_quantity(action, ticker, quantity)
            }
        }
    }

    fn with_quantity(
        action: MutationAction,
        ticker: Ticker,
        quantity: u64,
    ) -> Result<Self, ClientError> {
        if quantity == 0 {
            return Err(ClientError::InvalidQuantity(format!(
                "{action} requires a positive quantity, got 0"
            )));
        }
        Ok(Self {
            action,
            ticker,
            quantity,
        })
    }

    #[must_use]
    pub fn action(&self) -> MutationAction {
        self.action
    }

    #[must_use]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    #[must_use]
    pub fn quantity(&self) -> u64 {
        self.quantity
    }
}

/// Parse a quantity typed by the user.
///
/// Fractions are truncated ("3.7" → 3). Anything that is not a number,
/// or that truncates to zero or below, is rejected.
pub fn parse_quantity(input: &str) -> Result<u64, ClientError> {
    let trimmed = input.trim();
    let value: Decimal = trimmed.parse().map_err(|_| {
        ClientError::InvalidQuantity(format!(
            "'{trimmed}' is not a number. Please enter a positive integer"
        ))
    })?;
    let whole = value.trunc();
    if whole <= Decimal::ZERO {
        return Err(ClientError::InvalidQuantity(format!(
            "'{trimmed}' is not a positive quantity. Please enter a positive integer"
        )));
    }
    whole.to_u64().ok_or_else(|| {
        ClientError::InvalidQuantity(format!("'{trimmed}' is too large"))
    })
}
