//! JSON payloads exchanged with the backend, and their conversion into models.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::ClientError;
use crate::models::mutation::MutationRequest;
use crate::models::portfolio::{Holding, Portfolio};
use crate::models::price::PricePoint;
use crate::models::ticker::Ticker;

/// Date format of history keys.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpdateUserRequest<'a> {
    pub username: &'a str,
    pub action: &'static str,
    pub stock: &'a str,
    pub quantity: u64,
}

impl<'a> UpdateUserRequest<'a> {
    pub fn new(username: &'a str, request: &'a MutationRequest) -> Self {
        Self {
            username,
            action: request.action().as_str(),
            stock: request.ticker().as_str(),
            quantity: request.quantity(),
        }
    }
}

// ── Responses ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// `{message}` body of confirmations and errors. Older backends say `error`.
#[derive(Debug, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl MessageResponse {
    /// Non-blank message, if any.
    pub fn into_message(self) -> Option<String> {
        self.message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

/// A number that may arrive as a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Number(serde_json::Number),
    Text(String),
}

impl WireNumber {
    pub fn to_decimal(&self) -> Result<Decimal, ClientError> {
        let text = match self {
            WireNumber::Number(n) => n.to_string(),
            WireNumber::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|_| ClientError::MalformedPayload(format!("'{text}' is not a valid number")))
    }

    /// A whole, non-negative share count.
    pub fn to_quantity(&self) -> Result<u64, ClientError> {
        let value = self.to_decimal()?;
        if value.is_sign_negative() || !value.fract().is_zero() {
            return Err(ClientError::MalformedPayload(format!(
                "quantity {value} is not a non-negative integer"
            )));
        }
        value
            .to_u64()
            .ok_or_else(|| ClientError::MalformedPayload(format!("quantity {value} out of range")))
    }
}

#[derive(Debug, Deserialize)]
pub struct HoldingResponse {
    #[serde(alias = "amount_owned")]
    pub quantity: WireNumber,
    #[serde(alias = "latest_closing_price")]
    pub price: WireNumber,
    #[serde(default)]
    pub price_total: Option<WireNumber>,
}

#[derive(Debug, Deserialize)]
pub struct PortfolioResponse {
    #[serde(default)]
    pub stocks_owned: HashMap<String, HoldingResponse>,
    pub total_value: WireNumber,
}

// ── Conversion ──────────────────────────────────────────────────────

impl HoldingResponse {
    pub fn into_holding(self, ticker: &str) -> Result<Holding, ClientError> {
        let ticker = Ticker::parse(ticker)
            .map_err(|_| ClientError::MalformedPayload(format!("invalid ticker key '{ticker}'")))?;
        let quantity = self.quantity.to_quantity()?;
        let latest_price = self.price.to_decimal()?;
        let total_value = match self.price_total {
            Some(total) => total.to_decimal()?,
            None => {
                tracing::debug!(%ticker, "price_total missing, using quantity * price");
                Decimal::from(quantity) * latest_price
            }
        };
        Ok(Holding {
            ticker,
            quantity,
            latest_price,
            total_value,
        })
    }
}

impl PortfolioResponse {
    pub fn into_portfolio(self) -> Result<Portfolio, ClientError> {
        let total_value = self.total_value.to_decimal()?;
        let holdings = self
            .stocks_owned
            .into_iter()
            .map(|(ticker, h)| h.into_holding(&ticker))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Portfolio::new(holdings, total_value))
    }
}

/// Parse a portfolio body.
///
/// A body carrying only an `error`/`message` string is a server error.
pub fn parse_portfolio(body: &str) -> Result<Portfolio, ClientError> {
    if let Some(err) = error_only_body(body) {
        return Err(err);
    }
    let resp: PortfolioResponse = serde_json::from_str(body).map_err(|e| {
        ClientError::MalformedPayload(format!("Failed to parse portfolio: {e}"))
    })?;
    resp.into_portfolio()
}

/// Parse a `{date: price}` history body into unordered points.
///
/// `{}` yields no points. A body carrying only an `error`/`message` string
/// is a server error, even behind a success status.
pub fn parse_history(body: &str) -> Result<Vec<PricePoint>, ClientError> {
    let map: HashMap<String, serde_json::Value> = serde_json::from_str(body).map_err(|e| {
        ClientError::MalformedPayload(format!("Failed to parse price history: {e}"))
    })?;

    if let Some(err) = error_from_fields(&map) {
        return Err(err);
    }

    map.into_iter()
        .map(|(date, value)| {
            let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|_| {
                ClientError::MalformedPayload(format!("'{date}' is not a YYYY-MM-DD date"))
            })?;
            let number: WireNumber = serde_json::from_value(value).map_err(|_| {
                ClientError::MalformedPayload(format!("price for {date} is not a number"))
            })?;
            Ok(PricePoint::new(date, number.to_decimal()?))
        })
        .collect()
}

/// Some endpoints answer 200 with `{"error": "..."}`.
fn error_only_body(body: &str) -> Option<ClientError> {
    let map: HashMap<String, serde_json::Value> = serde_json::from_str(body).ok()?;
    error_from_fields(&map)
}

fn error_from_fields(map: &HashMap<String, serde_json::Value>) -> Option<ClientError> {
    if map.len() != 1 {
        return None;
    }
    ["error", "message"].into_iter().find_map(|key| match map.get(key) {
        Some(serde_json::Value::String(message)) => Some(ClientError::Api {
            status: 200,
            message: message.clone(),
        }),
        _ => None,
    })
}

/// Server message from an error body, if it carries one.
pub fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<MessageResponse>(body)
        .ok()
        .and_then(MessageResponse::into_message)
}
