use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ticker::Ticker;

/// Largest difference tolerated between a reported and an expected value.
/// The backend rounds totals to cents.
#[must_use]
pub fn value_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// A single ticker's owned quantity and valuation, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: Ticker,
    pub quantity: u64,
    /// Latest closing price per share.
    pub latest_price: Decimal,
    /// Server-computed `quantity * latest_price`. Never re-derived locally.
    pub total_value: Decimal,
}

impl Holding {
    /// What `total_value` should be, given quantity and price.
    #[must_use]
    pub fn expected_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.latest_price
    }

    /// Whether the reported total matches quantity × price (within a cent).
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        (self.expected_value() - self.total_value).abs() <= value_tolerance()
    }
}

/// A data-quality signal found in a fetched portfolio.
///
/// These are informational: the snapshot is still stored and displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    HoldingValueMismatch {
        ticker: Ticker,
        expected: Decimal,
        reported: Decimal,
    },
    TotalMismatch {
        expected: Decimal,
        reported: Decimal,
    },
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityIssue::HoldingValueMismatch {
                ticker,
                expected,
                reported,
            } => write!(
                f,
                "{ticker}: reported value {reported} differs from quantity × price {expected}"
            ),
            QualityIssue::TotalMismatch { expected, reported } => write!(
                f,
                "portfolio total {reported} differs from sum of holdings {expected}"
            ),
        }
    }
}

/// The last server snapshot of a user's holdings.
///
/// Replaced wholesale on every successful fetch; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    holdings: BTreeMap<Ticker, Holding>,
    total_value: Decimal,
}

impl Portfolio {
    /// Build a snapshot. A ticker appearing twice keeps its last entry.
    pub fn new(holdings: impl IntoIterator<Item = Holding>, total_value: Decimal) -> Self {
        let holdings = holdings
            .into_iter()
            .map(|h| (h.ticker.clone(), h))
            .collect();
        Self {
            holdings,
            total_value,
        }
    }

    /// Server-reported aggregate value.
    #[must_use]
    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    /// Sum of the per-holding totals as reported by the server.
    #[must_use]
    pub fn holdings_total(&self) -> Decimal {
        self.holdings.values().map(|h| h.total_value).sum()
    }

    #[must_use]
    pub fn holding(&self, ticker: &Ticker) -> Option<&Holding> {
        self.holdings.get(ticker)
    }

    #[must_use]
    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.holdings.contains_key(ticker)
    }

    /// Holdings in ticker order.
    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values()
    }

    /// Held tickers, sorted.
    #[must_use]
    pub fn tickers(&self) -> Vec<&Ticker> {
        self.holdings.keys().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Mismatches between reported and expected values.
    #[must_use]
    pub fn quality_issues(&self) -> Vec<QualityIssue> {
        let mut issues: Vec<QualityIssue> = self
            .holdings
            .values()
            .filter(|h| !h.is_consistent())
            .map(|h| QualityIssue::HoldingValueMismatch {
                ticker: h.ticker.clone(),
                expected: h.expected_value(),
                reported: h.total_value,
            })
            .collect();

        let expected = self.holdings_total();
        if (expected - self.total_value).abs() > value_tolerance() {
            issues.push(QualityIssue::TotalMismatch {
                expected,
                reported: self.total_value,
            });
        }
        issues
    }
}
