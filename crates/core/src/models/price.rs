use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ticker::Ticker;

/// A single closing price (date → price).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: Decimal,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: Decimal) -> Self {
        Self { date, price }
    }
}

/// Closing prices for one ticker, most recent first.
///
/// The only way to build a series is [`PriceHistorySeries::from_points`],
/// which fixes the order, so consumers can rely on it without re-sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistorySeries {
    ticker: Ticker,
    points: Vec<PricePoint>,
}

impl PriceHistorySeries {
    /// Normalize backend points: one entry per date (later duplicates win),
    /// sorted by date descending.
    pub fn from_points(ticker: Ticker, points: impl IntoIterator<Item = PricePoint>) -> Self {
        let by_date: BTreeMap<NaiveDate, Decimal> =
            points.into_iter().map(|p| (p.date, p.price)).collect();
        let points = by_date
            .into_iter()
            .rev()
            .map(|(date, price)| PricePoint { date, price })
            .collect();
        Self { ticker, points }
    }

    #[must_use]
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Points, most recent first.
    #[must_use]
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent close.
    #[must_use]
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    /// Earliest close in the window.
    #[must_use]
    pub fn oldest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Points in chronological order, for plotting left to right.
    #[must_use]
    pub fn chart_points(&self) -> Vec<&PricePoint> {
        self.points.iter().rev().collect()
    }
}
