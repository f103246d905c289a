use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::price::PriceHistorySeries;
use super::ticker::Ticker;

/// Message reported when a valid query returns zero points.
pub const NO_DATA_MESSAGE: &str = "No data available for the selected date range.";

/// A user-entered date window. Either bound may be left blank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// What the history view is asked to show: an explicit window or the last N days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Range(DateRange),
    Days(u32),
}

impl Timeframe {
    /// Day-count buttons offered by the history view.
    pub const PRESETS: [u32; 3] = [7, 14, 30];

    pub fn last_days(days: u32) -> Self {
        Timeframe::Days(days)
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Timeframe::Range(DateRange::between(start, end))
    }
}

impl Default for Timeframe {
    /// Both bounds blank: resolves to the default one-month window.
    fn default() -> Self {
        Timeframe::Range(DateRange::default())
    }
}

/// A fully-resolved history request, ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EffectiveQuery {
    /// `/api/portfolio/{ticker}?start_date=&end_date=`
    DateRange {
        ticker: Ticker,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// `/api/portfolio/{ticker}/{days}`; the server picks the window.
    Trailing { ticker: Ticker, days: u32 },
}

impl EffectiveQuery {
    #[must_use]
    pub fn ticker(&self) -> &Ticker {
        match self {
            EffectiveQuery::DateRange { ticker, .. } | EffectiveQuery::Trailing { ticker, .. } => {
                ticker
            }
        }
    }
}

impl std::fmt::Display for EffectiveQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectiveQuery::DateRange { ticker, start, end } => {
                write!(f, "{ticker} {start}..{end}")
            }
            EffectiveQuery::Trailing { ticker, days } => write!(f, "{ticker} last {days} days"),
        }
    }
}

/// Result of a successful history fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    Series(PriceHistorySeries),
    /// The ticker is valid but nothing was recorded in the window.
    NoData { query: EffectiveQuery },
}

impl HistoryOutcome {
    #[must_use]
    pub fn series(&self) -> Option<&PriceHistorySeries> {
        match self {
            HistoryOutcome::Series(series) => Some(series),
            HistoryOutcome::NoData { .. } => None,
        }
    }

    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, HistoryOutcome::NoData { .. })
    }

    /// Text to show in place of the series, if any.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match self {
            HistoryOutcome::Series(_) => None,
            HistoryOutcome::NoData { .. } => Some(NO_DATA_MESSAGE),
        }
    }
}
