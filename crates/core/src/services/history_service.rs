use chrono::{Months, NaiveDate, Utc};

use crate::backend::traits::PortfolioBackend;
use crate::errors::ClientError;
use crate::models::price::{PriceHistorySeries, PricePoint};
use crate::models::query::{EffectiveQuery, HistoryOutcome, Timeframe};
use crate::models::session::Credential;
use crate::models::ticker::Ticker;

/// Turns a user-chosen timeframe into a concrete query, and a raw fetch
/// into a normalized outcome.
///
/// Resolution is pure apart from reading today's date, and
/// `resolve_at` takes that date explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryResolver {
    default_months: u32,
}

impl Default for HistoryResolver {
    fn default() -> Self {
        Self { default_months: 1 }
    }
}

impl HistoryResolver {
    /// `default_months` is how far back a blank start date reaches.
    pub fn new(default_months: u32) -> Self {
        Self {
            default_months: default_months.max(1),
        }
    }

    #[must_use]
    pub fn default_months(&self) -> u32 {
        self.default_months
    }

    /// Resolve against today's UTC date.
    pub fn resolve(&self, ticker: &Ticker, timeframe: &Timeframe) -> Result<EffectiveQuery, ClientError> {
        self.resolve_at(ticker, timeframe, Utc::now().date_naive())
    }

    /// Resolve against an explicit "today".
    ///
    /// A blank end date becomes `today`; a blank start date becomes
    /// `today` minus the default window (clamped to month end). Bounds
    /// default independently, and validation runs on the result.
    pub fn resolve_at(
        &self,
        ticker: &Ticker,
        timeframe: &Timeframe,
        today: NaiveDate,
    ) -> Result<EffectiveQuery, ClientError> {
        match timeframe {
            Timeframe::Days(0) => Err(ClientError::InvalidDayCount(0)),
            Timeframe::Days(days) => Ok(EffectiveQuery::Trailing {
                ticker: ticker.clone(),
                days: *days,
            }),
            Timeframe::Range(range) => {
                let end = range.end.unwrap_or(today);
                let start = match range.start {
                    Some(start) => start,
                    None => self.default_start(today)?,
                };
                if start > end {
                    return Err(ClientError::InvalidRange { start, end });
                }
                Ok(EffectiveQuery::DateRange {
                    ticker: ticker.clone(),
                    start,
                    end,
                })
            }
        }
    }

    fn default_start(&self, today: NaiveDate) -> Result<NaiveDate, ClientError> {
        today
            .checked_sub_months(Months::new(self.default_months))
            .ok_or_else(|| {
                ClientError::InvalidConfig(format!(
                    "{} months before {today} is out of range",
                    self.default_months
                ))
            })
    }

    /// Fetch the points for `query` and normalize them.
    pub async fn fetch(
        &self,
        backend: &dyn PortfolioBackend,
        credential: &Credential,
        query: &EffectiveQuery,
    ) -> Result<HistoryOutcome, ClientError> {
        tracing::debug!(%query, backend = backend.name(), "Fetching price history");
        let points = backend.fetch_history(credential, query).await?;
        Ok(Self::normalize(query, points))
    }

    /// Empty means "no data", which is a successful outcome. Anything
    /// else becomes a deduplicated series, most recent first.
    pub fn normalize(query: &EffectiveQuery, points: Vec<PricePoint>) -> HistoryOutcome {
        if points.is_empty() {
            return HistoryOutcome::NoData {
                query: query.clone(),
            };
        }
        HistoryOutcome::Series(PriceHistorySeries::from_points(query.ticker().clone(), points))
    }
}
