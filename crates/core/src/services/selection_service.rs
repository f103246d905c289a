use crate::errors::ClientError;
use crate::models::query::{EffectiveQuery, HistoryOutcome, Timeframe};
use crate::models::selection::{Applied, DisplayMode, RequestTag, SelectionState};
use crate::models::ticker::Ticker;

/// The history view's state machine.
///
/// Every change that makes an outstanding request irrelevant (new ticker,
/// new timeframe, close) bumps `generation`. A completion is applied only
/// when its tag carries the current generation, so whatever the user asked
/// for last is what ends up visible, regardless of response order.
#[derive(Debug, Default)]
pub struct SelectionMachine {
    state: SelectionState,
    timeframe: Option<Timeframe>,
    display_mode: DisplayMode,
    generation: u64,
    pending: Option<RequestTag>,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    #[must_use]
    pub fn ticker(&self) -> Option<&Ticker> {
        self.state.ticker()
    }

    /// The last timeframe asked for. Kept across ticker switches.
    #[must_use]
    pub fn timeframe(&self) -> Option<&Timeframe> {
        self.timeframe.as_ref()
    }

    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The request whose result would currently be applied.
    #[must_use]
    pub fn pending(&self) -> Option<&RequestTag> {
        self.pending.as_ref()
    }

    /// History to show. Only present in `Ready`, so a previous ticker's
    /// series is never visible under a new selection.
    #[must_use]
    pub fn visible_outcome(&self) -> Option<&HistoryOutcome> {
        match &self.state {
            SelectionState::Ready { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    /// Choose a ticker. Re-selecting the current one changes nothing.
    ///
    /// Returns `true` when the selection changed.
    pub fn select(&mut self, ticker: Ticker) -> bool {
        if self.state.ticker() == Some(&ticker) {
            return false;
        }
        tracing::debug!(%ticker, "Ticker selected");
        self.invalidate();
        self.state = SelectionState::Selected { ticker };
        true
    }

    /// Record a new timeframe for the selected ticker.
    ///
    /// Clears any visible history; the next fetch fills it again.
    pub fn set_timeframe(&mut self, timeframe: Timeframe) -> Result<&Ticker, ClientError> {
        let ticker = self.state.ticker().cloned().ok_or(ClientError::NoSelection)?;
        self.invalidate();
        self.timeframe = Some(timeframe);
        self.state = SelectionState::Selected { ticker };
        self.state.ticker().ok_or(ClientError::NoSelection)
    }

    /// Register `query` as the one outstanding request and return its tag.
    pub fn begin_fetch(&mut self, query: EffectiveQuery) -> Result<RequestTag, ClientError> {
        let ticker = self.state.ticker().ok_or(ClientError::NoSelection)?;
        if query.ticker() != ticker {
            return Err(ClientError::InvalidTicker(query.ticker().to_string()));
        }
        self.generation += 1;
        let tag = RequestTag {
            generation: self.generation,
            query,
        };
        self.pending = Some(tag.clone());
        Ok(tag)
    }

    /// Apply a finished request, unless something newer superseded it.
    pub fn complete(
        &mut self,
        tag: &RequestTag,
        result: Result<HistoryOutcome, ClientError>,
    ) -> Applied {
        let current = self.state.ticker();
        if tag.generation != self.generation || current != Some(tag.query.ticker()) {
            tracing::debug!(
                query = %tag.query,
                generation = tag.generation,
                current = self.generation,
                "Discarding stale history response"
            );
            return Applied::Discarded;
        }

        let ticker = tag.query.ticker().clone();
        self.pending = None;
        self.state = match result {
            Ok(outcome) => SelectionState::Ready { ticker, outcome },
            Err(e) => {
                tracing::warn!(query = %tag.query, error = %e, "Price history fetch failed");
                SelectionState::Error {
                    ticker,
                    message: e.user_message(),
                }
            }
        };
        Applied::Applied
    }

    /// A request was rejected before dispatch (bad range, zero days).
    ///
    /// Anything still in flight for the old timeframe is invalidated too.
    pub fn fail(&mut self, error: &ClientError) -> Result<(), ClientError> {
        let ticker = self.state.ticker().cloned().ok_or(ClientError::NoSelection)?;
        self.invalidate();
        self.state = SelectionState::Error {
            ticker,
            message: error.user_message(),
        };
        Ok(())
    }

    /// Close the history view: no ticker, no timeframe, table mode.
    pub fn close(&mut self) {
        if !self.state.is_idle() {
            tracing::debug!("History view closed");
        }
        self.invalidate();
        self.state = SelectionState::Idle;
        self.timeframe = None;
        self.display_mode = DisplayMode::default();
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.pending = None;
    }
}
