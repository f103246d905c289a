use serde::{Deserialize, Serialize};

use super::query::{EffectiveQuery, HistoryOutcome};
use super::ticker::Ticker;

/// How the history view renders the series. Orthogonal to the selection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    #[default]
    Table,
    Graph,
}

/// Where the history view is in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    /// No ticker selected (history view closed).
    #[default]
    Idle,
    /// Ticker chosen, no data yet or a fetch is pending.
    Selected { ticker: Ticker },
    /// Data present for the selected ticker.
    Ready {
        ticker: Ticker,
        outcome: HistoryOutcome,
    },
    /// The last fetch for the selected ticker failed.
    Error { ticker: Ticker, message: String },
}

impl SelectionState {
    /// The selected ticker, if any.
    #[must_use]
    pub fn ticker(&self) -> Option<&Ticker> {
        match self {
            SelectionState::Idle => None,
            SelectionState::Selected { ticker }
            | SelectionState::Ready { ticker, .. }
            | SelectionState::Error { ticker, .. } => Some(ticker),
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, SelectionState::Idle)
    }

    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        matches!(self, SelectionState::Selected { .. })
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, SelectionState::Ready { .. })
    }
}

/// Identifies one outstanding history request.
///
/// A result is applied only if its tag still matches the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTag {
    pub generation: u64,
    pub query: EffectiveQuery,
}

/// Whether a completed request changed the visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Superseded by a newer selection, timeframe change, close or logout.
    Discarded,
}
