use crate::backend::traits::PortfolioBackend;
use crate::errors::ClientError;
use crate::models::mutation::MutationRequest;
use crate::models::portfolio::Portfolio;
use crate::models::selection::Applied;
use crate::models::session::Credential;
use crate::services::session_service::SessionManager;

/// Everything needed to run one portfolio fetch outside the store's borrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    pub epoch: u64,
    pub username: String,
    pub credential: Credential,
}

/// Result of a mutation: the server's confirmation, plus the outcome of
/// the follow-up refresh.
#[derive(Debug)]
pub struct MutationOutcome {
    pub message: String,
    /// Set when the mutation succeeded but the refresh afterwards did not.
    pub refresh_error: Option<ClientError>,
}

/// Client-side copy of the logged-in user's holdings.
///
/// The snapshot is only ever replaced wholesale by a successful fetch.
/// It is never patched locally after a mutation.
#[derive(Debug, Default)]
pub struct PortfolioStore {
    portfolio: Portfolio,
}

impl PortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Drop the snapshot (logout, session expiry).
    pub fn clear(&mut self) {
        self.portfolio = Portfolio::default();
    }

    /// Capture what a refresh needs. `None` when nobody is logged in,
    /// in which case a refresh is a no-op.
    #[must_use]
    pub fn begin_refresh(&self, session: &SessionManager) -> Option<RefreshTicket> {
        let current = session.current()?;
        Some(RefreshTicket {
            epoch: session.epoch(),
            username: current.username().to_string(),
            credential: current.credential().clone(),
        })
    }

    /// Apply a completed fetch.
    ///
    /// Results from an earlier session are dropped. Among overlapping
    /// refreshes of the same session, whichever completes last wins.
    /// A failed fetch leaves the previous snapshot in place.
    pub fn apply_refresh(
        &mut self,
        ticket: &RefreshTicket,
        current_epoch: u64,
        result: Result<Portfolio, ClientError>,
    ) -> Result<Applied, ClientError> {
        if ticket.epoch != current_epoch {
            tracing::debug!(
                username = %ticket.username,
                issued = ticket.epoch,
                current = current_epoch,
                "Discarding portfolio from a previous session"
            );
            return Ok(Applied::Discarded);
        }

        let portfolio = result?;
        for issue in portfolio.quality_issues() {
            tracing::warn!(username = %ticket.username, %issue, "Portfolio data inconsistency");
        }
        tracing::debug!(
            username = %ticket.username,
            holdings = portfolio.len(),
            total = %portfolio.total_value(),
            "Portfolio refreshed"
        );
        self.portfolio = portfolio;
        Ok(Applied::Applied)
    }

    /// Fetch and apply in one step. Returns immediately when logged out.
    pub async fn refresh(
        &mut self,
        backend: &dyn PortfolioBackend,
        session: &SessionManager,
    ) -> Result<&Portfolio, ClientError> {
        let Some(ticket) = self.begin_refresh(session) else {
            return Ok(&self.portfolio);
        };
        let result = backend
            .fetch_portfolio(&ticket.credential, &ticket.username)
            .await;
        self.apply_refresh(&ticket, session.epoch(), result)?;
        Ok(&self.portfolio)
    }

    /// Send a mutation, then refresh to pick up the authoritative state.
    ///
    /// The refresh only starts after the server acknowledged the
    /// mutation; a rejected mutation leaves the snapshot untouched.
    pub async fn mutate(
        &mut self,
        backend: &dyn PortfolioBackend,
        session: &SessionManager,
        request: MutationRequest,
    ) -> Result<MutationOutcome, ClientError> {
        let current = session.require()?;
        let message = match backend
            .update_holding(current.credential(), current.username(), &request)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    action = %request.action(),
                    ticker = %request.ticker(),
                    error = %e,
                    "Portfolio update failed"
                );
                return Err(e);
            }
        };
        tracing::info!(
            action = %request.action(),
            ticker = %request.ticker(),
            quantity = request.quantity(),
            "Portfolio updated"
        );

        let refresh_error = self.refresh(backend, session).await.err();
        if let Some(e) = &refresh_error {
            tracing::warn!(error = %e, "Refresh after update failed");
        }
        Ok(MutationOutcome {
            message,
            refresh_error,
        })
    }
}
