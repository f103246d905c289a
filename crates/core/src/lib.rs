pub mod backend;
pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

use backend::{http::HttpBackend, traits::PortfolioBackend};
use models::{
    mutation::{MutationAction, MutationRequest},
    portfolio::Portfolio,
    price::PriceHistorySeries,
    query::{HistoryOutcome, Timeframe},
    selection::{Applied, DisplayMode, RequestTag, SelectionState},
    session::{Credential, Session},
    settings::Settings,
    ticker::Ticker,
};
use services::{
    history_service::HistoryResolver,
    portfolio_service::{PortfolioStore, RefreshTicket},
    selection_service::SelectionMachine,
    session_service::SessionManager,
};
use storage::manager::{MemorySessionStore, SessionStore};

use errors::ClientError;

/// A history fetch that has been resolved and registered but not yet sent.
///
/// Produced by [`PortfolioClient::prepare_history`]; its result goes back
/// through [`PortfolioClient::apply_history`], which drops it if the
/// selection or the session moved on in the meantime.
#[derive(Debug, Clone)]
pub struct PendingHistory {
    pub tag: RequestTag,
    pub epoch: u64,
    pub credential: Credential,
}

/// Main entry point for the portfolio client core library.
/// Owns the session, the portfolio snapshot and the history view state.
#[must_use]
pub struct PortfolioClient {
    backend: Box<dyn PortfolioBackend>,
    session: SessionManager,
    portfolio: PortfolioStore,
    resolver: HistoryResolver,
    selection: SelectionMachine,
    /// The single user-facing message for the most recent failure.
    last_error: Option<String>,
}

impl std::fmt::Debug for PortfolioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioClient")
            .field("backend", &self.backend.name())
            .field("username", &self.session.username())
            .field("holdings", &self.portfolio.portfolio().len())
            .field("selection", self.selection.state())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl PortfolioClient {
    /// HTTP backend, session kept in memory only.
    pub fn new(settings: Settings) -> Result<Self, ClientError> {
        let backend = HttpBackend::new(&settings)?;
        Ok(Self::with_backend(
            Box::new(backend),
            Box::new(MemorySessionStore::new()),
            &settings,
        ))
    }

    /// HTTP backend, session persisted encrypted at `settings.session_file`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_session_file(settings: Settings, passphrase: &str) -> Result<Self, ClientError> {
        let path = settings.session_file.clone().ok_or_else(|| {
            ClientError::InvalidConfig("session_file is not configured".into())
        })?;
        let backend = HttpBackend::new(&settings)?;
        let store = storage::manager::EncryptedFileSessionStore::new(path, passphrase);
        Ok(Self::with_backend(Box::new(backend), Box::new(store), &settings))
    }

    /// Any backend and session store. Tests use this with scripted backends.
    pub fn with_backend(
        backend: Box<dyn PortfolioBackend>,
        store: Box<dyn SessionStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            backend,
            session: SessionManager::new(store, settings.auth_scheme),
            portfolio: PortfolioStore::new(),
            resolver: HistoryResolver::new(settings.default_history_months),
            selection: SelectionMachine::new(),
            last_error: None,
        }
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Pick up a session saved by an earlier run and refresh the portfolio.
    ///
    /// Returns whether a session is active afterwards. An unreadable store
    /// is reported and leaves the client logged out. A restored session
    /// replaces whatever was shown before it.
    pub async fn resume(&mut self) -> Result<bool, ClientError> {
        let restored = match self.session.resume() {
            Ok(restored) => restored.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "Persisted session could not be restored");
                return Err(self.note_error(e));
            }
        };
        if restored {
            self.reset_views();
            // Other failures are recorded in `last_error`; the session is still valid.
            if let Err(e) = self.refresh_portfolio().await {
                if e.is_session_expired() {
                    return Err(e);
                }
            }
        }
        Ok(self.session.is_logged_in())
    }

    /// Log in, then load the portfolio.
    ///
    /// Logging in over an existing session starts from a clean slate. A
    /// failed login leaves everything as it was. Other refresh failures are
    /// left in [`last_error`](Self::last_error).
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Session, ClientError> {
        let was_logged_in = self.session.is_logged_in();
        let session = match self
            .session
            .login(self.backend.as_ref(), username, password)
            .await
        {
            Ok(session) => session.clone(),
            Err(e) => return Err(self.note_error(e)),
        };
        if was_logged_in {
            self.reset_views();
        }
        self.last_error = None;
        // A credential rejected straight away means the login did not stick.
        if let Err(e) = self.refresh_portfolio().await {
            if e.is_session_expired() {
                return Err(e);
            }
        }
        Ok(session)
    }

    /// Log out. Local state is cleared even if the server cannot be reached.
    pub async fn logout(&mut self) {
        self.session.logout(self.backend.as_ref()).await;
        self.reset_views();
        self.last_error = None;
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// Current username, `""` when logged out.
    #[must_use]
    pub fn username(&self) -> &str {
        self.session.username()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.current()
    }

    // ── Portfolio ───────────────────────────────────────────────────

    #[must_use]
    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio.portfolio()
    }

    /// Replace the snapshot with the server's. No request when logged out.
    pub async fn refresh_portfolio(&mut self) -> Result<&Portfolio, ClientError> {
        let result = self
            .portfolio
            .refresh(self.backend.as_ref(), &self.session)
            .await
            .map(|_| ());
        match result {
            Ok(()) => Ok(self.portfolio.portfolio()),
            Err(e) => Err(self.note_error(e)),
        }
    }

    /// Capture a refresh to run later with [`fetch_refresh`](Self::fetch_refresh).
    ///
    /// Several may be outstanding; the last one applied wins.
    #[must_use]
    pub fn begin_refresh(&self) -> Option<RefreshTicket> {
        self.portfolio.begin_refresh(&self.session)
    }

    pub async fn fetch_refresh(&self, ticket: &RefreshTicket) -> Result<Portfolio, ClientError> {
        self.backend
            .fetch_portfolio(&ticket.credential, &ticket.username)
            .await
    }

    /// Apply a refresh result. Results from before a logout are discarded.
    pub fn apply_refresh(
        &mut self,
        ticket: &RefreshTicket,
        result: Result<Portfolio, ClientError>,
    ) -> Result<Applied, ClientError> {
        let epoch = self.session.epoch();
        self.portfolio
            .apply_refresh(ticket, epoch, result)
            .map_err(|e| self.note_error(e))
    }

    /// Send an add/remove/modify, then refresh from the server.
    ///
    /// Returns the server's confirmation. If the follow-up refresh fails
    /// the mutation still counts as done and the refresh error is recorded
    /// in [`last_error`](Self::last_error).
    pub async fn mutate(
        &mut self,
        action: MutationAction,
        ticker: &str,
        quantity: u64,
    ) -> Result<String, ClientError> {
        let request = match self.build_mutation(action, ticker, quantity) {
            Ok(request) => request,
            Err(e) => return Err(self.note_error(e)),
        };
        let outcome = match self
            .portfolio
            .mutate(self.backend.as_ref(), &self.session, request)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.note_error(e)),
        };
        match outcome.refresh_error {
            Some(e) => {
                self.note_error(e);
            }
            None => self.last_error = None,
        }
        Ok(outcome.message)
    }

    pub async fn add_stock(&mut self, ticker: &str, quantity: u64) -> Result<String, ClientError> {
        self.mutate(MutationAction::Add, ticker, quantity).await
    }

    pub async fn remove_stock(&mut self, ticker: &str) -> Result<String, ClientError> {
        self.mutate(MutationAction::Remove, ticker, 0).await
    }

    pub async fn modify_stock(&mut self, ticker: &str, quantity: u64) -> Result<String, ClientError> {
        self.mutate(MutationAction::Modify, ticker, quantity).await
    }

    fn build_mutation(
        &self,
        action: MutationAction,
        ticker: &str,
        quantity: u64,
    ) -> Result<MutationRequest, ClientError> {
        self.session.require()?;
        let ticker = Ticker::parse(ticker)?;
        MutationRequest::new(action, ticker, quantity)
    }

    // ── History view ────────────────────────────────────────────────

    /// Select a ticker from the holdings table. Returns whether it changed.
    pub fn select_ticker(&mut self, ticker: &str) -> Result<bool, ClientError> {
        if !self.session.is_logged_in() {
            return Err(self.note_error(ClientError::NotLoggedIn));
        }
        match Ticker::parse(ticker) {
            Ok(ticker) => Ok(self.selection.select(ticker)),
            Err(e) => Err(self.note_error(e)),
        }
    }

    /// Resolve, fetch and apply history for the selected ticker.
    ///
    /// A timeframe that fails validation is returned as an error and
    /// nothing is sent. A failed fetch is not: it moves the view to
    /// `Error` and is recorded in [`last_error`](Self::last_error).
    pub async fn show_history(&mut self, timeframe: Timeframe) -> Result<Applied, ClientError> {
        let pending = self.prepare_history(timeframe)?;
        let result = self.fetch_pending(&pending).await;
        Ok(self.apply_history(&pending, result))
    }

    /// Re-run the current timeframe (a blank range when none was chosen yet).
    pub async fn reload_history(&mut self) -> Result<Applied, ClientError> {
        let timeframe = self.selection.timeframe().copied().unwrap_or_default();
        self.show_history(timeframe).await
    }

    /// First half of [`show_history`](Self::show_history): validate and register.
    pub fn prepare_history(&mut self, timeframe: Timeframe) -> Result<PendingHistory, ClientError> {
        let credential = match self.session.require() {
            Ok(session) => session.credential().clone(),
            Err(e) => return Err(self.note_error(e)),
        };
        let ticker = match self.selection.set_timeframe(timeframe) {
            Ok(ticker) => ticker.clone(),
            Err(e) => return Err(self.note_error(e)),
        };
        let query = match self.resolver.resolve(&ticker, &timeframe) {
            Ok(query) => query,
            Err(e) => {
                let _ = self.selection.fail(&e);
                return Err(self.note_error(e));
            }
        };
        let tag = self
            .selection
            .begin_fetch(query)
            .map_err(|e| self.note_error(e))?;
        Ok(PendingHistory {
            tag,
            epoch: self.session.epoch(),
            credential,
        })
    }

    pub async fn fetch_pending(&self, pending: &PendingHistory) -> Result<HistoryOutcome, ClientError> {
        self.resolver
            .fetch(self.backend.as_ref(), &pending.credential, &pending.tag.query)
            .await
    }

    /// Second half of [`show_history`](Self::show_history).
    ///
    /// Superseded results, and results issued under an earlier session,
    /// are dropped without touching the view.
    pub fn apply_history(
        &mut self,
        pending: &PendingHistory,
        result: Result<HistoryOutcome, ClientError>,
    ) -> Applied {
        if pending.epoch != self.session.epoch() {
            tracing::debug!(query = %pending.tag.query, "Discarding history from a previous session");
            return Applied::Discarded;
        }
        let failure = result
            .as_ref()
            .err()
            .map(|e| (e.user_message(), e.is_session_expired()));
        let applied = self.selection.complete(&pending.tag, result);
        if applied == Applied::Applied {
            match failure {
                Some((message, expired)) => {
                    self.last_error = Some(message);
                    if expired {
                        self.end_session_locally();
                    }
                }
                None => self.last_error = None,
            }
        }
        applied
    }

    #[must_use]
    pub fn selection_state(&self) -> &SelectionState {
        self.selection.state()
    }

    #[must_use]
    pub fn timeframe(&self) -> Option<&Timeframe> {
        self.selection.timeframe()
    }

    /// History for the selected ticker, only once it has arrived.
    #[must_use]
    pub fn visible_history(&self) -> Option<&HistoryOutcome> {
        self.selection.visible_outcome()
    }

    #[must_use]
    pub fn visible_series(&self) -> Option<&PriceHistorySeries> {
        self.visible_history().and_then(HistoryOutcome::series)
    }

    /// Placeholder text for the history view when there is no series to show.
    #[must_use]
    pub fn history_message(&self) -> Option<&'static str> {
        self.visible_history().and_then(HistoryOutcome::message)
    }

    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.selection.display_mode()
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.selection.set_display_mode(mode);
    }

    pub fn close_history(&mut self) {
        self.selection.close();
    }

    // ── Errors ──────────────────────────────────────────────────────

    /// The message to show for the most recent failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Record `error` for display. An expired session is ended locally.
    fn note_error(&mut self, error: ClientError) -> ClientError {
        self.last_error = Some(error.user_message());
        if error.is_session_expired() {
            self.end_session_locally();
        }
        error
    }

    fn end_session_locally(&mut self) {
        self.session.expire();
        self.reset_views();
    }

    fn reset_views(&mut self) {
        self.portfolio.clear();
        self.selection.close();
    }
}
