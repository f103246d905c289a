use crate::backend::traits::PortfolioBackend;
use crate::errors::ClientError;
use crate::models::session::{Credential, Session};
use crate::models::settings::AuthScheme;
use crate::storage::manager::SessionStore;

/// Owns login state and the credential used to authorise requests.
///
/// Either there is a `Session` (non-empty username) or there is nothing;
/// no partially logged-in state exists. Every transition bumps `epoch`,
/// so results of requests issued under an older session can be recognised.
pub struct SessionManager {
    session: Option<Session>,
    store: Box<dyn SessionStore>,
    scheme: AuthScheme,
    epoch: u64,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.session)
            .field("scheme", &self.scheme)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl SessionManager {
    pub fn new(store: Box<dyn SessionStore>, scheme: AuthScheme) -> Self {
        Self {
            session: None,
            store,
            scheme,
            epoch: 0,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    /// The logged-in username, or `""` when logged out.
    #[must_use]
    pub fn username(&self) -> &str {
        self.session.as_ref().map_or("", Session::username)
    }

    /// Changes on every login, logout, resume and expiry.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The active session, or `NotLoggedIn`.
    pub fn require(&self) -> Result<&Session, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotLoggedIn)
    }

    /// Restore a session persisted by an earlier run, without prompting.
    ///
    /// An unreadable store is reported and leaves the manager logged out.
    pub fn resume(&mut self) -> Result<Option<&Session>, ClientError> {
        let Some(record) = self.store.load()? else {
            return Ok(None);
        };
        let session = Session::from_record(record)?;
        tracing::info!(username = session.username(), "Resumed persisted session");
        self.session = Some(session);
        self.epoch += 1;
        Ok(self.session.as_ref())
    }

    /// Authenticate against the backend and persist the new session.
    ///
    /// On failure nothing changes: the previous session (if any) and the
    /// persisted record are left alone.
    pub async fn login(
        &mut self,
        backend: &dyn PortfolioBackend,
        username: &str,
        password: &str,
    ) -> Result<&Session, ClientError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::InvalidCredentials(
                "Please enter a username.".into(),
            ));
        }
        if password.is_empty() {
            return Err(ClientError::InvalidCredentials(
                "Please enter a password.".into(),
            ));
        }

        let reply = match backend.login(username, password).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(username, backend = backend.name(), error = %e, "Login failed");
                return Err(e);
            }
        };

        let credential = match (reply.token, reply.cookie, self.scheme) {
            (Some(token), _, _) => Credential::Bearer(token),
            (None, Some(cookie), AuthScheme::Cookie) => Credential::Cookie(cookie),
            (None, None, AuthScheme::Cookie) => {
                return Err(ClientError::MalformedPayload(
                    "Login succeeded but no session cookie was set".into(),
                ));
            }
            (None, _, AuthScheme::Bearer) => {
                return Err(ClientError::MalformedPayload(
                    "Login succeeded but no token was returned".into(),
                ));
            }
        };
        let session = Session::new(username, credential)?;

        if let Err(e) = self.store.save(&session.to_record()) {
            tracing::warn!(username, error = %e, "Failed to persist session");
        }
        tracing::info!(username, "Logged in");

        self.session = Some(session);
        self.epoch += 1;
        self.require()
    }

    /// Tell the server (best-effort) and drop all local session state.
    pub async fn logout(&mut self, backend: &dyn PortfolioBackend) {
        if let Some(session) = &self.session {
            if let Err(e) = backend.logout(session.credential()).await {
                tracing::warn!(
                    username = session.username(),
                    error = %e,
                    "Server logout failed; clearing local session anyway"
                );
            }
            tracing::info!(username = session.username(), "Logged out");
        }
        self.drop_local();
    }

    /// The server rejected the credential: forget it without calling back.
    pub fn expire(&mut self) {
        if let Some(session) = &self.session {
            tracing::info!(username = session.username(), "Session expired");
        }
        self.drop_local();
    }

    fn drop_local(&mut self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }
        self.session = None;
        self.epoch += 1;
    }
}
