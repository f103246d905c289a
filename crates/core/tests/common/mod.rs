// ═══════════════════════════════════════════════════════════════════
// Scripted backend shared by the service and integration tests
// ═══════════════════════════════════════════════════════════════════

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use portfolio_client_core::backend::traits::{LoginReply, PortfolioBackend};
use portfolio_client_core::errors::ClientError;
use portfolio_client_core::models::mutation::{MutationAction, MutationRequest};
use portfolio_client_core::models::portfolio::{Holding, Portfolio};
use portfolio_client_core::models::price::PricePoint;
use portfolio_client_core::models::query::EffectiveQuery;
use portfolio_client_core::models::session::Credential;
use portfolio_client_core::models::ticker::Ticker;

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn ticker(s: &str) -> Ticker {
    Ticker::parse(s).unwrap()
}

/// One call seen by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login(String),
    Logout,
    Portfolio(String),
    History(EffectiveQuery),
    Update {
        action: MutationAction,
        ticker: String,
        quantity: u64,
    },
}

#[derive(Default)]
struct State {
    passwords: HashMap<String, String>,
    token: Option<String>,
    holdings: BTreeMap<String, u64>,
    prices: HashMap<String, Decimal>,
    history: HashMap<String, Vec<(NaiveDate, Decimal)>>,
    history_error: HashMap<String, (u16, String)>,
    portfolio_failures: u32,
    expired: bool,
    rejects_new_sessions: bool,
    logout_fails: bool,
    calls: Vec<Call>,
}

/// In-memory stand-in for the portfolio server.
///
/// Clones share state, so a test can keep a handle after boxing one
/// into a client.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<State>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.state()
            .passwords
            .insert(username.into(), password.into());
        self
    }

    /// Make `/login` answer with a bearer token.
    pub fn with_token(self, token: &str) -> Self {
        self.state().token = Some(token.into());
        self
    }

    pub fn with_price(self, ticker: &str, price: &str) -> Self {
        self.state().prices.insert(ticker.into(), dec(price));
        self
    }

    pub fn with_holding(self, ticker: &str, quantity: u64, price: &str) -> Self {
        {
            let mut state = self.state();
            state.prices.insert(ticker.into(), dec(price));
            state.holdings.insert(ticker.into(), quantity);
        }
        self
    }

    pub fn with_history(self, ticker: &str, points: &[(&str, &str)]) -> Self {
        self.state().history.insert(
            ticker.into(),
            points.iter().map(|(d, p)| (date(d), dec(p))).collect(),
        );
        self
    }

    pub fn with_history_error(self, ticker: &str, status: u16, message: &str) -> Self {
        self.state()
            .history_error
            .insert(ticker.into(), (status, message.into()));
        self
    }

    pub fn fail_next_portfolio_fetches(&self, count: u32) {
        self.state().portfolio_failures = count;
    }

    pub fn expire_sessions(&self) {
        self.state().expired = true;
    }

    /// Accept logins but answer 401 to every portfolio fetch, even after
    /// a fresh login.
    pub fn reject_new_sessions(&self) {
        self.state().rejects_new_sessions = true;
    }

    pub fn fail_logout(&self) {
        self.state().logout_fails = true;
    }

    pub fn set_price(&self, ticker: &str, price: &str) {
        self.state().prices.insert(ticker.into(), dec(price));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn history_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::History(_)))
            .count()
    }

    pub fn portfolio_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Portfolio(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

#[async_trait]
impl PortfolioBackend for MockBackend {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginReply, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::Login(username.into()));
        if state.passwords.get(username).map(String::as_str) != Some(password) {
            return Err(ClientError::InvalidCredentials(
                "Invalid username or password".into(),
            ));
        }
        state.expired = false;
        Ok(LoginReply {
            message: Some("Login successful".into()),
            token: state.token.clone(),
            cookie: match state.token {
                Some(_) => None,
                None => Some(format!("session={username}")),
            },
        })
    }

    async fn logout(&self, _credential: &Credential) -> Result<(), ClientError> {
        let mut state = self.state();
        state.calls.push(Call::Logout);
        if state.logout_fails {
            return Err(ClientError::Network("connection refused".into()));
        }
        Ok(())
    }

    async fn fetch_portfolio(
        &self,
        _credential: &Credential,
        username: &str,
    ) -> Result<Portfolio, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::Portfolio(username.into()));
        if state.expired || state.rejects_new_sessions {
            return Err(ClientError::SessionExpired("Please log in again.".into()));
        }
        if state.portfolio_failures > 0 {
            state.portfolio_failures -= 1;
            return Err(ClientError::Api {
                status: 500,
                message: "Database unavailable".into(),
            });
        }
        let holdings: Vec<Holding> = state
            .holdings
            .iter()
            .map(|(symbol, quantity)| {
                let latest_price = state.prices.get(symbol).copied().unwrap_or_default();
                Holding {
                    ticker: ticker(symbol),
                    quantity: *quantity,
                    latest_price,
                    total_value: Decimal::from(*quantity) * latest_price,
                }
            })
            .collect();
        let total = holdings.iter().map(|h| h.total_value).sum();
        Ok(Portfolio::new(holdings, total))
    }

    async fn fetch_history(
        &self,
        _credential: &Credential,
        query: &EffectiveQuery,
    ) -> Result<Vec<PricePoint>, ClientError> {
        let mut state = self.state();
        state.calls.push(Call::History(query.clone()));
        if state.expired {
            return Err(ClientError::SessionExpired("Please log in again.".into()));
        }
        let symbol = query.ticker().as_str();
        if let Some((status, message)) = state.history_error.get(symbol) {
            return Err(ClientError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        let points = state.history.get(symbol).cloned().unwrap_or_default();
        // Served newest-last, like a date-keyed JSON object in insertion order.
        let points = points
            .into_iter()
            .filter(|(d, _)| match query {
                EffectiveQuery::DateRange { start, end, .. } => d >= start && d <= end,
                EffectiveQuery::Trailing { .. } => true,
            })
            .map(|(d, p)| PricePoint::new(d, p))
            .collect();
        Ok(points)
    }

    async fn update_holding(
        &self,
        _credential: &Credential,
        _username: &str,
        request: &MutationRequest,
    ) -> Result<String, ClientError> {
        let mut state = self.state();
        let symbol = request.ticker().as_str().to_string();
        state.calls.push(Call::Update {
            action: request.action(),
            ticker: symbol.clone(),
            quantity: request.quantity(),
        });
        if state.expired {
            return Err(ClientError::SessionExpired("Please log in again.".into()));
        }
        match request.action() {
            MutationAction::Add => {
                if !state.prices.contains_key(&symbol) {
                    return Err(ClientError::MutationRejected(format!(
                        "Unknown ticker {symbol}"
                    )));
                }
                *state.holdings.entry(symbol.clone()).or_insert(0) += request.quantity();
                Ok(format!("Added {} shares of {symbol}", request.quantity()))
            }
            MutationAction::Remove => {
                if state.holdings.remove(&symbol).is_none() {
                    return Err(ClientError::MutationRejected(format!(
                        "You do not own {symbol}"
                    )));
                }
                Ok(format!("Removed {symbol}"))
            }
            MutationAction::Modify => {
                if !state.holdings.contains_key(&symbol) {
                    return Err(ClientError::MutationRejected(format!(
                        "You do not own {symbol}"
                    )));
                }
                state.holdings.insert(symbol.clone(), request.quantity());
                Ok(format!("{symbol} set to {} shares", request.quantity()))
            }
        }
    }
}
