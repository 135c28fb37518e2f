use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};

pub const SESSION_EXPIRED: &str = "Session expired. Please login again.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub authenticated: bool,
    pub error: Option<String>,
}

/// Authentication state shared with the API client's unauthorized observer.
#[derive(Debug, Clone)]
pub struct Session {
    client: ApiClient,
    state: Arc<Mutex<AuthState>>,
}

impl Session {
    pub fn new(client: ApiClient) -> Self {
        let state = Arc::new(Mutex::new(AuthState::default()));
        let observed = Arc::clone(&state);
        let client = client.with_unauthorized_handler(Arc::new(move || {
            mark_expired(&observed);
        }));
        Self { client, state }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> AuthState {
        lock(&self.state).clone()
    }

    /// Ask the backend whether the current cookie is still good.
    /// Any failure counts as signed out.
    pub fn check(&self) -> bool {
        let authenticated = match self.client.check_session().into_result() {
            Ok(status) => status.authenticated,
            Err(e) => {
                debug!(error = %e, "session check failed");
                false
            }
        };
        lock(&self.state).authenticated = authenticated;
        authenticated
    }

    pub fn login(&self, password: &str) -> bool {
        let response = self.client.login(password);
        let mut state = lock(&self.state);
        state.error = None;

        match response.into_result() {
            Ok(outcome) if outcome.success => {
                info!("logged in");
                state.authenticated = true;
                true
            }
            Ok(_) => {
                state.error = Some("Login failed".to_string());
                false
            }
            Err(e) => {
                state.error = Some(e.to_string());
                false
            }
        }
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        let result = self.client.logout().into_result();
        let mut state = lock(&self.state);
        state.authenticated = false;
        state.error = None;
        result
    }

    /// Reuse a live session, otherwise log in with `password`.
    pub fn ensure_authenticated(&self, password: Option<&str>) -> Result<()> {
        if self.check() {
            return Ok(());
        }
        let Some(password) = password else {
            return Err(anyhow!(
                "Not logged in. Set DAILY_PASSWORD or add a password to the config file."
            ));
        };
        if self.login(password) {
            Ok(())
        } else {
            let reason = self.state().error.unwrap_or_else(|| "Login failed".to_string());
            Err(anyhow!("Login failed: {}", reason))
        }
    }
}

fn lock(state: &Mutex<AuthState>) -> MutexGuard<'_, AuthState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn mark_expired(state: &Mutex<AuthState>) {
    let mut state = lock(state);
    state.authenticated = false;
    state.error = Some(SESSION_EXPIRED.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_signed_out() {
        let session = Session::new(ApiClient::new("http://localhost:8787").unwrap());
        assert_eq!(session.state(), AuthState::default());
        assert!(!session.state().authenticated);
    }

    #[test]
    fn test_mark_expired_sets_message() {
        let state = Mutex::new(AuthState {
            authenticated: true,
            error: None,
        });
        mark_expired(&state);
        let state = state.into_inner().unwrap();
        assert!(!state.authenticated);
        assert_eq!(state.error.as_deref(), Some(SESSION_EXPIRED));
    }
}
