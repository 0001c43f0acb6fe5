use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{ApiClient, LoginError};

use super::{BearerToken, Credentials, Session, SessionStore};

/// Turns credentials into a session and invalidates it again.
///
/// Clone is cheap; a clone is moved into each spawned login task.
#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn SessionStore>,
    max_age_minutes: Option<i64>,
}

impl SessionManager {
    pub fn new(api: ApiClient, store: Arc<dyn SessionStore>) -> Self {
        Self {
            api,
            store,
            max_age_minutes: None,
        }
    }

    /// Refuse to restore stored sessions older than this
    pub fn with_max_age(mut self, max_age_minutes: Option<i64>) -> Self {
        self.max_age_minutes = max_age_minutes;
        self
    }

    /// Authenticate and return the new session.
    ///
    /// The session carries the username echoed by the server. Nothing is
    /// stored here; call [`persist`](Self::persist) once the result has been
    /// accepted, so a login that completes after logout leaves no trace.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, LoginError> {
        let credentials = Credentials::new(username, password);
        let response = self.api.authenticate(&credentials).await?;

        let token = BearerToken::new(response.token)
            .ok_or_else(|| LoginError::Decode("response contained an empty token".to_string()))?;
        let session = Session::logged_in(response.username, token);

        info!(username = %session.username, "Login successful");
        Ok(session)
    }

    /// Save an accepted session to the store. Failures are logged only.
    pub fn persist(&self, session: &Session) {
        let Some(data) = session.to_data() else {
            debug!("Not persisting a logged out session");
            return;
        };
        if let Err(e) = self.store.save(&data) {
            warn!(error = %e, store = self.store.name(), "Failed to save session");
        }
    }

    /// Drop the token and clear the stored copy. Never fails; calling it on
    /// a logged out session yields the same logged out session.
    pub fn logout(&self, session: Session) -> Session {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, store = self.store.name(), "Failed to clear stored session");
        }
        if session.is_logged_in() {
            info!(username = %session.username, "Logged out");
        }
        Session::logged_out(session.username)
    }

    /// Session saved by an earlier login, if it is still usable
    pub fn restore(&self) -> Option<Session> {
        match self.store.load() {
            Ok(Some(data)) if data.is_expired(self.max_age_minutes) => {
                debug!("Stored session expired");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear expired session");
                }
                None
            }
            Ok(Some(data)) => {
                debug!(username = %data.username, store = self.store.name(), "Restored session");
                Some(Session::from(data))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, store = self.store.name(), "Failed to load stored session");
                None
            }
        }
    }
}
