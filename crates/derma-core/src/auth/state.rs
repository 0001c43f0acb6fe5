//! Session state machine.
//!
//! `LoggedOut --begin_login--> LoggingIn --finish_login(Ok)--> LoggedIn`,
//! `LoggingIn --finish_login(Err)--> LoggedOut`, and `logged_out` from any
//! state back to `LoggedOut`. A front end renders from this state and only
//! changes it through these transitions.

use thiserror::Error;
use tracing::{debug, warn};

use crate::api::LoginError;

use super::{BearerToken, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::LoggedOut => "logged out",
            SessionState::LoggingIn => "logging in",
            SessionState::LoggedIn => "logged in",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {action} while {}", .state.label())]
pub struct TransitionError {
    pub action: &'static str,
    pub state: SessionState,
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    session: Session,
    last_error: Option<String>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::LoggedOut,
            session: Session::default(),
            last_error: None,
        }
    }

    /// Start from a session loaded out of a store.
    pub fn restored(session: Session) -> Self {
        let state = if session.is_logged_in() {
            SessionState::LoggedIn
        } else {
            SessionState::LoggedOut
        };
        Self {
            state,
            session,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn username(&self) -> &str {
        &self.session.username
    }

    /// The bearer token, only while logged in. Uploads are gated on this.
    pub fn token(&self) -> Option<&BearerToken> {
        match self.state {
            SessionState::LoggedIn => self.session.token(),
            _ => None,
        }
    }

    /// Error from the most recent failed login, cleared by the next attempt
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_login(&mut self) -> Result<(), TransitionError> {
        if self.state != SessionState::LoggedOut {
            return Err(TransitionError {
                action: "begin login",
                state: self.state,
            });
        }
        self.state = SessionState::LoggingIn;
        self.last_error = None;
        debug!("Session state: logging in");
        Ok(())
    }

    /// Apply the outcome of the in-flight login.
    ///
    /// A result arriving outside `LoggingIn` (for example after a logout
    /// raced the request) is refused and the state is left untouched.
    pub fn finish_login(&mut self, result: Result<Session, LoginError>) -> Result<(), TransitionError> {
        if self.state != SessionState::LoggingIn {
            warn!(state = self.state.label(), "Dropping login result outside of login");
            return Err(TransitionError {
                action: "finish login",
                state: self.state,
            });
        }

        match result {
            Ok(session) if session.is_logged_in() => {
                debug!(username = %session.username, "Session state: logged in");
                self.session = session;
                self.state = SessionState::LoggedIn;
            }
            Ok(session) => {
                self.session = Session::logged_out(session.username);
                self.state = SessionState::LoggedOut;
                self.last_error = Some("Login response contained no token".to_string());
            }
            Err(e) => {
                debug!(error = %e, "Session state: logged out after failed login");
                self.state = SessionState::LoggedOut;
                self.last_error = Some(e.user_message());
            }
        }
        Ok(())
    }

    /// Move to `LoggedOut` with the session returned by `SessionManager::logout`.
    pub fn logged_out(&mut self, session: Session) {
        self.session = Session::logged_out(session.username);
        self.state = SessionState::LoggedOut;
        debug!("Session state: logged out");
    }
}
