//! Authentication module for managing user sessions.
//!
//! This module provides:
//! - `Session`, `BearerToken`, `Credentials`: the session data model
//! - `SessionMachine`: the LoggedOut / LoggingIn / LoggedIn state machine
//! - `SessionManager`: login, logout, and restore against the backend
//! - `SessionStore`: where a session is kept between runs (memory, file, keychain)

pub mod manager;
pub mod session;
pub mod state;
pub mod store;

pub use manager::SessionManager;
pub use session::{BearerToken, Credentials, Session, SessionData};
pub use state::{SessionMachine, SessionState, TransitionError};
pub use store::{build_store, FileStore, KeyringStore, MemoryStore, SessionStore};
