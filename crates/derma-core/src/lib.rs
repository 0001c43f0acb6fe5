//! Core library for derma.
//!
//! This crate holds everything between the login form and the network:
//!
//! - `api`: HTTP transport for the login and upload endpoints
//! - `auth`: session types, the session state machine, and session stores
//! - `upload`: JPEG encoding and the authenticated upload client
//! - `config`: base URL, timeouts, and persistence settings
//!
//! It has no UI dependency. A front end drives `SessionManager` and
//! `UploadClient` and renders from `SessionMachine`.

pub mod api;
pub mod auth;
pub mod config;
pub mod upload;

pub use api::{ApiClient, LoginError, UploadError};
pub use auth::{
    build_store, BearerToken, Credentials, FileStore, KeyringStore, MemoryStore, Session,
    SessionData, SessionMachine, SessionManager, SessionState, SessionStore, TransitionError,
};
pub use config::{Config, SessionStoreKind};
pub use upload::{encode_jpeg, load_jpeg, JpegImage, ServerAck, UploadClient, UploadRequest};
