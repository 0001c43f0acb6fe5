//! HTTP client module for the derma backend.
//!
//! This module provides the `ApiClient` for the two endpoints the client
//! talks to: `POST /public/login`, which exchanges credentials for a JWT
//! bearer token, and `POST /uploadImage`, which accepts a multipart JPEG
//! upload authorized by that token.

pub mod client;
pub mod error;

pub use client::{ApiClient, LoginResponse};
pub use error::{LoginError, UploadError};
