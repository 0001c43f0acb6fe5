//! API client for the derma backend.
//!
//! This module provides the `ApiClient` struct for the login and upload
//! endpoints. The client is constructed from `Config` so the backend host
//! can differ between environments and tests.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::Credentials;
use crate::config::Config;
use crate::upload::{ServerAck, UploadRequest};

use super::error::truncate_body;
use super::{LoginError, UploadError};

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, relative to the configured base URL
const LOGIN_PATH: &str = "/public/login";

/// Image upload endpoint, relative to the configured base URL
const UPLOAD_PATH: &str = "/uploadImage";

/// Successful body of `POST /public/login`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
}

/// API client for the derma backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for a bearer token.
    ///
    /// Any non-2xx status is a rejection. A 2xx body that is not
    /// `{username, token}` JSON is a decode error.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse, LoginError> {
        let url = self.endpoint(LOGIN_PATH);
        debug!(url = %url, username = %credentials.username, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(credentials)
            .send()
            .await
            .map_err(LoginError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Login rejected by server");
            return Err(LoginError::from_status(status, &body));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoginError::Network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| LoginError::Decode(e.to_string()))
    }

    /// Send one multipart image upload authorized by the request's token.
    pub async fn upload_image(&self, request: UploadRequest) -> Result<ServerAck, UploadError> {
        let url = self.endpoint(UPLOAD_PATH);
        let size = request.payload.len();
        debug!(url = %url, bytes = size, "Sending image upload");

        let part = Part::bytes(request.payload)
            .file_name(request.filename)
            .mime_str(request.mime_type)
            .map_err(|e| UploadError::Encode(e.to_string()))?;
        let form = Form::new().part(request.field_name, part);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, request.token.header_value())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(status = %status, "Upload rejected by server");
            return Err(UploadError::from_status(status, &body));
        }

        info!(status = %status, bytes = size, response = %truncate_body(&body), "Upload accepted");
        Ok(ServerAck {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = Config {
            base_url: "http://localhost:8089/".to_string(),
            ..Config::default()
        };
        let api = ApiClient::new(&config).expect("client should build");
        assert_eq!(api.base_url(), "http://localhost:8089");
        assert_eq!(api.endpoint(LOGIN_PATH), "http://localhost:8089/public/login");
        assert_eq!(api.endpoint(UPLOAD_PATH), "http://localhost:8089/uploadImage");
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let config = Config {
            base_url: "https://derma.example.com/api".to_string(),
            ..Config::default()
        };
        let api = ApiClient::new(&config).expect("client should build");
        assert_eq!(api.endpoint(LOGIN_PATH), "https://derma.example.com/api/public/login");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(ApiClient::new(&config).is_err());
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"username": "alice", "token": "abc123"}"#;
        let parsed: LoginResponse = serde_json::from_str(json).expect("Failed to parse login JSON");
        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.token, "abc123");
    }

    #[test]
    fn test_parse_login_response_missing_token() {
        let json = r#"{"username": "alice"}"#;
        assert!(serde_json::from_str::<LoginResponse>(json).is_err());
    }
}
