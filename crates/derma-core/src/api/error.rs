use thiserror::Error;

/// Failure modes of a login attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Login rejected: {0}")]
    Rejected(String),
}

/// Failure modes of a single upload attempt. None of them are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Maximum length for response bodies in error and log messages
const MAX_BODY_LENGTH: usize = 500;

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

/// Describe a failed response as `Status <code>: <body>`.
pub(crate) fn status_detail(status: reqwest::StatusCode, body: &str) -> String {
    let truncated = truncate_body(body);
    if truncated.is_empty() {
        format!("Status {}", status)
    } else {
        format!("Status {}: {}", status, truncated)
    }
}

impl LoginError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        LoginError::Rejected(status_detail(status, body))
    }

    /// Message suitable for the login form's error line.
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Rejected(detail) if detail.starts_with("Status 401") || detail.starts_with("Status 403") => {
                "Invalid username or password".to_string()
            }
            LoginError::Rejected(detail) => format!("Login failed: {}", detail),
            LoginError::Network(detail) if detail.to_lowercase().contains("timed out") => {
                "Connection timed out. Please try again.".to_string()
            }
            LoginError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            LoginError::Decode(_) => "Failed to decode response".to_string(),
        }
    }
}

impl From<reqwest::Error> for LoginError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LoginError::Decode(err.to_string())
        } else {
            LoginError::Network(describe_transport_error(&err))
        }
    }
}

impl UploadError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        UploadError::Rejected(status_detail(status, body))
    }

    /// True when the server refused the bearer token (401 or 403)
    pub fn is_unauthorized(&self) -> bool {
        match self {
            UploadError::Rejected(detail) => detail.starts_with("Status 401") || detail.starts_with("Status 403"),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Network(describe_transport_error(&err))
    }
}

impl From<image::ImageError> for UploadError {
    fn from(err: image::ImageError) -> Self {
        UploadError::Encode(err.to_string())
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}
