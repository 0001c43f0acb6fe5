use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque JWT issued by the login endpoint.
///
/// Never empty. `Debug` output is redacted so tokens stay out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a token string. Returns `None` for an empty token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl TryFrom<String> for BearerToken {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BearerToken::new(value).ok_or("bearer token must not be empty")
    }
}

impl From<BearerToken> for String {
    fn from(token: BearerToken) -> Self {
        token.0
    }
}

/// Login form input. Only lives for the duration of one login attempt.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authenticated-or-not state of the current user.
///
/// `token == None` is the logged out state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: Option<BearerToken>,
}

impl Session {
    pub fn logged_in(username: impl Into<String>, token: BearerToken) -> Self {
        Self {
            username: username.into(),
            token: Some(token),
        }
    }

    pub fn logged_out(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// Persistable form of this session, if it holds a token
    pub fn to_data(&self) -> Option<SessionData> {
        self.token.as_ref().map(|token| SessionData {
            username: self.username.clone(),
            token: token.clone(),
            created_at: Utc::now(),
        })
    }
}

impl From<SessionData> for Session {
    fn from(data: SessionData) -> Self {
        Session::logged_in(data.username, data.token)
    }
}

/// A logged-in session as written to a `SessionStore`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub username: String,
    pub token: BearerToken,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    /// Whether this session is older than `max_age_minutes`. No limit means never.
    pub fn is_expired(&self, max_age_minutes: Option<i64>) -> bool {
        match max_age_minutes {
            Some(minutes) => Utc::now() > self.created_at + Duration::minutes(minutes),
            None => false,
        }
    }
}
