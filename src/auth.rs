use std::fmt;

use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::ApiError;

/// Caller identity forwarded to the backend on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

pub fn session_from_request(
    auth: Option<Authorization<Bearer>>,
    query_token: Option<&str>,
) -> Result<Session, ApiError> {
    let provided_token = auth
        .map(|a| a.token().to_string())
        .or_else(|| query_token.map(|s| s.to_string()));
    match provided_token {
        Some(token) if !token.trim().is_empty() => Ok(Session::new(token)),
        _ => Err(ApiError::Unauthorized(
            "Missing authentication token".into(),
        )),
    }
}
