use serde::Deserialize;
use thiserror::Error;

/// Message used when a failed response carries no readable error body
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// Message shown when sign-in finds no matching account
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Message shown when a verification or reset token is missing
pub const INVALID_TOKEN_MESSAGE: &str = "The token is invalid or expired.";

/// Maximum length for error response bodies in log output
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Normalized gateway failure.
///
/// Every failed call to the auth gateway, whatever its transport-level shape,
/// ends up as one of these carrying a single human-readable message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error with the generic fallback message
    pub fn fallback() -> Self {
        Self::new(FALLBACK_MESSAGE)
    }

    /// Normalize a failed response.
    /// Uses the `message` field of a JSON error body when there is one.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        tracing::warn!(%status, body = %Self::truncate_body(body), "Gateway request failed");

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                message: Some(message),
            }) if !message.trim().is_empty() => Self::new(message),
            _ => Self::fallback(),
        }
    }

    /// Normalize a failure that produced no response at all
    /// (connect error, timeout, undecodable body).
    pub fn from_transport(err: &reqwest::Error) -> Self {
        tracing::warn!(error = %err, timeout = err.is_timeout(), "Gateway transport failure");
        Self::fallback()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }
}

/// Failure of a session-level operation.
///
/// Session operations record these in `Session::error` instead of returning
/// them; the account recovery calls return them directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Credentials did not match, or a token is invalid or expired
    #[error("{0}")]
    Rejected(String),

    /// The gateway call failed
    #[error(transparent)]
    Transport(#[from] ApiError),
}

impl AuthError {
    pub fn invalid_credentials() -> Self {
        AuthError::Rejected(INVALID_CREDENTIALS_MESSAGE.to_string())
    }

    pub fn invalid_token() -> Self {
        AuthError::Rejected(INVALID_TOKEN_MESSAGE.to_string())
    }

    /// The one message shown to the user
    pub fn message(&self) -> &str {
        match self {
            AuthError::Rejected(message) => message,
            AuthError::Transport(err) => err.message(),
        }
    }
}
