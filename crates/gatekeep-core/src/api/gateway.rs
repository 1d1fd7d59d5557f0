use async_trait::async_trait;

use super::ApiError;
use crate::models::{AuthGrant, Registration, UserProfile};

/// The remote authentication service.
///
/// Every method is a suspension point for the session manager. Failures are
/// already normalized to `ApiError` by the time they reach the caller.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// `POST /auth/register`
    async fn register(&self, registration: &Registration) -> Result<(), ApiError>;

    /// Exchange email and password for a credential.
    /// `Ok(None)` means the gateway answered but no account matched.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<AuthGrant>, ApiError>;

    /// `GET /auth/me`, using the current credential
    async fn current_user(&self) -> Result<UserProfile, ApiError>;

    /// `GET /auth/verify-email?token=`
    async fn verify_email(&self, token: &str) -> Result<(), ApiError>;

    /// `POST /auth/forgot-password`
    async fn forgot_password(&self, email: &str) -> Result<(), ApiError>;

    /// `POST /auth/reset-password`
    async fn reset_password(&self, token: &str, password: &str) -> Result<(), ApiError>;
}
