//! REST implementation of the auth gateway.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{ApiError, AuthGateway, RequestAuthenticator};
use crate::auth::SessionReader;
use crate::config::{Config, SignInMode};
use crate::models::{Account, AuthGrant, Registration, UserProfile};

/// Token handed out by the account-lookup flow when the account record has
/// none of its own. Mock backends never issue real tokens.
const LOOKUP_TOKEN: &str = "mock-token";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    password: &'a str,
}

/// Auth gateway client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthGateway {
    client: Client,
    base_url: String,
    sign_in_mode: SignInMode,
    auth: RequestAuthenticator,
}

impl HttpAuthGateway {
    pub fn new(config: &Config, session: SessionReader) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        if config.sign_in_mode == SignInMode::AccountLookup {
            warn!("Account-lookup sign-in compares passwords client-side; use only against mock backends");
        }

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            sign_in_mode: config.sign_in_mode,
            auth: RequestAuthenticator::new(session),
        })
    }

    pub fn sign_in_mode(&self) -> SignInMode {
        self.sign_in_mode
    }

    /// The authenticator applied to this gateway's requests, for reuse by
    /// other authenticated resources of the host application
    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        let response = self
            .auth
            .send(self.client.get(self.url(path)).query(query))
            .await?;
        response.json().await.map_err(|e| ApiError::from_transport(&e))
    }

    async fn get_unit(&self, path: &str, query: &[(&str, &str)]) -> Result<(), ApiError> {
        self.auth
            .send(self.client.get(self.url(path)).query(query))
            .await?;
        Ok(())
    }

    async fn post_unit<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.auth
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        Ok(())
    }

    /// `POST /auth/login`; a 401 means the credentials did not match
    async fn login(&self, email: &str, password: &str) -> Result<Option<AuthGrant>, ApiError> {
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password });

        let response = self
            .auth
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Login rejected by gateway");
            return Ok(None);
        }

        let response = RequestAuthenticator::check_response(response).await?;
        let grant = response
            .json()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        Ok(Some(grant))
    }

    /// Legacy `GET /users?email=` flow used by mock backends
    async fn lookup(&self, email: &str, password: &str) -> Result<Option<AuthGrant>, ApiError> {
        let accounts: Vec<Account> = self.get_json("/users", &[("email", email)]).await?;
        debug!(candidates = accounts.len(), "Account lookup returned");
        Ok(Self::match_account(accounts, email, password))
    }

    fn match_account(accounts: Vec<Account>, email: &str, password: &str) -> Option<AuthGrant> {
        accounts
            .into_iter()
            .find(|a| a.profile.email.eq_ignore_ascii_case(email) && a.password_matches(password))
            .map(|account| AuthGrant {
                token: account.token.unwrap_or_else(|| LOOKUP_TOKEN.to_string()),
                user: account.profile,
            })
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        self.post_unit("/auth/register", registration).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<AuthGrant>, ApiError> {
        match self.sign_in_mode {
            SignInMode::Login => self.login(email, password).await,
            SignInMode::AccountLookup => self.lookup(email, password).await,
        }
    }

    async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/auth/me", &[]).await
    }

    async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        self.get_unit("/auth/verify-email", &[("token", token)]).await
    }

    async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.post_unit("/auth/forgot-password", &ForgotPasswordRequest { email })
            .await
    }

    async fn reset_password(&self, token: &str, password: &str) -> Result<(), ApiError> {
        self.post_unit("/auth/reset-password", &ResetPasswordRequest { token, password })
            .await
    }
}
