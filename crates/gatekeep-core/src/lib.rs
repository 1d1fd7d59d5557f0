//! Client-side authentication session core.
//!
//! `gatekeep-core` owns a user's login state and exposes it as a single
//! reactive source of truth:
//!
//! - [`auth::SessionManager`]: the session state machine, the only writer of
//!   session state
//! - [`auth::CredentialStore`]: durable storage for the bearer credential
//! - [`api::RequestAuthenticator`]: attaches the credential to outgoing
//!   requests and normalizes failed responses
//! - [`api::AuthGateway`]: the remote authentication service boundary, with an
//!   HTTP implementation in [`api::HttpAuthGateway`]

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, AuthError, AuthGateway, HttpAuthGateway, RequestAuthenticator};
pub use auth::{CredentialStore, Session, SessionManager, SessionReader, SessionStatus};
pub use config::Config;
pub use models::{AuthGrant, Registration, UserProfile};
