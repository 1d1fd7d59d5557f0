//! Auth gateway access.
//!
//! This module provides:
//! - `AuthGateway`: the remote authentication service as a trait
//! - `HttpAuthGateway`: the REST implementation built on reqwest
//! - `RequestAuthenticator`: bearer injection and response normalization
//!   applied to every gateway call
//! - `ApiError` / `AuthError`: the normalized failure types

pub mod authenticator;
pub mod client;
pub mod error;
pub mod gateway;

pub use authenticator::RequestAuthenticator;
pub use client::HttpAuthGateway;
pub use error::{ApiError, AuthError};
pub use gateway::AuthGateway;
