//! Data models exchanged with the auth gateway.
//!
//! - `UserProfile`: the signed-in account as shown to the UI
//! - `AuthGrant`: a successful sign-in (profile plus bearer credential)
//! - `Registration`: the sign-up request body
//! - `Account`: a raw account record from the legacy lookup endpoint

pub mod user;

pub use user::{Account, AuthGrant, Registration, UserProfile};
