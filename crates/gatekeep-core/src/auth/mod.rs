//! Authentication module for managing the user session and its credential.
//!
//! This module provides:
//! - `SessionManager`: the session state machine and observer interface
//! - `Session`: the snapshot observers receive
//! - `CredentialStore`: durable storage for the bearer credential, backed by
//!   the OS keychain, a JSON file, or memory
//!
//! A stored credential restores the session as signed in on the next start.

pub mod credentials;
pub mod manager;
pub mod session;

pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use manager::SessionManager;
pub use session::{Session, SessionReader, SessionStatus};
