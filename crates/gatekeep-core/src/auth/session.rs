use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::models::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionStatus {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    SigningOut,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Anonymous => "anonymous",
            SessionStatus::Authenticating => "authenticating",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::SigningOut => "signing out",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the authentication state.
///
/// Only `SessionManager` changes a session; everyone else sees clones. The
/// credential never leaves the process through serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    status: SessionStatus,
    user: Option<UserProfile>,
    #[serde(skip)]
    credential: Option<String>,
    error: Option<String>,
    generation: u64,
}

impl Session {
    /// Build the startup session from whatever the credential store held.
    /// A stored credential means signed in, with the profile still unknown.
    pub fn restored(credential: Option<String>) -> Self {
        match credential {
            Some(token) => Self {
                status: SessionStatus::Authenticated,
                credential: Some(token),
                ..Self::default()
            },
            None => Self::default(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// True while a sign-in or sign-out is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Authenticating | SessionStatus::SigningOut
        )
    }

    /// Check the credential/user/status invariants hold
    pub fn is_consistent(&self) -> bool {
        let authenticated = self.is_authenticated();
        self.credential.is_some() == authenticated && (self.user.is_none() || authenticated)
    }

    // ===== Transitions (SessionManager only) =====

    pub(crate) fn begin_sign_in(&mut self) {
        self.generation += 1;
        self.status = SessionStatus::Authenticating;
        self.user = None;
        self.credential = None;
        self.error = None;
    }

    pub(crate) fn begin_sign_out(&mut self) {
        self.generation += 1;
        self.status = SessionStatus::SigningOut;
        self.user = None;
        self.credential = None;
    }

    pub(crate) fn authenticated(&mut self, user: UserProfile, credential: String) {
        self.generation += 1;
        self.status = SessionStatus::Authenticated;
        self.user = Some(user);
        self.credential = Some(credential);
        self.error = None;
    }

    /// Replace the profile of an already authenticated session
    pub(crate) fn user_loaded(&mut self, user: UserProfile) {
        self.generation += 1;
        self.status = SessionStatus::Authenticated;
        self.user = Some(user);
        self.error = None;
    }

    pub(crate) fn failed(&mut self, message: impl Into<String>) {
        self.generation += 1;
        self.status = SessionStatus::Failed;
        self.user = None;
        self.credential = None;
        self.error = Some(message.into());
    }

    /// Drop to anonymous, leaving any error message in place
    pub(crate) fn invalidated(&mut self) {
        self.generation += 1;
        self.status = SessionStatus::Anonymous;
        self.user = None;
        self.credential = None;
    }

    /// Second half of sign-out; the generation was already bumped on entry
    pub(crate) fn signed_out(&mut self) {
        self.status = SessionStatus::Anonymous;
        self.user = None;
        self.credential = None;
        self.error = None;
    }

    /// Returns false when there was nothing to clear
    pub(crate) fn clear_error(&mut self) -> bool {
        self.error.take().is_some()
    }
}

/// Read-only view of the live session.
/// Cheap to clone; every clone sees the latest committed snapshot.
#[derive(Debug, Clone)]
pub struct SessionReader {
    rx: watch::Receiver<Session>,
}

impl SessionReader {
    pub(crate) fn new(rx: watch::Receiver<Session>) -> Self {
        Self { rx }
    }

    /// Current bearer credential, if signed in
    pub fn credential(&self) -> Option<String> {
        self.rx.borrow().credential.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile::new("ada", "ada@example.com")
    }

    #[test]
    fn test_restored_without_credential() {
        let session = Session::restored(None);
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert!(session.user().is_none());
        assert!(session.credential().is_none());
        assert_eq!(session.generation(), 0);
        assert!(session.is_consistent());
    }

    #[test]
    fn test_restored_with_credential() {
        let session = Session::restored(Some("tok".to_string()));
        assert_eq!(session.status(), SessionStatus::Authenticated);
        assert_eq!(session.credential(), Some("tok"));
        // Profile is unknown until fetched
        assert!(session.user().is_none());
        assert!(session.is_consistent());
    }

    #[test]
    fn test_transitions_keep_invariants() {
        let mut session = Session::default();

        session.begin_sign_in();
        assert_eq!(session.status(), SessionStatus::Authenticating);
        assert!(session.is_busy());
        assert!(session.is_consistent());

        session.authenticated(profile(), "tok".to_string());
        assert!(session.is_authenticated());
        assert!(session.is_consistent());

        session.failed("nope");
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.error(), Some("nope"));
        assert!(session.is_consistent());

        session.authenticated(profile(), "tok".to_string());
        session.begin_sign_out();
        assert!(session.is_busy());
        assert!(session.is_consistent());

        session.signed_out();
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert!(session.is_consistent());
    }

    #[test]
    fn test_generation_increments() {
        let mut session = Session::default();
        session.begin_sign_in();
        assert_eq!(session.generation(), 1);
        session.authenticated(profile(), "tok".to_string());
        assert_eq!(session.generation(), 2);
        session.begin_sign_out();
        assert_eq!(session.generation(), 3);
        // Completing a sign-out does not start a new operation
        session.signed_out();
        assert_eq!(session.generation(), 3);
    }

    #[test]
    fn test_invalidated_keeps_error() {
        let mut session = Session::restored(Some("tok".to_string()));
        session.error = Some("earlier".to_string());
        session.invalidated();
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert_eq!(session.error(), Some("earlier"));
        assert!(session.is_consistent());
    }

    #[test]
    fn test_clear_error() {
        let mut session = Session::default();
        assert!(!session.clear_error());

        session.failed("bad");
        let generation = session.generation();
        assert!(session.clear_error());
        assert!(session.error().is_none());
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_serialized_snapshot_hides_credential() {
        let mut session = Session::default();
        session.authenticated(profile(), "secret-token".to_string());

        let json = serde_json::to_string(&session).expect("Failed to serialize session");
        assert!(!json.contains("secret-token"));
        assert!(json.contains(r#""status":"Authenticated""#));
        assert!(json.contains(r#""generation":1"#));
    }

    #[test]
    fn test_reader_sees_latest() {
        let (tx, rx) = watch::channel(Session::default());
        let reader = SessionReader::new(rx);
        assert!(reader.credential().is_none());

        tx.send_modify(|s| s.authenticated(profile(), "tok".to_string()));
        assert_eq!(reader.credential().as_deref(), Some("tok"));
        assert_eq!(reader.snapshot().user(), Some(&profile()));
    }
}
