//! The session state machine.
//!
//! `SessionManager` is the only writer of the `Session`. State lives in a
//! `tokio::sync::watch` channel: its sender's lock serializes every mutation
//! together with the generation check, and its receivers are the observer
//! interface.
//!
//! Every operation that waits on the gateway remembers the generation it
//! started under and only commits its result if nothing else has moved the
//! session since. The most recently issued operation therefore wins, whatever
//! order the network answers in.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{CredentialStore, Session, SessionReader, SessionStatus};
use crate::api::{AuthError, AuthGateway, RequestAuthenticator};
use crate::models::Registration;

pub struct SessionManager<G, S> {
    state: watch::Sender<Session>,
    gateway: G,
    store: S,
}

impl<G: AuthGateway, S: CredentialStore> SessionManager<G, S> {
    /// Restore the session from `store` and connect the gateway.
    ///
    /// `connect` receives a read-only view of the session so the gateway's
    /// request authenticator can pick up the live credential.
    pub fn open<F>(store: S, connect: F) -> Result<Self>
    where
        F: FnOnce(SessionReader) -> Result<G>,
    {
        let credential = match store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Credential store unavailable, starting signed out");
                None
            }
        };
        debug!(restored = credential.is_some(), "Session opened");

        let (state, _) = watch::channel(Session::restored(credential));
        let gateway = connect(SessionReader::new(state.subscribe()))?;

        Ok(Self {
            state,
            gateway,
            store,
        })
    }

    // =========================================================================
    // Observer interface
    // =========================================================================

    /// Current session, for initial render
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Subscribe to committed transitions. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader::new(self.state.subscribe())
    }

    /// Authenticator for other resources the host application calls
    pub fn authenticator(&self) -> RequestAuthenticator {
        RequestAuthenticator::new(self.reader())
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // =========================================================================
    // Session operations
    // =========================================================================

    /// Register a new account. Does not sign in.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) {
        let generation = self.state.borrow().generation();
        let registration = Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let result = self.gateway.register(&registration).await;

        self.apply_if_current(generation, |session| match result {
            Ok(()) => {
                info!(%username, "Account registered");
                session.clear_error()
            }
            Err(e) => {
                self.fail(session, &AuthError::from(e));
                true
            }
        });
    }

    pub async fn sign_in(&self, email: &str, password: &str) {
        let mut generation = 0;
        self.state.send_modify(|session| {
            if session.is_authenticated() {
                self.forget_credential();
            }
            session.begin_sign_in();
            generation = session.generation();
        });
        debug!(generation, "Sign-in started");

        let outcome = self.gateway.authenticate(email, password).await;

        self.apply_if_current(generation, |session| {
            match outcome {
                Ok(Some(grant)) => {
                    self.persist_credential(&grant.token);
                    info!(user = %grant.user.username, "Signed in");
                    session.authenticated(grant.user, grant.token);
                }
                Ok(None) => self.fail(session, &AuthError::invalid_credentials()),
                Err(e) => self.fail(session, &AuthError::from(e)),
            }
            true
        });
    }

    /// Sign out locally. Always succeeds.
    pub fn sign_out(&self) {
        let mut generation = 0;
        self.state.send_modify(|session| {
            self.forget_credential();
            session.begin_sign_out();
            generation = session.generation();
        });

        self.apply_if_current(generation, |session| {
            session.signed_out();
            true
        });
        info!("Signed out");
    }

    /// Refresh the profile of the signed-in user.
    ///
    /// A failure means the credential is no longer good: the session drops to
    /// anonymous and the store is cleared. Without a credential no request is
    /// made; a failed session drops to anonymous, keeping its error, and any
    /// other state is left alone.
    pub async fn fetch_user(&self) {
        let (generation, authenticated, status) = {
            let session = self.state.borrow();
            (session.generation(), session.is_authenticated(), session.status())
        };

        if !authenticated {
            debug!(%status, "No credential, skipping user fetch");
            if status == SessionStatus::Failed {
                self.apply_if_current(generation, |session| {
                    session.invalidated();
                    true
                });
            }
            return;
        }

        let result = self.gateway.current_user().await;

        self.apply_if_current(generation, |session| {
            match result {
                Ok(user) => {
                    debug!(user = %user.username, "User profile loaded");
                    session.user_loaded(user);
                }
                Err(e) => {
                    warn!(error = %e, "User fetch failed, dropping session");
                    self.forget_credential();
                    session.invalidated();
                }
            }
            true
        });
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|session| session.clear_error());
    }

    // =========================================================================
    // Account recovery (no session change)
    // =========================================================================

    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::invalid_token());
        }
        self.gateway.verify_email(token).await?;
        info!("Email verified");
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.gateway.forgot_password(email).await?;
        info!("Password reset requested");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::invalid_token());
        }
        self.gateway.reset_password(token, password).await?;
        info!("Password reset");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Commit `apply` only if no other operation started or finished since
    /// `generation`. Returns whether observers were notified.
    fn apply_if_current<F>(&self, generation: u64, apply: F) -> bool
    where
        F: FnOnce(&mut Session) -> bool,
    {
        self.state.send_if_modified(|session| {
            if session.generation() != generation {
                debug!(
                    started = generation,
                    current = session.generation(),
                    "Discarding stale result"
                );
                return false;
            }
            let changed = apply(session);
            debug_assert!(session.is_consistent(), "inconsistent session: {:?}", session);
            changed
        })
    }

    fn fail(&self, session: &mut Session, err: &AuthError) {
        if session.is_authenticated() {
            self.forget_credential();
        }
        warn!(error = %err, "Session operation failed");
        session.failed(err.message());
    }

    fn persist_credential(&self, token: &str) {
        if let Err(e) = self.store.save(token) {
            warn!(error = %e, "Failed to persist credential");
        }
    }

    fn forget_credential(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }
}
