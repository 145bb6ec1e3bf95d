//! Session/auth gate
//!
//! Tracks the current identity (real session or the local developer-bypass
//! sentinel) derived from the remote store's session state, and gates
//! access to protected views.
//!
//! The bypass sentinel is a local override, not a remote session: remote
//! session-ended notifications never clear it; only an explicit logout
//! does.

use crate::state::{AppEvent, SharedState};
use serde::Serialize;
use std::sync::Arc;
use studyhall_common::models::Identity;
use studyhall_common::store::{RemoteStore, SessionEvent};
use studyhall_common::{Error, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Gate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthPhase {
    Anonymous,
    /// Session lookup in flight
    Checking,
    Authenticated,
    AuthenticatedBypass,
}

/// What a protected view should do right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Render the protected content
    Allow,
    /// Session lookup still in flight; render a loading placeholder
    Defer,
    /// Redirect to the login entry point, preserving the requested location
    RedirectToLogin { from: Option<String> },
}

struct GateInner {
    phase: AuthPhase,
    identity: Option<Identity>,
    last_error: Option<String>,
}

/// Injectable session/auth state container
pub struct AuthGate {
    inner: RwLock<GateInner>,
    store: Arc<dyn RemoteStore>,
    profile: Arc<crate::state::ProfileState>,
    shared: Arc<SharedState>,
}

impl AuthGate {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        profile: Arc<crate::state::ProfileState>,
        shared: Arc<SharedState>,
    ) -> Self {
        Self {
            inner: RwLock::new(GateInner {
                phase: AuthPhase::Checking,
                identity: None,
                last_error: None,
            }),
            store,
            profile,
            shared,
        }
    }

    /// Cold start: adopt a persisted identity optimistically (reconciling
    /// against the store in the background), otherwise resolve the phase
    /// with a one-shot session lookup. Then start the session-change
    /// subscriber; it terminates on its own when the store's channel
    /// closes.
    pub async fn start(self: &Arc<Self>) {
        if let Some(identity) = self.profile.identity() {
            info!("Adopting persisted identity: {}", identity.uid);
            self.install_identity(identity).await;

            let gate = Arc::clone(self);
            tokio::spawn(async move {
                gate.reconcile().await;
            });
        } else {
            match self.store.get_session().await {
                Ok(Some(identity)) => {
                    self.install_identity(identity.clone()).await;
                    if let Err(e) = self.profile.set_identity(Some(identity)) {
                        warn!("Could not persist identity: {}", e);
                    }
                }
                Ok(None) => self.set_anonymous().await,
                Err(e) => {
                    warn!("Session lookup failed: {}", e);
                    self.set_anonymous().await;
                }
            }
        }

        let gate = Arc::clone(self);
        let mut rx = self.store.subscribe_sessions();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => gate.handle_session_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // Events are idempotent; only the latest matters
                        debug!("Session subscriber lagged by {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Verify an optimistically adopted identity against the store. The
    /// bypass sentinel is exempt; it is not a remote session.
    async fn reconcile(&self) {
        if self.inner.read().await.identity.as_ref().is_some_and(Identity::is_bypass) {
            return;
        }
        match self.store.get_session().await {
            Ok(Some(identity)) => {
                self.install_identity(identity.clone()).await;
                if let Err(e) = self.profile.set_identity(Some(identity)) {
                    warn!("Could not persist identity: {}", e);
                }
            }
            Ok(None) => {
                info!("Persisted identity no longer has a remote session");
                self.clear_identity().await;
            }
            Err(e) => warn!("Background session reconcile failed: {}", e),
        }
    }

    /// Apply a session-change notification. Idempotent; may fire at any
    /// time, including immediately after startup.
    pub async fn handle_session_event(&self, event: SessionEvent) {
        let bypass_active =
            self.inner.read().await.identity.as_ref().is_some_and(Identity::is_bypass);
        if bypass_active {
            // Remote notifications never transition the bypass out
            return;
        }

        match event {
            SessionEvent::SignedIn { identity } => {
                self.install_identity(identity.clone()).await;
                if let Err(e) = self.profile.set_identity(Some(identity)) {
                    warn!("Could not persist identity: {}", e);
                }
            }
            SessionEvent::SignedOut => self.clear_identity().await,
        }
    }

    /// Explicit local developer bypass; no store contact
    pub async fn login_as_developer(&self) {
        self.install_identity(Identity::developer_bypass()).await;
        if let Err(e) = self.profile.set_identity(Some(Identity::developer_bypass())) {
            warn!("Could not persist identity: {}", e);
        }
    }

    /// Begin a provider sign-in through the store. On rejection the gate
    /// stays anonymous and the error message is retained for display.
    pub async fn sign_in_with_provider(&self, provider: &str) -> Result<()> {
        if let Err(e) = self.store.sign_in_with_provider(provider).await {
            let message = e.to_string();
            let mut inner = self.inner.write().await;
            inner.phase = AuthPhase::Anonymous;
            inner.identity = None;
            inner.last_error = Some(message);
            return Err(e);
        }

        // The subscriber also sees the SignedIn event; applying the session
        // here as well keeps the result deterministic for the caller.
        if let Ok(Some(identity)) = self.store.get_session().await {
            self.install_identity(identity.clone()).await;
            if let Err(e) = self.profile.set_identity(Some(identity)) {
                warn!("Could not persist identity: {}", e);
            }
        }
        Ok(())
    }

    /// Explicit logout; the only action that clears the bypass sentinel.
    /// The gate goes anonymous even when the store rejects the sign-out.
    pub async fn logout(&self) -> Result<()> {
        let was_bypass =
            self.inner.read().await.identity.as_ref().is_some_and(Identity::is_bypass);
        self.clear_identity().await;

        if was_bypass {
            // Local override, nothing to tear down remotely
            return Ok(());
        }
        self.store.sign_out().await.map_err(|e| Error::Auth(e.to_string()))
    }

    pub async fn phase(&self) -> AuthPhase {
        self.inner.read().await.phase
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.inner.read().await.identity.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    /// Protected-view contract: loading placeholder while checking,
    /// redirect when anonymous, render otherwise.
    pub async fn decision(&self, requested: Option<&str>) -> GateDecision {
        match self.inner.read().await.phase {
            AuthPhase::Checking => GateDecision::Defer,
            AuthPhase::Anonymous => GateDecision::RedirectToLogin {
                from: requested.map(str::to_string),
            },
            AuthPhase::Authenticated | AuthPhase::AuthenticatedBypass => GateDecision::Allow,
        }
    }

    async fn install_identity(&self, identity: Identity) {
        let mut inner = self.inner.write().await;
        inner.phase = if identity.is_bypass() {
            AuthPhase::AuthenticatedBypass
        } else {
            AuthPhase::Authenticated
        };
        inner.identity = Some(identity.clone());
        inner.last_error = None;
        drop(inner);

        self.shared.broadcast_event(AppEvent::SessionChanged {
            identity: Some(identity),
            timestamp: chrono::Utc::now(),
        });
    }

    async fn clear_identity(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.phase = AuthPhase::Anonymous;
            inner.identity = None;
        }
        if let Err(e) = self.profile.set_identity(None) {
            warn!("Could not persist identity: {}", e);
        }
        self.shared.broadcast_event(AppEvent::SessionChanged {
            identity: None,
            timestamp: chrono::Utc::now(),
        });
    }

    async fn set_anonymous(&self) {
        let mut inner = self.inner.write().await;
        inner.phase = AuthPhase::Anonymous;
        inner.identity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProfileState;
    use studyhall_common::profile::ProfileStore;
    use studyhall_common::store::MemoryStore;
    use tempfile::TempDir;

    fn fixtures() -> (Arc<MemoryStore>, Arc<ProfileState>, Arc<SharedState>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let profile =
            Arc::new(ProfileState::load(ProfileStore::new(dir.path())).unwrap());
        let shared = Arc::new(SharedState::new());
        (store, profile, shared, dir)
    }

    fn gate(
        store: &Arc<MemoryStore>,
        profile: &Arc<ProfileState>,
        shared: &Arc<SharedState>,
    ) -> Arc<AuthGate> {
        Arc::new(AuthGate::new(
            Arc::clone(store) as Arc<dyn RemoteStore>,
            Arc::clone(profile),
            Arc::clone(shared),
        ))
    }

    fn real_identity() -> Identity {
        Identity {
            uid: "user-1".into(),
            display_name: "A User".into(),
            email: "a@example.com".into(),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_cold_start_no_session_is_anonymous() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);

        gate.start().await;
        assert_eq!(gate.phase().await, AuthPhase::Anonymous);
        assert!(gate.identity().await.is_none());
    }

    #[tokio::test]
    async fn test_cold_start_with_remote_session() {
        let (store, profile, shared, _dir) = fixtures();
        store.set_session(real_identity());

        let gate = gate(&store, &profile, &shared);
        gate.start().await;

        assert_eq!(gate.phase().await, AuthPhase::Authenticated);
        assert_eq!(gate.identity().await.unwrap().uid, "user-1");
        // Identity persisted for the next cold start
        assert_eq!(profile.identity().unwrap().uid, "user-1");
    }

    #[tokio::test]
    async fn test_cold_start_adopts_persisted_identity_optimistically() {
        let (store, profile, shared, _dir) = fixtures();
        profile.set_identity(Some(Identity::developer_bypass())).unwrap();

        let gate = gate(&store, &profile, &shared);
        gate.start().await;

        assert_eq!(gate.phase().await, AuthPhase::AuthenticatedBypass);
    }

    #[tokio::test]
    async fn test_session_ended_clears_real_identity() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);
        gate.handle_session_event(SessionEvent::SignedIn { identity: real_identity() }).await;
        assert_eq!(gate.phase().await, AuthPhase::Authenticated);

        gate.handle_session_event(SessionEvent::SignedOut).await;
        assert_eq!(gate.phase().await, AuthPhase::Anonymous);
        assert!(gate.identity().await.is_none());
    }

    #[tokio::test]
    async fn test_bypass_immune_to_session_ended() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);
        gate.login_as_developer().await;
        assert_eq!(gate.phase().await, AuthPhase::AuthenticatedBypass);

        gate.handle_session_event(SessionEvent::SignedOut).await;

        // The bypass sentinel must survive remote session-ended events
        assert_eq!(gate.phase().await, AuthPhase::AuthenticatedBypass);
        assert!(gate.identity().await.unwrap().is_bypass());
    }

    #[tokio::test]
    async fn test_session_events_are_idempotent() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);

        gate.handle_session_event(SessionEvent::SignedOut).await;
        gate.handle_session_event(SessionEvent::SignedOut).await;
        assert_eq!(gate.phase().await, AuthPhase::Anonymous);

        gate.handle_session_event(SessionEvent::SignedIn { identity: real_identity() }).await;
        gate.handle_session_event(SessionEvent::SignedIn { identity: real_identity() }).await;
        assert_eq!(gate.phase().await, AuthPhase::Authenticated);
    }

    #[tokio::test]
    async fn test_only_logout_clears_bypass() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);
        gate.login_as_developer().await;

        gate.logout().await.unwrap();
        assert_eq!(gate.phase().await, AuthPhase::Anonymous);
        assert!(profile.identity().is_none());
    }

    #[tokio::test]
    async fn test_rejected_sign_in_surfaces_error_and_stays_anonymous() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);

        // Memory backend has no hosted provider
        let err = gate.sign_in_with_provider("google").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(gate.phase().await, AuthPhase::Anonymous);
        assert!(gate.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_gate_decisions() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);

        // Fresh gate is still checking
        assert_eq!(gate.decision(Some("/admin")).await, GateDecision::Defer);

        gate.start().await;
        assert_eq!(
            gate.decision(Some("/admin")).await,
            GateDecision::RedirectToLogin { from: Some("/admin".to_string()) }
        );

        gate.login_as_developer().await;
        assert_eq!(gate.decision(Some("/admin")).await, GateDecision::Allow);
    }

    #[tokio::test]
    async fn test_subscriber_applies_store_events() {
        let (store, profile, shared, _dir) = fixtures();
        let gate = gate(&store, &profile, &shared);
        gate.start().await;

        store.set_session(real_identity());
        // Give the subscriber task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(gate.phase().await, AuthPhase::Authenticated);

        store.end_session();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(gate.phase().await, AuthPhase::Anonymous);
    }
}
