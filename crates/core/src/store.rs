//! Credential store
//!
//! The store owns the [`SessionCredential`]. Every change goes through one of
//! its actions and is published atomically on a `watch` channel, so every
//! subscriber (the request gateway, UI state, in-flight requests) observes the
//! same value. The gateway only depends on the [`CredentialStore`] trait.

use crate::error::{CoreError, CoreResult};
use crate::session::{AuthenticatedUser, GuestUser, SessionCredential, TokenPair, decode_subject};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Read/subscribe handle over the session plus the update actions the
/// request gateway is allowed to trigger
pub trait CredentialStore: Send + Sync {
    /// Latest published session
    fn current(&self) -> SessionCredential;

    /// Live view of the session; the receiver always yields the latest value
    fn subscribe(&self) -> watch::Receiver<SessionCredential>;

    /// Store the token pair of a successful login
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidToken`] if the access token is empty.
    fn login(&self, tokens: TokenPair) -> CoreResult<()>;

    /// Replace the signed-in user with the refreshed token pair
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidToken`] if the new access token is empty.
    fn refresh_tokens(&self, tokens: TokenPair) -> CoreResult<()>;

    /// Forget the signed-in user (access token, refresh token and subject).
    /// The guest identity survives.
    fn reset_user(&self);
}

/// In-process credential store with optional JSON persistence
pub struct SessionStore {
    tx: watch::Sender<SessionCredential>,
    persist_path: Option<PathBuf>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty, memory-only store
    pub fn new() -> Self {
        Self::with_state(SessionCredential::default())
    }

    /// Create a memory-only store seeded with `state`
    pub fn with_state(state: SessionCredential) -> Self {
        let (tx, _) = watch::channel(state);
        Self {
            tx,
            persist_path: None,
        }
    }

    /// Create a store backed by a JSON file.
    ///
    /// The file is read now (a missing or corrupt file yields an empty
    /// session) and rewritten after every action.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match load_state(&path) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding unreadable session file {}: {e}", path.display());
                SessionCredential::default()
            }
        };
        let (tx, _) = watch::channel(state);
        Self {
            tx,
            persist_path: Some(path),
        }
    }

    /// Path of the backing file, if any
    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    /// Assign a guest identity
    pub fn set_guest(&self, id: impl Into<String>) {
        let guest = GuestUser { id: id.into() };
        self.publish(|state| state.guest = Some(guest));
    }

    /// Drop the guest identity
    pub fn reset_guest(&self) {
        self.publish(|state| state.guest = None);
    }

    fn publish(&self, update: impl FnOnce(&mut SessionCredential)) {
        self.tx.send_modify(update);
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.persist_path else {
            return;
        };
        let state = self.tx.borrow().clone();
        if let Err(e) = save_state(path, &state) {
            warn!("Failed to persist session to {}: {e}", path.display());
        } else {
            debug!("Persisted session to {}", path.display());
        }
    }
}

impl CredentialStore for SessionStore {
    fn current(&self) -> SessionCredential {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionCredential> {
        self.tx.subscribe()
    }

    fn login(&self, tokens: TokenPair) -> CoreResult<()> {
        if tokens.access.is_empty() {
            return Err(CoreError::invalid_token("login returned an empty access token"));
        }
        let user = AuthenticatedUser::from_tokens(tokens);
        self.publish(|state| state.user = Some(user));
        Ok(())
    }

    fn refresh_tokens(&self, tokens: TokenPair) -> CoreResult<()> {
        if tokens.access.is_empty() {
            return Err(CoreError::invalid_token(
                "refresh returned an empty access token",
            ));
        }
        self.publish(|state| {
            let user = match &state.user {
                Some(user) => user.refreshed(tokens),
                None => AuthenticatedUser::from_tokens(tokens),
            };
            state.user = Some(user);
        });
        Ok(())
    }

    fn reset_user(&self) {
        self.publish(|state| state.user = None);
    }
}

fn load_state(path: &Path) -> CoreResult<SessionCredential> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SessionCredential::default());
        }
        Err(e) => return Err(e.into()),
    };

    let mut state: SessionCredential = serde_json::from_str(&content)?;
    if let Some(user) = state.user.as_mut().filter(|user| user.id.is_none()) {
        user.id = decode_subject(&user.access);
    }
    Ok(state)
}

fn save_state(path: &Path, state: &SessionCredential) -> CoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(path, content)?;

    // The file holds bearer and refresh tokens: owner read/write only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(access: &str, refresh: Option<&str>) -> TokenPair {
        TokenPair::new(access, refresh.map(str::to_string))
    }

    #[tokio::test]
    async fn test_subscribers_observe_updates() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();

        store.login(pair("a1", Some("r1"))).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().access_token(), Some("a1"));

        store.refresh_tokens(pair("a2", None)).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().access_token(), Some("a2"));
        assert_eq!(rx.borrow().refresh_token(), Some("r1"));
    }

    #[test]
    fn test_reset_user_keeps_guest() {
        let store = SessionStore::new();
        store.set_guest("g-42");
        store.login(pair("a1", Some("r1"))).unwrap();

        store.reset_user();

        let session = store.current();
        assert_eq!(session.access_token(), None);
        assert_eq!(session.refresh_token(), None);
        assert_eq!(session.subject_id(), None);
        assert_eq!(session.guest_id(), Some("g-42"));

        store.reset_guest();
        assert_eq!(store.current().guest_id(), None);
    }

    #[test]
    fn test_empty_access_token_rejected() {
        let store = SessionStore::new();
        assert!(matches!(
            store.refresh_tokens(pair("", Some("r"))),
            Err(CoreError::InvalidToken { .. })
        ));
        assert!(store.login(pair("", None)).is_err());
        assert_eq!(store.current(), SessionCredential::default());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("session.json");

        let store = SessionStore::persistent(&path);
        store.login(pair("a1", Some("r1"))).unwrap();
        store.set_guest("g-1");
        drop(store);

        let reloaded = SessionStore::persistent(&path);
        let session = reloaded.current();
        assert_eq!(session.access_token(), Some("a1"));
        assert_eq!(session.refresh_token(), Some("r1"));
        assert_eq!(session.guest_id(), Some("g-1"));

        reloaded.reset_user();
        let cleared = SessionStore::persistent(&path).current();
        assert!(!cleared.is_authenticated());
        assert_eq!(cleared.guest_id(), Some("g-1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = SessionStore::persistent(&path);
        store.login(pair("a1", Some("r1"))).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_yields_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SessionStore::persistent(&path);
        assert_eq!(store.current(), SessionCredential::default());
        assert_eq!(store.persist_path(), Some(path.as_path()));
    }
}
