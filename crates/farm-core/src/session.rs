//! Session persistence and sign-in flows
//!
//! The session is the signed-in identity stored on-device under
//! [`SESSION_KEY`]. It is trusted as stored: there is no expiry and no
//! server-side validation.

use std::sync::Arc;
use storage::{KvError, KvStore};
use thiserror::Error;

use crate::error::Result;
use crate::identity::IdentityProvider;
use crate::models::{Farmer, Sourced, UserIdentity};
use crate::profile::ProfileService;

/// Storage key of the signed-in identity
pub const SESSION_KEY: &str = "farmtrack_user";

/// Session error types
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be read or written
    #[error("Session storage error: {0}")]
    Storage(#[from] KvError),
}

/// Persisted signed-in identity
#[derive(Clone)]
pub struct SessionStore {
    kv: KvStore,
}

impl SessionStore {
    /// Create a session store
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// The stored identity, if any
    ///
    /// A corrupt entry is treated as no session.
    pub fn load(&self) -> std::result::Result<Option<UserIdentity>, SessionError> {
        match self.kv.get::<UserIdentity>(SESSION_KEY) {
            Ok(identity) => Ok(identity),
            Err(KvError::Serialization(err)) => {
                tracing::warn!(%err, "ignoring unreadable session");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Store the signed-in identity
    pub fn save(&self, identity: &UserIdentity) -> std::result::Result<(), SessionError> {
        self.kv.set(SESSION_KEY, identity)?;
        self.kv.flush()?;
        Ok(())
    }

    /// Forget the signed-in identity
    pub fn clear(&self) -> std::result::Result<(), SessionError> {
        self.kv.remove(SESSION_KEY)?;
        self.kv.flush()?;
        Ok(())
    }
}

/// Result of the startup session check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// An identity is signed in
    Authenticated(UserIdentity),
    /// Nobody is signed in; send the viewer to the login screen
    RedirectToLogin,
    /// Nobody is signed in, but the remote service is unconfigured so the
    /// login redirect is suppressed
    Unconfigured,
}

impl Access {
    /// The signed-in identity, if any
    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            Access::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Startup session check
pub struct SessionGate {
    sessions: SessionStore,
}

impl SessionGate {
    /// Create a gate over a session store
    pub fn new(sessions: SessionStore) -> Self {
        Self { sessions }
    }

    /// Decide what the viewer may see
    pub fn check(&self, remote_configured: bool) -> std::result::Result<Access, SessionError> {
        Ok(match self.sessions.load()? {
            Some(identity) => Access::Authenticated(identity),
            None if remote_configured => Access::RedirectToLogin,
            None => Access::Unconfigured,
        })
    }
}

/// Outcome of signing in or up
#[derive(Debug, Clone, PartialEq)]
pub struct SignedIn {
    /// The signed-in identity
    pub identity: UserIdentity,
    /// The identity's profile, when it could be ensured
    pub profile: Option<Sourced<Farmer>>,
}

/// Sign-in, sign-up and sign-out
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionStore,
    profiles: Arc<ProfileService>,
}

impl AuthService {
    /// Create an auth service
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sessions: SessionStore,
        profiles: Arc<ProfileService>,
    ) -> Self {
        Self { provider, sessions, profiles }
    }

    /// Verify credentials, persist the session and ensure a profile
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn> {
        let identity = self.provider.sign_in(email, password).await?;
        self.establish(identity).await
    }

    /// Register, persist the session and ensure a profile
    pub async fn sign_up(&self, email: &str, password: &str, name: Option<&str>) -> Result<SignedIn> {
        let identity = self.provider.sign_up(email, password, name).await?;
        self.establish(identity).await
    }

    /// Forget the signed-in identity
    pub fn sign_out(&self) -> Result<()> {
        self.sessions.clear()?;
        tracing::info!("signed out");
        Ok(())
    }

    /// The signed-in identity, if any
    pub fn current(&self) -> Result<Option<UserIdentity>> {
        Ok(self.sessions.load()?)
    }

    async fn establish(&self, identity: UserIdentity) -> Result<SignedIn> {
        self.sessions.save(&identity)?;
        tracing::info!(user_id = %identity.id, "signed in");

        // A missing profile is created on the next page that needs one
        let profile = match self.profiles.ensure(&identity).await {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::error!(user_id = %identity.id, %err, "could not ensure farmer profile");
                None
            }
        };

        Ok(SignedIn { identity, profile })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcePrecedence;
    use crate::error::FarmError;
    use crate::identity::{IdentityError, LocalIdentityProvider, DEMO_EMAIL, DEMO_PASSWORD};
    use crate::local::LocalStore;
    use crate::models::StoreSource;
    use crate::test_utils::MemoryRemote;

    fn auth(kv: &KvStore, remote: Arc<MemoryRemote>) -> AuthService {
        let profiles = ProfileService::new(remote, LocalStore::new(kv.clone()), SourcePrecedence::RemoteFirst);
        AuthService::new(
            Arc::new(LocalIdentityProvider::with_demo_account()),
            SessionStore::new(kv.clone()),
            Arc::new(profiles),
        )
    }

    #[test]
    fn test_gate() {
        let kv = KvStore::in_memory().unwrap();
        let sessions = SessionStore::new(kv.clone());
        let gate = SessionGate::new(sessions.clone());

        assert_eq!(gate.check(true).unwrap(), Access::RedirectToLogin);
        assert_eq!(gate.check(false).unwrap(), Access::Unconfigured);

        let identity = UserIdentity::new("u-1", "a@example.com", "A");
        sessions.save(&identity).unwrap();
        assert_eq!(gate.check(true).unwrap().identity(), Some(&identity));
    }

    #[test]
    fn test_corrupt_session_is_ignored() {
        let kv = KvStore::in_memory().unwrap();
        kv.set(SESSION_KEY, &"not an identity").unwrap();

        assert!(SessionStore::new(kv).load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_persists_session_and_profile() {
        let kv = KvStore::in_memory().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let auth = auth(&kv, remote.clone());

        let signed_in = auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

        assert_eq!(auth.current().unwrap(), Some(signed_in.identity.clone()));
        assert_eq!(signed_in.profile.unwrap().source, StoreSource::Remote);
        assert_eq!(remote.farmers().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_with_bad_password() {
        let kv = KvStore::in_memory().unwrap();
        let auth = auth(&kv, Arc::new(MemoryRemote::new()));

        let err = auth.sign_in(DEMO_EMAIL, "nope").await.unwrap_err();
        assert!(matches!(err, FarmError::Identity(IdentityError::InvalidCredentials)));
        assert!(auth.current().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_offline_still_succeeds() {
        let kv = KvStore::in_memory().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        remote.set_reachable(false);
        let auth = auth(&kv, remote);

        let signed_in = auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        assert!(signed_in.profile.unwrap().is_local());
    }

    #[tokio::test]
    async fn test_sign_up_and_sign_out() {
        let kv = KvStore::in_memory().unwrap();
        let auth = auth(&kv, Arc::new(MemoryRemote::new()));

        let signed_up = auth.sign_up("new@example.com", "pw", None).await.unwrap();
        assert_eq!(signed_up.identity.name, crate::identity::DEFAULT_NAME);

        auth.sign_out().unwrap();
        assert!(auth.current().unwrap().is_none());
    }
}
