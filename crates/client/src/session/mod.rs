//! Session context.
//!
//! [`SessionContext`] owns the current `{user, token}` and is handed to every
//! consumer that needs it (router, desks, CLI). It keeps three things in step:
//! the in-memory session, the token installed on the [`ApiClient`], and the
//! persisted copy in a [`SessionStore`].

mod store;
mod token;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoredSession};
pub use token::AccessToken;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use mediplus_core::{Email, EmailError, Role, User};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, ApiError, NewAccount};

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session file is corrupt: {0}")]
    Corrupt(String),

    #[error("Session store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The signed-in user and their token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: AccessToken,
}

/// Shared, explicitly passed session state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionContextInner>,
}

struct SessionContextInner {
    api: ApiClient,
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<Session>>,
}

impl SessionContext {
    #[must_use]
    pub fn new(api: ApiClient, store: impl SessionStore + 'static) -> Self {
        Self {
            inner: Arc::new(SessionContextInner {
                api,
                store: Arc::new(store),
                current: RwLock::new(None),
            }),
        }
    }

    /// The gateway, with this session's token installed.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub async fn current(&self) -> Option<Session> {
        self.inner.current.read().await.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.inner
            .current
            .read()
            .await
            .as_ref()
            .map(|s| s.user.clone())
    }

    pub async fn role(&self) -> Option<Role> {
        self.inner.current.read().await.as_ref().map(|s| s.user.role)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.current.read().await.is_some()
    }

    /// The signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAuthenticated` when signed out.
    pub async fn require_user(&self) -> Result<User, SessionError> {
        self.user().await.ok_or(SessionError::NotAuthenticated)
    }

    /// Load the persisted session at start-up.
    ///
    /// A token whose `exp` has passed, or an unreadable session file, is
    /// discarded and the file removed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Io` if the store cannot be read or cleared.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<User>, SessionError> {
        let stored = match self.with_store(|store| store.load()).await {
            Ok(stored) => stored,
            Err(SessionError::Corrupt(reason)) => {
                warn!(%reason, "discarding unreadable session");
                self.with_store(|store| store.clear()).await?;
                None
            }
            Err(e) => return Err(e),
        };

        let Some(stored) = stored else {
            return Ok(None);
        };

        let token = AccessToken::new(stored.access_token);
        if token.is_expired() {
            info!(email = %stored.user.email, "stored session expired");
            self.with_store(|store| store.clear()).await?;
            return Ok(None);
        }

        let user = stored.user;
        self.install(Session {
            user: user.clone(),
            token,
        })
        .await;
        Ok(Some(user))
    }

    /// Sign in and persist the session.
    ///
    /// On failure nothing is changed: an existing session stays as it was.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingField`/`InvalidEmail` before any request,
    /// `SessionError::Api` when the backend rejects the credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, SessionError> {
        if email.trim().is_empty() {
            return Err(SessionError::MissingField("email"));
        }
        if password.expose_secret().is_empty() {
            return Err(SessionError::MissingField("password"));
        }
        let email = Email::parse(email)?;

        let auth = self.inner.api.auth();
        let token = auth.token(&email, password).await?;
        let user = auth.me_with(&token).await?;

        let stored = StoredSession {
            access_token: token.expose().to_string(),
            user: user.clone(),
            saved_at: Utc::now(),
        };
        self.with_store(move |store| store.save(&stored)).await?;
        self.install(Session {
            user: user.clone(),
            token,
        })
        .await;

        info!(user_id = %user.user_id, role = %user.role, "signed in");
        Ok(user)
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingField`/`InvalidEmail` before any request,
    /// `SessionError::Api` when registration or login is rejected.
    #[instrument(skip(self, password))]
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
        role: Role,
        hospital_name: Option<&str>,
    ) -> Result<User, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::MissingField("name"));
        }
        if email.trim().is_empty() {
            return Err(SessionError::MissingField("email"));
        }
        if password.expose_secret().is_empty() {
            return Err(SessionError::MissingField("password"));
        }
        let parsed = Email::parse(email)?;

        self.inner
            .api
            .auth()
            .register(&NewAccount {
                name: name.to_string(),
                email: parsed,
                password: password.clone(),
                role,
                hospital_name: hospital_name
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(ToString::to_string),
            })
            .await?;

        self.login(email, password).await
    }

    /// Clear the persisted and in-memory session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Io` if the session file cannot be removed; the
    /// in-memory session is cleared regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SessionError> {
        let was = self.inner.current.write().await.take();
        self.inner.api.clear_token().await;
        if let Some(session) = was {
            info!(user_id = %session.user.user_id, "signed out");
        }
        self.with_store(|store| store.clear()).await
    }

    /// Re-read the profile from the backend. A 401 signs the session out.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAuthenticated` when signed out or when the
    /// backend no longer accepts the token.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> Result<User, SessionError> {
        let Some(session) = self.current().await else {
            return Err(SessionError::NotAuthenticated);
        };

        match self.inner.api.auth().me().await {
            Ok(user) => {
                let stored = StoredSession {
                    access_token: session.token.expose().to_string(),
                    user: user.clone(),
                    saved_at: Utc::now(),
                };
                self.with_store(move |store| store.save(&stored)).await?;
                if let Some(current) = self.inner.current.write().await.as_mut() {
                    current.user = user.clone();
                }
                Ok(user)
            }
            Err(e) if e.is_unauthorized() => {
                warn!("token rejected; signing out");
                self.logout().await?;
                Err(SessionError::NotAuthenticated)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run a store call on the blocking pool; the file store does disk I/O.
    async fn with_store<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SessionStore) -> Result<T, SessionError> + Send + 'static,
    {
        let store = Arc::clone(&self.inner.store);
        tokio::task::spawn_blocking(move || f(store.as_ref())).await?
    }

    async fn install(&self, session: Session) {
        self.inner.api.set_token(session.token.clone()).await;
        *self.inner.current.write().await = Some(session);
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("api", &self.inner.api)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::time::Duration;

    use mediplus_core::UserId;
    use url::Url;

    use super::token::tests::jwt_with_exp;
    use super::*;

    pub(crate) fn offline_api() -> ApiClient {
        // Port 9 (discard) on loopback: requests fail fast if ever sent.
        ApiClient::with_base_url(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_millis(200),
        )
        .unwrap()
    }

    pub(crate) fn user(role: Role) -> User {
        User {
            id: None,
            user_id: UserId::new(123),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            role,
        }
    }

    pub(crate) fn stored(role: Role, exp: i64) -> StoredSession {
        StoredSession {
            access_token: jwt_with_exp("asha@example.com", exp),
            user: user(role),
            saved_at: Utc::now(),
        }
    }

    fn far_future() -> i64 {
        Utc::now().timestamp() + 3_600
    }

    /// A context already signed in as `role`, without touching the network.
    pub(crate) async fn signed_in(role: Role) -> SessionContext {
        let store = MemorySessionStore::new();
        store.save(&stored(role, far_future())).unwrap();
        let ctx = SessionContext::new(offline_api(), store);
        ctx.restore().await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_restore_valid_session_installs_token() {
        let ctx = signed_in(Role::Doctor).await;
        assert!(ctx.is_authenticated().await);
        assert_eq!(ctx.role().await, Some(Role::Doctor));
        assert!(ctx.api().has_token().await);
    }

    #[tokio::test]
    async fn test_restore_discards_expired_token() {
        let store = MemorySessionStore::new();
        store
            .save(&stored(Role::Patient, Utc::now().timestamp() - 10))
            .unwrap();
        let ctx = SessionContext::new(offline_api(), store);

        assert!(ctx.restore().await.unwrap().is_none());
        assert!(!ctx.is_authenticated().await);
        assert!(ctx.inner.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_discards_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "garbage").unwrap();
        let ctx = SessionContext::new(offline_api(), FileSessionStore::new(&path));

        assert!(ctx.restore().await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_store_runs_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        FileSessionStore::new(&path)
            .save(&stored(Role::Admin, far_future()))
            .unwrap();
        let ctx = SessionContext::new(offline_api(), FileSessionStore::new(&path));

        // Another task on the current-thread runtime still runs while the
        // file is read and removed.
        let ticker = tokio::spawn(async {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        });
        assert_eq!(
            ctx.restore().await.unwrap().map(|u| u.role),
            Some(Role::Admin)
        );
        ctx.logout().await.unwrap();
        ticker.await.unwrap();

        assert!(!path.exists());
        assert!(!ctx.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let ctx = signed_in(Role::Pharmacist).await;
        ctx.logout().await.unwrap();

        assert!(!ctx.is_authenticated().await);
        assert!(!ctx.api().has_token().await);
        assert!(ctx.inner.store.load().unwrap().is_none());
        assert!(matches!(
            ctx.require_user().await,
            Err(SessionError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_login_checks_fields_before_any_request() {
        let ctx = SessionContext::new(offline_api(), MemorySessionStore::new());
        let password = SecretString::from("pw");

        assert!(matches!(
            ctx.login("  ", &password).await,
            Err(SessionError::MissingField("email"))
        ));
        assert!(matches!(
            ctx.login("asha@example.com", &SecretString::from("")).await,
            Err(SessionError::MissingField("password"))
        ));
        assert!(matches!(
            ctx.login("not-an-email", &password).await,
            Err(SessionError::InvalidEmail(_))
        ));
        assert!(!ctx.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_refresh_profile_requires_session() {
        let ctx = SessionContext::new(offline_api(), MemorySessionStore::new());
        assert!(matches!(
            ctx.refresh_profile().await,
            Err(SessionError::NotAuthenticated)
        ));
    }
}
