//! The identity session: who, if anyone, is signed in on this browser.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde_json::Value;
use time::OffsetDateTime;
use tower_sessions::{Session, SessionStore, session::Id, session_store};

pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";
pub const USER_ID: &str = "user_id";
pub const PHOTO_URL: &str = "photo_url";

/// A signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub uid: String,
    pub photo_url: Option<String>,
}

impl SessionUser {
    pub fn new(uid: impl Into<String>, photo_url: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            photo_url: photo_url.filter(|url| !url.is_empty()),
        }
    }
}

/// Request-scoped handle over the cookie session.
#[derive(Clone, Debug)]
pub struct IdentitySession(pub Session);

impl IdentitySession {
    pub async fn current_user(&self) -> Result<Option<SessionUser>, tower_sessions::session::Error> {
        let Some(uid) = self.0.get::<String>(USER_ID).await? else {
            return Ok(None);
        };
        let photo_url = self.0.get::<String>(PHOTO_URL).await?;
        Ok(Some(SessionUser::new(uid, photo_url)))
    }

    pub(crate) async fn establish(&self, user: &SessionUser) -> Result<(), tower_sessions::session::Error> {
        // new id on privilege change
        self.0.cycle_id().await?;
        self.0.remove_value(CSRF_STATE).await?;
        self.0.remove_value(PKCE_VERIFIER).await?;
        self.0.insert(USER_ID, &user.uid).await?;
        self.0.insert(PHOTO_URL, user.photo_url.clone().unwrap_or_default()).await?;
        Ok(())
    }

    pub async fn sign_out(&self) {
        self.0.clear().await;
    }
}

/// Reads sessions straight from the store, for connections that outlive
/// the request that opened them.
#[derive(Clone, Debug)]
pub struct SessionRegistry(Arc<dyn SessionStore>);

impl SessionRegistry {
    pub fn new(store: impl SessionStore) -> Self {
        Self(Arc::new(store))
    }

    /// The user behind session `id`; `None` once it was signed out or expired.
    pub async fn user(&self, id: Id) -> Result<Option<SessionUser>, session_store::Error> {
        let Some(record) = self.0.load(&id).await? else {
            return Ok(None);
        };
        if record.expiry_date <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        let field = |key: &str| record.data.get(key).and_then(Value::as_str).map(str::to_owned);
        Ok(field(USER_ID).map(|uid| SessionUser::new(uid, field(PHOTO_URL))))
    }
}

impl<S> FromRequestParts<S> for IdentitySession
where
    S: Send + Sync,
{
    type Rejection = <Session as FromRequestParts<S>>::Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Session::from_request_parts(parts, state).await.map(IdentitySession)
    }
}
