//! Sign-in through a third-party identity provider.
//!
//! The browser is sent to the provider, comes back to `/lockin/{provider}`
//! with an authorization code, and the code is traded for a Firebase user.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Router, routing::get};

use crate::{AppResult, AppState, session::SessionUser};

mod clients;
mod lockin;
mod login;
mod logout;

pub use clients::{ClientProvider, Clients};
pub use lockin::lockin;
pub use login::login;
pub use logout::logout;

/// Where to send the browser, and what to remember until it returns.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub url: String,
    pub csrf_state: String,
    pub pkce_verifier: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorize(&self, provider: ClientProvider) -> AppResult<Authorization>;

    async fn exchange(
        &self,
        provider: ClientProvider,
        code: String,
        pkce_verifier: String,
    ) -> AppResult<SessionUser>;
}

pub type Identity = Arc<dyn IdentityProvider>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login))
        .route("/lockin/{provider}", get(lockin))
        .route("/logout", get(logout))
}

/// Accepts only same-site absolute paths as redirect targets.
pub(crate) fn local_path(url: Option<String>) -> String {
    url.filter(|url| url.starts_with('/') && !url.starts_with("//") && !url.contains('\\'))
        .unwrap_or_else(|| "/".to_owned())
}
