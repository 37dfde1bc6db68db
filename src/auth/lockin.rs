use axum::{debug_handler, extract::{Path, Query, State}, response::Redirect};
use serde::Deserialize;

use crate::{AppResult, AppState, session::{CSRF_STATE, IdentitySession, PKCE_VERIFIER, RETURN_URL, SessionUser}};

use super::{ClientProvider, IdentityProvider, Identity};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Provider callback. A failed or cancelled sign-in leaves the browser
/// signed out and back on the front page without further explanation.
#[debug_handler(state = AppState)]
pub async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(query): Query<LockinQuery>,
    State(identity): State<Identity>,
    session: IdentitySession,
) -> AppResult<Redirect> {
    let return_url = session
        .0
        .remove::<String>(RETURN_URL)
        .await?
        .unwrap_or_else(|| "/".to_owned());

    match complete_sign_in(provider, query, identity.as_ref(), &session).await {
        Ok(user) => {
            session.establish(&user).await?;
            tracing::info!(uid = %user.uid, %provider, "signed in");
            Ok(Redirect::to(&return_url))
        }
        Err(err) => {
            tracing::warn!(%provider, error = %err.0, "sign-in abandoned");
            Ok(Redirect::to("/"))
        }
    }
}

async fn complete_sign_in(
    provider: ClientProvider,
    LockinQuery { state, code, error }: LockinQuery,
    identity: &dyn IdentityProvider,
    session: &IdentitySession,
) -> AppResult<SessionUser> {
    if let Some(error) = error {
        return Err(anyhow::anyhow!("provider refused: {error}").into());
    }
    let state = state.ok_or_else(|| anyhow::anyhow!("OAuth: without state"))?;
    let code = code.ok_or_else(|| anyhow::anyhow!("OAuth: without code"))?;

    let Some(stored_state) = session.0.remove::<String>(CSRF_STATE).await? else {
        return Err(anyhow::anyhow!("no csrf_state").into());
    };
    if state != stored_state {
        return Err(anyhow::anyhow!("csrf tokens don't match").into());
    }

    let Some(pkce_verifier) = session.0.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(anyhow::anyhow!("no pkce_verifier").into());
    };

    identity.exchange(provider, code, pkce_verifier).await
}
