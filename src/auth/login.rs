use axum::{debug_handler, extract::{Path, Query, State}, response::Redirect};
use serde::Deserialize;

use crate::{AppResult, AppState, session::{CSRF_STATE, IdentitySession, PKCE_VERIFIER, RETURN_URL}};

use super::{ClientProvider, Identity, local_path};

#[derive(Deserialize)]
pub struct LoginQuery {
    pub return_url: Option<String>,
}

#[debug_handler(state = AppState)]
pub async fn login(
    Path(provider): Path<ClientProvider>,
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    State(identity): State<Identity>,
    session: IdentitySession,
) -> AppResult<Redirect> {
    let authorization = match identity.authorize(provider) {
        Ok(authorization) => authorization,
        Err(err) => {
            tracing::warn!(%provider, error = %err.0, "sign-in could not start");
            return Ok(Redirect::to("/"));
        }
    };

    session.0.insert(CSRF_STATE, &authorization.csrf_state).await?;
    session.0.insert(PKCE_VERIFIER, &authorization.pkce_verifier).await?;
    session.0.insert(RETURN_URL, local_path(return_url)).await?;

    Ok(Redirect::to(&authorization.url))
}
