use axum::{debug_handler, extract::Query, response::Redirect};
use serde::Deserialize;

use crate::session::IdentitySession;

use super::local_path;

#[derive(Deserialize)]
pub struct LogoutQuery {
    pub return_url: Option<String>,
}

#[debug_handler]
pub async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    session: IdentitySession,
) -> Redirect {
    session.sign_out().await;
    tracing::info!("signed out");
    Redirect::to(&local_path(return_url))
}
