pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod res;
pub mod rooms;
pub mod session;

use axum::{Router, extract::FromRef, routing::get};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore, cookie::SameSite};

pub use appresult::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub feed: rooms::MessageFeed,
    pub identity: auth::Identity,
    pub sessions: session::SessionRegistry,
}

pub fn session_layer<S: SessionStore + Clone>(store: S, idle_minutes: i64, secure: bool) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(idle_minutes)))
}

pub fn app<S: SessionStore + Clone>(app_state: AppState, session_layer: SessionManagerLayer<S>) -> Router {
    Router::new()
        .route("/app.css", get(res::stylesheet))
        .route("/room.js", get(res::room_script))
        .merge(auth::router())
        .merge(rooms::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}
