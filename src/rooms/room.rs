use axum::{debug_handler, extract::State, response::Html};

use crate::{AppResult, AppState, session::IdentitySession};

use super::{composer::Composer, feed::MessageFeed, view};

/// The front page: a sign-in prompt, or the room with its current messages.
#[debug_handler(state = AppState)]
pub async fn room(
    State(feed): State<MessageFeed>,
    session: IdentitySession,
) -> AppResult<Html<String>> {
    let viewer = session.current_user().await?;
    let messages = match viewer {
        Some(_) => feed.latest(),
        None => Vec::new().into(),
    };

    Ok(Html(view::render_page(viewer.as_ref(), &messages, &Composer::default())))
}
