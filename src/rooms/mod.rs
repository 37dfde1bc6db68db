mod composer;
mod feed;
mod room;
mod store;
mod view;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use composer::{Composer, SubmitError};
pub use feed::{FEED_LIMIT, FeedSubscription, MessageFeed, Snapshot};
pub use room::room;
pub use store::{MessageStore, SqliteMessageStore, StoreError};
pub use view::{FALLBACK_PHOTO_URL, RowSide, Screen};
pub use ws::room_ws;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(room))
        .route("/ws", get(room_ws))
}
