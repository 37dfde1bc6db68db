//! Live binding between one open room page and the feed.
//!
//! Each socket owns one feed subscription and one composer; both go away
//! when the socket closes. The socket is also closed once the session
//! that opened it is signed out or expires.

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_sessions::session::Id;

use crate::{
    AppResult, AppState,
    db::Message,
    session::{IdentitySession, SessionRegistry, SessionUser},
};

use super::{
    composer::{Composer, SubmitError},
    feed::{FEED_LIMIT, FeedSubscription, MessageFeed},
    view,
};

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Draft { text: String },
    Submit,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Feed { html: String },
    Composer { draft: String, send_enabled: bool },
    ScrollToBottom,
}

enum Wake {
    Window(Option<Vec<Message>>),
    Incoming(Option<Result<WsMessage, axum::Error>>),
}

#[debug_handler(state = AppState)]
pub async fn room_ws(
    State(feed): State<MessageFeed>,
    State(sessions): State<SessionRegistry>,
    session: IdentitySession,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let (Some(viewer), Some(session_id)) = (session.current_user().await?, session.0.id()) else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let binding = RoomBinding {
        feed,
        sessions,
        session_id,
        viewer,
    };
    Ok(ws.on_upgrade(move |socket| {
        let (sender, receiver) = socket.split();
        binding.run(sender, receiver)
    }))
}

struct RoomBinding {
    feed: MessageFeed,
    sessions: SessionRegistry,
    session_id: Id,
    viewer: SessionUser,
}

impl RoomBinding {
    async fn run<S, R>(self, mut sender: S, mut receiver: R)
    where
        S: Sink<WsMessage> + Unpin,
        S::Error: std::error::Error + Send + Sync + 'static,
        R: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
    {
        let uid = self.viewer.uid.clone();
        tracing::info!(%uid, "room opened");

        let mut subscription = self.feed.subscribe(FEED_LIMIT);
        let mut composer = Composer::default();

        let first = feed_frame(&subscription.current(), &self.viewer);
        let mut open = send(&mut sender, &first).await.is_ok();

        while open {
            let wake = tokio::select! {
                window = subscription.changed() => Wake::Window(window),
                incoming = receiver.next() => Wake::Incoming(incoming),
            };

            if !self.still_signed_in().await {
                tracing::info!(%uid, "session ended, closing room");
                let _ = sender.send(WsMessage::Close(None)).await;
                break;
            }

            let frames = match wake {
                Wake::Window(Some(window)) => vec![feed_frame(&window, &self.viewer)],
                Wake::Window(None) => break,
                Wake::Incoming(Some(Ok(WsMessage::Text(text)))) => {
                    self.handle_frame(text.as_str(), &mut composer, &mut subscription).await
                }
                Wake::Incoming(Some(Ok(WsMessage::Close(_)))) | Wake::Incoming(None) => break,
                Wake::Incoming(Some(Ok(_))) => continue,
                Wake::Incoming(Some(Err(err))) => {
                    tracing::debug!(error = %err, "socket error");
                    break;
                }
            };

            for frame in &frames {
                if send(&mut sender, frame).await.is_err() {
                    open = false;
                    break;
                }
            }
        }

        subscription.unsubscribe();
        tracing::info!(%uid, "room closed");
    }

    async fn still_signed_in(&self) -> bool {
        match self.sessions.user(self.session_id).await {
            Ok(Some(user)) => user.uid == self.viewer.uid,
            Ok(None) => false,
            Err(err) => {
                tracing::warn!(uid = %self.viewer.uid, error = %err, "session lookup failed");
                false
            }
        }
    }

    async fn handle_frame(
        &self,
        text: &str,
        composer: &mut Composer,
        subscription: &mut FeedSubscription,
    ) -> Vec<ServerFrame> {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "ignoring unreadable frame");
                return Vec::new();
            }
        };

        match frame {
            ClientFrame::Draft { text } => {
                composer.update_draft(text);
                vec![composer_frame(composer)]
            }
            ClientFrame::Submit => match composer.submit(&self.feed, Some(&self.viewer)).await {
                Ok(message) => {
                    tracing::debug!(id = %message.id, uid = %message.uid, "message sent");
                    // the new window goes out before the scroll request
                    vec![
                        composer_frame(composer),
                        feed_frame(&subscription.current(), &self.viewer),
                        ServerFrame::ScrollToBottom,
                    ]
                }
                Err(SubmitError::EmptyDraft) => {
                    tracing::debug!("ignoring submit of an empty draft");
                    Vec::new()
                }
                Err(err) => {
                    tracing::warn!(uid = %self.viewer.uid, error = %err, "message not sent");
                    Vec::new()
                }
            },
        }
    }
}

fn feed_frame(window: &[Message], viewer: &SessionUser) -> ServerFrame {
    ServerFrame::Feed {
        html: view::render_feed(window, Some(viewer)),
    }
}

fn composer_frame(composer: &Composer) -> ServerFrame {
    ServerFrame::Composer {
        draft: composer.draft().to_owned(),
        send_enabled: composer.can_send(),
    }
}

async fn send<S>(sender: &mut S, frame: &ServerFrame) -> anyhow::Result<()>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(frame)?;
    sender.send(WsMessage::Text(json.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures_util::{sink, stream};
    use serde_json::{Value, json};
    use tokio::{sync::mpsc, task::JoinHandle};
    use tower_sessions::{MemoryStore, Session, SessionStore};

    use crate::rooms::store::tests::{memory_store, new_message};

    use super::*;

    /// The browser end of a bound room.
    struct Client {
        to_room: mpsc::UnboundedSender<Result<WsMessage, axum::Error>>,
        from_room: mpsc::UnboundedReceiver<WsMessage>,
    }

    impl Client {
        fn say(&self, frame: Value) {
            self.to_room.send(Ok(WsMessage::Text(frame.to_string().into()))).unwrap();
        }

        async fn next(&mut self) -> WsMessage {
            tokio::time::timeout(Duration::from_secs(2), self.from_room.recv())
                .await
                .expect("room went quiet")
                .expect("room hung up")
        }

        async fn next_frame(&mut self) -> Value {
            match self.next().await {
                WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    }

    struct Harness {
        feed: MessageFeed,
        store: MemoryStore,
        session_id: Id,
    }

    async fn harness(uid: &str) -> (Harness, RoomBinding) {
        let feed = MessageFeed::open(Arc::new(memory_store().await)).await.unwrap();
        let store = MemoryStore::default();
        let session = IdentitySession(Session::new(None, Arc::new(store.clone()), None));
        let viewer = SessionUser::new(uid, None);
        session.establish(&viewer).await.unwrap();
        session.0.save().await.unwrap();
        let session_id = session.0.id().unwrap();

        let binding = RoomBinding {
            feed: feed.clone(),
            sessions: SessionRegistry::new(store.clone()),
            session_id,
            viewer,
        };
        (Harness { feed, store, session_id }, binding)
    }

    fn connect(binding: RoomBinding) -> (Client, JoinHandle<()>) {
        let (to_room, inbox) = mpsc::unbounded_channel();
        let (outbox, from_room) = mpsc::unbounded_channel();

        let sender = Box::pin(sink::unfold(outbox, |outbox, message: WsMessage| async move {
            outbox.send(message).map_err(axum::Error::new)?;
            Ok::<_, axum::Error>(outbox)
        }));
        let receiver = Box::pin(stream::unfold(inbox, |mut inbox| async move {
            inbox.recv().await.map(|item| (item, inbox))
        }));

        let task = tokio::spawn(binding.run(sender, receiver));
        (Client { to_room, from_room }, task)
    }

    async fn finished(task: JoinHandle<()>) {
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[test]
    fn frames_use_tagged_json() {
        let draft: ClientFrame = serde_json::from_value(json!({"type": "draft", "text": "hey"})).unwrap();
        assert_eq!(draft, ClientFrame::Draft { text: "hey".to_owned() });
        let submit: ClientFrame = serde_json::from_value(json!({"type": "submit"})).unwrap();
        assert_eq!(submit, ClientFrame::Submit);

        assert_eq!(
            serde_json::to_value(ServerFrame::ScrollToBottom).unwrap(),
            json!({"type": "scroll_to_bottom"})
        );
        assert_eq!(
            serde_json::to_value(ServerFrame::Composer { draft: String::new(), send_enabled: false }).unwrap(),
            json!({"type": "composer", "draft": "", "send_enabled": false})
        );
    }

    #[tokio::test]
    async fn typing_then_sending() {
        let (harness, binding) = harness("u1").await;
        let (mut client, _task) = connect(binding);
        assert_eq!(client.next_frame().await, json!({"type": "feed", "html": ""}));

        client.say(json!({"type": "draft", "text": "hello"}));
        assert_eq!(
            client.next_frame().await,
            json!({"type": "composer", "draft": "hello", "send_enabled": true})
        );

        client.say(json!({"type": "submit"}));
        assert_eq!(
            client.next_frame().await,
            json!({"type": "composer", "draft": "", "send_enabled": false})
        );
        let feed = client.next_frame().await;
        assert_eq!(feed["type"], "feed");
        assert!(feed["html"].as_str().unwrap().contains("message sent"));
        assert!(feed["html"].as_str().unwrap().contains("hello"));
        assert_eq!(client.next_frame().await, json!({"type": "scroll_to_bottom"}));

        let window = harness.feed.latest();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].uid, "u1");
    }

    #[tokio::test]
    async fn empty_submit_and_garbage_send_nothing() {
        let (harness, binding) = harness("u1").await;
        let (mut client, _task) = connect(binding);
        client.next_frame().await;

        client.say(json!({"type": "submit"}));
        client.to_room.send(Ok(WsMessage::Text("not json".into()))).unwrap();
        client.say(json!({"type": "draft", "text": "x"}));

        assert_eq!(client.next_frame().await["type"], "composer");
        assert!(harness.feed.latest().is_empty());
    }

    #[tokio::test]
    async fn appends_from_elsewhere_reach_an_open_room() {
        let (harness, binding) = harness("u1").await;
        let (mut client, _task) = connect(binding);
        client.next_frame().await;

        harness.feed.append(new_message("u2", "from the other tab")).await.unwrap();

        let feed = client.next_frame().await;
        assert_eq!(feed["type"], "feed");
        let html = feed["html"].as_str().unwrap();
        assert!(html.contains("from the other tab"));
        assert!(html.contains("message received"));
    }

    #[tokio::test]
    async fn closing_the_socket_releases_the_subscription() {
        let (harness, binding) = harness("u1").await;
        let (mut client, task) = connect(binding);
        client.next_frame().await;
        assert_eq!(harness.feed.subscriber_count(), 1);

        drop(client.to_room);
        finished(task).await;
        assert_eq!(harness.feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn signing_out_elsewhere_closes_the_room() {
        let (harness, binding) = harness("u1").await;
        let (mut client, task) = connect(binding);
        client.next_frame().await;
        client.say(json!({"type": "draft", "text": "still here?"}));
        client.next_frame().await;

        harness.store.delete(&harness.session_id).await.unwrap();
        client.say(json!({"type": "submit"}));

        assert!(matches!(client.next().await, WsMessage::Close(None)));
        finished(task).await;
        assert!(harness.feed.latest().is_empty());
        assert_eq!(harness.feed.subscriber_count(), 0);
    }
}
