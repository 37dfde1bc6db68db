//! Rendering for the single room: which screen to show and how each
//! message row looks to the current viewer.

use pulldown_cmark_escape::{FmtWriter, escape_href, escape_html};

use crate::{db::Message, include_res, session::SessionUser};

use super::composer::Composer;

pub const FALLBACK_PHOTO_URL: &str =
    "https://pm1.narvii.com/6336/857c16b5b11e6e3a67ad74d62f667c35aab93735_00.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SignedOut,
    ChatRoom,
}

impl Screen {
    pub fn for_viewer(viewer: Option<&SessionUser>) -> Self {
        match viewer {
            Some(_) => Screen::ChatRoom,
            None => Screen::SignedOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSide {
    Sent,
    Received,
}

impl RowSide {
    pub fn of(message: &Message, viewer: Option<&SessionUser>) -> Self {
        match viewer {
            Some(viewer) if viewer.uid == message.uid => RowSide::Sent,
            _ => RowSide::Received,
        }
    }

    pub fn class(self) -> &'static str {
        match self {
            RowSide::Sent => "sent",
            RowSide::Received => "received",
        }
    }
}

pub fn photo_src(message: &Message) -> &str {
    message
        .photo_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .unwrap_or(FALLBACK_PHOTO_URL)
}

pub fn render_message(message: &Message, viewer: Option<&SessionUser>) -> String {
    include_res!(str, "/pages/message.html")
        .replace("{class}", RowSide::of(message, viewer).class())
        .replace("{photo}", &escaped(photo_src(message), Escape::Href))
        .replace("{text}", &escaped(&message.text, Escape::Html))
}

enum Escape {
    Href,
    Html,
}

fn escaped(raw: &str, escape: Escape) -> String {
    let mut out = String::with_capacity(raw.len());
    // writing into a String cannot fail
    let _ = match escape {
        Escape::Href => escape_href(FmtWriter(&mut out), raw),
        Escape::Html => escape_html(FmtWriter(&mut out), raw),
    };
    out
}

pub fn render_feed(messages: &[Message], viewer: Option<&SessionUser>) -> String {
    messages
        .iter()
        .map(|message| render_message(message, viewer))
        .collect()
}

/// The whole page for `viewer`, with `messages` as the initial feed.
pub fn render_page(viewer: Option<&SessionUser>, messages: &[Message], composer: &Composer) -> String {
    let (actions, section) = match Screen::for_viewer(viewer) {
        Screen::SignedOut => (
            String::new(),
            include_res!(str, "/pages/sign_in.html").to_owned(),
        ),
        Screen::ChatRoom => (
            include_res!(str, "/pages/sign_out.html").to_owned(),
            include_res!(str, "/pages/chat_room.html")
                .replace("{send_disabled}", if composer.can_send() { "" } else { "disabled" })
                .replace("{messages}", &render_feed(messages, viewer)),
        ),
    };

    include_res!(str, "/pages/index.html")
        .replace("{actions}", &actions)
        .replace("{section}", &section)
}
