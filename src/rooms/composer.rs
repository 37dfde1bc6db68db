use crate::{db::{Message, NewMessage}, session::SessionUser};

use super::{feed::MessageFeed, store::StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("nothing to send")]
    EmptyDraft,
    #[error("message write failed: {0}")]
    Write(#[from] StoreError),
}

/// Draft text for one open room view.
#[derive(Debug, Default)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn can_send(&self) -> bool {
        !self.draft.is_empty()
    }

    /// Sends the draft as `author`, clearing it once the write lands.
    ///
    /// Without an author the message is stamped with an empty uid; callers
    /// are expected to only offer a composer to signed-in users.
    pub async fn submit(
        &mut self,
        feed: &MessageFeed,
        author: Option<&SessionUser>,
    ) -> Result<Message, SubmitError> {
        if !self.can_send() {
            return Err(SubmitError::EmptyDraft);
        }

        let (uid, photo_url) = match author {
            Some(user) => (user.uid.clone(), user.photo_url.clone().unwrap_or_default()),
            None => {
                tracing::warn!("sending a message without a signed-in author");
                (String::new(), String::new())
            }
        };

        let message = feed
            .append(NewMessage {
                uid,
                text: self.draft.clone(),
                photo_url,
            })
            .await?;

        self.draft.clear();
        Ok(message)
    }
}
