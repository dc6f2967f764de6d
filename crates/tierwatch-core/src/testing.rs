//! In-crate fakes for unit tests

use crate::channel::{Attachment, ChannelMessage, ChatChannel, PublishError};
use crate::model::MessageId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    next_id: u64,
    /// Oldest first
    messages: Vec<ChannelMessage>,
    creates: usize,
    edits: usize,
    fail_next_edit: Option<PublishError>,
    fail_creates: bool,
}

/// Channel kept in memory
#[derive(Default)]
pub(crate) struct FakeChannel {
    state: Mutex<State>,
}

impl FakeChannel {
    pub(crate) fn seed(&self, content: &str, posted_at: DateTime<Utc>) -> MessageId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = MessageId(state.next_id);
        state.messages.push(ChannelMessage {
            id,
            content: content.to_string(),
            posted_at,
        });
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub(crate) fn content(&self, id: MessageId) -> Option<String> {
        self.state
            .lock()
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.content.clone())
    }

    pub(crate) fn creates(&self) -> usize {
        self.state.lock().creates
    }

    pub(crate) fn edits(&self) -> usize {
        self.state.lock().edits
    }

    pub(crate) fn fail_next_edit(&self, error: PublishError) {
        self.state.lock().fail_next_edit = Some(error);
    }

    pub(crate) fn fail_creates(&self, fail: bool) {
        self.state.lock().fail_creates = fail;
    }
}

#[async_trait]
impl ChatChannel for FakeChannel {
    async fn history(&self, limit: usize) -> Result<Vec<ChannelMessage>, PublishError> {
        let state = self.state.lock();
        Ok(state.messages.iter().rev().take(limit).cloned().collect())
    }

    async fn create(
        &self,
        content: &str,
        _attachment: Option<&Attachment>,
    ) -> Result<MessageId, PublishError> {
        if self.state.lock().fail_creates {
            return Err(PublishError::Platform("create refused".into()));
        }
        let id = self.seed(content, Utc::now());
        self.state.lock().creates += 1;
        Ok(id)
    }

    async fn edit(
        &self,
        id: MessageId,
        content: &str,
        _attachment: Option<&Attachment>,
    ) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_edit.take() {
            return Err(error);
        }
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(PublishError::NotFound(id))?;
        message.content = content.to_string();
        state.edits += 1;
        Ok(())
    }

    async fn delete(&self, id: MessageId) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        let before = state.messages.len();
        state.messages.retain(|m| m.id != id);
        if state.messages.len() == before {
            return Err(PublishError::NotFound(id));
        }
        Ok(())
    }
}
