pub mod telegram;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::time::Duration;

/// Update identifiers as issued by the platform; strictly increasing.
pub type UpdateId = u32;

/// One inbound event from the platform
#[derive(Debug, Clone)]
pub struct Update {
    pub id: UpdateId,
    /// `None` for update kinds the bot does not act on (edits, callbacks, ...)
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    pub kind: ChatKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Mention,
    Other,
}

/// A text annotation. Only its kind matters: mentions are matched against
/// the whole text, not the annotated span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StickerInfo {
    pub emoji: Option<String>,
}

/// A message received from the platform, reduced to what the bot inspects
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
    pub sticker: Option<StickerInfo>,
    pub has_animation: bool,
    pub has_voice: bool,
    pub entities: Vec<Entity>,
    /// Username of whoever sent the message this one replies to
    pub reply_to_username: Option<String>,
}

impl IncomingMessage {
    /// A bare message in the given chat with no payload.
    #[allow(dead_code)]
    pub fn empty(chat: Chat) -> Self {
        Self {
            chat,
            text: None,
            sticker: None,
            has_animation: false,
            has_voice: false,
            entities: Vec::new(),
            reply_to_username: None,
        }
    }
}

/// Something the bot sends back; media are referenced by platform file id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(String),
    Sticker(String),
    Voice(String),
    Animation(String),
}

impl Outbound {
    /// Bot API method name, for logging
    pub fn method(&self) -> &'static str {
        match self {
            Outbound::Message(_) => "sendMessage",
            Outbound::Sticker(_) => "sendSticker",
            Outbound::Voice(_) => "sendVoice",
            Outbound::Animation(_) => "sendAnimation",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// The chat platform as seen by the polling loop
#[async_trait]
pub trait Platform: Send + Sync {
    /// Resolve the bot's own username.
    async fn get_me(&self) -> Result<String, PlatformError>;

    /// Long-poll for updates with id >= `offset` (all pending when `None`).
    async fn get_updates(
        &self,
        offset: Option<UpdateId>,
        timeout_secs: u32,
        limit: u8,
    ) -> Result<Vec<Update>, PlatformError>;

    async fn send(&self, chat_id: i64, outbound: &Outbound) -> Result<(), PlatformError>;
}
