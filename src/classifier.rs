use crate::platform::{ChatKind, EntityKind, IncomingMessage};

/// The bot's own username, normalised once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    username: String,
}

impl BotIdentity {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.trim_start_matches('@').to_lowercase(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Case-insensitive username comparison; an empty identity matches nothing.
    fn is(&self, candidate: &str) -> bool {
        !self.username.is_empty() && candidate.to_lowercase() == self.username
    }

    fn mentioned_in(&self, text: &str) -> bool {
        !self.username.is_empty() && text.to_lowercase().contains(&self.username)
    }
}

/// What kind of message arrived, in routing priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modality {
    Sticker { emoji: String },
    Animation,
    Voice,
    Text(String),
}

impl Modality {
    /// Sticker beats animation beats voice beats text. Empty text is no text.
    pub fn of(msg: &IncomingMessage) -> Option<Self> {
        if let Some(sticker) = &msg.sticker {
            return Some(Modality::Sticker {
                emoji: sticker.emoji.clone().unwrap_or_default(),
            });
        }
        if msg.has_animation {
            return Some(Modality::Animation);
        }
        if msg.has_voice {
            return Some(Modality::Voice);
        }
        msg.text
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(|text| Modality::Text(text.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Modality::Sticker { .. } => "sticker",
            Modality::Animation => "animation",
            Modality::Voice => "voice",
            Modality::Text(_) => "text",
        }
    }
}

/// Whether a message is meant for the bot.
///
/// Private chats always are. In groups the message must either carry a
/// mention entity with the bot's username somewhere in the text, or reply
/// to a message the bot sent.
pub fn is_addressed(msg: &IncomingMessage, identity: &BotIdentity) -> bool {
    if msg.chat.kind == ChatKind::Private {
        return true;
    }

    let tagged = match msg.text.as_deref() {
        Some(text) => {
            msg.entities
                .iter()
                .any(|entity| entity.kind == EntityKind::Mention)
                && identity.mentioned_in(text)
        }
        None => false,
    };

    let replied_to_bot = msg
        .reply_to_username
        .as_deref()
        .is_some_and(|name| identity.is(name));

    tagged || replied_to_bot
}

/// Route a message: `None` when it is not for the bot or carries nothing usable.
pub fn classify(msg: &IncomingMessage, identity: &BotIdentity) -> Option<Modality> {
    if !is_addressed(msg, identity) {
        return None;
    }
    Modality::of(msg)
}
