use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, MessageEntity, MessageEntityKind, UpdateKind};
use teloxide::RequestError;
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::platform::{
    Chat, ChatKind, Entity, EntityKind, IncomingMessage, Outbound, Platform, PlatformError,
    StickerInfo, Update, UpdateId,
};

/// Telegram Bot API access through teloxide's request layer.
///
/// Only the raw requests are used; update polling, filtering and the
/// offset bookkeeping live in the bot loop.
pub struct TelegramPlatform {
    bot: Bot,
    request_timeout: Duration,
}

impl TelegramPlatform {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // The long-poll request sets the client-wide ceiling; the other
        // calls are bounded individually by `request_timeout`.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.long_poll_http_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build Telegram HTTP client")?;

        let api_url = reqwest::Url::parse(&config.api_url)
            .with_context(|| format!("Invalid Telegram API URL: {}", config.api_url))?;

        let bot = Bot::with_client(&config.bot_token, client).set_api_url(api_url);

        info!("Telegram client ready (api: {})", config.api_url);
        Ok(Self {
            bot,
            request_timeout: config.request_timeout(),
        })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, PlatformError>
    where
        F: Future<Output = Result<T, RequestError>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(map_request_error),
            Err(_) => Err(PlatformError::Timeout(self.request_timeout)),
        }
    }
}

#[async_trait]
impl Platform for TelegramPlatform {
    async fn get_me(&self) -> Result<String, PlatformError> {
        let me = self.bounded(self.bot.get_me().send()).await?;
        me.user
            .username
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PlatformError::Malformed("getMe returned no username".to_string()))
    }

    async fn get_updates(
        &self,
        offset: Option<UpdateId>,
        timeout_secs: u32,
        limit: u8,
    ) -> Result<Vec<Update>, PlatformError> {
        let mut request = self.bot.get_updates().timeout(timeout_secs).limit(limit);
        if let Some(offset) = offset {
            request = request.offset(i32::try_from(offset).unwrap_or(i32::MAX));
        }

        // Bounded by the client timeout, which exceeds the long-poll window.
        let updates = request.await.map_err(map_request_error)?;
        debug!("getUpdates returned {} update(s)", updates.len());

        Ok(updates.into_iter().map(convert_update).collect())
    }

    async fn send(&self, chat_id: i64, outbound: &Outbound) -> Result<(), PlatformError> {
        let chat = ChatId(chat_id);
        let call = async {
            match outbound {
                Outbound::Message(text) => {
                    self.bot.send_message(chat, text.clone()).await.map(drop)
                }
                Outbound::Sticker(file_id) => self
                    .bot
                    .send_sticker(chat, InputFile::file_id(FileId(file_id.clone())))
                    .await
                    .map(drop),
                Outbound::Voice(file_id) => self
                    .bot
                    .send_voice(chat, InputFile::file_id(FileId(file_id.clone())))
                    .await
                    .map(drop),
                Outbound::Animation(file_id) => self
                    .bot
                    .send_animation(chat, InputFile::file_id(FileId(file_id.clone())))
                    .await
                    .map(drop),
            }
        };
        self.bounded(call).await
    }
}

fn map_request_error(err: RequestError) -> PlatformError {
    match &err {
        RequestError::Api(_) => PlatformError::Rejected(err.to_string()),
        RequestError::InvalidJson { .. } => PlatformError::Malformed(err.to_string()),
        _ => PlatformError::Transport(err.to_string()),
    }
}

fn convert_update(update: teloxide::types::Update) -> Update {
    let message = match &update.kind {
        UpdateKind::Message(msg) => Some(convert_message(msg)),
        _ => None,
    };
    Update {
        id: update.id.0,
        message,
    }
}

fn convert_message(msg: &Message) -> IncomingMessage {
    let kind = if msg.chat.is_private() {
        ChatKind::Private
    } else {
        ChatKind::Group
    };

    IncomingMessage {
        chat: Chat {
            id: msg.chat.id.0,
            kind,
        },
        text: msg.text().map(str::to_owned),
        sticker: msg.sticker().map(|s| StickerInfo {
            emoji: s.emoji.clone(),
        }),
        has_animation: msg.animation().is_some(),
        has_voice: msg.voice().is_some(),
        entities: msg
            .entities()
            .map(|entities| entities.iter().map(convert_entity).collect())
            .unwrap_or_default(),
        reply_to_username: msg
            .reply_to_message()
            .and_then(|replied| replied.from.as_ref())
            .and_then(|user| user.username.clone()),
    }
}

fn convert_entity(entity: &MessageEntity) -> Entity {
    let kind = match entity.kind {
        MessageEntityKind::Mention => EntityKind::Mention,
        _ => EntityKind::Other,
    };
    Entity { kind }
}
