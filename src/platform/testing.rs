//! In-memory collaborators for driving the bot loop in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Completer, LlmError};
use crate::platform::{
    Chat, ChatKind, IncomingMessage, Outbound, Platform, PlatformError, Update, UpdateId,
};

pub const PRIVATE_CHAT: Chat = Chat {
    id: 42,
    kind: ChatKind::Private,
};

pub const GROUP_CHAT: Chat = Chat {
    id: -100,
    kind: ChatKind::Group,
};

pub fn text_message(chat: Chat, text: &str) -> IncomingMessage {
    IncomingMessage {
        text: Some(text.to_string()),
        ..IncomingMessage::empty(chat)
    }
}

pub fn update(id: UpdateId, message: IncomingMessage) -> Update {
    Update {
        id,
        message: Some(message),
    }
}

/// Platform that replays scripted poll results and records every send.
pub struct ScriptedPlatform {
    username: Option<String>,
    polls: Mutex<VecDeque<Result<Vec<Update>, PlatformError>>>,
    offsets: Mutex<Vec<Option<UpdateId>>>,
    sent: Mutex<Vec<(i64, Outbound)>>,
    failing_methods: Vec<&'static str>,
}

impl ScriptedPlatform {
    pub fn new(username: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            polls: Mutex::new(VecDeque::new()),
            offsets: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            failing_methods: Vec::new(),
        }
    }

    /// A platform whose `get_me` fails.
    pub fn anonymous() -> Self {
        Self {
            username: None,
            ..Self::new("")
        }
    }

    pub fn with_poll(self, result: Result<Vec<Update>, PlatformError>) -> Self {
        self.polls.lock().unwrap().push_back(result);
        self
    }

    /// Make every send through the given Bot API method fail.
    pub fn failing(mut self, method: &'static str) -> Self {
        self.failing_methods.push(method);
        self
    }

    pub fn sent(&self) -> Vec<(i64, Outbound)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn offsets(&self) -> Vec<Option<UpdateId>> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for ScriptedPlatform {
    async fn get_me(&self) -> Result<String, PlatformError> {
        self.username
            .clone()
            .ok_or_else(|| PlatformError::Rejected("Unauthorized".to_string()))
    }

    async fn get_updates(
        &self,
        offset: Option<UpdateId>,
        _timeout_secs: u32,
        _limit: u8,
    ) -> Result<Vec<Update>, PlatformError> {
        self.offsets.lock().unwrap().push(offset);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send(&self, chat_id: i64, outbound: &Outbound) -> Result<(), PlatformError> {
        self.sent.lock().unwrap().push((chat_id, outbound.clone()));
        if self.failing_methods.contains(&outbound.method()) {
            return Err(PlatformError::Rejected("Bad Request".to_string()));
        }
        Ok(())
    }
}

/// Completer that returns a fixed outcome and records the prompts it saw.
pub struct ScriptedCompleter {
    outcome: Result<String, LlmError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub fn replying(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: LlmError) -> Self {
        Self {
            outcome: Err(err),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.outcome.clone()
    }
}
