use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";
/// Environment variable holding the completion API key.
pub const OPENAI_KEY_VAR: &str = "OPENAI_KEY";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openai,
    Openrouter,
    Ollama,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openai => write!(f, "openai"),
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    /// Filled from the environment, never from the file.
    #[serde(skip)]
    pub api_key: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return self.base_url.trim_end_matches('/');
        }
        match self.provider {
            LlmProvider::Openai => "https://api.openai.com/v1",
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            base_url: String::new(),
            api_key: String::new(),
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Filled from the environment, never from the file.
    #[serde(skip)]
    pub bot_token: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
    #[serde(default = "default_poll_limit")]
    pub poll_limit: u8,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl TelegramConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// HTTP timeout for the long-poll request; must outlive the poll itself.
    pub fn long_poll_http_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_timeout_secs) + 10)
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_limit: default_poll_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_backoff_floor_secs")]
    pub backoff_floor_secs: u64,
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,
    #[serde(default = "default_idle_pause_ms")]
    pub idle_pause_ms: u64,
    #[serde(default = "default_error_pause_secs")]
    pub error_pause_secs: u64,
}

impl PollingConfig {
    pub fn backoff_floor(&self) -> Duration {
        Duration::from_secs(self.backoff_floor_secs)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_secs(self.backoff_ceiling_secs)
    }

    pub fn idle_pause(&self) -> Duration {
        Duration::from_millis(self.idle_pause_ms)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_secs(self.error_pause_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            backoff_floor_secs: default_backoff_floor_secs(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
            idle_pause_ms: default_idle_pause_ms(),
            error_pause_secs: default_error_pause_secs(),
        }
    }
}

/// Canned replies, trigger phrases and prompt templates.
#[derive(Debug, Deserialize, Clone)]
pub struct PersonaConfig {
    #[serde(default = "default_identity_reply")]
    pub identity_reply: String,
    #[serde(default = "default_attribution_reply")]
    pub attribution_reply: String,
    #[serde(default = "default_voice_reply")]
    pub voice_reply: String,
    #[serde(default = "default_name_phrases")]
    pub name_phrases: Vec<String>,
    #[serde(default = "default_creator_phrases")]
    pub creator_phrases: Vec<String>,
    /// `{emoji}` is replaced with the sticker's emoji.
    #[serde(default = "default_sticker_prompt")]
    pub sticker_prompt: String,
    #[serde(default = "default_animation_prompt")]
    pub animation_prompt: String,
    /// Used when the completion API answers with something unusable.
    #[serde(default = "default_malformed_fallback")]
    pub malformed_fallback: String,
    /// Used when the completion API cannot be reached at all.
    #[serde(default = "default_unavailable_fallback")]
    pub unavailable_fallback: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            identity_reply: default_identity_reply(),
            attribution_reply: default_attribution_reply(),
            voice_reply: default_voice_reply(),
            name_phrases: default_name_phrases(),
            creator_phrases: default_creator_phrases(),
            sticker_prompt: default_sticker_prompt(),
            animation_prompt: default_animation_prompt(),
            malformed_fallback: default_malformed_fallback(),
            unavailable_fallback: default_unavailable_fallback(),
        }
    }
}

/// Platform file ids for the media the bot attaches to replies.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AssetPacks {
    #[serde(default)]
    pub stickers: Vec<String>,
    #[serde(default)]
    pub voices: Vec<String>,
    #[serde(default)]
    pub animations: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub assets: AssetPacks,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    15
}

fn default_system_prompt() -> String {
    "You are Shinobu Kocho \u{2014} cute, kind, emotional, playful anime girl who gives \
     short sweet replies unless user is sad (then long comforting replies)."
        .to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u32 {
    60
}

fn default_poll_limit() -> u8 {
    50
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "ShinobuBot/1.0".to_string()
}

fn default_backoff_floor_secs() -> u64 {
    1
}

fn default_backoff_ceiling_secs() -> u64 {
    60
}

fn default_idle_pause_ms() -> u64 {
    100
}

fn default_error_pause_secs() -> u64 {
    2
}

fn default_identity_reply() -> String {
    "Hehe~ I'm Shinobu Kocho \u{1F49C} GOAT + COAT (Greatest + Cutest of All Time!)".to_string()
}

fn default_attribution_reply() -> String {
    "My cutie creator is @just_shinobuu \u{1F4AB}".to_string()
}

fn default_voice_reply() -> String {
    "Hehe~ your voice is so sweet \u{1F61A} listen to mine~".to_string()
}

fn default_name_phrases() -> Vec<String> {
    vec!["your name".to_string(), "tumhara naam".to_string()]
}

fn default_creator_phrases() -> Vec<String> {
    vec!["owner".to_string(), "creator".to_string()]
}

fn default_sticker_prompt() -> String {
    "User sent a sticker with emoji {emoji}\nReply like Shinobu Kocho.".to_string()
}

fn default_animation_prompt() -> String {
    "User sent a cute GIF animation \u{1F49E} Reply like Shinobu Kocho.".to_string()
}

fn default_malformed_fallback() -> String {
    "Sorry, I couldn't think of a reply right now~".to_string()
}

fn default_unavailable_fallback() -> String {
    "Hehe~ I can't talk to OpenAI right now, but I'm still cute!".to_string()
}

impl Config {
    /// Load the optional TOML file, then pull secrets from the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else {
            None
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from file content (if any) and an environment lookup.
    pub fn from_sources<F>(content: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match content {
            Some(text) => toml::from_str(text).context("Failed to parse config file")?,
            None => Config::default(),
        };

        let bot_token = env(BOT_TOKEN_VAR).filter(|v| !v.trim().is_empty());
        let api_key = env(OPENAI_KEY_VAR).filter(|v| !v.trim().is_empty());
        match (bot_token, api_key) {
            (Some(token), Some(key)) => {
                config.telegram.bot_token = token;
                config.llm.api_key = key;
            }
            _ => anyhow::bail!(
                "Missing {} or {} environment variable",
                BOT_TOKEN_VAR,
                OPENAI_KEY_VAR
            ),
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let polling = &self.polling;
        if polling.backoff_floor_secs == 0 {
            anyhow::bail!("polling.backoff_floor_secs must be at least 1");
        }
        if polling.backoff_floor_secs > polling.backoff_ceiling_secs {
            anyhow::bail!(
                "polling.backoff_floor_secs ({}) exceeds backoff_ceiling_secs ({})",
                polling.backoff_floor_secs,
                polling.backoff_ceiling_secs
            );
        }
        if !(1..=100).contains(&self.telegram.poll_limit) {
            anyhow::bail!(
                "telegram.poll_limit must be between 1 and 100, got {}",
                self.telegram.poll_limit
            );
        }
        Ok(())
    }
}
