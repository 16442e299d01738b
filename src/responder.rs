use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::classifier::Modality;
use crate::config::{AssetPacks, PersonaConfig};
use crate::llm::{Completer, LlmError};
use crate::platform::Outbound;

/// A composed answer: the text goes out first, then each media item in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub media: Vec<Outbound>,
}

impl Reply {
    pub fn into_outbound(self) -> Vec<Outbound> {
        let mut sends = Vec::with_capacity(self.media.len() + 1);
        sends.push(Outbound::Message(self.text));
        sends.extend(self.media);
        sends
    }
}

pub struct Responder<C> {
    completer: C,
    persona: PersonaConfig,
    assets: AssetPacks,
}

impl<C: Completer> Responder<C> {
    pub fn new(completer: C, persona: PersonaConfig, assets: AssetPacks) -> Self {
        Self {
            completer,
            persona,
            assets,
        }
    }

    #[cfg(test)]
    pub fn completer(&self) -> &C {
        &self.completer
    }

    pub async fn respond(&self, modality: &Modality) -> Reply {
        match modality {
            Modality::Sticker { emoji } => {
                let prompt = self.persona.sticker_prompt.replace("{emoji}", emoji);
                Reply {
                    text: self.generate(&prompt).await,
                    media: [self.sticker(), self.voice()].into_iter().flatten().collect(),
                }
            }
            Modality::Animation => Reply {
                text: self.generate(&self.persona.animation_prompt).await,
                media: self.animation().into_iter().collect(),
            },
            Modality::Voice => Reply {
                text: self.persona.voice_reply.clone(),
                media: self.voice().into_iter().collect(),
            },
            Modality::Text(text) => {
                let reply = match self.canned_text_reply(text) {
                    Some(canned) => canned.to_string(),
                    None => self.generate(text).await,
                };
                Reply {
                    text: reply,
                    media: self.voice().into_iter().collect(),
                }
            }
        }
    }

    /// Fixed replies for known questions; name questions win over creator ones.
    pub fn canned_text_reply(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();

        if contains_any(&lower, &self.persona.name_phrases) {
            Some(self.persona.identity_reply.as_str())
        } else if contains_any(&lower, &self.persona.creator_phrases) {
            Some(self.persona.attribution_reply.as_str())
        } else {
            None
        }
    }

    /// Ask the completer, substituting a fallback line for any failure.
    async fn generate(&self, prompt: &str) -> String {
        match self.completer.complete(prompt).await {
            Ok(text) => text,
            Err(err @ LlmError::Request(_)) => {
                warn!("Completion request failed: {}", err);
                self.persona.unavailable_fallback.clone()
            }
            Err(err @ (LlmError::Status { .. } | LlmError::Malformed(_))) => {
                warn!("Unexpected completion response: {}", err);
                self.persona.malformed_fallback.clone()
            }
        }
    }

    fn sticker(&self) -> Option<Outbound> {
        pick("sticker", &self.assets.stickers).map(Outbound::Sticker)
    }

    fn voice(&self) -> Option<Outbound> {
        pick("voice", &self.assets.voices).map(Outbound::Voice)
    }

    fn animation(&self) -> Option<Outbound> {
        pick("animation", &self.assets.animations).map(Outbound::Animation)
    }
}

fn contains_any(lower: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .any(|phrase| lower.contains(&phrase.to_lowercase()))
}

fn pick(kind: &str, pack: &[String]) -> Option<String> {
    let choice = pack.choose(&mut rand::thread_rng()).cloned();
    if choice.is_none() {
        debug!("No {} assets configured, skipping", kind);
    }
    choice
}
