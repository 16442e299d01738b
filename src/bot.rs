use std::panic::AssertUnwindSafe;

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::classifier::{self, BotIdentity};
use crate::config::{Config, PollingConfig, TelegramConfig};
use crate::dispatcher::{self, DeliveryReport};
use crate::llm::Completer;
use crate::platform::{Platform, Update};
use crate::poller::{self, Backoff, Cursor, LoopPhase, LoopState};
use crate::responder::Responder;

/// Resolve the bot's own username; group addressing depends on it.
pub async fn bootstrap<P>(platform: &P) -> Result<BotIdentity>
where
    P: Platform + ?Sized,
{
    let username = match platform.get_me().await {
        Ok(username) => username,
        Err(e) => {
            error!("Cannot get bot info. Check BOT_TOKEN and network: {}", e);
            return Err(e).context("Cannot get bot info. Check BOT_TOKEN and network");
        }
    };
    let identity = BotIdentity::new(&username);
    info!("Bot username: @{}", identity.username());
    Ok(identity)
}

/// The polling bot: one loop, one update at a time.
pub struct ShinobuBot<P, C> {
    platform: P,
    responder: Responder<C>,
    identity: BotIdentity,
    telegram: TelegramConfig,
    polling: PollingConfig,
}

impl<P: Platform, C: Completer> ShinobuBot<P, C> {
    pub fn new(
        platform: P,
        responder: Responder<C>,
        identity: BotIdentity,
        telegram: TelegramConfig,
        polling: PollingConfig,
    ) -> Self {
        Self {
            platform,
            responder,
            identity,
            telegram,
            polling,
        }
    }

    /// Bootstrap the identity, then assemble the bot.
    pub async fn start(platform: P, responder: Responder<C>, config: &Config) -> Result<Self> {
        let identity = bootstrap(&platform).await?;
        Ok(Self::new(
            platform,
            responder,
            identity,
            config.telegram.clone(),
            config.polling.clone(),
        ))
    }

    pub fn initial_state(&self) -> LoopState {
        LoopState::new(Backoff::new(
            self.polling.backoff_floor(),
            self.polling.backoff_ceiling(),
        ))
    }

    /// Poll until interrupted. In-flight work is dropped on shutdown.
    pub async fn run(&self) -> Result<()> {
        let mut state = self.initial_state();

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(shutdown);

        info!("Polling for updates...");
        while !state.is_stopped() {
            let interrupted = tokio::select! {
                _ = &mut shutdown => true,
                next = self.cycle(state) => {
                    state = next;
                    false
                }
            };
            if interrupted {
                info!("Shutdown signal received, stopping");
                state.stop();
            }
        }

        info!("Bot stopped (last update: {:?})", state.cursor.last_seen());
        Ok(())
    }

    /// Advance the loop by one step and hand back the new state.
    pub async fn cycle(&self, mut state: LoopState) -> LoopState {
        match state.phase {
            LoopPhase::Stopped => {}
            LoopPhase::BackingOff(delay) => {
                tokio::time::sleep(delay).await;
                state.on_backoff_elapsed();
            }
            LoopPhase::Polling => {
                match poller::poll(&self.platform, &state.cursor, &self.telegram).await {
                    Ok(updates) => {
                        state.on_poll_success();
                        self.process_batch(&mut state.cursor, updates).await;
                        tokio::time::sleep(self.polling.idle_pause()).await;
                    }
                    Err(e) => {
                        let delay = state.on_poll_failure();
                        warn!("getUpdates failed: {} (retrying in {:?})", e, delay);
                    }
                }
            }
        }
        state
    }

    /// The cursor moves past every fresh update, handled or not, so nothing
    /// consumed here is fetched again.
    async fn process_batch(&self, cursor: &mut Cursor, updates: Vec<Update>) {
        for update in updates {
            let id = update.id;
            if !cursor.advance(id) {
                debug!("Skipping already-seen update {}", id);
                continue;
            }

            let outcome = AssertUnwindSafe(self.handle_update(update))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                error!("Unexpected fault while handling update {}", id);
                tokio::time::sleep(self.polling.error_pause()).await;
            }
        }
    }

    /// Classify, answer and deliver a single update. `None` when the update
    /// needed no answer.
    pub async fn handle_update(&self, update: Update) -> Option<DeliveryReport> {
        let message = update.message?;

        let Some(modality) = classifier::classify(&message, &self.identity) else {
            debug!(
                "Update {} in chat {} not for us, skipping",
                update.id, message.chat.id
            );
            return None;
        };

        info!(
            "Update {}: {} message in chat {}",
            update.id,
            modality.name(),
            message.chat.id
        );

        let reply = self.responder.respond(&modality).await;
        let report =
            dispatcher::dispatch(&self.platform, message.chat.id, reply.into_outbound()).await;
        if report.failed > 0 {
            warn!(
                "Update {}: {}/{} send(s) failed",
                update.id, report.failed, report.attempted
            );
        }
        Some(report)
    }
}
