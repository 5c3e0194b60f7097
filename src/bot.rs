//! Bot run loop and message routing.
//!
//! Every inbound message is handled on its own task. Messages from the same
//! user are serialized by a per-user lock, so the read-modify-write steps of
//! onboarding and availability never interleave for one profile.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinSet;

use crate::channels::{Channel, IncomingMessage, OutgoingMessage, Outbox};
use crate::commands::{Command, CommandDispatcher};
use crate::error::Result;
use crate::matching::{MatchEngine, PartnerPicker};
use crate::onboarding::{RegistrationManager, RegistrationState, prompts};
use crate::store::ProfileStore;

/// Idle lock entries are dropped once the table grows past this size.
const LOCK_TABLE_SOFT_LIMIT: usize = 1024;

/// Core dependencies for the bot.
pub struct BotDeps {
    pub store: Arc<dyn ProfileStore>,
    pub channel: Arc<dyn Channel>,
    pub picker: Arc<dyn PartnerPicker>,
}

/// One async mutex per user id.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > LOCK_TABLE_SOFT_LIMIT {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Routes messages to onboarding, the command dispatcher, or a hint.
pub struct Bot {
    channel: Arc<dyn Channel>,
    store: Arc<dyn ProfileStore>,
    outbox: Outbox,
    registration: RegistrationManager,
    commands: CommandDispatcher,
    locks: UserLocks,
}

impl Bot {
    /// Wire the components together. `pacing` is the typing delay before replies.
    pub fn new(deps: BotDeps, pacing: Duration) -> Self {
        let outbox = Outbox::new(Arc::clone(&deps.channel), pacing);
        let engine = MatchEngine::new(Arc::clone(&deps.store), outbox.clone(), deps.picker);
        let registration = RegistrationManager::new(Arc::clone(&deps.store), outbox.clone());
        let commands = CommandDispatcher::new(Arc::clone(&deps.store), outbox.clone(), engine);

        Self {
            channel: deps.channel,
            store: deps.store,
            outbox,
            registration,
            commands,
            locks: UserLocks::default(),
        }
    }

    /// Run until the channel stream ends or Ctrl+C.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        if let Err(e) = self.channel.health_check().await {
            tracing::warn!(channel = self.channel.name(), "Health check failed: {e}");
        }
        let mut message_stream = self.channel.start().await?;
        let mut tasks = JoinSet::new();

        tracing::info!(channel = self.channel.name(), "speakmate ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            while tasks.try_join_next().is_some() {}

            let bot = Arc::clone(&self);
            tasks.spawn(async move {
                if let Err(e) = bot.handle(&message).await {
                    tracing::error!(
                        user_id = %message.user_id,
                        channel = %message.channel,
                        "Error handling message: {e}"
                    );
                }
            });
        }

        // Let in-flight handlers finish their writes.
        while tasks.join_next().await.is_some() {}

        tracing::info!("speakmate shutting down...");
        self.channel.shutdown().await?;
        Ok(())
    }

    /// Handle one message. Returns the sender's onboarding state afterwards,
    /// or `None` if they have no profile.
    pub async fn handle(
        &self,
        message: &IncomingMessage,
    ) -> Result<Option<RegistrationState>> {
        let _guard = self.locks.acquire(&message.user_id).await;

        let user_id = message.user_id.as_str();
        let chat_id = message.chat_id.as_str();
        let command = Command::parse(&message.content);

        tracing::debug!(
            user_id,
            handle = message.handle.as_deref().unwrap_or(""),
            channel = %message.channel,
            ?command,
            "Received message ({} chars)",
            message.content.chars().count()
        );

        match command {
            Some(Command::Start) => {
                let outcome = self
                    .registration
                    .start(user_id, chat_id, message.handle.as_deref())
                    .await?;
                return Ok(Some(outcome.state()));
            }
            Some(command) => {
                // Known commands bypass onboarding; the dispatcher gates them.
                self.commands.dispatch(command, user_id, chat_id).await?;
                return self.current_state(user_id).await;
            }
            None => {}
        }

        // Mid-onboarding, any other text answers the current question.
        if let Some(step) = self
            .registration
            .handle_reply(user_id, chat_id, &message.content)
            .await?
        {
            return Ok(Some(step.state()));
        }

        match self.store.find_by_id(user_id).await? {
            Some(profile) => {
                tracing::debug!(user = %profile.log_label(), "Free text outside any flow");
                self.outbox
                    .say(chat_id, OutgoingMessage::text(prompts::HINT_REGISTERED))
                    .await;
                Ok(Some(profile.state()))
            }
            None => {
                tracing::debug!(user_id, "Message from a user without a profile");
                self.outbox
                    .say(chat_id, OutgoingMessage::text(prompts::HINT_UNREGISTERED))
                    .await;
                Ok(None)
            }
        }
    }

    async fn current_state(&self, user_id: &str) -> Result<Option<RegistrationState>> {
        Ok(self.store.find_by_id(user_id).await?.map(|p| p.state()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_user_shares_a_lock() {
        let locks = UserLocks::default();
        let guard = locks.acquire("a").await;

        let other = locks.acquire("b").await;
        drop(other);

        let map = locks.locks.lock().await;
        let lock = Arc::clone(map.get("a").unwrap());
        drop(map);
        assert!(lock.try_lock().is_err());

        drop(guard);
        assert!(lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn idle_locks_are_pruned() {
        let locks = UserLocks::default();
        for i in 0..=LOCK_TABLE_SOFT_LIMIT {
            drop(locks.acquire(&i.to_string()).await);
        }
        let _held = locks.acquire("held").await;
        assert_eq!(locks.locks.lock().await.len(), 1);
    }
}
