//! Handlers for `/available`, `/busy`, `/list` and `/cancel`.

use std::sync::Arc;

use crate::channels::{OutgoingMessage, Outbox};
use crate::error::DatabaseError;
use crate::matching::{MatchEngine, MatchOutcome};
use crate::onboarding::{ProfileUpdate, UserProfile, prompts};
use crate::store::ProfileStore;

use super::Command;

/// What a standalone command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Precondition failed (not registered, or no profile to cancel).
    Rejected,
    /// `/busy` cleared the availability flag.
    Busy,
    /// `/list` sent `count` profiles.
    Listed { count: usize },
    /// `/cancel` deleted the profile.
    Deleted,
    /// `/available` ran the matching engine.
    Available(MatchOutcome),
}

/// Routes standalone commands to their handlers.
pub struct CommandDispatcher {
    store: Arc<dyn ProfileStore>,
    outbox: Outbox,
    engine: MatchEngine,
}

impl CommandDispatcher {
    pub fn new(store: Arc<dyn ProfileStore>, outbox: Outbox, engine: MatchEngine) -> Self {
        Self {
            store,
            outbox,
            engine,
        }
    }

    /// Run a standalone command. `/start` is not one; it belongs to onboarding.
    pub async fn dispatch(
        &self,
        command: Command,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Option<CommandOutcome>, DatabaseError> {
        let outcome = match command {
            Command::Available => self.available(user_id, chat_id).await?,
            Command::Busy => self.busy(user_id, chat_id).await?,
            Command::List => self.list(user_id, chat_id).await?,
            Command::Cancel => self.cancel(user_id, chat_id).await?,
            Command::Start => return Ok(None),
        };
        Ok(Some(outcome))
    }

    /// `/available`: hand a registered user to the matching engine.
    pub async fn available(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<CommandOutcome, DatabaseError> {
        let Some(profile) = self.registered(user_id, chat_id, Command::Available).await? else {
            return Ok(CommandOutcome::Rejected);
        };
        let outcome = self.engine.request_available(&profile, chat_id).await?;
        Ok(CommandOutcome::Available(outcome))
    }

    /// `/busy`: stop looking for partners. Idempotent.
    pub async fn busy(&self, user_id: &str, chat_id: &str) -> Result<CommandOutcome, DatabaseError> {
        let Some(profile) = self.registered(user_id, chat_id, Command::Busy).await? else {
            return Ok(CommandOutcome::Rejected);
        };

        self.store
            .update_fields(user_id, &ProfileUpdate::Available(false))
            .await?;
        tracing::info!(user = %profile.log_label(), was_available = profile.available, "/busy");

        self.outbox
            .say(chat_id, OutgoingMessage::text(prompts::NOW_BUSY))
            .await;
        Ok(CommandOutcome::Busy)
    }

    /// `/list`: every stored profile, one per line.
    pub async fn list(&self, user_id: &str, chat_id: &str) -> Result<CommandOutcome, DatabaseError> {
        let Some(profile) = self.registered(user_id, chat_id, Command::List).await? else {
            return Ok(CommandOutcome::Rejected);
        };

        let everyone = self.store.find_all().await?;
        let text = everyone
            .iter()
            .map(UserProfile::listing_line)
            .collect::<Vec<_>>()
            .join("\n");
        tracing::info!(user = %profile.log_label(), count = everyone.len(), "/list");
        tracing::debug!(user = %profile.log_label(), listing = %text.replace('\n', "; "), "/list result");

        self.outbox
            .say(chat_id, OutgoingMessage::html(text).without_link_preview())
            .await;
        Ok(CommandOutcome::Listed {
            count: everyone.len(),
        })
    }

    /// `/cancel`: delete the profile, whatever onboarding step it is at.
    pub async fn cancel(&self, user_id: &str, chat_id: &str) -> Result<CommandOutcome, DatabaseError> {
        let Some(profile) = self.store.find_by_id(user_id).await? else {
            tracing::info!(user_id, "/cancel without a profile");
            self.outbox
                .send_now(chat_id, OutgoingMessage::text(prompts::CANCEL_WITHOUT_PROFILE))
                .await;
            return Ok(CommandOutcome::Rejected);
        };

        tracing::info!(user = %profile.log_label(), state = %profile.state(), "/cancel");
        tracing::debug!(user = %profile.log_label(), profile = ?profile, "/cancel: deleting");

        self.store.delete_by_id(user_id).await?;
        self.outbox
            .send_now(chat_id, OutgoingMessage::text(prompts::PROFILE_DELETED))
            .await;
        Ok(CommandOutcome::Deleted)
    }

    /// Load the user's profile if onboarding is complete; otherwise tell
    /// them to finish it first.
    async fn registered(
        &self,
        user_id: &str,
        chat_id: &str,
        command: Command,
    ) -> Result<Option<UserProfile>, DatabaseError> {
        match self.store.find_by_id(user_id).await? {
            Some(profile) if profile.is_complete() => Ok(Some(profile)),
            _ => {
                tracing::info!(user_id, %command, "Command used before finishing onboarding");
                self.outbox
                    .say(chat_id, OutgoingMessage::text(prompts::NOT_REGISTERED))
                    .await;
                Ok(None)
            }
        }
    }
}
