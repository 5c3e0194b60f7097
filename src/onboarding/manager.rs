//! RegistrationManager: drives a user through the onboarding questions.
//!
//! Every call reads the profile, derives the current step from it, and
//! writes at most one field. Callers serialize calls per user.

use std::sync::Arc;

use crate::channels::{OutgoingMessage, Outbox};
use crate::error::{DatabaseError, ValidationError};
use crate::store::ProfileStore;

use super::model::UserProfile;
use super::prompts;
use super::state::RegistrationState;

/// Result of `/start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh profile was created; the user now has to give a name.
    Created,
    /// A profile already existed and was left untouched.
    AlreadyRegistered { state: RegistrationState },
}

impl StartOutcome {
    /// The state the user is in after the call.
    pub fn state(&self) -> RegistrationState {
        match self {
            Self::Created => RegistrationState::AwaitingName,
            Self::AlreadyRegistered { state } => *state,
        }
    }
}

/// Result of answering an onboarding question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The answer was stored and the user moved on to `next`.
    Advanced { next: RegistrationState },
    /// The answer was rejected; the user stays at `state` and is asked again.
    Rejected {
        state: RegistrationState,
        reason: ValidationError,
    },
}

impl StepOutcome {
    /// The state the user is in after the call.
    pub fn state(&self) -> RegistrationState {
        match self {
            Self::Advanced { next } => *next,
            Self::Rejected { state, .. } => *state,
        }
    }
}

/// Coordinates profile creation and the per-step validation and prompts.
pub struct RegistrationManager {
    store: Arc<dyn ProfileStore>,
    outbox: Outbox,
}

impl RegistrationManager {
    pub fn new(store: Arc<dyn ProfileStore>, outbox: Outbox) -> Self {
        Self { store, outbox }
    }

    /// Handle `/start`: create the profile and greet, or tell the user they
    /// already have one.
    pub async fn start(
        &self,
        user_id: &str,
        chat_id: &str,
        handle: Option<&str>,
    ) -> Result<StartOutcome, DatabaseError> {
        if let Some(existing) = self.store.find_by_id(user_id).await? {
            let state = existing.state();
            tracing::info!(
                user = %existing.log_label(),
                %state,
                "/start: profile already exists, suggesting /cancel"
            );
            self.outbox
                .send_now(chat_id, OutgoingMessage::html(prompts::already_registered(&existing)))
                .await;
            return Ok(StartOutcome::AlreadyRegistered { state });
        }

        let profile = UserProfile::new(user_id, chat_id, handle.map(str::to_string));
        self.store.insert(&profile).await?;
        tracing::info!(user = %profile.log_label(), "/start: profile created");

        let pacing = self.outbox.pacing();
        self.outbox
            .say(chat_id, OutgoingMessage::text(prompts::GREETING))
            .await;
        self.outbox
            .say_after(
                chat_id,
                OutgoingMessage::text(prompts::ASK_NAME),
                pacing + pacing / 3,
            )
            .await;

        Ok(StartOutcome::Created)
    }

    /// Handle a free-text reply from a user who is mid-onboarding.
    ///
    /// Returns `None` when the user has no profile or has already finished,
    /// i.e. the message is not an onboarding answer.
    pub async fn handle_reply(
        &self,
        user_id: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Option<StepOutcome>, DatabaseError> {
        let Some(mut profile) = self.store.find_by_id(user_id).await? else {
            return Ok(None);
        };
        let state = profile.state();
        let Some(answer) = state.accept(text) else {
            return Ok(None);
        };

        let update = match answer {
            Ok(update) => update,
            Err(reason) => {
                tracing::info!(
                    user = %profile.log_label(),
                    %state,
                    input = text,
                    "Onboarding answer rejected: {reason}"
                );
                self.reprompt(&profile, state, chat_id, text).await;
                return Ok(Some(StepOutcome::Rejected { state, reason }));
            }
        };

        self.store
            .update_fields(user_id, &update)
            .await?;
        update.apply(&mut profile);
        let next = profile.state();
        debug_assert!(state.can_transition_to(next), "{state} -> {next}");
        tracing::info!(user = %profile.log_label(), from = %state, to = %next, "Onboarding step stored");

        self.prompt(&profile, next, chat_id).await;
        Ok(Some(StepOutcome::Advanced { next }))
    }

    /// Ask the question for `state` (or close onboarding on `Complete`).
    async fn prompt(&self, profile: &UserProfile, state: RegistrationState, chat_id: &str) {
        let name = profile.name_or_placeholder();
        let text = match state {
            RegistrationState::AwaitingName => prompts::ASK_NAME.to_string(),
            RegistrationState::AwaitingLevel => prompts::ask_level(name),
            RegistrationState::AwaitingAge => prompts::ask_age(name),
            RegistrationState::AwaitingInterests => prompts::ask_interests(name),
            RegistrationState::Complete => prompts::REGISTRATION_DONE.to_string(),
        };
        self.outbox.say(chat_id, OutgoingMessage::html(text)).await;
    }

    /// Explain why an answer was rejected and ask for the same step again.
    async fn reprompt(
        &self,
        profile: &UserProfile,
        state: RegistrationState,
        chat_id: &str,
        input: &str,
    ) {
        let name = profile.name_or_placeholder();
        match state {
            RegistrationState::AwaitingName => {
                let text = prompts::name_looks_like_command(input);
                self.outbox.send_now(chat_id, OutgoingMessage::html(text)).await;
            }
            RegistrationState::AwaitingLevel => {
                let text = prompts::unknown_level();
                self.outbox.say(chat_id, OutgoingMessage::html(text)).await;
            }
            RegistrationState::AwaitingAge => {
                let text = prompts::invalid_age(name, input);
                self.outbox.say(chat_id, OutgoingMessage::html(text)).await;
            }
            RegistrationState::AwaitingInterests => {
                let text = prompts::interests_look_like_command(name, input);
                self.outbox.say(chat_id, OutgoingMessage::html(text)).await;
            }
            RegistrationState::Complete => {}
        }
    }
}
