//! Onboarding: the name → level → age → interests conversation.
//!
//! The bot asks one question at a time and stores each validated answer in
//! the user's profile. The current step is never stored: it is derived from
//! which profile fields are still unset, so the stored data and the step
//! can't disagree.

pub mod level;
pub mod manager;
pub mod model;
pub mod prompts;
pub mod state;

pub use manager::{RegistrationManager, StartOutcome, StepOutcome};
pub use model::{ProfileUpdate, UserProfile};
pub use state::{COMMAND_PREFIX, RegistrationState};
