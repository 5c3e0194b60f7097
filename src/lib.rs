//! speakmate: finds English conversation partners of a similar level.

pub mod bot;
pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod matching;
pub mod onboarding;
pub mod store;
