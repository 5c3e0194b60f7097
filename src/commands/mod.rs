//! Slash commands: parsing plus the handlers that run outside onboarding.

pub mod dispatcher;

pub use dispatcher::{CommandDispatcher, CommandOutcome};

use crate::onboarding::COMMAND_PREFIX;

/// A recognised bot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Available,
    Busy,
    List,
    Cancel,
}

impl Command {
    /// Parse the leading command word of a message.
    ///
    /// Accepts the `/cmd@BotName` form used in group chats and ignores
    /// anything after the first whitespace. Unknown commands yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.strip_prefix(COMMAND_PREFIX)?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "available" => Some(Self::Available),
            "busy" => Some(Self::Busy),
            "list" => Some(Self::List),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "/start",
            Self::Available => "/available",
            Self::Busy => "/busy",
            Self::List => "/list",
            Self::Cancel => "/cancel",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/available"), Some(Command::Available));
        assert_eq!(Command::parse("/busy"), Some(Command::Busy));
        assert_eq!(Command::parse("/list"), Some(Command::List));
        assert_eq!(Command::parse("/cancel"), Some(Command::Cancel));
    }

    #[test]
    fn strips_bot_suffix_and_arguments() {
        assert_eq!(Command::parse("/available@speakmate_bot"), Some(Command::Available));
        assert_eq!(Command::parse("/cancel now please"), Some(Command::Cancel));
        assert_eq!(Command::parse("/LIST"), Some(Command::List));
    }

    #[test]
    fn rejects_non_commands() {
        assert_eq!(Command::parse("available"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(Command::parse("/help"), None);
        assert_eq!(Command::parse(" /start"), None);
    }

    #[test]
    fn display_round_trips() {
        for cmd in [Command::Start, Command::Available, Command::Busy, Command::List, Command::Cancel] {
            assert_eq!(Command::parse(&cmd.to_string()), Some(cmd));
        }
    }
}
