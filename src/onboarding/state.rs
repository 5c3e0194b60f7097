//! Registration state machine: which question the user is answering.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::level;
use super::model::{ProfileUpdate, UserProfile};

/// Prefix that marks a message as a bot command.
pub const COMMAND_PREFIX: char = '/';

/// The onboarding steps.
///
/// Progresses linearly: AwaitingName → AwaitingLevel → AwaitingAge →
/// AwaitingInterests → Complete. Never stored; always derived from the
/// profile with [`RegistrationState::of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    AwaitingName,
    AwaitingLevel,
    AwaitingAge,
    AwaitingInterests,
    Complete,
}

impl RegistrationState {
    /// The step implied by the first unset onboarding field.
    pub fn of(profile: &UserProfile) -> Self {
        if profile.display_name.is_none() {
            Self::AwaitingName
        } else if profile.proficiency_level.is_none() {
            Self::AwaitingLevel
        } else if profile.age.is_none() {
            Self::AwaitingAge
        } else if profile.interests.is_none() {
            Self::AwaitingInterests
        } else {
            Self::Complete
        }
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: RegistrationState) -> bool {
        self.next() == Some(target)
    }

    /// Whether this state is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Get the next state in the linear progression, if any.
    pub fn next(&self) -> Option<RegistrationState> {
        use RegistrationState::*;
        match self {
            AwaitingName => Some(AwaitingLevel),
            AwaitingLevel => Some(AwaitingAge),
            AwaitingAge => Some(AwaitingInterests),
            AwaitingInterests => Some(Complete),
            Complete => None,
        }
    }

    /// Validate an answer for this step and turn it into the field update
    /// that advances past it. `None` for `Complete`, which takes no answers.
    pub fn accept(&self, input: &str) -> Option<Result<ProfileUpdate, ValidationError>> {
        let update = match self {
            Self::AwaitingName => reject_command(input).map(ProfileUpdate::DisplayName),
            Self::AwaitingLevel => level::parse(input).map(ProfileUpdate::ProficiencyLevel),
            Self::AwaitingAge => parse_age(input).map(ProfileUpdate::Age),
            Self::AwaitingInterests => reject_command(input).map(ProfileUpdate::Interests),
            Self::Complete => return None,
        };
        Some(update)
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingLevel => "awaiting_level",
            Self::AwaitingAge => "awaiting_age",
            Self::AwaitingInterests => "awaiting_interests",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// Free-text answers are stored verbatim unless they look like a command.
fn reject_command(input: &str) -> Result<String, ValidationError> {
    if input.starts_with(COMMAND_PREFIX) {
        Err(ValidationError::LooksLikeCommand(input.to_string()))
    } else {
        Ok(input.to_string())
    }
}

/// Ages are plain decimal digits in `1..=120`.
pub fn parse_age(input: &str) -> Result<u8, ValidationError> {
    let invalid = || ValidationError::InvalidAge(input.to_string());
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    match input.parse::<u32>() {
        Ok(age @ 1..=120) => Ok(age as u8),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_at(state: RegistrationState) -> UserProfile {
        let mut p = UserProfile::new("1", "1", None);
        let answers = [
            ProfileUpdate::DisplayName("Ann".into()),
            ProfileUpdate::ProficiencyLevel(4),
            ProfileUpdate::Age(25),
            ProfileUpdate::Interests("chess".into()),
        ];
        for update in answers {
            if p.state() == state {
                break;
            }
            update.apply(&mut p);
        }
        p
    }

    #[test]
    fn state_is_derived_from_first_unset_field() {
        use RegistrationState::*;
        for state in [AwaitingName, AwaitingLevel, AwaitingAge, AwaitingInterests, Complete] {
            assert_eq!(RegistrationState::of(&profile_at(state)), state);
        }
    }

    #[test]
    fn valid_transitions() {
        use RegistrationState::*;
        let transitions = [
            (AwaitingName, AwaitingLevel),
            (AwaitingLevel, AwaitingAge),
            (AwaitingAge, AwaitingInterests),
            (AwaitingInterests, Complete),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use RegistrationState::*;
        assert!(!AwaitingName.can_transition_to(AwaitingAge));
        assert!(!AwaitingAge.can_transition_to(AwaitingLevel));
        assert!(!Complete.can_transition_to(AwaitingName));
        assert!(!AwaitingLevel.can_transition_to(AwaitingLevel));
    }

    #[test]
    fn display_matches_serde() {
        use RegistrationState::*;
        for state in [AwaitingName, AwaitingLevel, AwaitingAge, AwaitingInterests, Complete] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(format!("\"{state}\""), json);
        }
    }

    #[test]
    fn name_rejects_commands() {
        let result = RegistrationState::AwaitingName.accept("/available").unwrap();
        assert_eq!(
            result,
            Err(ValidationError::LooksLikeCommand("/available".into()))
        );
    }

    #[test]
    fn name_is_stored_verbatim() {
        let result = RegistrationState::AwaitingName.accept("  Ann Lee ").unwrap();
        assert_eq!(result, Ok(ProfileUpdate::DisplayName("  Ann Lee ".into())));
    }

    #[test]
    fn interests_reject_commands() {
        let result = RegistrationState::AwaitingInterests.accept("/busy").unwrap();
        assert!(result.is_err());
        let ok = RegistrationState::AwaitingInterests.accept("chess, hiking").unwrap();
        assert_eq!(ok, Ok(ProfileUpdate::Interests("chess, hiking".into())));
    }

    #[test]
    fn level_answer_becomes_index() {
        let result = RegistrationState::AwaitingLevel.accept("b1").unwrap();
        assert_eq!(result, Ok(ProfileUpdate::ProficiencyLevel(4)));
    }

    #[test]
    fn complete_takes_no_answers() {
        assert!(RegistrationState::Complete.accept("hello").is_none());
    }

    #[test]
    fn age_accepts_exactly_one_to_one_twenty() {
        assert_eq!(parse_age("1"), Ok(1));
        assert_eq!(parse_age("25"), Ok(25));
        assert_eq!(parse_age("120"), Ok(120));
        assert_eq!(parse_age("007"), Ok(7));
    }

    #[test]
    fn age_rejects_everything_else() {
        for bad in ["", "0", "000", "121", "999999999999", "-5", "+5", "2.5", "twenty", " 25", "25 ", "٢٥"] {
            assert!(parse_age(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
