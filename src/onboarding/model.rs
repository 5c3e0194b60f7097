//! User profile data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::level;
use super::state::RegistrationState;

/// One registered user. Created on `/start`, filled in step by step, and
/// hard-deleted on `/cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    /// Where outbound messages for this user go.
    pub chat_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Index into [`level::LEVELS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proficiency_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<String>,
    #[serde(default)]
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// A fresh profile with every onboarding field unset.
    pub fn new(
        user_id: impl Into<String>,
        chat_address: impl Into<String>,
        handle: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            chat_address: chat_address.into(),
            display_name: None,
            handle,
            proficiency_level: None,
            age: None,
            interests: None,
            available: false,
            created_at: Utc::now(),
        }
    }

    /// Current onboarding step, derived from which fields are still unset.
    pub fn state(&self) -> RegistrationState {
        RegistrationState::of(self)
    }

    /// Whether all onboarding questions have been answered.
    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Display name, or a placeholder when onboarding has not reached it yet.
    pub fn name_or_placeholder(&self) -> &str {
        self.display_name.as_deref().unwrap_or("friend")
    }

    /// Level code such as `B1+`, if a level has been chosen.
    pub fn level_code(&self) -> Option<&'static str> {
        self.proficiency_level.and_then(level::code)
    }

    /// HTML link to the user: `Name (@handle)` when a public handle exists,
    /// otherwise a `tg://user` mention of the name.
    pub fn html_link(&self) -> String {
        let name = escape_html(self.name_or_placeholder());
        match self.handle.as_deref() {
            Some(handle) => format!("{name} (@{})", escape_html(handle)),
            None => format!(
                "<a href=\"tg://user?id={}\">{name}</a>",
                escape_html(&self.user_id)
            ),
        }
    }

    /// One line of the `/list` output.
    pub fn listing_line(&self) -> String {
        let level = self.level_code().unwrap_or("?");
        let age = self
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("{} | {level} | {age} y.o.", self.html_link())
    }

    /// Short identity used in log fields.
    pub fn log_label(&self) -> String {
        format!(
            "user(id={}, handle={})",
            self.user_id,
            self.handle.as_deref().unwrap_or("-")
        )
    }
}

/// A single-field change written by [`crate::store::ProfileStore::update_fields`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileUpdate {
    DisplayName(String),
    ProficiencyLevel(u8),
    Age(u8),
    Interests(String),
    Available(bool),
}

impl ProfileUpdate {
    /// Apply the change to an in-memory profile.
    pub fn apply(&self, profile: &mut UserProfile) {
        match self {
            Self::DisplayName(name) => profile.display_name = Some(name.clone()),
            Self::ProficiencyLevel(level) => profile.proficiency_level = Some(*level),
            Self::Age(age) => profile.age = Some(*age),
            Self::Interests(text) => profile.interests = Some(text.clone()),
            Self::Available(flag) => profile.available = *flag,
        }
    }
}

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_profile(id: &str, name: &str, level: u8) -> UserProfile {
        let mut p = UserProfile::new(id, id, None);
        p.display_name = Some(name.to_string());
        p.proficiency_level = Some(level);
        p.age = Some(30);
        p.interests = Some("books".to_string());
        p
    }

    #[test]
    fn new_profile_has_nothing_set() {
        let p = UserProfile::new("42", "42", Some("ann".into()));
        assert!(p.display_name.is_none());
        assert!(p.proficiency_level.is_none());
        assert!(p.age.is_none());
        assert!(p.interests.is_none());
        assert!(!p.available);
        assert!(!p.is_complete());
        assert_eq!(p.state(), RegistrationState::AwaitingName);
    }

    #[test]
    fn link_prefers_handle() {
        let mut p = complete_profile("7", "Ann", 4);
        assert_eq!(p.html_link(), "<a href=\"tg://user?id=7\">Ann</a>");
        p.handle = Some("ann_b".into());
        assert_eq!(p.html_link(), "Ann (@ann_b)");
    }

    #[test]
    fn link_escapes_markup_in_names() {
        let p = complete_profile("7", "<b>Bob</b> & co", 0);
        assert!(p.html_link().contains("&lt;b&gt;Bob&lt;/b&gt; &amp; co"));
    }

    #[test]
    fn listing_line_shows_level_code_and_age() {
        let p = complete_profile("7", "Ann", 4);
        assert_eq!(
            p.listing_line(),
            "<a href=\"tg://user?id=7\">Ann</a> | B1 | 30 y.o."
        );
    }

    #[test]
    fn listing_line_tolerates_partial_profiles() {
        let mut p = UserProfile::new("8", "8", None);
        p.display_name = Some("Half".into());
        assert!(p.listing_line().ends_with("| ? | ? y.o."));
    }

    #[test]
    fn update_apply_touches_one_field() {
        let mut p = UserProfile::new("1", "1", None);
        ProfileUpdate::DisplayName("Zed".into()).apply(&mut p);
        ProfileUpdate::Available(true).apply(&mut p);
        assert_eq!(p.display_name.as_deref(), Some("Zed"));
        assert!(p.available);
        assert!(p.proficiency_level.is_none());
    }
}
