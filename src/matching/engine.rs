//! MatchEngine: flips a user to available and looks for a partner.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::channels::{OutgoingMessage, Outbox};
use crate::error::DatabaseError;
use crate::onboarding::{ProfileUpdate, UserProfile, level, prompts};
use crate::store::ProfileStore;

use super::picker::PartnerPicker;

/// What `/available` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The requester hasn't finished onboarding. Nothing changed.
    NotEligible,
    /// The requester was already available. Nothing changed.
    AlreadyAvailable,
    /// The requester is now available but nobody compatible is.
    NoPartner,
    /// Both sides were introduced. Both stay available.
    Matched { partner: UserProfile },
}

/// Availability and partner selection.
pub struct MatchEngine {
    store: Arc<dyn ProfileStore>,
    outbox: Outbox,
    picker: Arc<dyn PartnerPicker>,
    /// Held across the pool read and the flag write.
    availability: Mutex<()>,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn ProfileStore>, outbox: Outbox, picker: Arc<dyn PartnerPicker>) -> Self {
        Self {
            store,
            outbox,
            picker,
            availability: Mutex::new(()),
        }
    }

    /// Mark `requester` available and try to pair them.
    ///
    /// The requester's flag is set before the search, so they stay in the
    /// pool for later requests even when no partner turns up now. Matching
    /// clears nobody's availability.
    pub async fn request_available(
        &self,
        requester: &UserProfile,
        chat_id: &str,
    ) -> Result<MatchOutcome, DatabaseError> {
        let Some(requester_level) = requester
            .proficiency_level
            .filter(|_| requester.is_complete())
        else {
            tracing::info!(user = %requester.log_label(), "/available: onboarding not finished");
            return Ok(MatchOutcome::NotEligible);
        };

        if requester.available {
            tracing::info!(user = %requester.log_label(), "/available: already available");
            self.outbox
                .say(
                    chat_id,
                    OutgoingMessage::html(prompts::already_available(
                        requester.name_or_placeholder(),
                    )),
                )
                .await;
            return Ok(MatchOutcome::AlreadyAvailable);
        }

        // Two users going available at once must not both miss each other:
        // whoever takes the lock second sees the first in the pool.
        let pool = {
            let _pool_guard = self.availability.lock().await;
            let pool = self.store.find_all_available().await?;
            self.store
                .update_fields(&requester.user_id, &ProfileUpdate::Available(true))
                .await?;
            pool
        };
        let mut requester = requester.clone();
        requester.available = true;
        tracing::info!(user = %requester.log_label(), pool = pool.len(), "/available: now available");

        self.outbox
            .say(chat_id, OutgoingMessage::text(prompts::NOW_AVAILABLE))
            .await;

        let candidates = compatible_candidates(pool, &requester.user_id, requester_level);
        tracing::debug!(
            user = %requester.log_label(),
            candidates = ?candidates.iter().map(UserProfile::log_label).collect::<Vec<_>>(),
            "/available: compatible candidates"
        );

        let chosen = self
            .picker
            .pick(&candidates)
            .and_then(|index| candidates.into_iter().nth(index));
        let Some(partner) = chosen else {
            tracing::info!(user = %requester.log_label(), "/available: no partner found");
            self.outbox
                .say(chat_id, OutgoingMessage::text(prompts::NO_PARTNER_YET))
                .await;
            return Ok(MatchOutcome::NoPartner);
        };

        tracing::info!(
            user = %requester.log_label(),
            partner = %partner.log_label(),
            "/available: partner found"
        );
        self.outbox
            .say(chat_id, OutgoingMessage::html(prompts::partner_found(&partner)))
            .await;
        self.outbox
            .send_now(
                &partner.chat_address,
                OutgoingMessage::html(prompts::partner_found(&requester)),
            )
            .await;

        Ok(MatchOutcome::Matched { partner })
    }
}

/// Available profiles other than the requester whose level lies within the
/// matching window of `requester_level`.
pub fn compatible_candidates(
    pool: Vec<UserProfile>,
    requester_id: &str,
    requester_level: u8,
) -> Vec<UserProfile> {
    let (low, high) = level::window(requester_level);
    pool.into_iter()
        .filter(|p| p.user_id != requester_id)
        .filter(|p| matches!(p.proficiency_level, Some(l) if (low..=high).contains(&l)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available(id: &str, level: u8) -> UserProfile {
        let mut p = UserProfile::new(id, id, None);
        p.display_name = Some(id.to_uppercase());
        p.proficiency_level = Some(level);
        p.age = Some(20);
        p.interests = Some("tea".into());
        p.available = true;
        p
    }

    fn ids(profiles: &[UserProfile]) -> Vec<&str> {
        profiles.iter().map(|p| p.user_id.as_str()).collect()
    }

    #[test]
    fn requester_is_never_a_candidate() {
        let pool = vec![available("me", 4), available("you", 4)];
        assert_eq!(ids(&compatible_candidates(pool, "me", 4)), vec!["you"]);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let pool = (0..=10).map(|l| available(&format!("u{l}"), l)).collect();
        let found = compatible_candidates(pool, "nobody", 4);
        assert_eq!(ids(&found), vec!["u1", "u2", "u3", "u4", "u5", "u6", "u7"]);
    }

    #[test]
    fn window_is_clamped_at_scale_edges() {
        let pool: Vec<_> = (0..=10).map(|l| available(&format!("u{l}"), l)).collect();
        assert_eq!(
            ids(&compatible_candidates(pool.clone(), "nobody", 0)),
            vec!["u0", "u1", "u2", "u3"]
        );
        assert_eq!(
            ids(&compatible_candidates(pool, "nobody", 10)),
            vec!["u7", "u8", "u9", "u10"]
        );
    }

    #[test]
    fn profiles_without_level_are_skipped() {
        let mut odd = available("odd", 4);
        odd.proficiency_level = None;
        assert!(compatible_candidates(vec![odd], "me", 4).is_empty());
    }

    #[test]
    fn level_three_window_excludes_ten() {
        let pool = vec![available("a", 4), available("b", 10)];
        assert_eq!(ids(&compatible_candidates(pool, "c", 3)), vec!["a"]);
    }
}
