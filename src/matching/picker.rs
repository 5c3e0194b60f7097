//! Partner selection strategies.

use rand::Rng;

use crate::onboarding::UserProfile;

/// Chooses one partner out of the compatible candidates.
pub trait PartnerPicker: Send + Sync {
    /// Index of the chosen candidate, or `None` if `candidates` is empty.
    fn pick(&self, candidates: &[UserProfile]) -> Option<usize>;
}

/// Uniformly random choice. No memory of earlier matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPicker;

impl PartnerPicker for RandomPicker {
    fn pick(&self, candidates: &[UserProfile]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(rand::thread_rng().gen_range(0..candidates.len()))
    }
}

/// Always the first candidate. Makes matching deterministic in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstCandidate;

impl PartnerPicker for FirstCandidate {
    fn pick(&self, candidates: &[UserProfile]) -> Option<usize> {
        if candidates.is_empty() { None } else { Some(0) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(n: usize) -> Vec<UserProfile> {
        (0..n)
            .map(|i| UserProfile::new(i.to_string(), i.to_string(), None))
            .collect()
    }

    #[test]
    fn empty_pool_picks_nobody() {
        assert_eq!(RandomPicker.pick(&[]), None);
        assert_eq!(FirstCandidate.pick(&[]), None);
    }

    #[test]
    fn random_pick_stays_in_bounds_and_covers_pool() {
        let pool = candidates(3);
        let mut seen = [false; 3];
        for _ in 0..500 {
            let i = RandomPicker.pick(&pool).unwrap();
            assert!(i < 3);
            seen[i] = true;
        }
        assert!(seen.iter().all(|s| *s), "every candidate should come up: {seen:?}");
    }

    #[test]
    fn first_candidate_is_deterministic() {
        assert_eq!(FirstCandidate.pick(&candidates(4)), Some(0));
    }
}
