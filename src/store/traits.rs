//! `ProfileStore` trait: the async interface the bot persists profiles through.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::onboarding::{ProfileUpdate, UserProfile};

/// Backend-agnostic profile storage keyed by `user_id`.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up a profile by user id.
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError>;

    /// Every stored profile, oldest registration first.
    async fn find_all(&self) -> Result<Vec<UserProfile>, DatabaseError>;

    /// Every profile whose `available` flag is set, oldest registration first.
    async fn find_all_available(&self) -> Result<Vec<UserProfile>, DatabaseError>;

    /// Insert a new profile. Fails with `Constraint` if the id is taken.
    async fn insert(&self, profile: &UserProfile) -> Result<(), DatabaseError>;

    /// Write one field of an existing profile in a single statement.
    /// Fails with `NotFound` if there is no such profile.
    async fn update_fields(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), DatabaseError>;

    /// Delete a profile. Returns whether a row was removed.
    async fn delete_by_id(&self, user_id: &str) -> Result<bool, DatabaseError>;
}
