//! libSQL backend: async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::onboarding::{ProfileUpdate, UserProfile};
use crate::store::migrations;
use crate::store::traits::ProfileStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_profiles(
        &self,
        sql: &str,
        op: &str,
    ) -> Result<Vec<UserProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, ())
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut profiles = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
        {
            match row_to_profile(&row) {
                Ok(p) => profiles.push(p),
                Err(e) => tracing::warn!("Skipping profile row: {e}"),
            }
        }
        Ok(profiles)
    }
}

// ── Helper functions ────────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "user_id, chat_address, display_name, handle, proficiency_level, \
                               age, interests, available, created_at";

/// Fixed-width RFC 3339 so that `ORDER BY created_at` sorts chronologically.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse an RFC 3339 datetime string, falling back to the epoch minimum.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<u8>` to libsql Value.
fn opt_int(n: Option<u8>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(n as i64),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a UserProfile.
///
/// Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<UserProfile, libsql::Error> {
    let created_str: String = row.get(8)?;
    let available: i64 = row.get(7)?;

    Ok(UserProfile {
        user_id: row.get(0)?,
        chat_address: row.get(1)?,
        display_name: row.get(2).ok(),
        handle: row.get(3).ok(),
        proficiency_level: row.get::<i64>(4).ok().and_then(|v| u8::try_from(v).ok()),
        age: row.get::<i64>(5).ok().and_then(|v| u8::try_from(v).ok()),
        interests: row.get(6).ok(),
        available: available != 0,
        created_at: parse_datetime(&created_str),
    })
}

/// Column and value written by a single update.
fn update_column(update: &ProfileUpdate) -> (&'static str, libsql::Value) {
    match update {
        ProfileUpdate::DisplayName(name) => ("display_name", libsql::Value::Text(name.clone())),
        ProfileUpdate::ProficiencyLevel(level) => {
            ("proficiency_level", libsql::Value::Integer(*level as i64))
        }
        ProfileUpdate::Age(age) => ("age", libsql::Value::Integer(*age as i64)),
        ProfileUpdate::Interests(text) => ("interests", libsql::Value::Text(text.clone())),
        ProfileUpdate::Available(flag) => ("available", libsql::Value::Integer(*flag as i64)),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_by_id: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_profile(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("find_by_id row: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_by_id: {e}"))),
        }
    }

    async fn find_all(&self) -> Result<Vec<UserProfile>, DatabaseError> {
        self.query_profiles(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at, user_id"),
            "find_all",
        )
        .await
    }

    async fn find_all_available(&self) -> Result<Vec<UserProfile>, DatabaseError> {
        self.query_profiles(
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles WHERE available = 1 \
                 ORDER BY created_at, user_id"
            ),
            "find_all_available",
        )
        .await
    }

    async fn insert(&self, profile: &UserProfile) -> Result<(), DatabaseError> {
        let now = timestamp(Utc::now());
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO profiles (user_id, chat_address, display_name, handle,
                    proficiency_level, age, interests, available, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(user_id) DO NOTHING",
                params![
                    profile.user_id.as_str(),
                    profile.chat_address.as_str(),
                    opt_text(profile.display_name.as_deref()),
                    opt_text(profile.handle.as_deref()),
                    opt_int(profile.proficiency_level),
                    opt_int(profile.age),
                    opt_text(profile.interests.as_deref()),
                    profile.available as i64,
                    timestamp(profile.created_at),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert: {e}")))?;

        if inserted == 0 {
            return Err(DatabaseError::Constraint(format!(
                "profile {} already exists",
                profile.user_id
            )));
        }

        debug!(user_id = %profile.user_id, "Profile inserted into DB");
        Ok(())
    }

    async fn update_fields(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), DatabaseError> {
        let (column, value) = update_column(update);
        let changed = self
            .conn()
            .execute(
                &format!("UPDATE profiles SET {column} = ?1, updated_at = ?2 WHERE user_id = ?3"),
                params![value, timestamp(Utc::now()), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_fields: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "profile".to_string(),
                id: user_id.to_string(),
            });
        }
        debug!(user_id, column, "Profile field updated");
        Ok(())
    }

    async fn delete_by_id(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn()
            .execute("DELETE FROM profiles WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_by_id: {e}")))?;
        Ok(deleted > 0)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
