use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::UserId,
    errors::Error,
    reputation::{level_for, Level},
    store::{collections, get_doc, put_doc, DocumentStore},
    Result,
};

/// Display name every profile starts with; exempt from uniqueness.
pub const DEFAULT_NAME: &str = "Anonymous";

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 20;

fn default_true() -> bool {
    true
}

/// Per-category notification toggles. Unset categories default to enabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(default = "default_true")]
    pub new_comment: bool,
    #[serde(default = "default_true")]
    pub confession_update: bool,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            new_comment: true,
            confession_update: true,
        }
    }
}

/// Comment-visibility settings carried on the profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommentSettings {
    pub allow_comments: String,
    pub allow_anonymous: bool,
}

impl Default for CommentSettings {
    fn default() -> Self {
        Self {
            allow_comments: "everyone".to_string(),
            allow_anonymous: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    /// Display name; `"Anonymous"` until the user picks one.
    pub username: String,
    /// Lowercased shadow of `username`, kept for the exact-match uniqueness
    /// lookup (the store has no case-insensitive query).
    pub username_lower: String,
    #[serde(default)]
    pub reputation: i64,
    #[serde(default)]
    pub total_confessions: i64,
    /// Lifetime comment count; drives the display level.
    #[serde(default)]
    pub total_comments: i64,
    /// False = blocked by an admin; every action is rejected.
    #[serde(default = "default_true")]
    pub active: bool,
    pub joined_at: String,
    #[serde(default)]
    pub notifications: NotifySettings,
    #[serde(default)]
    pub comment_settings: CommentSettings,
}

impl UserProfile {
    fn new(user: UserId) -> Self {
        Self {
            user_id: user.0,
            username: DEFAULT_NAME.to_string(),
            username_lower: DEFAULT_NAME.to_lowercase(),
            reputation: 0,
            total_confessions: 0,
            total_comments: 0,
            active: true,
            joined_at: Utc::now().to_rfc3339(),
            notifications: NotifySettings::default(),
            comment_settings: CommentSettings::default(),
        }
    }

    pub fn id(&self) -> UserId {
        UserId(self.user_id)
    }

    /// True until the user has picked a display name.
    pub fn is_anonymous(&self) -> bool {
        self.username == DEFAULT_NAME
    }

    /// Current display level, recomputed from the live comment count.
    pub fn level(&self) -> Level {
        level_for(self.total_comments)
    }
}

/// Validation only; uniqueness is the directory's concern.
pub fn validate_username(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len < NAME_MIN
        || len > NAME_MAX
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(Error::Validation(
            "Invalid username. Use 3-20 characters (letters, numbers, underscores only)."
                .to_string(),
        ));
    }
    Ok(())
}

/// Profile repository. Profiles are created on first interaction and never
/// deleted; counter bumps are best-effort read-modify-writes (the sequence
/// generator is the only operation needing true atomicity).
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user: UserId) -> Result<Option<UserProfile>> {
        get_doc(self.store.as_ref(), collections::USERS, &user.0.to_string()).await
    }

    pub async fn get_or_create(&self, user: UserId) -> Result<UserProfile> {
        if let Some(profile) = self.get(user).await? {
            return Ok(profile);
        }

        let profile = UserProfile::new(user);
        self.save(&profile).await?;
        tracing::info!(user_id = user.0, "created user profile");
        Ok(profile)
    }

    pub async fn save(&self, profile: &UserProfile) -> Result<()> {
        put_doc(
            self.store.as_ref(),
            collections::USERS,
            &profile.user_id.to_string(),
            profile,
        )
        .await
    }

    /// Validates, checks uniqueness (case-insensitive, `"anonymous"` exempt)
    /// and stores the new display name.
    pub async fn set_username(&self, user: UserId, requested: &str) -> Result<UserProfile> {
        validate_username(requested)?;

        let lower = requested.to_lowercase();
        if lower != DEFAULT_NAME.to_lowercase() && self.name_taken_by_other(user, &lower).await? {
            return Err(Error::Validation(
                "Username already taken. Choose another one.".to_string(),
            ));
        }

        let mut profile = self.get_or_create(user).await?;
        profile.username = requested.to_string();
        profile.username_lower = lower;
        self.save(&profile).await?;
        Ok(profile)
    }

    pub async fn adjust_reputation(&self, user: UserId, delta: i64) -> Result<()> {
        self.mutate(user, |p| p.reputation += delta).await
    }

    pub async fn bump_confessions(&self, user: UserId) -> Result<()> {
        self.mutate(user, |p| p.total_confessions += 1).await
    }

    pub async fn bump_comments(&self, user: UserId) -> Result<()> {
        self.mutate(user, |p| p.total_comments += 1).await
    }

    async fn mutate(&self, user: UserId, apply: impl FnOnce(&mut UserProfile)) -> Result<()> {
        let mut profile = self.get_or_create(user).await?;
        apply(&mut profile);
        self.save(&profile).await
    }

    async fn name_taken_by_other(&self, user: UserId, lower: &str) -> Result<bool> {
        let hits = self
            .store
            .find_eq(collections::USERS, "username_lower", lower, 2)
            .await?;

        Ok(hits
            .iter()
            .any(|doc| doc.get("user_id").and_then(Value::as_i64) != Some(user.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn rejects_short_invalid_and_accepts_valid_names() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("validUser_1").is_ok());
        assert!(validate_username("bad name!").is_err());
        assert!(validate_username(&"x".repeat(21)).is_err());
        assert!(validate_username(&"x".repeat(20)).is_ok());
    }

    #[tokio::test]
    async fn first_interaction_creates_an_anonymous_profile() {
        let dir = directory();
        let profile = dir.get_or_create(UserId(1)).await.unwrap();
        assert_eq!(profile.username, "Anonymous");
        assert!(profile.active);
        assert!(profile.is_anonymous());
        assert!(profile.notifications.new_comment);
    }

    #[tokio::test]
    async fn taken_names_are_rejected_case_insensitively() {
        let dir = directory();
        dir.set_username(UserId(1), "Night_Owl").await.unwrap();

        let err = dir.set_username(UserId(2), "night_owl").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // The holder can re-assert their own name.
        assert!(dir.set_username(UserId(1), "night_owl").await.is_ok());
    }

    #[tokio::test]
    async fn anonymous_is_exempt_from_uniqueness() {
        let dir = directory();
        dir.set_username(UserId(1), "Anonymous").await.unwrap();
        assert!(dir.set_username(UserId(2), "anonymous").await.is_ok());
    }

    #[tokio::test]
    async fn counters_accumulate() {
        let dir = directory();
        dir.adjust_reputation(UserId(1), 10).await.unwrap();
        dir.adjust_reputation(UserId(1), 5).await.unwrap();
        dir.bump_comments(UserId(1)).await.unwrap();
        dir.bump_confessions(UserId(1)).await.unwrap();

        let profile = dir.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(profile.reputation, 15);
        assert_eq!(profile.total_comments, 1);
        assert_eq!(profile.total_confessions, 1);
    }

    #[tokio::test]
    async fn level_tracks_live_comment_count() {
        let dir = directory();
        for _ in 0..25 {
            dir.bump_comments(UserId(1)).await.unwrap();
        }
        let profile = dir.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(profile.level().rank, 2);
    }
}
