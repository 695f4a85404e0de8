/// Data models for PostPilot
///
/// Row types mirror the migration schema; status enums map onto the
/// PostgreSQL enum types and gate transitions in the service layer.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

/// Supported social platforms, matching database `platform_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "platform_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Instagram,
    Linkedin,
    Twitter,
    Tiktok,
    Threads,
    Pinterest,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Tiktok,
        Platform::Threads,
        Platform::Pinterest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Tiktok => "tiktok",
            Platform::Threads => "threads",
            Platform::Pinterest => "pinterest",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            "linkedin" => Some(Platform::Linkedin),
            "twitter" | "x" => Some(Platform::Twitter),
            "tiktok" => Some(Platform::Tiktok),
            "threads" => Some(Platform::Threads),
            "pinterest" => Some(Platform::Pinterest),
            _ => None,
        }
    }

    /// Platforms whose authorization flow carries a PKCE verifier.
    pub fn uses_pkce(&self) -> bool {
        matches!(self, Platform::Twitter | Platform::Tiktok)
    }
}

/// Content approval lifecycle, matching database `content_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "content_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Published,
    Failed,
}

impl ContentStatus {
    /// Legal transitions: draft -> pending -> approved | rejected ->
    /// published | failed. Rejected content can be edited back to pending.
    pub fn can_transition_to(&self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Rejected, Pending)
                | (Approved, Published)
                | (Approved, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContentStatus::Published | ContentStatus::Failed)
    }
}

/// Post publish lifecycle, matching database `post_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "post_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Scheduled,
    Posting,
    Published,
    Failed,
}

impl PostStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub brand_voice: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Connected social account, one per (user, platform)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SocialAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub account_ref: String,
    pub account_name: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub platform_data: serde_json::Value,
    pub connected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialAccount {
    /// Token already expired, or expiring within the given margin.
    pub fn token_expires_within(&self, margin: chrono::Duration) -> bool {
        match self.token_expires_at {
            Some(at) => at <= Utc::now() + margin,
            None => false,
        }
    }
}

/// Generated content item awaiting approval and publishing
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Content {
    pub id: Uuid,
    pub user_id: Uuid,
    pub topic: String,
    /// Platform name -> tailored caption.
    pub captions: serde_json::Value,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub link_url: Option<String>,
    pub status: ContentStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Caption for a platform, falling back to the first caption present.
    pub fn caption_for(&self, platform: Platform) -> Option<String> {
        let map = self.captions.as_object()?;
        map.get(platform.as_str())
            .or_else(|| map.values().next())
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// Publish attempt, one per (content, platform)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub content_id: Uuid,
    pub social_account_id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub status: PostStatus,
    pub scheduled_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub platform_post_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Manual retry is allowed until the cumulative attempt budget is
    /// spent. `retry_count` carries over across reschedules.
    pub fn can_retry(&self, max_attempts: u32) -> bool {
        self.status == PostStatus::Failed && self.retry_count < max_attempts as i32
    }
}

// ===== Request DTOs =====

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub brand_voice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContentRequest {
    #[validate(length(min = 1, max = 500))]
    pub topic: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub captions: Option<serde_json::Value>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContentRequest {
    pub topic: Option<String>,
    pub captions: Option<serde_json::Value>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectContentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentRequest {
    /// Platforms to tailor captions for; defaults to all supported.
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub with_image: bool,
    #[serde(default)]
    pub with_audio: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostsRequest {
    pub content_id: Uuid,
    #[validate(length(min = 1))]
    pub platforms: Vec<Platform>,
    /// When absent, posts publish immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips_names() {
        for platform in Platform::ALL {
            assert_eq!(Platform::from_str(platform.as_str()), Some(platform));
        }
        assert_eq!(Platform::from_str("x"), Some(Platform::Twitter));
        assert_eq!(Platform::from_str("myspace"), None);
    }

    #[test]
    fn only_twitter_and_tiktok_use_pkce() {
        let pkce: Vec<Platform> = Platform::ALL
            .into_iter()
            .filter(Platform::uses_pkce)
            .collect();
        assert_eq!(pkce, vec![Platform::Twitter, Platform::Tiktok]);
    }

    #[test]
    fn content_status_transitions_follow_approval_graph() {
        use ContentStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(Pending));
        assert!(Approved.can_transition_to(Published));
        // No skipping approval, no un-publishing.
        assert!(!Draft.can_transition_to(Approved));
        assert!(!Draft.can_transition_to(Published));
        assert!(!Published.can_transition_to(Pending));
    }

    #[test]
    fn caption_fallback_uses_any_available_caption() {
        let content = Content {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            topic: "launch".into(),
            captions: serde_json::json!({"twitter": "short one"}),
            image_url: None,
            audio_url: None,
            link_url: None,
            status: ContentStatus::Approved,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            content.caption_for(Platform::Twitter).as_deref(),
            Some("short one")
        );
        // No linkedin caption stored: falls back to the one that exists.
        assert_eq!(
            content.caption_for(Platform::Linkedin).as_deref(),
            Some("short one")
        );
    }

    #[test]
    fn retry_budget_is_cumulative() {
        let mut post = Post {
            id: Uuid::new_v4(),
            content_id: Uuid::new_v4(),
            social_account_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform: Platform::Facebook,
            status: PostStatus::Failed,
            scheduled_at: Utc::now(),
            published_at: None,
            platform_post_id: None,
            error_message: Some("bad request".into()),
            retry_count: 1,
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(post.can_retry(3));

        // Attempts from earlier runs count against the budget.
        post.retry_count = 3;
        assert!(!post.can_retry(3));

        post.retry_count = 0;
        post.status = PostStatus::Published;
        assert!(!post.can_retry(3));
    }

    #[test]
    fn token_expiry_margin() {
        let mut account = SocialAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform: Platform::Twitter,
            account_ref: "1".into(),
            account_name: "acct".into(),
            access_token: "at".into(),
            refresh_token: None,
            token_expires_at: Some(Utc::now() + chrono::Duration::minutes(30)),
            platform_data: serde_json::json!({}),
            connected_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(account.token_expires_within(chrono::Duration::hours(1)));
        assert!(!account.token_expires_within(chrono::Duration::minutes(5)));
        account.token_expires_at = None;
        assert!(!account.token_expires_within(chrono::Duration::hours(1)));
    }
}
