use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens returned by a code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Space-separated scopes granted, when the platform reports them.
    pub scope: Option<String>,
}

impl TokenSet {
    pub fn from_expires_in(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            scope,
        }
    }
}

/// Normalized identity of the connected platform account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// Platform-side user/page identifier.
    pub account_ref: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Platform-specific extras the publish path needs later
    /// (page tokens, IG user ids, board ids, member URNs).
    #[serde(default)]
    pub platform_data: serde_json::Value,
}

/// Platform-agnostic publish payload built by the orchestrator.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub caption: String,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
    pub access_token: String,
    /// The account's stored `platform_data` blob.
    pub platform_data: serde_json::Value,
}

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub platform_post_id: String,
    pub permalink: Option<String>,
}

/// Provider authorize URL plus the PKCE verifier the caller must hold on to.
#[derive(Debug, Clone)]
pub struct AuthorizeUrl {
    pub url: String,
    pub pkce_verifier: Option<String>,
}
