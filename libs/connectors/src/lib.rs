/// Platform connectors for PostPilot
///
/// Outbound clients for the supported social platforms, normalized behind
/// the [`Connector`] trait:
///
/// - `facebook`: Facebook Pages (Graph API)
/// - `instagram`: Instagram Business (Graph API container flow)
/// - `twitter`: Twitter/X v2 (OAuth 2.0 + PKCE)
/// - `linkedin`: LinkedIn member shares (ugcPosts)
/// - `tiktok`: TikTok content posting (OAuth 2.0 + PKCE)
/// - `threads`: Threads (container flow)
/// - `pinterest`: Pinterest pins
///
/// Every client takes its API base URL at construction so tests can point it
/// at a mock server.
pub mod error;
pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod oauth;
pub mod pinterest;
pub mod threads;
pub mod tiktok;
pub mod twitter;
pub mod types;

pub use error::{ConnectorError, Result};
pub use facebook::FacebookClient;
pub use instagram::InstagramClient;
pub use linkedin::LinkedInClient;
pub use pinterest::PinterestClient;
pub use threads::ThreadsClient;
pub use tiktok::TikTokClient;
pub use twitter::TwitterClient;
pub use types::{AuthorizeUrl, ProfileInfo, PublishReceipt, PublishRequest, TokenSet};

use async_trait::async_trait;

/// Common surface of every platform client.
///
/// `authorize_url` is synchronous URL building; the rest are network calls
/// against the platform's documented API.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable lowercase platform name (matches the `platform` DB column).
    fn platform(&self) -> &'static str;

    /// Whether the authorization flow uses PKCE instead of a client secret
    /// at the browser.
    fn uses_pkce(&self) -> bool {
        false
    }

    /// Build the provider authorization URL for the given state. Returns the
    /// PKCE verifier alongside when the platform uses one.
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> AuthorizeUrl;

    /// Exchange an authorization code for tokens. `pkce_verifier` is present
    /// exactly when `uses_pkce` is true.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet>;

    /// Whether `refresh_token` expects the current *access* token instead of
    /// a dedicated refresh token. True for the long-lived exchange flows
    /// (Facebook/Instagram `fb_exchange_token`, Threads `th_refresh_token`),
    /// which never issue a refresh token at code exchange.
    fn refreshes_with_access_token(&self) -> bool {
        false
    }

    /// Refresh an access token. Exchange-style platforms (see
    /// `refreshes_with_access_token`) take the current access token here;
    /// platforms without any refresh support return
    /// [`ConnectorError::Unsupported`].
    async fn refresh_token(&self, token: &str) -> Result<TokenSet>;

    /// Fetch the connected account's identity and publish metadata.
    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo>;

    /// Publish a piece of content. One logical post per call.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt>;
}

/// Read a required string field out of a stored `platform_data` blob.
pub(crate) fn metadata_str<'a>(
    data: &'a serde_json::Value,
    platform: &'static str,
    field: &'static str,
) -> Result<&'a str> {
    data.get(field)
        .and_then(|v| v.as_str())
        .ok_or(ConnectorError::MissingMetadata { platform, field })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_str_reads_present_field() {
        let data = serde_json::json!({"page_id": "123"});
        assert_eq!(metadata_str(&data, "facebook", "page_id").unwrap(), "123");
    }

    #[test]
    fn exchange_style_platforms_refresh_with_the_access_token() {
        assert!(FacebookClient::new("a", "b").refreshes_with_access_token());
        assert!(InstagramClient::new("a", "b").refreshes_with_access_token());
        assert!(ThreadsClient::new("a", "b").refreshes_with_access_token());
        assert!(!TwitterClient::new("a", "b").refreshes_with_access_token());
        assert!(!TikTokClient::new("a", "b").refreshes_with_access_token());
        assert!(!PinterestClient::new("a", "b").refreshes_with_access_token());
        assert!(!LinkedInClient::new("a", "b").refreshes_with_access_token());
    }

    #[test]
    fn metadata_str_reports_missing_field() {
        let data = serde_json::json!({});
        let err = metadata_str(&data, "facebook", "page_id").unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::MissingMetadata {
                field: "page_id",
                ..
            }
        ));
    }
}
