//! TikTok connector (content posting API, OAuth 2.0 with PKCE).
//!
//! Publishing uses the photo direct-post flow with `PULL_FROM_URL`; TikTok
//! fetches the image itself. Text-only posts are not a TikTok concept and
//! are rejected locally.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ConnectorError, Result};
use crate::oauth::{decode_json, generate_pkce, post_token_form};
use crate::types::{AuthorizeUrl, ProfileInfo, PublishReceipt, PublishRequest, TokenSet};
use crate::Connector;

const PLATFORM: &str = "tiktok";
const DEFAULT_AUTH_BASE: &str = "https://www.tiktok.com";
const DEFAULT_API_BASE: &str = "https://open.tiktokapis.com";
const SCOPES: &str = "user.info.basic,video.publish";

pub struct TikTokClient {
    http: Client,
    client_key: String,
    client_secret: String,
    auth_base: String,
    api_base: String,
}

impl TikTokClient {
    pub fn new(client_key: &str, client_secret: &str) -> Self {
        Self {
            http: Client::new(),
            client_key: client_key.to_string(),
            client_secret: client_secret.to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_base_urls(mut self, auth_base: &str, api_base: &str) -> Self {
        self.auth_base = auth_base.to_string();
        self.api_base = api_base.to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct UserInfoEnvelope {
    data: UserInfoData,
}

#[derive(Debug, Deserialize)]
struct UserInfoData {
    user: TikTokUser,
}

#[derive(Debug, Deserialize)]
struct TikTokUser {
    open_id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishEnvelope {
    data: PublishData,
}

#[derive(Debug, Deserialize)]
struct PublishData {
    publish_id: String,
}

#[async_trait]
impl Connector for TikTokClient {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> AuthorizeUrl {
        let pkce = generate_pkce();
        let url = format!(
            "{}/v2/auth/authorize/?client_key={}&scope={}&response_type=code&redirect_uri={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.auth_base,
            self.client_key,
            urlencoding::encode(SCOPES),
            urlencoding::encode(redirect_uri),
            state,
            pkce.challenge,
        );
        AuthorizeUrl {
            url,
            pkce_verifier: Some(pkce.verifier),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet> {
        post_token_form(
            &self.http,
            PLATFORM,
            &format!("{}/v2/oauth/token/", self.api_base),
            &[
                ("client_key", self.client_key.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
                ("code_verifier", pkce_verifier.unwrap_or_default()),
            ],
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        post_token_form(
            &self.http,
            PLATFORM,
            &format!("{}/v2/oauth/token/", self.api_base),
            &[
                ("client_key", self.client_key.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo> {
        let response = self
            .http
            .get(format!("{}/v2/user/info/", self.api_base))
            .query(&[("fields", "open_id,display_name,avatar_url")])
            .bearer_auth(access_token)
            .send()
            .await?;
        let envelope: UserInfoEnvelope = decode_json(PLATFORM, response).await?;
        let user = envelope.data.user;

        Ok(ProfileInfo {
            account_ref: user.open_id.clone(),
            display_name: user.display_name.unwrap_or_else(|| user.open_id.clone()),
            avatar_url: user.avatar_url,
            platform_data: serde_json::json!({ "open_id": user.open_id }),
        })
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let image_url = request.image_url.as_deref().ok_or(ConnectorError::Api {
            platform: PLATFORM,
            status: 400,
            message: "TikTok posts require an image".to_string(),
        })?;

        let body = serde_json::json!({
            "post_info": {
                "title": request.caption,
                "privacy_level": "PUBLIC_TO_EVERYONE",
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "photo_images": [image_url],
                "photo_cover_index": 0,
            },
            "post_mode": "DIRECT_POST",
            "media_type": "PHOTO",
        });

        let response = self
            .http
            .post(format!("{}/v2/post/publish/content/init/", self.api_base))
            .bearer_auth(&request.access_token)
            .json(&body)
            .send()
            .await?;
        let envelope: PublishEnvelope = decode_json(PLATFORM, response).await?;

        Ok(PublishReceipt {
            platform_post_id: envelope.data.publish_id,
            permalink: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_uses_client_key_and_pkce() {
        let tt = TikTokClient::new("tt-key", "tt-secret");
        let auth = tt.authorize_url("st-9", "https://app.example/cb");
        assert!(auth.url.contains("client_key=tt-key"));
        assert!(auth.url.contains("code_challenge_method=S256"));
        assert!(auth.pkce_verifier.is_some());
    }

    #[tokio::test]
    async fn publish_without_image_is_rejected_locally() {
        let tt = TikTokClient::new("tt-key", "tt-secret");
        let err = tt
            .publish(&PublishRequest {
                caption: "caption".into(),
                image_url: None,
                link_url: None,
                access_token: "tt-at".into(),
                platform_data: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
