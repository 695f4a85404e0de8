//! LinkedIn connector (member shares via ugcPosts).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ConnectorError, Result};
use crate::oauth::{decode_json, post_token_form};
use crate::types::{AuthorizeUrl, ProfileInfo, PublishReceipt, PublishRequest, TokenSet};
use crate::{metadata_str, Connector};

const PLATFORM: &str = "linkedin";
const DEFAULT_AUTH_BASE: &str = "https://www.linkedin.com";
const DEFAULT_API_BASE: &str = "https://api.linkedin.com";
const SCOPES: &str = "openid profile w_member_social";

pub struct LinkedInClient {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_base: String,
    api_base: String,
}

impl LinkedInClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            http: Client::new(),
            client_id: client_id.to_string(),
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
struct UserInfo {
    sub: String,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UgcPostResponse {
    id: String,
}

#[async_trait]
impl Connector for LinkedInClient {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> AuthorizeUrl {
        let url = format!(
            "{}/oauth/v2/authorization?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}",
            self.auth_base,
            self.client_id,
            urlencoding::encode(redirect_uri),
            state,
            urlencoding::encode(SCOPES),
        );
        AuthorizeUrl {
            url,
            pkce_verifier: None,
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        _pkce_verifier: Option<&str>,
    ) -> Result<TokenSet> {
        post_token_form(
            &self.http,
            PLATFORM,
            &format!("{}/oauth/v2/accessToken", self.auth_base),
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ],
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        post_token_form(
            &self.http,
            PLATFORM,
            &format!("{}/oauth/v2/accessToken", self.auth_base),
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ],
        )
        .await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo> {
        let response = self
            .http
            .get(format!("{}/v2/userinfo", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?;
        let user: UserInfo = decode_json(PLATFORM, response).await?;

        Ok(ProfileInfo {
            account_ref: user.sub.clone(),
            display_name: user.name.unwrap_or_else(|| user.sub.clone()),
            avatar_url: user.picture,
            platform_data: serde_json::json!({
                "person_urn": format!("urn:li:person:{}", user.sub),
            }),
        })
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let author = metadata_str(&request.platform_data, PLATFORM, "person_urn")?;

        let media_category = if request.link_url.is_some() {
            "ARTICLE"
        } else {
            "NONE"
        };
        let mut share_content = serde_json::json!({
            "shareCommentary": { "text": request.caption },
            "shareMediaCategory": media_category,
        });
        if let Some(link) = &request.link_url {
            share_content["media"] = serde_json::json!([{
                "status": "READY",
                "originalUrl": link,
            }]);
        }

        let body = serde_json::json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": share_content,
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            },
        });

        let response = self
            .http
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(&request.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;

        // LinkedIn returns the URN in the X-RestLi-Id header; the body also
        // carries it on success.
        if let Some(id) = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
        {
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ConnectorError::from_status(PLATFORM, status, body, None));
            }
            return Ok(PublishReceipt {
                platform_post_id: id,
                permalink: None,
            });
        }

        let posted: UgcPostResponse = decode_json(PLATFORM, response).await?;
        Ok(PublishReceipt {
            platform_post_id: posted.id,
            permalink: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> LinkedInClient {
        LinkedInClient::new("li-id", "li-secret").with_base_urls(&server.uri(), &server.uri())
    }

    #[test]
    fn authorize_url_has_member_social_scope() {
        let li = LinkedInClient::new("li-id", "li-secret");
        let auth = li.authorize_url("st", "https://app.example/cb");
        assert!(auth.url.contains("w_member_social"));
        assert!(auth.pkce_verifier.is_none());
    }

    #[tokio::test]
    async fn publish_sends_ugc_post_with_author_urn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(body_string_contains("urn:li:person:abc"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-restli-id", "urn:li:share:42")
                    .set_body_json(serde_json::json!({"id": "urn:li:share:42"})),
            )
            .mount(&server)
            .await;

        let receipt = client(&server)
            .publish(&PublishRequest {
                caption: "new role".into(),
                image_url: None,
                link_url: None,
                access_token: "li-at".into(),
                platform_data: serde_json::json!({"person_urn": "urn:li:person:abc"}),
            })
            .await
            .unwrap();
        assert_eq!(receipt.platform_post_id, "urn:li:share:42");
    }
}
