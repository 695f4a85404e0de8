//! Threads connector (container flow, same shape as Instagram).
//!
//! Short-lived tokens from the code exchange are refreshed through the
//! `th_refresh_token` grant, which takes the current access token rather
//! than a separate refresh token.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;
use crate::oauth::{decode_json, post_token_form, TokenResponse};
use crate::types::{AuthorizeUrl, ProfileInfo, PublishReceipt, PublishRequest, TokenSet};
use crate::{metadata_str, Connector};

const PLATFORM: &str = "threads";
const DEFAULT_AUTH_BASE: &str = "https://threads.net";
const DEFAULT_API_BASE: &str = "https://graph.threads.net";
const SCOPES: &str = "threads_basic,threads_content_publish";

pub struct ThreadsClient {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_base: String,
    api_base: String,
}

impl ThreadsClient {
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
struct ThreadsUser {
    id: String,
    username: Option<String>,
    threads_profile_picture_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[async_trait]
impl Connector for ThreadsClient {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn refreshes_with_access_token(&self) -> bool {
        true
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> AuthorizeUrl {
        let url = format!(
            "{}/oauth/authorize?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}",
            self.auth_base,
            self.client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPES),
            state,
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
            &format!("{}/oauth/access_token", self.api_base),
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ],
        )
        .await
    }

    async fn refresh_token(&self, current_access_token: &str) -> Result<TokenSet> {
        let response = self
            .http
            .get(format!("{}/refresh_access_token", self.api_base))
            .query(&[
                ("grant_type", "th_refresh_token"),
                ("access_token", current_access_token),
            ])
            .send()
            .await?;
        let token: TokenResponse = decode_json(PLATFORM, response).await?;
        Ok(token.into())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo> {
        let response = self
            .http
            .get(format!("{}/v1.0/me", self.api_base))
            .query(&[
                ("fields", "id,username,threads_profile_picture_url"),
                ("access_token", access_token),
            ])
            .send()
            .await?;
        let user: ThreadsUser = decode_json(PLATFORM, response).await?;

        Ok(ProfileInfo {
            account_ref: user.id.clone(),
            display_name: user.username.unwrap_or_else(|| user.id.clone()),
            avatar_url: user.threads_profile_picture_url,
            platform_data: serde_json::json!({ "threads_user_id": user.id }),
        })
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let user_id = metadata_str(&request.platform_data, PLATFORM, "threads_user_id")?;

        // Container create, then publish.
        let mut form: Vec<(&str, &str)> = vec![
            ("text", request.caption.as_str()),
            ("access_token", request.access_token.as_str()),
        ];
        let media_type = if let Some(image_url) = &request.image_url {
            form.push(("image_url", image_url.as_str()));
            "IMAGE"
        } else {
            "TEXT"
        };
        form.push(("media_type", media_type));

        let response = self
            .http
            .post(format!("{}/v1.0/{}/threads", self.api_base, user_id))
            .form(&form)
            .send()
            .await?;
        let container: ObjectId = decode_json(PLATFORM, response).await?;

        let response = self
            .http
            .post(format!("{}/v1.0/{}/threads_publish", self.api_base, user_id))
            .form(&[
                ("creation_id", container.id.as_str()),
                ("access_token", request.access_token.as_str()),
            ])
            .send()
            .await?;
        let published: ObjectId = decode_json(PLATFORM, response).await?;

        Ok(PublishReceipt {
            platform_post_id: published.id,
            permalink: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn text_post_uses_text_media_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/th-1/threads"))
            .and(body_string_contains("media_type=TEXT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c-5"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/th-1/threads_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "t-6"})))
            .mount(&server)
            .await;

        let receipt = ThreadsClient::new("th-id", "th-secret")
            .with_base_urls(&server.uri(), &server.uri())
            .publish(&PublishRequest {
                caption: "thought".into(),
                image_url: None,
                link_url: None,
                access_token: "th-at".into(),
                platform_data: serde_json::json!({"threads_user_id": "th-1"}),
            })
            .await
            .unwrap();
        assert_eq!(receipt.platform_post_id, "t-6");
    }
}
