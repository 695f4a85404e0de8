//! Instagram Business connector (Graph API).
//!
//! Authorization rides on the Facebook dialog; publishing uses the two-step
//! container flow: create a media container, then publish it. Instagram
//! publishes require an image.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ConnectorError, Result};
use crate::oauth::{decode_json, TokenResponse};
use crate::types::{AuthorizeUrl, ProfileInfo, PublishReceipt, PublishRequest, TokenSet};
use crate::{metadata_str, Connector};

const PLATFORM: &str = "instagram";
const DEFAULT_AUTH_BASE: &str = "https://www.facebook.com/v19.0";
const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const SCOPES: &str = "instagram_basic,instagram_content_publish,pages_show_list";

pub struct InstagramClient {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_base: String,
    graph_base: String,
}

impl InstagramClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            http: Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
        }
    }

    pub fn with_base_urls(mut self, auth_base: &str, graph_base: &str) -> Self {
        self.auth_base = auth_base.to_string();
        self.graph_base = graph_base.to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct PageList {
    data: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PageIgAccount {
    instagram_business_account: Option<IgAccount>,
}

#[derive(Debug, Deserialize)]
struct IgAccount {
    id: String,
    username: Option<String>,
    profile_picture_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[async_trait]
impl Connector for InstagramClient {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn refreshes_with_access_token(&self) -> bool {
        true
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> AuthorizeUrl {
        let url = format!(
            "{}/dialog/oauth?client_id={}&redirect_uri={}&state={}&scope={}&response_type=code",
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
        let response = self
            .http
            .get(format!("{}/oauth/access_token", self.graph_base))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await?;

        let token: TokenResponse = decode_json(PLATFORM, response).await?;
        Ok(token.into())
    }

    async fn refresh_token(&self, current_access_token: &str) -> Result<TokenSet> {
        let response = self
            .http
            .get(format!("{}/oauth/access_token", self.graph_base))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("fb_exchange_token", current_access_token),
            ])
            .send()
            .await?;

        let token: TokenResponse = decode_json(PLATFORM, response).await?;
        Ok(token.into())
    }

    /// Walk managed pages until one carries a linked IG business account.
    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo> {
        let response = self
            .http
            .get(format!("{}/me/accounts", self.graph_base))
            .query(&[("access_token", access_token)])
            .send()
            .await?;
        let pages: PageList = decode_json(PLATFORM, response).await?;

        for page in pages.data {
            let response = self
                .http
                .get(format!("{}/{}", self.graph_base, page.id))
                .query(&[
                    (
                        "fields",
                        "instagram_business_account{id,username,profile_picture_url}",
                    ),
                    ("access_token", access_token),
                ])
                .send()
                .await?;
            let linked: PageIgAccount = decode_json(PLATFORM, response).await?;

            if let Some(ig) = linked.instagram_business_account {
                return Ok(ProfileInfo {
                    account_ref: ig.id.clone(),
                    display_name: ig.username.unwrap_or_else(|| ig.id.clone()),
                    avatar_url: ig.profile_picture_url,
                    platform_data: serde_json::json!({ "ig_user_id": ig.id }),
                });
            }
        }

        Err(ConnectorError::Api {
            platform: PLATFORM,
            status: 400,
            message: "no Instagram business account linked to any managed page".to_string(),
        })
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let ig_user_id = metadata_str(&request.platform_data, PLATFORM, "ig_user_id")?;
        let image_url = request.image_url.as_deref().ok_or(ConnectorError::Api {
            platform: PLATFORM,
            status: 400,
            message: "Instagram posts require an image".to_string(),
        })?;

        // Step 1: create the media container.
        let response = self
            .http
            .post(format!("{}/{}/media", self.graph_base, ig_user_id))
            .form(&[
                ("image_url", image_url),
                ("caption", request.caption.as_str()),
                ("access_token", request.access_token.as_str()),
            ])
            .send()
            .await?;
        let container: ObjectId = decode_json(PLATFORM, response).await?;

        // Step 2: publish it.
        let response = self
            .http
            .post(format!("{}/{}/media_publish", self.graph_base, ig_user_id))
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

    fn client(server: &MockServer) -> InstagramClient {
        InstagramClient::new("ig-id", "ig-secret").with_base_urls(&server.uri(), &server.uri())
    }

    fn request(image: Option<&str>) -> PublishRequest {
        PublishRequest {
            caption: "spring launch".into(),
            image_url: image.map(str::to_string),
            link_url: None,
            access_token: "ig-token".into(),
            platform_data: serde_json::json!({"ig_user_id": "ig-77"}),
        }
    }

    #[tokio::test]
    async fn publish_runs_container_then_publish() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ig-77/media"))
            .and(body_string_contains("image_url="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "c-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ig-77/media_publish"))
            .and(body_string_contains("creation_id=c-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "media-9"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let receipt = client(&server)
            .publish(&request(Some("https://img.example/a.jpg")))
            .await
            .unwrap();
        assert_eq!(receipt.platform_post_id, "media-9");
    }

    #[tokio::test]
    async fn publish_without_image_is_rejected_locally() {
        let server = MockServer::start().await;
        let err = client(&server).publish(&request(None)).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("require an image"));
    }

    #[tokio::test]
    async fn container_failure_propagates_platform_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ig-77/media"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string("transient upstream error"),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .publish(&request(Some("https://img.example/a.jpg")))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
