//! Facebook Pages connector (Graph API).
//!
//! Publishing targets a page, not the user profile: `fetch_profile` resolves
//! the first managed page and stores its id and page access token in
//! `platform_data`. Facebook has no refresh tokens; `refresh_token` performs
//! the documented long-lived token exchange with the current access token.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ConnectorError, Result};
use crate::oauth::{decode_json, TokenResponse};
use crate::types::{AuthorizeUrl, ProfileInfo, PublishReceipt, PublishRequest, TokenSet};
use crate::{metadata_str, Connector};

const PLATFORM: &str = "facebook";
const DEFAULT_AUTH_BASE: &str = "https://www.facebook.com/v19.0";
const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const SCOPES: &str = "pages_manage_posts,pages_read_engagement,pages_show_list";

pub struct FacebookClient {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_base: String,
    graph_base: String,
}

impl FacebookClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            http: Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
        }
    }

    /// Point the client at a different API host (tests).
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
    name: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(alias = "post_id")]
    id: String,
}

#[async_trait]
impl Connector for FacebookClient {
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
        // Graph does token exchange over GET with query params.
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

    /// Long-lived token exchange: Facebook has no refresh tokens, the
    /// current access token is traded for a ~60-day one.
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

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo> {
        let response = self
            .http
            .get(format!("{}/me/accounts", self.graph_base))
            .query(&[("access_token", access_token)])
            .send()
            .await?;

        let pages: PageList = decode_json(PLATFORM, response).await?;
        let page = pages.data.into_iter().next().ok_or(ConnectorError::Api {
            platform: PLATFORM,
            status: 400,
            message: "no managed Facebook page on this account".to_string(),
        })?;

        Ok(ProfileInfo {
            account_ref: page.id.clone(),
            display_name: page.name,
            avatar_url: None,
            platform_data: serde_json::json!({
                "page_id": page.id,
                "page_access_token": page.access_token,
            }),
        })
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let page_id = metadata_str(&request.platform_data, PLATFORM, "page_id")?;
        let page_token = metadata_str(&request.platform_data, PLATFORM, "page_access_token")?;

        // Photo post when an image is attached, plain feed post otherwise.
        let response = if let Some(image_url) = &request.image_url {
            self.http
                .post(format!("{}/{}/photos", self.graph_base, page_id))
                .form(&[
                    ("url", image_url.as_str()),
                    ("caption", request.caption.as_str()),
                    ("access_token", page_token),
                ])
                .send()
                .await?
        } else {
            let mut form = vec![
                ("message", request.caption.as_str()),
                ("access_token", page_token),
            ];
            if let Some(link) = &request.link_url {
                form.push(("link", link.as_str()));
            }
            self.http
                .post(format!("{}/{}/feed", self.graph_base, page_id))
                .form(&form)
                .send()
                .await?
        };

        let published: PublishResponse = decode_json(PLATFORM, response).await?;
        Ok(PublishReceipt {
            platform_post_id: published.id,
            permalink: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> FacebookClient {
        FacebookClient::new("fb-id", "fb-secret").with_base_urls(&server.uri(), &server.uri())
    }

    #[test]
    fn authorize_url_carries_state_and_scopes() {
        let fb = FacebookClient::new("fb-id", "fb-secret");
        let auth = fb.authorize_url("state-123", "https://app.example/cb");
        assert!(auth.url.contains("client_id=fb-id"));
        assert!(auth.url.contains("state=state-123"));
        assert!(auth.url.contains("pages_manage_posts"));
        assert!(auth.pkce_verifier.is_none());
    }

    #[tokio::test]
    async fn exchange_code_decodes_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("code", "the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fb-token",
                "token_type": "bearer",
                "expires_in": 5184000
            })))
            .mount(&server)
            .await;

        let token = client(&server)
            .exchange_code("the-code", "https://app.example/cb", None)
            .await
            .unwrap();
        assert_eq!(token.access_token, "fb-token");
        assert!(token.expires_at.is_some());
        assert!(token.refresh_token.is_none());
    }

    #[tokio::test]
    async fn long_lived_exchange_refreshes_with_the_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("grant_type", "fb_exchange_token"))
            .and(query_param("fb_exchange_token", "fb-at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fb-long-lived",
                "token_type": "bearer",
                "expires_in": 5184000
            })))
            .mount(&server)
            .await;

        let fb = client(&server);
        // Code exchange never yields a refresh token; the refresh path
        // trades the current access token instead.
        assert!(fb.refreshes_with_access_token());
        let token = fb.refresh_token("fb-at").await.unwrap();
        assert_eq!(token.access_token, "fb-long-lived");
        assert!(token.refresh_token.is_none());
    }

    #[tokio::test]
    async fn publish_photo_hits_page_photos_edge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/page-1/photos"))
            .and(body_string_contains("caption=hello"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "page-1_999"})),
            )
            .mount(&server)
            .await;

        let receipt = client(&server)
            .publish(&PublishRequest {
                caption: "hello".into(),
                image_url: Some("https://img.example/a.jpg".into()),
                link_url: None,
                access_token: "user-token".into(),
                platform_data: serde_json::json!({
                    "page_id": "page-1",
                    "page_access_token": "page-token"
                }),
            })
            .await
            .unwrap();
        assert_eq!(receipt.platform_post_id, "page-1_999");
    }

    #[tokio::test]
    async fn publish_without_page_metadata_fails_permanently() {
        let server = MockServer::start().await;
        let err = client(&server)
            .publish(&PublishRequest {
                caption: "hello".into(),
                image_url: None,
                link_url: None,
                access_token: "user-token".into(),
                platform_data: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
