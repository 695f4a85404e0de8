//! Pinterest connector (v5 pins API).
//!
//! Pins land on a board: `fetch_profile` resolves the first board and stores
//! its id in `platform_data`. Pins require an image.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ConnectorError, Result};
use crate::oauth::{decode_json, TokenResponse};
use crate::types::{AuthorizeUrl, ProfileInfo, PublishReceipt, PublishRequest, TokenSet};
use crate::{metadata_str, Connector};

const PLATFORM: &str = "pinterest";
const DEFAULT_AUTH_BASE: &str = "https://www.pinterest.com";
const DEFAULT_API_BASE: &str = "https://api.pinterest.com";
const SCOPES: &str = "boards:read,pins:read,pins:write,user_accounts:read";

pub struct PinterestClient {
    http: Client,
    client_id: String,
    client_secret: String,
    auth_base: String,
    api_base: String,
}

impl PinterestClient {
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

    /// Pinterest token endpoint requires basic auth.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self
            .http
            .post(format!("{}/v5/oauth/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;
        let token: TokenResponse = decode_json(PLATFORM, response).await?;
        Ok(token.into())
    }
}

#[derive(Debug, Deserialize)]
struct UserAccount {
    username: String,
    profile_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoardList {
    items: Vec<Board>,
}

#[derive(Debug, Deserialize)]
struct Board {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Pin {
    id: String,
}

#[async_trait]
impl Connector for PinterestClient {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> AuthorizeUrl {
        let url = format!(
            "{}/oauth/?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}",
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
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProfileInfo> {
        let response = self
            .http
            .get(format!("{}/v5/user_account", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?;
        let account: UserAccount = decode_json(PLATFORM, response).await?;

        // Default pin target: the account's first board.
        let response = self
            .http
            .get(format!("{}/v5/boards", self.api_base))
            .query(&[("page_size", "1")])
            .bearer_auth(access_token)
            .send()
            .await?;
        let boards: BoardList = decode_json(PLATFORM, response).await?;
        let board_id = boards.items.into_iter().next().map(|b| b.id);

        Ok(ProfileInfo {
            account_ref: account.username.clone(),
            display_name: account.username,
            avatar_url: account.profile_image,
            platform_data: serde_json::json!({ "board_id": board_id }),
        })
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let board_id = metadata_str(&request.platform_data, PLATFORM, "board_id")?;
        let image_url = request.image_url.as_deref().ok_or(ConnectorError::Api {
            platform: PLATFORM,
            status: 400,
            message: "Pinterest pins require an image".to_string(),
        })?;

        let mut body = serde_json::json!({
            "board_id": board_id,
            "description": request.caption,
            "media_source": {
                "source_type": "image_url",
                "url": image_url,
            },
        });
        if let Some(link) = &request.link_url {
            body["link"] = serde_json::json!(link);
        }

        let response = self
            .http
            .post(format!("{}/v5/pins", self.api_base))
            .bearer_auth(&request.access_token)
            .json(&body)
            .send()
            .await?;
        let pin: Pin = decode_json(PLATFORM, response).await?;

        Ok(PublishReceipt {
            platform_post_id: pin.id,
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
    async fn publish_creates_pin_on_stored_board() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v5/pins"))
            .and(body_string_contains("board-3"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "pin-11"})),
            )
            .mount(&server)
            .await;

        let receipt = PinterestClient::new("pi-id", "pi-secret")
            .with_base_urls(&server.uri(), &server.uri())
            .publish(&PublishRequest {
                caption: "mood board".into(),
                image_url: Some("https://img.example/b.jpg".into()),
                link_url: None,
                access_token: "pi-at".into(),
                platform_data: serde_json::json!({"board_id": "board-3"}),
            })
            .await
            .unwrap();
        assert_eq!(receipt.platform_post_id, "pin-11");
    }

    #[tokio::test]
    async fn missing_board_is_a_permanent_error() {
        let server = MockServer::start().await;
        let err = PinterestClient::new("pi-id", "pi-secret")
            .with_base_urls(&server.uri(), &server.uri())
            .publish(&PublishRequest {
                caption: "mood board".into(),
                image_url: Some("https://img.example/b.jpg".into()),
                link_url: None,
                access_token: "pi-at".into(),
                platform_data: serde_json::json!({"board_id": null}),
            })
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
