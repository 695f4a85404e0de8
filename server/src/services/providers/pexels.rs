/// Pexels photo search client, used for stock image lookup.
use serde::Deserialize;

use crate::error::{AppError, Result};

pub struct PexelsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSrc,
}

#[derive(Debug, Deserialize)]
struct PhotoSrc {
    large: String,
}

impl PexelsClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: "https://api.pexels.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// URL of the best-matching stock photo for a query, if any.
    pub async fn search_photo(&self, query: &str) -> Result<Option<String>> {
        let response = self
            .http
            .get(format!("{}/v1/search", self.base_url))
            .query(&[("query", query), ("per_page", "1")])
            .header("Authorization", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Upstream(format!("Pexels error ({status})")));
        }

        let search: SearchResponse = response.json().await?;
        Ok(search.photos.into_iter().next().map(|p| p.src.large))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_returns_large_src() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("query", "espresso"))
            .and(header("Authorization", "px-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "photos": [{"src": {"large": "https://images.pexels.com/1.jpg"}}]
            })))
            .mount(&server)
            .await;

        let url = PexelsClient::new("px-key")
            .with_base_url(&server.uri())
            .search_photo("espresso")
            .await
            .unwrap();
        assert_eq!(url.as_deref(), Some("https://images.pexels.com/1.jpg"));
    }

    #[tokio::test]
    async fn empty_results_return_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"photos": []})),
            )
            .mount(&server)
            .await;

        let url = PexelsClient::new("px-key")
            .with_base_url(&server.uri())
            .search_photo("nothing")
            .await
            .unwrap();
        assert!(url.is_none());
    }
}
