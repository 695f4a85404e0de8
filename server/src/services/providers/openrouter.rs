/// OpenRouter chat-completions client, used for caption generation.
use serde::Deserialize;

use crate::error::{AppError, Result};

pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl OpenRouterClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// One chat completion: system prompt + user prompt in, text out.
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "OpenRouter error ({status}): {message}"
            )));
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Upstream("OpenRouter returned no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer or-key"))
            .and(body_string_contains("coffee shop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"twitter\": \"hi\"}"}}]
            })))
            .mount(&server)
            .await;

        let text = OpenRouterClient::new("or-key", "openai/gpt-4o-mini")
            .with_base_url(&server.uri())
            .complete("you write captions", "coffee shop")
            .await
            .unwrap();
        assert_eq!(text, "{\"twitter\": \"hi\"}");
    }

    #[tokio::test]
    async fn upstream_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(402).set_body_string("payment required"))
            .mount(&server)
            .await;

        let err = OpenRouterClient::new("or-key", "openai/gpt-4o-mini")
            .with_base_url(&server.uri())
            .complete("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
