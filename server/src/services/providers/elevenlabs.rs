/// ElevenLabs text-to-speech client, used for audio narration.
use crate::error::{AppError, Result};

pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    voice_id: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: &str, voice_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: "https://api.elevenlabs.io".to_string(),
            voice_id: voice_id.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Synthesize speech for the given text. Returns MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let body = serde_json::json!({
            "text": text,
            "model_id": "eleven_multilingual_v2",
        });

        let response = self
            .http
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.base_url, self.voice_id
            ))
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "ElevenLabs error ({status}): {message}"
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-7"))
            .and(header("xi-api-key", "el-key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x49, 0x44, 0x33]))
            .mount(&server)
            .await;

        let bytes = ElevenLabsClient::new("el-key", "voice-7")
            .with_base_url(&server.uri())
            .synthesize("hello world")
            .await
            .unwrap();
        assert_eq!(bytes, vec![0x49, 0x44, 0x33]);
    }
}
