/// AI content generation
///
/// Orchestrates the provider clients: per-platform captions from the chat
/// model, an optional stock image, and optional audio narration written to
/// the local media directory. Generation runs against an existing draft
/// and submits it for approval.
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::contents;
use crate::error::{AppError, Result};
use crate::models::{Content, ContentStatus, GenerateContentRequest, Platform, User};
use crate::services::providers::{ElevenLabsClient, OpenRouterClient, PexelsClient};

pub struct GenerationService {
    pool: PgPool,
    openrouter: OpenRouterClient,
    pexels: PexelsClient,
    elevenlabs: ElevenLabsClient,
    media_dir: String,
}

impl GenerationService {
    pub fn new(
        pool: PgPool,
        openrouter: OpenRouterClient,
        pexels: PexelsClient,
        elevenlabs: ElevenLabsClient,
        media_dir: String,
    ) -> Self {
        Self {
            pool,
            openrouter,
            pexels,
            elevenlabs,
            media_dir,
        }
    }

    /// Fill a draft content with generated captions (and optional image and
    /// audio), then move it to pending approval.
    pub async fn generate_for_content(
        &self,
        user: &User,
        content: &Content,
        request: &GenerateContentRequest,
    ) -> Result<Content> {
        if content.status != ContentStatus::Draft {
            return Err(AppError::Conflict(
                "only draft content can be generated".to_string(),
            ));
        }

        let platforms: Vec<Platform> = if request.platforms.is_empty() {
            Platform::ALL.to_vec()
        } else {
            request.platforms.clone()
        };

        let captions = self
            .generate_captions(user, &content.topic, &platforms)
            .await?;

        let image_url = if request.with_image && content.image_url.is_none() {
            self.pexels.search_photo(&content.topic).await?
        } else {
            None
        };

        contents::update_content(
            &self.pool,
            content.id,
            None,
            Some(&captions),
            image_url.as_deref(),
            None,
        )
        .await?;

        if request.with_audio {
            // Narrate the first caption; audio failure does not lose the
            // generated captions.
            if let Some(text) = captions
                .get(platforms[0].as_str())
                .and_then(|v| v.as_str())
            {
                match self.synthesize_to_file(content.id, text).await {
                    Ok(audio_url) => {
                        contents::set_audio_url(&self.pool, content.id, &audio_url).await?;
                    }
                    Err(err) => {
                        tracing::warn!(content_id = %content.id, error = %err, "audio generation failed");
                    }
                }
            }
        }

        contents::transition_status(
            &self.pool,
            content.id,
            ContentStatus::Draft,
            ContentStatus::Pending,
            None,
        )
        .await?
        .ok_or_else(|| AppError::Conflict("content status changed concurrently".to_string()))
    }

    async fn generate_captions(
        &self,
        user: &User,
        topic: &str,
        platforms: &[Platform],
    ) -> Result<serde_json::Value> {
        let names: Vec<&str> = platforms.iter().map(|p| p.as_str()).collect();

        let system_prompt = format!(
            "You are a social media copywriter{}{}. Respond with a single JSON object \
             whose keys are exactly: {}. Each value is a caption tailored to that \
             platform's conventions and length limits. No markdown, no extra keys.",
            user.business_name
                .as_deref()
                .map(|b| format!(" for {b}"))
                .unwrap_or_default(),
            user.brand_voice
                .as_deref()
                .map(|v| format!(". Brand voice: {v}"))
                .unwrap_or_default(),
            names.join(", "),
        );

        let raw = self.openrouter.complete(&system_prompt, topic).await?;
        let captions = parse_caption_json(&raw)?;

        // Every requested platform must have a caption.
        for name in &names {
            if captions.get(*name).and_then(|v| v.as_str()).is_none() {
                return Err(AppError::Upstream(format!(
                    "model response is missing a caption for {name}"
                )));
            }
        }

        Ok(captions)
    }

    async fn synthesize_to_file(&self, content_id: Uuid, text: &str) -> Result<String> {
        let bytes = self.elevenlabs.synthesize(text).await?;

        let file_name = format!("{content_id}.mp3");
        let path = std::path::Path::new(&self.media_dir).join(&file_name);
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| AppError::Internal(format!("media dir: {e}")))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Internal(format!("write audio: {e}")))?;

        Ok(format!("/media/{file_name}"))
    }
}

/// Parse the model's caption object, tolerating a Markdown code fence
/// around the JSON.
fn parse_caption_json(raw: &str) -> Result<serde_json::Value> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: serde_json::Value = serde_json::from_str(inner)
        .map_err(|e| AppError::Upstream(format!("model returned invalid JSON: {e}")))?;

    if !value.is_object() {
        return Err(AppError::Upstream(
            "model response is not a JSON object".to_string(),
        ));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_object() {
        let value = parse_caption_json(r#"{"twitter": "short", "linkedin": "long"}"#).unwrap();
        assert_eq!(value["twitter"], "short");
    }

    #[test]
    fn strips_markdown_code_fence() {
        let raw = "```json\n{\"twitter\": \"short\"}\n```";
        let value = parse_caption_json(raw).unwrap();
        assert_eq!(value["twitter"], "short");
    }

    #[test]
    fn rejects_non_object_responses() {
        assert!(parse_caption_json("[1, 2]").is_err());
        assert!(parse_caption_json("sorry, I can't").is_err());
    }
}
