/// Post publishing with retries
///
/// Publishing claims the post row first (scheduled -> posting) so that
/// concurrent workers never double-publish, then runs the platform call
/// under an exponential backoff policy. Once every post of a content has
/// settled, the content status is rolled up.
use rand::Rng;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use connectors::{Connector, ConnectorError, PublishRequest};

use crate::config::PublisherConfig;
use crate::db::{contents, posts, social_accounts};
use crate::error::{AppError, Result};
use crate::models::{ContentStatus, Post, PostStatus, SocialAccount};
use crate::services::ConnectorRegistry;

/// Exponential backoff with full jitter.
///
/// Delay for attempt `n` (0-based) is drawn uniformly from
/// `[0, min(base * 2^n, max))`. A platform-supplied `Retry-After` takes
/// precedence, still capped at `max`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(requested) = retry_after {
            return requested.min(self.max_delay);
        }

        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        if exp.is_zero() {
            return exp;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis() as u64);
        Duration::from_millis(jitter_ms)
    }
}

pub struct PublisherService {
    pool: PgPool,
    registry: ConnectorRegistry,
    policy: RetryPolicy,
}

impl PublisherService {
    pub fn new(pool: PgPool, registry: ConnectorRegistry, policy: RetryPolicy) -> Self {
        Self {
            pool,
            registry,
            policy,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Claim and publish one post. Returns the final status, or `None`
    /// when another worker already claimed it.
    pub async fn publish_post(&self, post_id: Uuid) -> Result<Option<PostStatus>> {
        let Some(post) = posts::claim_for_publishing(&self.pool, post_id).await? else {
            return Ok(None);
        };

        let status = self.publish_claimed(&post).await?;
        self.rollup_content_status(post.content_id).await?;
        Ok(Some(status))
    }

    async fn publish_claimed(&self, post: &Post) -> Result<PostStatus> {
        let (mut request, mut account) = match self.build_request(post).await {
            Ok(built) => built,
            Err(err) => {
                posts::mark_failed(&self.pool, post.id, &err.to_string(), 0).await?;
                return Ok(PostStatus::Failed);
            }
        };

        let connector = match self.registry.get(post.platform) {
            Ok(connector) => connector.clone(),
            Err(err) => {
                posts::mark_failed(&self.pool, post.id, &err.to_string(), 0).await?;
                return Ok(PostStatus::Failed);
            }
        };

        let mut attempt = 0u32;
        let mut token_refreshed = false;
        loop {
            match connector.publish(&request).await {
                Ok(receipt) => {
                    posts::mark_published(
                        &self.pool,
                        post.id,
                        &receipt.platform_post_id,
                        attempt as i32,
                    )
                    .await?;
                    tracing::info!(
                        post_id = %post.id,
                        platform = post.platform.as_str(),
                        platform_post_id = %receipt.platform_post_id,
                        attempt,
                        "post published"
                    );
                    return Ok(PostStatus::Published);
                }
                Err(ConnectorError::TokenExpired { .. })
                    if !token_refreshed
                        && (account.refresh_token.is_some()
                            || connector.refreshes_with_access_token()) =>
                {
                    // One refresh per publish; a second 401 is permanent.
                    token_refreshed = true;
                    match self.refresh_access_token(&connector, &account).await {
                        Ok(refreshed) => {
                            tracing::info!(
                                post_id = %post.id,
                                platform = post.platform.as_str(),
                                "refreshed expired token during publish"
                            );
                            request.access_token = refreshed.access_token.clone();
                            account = refreshed;
                        }
                        Err(err) => {
                            posts::mark_failed(
                                &self.pool,
                                post.id,
                                &err.to_string(),
                                attempt as i32,
                            )
                            .await?;
                            return Ok(PostStatus::Failed);
                        }
                    }
                }
                Err(err) => {
                    attempt += 1;
                    let out_of_attempts = attempt >= self.policy.max_attempts;
                    if !err.is_retryable() || out_of_attempts {
                        tracing::warn!(
                            post_id = %post.id,
                            platform = post.platform.as_str(),
                            attempt,
                            error = %err,
                            "post failed permanently"
                        );
                        posts::mark_failed(&self.pool, post.id, &err.to_string(), attempt as i32)
                            .await?;
                        return Ok(PostStatus::Failed);
                    }

                    let retry_after = retry_after_duration(&err);
                    let delay = self.policy.delay_for(attempt - 1, retry_after);
                    tracing::debug!(
                        post_id = %post.id,
                        platform = post.platform.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying publish"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn build_request(&self, post: &Post) -> Result<(PublishRequest, SocialAccount)> {
        let content = contents::find_content_by_id(&self.pool, post.content_id)
            .await?
            .ok_or_else(|| AppError::NotFound("content".to_string()))?;

        let account = social_accounts::find_account_by_id(&self.pool, post.social_account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("social account".to_string()))?;

        let caption = content
            .caption_for(post.platform)
            .ok_or_else(|| AppError::BadRequest("content has no caption".to_string()))?;

        let request = PublishRequest {
            caption,
            image_url: content.image_url.clone(),
            link_url: content.link_url.clone(),
            access_token: account.access_token.clone(),
            platform_data: account.platform_data.clone(),
        };

        Ok((request, account))
    }

    /// Refresh an account's token mid-publish and persist the new pair.
    async fn refresh_access_token(
        &self,
        connector: &std::sync::Arc<dyn Connector>,
        account: &SocialAccount,
    ) -> Result<SocialAccount> {
        let token = crate::services::oauth::refresh_source(connector.as_ref(), account)?;
        let tokens = connector.refresh_token(token).await?;

        social_accounts::update_tokens(
            &self.pool,
            account.id,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            tokens.expires_at,
        )
        .await?;

        social_accounts::find_account_by_id(&self.pool, account.id)
            .await?
            .ok_or_else(|| AppError::NotFound("social account".to_string()))
    }

    /// Once every post has settled, roll the content status forward:
    /// published only when every post made it out, failed otherwise.
    async fn rollup_content_status(&self, content_id: Uuid) -> Result<()> {
        let counts = posts::count_by_status_for_content(&self.pool, content_id).await?;

        let all_settled = counts.iter().all(|(status, _)| status.is_terminal());
        if !all_settled || counts.is_empty() {
            return Ok(());
        }

        let any_failed = counts
            .iter()
            .any(|(status, n)| *status == PostStatus::Failed && *n > 0);

        let next = if any_failed {
            ContentStatus::Failed
        } else {
            ContentStatus::Published
        };

        contents::set_status(&self.pool, content_id, next).await?;
        Ok(())
    }
}

fn retry_after_duration(err: &ConnectorError) -> Option<Duration> {
    err.retry_after_ms().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(30_000),
        }
    }

    #[test]
    fn delay_stays_under_exponential_cap() {
        let policy = policy();
        for attempt in 0..10 {
            let cap = Duration::from_millis(500)
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(Duration::from_millis(30_000));
            let delay = policy.delay_for(attempt, None);
            assert!(delay <= cap, "attempt {attempt}: {delay:?} > {cap:?}");
        }
    }

    #[test]
    fn retry_after_overrides_backoff_but_not_the_cap() {
        let policy = policy();
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_millis(2_000))),
            Duration::from_millis(2_000)
        );
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(600))),
            Duration::from_millis(30_000)
        );
    }

    #[test]
    fn at_least_one_attempt() {
        let policy = RetryPolicy::from_config(&crate::config::PublisherConfig {
            max_retries: 0,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            poll_interval_secs: 30,
            token_refresh_interval_secs: 3_600,
        });
        assert_eq!(policy.max_attempts, 1);
    }
}
