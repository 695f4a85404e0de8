/// Post handlers: scheduling, immediate publishing, retry, cancel
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::db::{contents, posts, social_accounts};
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{ContentStatus, CreatePostsRequest, Platform, Post, PostStatus};
use crate::services::publisher::PublisherService;

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub status: Option<PostStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_posts(
    pool: web::Data<PgPool>,
    user_id: UserId,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let items = posts::find_posts_by_user(&pool, user_id.0, query.status, limit, offset).await?;
    Ok(HttpResponse::Ok().json(items))
}

/// Create one post per requested platform for an approved content.
/// Without `scheduled_at` the posts publish immediately.
pub async fn create_posts(
    pool: web::Data<PgPool>,
    publisher: web::Data<Arc<PublisherService>>,
    user_id: UserId,
    req: web::Json<CreatePostsRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let content = contents::find_content_by_id(&pool, req.content_id)
        .await?
        .filter(|c| c.user_id == user_id.0)
        .ok_or_else(|| AppError::NotFound("content".to_string()))?;

    if content.status != ContentStatus::Approved {
        return Err(AppError::Conflict(
            "only approved content can be posted".to_string(),
        ));
    }

    if let Some(at) = req.scheduled_at {
        if at < Utc::now() - chrono::Duration::minutes(1) {
            return Err(AppError::BadRequest(
                "scheduled_at is in the past".to_string(),
            ));
        }
    }

    let scheduled_at = req.scheduled_at.unwrap_or_else(Utc::now);
    let immediate = req.scheduled_at.is_none();

    let created = insert_posts(&pool, user_id.0, content.id, &req.platforms, scheduled_at).await?;

    if immediate {
        for post in &created {
            let publisher = publisher.get_ref().clone();
            let post_id = post.id;
            tokio::spawn(async move {
                if let Err(err) = publisher.publish_post(post_id).await {
                    tracing::error!(post_id = %post_id, error = %err, "immediate publish failed");
                }
            });
        }
    }

    Ok(HttpResponse::Created().json(created))
}

/// Insert one post per platform inside a single transaction: a platform
/// without a connected account, or a duplicate, rolls the whole request
/// back instead of leaving partial rows.
async fn insert_posts(
    pool: &PgPool,
    user_id: Uuid,
    content_id: Uuid,
    platforms: &[Platform],
    scheduled_at: DateTime<Utc>,
) -> Result<Vec<Post>> {
    let mut tx = pool.begin().await?;

    let mut created: Vec<Post> = Vec::with_capacity(platforms.len());
    for platform in platforms {
        let account = social_accounts::find_account(pool, user_id, *platform)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(format!("{} account is not connected", platform.as_str()))
            })?;

        let post = posts::create_post(
            &mut *tx,
            content_id,
            account.id,
            user_id,
            *platform,
            scheduled_at,
        )
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::Conflict(format!(
                "a post for this content already exists on {}",
                platform.as_str()
            )),
            other => other,
        })?;

        created.push(post);
    }

    tx.commit().await?;
    Ok(created)
}

pub async fn get_post(
    pool: web::Data<PgPool>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = owned_post(&pool, user_id.0, *post_id).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Put a failed post back in the queue and publish right away.
pub async fn retry_post(
    pool: web::Data<PgPool>,
    publisher: web::Data<Arc<PublisherService>>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = owned_post(&pool, user_id.0, *post_id).await?;

    if post.status != PostStatus::Failed {
        return Err(AppError::Conflict(
            "only failed posts can be retried".to_string(),
        ));
    }

    // The budget is cumulative: attempts from previous runs stay on the
    // row across reschedules.
    if !post.can_retry(publisher.max_attempts()) {
        return Err(AppError::Conflict(
            "post has exhausted its retry attempts".to_string(),
        ));
    }

    let rescheduled = posts::reschedule_failed(&pool, post.id, Utc::now())
        .await?
        .ok_or_else(|| AppError::Conflict("post status changed concurrently".to_string()))?;

    let publisher = publisher.get_ref().clone();
    let retry_id = rescheduled.id;
    tokio::spawn(async move {
        if let Err(err) = publisher.publish_post(retry_id).await {
            tracing::error!(post_id = %retry_id, error = %err, "retry publish failed");
        }
    });

    Ok(HttpResponse::Accepted().json(rescheduled))
}

/// Cancel a scheduled post. Posts that started publishing cannot be
/// cancelled.
pub async fn cancel_post(
    pool: web::Data<PgPool>,
    user_id: UserId,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post = owned_post(&pool, user_id.0, *post_id).await?;

    if !posts::cancel_scheduled(&pool, post.id).await? {
        return Err(AppError::Conflict(
            "post is no longer cancellable".to_string(),
        ));
    }

    Ok(HttpResponse::NoContent().finish())
}

async fn owned_post(pool: &PgPool, user_id: Uuid, post_id: Uuid) -> Result<Post> {
    posts::find_post_by_id(pool, post_id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("post".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users;
    use crate::models::{Content, SocialAccount, User};

    // These tests need a PostgreSQL instance; they no-op without one.
    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .ok()?;
        sqlx::migrate!("./migrations").run(&pool).await.ok()?;
        Some(pool)
    }

    async fn seed_user_with_facebook(pool: &PgPool) -> (User, SocialAccount, Content) {
        let suffix = Uuid::new_v4().simple().to_string();
        let user = users::create_user(
            pool,
            &format!("poster-{suffix}@example.com"),
            &format!("poster-{suffix}"),
            "not-a-real-hash",
            None,
            None,
            None,
        )
        .await
        .unwrap();

        let account = social_accounts::upsert_account(
            pool,
            user.id,
            Platform::Facebook,
            "page-1",
            "Test Page",
            "fb-at",
            None,
            None,
            &serde_json::json!({"page_id": "page-1", "page_access_token": "pt"}),
        )
        .await
        .unwrap();

        let content = contents::create_content(
            pool,
            user.id,
            "spring launch",
            &serde_json::json!({"facebook": "hello"}),
            None,
            None,
            None,
        )
        .await
        .unwrap();
        contents::set_status(pool, content.id, ContentStatus::Approved)
            .await
            .unwrap();

        (user, account, content)
    }

    #[tokio::test]
    async fn missing_account_rolls_back_the_whole_request() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let (user, _account, content) = seed_user_with_facebook(&pool).await;

        // Facebook is connected, Twitter is not: no rows may survive.
        let result = insert_posts(
            &pool,
            user.id,
            content.id,
            &[Platform::Facebook, Platform::Twitter],
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let rows = posts::find_posts_by_content(&pool, content.id).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn reschedule_keeps_the_accumulated_retry_count() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let (user, account, content) = seed_user_with_facebook(&pool).await;

        let post = posts::create_post(
            &pool,
            content.id,
            account.id,
            user.id,
            Platform::Facebook,
            Utc::now(),
        )
        .await
        .unwrap();

        posts::claim_for_publishing(&pool, post.id).await.unwrap();
        posts::mark_failed(&pool, post.id, "rate limited", 2)
            .await
            .unwrap();

        let rescheduled = posts::reschedule_failed(&pool, post.id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rescheduled.retry_count, 2);

        posts::claim_for_publishing(&pool, post.id).await.unwrap();
        posts::mark_failed(&pool, post.id, "bad request", 1)
            .await
            .unwrap();

        let post = posts::find_post_by_id(&pool, post.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.retry_count, 3);
        assert!(!post.can_retry(3));
    }
}
