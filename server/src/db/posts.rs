use crate::models::{Platform, Post, PostStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Create a publish attempt row. The unique (content_id, platform) index
/// rejects a second row for the same pair, which is what makes
/// double-submits safe under concurrency. Takes any executor so multi-row
/// inserts can share one transaction.
pub async fn create_post(
    executor: impl sqlx::PgExecutor<'_>,
    content_id: Uuid,
    social_account_id: Uuid,
    user_id: Uuid,
    platform: Platform,
    scheduled_at: DateTime<Utc>,
) -> Result<Post, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (content_id, social_account_id, user_id, platform, scheduled_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, content_id, social_account_id, user_id, platform, status,
                  scheduled_at, published_at, platform_post_id, error_message, retry_count,
                  like_count, comment_count, share_count, created_at, updated_at
        "#,
    )
    .bind(content_id)
    .bind(social_account_id)
    .bind(user_id)
    .bind(platform)
    .bind(scheduled_at)
    .fetch_one(executor)
    .await?;

    Ok(post)
}

pub async fn find_post_by_id(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, content_id, social_account_id, user_id, platform, status,
               scheduled_at, published_at, platform_post_id, error_message, retry_count,
               like_count, comment_count, share_count, created_at, updated_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

pub async fn find_posts_by_user(
    pool: &PgPool,
    user_id: Uuid,
    status: Option<PostStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, content_id, social_account_id, user_id, platform, status,
               scheduled_at, published_at, platform_post_id, error_message, retry_count,
               like_count, comment_count, share_count, created_at, updated_at
        FROM posts
        WHERE user_id = $1 AND ($2::post_status IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(posts)
}

pub async fn find_posts_by_content(
    pool: &PgPool,
    content_id: Uuid,
) -> Result<Vec<Post>, sqlx::Error> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, content_id, social_account_id, user_id, platform, status,
               scheduled_at, published_at, platform_post_id, error_message, retry_count,
               like_count, comment_count, share_count, created_at, updated_at
        FROM posts
        WHERE content_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(content_id)
    .fetch_all(pool)
    .await?;

    Ok(posts)
}

/// Atomically claim a post for publishing: scheduled -> posting. Returns
/// `None` when another worker claimed it first, so each due post is
/// published exactly once even with concurrent pollers.
pub async fn claim_for_publishing(
    pool: &PgPool,
    post_id: Uuid,
) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET status = 'posting', updated_at = NOW()
        WHERE id = $1 AND status = 'scheduled'
        RETURNING id, content_id, social_account_id, user_id, platform, status,
                  scheduled_at, published_at, platform_post_id, error_message, retry_count,
                  like_count, comment_count, share_count, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// Ids of scheduled posts whose time has come.
pub async fn find_due_post_ids(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid,)>(
        r#"
        SELECT id
        FROM posts
        WHERE status = 'scheduled' AND scheduled_at <= $1
        ORDER BY scheduled_at
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Record a successful publish, adding this run's failed attempts to the
/// accumulated retry count.
pub async fn mark_published(
    pool: &PgPool,
    post_id: Uuid,
    platform_post_id: &str,
    attempts: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET status = 'published',
            platform_post_id = $2,
            published_at = NOW(),
            error_message = NULL,
            retry_count = retry_count + $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .bind(platform_post_id)
    .bind(attempts)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a failed publish. `attempts` from this run accumulate into
/// `retry_count`, which caps manual retries across reschedules.
pub async fn mark_failed(
    pool: &PgPool,
    post_id: Uuid,
    error_message: &str,
    attempts: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET status = 'failed',
            error_message = $2,
            retry_count = retry_count + $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .bind(error_message)
    .bind(attempts)
    .execute(pool)
    .await?;

    Ok(())
}

/// Put a failed post back in the scheduled queue for a manual retry.
/// `retry_count` is left untouched: the retry budget spans reschedules.
pub async fn reschedule_failed(
    pool: &PgPool,
    post_id: Uuid,
    scheduled_at: DateTime<Utc>,
) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET status = 'scheduled',
            scheduled_at = $2,
            error_message = NULL,
            updated_at = NOW()
        WHERE id = $1 AND status = 'failed'
        RETURNING id, content_id, social_account_id, user_id, platform, status,
                  scheduled_at, published_at, platform_post_id, error_message, retry_count,
                  like_count, comment_count, share_count, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(scheduled_at)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// Cancel a post that has not started publishing yet.
pub async fn cancel_scheduled(pool: &PgPool, post_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND status = 'scheduled'")
        .bind(post_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Per-status counts for one content's posts, for the status rollup.
pub async fn count_by_status_for_content(
    pool: &PgPool,
    content_id: Uuid,
) -> Result<Vec<(PostStatus, i64)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (PostStatus, i64)>(
        r#"
        SELECT status, COUNT(*)
        FROM posts
        WHERE content_id = $1
        GROUP BY status
        "#,
    )
    .bind(content_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
