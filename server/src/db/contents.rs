use crate::models::{Content, ContentStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_content(
    pool: &PgPool,
    user_id: Uuid,
    topic: &str,
    captions: &serde_json::Value,
    image_url: Option<&str>,
    audio_url: Option<&str>,
    link_url: Option<&str>,
) -> Result<Content, sqlx::Error> {
    let content = sqlx::query_as::<_, Content>(
        r#"
        INSERT INTO contents (user_id, topic, captions, image_url, audio_url, link_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, topic, captions, image_url, audio_url, link_url, status,
                  rejection_reason, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(topic)
    .bind(captions)
    .bind(image_url)
    .bind(audio_url)
    .bind(link_url)
    .fetch_one(pool)
    .await?;

    Ok(content)
}

pub async fn find_content_by_id(
    pool: &PgPool,
    content_id: Uuid,
) -> Result<Option<Content>, sqlx::Error> {
    let content = sqlx::query_as::<_, Content>(
        r#"
        SELECT id, user_id, topic, captions, image_url, audio_url, link_url, status,
               rejection_reason, created_at, updated_at
        FROM contents
        WHERE id = $1
        "#,
    )
    .bind(content_id)
    .fetch_optional(pool)
    .await?;

    Ok(content)
}

pub async fn find_contents_by_user(
    pool: &PgPool,
    user_id: Uuid,
    status: Option<ContentStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Content>, sqlx::Error> {
    let contents = sqlx::query_as::<_, Content>(
        r#"
        SELECT id, user_id, topic, captions, image_url, audio_url, link_url, status,
               rejection_reason, created_at, updated_at
        FROM contents
        WHERE user_id = $1 AND ($2::content_status IS NULL OR status = $2)
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

    Ok(contents)
}

/// Update editable fields, passing `None` to leave a field unchanged.
pub async fn update_content(
    pool: &PgPool,
    content_id: Uuid,
    topic: Option<&str>,
    captions: Option<&serde_json::Value>,
    image_url: Option<&str>,
    link_url: Option<&str>,
) -> Result<Content, sqlx::Error> {
    let content = sqlx::query_as::<_, Content>(
        r#"
        UPDATE contents
        SET topic = COALESCE($2, topic),
            captions = COALESCE($3, captions),
            image_url = COALESCE($4, image_url),
            link_url = COALESCE($5, link_url),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, user_id, topic, captions, image_url, audio_url, link_url, status,
                  rejection_reason, created_at, updated_at
        "#,
    )
    .bind(content_id)
    .bind(topic)
    .bind(captions)
    .bind(image_url)
    .bind(link_url)
    .fetch_one(pool)
    .await?;

    Ok(content)
}

pub async fn set_audio_url(
    pool: &PgPool,
    content_id: Uuid,
    audio_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE contents SET audio_url = $2, updated_at = NOW() WHERE id = $1")
        .bind(content_id)
        .bind(audio_url)
        .execute(pool)
        .await?;

    Ok(())
}

/// Transition content status only when coming from the expected status.
/// Returns the updated row, or `None` when the row was not in
/// `from_status` (lost race or illegal transition).
pub async fn transition_status(
    pool: &PgPool,
    content_id: Uuid,
    from_status: ContentStatus,
    to_status: ContentStatus,
    rejection_reason: Option<&str>,
) -> Result<Option<Content>, sqlx::Error> {
    let content = sqlx::query_as::<_, Content>(
        r#"
        UPDATE contents
        SET status = $3,
            rejection_reason = $4,
            updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING id, user_id, topic, captions, image_url, audio_url, link_url, status,
                  rejection_reason, created_at, updated_at
        "#,
    )
    .bind(content_id)
    .bind(from_status)
    .bind(to_status)
    .bind(rejection_reason)
    .fetch_optional(pool)
    .await?;

    Ok(content)
}

/// Force a status without a precondition. Used by the publisher rollup
/// after posts settle.
pub async fn set_status(
    pool: &PgPool,
    content_id: Uuid,
    status: ContentStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE contents SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(content_id)
        .bind(status)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn delete_content(pool: &PgPool, content_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contents WHERE id = $1")
        .bind(content_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
