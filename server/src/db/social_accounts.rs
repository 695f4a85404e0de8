use crate::models::{Platform, SocialAccount};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert or update a connection. Reconnecting a platform replaces the
/// stored tokens and profile metadata for that (user, platform) pair.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_account(
    pool: &PgPool,
    user_id: Uuid,
    platform: Platform,
    account_ref: &str,
    account_name: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    token_expires_at: Option<DateTime<Utc>>,
    platform_data: &serde_json::Value,
) -> Result<SocialAccount, sqlx::Error> {
    let account = sqlx::query_as::<_, SocialAccount>(
        r#"
        INSERT INTO social_accounts
            (user_id, platform, account_ref, account_name, access_token,
             refresh_token, token_expires_at, platform_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, platform) DO UPDATE SET
            account_ref = EXCLUDED.account_ref,
            account_name = EXCLUDED.account_name,
            access_token = EXCLUDED.access_token,
            refresh_token = EXCLUDED.refresh_token,
            token_expires_at = EXCLUDED.token_expires_at,
            platform_data = EXCLUDED.platform_data,
            updated_at = NOW()
        RETURNING id, user_id, platform, account_ref, account_name, access_token,
                  refresh_token, token_expires_at, platform_data, connected_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(platform)
    .bind(account_ref)
    .bind(account_name)
    .bind(access_token)
    .bind(refresh_token)
    .bind(token_expires_at)
    .bind(platform_data)
    .fetch_one(pool)
    .await?;

    Ok(account)
}

pub async fn find_accounts_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<SocialAccount>, sqlx::Error> {
    let accounts = sqlx::query_as::<_, SocialAccount>(
        r#"
        SELECT id, user_id, platform, account_ref, account_name, access_token,
               refresh_token, token_expires_at, platform_data, connected_at, updated_at
        FROM social_accounts
        WHERE user_id = $1
        ORDER BY connected_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

pub async fn find_account(
    pool: &PgPool,
    user_id: Uuid,
    platform: Platform,
) -> Result<Option<SocialAccount>, sqlx::Error> {
    let account = sqlx::query_as::<_, SocialAccount>(
        r#"
        SELECT id, user_id, platform, account_ref, account_name, access_token,
               refresh_token, token_expires_at, platform_data, connected_at, updated_at
        FROM social_accounts
        WHERE user_id = $1 AND platform = $2
        "#,
    )
    .bind(user_id)
    .bind(platform)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

pub async fn find_account_by_id(
    pool: &PgPool,
    account_id: Uuid,
) -> Result<Option<SocialAccount>, sqlx::Error> {
    let account = sqlx::query_as::<_, SocialAccount>(
        r#"
        SELECT id, user_id, platform, account_ref, account_name, access_token,
               refresh_token, token_expires_at, platform_data, connected_at, updated_at
        FROM social_accounts
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

/// Update stored tokens after a refresh.
pub async fn update_tokens(
    pool: &PgPool,
    account_id: Uuid,
    access_token: &str,
    refresh_token: Option<&str>,
    token_expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE social_accounts
        SET access_token = $2,
            refresh_token = COALESCE($3, refresh_token),
            token_expires_at = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .bind(access_token)
    .bind(refresh_token)
    .bind(token_expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_account(
    pool: &PgPool,
    user_id: Uuid,
    platform: Platform,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM social_accounts WHERE user_id = $1 AND platform = $2")
        .bind(user_id)
        .bind(platform)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Accounts whose tokens expire before the given instant, for the
/// background refresher. Whether an account is refreshable depends on the
/// platform (stored refresh token vs long-lived exchange), so that filter
/// happens at the service layer.
pub async fn find_accounts_expiring_before(
    pool: &PgPool,
    before: DateTime<Utc>,
) -> Result<Vec<SocialAccount>, sqlx::Error> {
    let accounts = sqlx::query_as::<_, SocialAccount>(
        r#"
        SELECT id, user_id, platform, account_ref, account_name, access_token,
               refresh_token, token_expires_at, platform_data, connected_at, updated_at
        FROM social_accounts
        WHERE token_expires_at IS NOT NULL
          AND token_expires_at < $1
        ORDER BY token_expires_at
        "#,
    )
    .bind(before)
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}
