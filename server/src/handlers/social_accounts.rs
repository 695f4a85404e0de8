/// Social account handlers: list, disconnect, manual token refresh
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::social_accounts;
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{Platform, SocialAccount};
use crate::services::oauth::OAuthService;

pub async fn list_accounts(pool: web::Data<PgPool>, user_id: UserId) -> Result<HttpResponse> {
    let accounts = social_accounts::find_accounts_by_user(&pool, user_id.0).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

pub async fn disconnect(
    pool: web::Data<PgPool>,
    user_id: UserId,
    account_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let account = owned_account(&pool, user_id.0, *account_id).await?;

    social_accounts::delete_account(&pool, user_id.0, account.platform).await?;

    tracing::info!(
        user_id = %user_id.0,
        platform = account.platform.as_str(),
        "social account disconnected"
    );
    Ok(HttpResponse::NoContent().finish())
}

/// Refresh the stored access token on demand.
pub async fn refresh(
    pool: web::Data<PgPool>,
    oauth: web::Data<Arc<OAuthService>>,
    user_id: UserId,
    account_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let account = owned_account(&pool, user_id.0, *account_id).await?;
    let refreshed = oauth.refresh_account(&account).await?;
    Ok(HttpResponse::Ok().json(refreshed))
}

async fn owned_account(pool: &PgPool, user_id: Uuid, account_id: Uuid) -> Result<SocialAccount> {
    let account = social_accounts::find_account_by_id(pool, account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("social account".to_string()))?;

    if account.user_id != user_id {
        // Do not leak existence of other users' accounts.
        return Err(AppError::NotFound("social account".to_string()));
    }

    Ok(account)
}

pub(crate) fn parse_platform(raw: &str) -> Result<Platform> {
    Platform::from_str(raw)
        .ok_or_else(|| AppError::BadRequest(format!("unknown platform: {raw}")))
}
