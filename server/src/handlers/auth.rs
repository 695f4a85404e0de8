/// Authentication handlers: register, login, token refresh, current user
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::db::users;
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::security::{self, JwtManager, TOKEN_TYPE_REFRESH};

/// Register a new user and return a token pair.
pub async fn register(
    pool: web::Data<PgPool>,
    jwt: web::Data<JwtManager>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let password_hash = security::hash_password(&req.password)?;

    let user = users::create_user(
        &pool,
        &req.email,
        &req.username,
        &password_hash,
        req.business_name.as_deref(),
        req.industry.as_deref(),
        req.brand_voice.as_deref(),
    )
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("email or username already taken".to_string()),
        other => other,
    })?;

    tracing::info!(user_id = %user.id, "user registered");

    let tokens = jwt.generate_token_pair(user.id, &user.email)?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "user": user,
        "tokens": tokens,
    })))
}

/// Log in with email and password.
pub async fn login(
    pool: web::Data<PgPool>,
    jwt: web::Data<JwtManager>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    // Same error for unknown email and wrong password.
    let invalid = || AppError::Unauthorized("invalid email or password".to_string());

    let user = users::find_user_by_email(&pool, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !security::verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    let tokens = jwt.generate_token_pair(user.id, &user.email)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "user": user,
        "tokens": tokens,
    })))
}

/// Exchange a refresh token for a new token pair.
pub async fn refresh(
    pool: web::Data<PgPool>,
    jwt: web::Data<JwtManager>,
    req: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    let claims = jwt.validate(&req.refresh_token, TOKEN_TYPE_REFRESH)?;
    let user_id = claims.user_id()?;

    // The account must still exist.
    let user = users::find_user_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;

    let tokens = jwt.generate_token_pair(user.id, &user.email)?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// Current authenticated user.
pub async fn me(pool: web::Data<PgPool>, user_id: UserId) -> Result<HttpResponse> {
    let user = users::find_user_by_id(&pool, user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;

    Ok(HttpResponse::Ok().json(user))
}
