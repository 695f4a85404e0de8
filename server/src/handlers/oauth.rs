/// OAuth handlers: authorization kickoff and provider callback
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::handlers::social_accounts::parse_platform;
use crate::middleware::UserId;
use crate::services::oauth::OAuthService;

/// Start the authorization flow. Returns the provider URL for the client
/// to redirect the user to.
pub async fn authorize(
    oauth: web::Data<Arc<OAuthService>>,
    user_id: UserId,
    platform: web::Path<String>,
) -> Result<HttpResponse> {
    let platform = parse_platform(&platform)?;
    let (url, state) = oauth.start_authorization(user_id.0, platform).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "authorization_url": url,
        "state": state,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Provider redirect target. Unauthenticated: the state record holds the
/// user this flow belongs to.
pub async fn callback(
    oauth: web::Data<Arc<OAuthService>>,
    platform: web::Path<String>,
    query: web::Query<CallbackQuery>,
) -> Result<HttpResponse> {
    let platform = parse_platform(&platform)?;

    if let Some(error) = &query.error {
        let description = query.error_description.as_deref().unwrap_or("");
        return Err(AppError::BadRequest(format!(
            "authorization denied: {error} {description}"
        )));
    }

    let state = query
        .state
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("missing state parameter".to_string()))?;
    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("missing code parameter".to_string()))?;

    let account = oauth.complete_callback(platform, state, code).await?;
    Ok(HttpResponse::Ok().json(account))
}
