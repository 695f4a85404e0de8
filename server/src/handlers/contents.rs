/// Content handlers: CRUD, approval workflow, AI generation
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::db::{contents, users};
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{
    Content, ContentStatus, CreateContentRequest, GenerateContentRequest, RejectContentRequest,
    UpdateContentRequest,
};
use crate::services::generation::GenerationService;

#[derive(Debug, Deserialize)]
pub struct ListContentsQuery {
    pub status: Option<ContentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_contents(
    pool: web::Data<PgPool>,
    user_id: UserId,
    query: web::Query<ListContentsQuery>,
) -> Result<HttpResponse> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let items =
        contents::find_contents_by_user(&pool, user_id.0, query.status, limit, offset).await?;
    Ok(HttpResponse::Ok().json(items))
}

pub async fn create_content(
    pool: web::Data<PgPool>,
    user_id: UserId,
    req: web::Json<CreateContentRequest>,
) -> Result<HttpResponse> {
    req.validate()?;

    let captions = req.captions.clone().unwrap_or_else(|| serde_json::json!({}));

    let content = contents::create_content(
        &pool,
        user_id.0,
        &req.topic,
        &captions,
        req.image_url.as_deref(),
        None,
        req.link_url.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Created().json(content))
}

pub async fn get_content(
    pool: web::Data<PgPool>,
    user_id: UserId,
    content_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let content = owned_content(&pool, user_id.0, *content_id).await?;
    Ok(HttpResponse::Ok().json(content))
}

pub async fn update_content(
    pool: web::Data<PgPool>,
    user_id: UserId,
    content_id: web::Path<Uuid>,
    req: web::Json<UpdateContentRequest>,
) -> Result<HttpResponse> {
    let content = owned_content(&pool, user_id.0, *content_id).await?;

    if content.status.is_terminal() {
        return Err(AppError::Conflict(
            "published or failed content cannot be edited".to_string(),
        ));
    }

    let updated = contents::update_content(
        &pool,
        content.id,
        req.topic.as_deref(),
        req.captions.as_ref(),
        req.image_url.as_deref(),
        req.link_url.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_content(
    pool: web::Data<PgPool>,
    user_id: UserId,
    content_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let content = owned_content(&pool, user_id.0, *content_id).await?;
    contents::delete_content(&pool, content.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// draft -> pending. Rejected content can be resubmitted after edits.
pub async fn submit_content(
    pool: web::Data<PgPool>,
    user_id: UserId,
    content_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let content = owned_content(&pool, user_id.0, *content_id).await?;
    let updated = transition(&pool, &content, ContentStatus::Pending, None).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// pending -> approved.
pub async fn approve_content(
    pool: web::Data<PgPool>,
    user_id: UserId,
    content_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let content = owned_content(&pool, user_id.0, *content_id).await?;
    let updated = transition(&pool, &content, ContentStatus::Approved, None).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// pending -> rejected, with an optional reason.
pub async fn reject_content(
    pool: web::Data<PgPool>,
    user_id: UserId,
    content_id: web::Path<Uuid>,
    req: web::Json<RejectContentRequest>,
) -> Result<HttpResponse> {
    let content = owned_content(&pool, user_id.0, *content_id).await?;
    let updated = transition(
        &pool,
        &content,
        ContentStatus::Rejected,
        req.reason.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Fill a draft with AI captions (and optional image/audio), moving it
/// to pending approval.
pub async fn generate_content(
    pool: web::Data<PgPool>,
    generation: web::Data<Arc<GenerationService>>,
    user_id: UserId,
    content_id: web::Path<Uuid>,
    req: web::Json<GenerateContentRequest>,
) -> Result<HttpResponse> {
    let content = owned_content(&pool, user_id.0, *content_id).await?;

    let user = users::find_user_by_id(&pool, user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;

    let updated = generation.generate_for_content(&user, &content, &req).await?;
    Ok(HttpResponse::Ok().json(updated))
}

async fn owned_content(pool: &PgPool, user_id: Uuid, content_id: Uuid) -> Result<Content> {
    let content = contents::find_content_by_id(pool, content_id)
        .await?
        .ok_or_else(|| AppError::NotFound("content".to_string()))?;

    if content.user_id != user_id {
        // Do not leak existence of other users' content.
        return Err(AppError::NotFound("content".to_string()));
    }

    Ok(content)
}

/// Run a guarded status transition; the conditional UPDATE means a
/// concurrent transition loses cleanly instead of double-applying.
async fn transition(
    pool: &PgPool,
    content: &Content,
    to_status: ContentStatus,
    rejection_reason: Option<&str>,
) -> Result<Content> {
    // Resubmission path: a rejected content goes back to pending.
    let from_status = content.status;

    if !from_status.can_transition_to(to_status) {
        return Err(AppError::Conflict(format!(
            "cannot move content from {:?} to {:?}",
            from_status, to_status
        )));
    }

    contents::transition_status(pool, content.id, from_status, to_status, rejection_reason)
        .await?
        .ok_or_else(|| AppError::Conflict("content status changed concurrently".to_string()))
}
