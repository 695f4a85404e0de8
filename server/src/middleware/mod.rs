/// HTTP middleware utilities
///
/// JWT bearer authentication as an actix `Transform`, plus the `UserId`
/// extractor handlers use to read the authenticated user.
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{error::ErrorUnauthorized, web, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::security::{JwtManager, TOKEN_TYPE_ACCESS};

/// Extracted user identifier stored in request extensions after auth.
#[derive(Debug, Clone)]
pub struct UserId(pub Uuid);

/// Actix middleware that validates a Bearer access token.
pub struct JwtAuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| ErrorUnauthorized("Missing Authorization header"))?;

            let token = auth_header
                .strip_prefix("Bearer ")
                .ok_or_else(|| ErrorUnauthorized("Invalid Authorization scheme"))?;

            let jwt = req
                .app_data::<web::Data<JwtManager>>()
                .ok_or_else(|| ErrorUnauthorized("Auth not configured"))?;

            let claims = jwt
                .validate(token, TOKEN_TYPE_ACCESS)
                .map_err(|_| ErrorUnauthorized("Invalid or expired token"))?;

            let user_id = claims
                .user_id()
                .map_err(|_| ErrorUnauthorized("Invalid user ID"))?;

            req.extensions_mut().insert(UserId(user_id));

            service.call(req).await
        })
    }
}

impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<UserId>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("User ID missing")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use actix_web::{http::StatusCode, test, App, HttpResponse};

    async fn whoami(user_id: UserId) -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({ "user_id": user_id.0 }))
    }

    fn jwt() -> JwtManager {
        JwtManager::new(&AuthConfig {
            jwt_secret: "middleware-test-secret-0123456789ab".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
        })
    }

    #[actix_web::test]
    async fn valid_bearer_token_passes_and_sets_user_id() {
        let jwt = jwt();
        let user_id = Uuid::new_v4();
        let pair = jwt.generate_token_pair(user_id, "a@b.com").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jwt))
                .route("/whoami", web::get().to(whoami).wrap(JwtAuthMiddleware)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", pair.access_token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["user_id"], user_id.to_string());
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jwt()))
                .route("/whoami", web::get().to(whoami).wrap(JwtAuthMiddleware)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn refresh_token_is_rejected_as_bearer() {
        let jwt = jwt();
        let pair = jwt
            .generate_token_pair(Uuid::new_v4(), "a@b.com")
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(jwt))
                .route("/whoami", web::get().to(whoami).wrap(JwtAuthMiddleware)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", pair.refresh_token)))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
