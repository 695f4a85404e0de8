/// HTTP handlers
///
/// Route wiring lives here; auth-exempt routes (register, login, refresh,
/// OAuth callbacks) sit outside the JWT-guarded scope because the provider
/// redirect arrives without a bearer token.
pub mod auth;
pub mod contents;
pub mod oauth;
pub mod posts;
pub mod social_accounts;

use actix_web::web;

use crate::middleware::JwtAuthMiddleware;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/refresh", web::post().to(auth::refresh))
                    .route("/me", web::get().to(auth::me).wrap(JwtAuthMiddleware)),
            )
            // Provider redirects carry no bearer token; the state record
            // identifies the user.
            .route(
                "/oauth/{platform}/callback",
                web::get().to(oauth::callback),
            )
            .service(
                web::scope("")
                    .wrap(JwtAuthMiddleware)
                    .route(
                        "/oauth/{platform}/authorize",
                        web::get().to(oauth::authorize),
                    )
                    .route(
                        "/social-accounts",
                        web::get().to(social_accounts::list_accounts),
                    )
                    .route(
                        "/social-accounts/{id}",
                        web::delete().to(social_accounts::disconnect),
                    )
                    .route(
                        "/social-accounts/{id}/refresh",
                        web::post().to(social_accounts::refresh),
                    )
                    .route("/contents", web::get().to(contents::list_contents))
                    .route("/contents", web::post().to(contents::create_content))
                    .route("/contents/{id}", web::get().to(contents::get_content))
                    .route("/contents/{id}", web::patch().to(contents::update_content))
                    .route("/contents/{id}", web::delete().to(contents::delete_content))
                    .route(
                        "/contents/{id}/generate",
                        web::post().to(contents::generate_content),
                    )
                    .route(
                        "/contents/{id}/submit",
                        web::post().to(contents::submit_content),
                    )
                    .route(
                        "/contents/{id}/approve",
                        web::post().to(contents::approve_content),
                    )
                    .route(
                        "/contents/{id}/reject",
                        web::post().to(contents::reject_content),
                    )
                    .route("/posts", web::get().to(posts::list_posts))
                    .route("/posts", web::post().to(posts::create_posts))
                    .route("/posts/{id}", web::get().to(posts::get_post))
                    .route("/posts/{id}/retry", web::post().to(posts::retry_post))
                    .route("/posts/{id}", web::delete().to(posts::cancel_post)),
            ),
    );
}
