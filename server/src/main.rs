use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::RedisError;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postpilot_server::config::Config;
use postpilot_server::services::generation::GenerationService;
use postpilot_server::services::oauth::OAuthService;
use postpilot_server::services::providers::{ElevenLabsClient, OpenRouterClient, PexelsClient};
use postpilot_server::services::publisher::{PublisherService, RetryPolicy};
use postpilot_server::services::ConnectorRegistry;
use postpilot_server::{handlers, jobs, security};

struct HealthState {
    db_pool: sqlx::Pool<sqlx::Postgres>,
    redis_manager: ConnectionManager,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

impl HealthState {
    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.db_pool)
            .await
            .map(|_| ())
    }

    async fn check_redis(&self) -> Result<(), RedisError> {
        let mut conn = self.redis_manager.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(RedisError::from((
                redis::ErrorKind::ResponseError,
                "unexpected PING response",
            )))
        }
    }
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    match state.check_postgres().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "postpilot-server",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "postpilot-server"
        })),
    }
}

async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();
    let mut ready = true;

    let start = Instant::now();
    let pg_result = state.check_postgres().await;
    let pg_latency = Some(start.elapsed().as_millis() as u64);
    checks.insert(
        "postgresql".to_string(),
        match pg_result {
            Ok(_) => ComponentCheck {
                status: ComponentStatus::Healthy,
                message: "PostgreSQL connection successful".to_string(),
                latency_ms: pg_latency,
            },
            Err(e) => {
                ready = false;
                ComponentCheck {
                    status: ComponentStatus::Unhealthy,
                    message: format!("PostgreSQL connection failed: {}", e),
                    latency_ms: pg_latency,
                }
            }
        },
    );

    let start = Instant::now();
    let redis_result = state.check_redis().await;
    let redis_latency = Some(start.elapsed().as_millis() as u64);
    checks.insert(
        "redis".to_string(),
        match redis_result {
            Ok(_) => ComponentCheck {
                status: ComponentStatus::Healthy,
                message: "Redis ping successful".to_string(),
                latency_ms: redis_latency,
            },
            Err(e) => {
                ready = false;
                ComponentCheck {
                    status: ComponentStatus::Unhealthy,
                    message: format!("Redis ping failed: {}", e),
                    latency_ms: redis_latency,
                }
            }
        },
    );

    let response = ReadinessResponse {
        ready,
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

struct MediaDir(String);

/// Serve generated audio files. File names are UUID-based, so anything
/// with a path separator is rejected outright.
async fn serve_media(dir: web::Data<MediaDir>, file: web::Path<String>) -> HttpResponse {
    let name = file.into_inner();
    if name.contains('/') || name.contains("..") {
        return HttpResponse::NotFound().finish();
    }

    let path = std::path::Path::new(&dir.0).join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => HttpResponse::Ok().content_type("audio/mpeg").body(bytes),
        Err(_) => HttpResponse::NotFound().finish(),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting postpilot-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    // Database pool + migrations
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("database connect: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("migrations: {e}")))?;

    tracing::info!("Connected to database, migrations applied");

    // Redis (OAuth state store)
    let redis_client = redis::Client::open(config.cache.url.clone())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("redis client: {e}")))?;
    let redis_manager = ConnectionManager::new(redis_client)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("redis connect: {e}")))?;

    tracing::info!("Connected to Redis");

    // Services
    let jwt_manager = security::JwtManager::new(&config.auth);
    let registry = ConnectorRegistry::from_config(&config);
    tracing::info!(
        platforms = ?registry
            .configured_platforms()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>(),
        "Platform connectors configured"
    );

    let oauth_service = Arc::new(OAuthService::new(
        db_pool.clone(),
        redis_manager.clone(),
        registry.clone(),
        config.clone(),
    ));

    let publisher_service = Arc::new(PublisherService::new(
        db_pool.clone(),
        registry.clone(),
        RetryPolicy::from_config(&config.publisher),
    ));

    let generation_service = Arc::new(GenerationService::new(
        db_pool.clone(),
        OpenRouterClient::new(
            &config.providers.openrouter_api_key,
            &config.providers.openrouter_model,
        )
        .with_base_url(&config.providers.openrouter_base_url),
        PexelsClient::new(&config.providers.pexels_api_key)
            .with_base_url(&config.providers.pexels_base_url),
        ElevenLabsClient::new(
            &config.providers.elevenlabs_api_key,
            &config.providers.elevenlabs_voice_id,
        )
        .with_base_url(&config.providers.elevenlabs_base_url),
        config.app.media_dir.clone(),
    ));

    let health_state = web::Data::new(HealthState {
        db_pool: db_pool.clone(),
        redis_manager: redis_manager.clone(),
    });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let db_pool_http = db_pool.clone();
    let oauth_http = oauth_service.clone();
    let publisher_http = publisher_service.clone();
    let generation_http = generation_service.clone();
    let media_dir = config.app.media_dir.clone();
    let cors_origins = config.cors.allowed_origins.clone();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in cors_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(web::Data::new(db_pool_http.clone()))
            .app_data(web::Data::new(jwt_manager.clone()))
            .app_data(web::Data::new(oauth_http.clone()))
            .app_data(web::Data::new(publisher_http.clone()))
            .app_data(web::Data::new(generation_http.clone()))
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/ready", web::get().to(readiness_summary))
            .route("/api/v1/health/live", web::get().to(liveness_check))
            .app_data(web::Data::new(MediaDir(media_dir.clone())))
            .route("/media/{file}", web::get().to(serve_media))
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run();

    let server_handle = server.handle();

    let (shutdown_tx, _) = broadcast::channel(1);

    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();

    tasks.spawn(async move {
        tracing::info!("HTTP server is running");
        server.await
    });

    // Scheduled-post poller
    let publisher_job = publisher_service.clone();
    let db_job = db_pool.clone();
    let poll_interval = Duration::from_secs(config.publisher.poll_interval_secs);
    let poller_shutdown = shutdown_tx.subscribe();
    tasks.spawn(async move {
        jobs::scheduled_publisher::start_scheduled_publisher(
            db_job,
            publisher_job,
            poll_interval,
            poller_shutdown,
        )
        .await;
        Ok(())
    });

    // Token refresher
    let oauth_job = oauth_service.clone();
    let refresh_interval = Duration::from_secs(config.publisher.token_refresh_interval_secs);
    let refresher_shutdown = shutdown_tx.subscribe();
    tasks.spawn(async move {
        jobs::token_refresher::start_token_refresher(oauth_job, refresh_interval, refresher_shutdown)
            .await;
        Ok(())
    });

    let mut first_error: Option<io::Error> = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(_))) => {
                        tracing::info!("Background task completed");
                    }
                    Some(Ok(Err(e))) => {
                        tracing::error!("Task returned error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                        let _ = shutdown_tx.send(());
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Task join error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(io::Error::new(io::ErrorKind::Other, e.to_string()));
                        }
                        let _ = shutdown_tx.send(());
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                let _ = shutdown_tx.send(());
                server_handle.stop(true).await;
                tasks.shutdown().await;
                break;
            }
        }
    }

    tracing::info!("postpilot-server shutting down");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
