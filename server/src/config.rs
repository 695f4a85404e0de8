/// Configuration management for PostPilot
///
/// This module handles loading and managing configuration from environment
/// variables.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cache (Redis) configuration
    pub cache: CacheConfig,
    /// JWT auth configuration
    pub auth: AuthConfig,
    /// Per-platform OAuth app credentials
    pub oauth: OAuthConfig,
    /// AI provider credentials
    pub providers: ProvidersConfig,
    /// Publish retry/scheduling configuration
    pub publisher: PublisherConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
    /// Public base URL, used to build OAuth redirect URIs.
    pub public_url: String,
    /// Directory for generated media (audio narration files).
    pub media_dir: String,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Cache (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub url: String,
}

/// JWT auth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

/// OAuth app credentials for one platform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthApp {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Per-platform OAuth app credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub facebook: OAuthApp,
    pub instagram: OAuthApp,
    pub linkedin: OAuthApp,
    pub twitter: OAuthApp,
    pub tiktok: OAuthApp,
    pub threads: OAuthApp,
    pub pinterest: OAuthApp,
}

/// AI provider credentials and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub openrouter_model: String,
    pub pexels_api_key: String,
    pub pexels_base_url: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_base_url: String,
    pub elevenlabs_voice_id: String,
}

/// Publish retry and scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Scheduled-post poll interval.
    pub poll_interval_secs: u64,
    /// Token refresher interval.
    pub token_refresh_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("POSTPILOT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("POSTPILOT_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                public_url: std::env::var("POSTPILOT_PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                media_dir: std::env::var("POSTPILOT_MEDIA_DIR")
                    .unwrap_or_else(|_| "./media".to_string()),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if app_env.eq_ignore_ascii_case("production") => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if app_env.eq_ignore_ascii_case("production") && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/postpilot".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            auth: {
                let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
                if app_env.eq_ignore_ascii_case("production") && jwt_secret.len() < 32 {
                    return Err(
                        "JWT_SECRET must be set to at least 32 bytes in production".to_string()
                    );
                }
                AuthConfig {
                    jwt_secret: if jwt_secret.is_empty() {
                        "dev-only-insecure-secret".to_string()
                    } else {
                        jwt_secret
                    },
                    access_ttl_secs: std::env::var("JWT_ACCESS_TTL_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(900),
                    refresh_ttl_secs: std::env::var("JWT_REFRESH_TTL_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(604_800),
                }
            },
            oauth: OAuthConfig {
                facebook: oauth_app("FACEBOOK"),
                instagram: oauth_app("INSTAGRAM"),
                linkedin: oauth_app("LINKEDIN"),
                twitter: oauth_app("TWITTER"),
                tiktok: oauth_app("TIKTOK"),
                threads: oauth_app("THREADS"),
                pinterest: oauth_app("PINTEREST"),
            },
            providers: ProvidersConfig {
                openrouter_api_key: std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                openrouter_base_url: std::env::var("OPENROUTER_BASE_URL")
                    .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
                openrouter_model: std::env::var("OPENROUTER_MODEL")
                    .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
                pexels_api_key: std::env::var("PEXELS_API_KEY").unwrap_or_default(),
                pexels_base_url: std::env::var("PEXELS_BASE_URL")
                    .unwrap_or_else(|_| "https://api.pexels.com".to_string()),
                elevenlabs_api_key: std::env::var("ELEVENLABS_API_KEY").unwrap_or_default(),
                elevenlabs_base_url: std::env::var("ELEVENLABS_BASE_URL")
                    .unwrap_or_else(|_| "https://api.elevenlabs.io".to_string()),
                elevenlabs_voice_id: std::env::var("ELEVENLABS_VOICE_ID")
                    .unwrap_or_else(|_| "21m00Tcm4TlvDq8ikWAM".to_string()),
            },
            publisher: PublisherConfig {
                max_retries: std::env::var("PUBLISH_MAX_RETRIES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3),
                base_delay_ms: std::env::var("PUBLISH_RETRY_BASE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
                max_delay_ms: std::env::var("PUBLISH_RETRY_MAX_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30_000),
                poll_interval_secs: std::env::var("SCHEDULER_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                token_refresh_interval_secs: std::env::var("TOKEN_REFRESH_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3_600),
            },
        })
    }

    /// OAuth redirect URI for a platform callback.
    pub fn redirect_uri(&self, platform: &str) -> String {
        format!(
            "{}/api/v1/oauth/{}/callback",
            self.app.public_url.trim_end_matches('/'),
            platform
        )
    }
}

fn oauth_app(prefix: &str) -> OAuthApp {
    OAuthApp {
        client_id: std::env::var(format!("{prefix}_CLIENT_ID")).unwrap_or_default(),
        client_secret: std::env::var(format!("{prefix}_CLIENT_SECRET")).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_in_development() {
        std::env::remove_var("APP_ENV");
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
        std::env::remove_var("JWT_SECRET");
        let config = Config::from_env().expect("development config should load");
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.publisher.max_retries, 3);
        assert_eq!(config.auth.access_ttl_secs, 900);
    }

    #[test]
    #[serial]
    fn production_requires_strong_jwt_secret() {
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "https://app.example.com");
        std::env::set_var("JWT_SECRET", "short");
        let err = Config::from_env().unwrap_err();
        assert!(err.contains("JWT_SECRET"));
        std::env::remove_var("APP_ENV");
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
        std::env::remove_var("JWT_SECRET");
    }

    #[test]
    #[serial]
    fn redirect_uri_strips_trailing_slash() {
        std::env::remove_var("APP_ENV");
        std::env::set_var("POSTPILOT_PUBLIC_URL", "https://pilot.example.com/");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.redirect_uri("twitter"),
            "https://pilot.example.com/api/v1/oauth/twitter/callback"
        );
        std::env::remove_var("POSTPILOT_PUBLIC_URL");
    }
}
