/// PostPilot Server Library
///
/// Backend for AI-assisted social media publishing: user accounts, OAuth
/// connections to the supported platforms, AI content generation, and
/// scheduled publishing with retries.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers and route wiring
/// - `models`: Row types, status enums, request/response DTOs
/// - `services`: Business logic (OAuth, publishing, generation)
/// - `db`: Database access layer and repositories
/// - `jobs`: Background loops (scheduled publisher, token refresher)
/// - `middleware`: JWT authentication middleware
/// - `security`: Password hashing and JWT primitives
/// - `error`: Error types and handling
/// - `config`: Configuration management
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod security;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
