/// Database access layer
///
/// Plain repository functions over `sqlx::PgPool`. Each function owns one
/// query; transaction orchestration lives in the service layer.
pub mod contents;
pub mod posts;
pub mod social_accounts;
pub mod users;
