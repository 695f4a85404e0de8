use crate::models::User;
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new user. Fails with a unique violation if the email or
/// username is taken.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    username: &str,
    password_hash: &str,
    business_name: Option<&str>,
    industry: Option<&str>,
    brand_voice: Option<&str>,
) -> Result<User, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, username, password_hash, business_name, industry, brand_voice)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, email, username, password_hash, business_name, industry, brand_voice,
                  created_at, updated_at
        "#,
    )
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(business_name)
    .bind(industry)
    .bind(brand_voice)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, username, password_hash, business_name, industry, brand_voice,
               created_at, updated_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, username, password_hash, business_name, industry, brand_voice,
               created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}
