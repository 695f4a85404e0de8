/// OAuth account linking
///
/// Authorization state lives in Redis with a 10 minute TTL and is consumed
/// exactly once on callback, so state survives restarts and works across
/// replicas. The PKCE verifier (when the platform uses one) rides along in
/// the same record.
use chrono::Utc;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use connectors::Connector;

use crate::config::Config;
use crate::db::social_accounts;
use crate::error::{AppError, Result};
use crate::models::{Platform, SocialAccount};
use crate::services::ConnectorRegistry;

const STATE_TTL_SECS: u64 = 600;

fn state_key(state: &str) -> String {
    format!("postpilot:oauth:state:{}", state)
}

/// What we persist between the authorize redirect and the callback.
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    user_id: Uuid,
    platform: Platform,
    pkce_verifier: Option<String>,
}

pub struct OAuthService {
    pool: PgPool,
    redis: ConnectionManager,
    registry: ConnectorRegistry,
    config: Config,
}

impl OAuthService {
    pub fn new(
        pool: PgPool,
        redis: ConnectionManager,
        registry: ConnectorRegistry,
        config: Config,
    ) -> Self {
        Self {
            pool,
            redis,
            registry,
            config,
        }
    }

    /// Build the provider authorization URL and persist the state record.
    /// Returns the URL together with the state token embedded in it.
    pub async fn start_authorization(
        &self,
        user_id: Uuid,
        platform: Platform,
    ) -> Result<(String, String)> {
        let connector = self.registry.get(platform)?;
        let state = Uuid::new_v4().to_string();
        let redirect_uri = self.config.redirect_uri(platform.as_str());

        let authorize = connector.authorize_url(&state, &redirect_uri);

        let record = StateRecord {
            user_id,
            platform,
            pkce_verifier: authorize.pkce_verifier,
        };

        let mut conn = self.redis.clone();
        redis::cmd("SET")
            .arg(state_key(&state))
            .arg(serde_json::to_string(&record)?)
            .arg("EX")
            .arg(STATE_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok((authorize.url, state))
    }

    /// Handle the provider callback: consume the state, exchange the code,
    /// fetch the profile, and upsert the connection.
    pub async fn complete_callback(
        &self,
        platform: Platform,
        state: &str,
        code: &str,
    ) -> Result<SocialAccount> {
        let record = self.consume_state(state).await?;

        if record.platform != platform {
            return Err(AppError::BadRequest(
                "authorization state does not match platform".to_string(),
            ));
        }

        let connector = self.registry.get(platform)?;
        let redirect_uri = self.config.redirect_uri(platform.as_str());

        let tokens = connector
            .exchange_code(code, &redirect_uri, record.pkce_verifier.as_deref())
            .await?;
        let profile = connector.fetch_profile(&tokens.access_token).await?;

        let account = social_accounts::upsert_account(
            &self.pool,
            record.user_id,
            platform,
            &profile.account_ref,
            &profile.display_name,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            tokens.expires_at,
            &profile.platform_data,
        )
        .await?;

        tracing::info!(
            user_id = %record.user_id,
            platform = platform.as_str(),
            account = %account.account_name,
            "social account connected"
        );

        Ok(account)
    }

    /// Refresh a connected account's access token and persist the result.
    pub async fn refresh_account(&self, account: &SocialAccount) -> Result<SocialAccount> {
        let connector = self.registry.get(account.platform)?;
        let token = refresh_source(connector.as_ref(), account)?;

        let tokens = connector.refresh_token(token).await?;

        social_accounts::update_tokens(
            &self.pool,
            account.id,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            tokens.expires_at,
        )
        .await?;

        social_accounts::find_account_by_id(&self.pool, account.id)
            .await?
            .ok_or_else(|| AppError::NotFound("social account".to_string()))
    }

    /// Each state token authorizes exactly one callback: GETDEL reads and
    /// deletes atomically, so of two racing callbacks only one gets the
    /// record.
    async fn consume_state(&self, state: &str) -> Result<StateRecord> {
        let mut conn = self.redis.clone();

        let raw = take_state(&mut conn, state).await?.ok_or_else(|| {
            AppError::BadRequest("unknown or expired authorization state".to_string())
        })?;

        Ok(serde_json::from_str(&raw)?)
    }

    /// Accounts whose tokens expire within the refresh margin and whose
    /// connector can actually refresh them.
    pub async fn accounts_needing_refresh(&self) -> Result<Vec<SocialAccount>> {
        let before = Utc::now() + refresh_margin();
        let accounts = social_accounts::find_accounts_expiring_before(&self.pool, before).await?;

        Ok(accounts
            .into_iter()
            .filter(|account| match self.registry.get(account.platform) {
                Ok(connector) => {
                    connector.refreshes_with_access_token() || account.refresh_token.is_some()
                }
                Err(_) => false,
            })
            .collect())
    }
}

/// Atomically read and delete a persisted state record.
async fn take_state(conn: &mut ConnectionManager, state: &str) -> Result<Option<String>> {
    let raw: Option<String> = redis::cmd("GETDEL")
        .arg(state_key(state))
        .query_async(conn)
        .await?;
    Ok(raw)
}

/// The token a platform's refresh call wants: exchange-style platforms
/// (Facebook, Instagram, Threads) trade the current access token for a
/// long-lived one and never store a refresh token; the rest need one.
pub(crate) fn refresh_source<'a>(
    connector: &dyn Connector,
    account: &'a SocialAccount,
) -> Result<&'a str> {
    if connector.refreshes_with_access_token() {
        Ok(&account.access_token)
    } else {
        account.refresh_token.as_deref().ok_or_else(|| {
            AppError::BadRequest(format!(
                "{} connection has no refresh token",
                account.platform.as_str()
            ))
        })
    }
}

/// Margin used when deciding whether a token is worth refreshing early.
pub fn refresh_margin() -> chrono::Duration {
    chrono::Duration::hours(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::{FacebookClient, TwitterClient};

    fn account(platform: Platform, refresh_token: Option<&str>) -> SocialAccount {
        SocialAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform,
            account_ref: "1".into(),
            account_name: "acct".into(),
            access_token: "current-at".into(),
            refresh_token: refresh_token.map(str::to_string),
            token_expires_at: None,
            platform_data: serde_json::json!({}),
            connected_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn exchange_style_platforms_refresh_from_the_access_token() {
        let fb = FacebookClient::new("id", "secret");
        let account = account(Platform::Facebook, None);
        // No stored refresh token, still refreshable.
        assert_eq!(refresh_source(&fb, &account).unwrap(), "current-at");
    }

    #[test]
    fn refresh_token_platforms_need_a_stored_refresh_token() {
        let tw = TwitterClient::new("id", "secret");

        let with = account(Platform::Twitter, Some("rt-1"));
        assert_eq!(refresh_source(&tw, &with).unwrap(), "rt-1");

        let without = account(Platform::Twitter, None);
        assert!(matches!(
            refresh_source(&tw, &without),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn state_record_is_consumed_exactly_once() {
        // Needs a live Redis; skipped otherwise.
        let Ok(url) = std::env::var("TEST_REDIS_URL") else {
            return;
        };
        let client = redis::Client::open(url).unwrap();
        let mut conn = ConnectionManager::new(client).await.unwrap();

        let state = Uuid::new_v4().to_string();
        redis::cmd("SET")
            .arg(state_key(&state))
            .arg(r#"{"user_id":"00000000-0000-0000-0000-000000000000","platform":"twitter","pkce_verifier":null}"#)
            .arg("EX")
            .arg(60)
            .query_async::<_, ()>(&mut conn)
            .await
            .unwrap();

        assert!(take_state(&mut conn, &state).await.unwrap().is_some());
        // Second presentation of the same state gets nothing.
        assert!(take_state(&mut conn, &state).await.unwrap().is_none());
    }
}
