//! Token refresher.
//!
//! Periodically refreshes access tokens that expire within the refresh
//! margin so publishing never runs into a dead token mid-flight.
//! Refresh-token platforms use the stored refresh token; the long-lived
//! exchange platforms (Facebook, Instagram, Threads) trade their current
//! access token. Accounts with neither are skipped and need a full
//! re-authorization when the token lapses.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::services::oauth::OAuthService;

pub async fn start_token_refresher(
    oauth: Arc<OAuthService>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Starting token refresher job"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.recv() => {
                tracing::info!("Token refresher job stopping");
                return;
            }
        }

        let accounts = match oauth.accounts_needing_refresh().await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::error!(error = %e, "Token refresh scan failed");
                continue;
            }
        };

        if accounts.is_empty() {
            continue;
        }

        tracing::info!(count = accounts.len(), "Refreshing expiring tokens");

        for account in accounts {
            match oauth.refresh_account(&account).await {
                Ok(_) => {
                    tracing::info!(
                        account_id = %account.id,
                        platform = account.platform.as_str(),
                        "token refreshed"
                    );
                }
                Err(e) => {
                    // Leave the stored token in place; the user may need
                    // to reconnect the account.
                    tracing::warn!(
                        account_id = %account.id,
                        platform = account.platform.as_str(),
                        error = %e,
                        "token refresh failed"
                    );
                }
            }
        }
    }
}
