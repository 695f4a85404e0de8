//! Scheduled-post poller.
//!
//! Polls for due scheduled posts and hands them to the publisher. The
//! publisher's atomic claim makes this safe to run on multiple replicas:
//! a post claimed elsewhere comes back as `None` and is skipped.

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::db::posts;
use crate::services::publisher::PublisherService;

/// Due posts fetched per polling cycle.
const BATCH_SIZE: i64 = 50;

pub async fn start_scheduled_publisher(
    db: PgPool,
    publisher: Arc<PublisherService>,
    poll_interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(
        poll_interval_secs = poll_interval.as_secs(),
        "Starting scheduled publisher job"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.recv() => {
                tracing::info!("Scheduled publisher job stopping");
                return;
            }
        }

        match run_cycle(&db, &publisher).await {
            Ok(0) => {}
            Ok(published) => {
                tracing::info!(count = published, "Publish cycle completed");
            }
            Err(e) => {
                tracing::error!(error = %e, "Publish cycle failed");
            }
        }
    }
}

async fn run_cycle(
    db: &PgPool,
    publisher: &Arc<PublisherService>,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let due = posts::find_due_post_ids(db, Utc::now(), BATCH_SIZE).await?;
    if due.is_empty() {
        return Ok(0);
    }

    let mut handled = 0usize;
    for post_id in due {
        match publisher.publish_post(post_id).await {
            Ok(Some(_)) => handled += 1,
            // Claimed by another replica.
            Ok(None) => {}
            Err(e) => {
                tracing::error!(post_id = %post_id, error = %e, "Scheduled publish failed");
            }
        }
    }

    Ok(handled)
}
