use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::scheduler::Scheduler;
use crate::server::AppState;

const PRUNE_SEEN_CRON: &str = "0 * * * * *";
const HEARTBEAT_CRON: &str = "0 0 * * * *";

/// Register built-in background tasks
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let prune_state = state.clone();
    scheduler
        .add_cron_job("prune-seen-messages", PRUNE_SEEN_CRON, move || {
            let state = prune_state.clone();
            Box::pin(async move {
                prune_seen_messages(&state, Utc::now());
            })
        })
        .await?;

    scheduler
        .add_cron_job("heartbeat", HEARTBEAT_CRON, move || {
            let state = state.clone();
            Box::pin(async move {
                info!(
                    "Heartbeat: bot is alive, tracking {} recent messages",
                    state.filter.seen_count()
                );
            })
        })
        .await?;

    Ok(())
}

/// Drop seen-message ids that have aged out of the admission window.
pub fn prune_seen_messages(state: &AppState, now: DateTime<Utc>) -> usize {
    let removed = state.filter.prune_seen(now);
    if removed > 0 {
        debug!("Pruned {} seen message ids", removed);
    }
    removed
}
