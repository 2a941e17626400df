use crate::errors::AppError;
use crate::metrics;
use crate::models::DailyMetric;
use crate::sheets_client::SheetSource;
use crate::store::LeadStore;
use crate::sync;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Recomputes today's daily metric from the current leads and stores it.
pub async fn refresh_daily_metric(store: &dyn LeadStore) -> Result<DailyMetric, AppError> {
    let today = Utc::now().date_naive();
    let leads = store.list_leads().await?;
    let snapshot = metrics::daily_snapshot(&leads, today);
    store.upsert_daily_metric(&snapshot).await
}

/// Periodic daily-metric refresh. The first tick fires immediately.
pub fn spawn_metrics_snapshot(store: Arc<dyn LeadStore>, every: Duration) -> JoinHandle<()> {
    tracing::info!("Daily metric snapshot every {}s", every.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match refresh_daily_metric(store.as_ref()).await {
                Ok(metric) => tracing::debug!(
                    "Daily metric {} refreshed ({} conversations)",
                    metric.fecha,
                    metric.total_conversaciones
                ),
                Err(e) => tracing::error!("Daily metric refresh failed: {}", e),
            }
        }
    })
}

/// Periodic spreadsheet sync.
pub fn spawn_periodic_sync(
    store: Arc<dyn LeadStore>,
    source: Arc<dyn SheetSource>,
    every: Duration,
) -> JoinHandle<()> {
    tracing::info!("Spreadsheet sync every {}s", every.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = sync::sync_from_spreadsheet(store.as_ref(), source.as_ref()).await {
                tracing::error!("Scheduled spreadsheet sync failed: {}", e);
            }
        }
    })
}
