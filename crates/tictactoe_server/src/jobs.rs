//! Background jobs: average-moves refresh and reminder runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::reminders::{Notifier, send_reminders};
use crate::GameService;

/// Recomputes the cached average every `period`.
///
/// The first tick fires immediately, so the cache is warm at startup.
#[instrument(skip(service))]
pub fn spawn_cache_refresher(service: GameService, period: Duration) -> JoinHandle<()> {
    info!("Starting average-moves refresher");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let svc = service.clone();
            match tokio::task::spawn_blocking(move || svc.refresh_average_moves()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "Average refresh failed"),
                Err(e) => error!(error = %e, "Average refresh task panicked"),
            }
        }
    })
}

/// Sends pending reminders every `period`, starting one period from now.
#[instrument(skip(service, notifier))]
pub fn spawn_reminder_job(
    service: GameService,
    notifier: Arc<dyn Notifier>,
    sender: String,
    period: Duration,
) -> JoinHandle<()> {
    info!("Starting reminder job");
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        loop {
            ticker.tick().await;
            if let Err(e) = send_reminders(&service, notifier.as_ref(), &sender).await {
                warn!(error = %e, "Reminder run failed");
            }
        }
    })
}
