use crate::infra::{escalation_audience, GdacsClient, LatestHazards};
use chrono::Utc;
use relief_ai::config::ForecastConfig;
use relief_ai::workflows::hazards::{EscalationDetector, EscalationStore};
use relief_ai::workflows::notifications::{dispatch_all, NotificationAlert, NotificationDispatcher};
use relief_ai::workflows::resources::{ForecastBatchRunner, ResourceHistoryImporter};
use relief_ai::PipelineContext;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Poll the hazard feed on a fixed cadence, publishing new escalations and notifying the
/// organisations in each affected country.
pub(crate) fn spawn_hazard_poll<S>(
    detector: Arc<EscalationDetector<S>>,
    feed: GdacsClient,
    latest: Arc<LatestHazards>,
    pipeline: Arc<PipelineContext>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    every: Duration,
) -> JoinHandle<()>
where
    S: EscalationStore + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let fetched = feed.fetch().await;
            let detector = Arc::clone(&detector);
            let alerts = match tokio::task::spawn_blocking(move || {
                detector.process(fetched, Utc::now())
            })
            .await
            {
                Ok(alerts) => alerts,
                Err(err) => {
                    error!(error = %err, "hazard poll task failed");
                    continue;
                }
            };

            let notifications: Vec<_> = alerts
                .iter()
                .map(|alert| {
                    NotificationAlert::hazard_escalation(
                        alert,
                        escalation_audience(pipeline.ngos(), alert),
                    )
                })
                .collect();
            let delivered = dispatch_all(dispatcher.as_ref(), notifications);
            info!(alerts = alerts.len(), delivered, "hazard escalations published");
            latest.publish(alerts);
        }
    })
}

/// Re-read the resource history and refit every series on a fixed cadence.
pub(crate) fn spawn_forecast_batch(
    runner: ForecastBatchRunner,
    history: PathBuf,
    config: ForecastConfig,
    pipeline: Arc<PipelineContext>,
    dispatcher: Arc<dyn NotificationDispatcher>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.batch_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let series = match ResourceHistoryImporter::from_path(&history) {
                Ok(series) => series,
                Err(err) => {
                    warn!(path = %history.display(), error = %err, "resource history unreadable; keeping previous forecasts");
                    continue;
                }
            };

            runner.run(series).await;
            let today = Utc::now().date_naive();
            let notifications: Vec<_> = runner
                .snapshots()
                .depletion_alerts(today, config.alert_window_days)
                .iter()
                .map(|alert| pipeline.depletion_notification(alert))
                .collect();
            let notifications_len = notifications.len();
            let delivered = dispatch_all(dispatcher.as_ref(), notifications);
            info!(
                alerts = notifications_len,
                delivered,
                "depletion notifications sent"
            );
        }
    })
}
