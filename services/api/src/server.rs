use crate::cli::ServeArgs;
use crate::infra::{
    configured_sites, AppState, GdacsClient, KeywordCategories, LatestHazards, LexiconSentiment,
    LogDispatcher, Services,
};
use crate::jobs;
use crate::routes::with_relief_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use relief_ai::config::AppConfig;
use relief_ai::error::AppError;
use relief_ai::telemetry;
use relief_ai::workflows::hazards::{EscalationDetector, EscalationPolicy, JsonFileEscalationStore};
use relief_ai::workflows::notifications::NotificationDispatcher;
use relief_ai::workflows::resources::{
    BatchSettings, DepletionForecaster, ForecastBatchRunner, ForecastSettings, ForecastSnapshots,
};
use relief_ai::PipelineContext;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pipeline = Arc::new(PipelineContext::from_config(&config)?);
    let dispatcher: Arc<dyn NotificationDispatcher> = Arc::new(LogDispatcher::default());
    let latest = Arc::new(LatestHazards::default());

    let store = Arc::new(JsonFileEscalationStore::open(&config.escalation.store_path)?);
    let detector = Arc::new(EscalationDetector::new(
        EscalationPolicy::from(&config.escalation),
        configured_sites(&config.catalogs)?,
        store,
    ));
    jobs::spawn_hazard_poll(
        detector,
        GdacsClient::new(config.escalation.feed_url.clone())?,
        Arc::clone(&latest),
        Arc::clone(&pipeline),
        Arc::clone(&dispatcher),
        config.escalation.poll_interval,
    );

    let forecast = ForecastSettings::from(&config.forecast);
    match &config.catalogs.resource_history {
        Some(history) => {
            let runner = ForecastBatchRunner::new(
                Arc::new(DepletionForecaster::new(forecast)),
                Arc::new(ForecastSnapshots::default()),
                BatchSettings::from(&config.forecast),
            );
            jobs::spawn_forecast_batch(
                runner,
                history.clone(),
                config.forecast.clone(),
                Arc::clone(&pipeline),
                Arc::clone(&dispatcher),
            );
        }
        None => info!("no resource history configured; forecast batch disabled"),
    }

    let services = Services {
        pipeline,
        hazards: latest,
        sentiment: Arc::new(LexiconSentiment),
        category: Arc::new(KeywordCategories),
        dispatcher,
        forecast,
    };

    let app = with_relief_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "relief coordination service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
