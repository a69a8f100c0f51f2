use crate::infra::{AppState, Services};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{Local, NaiveDate};
use relief_ai::error::AppError;
use relief_ai::workflows::encoding::BeneficiaryProfile;
use relief_ai::workflows::feedback::{
    FeedbackCategory, FeedbackSubmission, Priority, SentimentAssessment,
};
use relief_ai::workflows::hazards::EscalationAlert;
use relief_ai::workflows::matching::{ActiveHazard, RankedService};
use relief_ai::workflows::notifications::{dispatch_all, NotificationAlert};
use relief_ai::workflows::resources::{
    DepletionForecaster, FitOutcome, ResourceForecast, ResourceHistoryImporter, ResourceType,
    SeriesKey,
};
use relief_ai::workflows::sites::SiteId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;

pub(crate) fn with_relief_routes(services: Services) -> Router {
    Router::new()
        .route("/api/v1/recommendations", post(recommendations_endpoint))
        .route("/api/v1/feedback", post(feedback_endpoint))
        .route("/api/v1/hazards/alerts", get(hazard_alerts_endpoint))
        .route("/api/v1/resources/forecast", post(resource_forecast_endpoint))
        .with_state(services)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RecommendationRequest {
    pub(crate) profile: BeneficiaryProfile,
    /// Rank without hazard reweighting even when escalations are active.
    #[serde(default)]
    pub(crate) ignore_hazards: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RecommendationResponse {
    pub(crate) services: Vec<RankedService>,
    pub(crate) active_hazards: Vec<ActiveHazard>,
}

pub(crate) async fn recommendations_endpoint(
    State(services): State<Services>,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let active = (!request.ignore_hazards).then(|| services.hazards.active());
    let recommendation = services
        .pipeline
        .recommend(&request.profile, active.as_deref())?;

    Ok(Json(RecommendationResponse {
        services: recommendation.services,
        active_hazards: recommendation.active_hazards,
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackResponse {
    pub(crate) site_id: SiteId,
    pub(crate) sentiment: SentimentAssessment,
    pub(crate) category: FeedbackCategory,
    pub(crate) priority: Priority,
    pub(crate) notified: Vec<String>,
}

pub(crate) async fn feedback_endpoint(
    State(services): State<Services>,
    Json(submission): Json<FeedbackSubmission>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let decision = services.pipeline.route_feedback(
        submission,
        services.sentiment.as_ref(),
        services.category.as_ref(),
    )?;

    if let Some(alert) = NotificationAlert::negative_feedback(&decision) {
        dispatch_all(services.dispatcher.as_ref(), [alert]);
    }

    Ok(Json(FeedbackResponse {
        site_id: decision.item.site_id,
        sentiment: decision.item.sentiment,
        category: decision.item.category,
        priority: decision.item.priority,
        notified: decision.targets,
    }))
}

#[derive(Debug, Serialize)]
pub(crate) struct HazardAlertsResponse {
    pub(crate) alerts: Vec<EscalationAlert>,
}

pub(crate) async fn hazard_alerts_endpoint(
    State(services): State<Services>,
) -> Json<HazardAlertsResponse> {
    Json(HazardAlertsResponse {
        alerts: services.hazards.snapshot().as_ref().clone(),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastQuery {
    /// Window start; defaults to today.
    #[serde(default)]
    pub(crate) reference: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ForecastOutcome {
    pub(crate) site_id: SiteId,
    pub(crate) resource: ResourceType,
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) depletion_date: Option<NaiveDate>,
    pub(crate) alert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ForecastResponse {
    pub(crate) reference: NaiveDate,
    pub(crate) window_days: i64,
    pub(crate) outcomes: Vec<ForecastOutcome>,
}

/// CSV resource history in, per-series depletion outcome out. Fits run on the blocking pool.
pub(crate) async fn resource_forecast_endpoint(
    State(services): State<Services>,
    Query(query): Query<ForecastQuery>,
    body: String,
) -> Result<Json<ForecastResponse>, AppError> {
    let series = ResourceHistoryImporter::from_reader(Cursor::new(body.into_bytes()))?;
    let settings = services.forecast;
    let reference = query
        .reference
        .unwrap_or_else(|| Local::now().date_naive());

    let fitted = tokio::task::spawn_blocking(move || {
        let forecaster = DepletionForecaster::new(settings);
        series
            .iter()
            .map(|item| (item.key().clone(), forecaster.forecast(item)))
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;

    let outcomes = fitted
        .into_iter()
        .map(|(key, result)| {
            let result = result.as_ref().map_err(|err| err.to_string());
            forecast_outcome(key, result, reference, settings.alert_window_days)
        })
        .collect();

    Ok(Json(ForecastResponse {
        reference,
        window_days: settings.alert_window_days,
        outcomes,
    }))
}

fn forecast_outcome(
    key: SeriesKey,
    result: Result<&ResourceForecast, String>,
    reference: NaiveDate,
    window_days: i64,
) -> ForecastOutcome {
    match result {
        Ok(forecast) => ForecastOutcome {
            site_id: key.site_id,
            resource: key.resource,
            status: "forecast",
            depletion_date: forecast.depletion_date,
            alert: forecast.depletes_within(reference, window_days),
            error: None,
        },
        Err(error) => ForecastOutcome {
            site_id: key.site_id,
            resource: key.resource,
            status: "skipped",
            depletion_date: None,
            alert: false,
            error: Some(error),
        },
    }
}

/// Batch outcomes render the same way as ad-hoc fits.
pub(crate) fn batch_outcome(
    key: SeriesKey,
    outcome: &FitOutcome,
    reference: NaiveDate,
    window_days: i64,
) -> ForecastOutcome {
    let result = match outcome {
        FitOutcome::Refreshed(forecast) => Ok(forecast.as_ref()),
        FitOutcome::Skipped(error) => Err(error.to_string()),
    };
    forecast_outcome(key, result, reference, window_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{KeywordCategories, LatestHazards, LexiconSentiment, LogDispatcher};
    use axum::body::Body;
    use axum::http::Request;
    use relief_ai::workflows::feedback::NgoCatalog;
    use relief_ai::workflows::matching::{
        builtin_reference_population, MatchOptions, ServiceCatalog,
    };
    use relief_ai::workflows::resources::ForecastSettings;
    use relief_ai::PipelineContext;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn services(dispatcher: LogDispatcher) -> Services {
        let pipeline = PipelineContext::build(
            &builtin_reference_population(),
            ServiceCatalog::builtin(),
            NgoCatalog::builtin(),
            MatchOptions::default(),
        )
        .expect("pipeline");
        Services {
            pipeline: Arc::new(pipeline),
            hazards: Arc::new(LatestHazards::default()),
            sentiment: Arc::new(LexiconSentiment),
            category: Arc::new(KeywordCategories),
            dispatcher: Arc::new(dispatcher),
            forecast: ForecastSettings::default(),
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn recommendations_return_ranked_services() {
        let router = with_relief_routes(services(LogDispatcher::default()));
        let request = post_json(
            "/api/v1/recommendations",
            json!({
                "profile": {
                    "age": 52,
                    "health_difficulty": "Severe difficulty",
                    "location": "Melkadida",
                    "gender": "Female"
                }
            }),
        );

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        let ranked = body["services"].as_array().expect("services array");
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|service| service["weight"] == 1.0));
        assert_eq!(body["active_hazards"], json!([]));
    }

    #[tokio::test]
    async fn unknown_profile_fields_are_rejected() {
        let router = with_relief_routes(services(LogDispatcher::default()));
        let request = post_json(
            "/api/v1/recommendations",
            json!({ "profile": { "age": 52, "favourite_colour": "blue" } }),
        );

        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn negative_feedback_notifies_local_organisations() {
        let dispatcher = LogDispatcher::default();
        let router = with_relief_routes(services(dispatcher.clone()));
        let request = post_json(
            "/api/v1/feedback",
            json!({
                "text": "Tents are damaged and leaking.",
                "site_id": "melkadida",
                "country": "Ethiopia"
            }),
        );

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "Shelter");
        assert_eq!(body["priority"], "High");
        assert_eq!(body["notified"], json!(["CARE International"]));
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn blank_feedback_is_a_bad_request() {
        let router = with_relief_routes(services(LogDispatcher::default()));
        let request = post_json(
            "/api/v1/feedback",
            json!({ "text": "  ", "site_id": "melkadida", "country": "Ethiopia" }),
        );

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("message").contains("empty"));
    }

    #[tokio::test]
    async fn hazard_alerts_start_empty() {
        let router = with_relief_routes(services(LogDispatcher::default()));
        let request = Request::builder()
            .uri("/api/v1/hazards/alerts")
            .body(Body::empty())
            .expect("request");

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "alerts": [] }));
    }

    #[tokio::test]
    async fn forecast_endpoint_flags_depleting_series() {
        let mut csv = String::from(
            "site_id,country,resource_type,date,quantity,consumption_rate,men,women,children,elderly\n",
        );
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).expect("date");
        for day in 0..20 {
            let date = start + chrono::Duration::days(day);
            let quantity = 4000 - 150 * day;
            csv.push_str(&format!("kakuma,Kenya,Food,{date},{quantity},150,400,400,300,100\n"));
        }
        csv.push_str("kakuma,Kenya,Water,2025-03-01,9000,,400,400,300,100\n");

        let router = with_relief_routes(services(LogDispatcher::default()));
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/resources/forecast?reference=2025-03-20")
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(csv))
            .expect("request");

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        let outcomes = body["outcomes"].as_array().expect("outcomes");
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0]["resource"], "food");
        assert_eq!(outcomes[0]["alert"], true);
        assert_eq!(outcomes[1]["status"], "skipped");
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let router = with_relief_routes(services(LogDispatcher::default()));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request");

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
