use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::catalog::CatalogError;
use crate::workflows::encoding::{EncodingError, SchemaError};
use crate::workflows::feedback::FeedbackError;
use crate::workflows::hazards::{StoreError, UpstreamFeedError};
use crate::workflows::matching::MatchError;
use crate::workflows::resources::{ForecastError, ResourceImportError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Schema(SchemaError),
    Encoding(EncodingError),
    Match(MatchError),
    Feedback(FeedbackError),
    Catalog(CatalogError),
    Import(ResourceImportError),
    Forecast(ForecastError),
    Store(StoreError),
    Feed(UpstreamFeedError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Schema(err) => write!(f, "schema error: {}", err),
            AppError::Encoding(err) => write!(f, "encoding error: {}", err),
            AppError::Match(err) => write!(f, "matching error: {}", err),
            AppError::Feedback(err) => write!(f, "feedback error: {}", err),
            AppError::Catalog(err) => write!(f, "catalog error: {}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Forecast(err) => write!(f, "forecast error: {}", err),
            AppError::Store(err) => write!(f, "escalation store error: {}", err),
            AppError::Feed(err) => write!(f, "hazard feed error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Schema(err) => Some(err),
            AppError::Encoding(err) => Some(err),
            AppError::Match(err) => Some(err),
            AppError::Feedback(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Forecast(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Feed(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Schema(_)
            | AppError::Encoding(_)
            | AppError::Feedback(_)
            | AppError::Catalog(_)
            | AppError::Import(_) => StatusCode::BAD_REQUEST,
            AppError::Match(_) | AppError::Forecast(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Feed(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<SchemaError> for AppError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<EncodingError> for AppError {
    fn from(value: EncodingError) -> Self {
        Self::Encoding(value)
    }
}

impl From<MatchError> for AppError {
    fn from(value: MatchError) -> Self {
        Self::Match(value)
    }
}

impl From<FeedbackError> for AppError {
    fn from(value: FeedbackError) -> Self {
        Self::Feedback(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<ResourceImportError> for AppError {
    fn from(value: ResourceImportError) -> Self {
        Self::Import(value)
    }
}

impl From<ForecastError> for AppError {
    fn from(value: ForecastError) -> Self {
        Self::Forecast(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<UpstreamFeedError> for AppError {
    fn from(value: UpstreamFeedError) -> Self {
        Self::Feed(value)
    }
}
