//! Hazard escalation: feed parsing, per-event state, and proximity-based alerting.

mod detector;
mod domain;
mod feed;
mod store;

pub use detector::{EscalationDetector, EscalationPolicy};
pub use domain::{
    AlertLevel, EscalationAlert, EscalationReason, EscalationRecord, HazardEvent, UnknownAlertLevel,
};
pub use feed::{parse_feature_collection, FileHazardFeed, HazardFeed, UpstreamFeedError};
pub use store::{EscalationStore, InMemoryEscalationStore, JsonFileEscalationStore, StoreError};
