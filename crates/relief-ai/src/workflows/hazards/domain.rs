use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geo::Coordinates;
use crate::workflows::sites::SiteId;

/// Ordered hazard alert level, `Green < Orange < Red`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    Green,
    Orange,
    Red,
}

impl AlertLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Orange => "Orange",
            Self::Red => "Red",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown alert level '{0}'")]
pub struct UnknownAlertLevel(pub String);

impl FromStr for AlertLevel {
    type Err = UnknownAlertLevel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Self::Green),
            "orange" => Ok(Self::Orange),
            "red" => Ok(Self::Red),
            _ => Err(UnknownAlertLevel(value.to_string())),
        }
    }
}

/// One snapshot of an external hazard event. Only `id` is stable across polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardEvent {
    pub id: String,
    pub event_type: String,
    pub alert_level: AlertLevel,
    pub alert_score: f64,
    pub coordinates: Coordinates,
    pub country: String,
    pub from_date: Option<NaiveDateTime>,
    pub severity: f64,
}

/// Last-seen state of an event identifier, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub alert_score: f64,
    pub alert_level: AlertLevel,
    pub last_notified: DateTime<Utc>,
}

/// Why an event was judged actionable on this poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationReason {
    FirstSighting,
    ScoreIncrease { previous_score: f64 },
    LevelCrossed { previous_level: AlertLevel },
}

impl EscalationReason {
    pub fn summary(&self) -> String {
        match self {
            Self::FirstSighting => "new event".to_string(),
            Self::ScoreIncrease { previous_score } => {
                format!("alert score increased from {previous_score:.2}")
            }
            Self::LevelCrossed { previous_level } => {
                format!("alert level escalated from {previous_level}")
            }
        }
    }
}

/// One actionable (event, nearby site) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationAlert {
    pub event_id: String,
    pub event_type: String,
    pub alert_level: AlertLevel,
    pub alert_score: f64,
    pub severity: f64,
    pub country: String,
    pub from_date: Option<NaiveDateTime>,
    pub coordinates: Coordinates,
    pub site_id: SiteId,
    pub site_name: String,
    pub distance_km: f64,
    pub reason: EscalationReason,
}

impl EscalationAlert {
    pub fn subject(&self) -> String {
        format!(
            "{} ({}) near {}",
            self.event_type, self.alert_level, self.site_name
        )
    }

    pub fn summary(&self) -> String {
        let date = self
            .from_date
            .map(|date| date.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "New or worsening hazard detected ({})\n\
             Event type: {}\n\
             Alert level: {} (score {:.2})\n\
             Severity: {}\n\
             Location: {}, {:.1} km from {}\n\
             Coordinates: ({}, {})\n\
             Date: {}\n\
             Event ID: {}",
            self.reason.summary(),
            self.event_type,
            self.alert_level,
            self.alert_score,
            self.severity,
            self.country,
            self.distance_km,
            self.site_name,
            self.coordinates.lat,
            self.coordinates.lon,
            date,
            self.event_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_levels_are_ordered() {
        assert!(AlertLevel::Green < AlertLevel::Orange);
        assert!(AlertLevel::Orange < AlertLevel::Red);
    }

    #[test]
    fn parses_alert_levels_case_insensitively() {
        assert_eq!("RED".parse::<AlertLevel>(), Ok(AlertLevel::Red));
        assert_eq!(" orange ".parse::<AlertLevel>(), Ok(AlertLevel::Orange));
        assert!("purple".parse::<AlertLevel>().is_err());
    }
}
