//! Structured alerts handed to an external delivery channel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use super::feedback::{NgoCatalog, RoutingDecision};
use super::hazards::EscalationAlert;
use super::resources::DepletionAlert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HazardEscalation,
    ResourceDepletion,
    NegativeFeedback,
}

impl AlertKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::HazardEscalation => "hazard_escalation",
            Self::ResourceDepletion => "resource_depletion",
            Self::NegativeFeedback => "negative_feedback",
        }
    }
}

/// Delivery-agnostic alert: what happened, the fields to display, and who should hear about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAlert {
    pub kind: AlertKind,
    pub subject: String,
    pub fields: BTreeMap<String, String>,
    pub audience: Vec<String>,
}

impl NotificationAlert {
    pub fn hazard_escalation(alert: &EscalationAlert, audience: Vec<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("event_id".to_string(), alert.event_id.clone());
        fields.insert("event_type".to_string(), alert.event_type.clone());
        fields.insert("alert_level".to_string(), alert.alert_level.to_string());
        fields.insert("alert_score".to_string(), format!("{:.2}", alert.alert_score));
        fields.insert("severity".to_string(), alert.severity.to_string());
        fields.insert("country".to_string(), alert.country.clone());
        fields.insert("site_id".to_string(), alert.site_id.to_string());
        fields.insert("distance_km".to_string(), format!("{:.1}", alert.distance_km));
        fields.insert("reason".to_string(), alert.reason.summary());
        fields.insert("summary".to_string(), alert.summary());

        Self {
            kind: AlertKind::HazardEscalation,
            subject: alert.subject(),
            fields,
            audience,
        }
    }

    /// Audience is every organisation in the site's country able to resupply the resource.
    pub fn resource_depletion(alert: &DepletionAlert, ngos: &NgoCatalog) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("site_id".to_string(), alert.site_id.to_string());
        fields.insert("country".to_string(), alert.country.clone());
        fields.insert("resource".to_string(), alert.resource.to_string());
        fields.insert("depletion_date".to_string(), alert.depletion_date.to_string());
        fields.insert(
            "threshold".to_string(),
            format!("{} {}", alert.threshold, alert.resource.unit()),
        );
        fields.insert(
            "projected_quantity".to_string(),
            format!("{:.1}", alert.projected_quantity),
        );

        Self {
            kind: AlertKind::ResourceDepletion,
            subject: alert.subject(),
            fields,
            audience: ngos.responders(&alert.country, alert.resource.relief_tags()),
        }
    }

    /// Only routed feedback produces an alert.
    pub fn negative_feedback(decision: &RoutingDecision) -> Option<Self> {
        if !decision.is_routed() {
            return None;
        }
        let item = &decision.item;
        let mut fields = BTreeMap::new();
        fields.insert("site_id".to_string(), item.site_id.to_string());
        fields.insert("country".to_string(), item.country.clone());
        fields.insert("category".to_string(), item.category.to_string());
        fields.insert("sentiment".to_string(), item.sentiment.label.to_string());
        fields.insert("priority".to_string(), item.priority.label().to_string());
        fields.insert("text".to_string(), item.text.clone());

        Some(Self {
            kind: AlertKind::NegativeFeedback,
            subject: format!(
                "{} priority {} feedback from {}",
                item.priority.label(),
                item.category,
                item.site_id
            ),
            fields,
            audience: decision.targets.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification has no audience")]
    NoAudience,
}

/// Delivery channel (email, messaging, ...). Implementations own retries and formatting.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, alert: NotificationAlert) -> Result<(), DispatchError>;
}

/// Send each alert, logging failures. Returns how many were delivered.
pub fn dispatch_all<D>(dispatcher: &D, alerts: impl IntoIterator<Item = NotificationAlert>) -> usize
where
    D: NotificationDispatcher + ?Sized,
{
    let mut delivered = 0;
    for alert in alerts {
        let kind = alert.kind;
        let subject = alert.subject.clone();
        match dispatcher.dispatch(alert) {
            Ok(()) => delivered += 1,
            Err(err) => error!(kind = kind.label(), %subject, error = %err, "notification dispatch failed"),
        }
    }
    delivered
}
