use serde::Serialize;

use super::catalog::{HazardApplicability, ServiceCatalog};
use crate::workflows::encoding::{
    EncodedVector, EncoderId, FittedEncoder, RecordOrigin, SchemaError,
};
use crate::workflows::hazards::{AlertLevel, EscalationAlert, HazardEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("profile was encoded by encoder {} but the catalog by encoder {}", profile.0, catalog.0)]
pub struct EncoderMismatchError {
    pub profile: EncoderId,
    pub catalog: EncoderId,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    EncoderMismatch(#[from] EncoderMismatchError),
    #[error("profile vector has {profile} columns but catalog vectors have {catalog}")]
    WidthMismatch { profile: usize, catalog: usize },
}

/// Catalog vectors produced by one fitted encoder.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedCatalog {
    encoder: EncoderId,
    entries: Vec<EncodedService>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodedService {
    pub name: String,
    pub applicability: HazardApplicability,
    pub vector: EncodedVector,
}

impl EncodedCatalog {
    pub fn encode(encoder: &FittedEncoder, catalog: &ServiceCatalog) -> Result<Self, SchemaError> {
        let entries = catalog
            .services()
            .iter()
            .enumerate()
            .map(|(index, service)| {
                encoder
                    .encode(&service.attributes, RecordOrigin::Catalog)
                    .map_err(|error| reindex(error, index))
                    .map(|vector| EncodedService {
                        name: service.name.clone(),
                        applicability: service.applicability.clone(),
                        vector,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            encoder: encoder.id(),
            entries,
        })
    }

    pub fn encoder(&self) -> EncoderId {
        self.encoder
    }

    pub fn entries(&self) -> &[EncodedService] {
        &self.entries
    }
}

fn reindex(error: SchemaError, index: usize) -> SchemaError {
    match error {
        SchemaError::MissingField { origin, field, .. } => SchemaError::MissingField {
            origin,
            index,
            field,
        },
        SchemaError::UnknownField { origin, field, .. } => SchemaError::UnknownField {
            origin,
            index,
            field,
        },
        other => other,
    }
}

/// The parts of an actionable hazard the matcher reweights on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveHazard {
    pub event_type: String,
    pub alert_level: AlertLevel,
}

impl From<&EscalationAlert> for ActiveHazard {
    fn from(alert: &EscalationAlert) -> Self {
        Self {
            event_type: alert.event_type.clone(),
            alert_level: alert.alert_level,
        }
    }
}

impl From<&HazardEvent> for ActiveHazard {
    fn from(event: &HazardEvent) -> Self {
        Self {
            event_type: event.event_type.clone(),
            alert_level: event.alert_level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub top_n: usize,
    pub minimum_level: AlertLevel,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            top_n: 3,
            minimum_level: AlertLevel::Orange,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedService {
    pub name: String,
    pub similarity: f64,
    pub weight: f64,
    pub score: f64,
}

/// Cosine of the angle between two vectors; 0 when either has zero magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Weighted ranking score. Cosine is shifted onto `[0, 1]` first so a larger hazard
/// weight never lowers a score, even for dissimilar services.
pub fn weighted_score(similarity: f64, weight: f64) -> f64 {
    (1.0 + similarity) / 2.0 * weight
}

/// Hazard weight for one service: 1, plus 2 (or 1 when nothing active reaches
/// `minimum_level`) if the service applies to any active hazard.
pub fn hazard_weight(
    applicability: &HazardApplicability,
    active: &[ActiveHazard],
    minimum_level: AlertLevel,
) -> f64 {
    let applies = match applicability {
        HazardApplicability::Always => true,
        HazardApplicability::Types(_) => active
            .iter()
            .any(|hazard| applicability.covers(&hazard.event_type)),
    };
    if !applies {
        return 1.0;
    }
    let severe = active
        .iter()
        .any(|hazard| hazard.alert_level >= minimum_level);
    if severe {
        3.0
    } else {
        2.0
    }
}

/// Rank catalog services against one profile, highest weighted score first.
///
/// Without `active` hazards every weight is 1. Equal scores keep catalog order.
pub fn rank_services(
    profile: &EncodedVector,
    catalog: &EncodedCatalog,
    active: Option<&[ActiveHazard]>,
    options: &MatchOptions,
) -> Result<Vec<RankedService>, MatchError> {
    if profile.encoder() != catalog.encoder() {
        return Err(EncoderMismatchError {
            profile: profile.encoder(),
            catalog: catalog.encoder(),
        }
        .into());
    }

    let mut ranked = Vec::with_capacity(catalog.entries().len());
    for entry in catalog.entries() {
        if entry.vector.len() != profile.len() {
            return Err(MatchError::WidthMismatch {
                profile: profile.len(),
                catalog: entry.vector.len(),
            });
        }
        let similarity = cosine_similarity(profile.values(), entry.vector.values());
        let weight = active
            .map(|active| hazard_weight(&entry.applicability, active, options.minimum_level))
            .unwrap_or(1.0);
        ranked.push(RankedService {
            name: entry.name.clone(),
            similarity,
            weight,
            score: weighted_score(similarity, weight),
        });
    }

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(options.top_n);
    Ok(ranked)
}
