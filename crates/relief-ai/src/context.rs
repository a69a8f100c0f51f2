use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::workflows::catalog::load_reference_population;
use crate::workflows::encoding::{
    AttributeRecord, BeneficiaryProfile, EncodingError, FeatureEncoder, FittedEncoder,
    RecordOrigin,
};
use crate::workflows::feedback::{
    CategoryClassifier, FeedbackError, FeedbackRouter, FeedbackSubmission, NgoCatalog,
    RoutingDecision, SentimentClassifier,
};
use crate::workflows::matching::{
    builtin_reference_population, rank_services, ActiveHazard, EncodedCatalog, MatchOptions,
    RankedService, ServiceCatalog,
};
use crate::workflows::notifications::NotificationAlert;
use crate::workflows::resources::DepletionAlert;

/// Ranked services for one profile, with the hazards that shaped the weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub services: Vec<RankedService>,
    pub active_hazards: Vec<ActiveHazard>,
}

/// Request-time state built once at startup: the fitted encoder, the service catalog encoded
/// with it, and the organisation catalog. Shared by reference across handlers.
#[derive(Debug)]
pub struct PipelineContext {
    encoder: FittedEncoder,
    catalog: ServiceCatalog,
    encoded_catalog: EncodedCatalog,
    router: FeedbackRouter,
    match_options: MatchOptions,
}

impl PipelineContext {
    pub fn build(
        reference: &[AttributeRecord],
        catalog: ServiceCatalog,
        ngos: NgoCatalog,
        match_options: MatchOptions,
    ) -> Result<Self, EncodingError> {
        let encoder = FeatureEncoder::fit(BeneficiaryProfile::schema(), reference)?;
        let encoded_catalog = EncodedCatalog::encode(&encoder, &catalog)?;
        info!(
            services = catalog.len(),
            width = encoder.width(),
            organisations = ngos.organisations().len(),
            "pipeline context ready"
        );

        Ok(Self {
            encoder,
            catalog,
            encoded_catalog,
            router: FeedbackRouter::new(Arc::new(ngos)),
            match_options,
        })
    }

    /// Load configured CSV catalogs, falling back to the built-in tables.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let schema = BeneficiaryProfile::schema();
        let catalogs = &config.catalogs;

        let reference = match &catalogs.reference_profiles {
            Some(path) => load_reference_population(std::fs::File::open(path)?, &schema)?,
            None => builtin_reference_population(),
        };
        let services = match &catalogs.service_catalog {
            Some(path) => ServiceCatalog::from_path(path, &schema)?,
            None => ServiceCatalog::builtin(),
        };
        let ngos = match &catalogs.ngo_catalog {
            Some(path) => NgoCatalog::from_path(path)?,
            None => NgoCatalog::builtin(),
        };
        let options = MatchOptions {
            top_n: config.matcher.top_n,
            minimum_level: config.escalation.minimum_alert,
        };

        Ok(Self::build(&reference, services, ngos, options)?)
    }

    pub fn encoder(&self) -> &FittedEncoder {
        &self.encoder
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn ngos(&self) -> &NgoCatalog {
        self.router.ngos()
    }

    pub fn match_options(&self) -> &MatchOptions {
        &self.match_options
    }

    /// Encode the profile with the startup encoder and rank the catalog against it.
    pub fn recommend(
        &self,
        profile: &BeneficiaryProfile,
        active: Option<&[ActiveHazard]>,
    ) -> Result<Recommendation, AppError> {
        let vector = self
            .encoder
            .encode(&profile.to_record(), RecordOrigin::Request)?;
        let services = rank_services(&vector, &self.encoded_catalog, active, &self.match_options)?;
        Ok(Recommendation {
            services,
            active_hazards: active.map(<[ActiveHazard]>::to_vec).unwrap_or_default(),
        })
    }

    pub fn route_feedback(
        &self,
        submission: FeedbackSubmission,
        sentiment: &dyn SentimentClassifier,
        category: &dyn CategoryClassifier,
    ) -> Result<RoutingDecision, FeedbackError> {
        self.router.route_submission(submission, sentiment, category)
    }

    pub fn depletion_notification(&self, alert: &DepletionAlert) -> NotificationAlert {
        NotificationAlert::resource_depletion(alert, self.ngos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::hazards::AlertLevel;

    fn context() -> PipelineContext {
        PipelineContext::build(
            &builtin_reference_population(),
            ServiceCatalog::builtin(),
            NgoCatalog::builtin(),
            MatchOptions::default(),
        )
        .expect("context")
    }

    #[test]
    fn recommends_top_three_for_a_partial_profile() {
        let profile = BeneficiaryProfile {
            age: Some(48.0),
            health_difficulty: Some("Severe difficulty".to_string()),
            location: Some("Melkadida".to_string()),
            ..BeneficiaryProfile::default()
        };

        let recommendation = context().recommend(&profile, None).expect("recommend");
        assert_eq!(recommendation.services.len(), 3);
        assert!(recommendation.active_hazards.is_empty());
        assert!(recommendation
            .services
            .iter()
            .all(|service| service.weight == 1.0));
    }

    #[test]
    fn active_hazards_are_echoed_back() {
        let active = vec![ActiveHazard {
            event_type: "FL".to_string(),
            alert_level: AlertLevel::Red,
        }];
        let recommendation = context()
            .recommend(&BeneficiaryProfile::default(), Some(&active))
            .expect("recommend");
        assert_eq!(recommendation.active_hazards, active);
    }
}
