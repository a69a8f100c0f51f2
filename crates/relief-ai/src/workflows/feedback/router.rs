use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::domain::{
    FeedbackCategory, FeedbackItem, FeedbackSubmission, SentimentAssessment, SentimentLabel,
};
use super::ngo::NgoCatalog;

/// Text polarity as a black box: label plus compound score.
pub trait SentimentClassifier: Send + Sync {
    fn assess(&self, text: &str) -> SentimentAssessment;
}

/// Text to one of the fixed feedback categories.
pub trait CategoryClassifier: Send + Sync {
    fn classify(&self, text: &str) -> FeedbackCategory;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackError {
    #[error("feedback text is empty")]
    EmptyText,
    #[error("feedback country is empty")]
    MissingCountry,
}

/// Routing outcome for one feedback item. Only negative feedback gets targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub item: FeedbackItem,
    pub targets: Vec<String>,
}

impl RoutingDecision {
    pub fn is_routed(&self) -> bool {
        !self.targets.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackRouter {
    ngos: Arc<NgoCatalog>,
}

impl FeedbackRouter {
    pub fn new(ngos: Arc<NgoCatalog>) -> Self {
        Self { ngos }
    }

    pub fn ngos(&self) -> &NgoCatalog {
        &self.ngos
    }

    /// Route already-classified feedback.
    pub fn route(&self, item: FeedbackItem) -> RoutingDecision {
        let targets = if item.sentiment.label == SentimentLabel::Negative {
            self.ngos
                .responders(&item.country, item.category.focus_tags())
        } else {
            Vec::new()
        };

        info!(
            site = %item.site_id,
            category = %item.category,
            sentiment = %item.sentiment.label,
            priority = item.priority.label(),
            targets = targets.len(),
            "feedback routed"
        );
        RoutingDecision { item, targets }
    }

    /// Classify raw feedback with the supplied classifiers, then route it.
    pub fn route_submission(
        &self,
        submission: FeedbackSubmission,
        sentiment: &dyn SentimentClassifier,
        category: &dyn CategoryClassifier,
    ) -> Result<RoutingDecision, FeedbackError> {
        if submission.text.trim().is_empty() {
            return Err(FeedbackError::EmptyText);
        }
        if submission.country.trim().is_empty() {
            return Err(FeedbackError::MissingCountry);
        }

        let assessment = sentiment.assess(&submission.text);
        let label = category.classify(&submission.text);
        Ok(self.route(FeedbackItem::new(submission, label, assessment)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::feedback::NgoCapability;
    use crate::workflows::feedback::Priority;
    use crate::workflows::sites::SiteId;

    struct FixedSentiment(f64);

    impl SentimentClassifier for FixedSentiment {
        fn assess(&self, _text: &str) -> SentimentAssessment {
            SentimentAssessment::from_score(self.0)
        }
    }

    struct FixedCategory(FeedbackCategory);

    impl CategoryClassifier for FixedCategory {
        fn classify(&self, _text: &str) -> FeedbackCategory {
            self.0
        }
    }

    fn router() -> FeedbackRouter {
        FeedbackRouter::new(Arc::new(NgoCatalog::new(vec![
            NgoCapability::new("Kenya Health Partners", "Kenya", ["Health"]),
            NgoCapability::new("Ethiopia Clinics", "Ethiopia", ["Health"]),
            NgoCapability::new("Kenya Schools", "Kenya", ["Education"]),
        ])))
    }

    fn submission(text: &str) -> FeedbackSubmission {
        FeedbackSubmission {
            text: text.to_string(),
            site_id: SiteId("kakuma".to_string()),
            country: "Kenya".to_string(),
            food_insecure: false,
        }
    }

    #[test]
    fn negative_healthcare_feedback_reaches_local_health_ngo() {
        let decision = router()
            .route_submission(
                submission("The clinic has no medicine left."),
                &FixedSentiment(-0.4),
                &FixedCategory(FeedbackCategory::Healthcare),
            )
            .expect("route");

        assert_eq!(decision.targets, vec!["Kenya Health Partners".to_string()]);
        assert_eq!(decision.item.priority, Priority::Medium);
        assert!(decision.is_routed());
    }

    #[test]
    fn positive_feedback_is_recorded_without_targets() {
        let decision = router()
            .route_submission(
                submission("The new clinic is wonderful."),
                &FixedSentiment(0.7),
                &FixedCategory(FeedbackCategory::Healthcare),
            )
            .expect("route");

        assert!(decision.targets.is_empty());
        assert_eq!(decision.item.sentiment.label, SentimentLabel::Positive);
    }

    #[test]
    fn no_matching_organisation_is_an_empty_list() {
        let decision = router()
            .route_submission(
                submission("Urgent: the camp is unsafe at night."),
                &FixedSentiment(-0.8),
                &FixedCategory(FeedbackCategory::Safety),
            )
            .expect("route");

        assert!(decision.targets.is_empty());
        assert_eq!(decision.item.priority, Priority::High);
    }

    #[test]
    fn unsafe_camp_reports_reach_refugee_protection_partners() {
        let router = FeedbackRouter::new(Arc::new(NgoCatalog::builtin()));
        let decision = router
            .route_submission(
                submission("The camp is unsafe at night."),
                &FixedSentiment(-0.6),
                &FixedCategory(FeedbackCategory::Safety),
            )
            .expect("route");

        assert_eq!(decision.targets, vec!["UNHCR".to_string()]);
    }

    #[test]
    fn blank_text_is_rejected() {
        let error = router()
            .route_submission(
                submission("   "),
                &FixedSentiment(-0.8),
                &FixedCategory(FeedbackCategory::Safety),
            )
            .expect_err("blank");
        assert_eq!(error, FeedbackError::EmptyText);
    }
}
