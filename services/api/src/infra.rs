use metrics_exporter_prometheus::PrometheusHandle;
use relief_ai::workflows::feedback::{
    CategoryClassifier, FeedbackCategory, NgoCatalog, SentimentAssessment, SentimentClassifier,
};
use relief_ai::workflows::hazards::{
    parse_feature_collection, EscalationAlert, HazardEvent, UpstreamFeedError,
};
use relief_ai::workflows::matching::ActiveHazard;
use relief_ai::workflows::notifications::{
    DispatchError, NotificationAlert, NotificationDispatcher,
};
use relief_ai::workflows::resources::ForecastSettings;
use relief_ai::config::CatalogConfig;
use relief_ai::error::AppError;
use relief_ai::workflows::sites::{builtin_sites, load_sites, Site};
use relief_ai::PipelineContext;
use reqwest::Client;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the API handlers share, built once at startup.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) pipeline: Arc<PipelineContext>,
    pub(crate) hazards: Arc<LatestHazards>,
    pub(crate) sentiment: Arc<dyn SentimentClassifier>,
    pub(crate) category: Arc<dyn CategoryClassifier>,
    pub(crate) dispatcher: Arc<dyn NotificationDispatcher>,
    pub(crate) forecast: ForecastSettings,
}

/// Most recent actionable escalations. Readers clone the `Arc` and never wait on a poll.
#[derive(Debug, Default)]
pub(crate) struct LatestHazards {
    alerts: RwLock<Arc<Vec<EscalationAlert>>>,
}

impl LatestHazards {
    pub(crate) fn snapshot(&self) -> Arc<Vec<EscalationAlert>> {
        self.alerts
            .read()
            .map(|guard| Arc::clone(&*guard))
            .unwrap_or_else(|poisoned| Arc::clone(&*poisoned.into_inner()))
    }

    /// Replace the set with the latest poll's output; a quiet poll clears it.
    pub(crate) fn publish(&self, alerts: Vec<EscalationAlert>) {
        let mut guard = self
            .alerts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(alerts);
    }

    pub(crate) fn active(&self) -> Vec<ActiveHazard> {
        self.snapshot().iter().map(ActiveHazard::from).collect()
    }
}

/// GDACS event list over HTTP.
#[derive(Clone)]
pub(crate) struct GdacsClient {
    client: Client,
    url: String,
}

impl GdacsClient {
    pub(crate) fn new(url: impl Into<String>) -> Result<Self, UpstreamFeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| UpstreamFeedError::Unreachable(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub(crate) async fn fetch(&self) -> Result<Vec<HazardEvent>, UpstreamFeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| UpstreamFeedError::Unreachable(err.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|err| UpstreamFeedError::Unreachable(err.to_string()))?;
        parse_feature_collection(&body)
    }
}

/// Writes alerts to the log and keeps them for inspection.
#[derive(Default, Clone)]
pub(crate) struct LogDispatcher {
    sent: Arc<Mutex<Vec<NotificationAlert>>>,
}

impl NotificationDispatcher for LogDispatcher {
    fn dispatch(&self, alert: NotificationAlert) -> Result<(), DispatchError> {
        if alert.audience.is_empty() {
            return Err(DispatchError::NoAudience);
        }
        info!(
            kind = alert.kind.label(),
            subject = %alert.subject,
            audience = ?alert.audience,
            "notification dispatched"
        );
        self.sent
            .lock()
            .map_err(|_| DispatchError::Transport("dispatch log poisoned".to_string()))?
            .push(alert);
        Ok(())
    }
}

impl LogDispatcher {
    #[cfg(test)]
    pub(crate) fn sent(&self) -> Vec<NotificationAlert> {
        self.sent.lock().expect("dispatch log poisoned").clone()
    }
}

const POSITIVE_WORDS: &[(&str, f64)] = &[
    ("good", 1.9),
    ("great", 3.1),
    ("helpful", 1.8),
    ("kind", 2.4),
    ("thank", 1.5),
    ("thanks", 1.9),
    ("clean", 1.7),
    ("safe", 1.9),
    ("improved", 2.0),
    ("wonderful", 2.7),
    ("enough", 0.8),
];

const NEGATIVE_WORDS: &[(&str, f64)] = &[
    ("poor", -2.1),
    ("bad", -2.5),
    ("unsafe", -2.3),
    ("unclean", -1.6),
    ("damaged", -2.2),
    ("leaking", -1.5),
    ("insufficient", -1.8),
    ("overcrowded", -1.8),
    ("lack", -1.4),
    ("shortage", -1.8),
    ("sick", -1.9),
    ("hungry", -2.0),
    ("uneven", -1.0),
    ("urgent", -1.3),
    ("dirty", -1.9),
    ("broken", -2.0),
];

const NEGATIONS: &[&str] = &["no", "not", "never", "without", "nobody"];

/// Valence-sum lexicon scorer with simple negation, normalised to `[-1, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LexiconSentiment;

impl SentimentClassifier for LexiconSentiment {
    fn assess(&self, text: &str) -> SentimentAssessment {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|ch: char| !ch.is_alphanumeric() && ch != '\'')
            .filter(|word| !word.is_empty())
            .collect();

        let mut total = 0.0;
        for (index, word) in words.iter().enumerate() {
            let valence = POSITIVE_WORDS
                .iter()
                .chain(NEGATIVE_WORDS)
                .find(|(term, _)| term == word)
                .map(|(_, valence)| *valence);
            let negated = words[index.saturating_sub(3)..index]
                .iter()
                .any(|previous| NEGATIONS.contains(previous));
            match valence {
                Some(valence) if negated => total -= valence * 0.74,
                Some(valence) => total += valence,
                // A bare negation still leans negative ("no doctors available").
                None if NEGATIONS.contains(word) => total -= 1.2,
                None => {}
            }
        }

        let score = total / (total * total + 15.0).sqrt();
        SentimentAssessment::from_score(score)
    }
}

const CATEGORY_KEYWORDS: [(FeedbackCategory, &[&str]); 6] = [
    (
        FeedbackCategory::Nutrition,
        &["food", "ration", "meat", "fruit", "diet", "hungry", "meal", "flour"],
    ),
    (
        FeedbackCategory::Healthcare,
        &["medical", "medicine", "doctor", "clinic", "health", "sick", "nurse"],
    ),
    (
        FeedbackCategory::Sanitation,
        &["toilet", "water", "latrine", "hygiene", "purification", "waste"],
    ),
    (
        FeedbackCategory::Shelter,
        &["tent", "shelter", "roof", "leaking", "housing", "arrivals"],
    ),
    (
        FeedbackCategory::Education,
        &["school", "teacher", "education", "vocational", "training", "books"],
    ),
    (
        FeedbackCategory::Safety,
        &["unsafe", "safety", "lighting", "night", "violence", "theft"],
    ),
];

/// Picks the category with the most keyword hits; ties go to the earlier category and text
/// with no hits is treated as a safety report.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct KeywordCategories;

impl CategoryClassifier for KeywordCategories {
    fn classify(&self, text: &str) -> FeedbackCategory {
        let lowered = text.to_lowercase();
        let mut best = (FeedbackCategory::Safety, 0);
        for (category, keywords) in CATEGORY_KEYWORDS {
            let hits = keywords
                .iter()
                .filter(|keyword| lowered.contains(*keyword))
                .count();
            if hits > best.1 {
                best = (category, hits);
            }
        }
        best.0
    }
}

/// Monitored sites from the configured table, or the built-in survey locations.
pub(crate) fn configured_sites(catalogs: &CatalogConfig) -> Result<Vec<Site>, AppError> {
    match &catalogs.sites {
        Some(path) => Ok(load_sites(std::fs::File::open(path)?)?),
        None => Ok(builtin_sites()),
    }
}

/// Hazard alerts go to every organisation working in the affected site's country.
pub(crate) fn escalation_audience(ngos: &NgoCatalog, alert: &EscalationAlert) -> Vec<String> {
    ngos.organisations()
        .iter()
        .filter(|ngo| ngo.serves(&alert.country))
        .map(|ngo| ngo.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_ai::geo::Coordinates;
    use relief_ai::workflows::feedback::SentimentLabel;
    use relief_ai::workflows::hazards::{AlertLevel, EscalationReason};
    use relief_ai::workflows::sites::SiteId;

    #[test]
    fn lexicon_scores_camp_feedback() {
        let sentiment = LexiconSentiment;
        assert_eq!(
            sentiment.assess("Tents are damaged and leaking.").label,
            SentimentLabel::Negative
        );
        assert_eq!(
            sentiment.assess("No doctors available.").label,
            SentimentLabel::Negative
        );
        assert_eq!(
            sentiment.assess("The staff were kind and helpful, thank you.").label,
            SentimentLabel::Positive
        );
        assert_eq!(
            sentiment.assess("Distribution is on Tuesday.").label,
            SentimentLabel::Neutral
        );
        assert_eq!(
            sentiment.assess("The water is not clean.").label,
            SentimentLabel::Negative
        );
    }

    #[test]
    fn keywords_pick_the_dominant_category() {
        let categories = KeywordCategories;
        assert_eq!(
            categories.classify("We need more food supplies, especially for children."),
            FeedbackCategory::Nutrition
        );
        assert_eq!(
            categories.classify("Toilets are unclean and overcrowded."),
            FeedbackCategory::Sanitation
        );
        assert_eq!(
            categories.classify("Children need more access to schools."),
            FeedbackCategory::Education
        );
        assert_eq!(
            categories.classify("Something happened."),
            FeedbackCategory::Safety
        );
    }

    fn flood_alert() -> EscalationAlert {
        EscalationAlert {
            event_id: "1102983".to_string(),
            event_type: "FL".to_string(),
            alert_level: AlertLevel::Red,
            alert_score: 2.1,
            severity: 3.0,
            country: "Kenya".to_string(),
            from_date: None,
            coordinates: Coordinates::new(-1.29, 36.82),
            site_id: SiteId("KE-NBO".to_string()),
            site_name: "Nairobi".to_string(),
            distance_km: 12.5,
            reason: EscalationReason::FirstSighting,
        }
    }

    #[test]
    fn quiet_poll_clears_active_hazards() {
        let latest = LatestHazards::default();
        assert!(latest.snapshot().is_empty());

        latest.publish(vec![flood_alert()]);
        assert_eq!(
            latest.active(),
            vec![ActiveHazard {
                event_type: "FL".to_string(),
                alert_level: AlertLevel::Red,
            }]
        );

        let before = latest.snapshot();
        latest.publish(Vec::new());
        assert!(latest.active().is_empty());
        assert_eq!(before.len(), 1);
    }
}
