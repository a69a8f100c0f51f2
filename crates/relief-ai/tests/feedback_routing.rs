use relief_ai::workflows::feedback::{
    CategoryClassifier, FeedbackCategory, FeedbackSubmission, NgoCapability, NgoCatalog, Priority,
    SentimentAssessment, SentimentClassifier, SentimentLabel,
};
use relief_ai::workflows::matching::{builtin_reference_population, MatchOptions, ServiceCatalog};
use relief_ai::workflows::notifications::{
    dispatch_all, AlertKind, DispatchError, NotificationAlert, NotificationDispatcher,
};
use relief_ai::workflows::sites::SiteId;
use relief_ai::PipelineContext;
use std::sync::Mutex;

/// Scores by counting a handful of complaint words.
struct ComplaintWords;

impl SentimentClassifier for ComplaintWords {
    fn assess(&self, text: &str) -> SentimentAssessment {
        let lowered = text.to_lowercase();
        let hits = ["no ", "not", "never", "broken"]
            .iter()
            .filter(|word| lowered.contains(*word))
            .count();
        let score = if hits == 0 { 0.4 } else { -0.3 * hits as f64 };
        SentimentAssessment::from_score(score.max(-1.0))
    }
}

struct FirstMention;

impl CategoryClassifier for FirstMention {
    fn classify(&self, text: &str) -> FeedbackCategory {
        let lowered = text.to_lowercase();
        if lowered.contains("food") || lowered.contains("ration") {
            FeedbackCategory::Nutrition
        } else if lowered.contains("clinic") || lowered.contains("medicine") {
            FeedbackCategory::Healthcare
        } else {
            FeedbackCategory::Safety
        }
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<NotificationAlert>>,
}

impl NotificationDispatcher for Outbox {
    fn dispatch(&self, alert: NotificationAlert) -> Result<(), DispatchError> {
        self.sent
            .lock()
            .map_err(|_| DispatchError::Transport("outbox poisoned".to_string()))?
            .push(alert);
        Ok(())
    }
}

fn context() -> PipelineContext {
    let ngos = NgoCatalog::new(vec![
        NgoCapability::new("Action Against Hunger", "Kenya", ["Food Security"]),
        NgoCapability::new("Kenya Red Cross", "Kenya", ["Humanitarian Aid", "Health"]),
        NgoCapability::new("Amel Association", "Ethiopia", ["Health"]),
    ]);
    PipelineContext::build(
        &builtin_reference_population(),
        ServiceCatalog::builtin(),
        ngos,
        MatchOptions::default(),
    )
    .expect("context")
}

fn submission(text: &str, country: &str, food_insecure: bool) -> FeedbackSubmission {
    FeedbackSubmission {
        text: text.to_string(),
        site_id: SiteId("kakuma".to_string()),
        country: country.to_string(),
        food_insecure,
    }
}

#[test]
fn negative_feedback_reaches_matching_organisations_and_dispatcher() {
    let context = context();
    let outbox = Outbox::default();

    let decisions = vec![
        context
            .route_feedback(
                submission("Food rations have not arrived and there is no flour.", "Kenya", true),
                &ComplaintWords,
                &FirstMention,
            )
            .expect("route"),
        context
            .route_feedback(
                submission("The clinic staff were kind and helpful.", "Kenya", false),
                &ComplaintWords,
                &FirstMention,
            )
            .expect("route"),
    ];

    let nutrition = &decisions[0];
    assert_eq!(nutrition.item.category, FeedbackCategory::Nutrition);
    assert_eq!(nutrition.item.sentiment.label, SentimentLabel::Negative);
    assert_eq!(nutrition.item.priority, Priority::High);
    assert_eq!(
        nutrition.targets,
        vec!["Action Against Hunger".to_string(), "Kenya Red Cross".to_string()]
    );

    let praise = &decisions[1];
    assert_eq!(praise.item.sentiment.label, SentimentLabel::Positive);
    assert!(!praise.is_routed());

    let alerts = decisions.iter().filter_map(NotificationAlert::negative_feedback);
    assert_eq!(dispatch_all(&outbox, alerts), 1);
    let sent = outbox.sent.lock().expect("outbox");
    assert_eq!(sent[0].kind, AlertKind::NegativeFeedback);
    assert_eq!(sent[0].fields["priority"], "High");
}

#[test]
fn country_without_matching_organisations_routes_nowhere() {
    let decision = context()
        .route_feedback(
            submission("The clinic never has medicine.", "Uganda", false),
            &ComplaintWords,
            &FirstMention,
        )
        .expect("route");

    assert_eq!(decision.item.sentiment.label, SentimentLabel::Negative);
    assert!(decision.targets.is_empty());
    assert!(NotificationAlert::negative_feedback(&decision).is_none());
}
