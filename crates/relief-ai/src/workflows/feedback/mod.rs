//! Feedback routing: classified complaints to the organisations able to act on them.

mod domain;
mod ngo;
mod router;

pub use domain::{
    FeedbackCategory, FeedbackItem, FeedbackSubmission, Priority, SentimentAssessment,
    SentimentLabel, UnknownFeedbackCategory, NEGATIVE_SENTIMENT_BELOW, POSITIVE_SENTIMENT_ABOVE,
    STRONGLY_NEGATIVE_BELOW, URGENCY_KEYWORD,
};
pub use ngo::{NgoCapability, NgoCatalog};
pub use router::{
    CategoryClassifier, FeedbackError, FeedbackRouter, RoutingDecision, SentimentClassifier,
};
