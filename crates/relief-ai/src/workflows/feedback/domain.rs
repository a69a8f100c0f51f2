use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::workflows::sites::SiteId;

pub const NEGATIVE_SENTIMENT_BELOW: f64 = -0.1;
pub const POSITIVE_SENTIMENT_ABOVE: f64 = 0.1;
pub const STRONGLY_NEGATIVE_BELOW: f64 = -0.5;
pub const URGENCY_KEYWORD: &str = "urgent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Bucket a compound polarity score in `[-1, 1]`.
    pub fn from_score(score: f64) -> Self {
        if score < NEGATIVE_SENTIMENT_BELOW {
            Self::Negative
        } else if score > POSITIVE_SENTIMENT_ABOVE {
            Self::Positive
        } else {
            Self::Neutral
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of an external sentiment classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentAssessment {
    pub label: SentimentLabel,
    pub score: f64,
}

impl SentimentAssessment {
    pub fn from_score(score: f64) -> Self {
        Self {
            label: SentimentLabel::from_score(score),
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeedbackCategory {
    Nutrition,
    Healthcare,
    Sanitation,
    Shelter,
    Education,
    Safety,
}

impl FeedbackCategory {
    pub const ALL: [FeedbackCategory; 6] = [
        Self::Nutrition,
        Self::Healthcare,
        Self::Sanitation,
        Self::Shelter,
        Self::Education,
        Self::Safety,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Nutrition => "Nutrition",
            Self::Healthcare => "Healthcare",
            Self::Sanitation => "Sanitation",
            Self::Shelter => "Shelter",
            Self::Education => "Education",
            Self::Safety => "Safety",
        }
    }

    /// Focus-area tags of organisations that handle complaints in this category.
    pub const fn focus_tags(self) -> &'static [&'static str] {
        match self {
            Self::Nutrition => &["Food Security", "Nutrition", "Humanitarian Aid"],
            Self::Healthcare => &["Health", "Medical", "Humanitarian Aid"],
            Self::Sanitation => &["Water Sanitation", "Humanitarian Aid"],
            Self::Shelter => &["Shelter", "Housing", "Humanitarian Aid"],
            Self::Education => &["Education", "Youth Development", "Humanitarian Aid"],
            Self::Safety => &["Protection", "Safety", "Humanitarian Aid"],
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feedback category '{0}'")]
pub struct UnknownFeedbackCategory(pub String);

impl FromStr for FeedbackCategory {
    type Err = UnknownFeedbackCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownFeedbackCategory(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
}

impl Priority {
    pub fn assess(text: &str, sentiment_score: f64, food_insecure: bool) -> Self {
        let urgent = text.to_lowercase().contains(URGENCY_KEYWORD);
        if urgent || sentiment_score < STRONGLY_NEGATIVE_BELOW || food_insecure {
            Self::High
        } else {
            Self::Medium
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
        }
    }
}

/// Inbound free-text feedback before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub text: String,
    pub site_id: SiteId,
    pub country: String,
    #[serde(default)]
    pub food_insecure: bool,
}

/// Classified feedback with its derived priority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackItem {
    pub text: String,
    pub site_id: SiteId,
    pub country: String,
    pub category: FeedbackCategory,
    pub sentiment: SentimentAssessment,
    pub food_insecure: bool,
    pub priority: Priority,
}

impl FeedbackItem {
    pub fn new(
        submission: FeedbackSubmission,
        category: FeedbackCategory,
        sentiment: SentimentAssessment,
    ) -> Self {
        let priority = Priority::assess(&submission.text, sentiment.score, submission.food_insecure);
        Self {
            text: submission.text,
            site_id: submission.site_id,
            country: submission.country,
            category,
            sentiment,
            food_insecure: submission.food_insecure,
            priority,
        }
    }
}
