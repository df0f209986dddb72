//! Feedback records and sentiment inference.
//!
//! Feedback arrives as partial events (a like, a copy, a regenerate) that are
//! overlaid onto the record already attached to an assistant message. The
//! inferred sentiment is recomputed from the flags on every merge.

use serde::{Deserialize, Serialize};

/// Sentiment derived from a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    WeakNegative,
    #[default]
    Neutral,
}

/// Feedback attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackRecord {
    pub liked: bool,
    pub disliked: bool,
    /// The caller discarded this response and asked again.
    pub regenerated: bool,
    pub copied_response: bool,
    pub text_feedback: Option<String>,
    pub inferred_sentiment: Sentiment,
}

impl FeedbackRecord {
    /// Sentiment by fixed precedence, first match wins.
    pub fn infer_sentiment(&self) -> Sentiment {
        if self.liked {
            Sentiment::Positive
        } else if self.disliked {
            Sentiment::Negative
        } else if self.regenerated {
            Sentiment::WeakNegative
        } else if self.copied_response {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }
}

/// A partial feedback event. Absent fields leave the record untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackUpdate {
    pub liked: Option<bool>,
    pub disliked: Option<bool>,
    pub regenerated: Option<bool>,
    #[serde(alias = "copied_response")]
    pub copied_response: Option<bool>,
    #[serde(alias = "text_feedback")]
    pub text_feedback: Option<String>,
}

impl FeedbackUpdate {
    pub fn liked() -> Self {
        Self {
            liked: Some(true),
            ..Self::default()
        }
    }

    pub fn disliked(text_feedback: Option<String>) -> Self {
        Self {
            disliked: Some(true),
            text_feedback,
            ..Self::default()
        }
    }

    pub fn regenerated() -> Self {
        Self {
            regenerated: Some(true),
            ..Self::default()
        }
    }

    pub fn copied() -> Self {
        Self {
            copied_response: Some(true),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Overlays `update` onto `existing` (or the default record) and recomputes
/// the inferred sentiment.
pub fn merge(existing: Option<&FeedbackRecord>, update: &FeedbackUpdate) -> FeedbackRecord {
    let mut record = existing.cloned().unwrap_or_default();

    if let Some(liked) = update.liked {
        record.liked = liked;
    }
    if let Some(disliked) = update.disliked {
        record.disliked = disliked;
    }
    if let Some(regenerated) = update.regenerated {
        record.regenerated = regenerated;
    }
    if let Some(copied) = update.copied_response {
        record.copied_response = copied;
    }
    if let Some(text) = &update.text_feedback {
        record.text_feedback = Some(text.clone());
    }

    record.inferred_sentiment = record.infer_sentiment();
    record
}

/// Which primary signals flipped from false to true in one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedbackTransition {
    pub became_liked: bool,
    pub became_disliked: bool,
}

impl FeedbackTransition {
    pub fn between(before: Option<&FeedbackRecord>, after: &FeedbackRecord) -> Self {
        let was_liked = before.is_some_and(|r| r.liked);
        let was_disliked = before.is_some_and(|r| r.disliked);
        Self {
            became_liked: after.liked && !was_liked,
            became_disliked: after.disliked && !was_disliked,
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.became_liked && !self.became_disliked
    }
}
