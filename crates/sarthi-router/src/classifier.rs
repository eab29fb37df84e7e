// SPDX-FileCopyrightText: 2026 Sarthi Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexical query classification.
//!
//! Labels student messages as time-sensitive, app-data or general using
//! curated keyword sets. No LLM pre-call, no network, no latency.

use std::collections::BTreeSet;

use sarthi_core::types::{QueryClassification, QueryType};

/// Dates, deadlines, exam results and schedules.
const TIME_SENSITIVE: &[&str] = &[
    "today", "tonight", "tomorrow", "yesterday", "this week", "next week",
    "deadline", "due date", "last date", "exam date", "exam result",
    "result", "results", "schedule", "timetable", "time table", "admit card",
    "cutoff", "cut off", "announced", "notification", "registration",
];

/// First-person markers that make a data noun personal.
const PERSONAL_MARKERS: &[&str] = &["my", "mine", "i am", "i'm", "im", "me", "i have", "i've"];

/// Nouns backed by the app's own study data.
const PERSONAL_NOUNS: &[&str] = &[
    "progress", "score", "scores", "points", "streak", "rank", "ranking",
    "badge", "badges", "level", "notes", "goals", "goal", "marks",
    "performance", "stats", "study time", "study hours", "xp", "achievements",
    "leaderboard", "weak topics", "quiz history",
];

/// Terms that suggest fresh information is needed for a general question.
const RECENCY: &[&str] = &[
    "latest", "current", "currently", "news", "recent", "recently", "new",
    "update", "updates", "this year", "trending", "now",
];

/// Confidence reaches 1.0 at this many matched keywords.
const FULL_CONFIDENCE_MATCHES: f32 = 3.0;

/// Deterministic keyword classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a message.
    ///
    /// Precedence is time-sensitive, then app-data, then general. Empty text is
    /// `general` with zero confidence.
    pub fn classify(&self, text: &str) -> QueryClassification {
        let padded = format!(" {} ", normalize(text));
        if padded.trim().is_empty() {
            return QueryClassification {
                query_type: QueryType::General,
                confidence: 0.0,
                matched_keywords: BTreeSet::new(),
                recommend_augmentation: false,
            };
        }

        let time = matches(&padded, TIME_SENSITIVE);
        if !time.is_empty() {
            return classification(QueryType::TimeSensitive, time, true);
        }

        let markers = matches(&padded, PERSONAL_MARKERS);
        let nouns = matches(&padded, PERSONAL_NOUNS);
        if !markers.is_empty() && !nouns.is_empty() {
            let matched = markers.into_iter().chain(nouns).collect();
            return classification(QueryType::AppData, matched, false);
        }

        let recency = matches(&padded, RECENCY);
        let augment = !recency.is_empty();
        classification(QueryType::General, recency, augment)
    }
}

fn classification(
    query_type: QueryType,
    matched_keywords: BTreeSet<String>,
    recommend_augmentation: bool,
) -> QueryClassification {
    let confidence = (matched_keywords.len() as f32 / FULL_CONFIDENCE_MATCHES).min(1.0);
    QueryClassification {
        query_type,
        confidence,
        matched_keywords,
        recommend_augmentation,
    }
}

/// Whole-word (or whole-phrase) matches against space-padded text.
fn matches(padded: &str, keywords: &[&str]) -> BTreeSet<String> {
    keywords
        .iter()
        .filter(|kw| padded.contains(&format!(" {kw} ")))
        .map(|kw| kw.to_string())
        .collect()
}

/// Lower-case, replace punctuation with spaces, collapse whitespace.
/// Apostrophes survive so contractions such as "i'm" still match.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> QueryClassification {
        QueryClassifier::new().classify(text)
    }

    #[test]
    fn exam_schedule_is_time_sensitive() {
        let c = classify("When is the exam date for physics? Is the timetable out?");
        assert_eq!(c.query_type, QueryType::TimeSensitive);
        assert!(c.recommend_augmentation);
        assert!(c.matched_keywords.contains("exam date"));
        assert!(c.matched_keywords.contains("timetable"));
    }

    #[test]
    fn personal_progress_is_app_data() {
        let c = classify("What's my streak and how many points do I have?");
        assert_eq!(c.query_type, QueryType::AppData);
        assert!(!c.recommend_augmentation);
        assert!(c.matched_keywords.contains("my"));
        assert!(c.matched_keywords.contains("streak"));
        assert!(c.matched_keywords.contains("points"));
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn data_noun_without_marker_is_general() {
        let c = classify("how is a cricket score calculated");
        assert_eq!(c.query_type, QueryType::General);
        assert!(c.matched_keywords.is_empty());
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn time_sensitive_beats_app_data() {
        let c = classify("is my result out today");
        assert_eq!(c.query_type, QueryType::TimeSensitive);
    }

    #[test]
    fn general_with_recency_recommends_augmentation() {
        let c = classify("What is the latest news on Chandrayaan?");
        assert_eq!(c.query_type, QueryType::General);
        assert!(c.recommend_augmentation);
        assert!((c.confidence - 2.0 / 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn plain_general_question() {
        let c = classify("Explain photosynthesis in simple words");
        assert_eq!(c.query_type, QueryType::General);
        assert!(!c.recommend_augmentation);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        // "schedule" must not match inside "rescheduled"; "now" not inside "know".
        let c = classify("I know the class was rescheduled");
        assert_eq!(c.query_type, QueryType::General);
        assert!(!c.recommend_augmentation);
    }

    #[test]
    fn punctuation_and_case_are_ignored() {
        let a = classify("DEADLINE???");
        let b = classify("deadline");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_is_general_with_zero_confidence() {
        for text in ["", "   ", "?!"] {
            let c = classify(text);
            assert_eq!(c.query_type, QueryType::General);
            assert_eq!(c.confidence, 0.0);
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let text = "my rank on the leaderboard this week";
        assert_eq!(classify(text), classify(text));
    }
}
