//! Health summary derived from stored reports

use crate::backend::StoredReport;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Words ignored when counting symptom terms
const STOPWORDS: &[&str] = &[
    "i", "have", "has", "had", "the", "and", "but", "or", "with", "without", "a", "an", "am", "is",
    "are", "was", "were", "been", "being", "to", "from", "of", "in", "on", "for", "it", "that",
    "this", "as", "at", "my", "me", "you", "your", "we", "they", "their", "them", "all", "time",
];

/// A term is frequent once it shows up this many times
const FREQUENT_THRESHOLD: usize = 2;

static NON_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z]+").expect("static pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub report_count: usize,
    /// Whole days since the newest report; 0 when there are none
    pub days_since_last_report: i64,
    pub term_counts: BTreeMap<String, usize>,
    /// Terms counted at least twice, alphabetical
    pub frequent_symptoms: Vec<String>,
}

impl HealthSummary {
    pub fn from_reports(reports: &[StoredReport], now: DateTime<Utc>) -> Self {
        let days_since_last_report = reports
            .iter()
            .map(|r| r.date)
            .max()
            .map_or(0, |latest| (now - latest).num_days().max(0));

        let mut term_counts = BTreeMap::new();
        for report in reports {
            for term in symptom_terms(&report.symptoms) {
                *term_counts.entry(term).or_insert(0) += 1;
            }
        }

        let frequent_symptoms = term_counts
            .iter()
            .filter(|(_, count)| **count >= FREQUENT_THRESHOLD)
            .map(|(term, _)| term.clone())
            .collect();

        Self {
            report_count: reports.len(),
            days_since_last_report,
            term_counts,
            frequent_symptoms,
        }
    }
}

/// Lowercased terms longer than two letters that are not stopwords
pub fn symptom_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_LETTERS
        .split(&lowered)
        .filter(|term| term.len() > 2 && !STOPWORDS.contains(term))
        .map(ToString::to_string)
        .collect()
}
