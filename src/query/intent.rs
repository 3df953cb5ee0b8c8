//! Free-text intent classification and diagnosis term extraction.
//!
//! The rules here are plain substring and regex tests. Their order and content define the
//! behaviour callers rely on, so they are kept as ordered tables.

use regex::Regex;
use std::sync::LazyLock;

/// Classified purpose of a free-text question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Find patients with a given diagnosis.
    WhichPatients,
    /// Report the most frequently prescribed treatment.
    MostCommonTreatment,
    /// Fall back to embedding similarity search.
    SemanticSearch,
}

impl Intent {
    /// Wire name of the intent.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WhichPatients => "which_patients",
            Self::MostCommonTreatment => "most_common_treatment",
            Self::SemanticSearch => "semantic_search",
        }
    }
}

/// Phrases marking a diagnosis lookup.
const DIAGNOSIS_PHRASES: [&str; 5] = [
    "which patients",
    "who has",
    "who have",
    "patients with",
    "diagnosed with",
];

/// Fallback terms searched when no extraction rule matches, in priority order.
const MEDICAL_TERMS: [&str; 13] = [
    "pneumonia",
    "diabetes",
    "hypertension",
    "copd",
    "appendicitis",
    "myocardial infarction",
    "alzheimer",
    "endometriosis",
    "osteoarthritis",
    "anxiety",
    "depression",
    "migraine",
    "headache",
];

struct ExtractionRule {
    pattern: Regex,
    transform: fn(&str) -> String,
}

static ARTICLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(the|a|an)\b").expect("article pattern"));

static EXTRACTION_RULES: LazyLock<Vec<ExtractionRule>> = LazyLock::new(|| {
    [
        r"which patients.*?(?:have|had|with)\s+([^?]+)",
        r"patients.*?(?:diagnosed with|have|had)\s+([^?]+)",
        r"who.*?(?:has|have|had)\s+([^?]+)",
    ]
    .into_iter()
    .map(|pattern| ExtractionRule {
        pattern: Regex::new(pattern).expect("extraction pattern"),
        transform: strip_articles,
    })
    .collect()
});

fn strip_articles(capture: &str) -> String {
    ARTICLES.replace_all(capture.trim(), "").trim().to_string()
}

/// Classify a question. Matching is case-insensitive; the diagnosis test wins over the
/// treatment test, and anything else is a semantic search.
pub fn classify(query: &str) -> Intent {
    let lowered = query.trim().to_lowercase();
    if DIAGNOSIS_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        Intent::WhichPatients
    } else if lowered.contains("most") && lowered.contains("treatment") {
        Intent::MostCommonTreatment
    } else {
        Intent::SemanticSearch
    }
}

/// Extract a diagnosis term from a question.
///
/// The first extraction rule whose pattern matches decides the result, even when its
/// transformed capture is empty. Only when no rule matches is the fallback term list scanned.
/// Returns `None` when nothing usable was found.
pub fn extract_diagnosis(query: &str) -> Option<String> {
    let lowered = query.to_lowercase();

    let extracted = EXTRACTION_RULES
        .iter()
        .find_map(|rule| {
            rule.pattern
                .captures(&lowered)
                .and_then(|captures| captures.get(1))
                .map(|capture| (rule.transform)(capture.as_str()))
        })
        .or_else(|| {
            MEDICAL_TERMS
                .iter()
                .find(|term| lowered.contains(*term))
                .map(|term| (*term).to_string())
        })?;

    (!extracted.is_empty()).then_some(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_the_three_intents() {
        assert_eq!(classify("Which patients have pneumonia?"), Intent::WhichPatients);
        assert_eq!(
            classify("What is the most common treatment?"),
            Intent::MostCommonTreatment
        );
        assert_eq!(
            classify("Tell me about chest pain management"),
            Intent::SemanticSearch
        );
    }

    #[test]
    fn diagnosis_phrases_take_priority_over_treatment() {
        assert_eq!(
            classify("Who has the most intensive treatment?"),
            Intent::WhichPatients
        );
        assert_eq!(classify("MOST TREATMENT"), Intent::MostCommonTreatment);
        assert_eq!(classify("treatment for most"), Intent::MostCommonTreatment);
        assert_eq!(classify("common treatment"), Intent::SemanticSearch);
    }

    #[test]
    fn intent_wire_names() {
        assert_eq!(Intent::WhichPatients.as_str(), "which_patients");
        assert_eq!(Intent::MostCommonTreatment.as_str(), "most_common_treatment");
        assert_eq!(Intent::SemanticSearch.as_str(), "semantic_search");
    }

    #[test]
    fn extracts_with_each_rule() {
        assert_eq!(
            extract_diagnosis("Which patients have pneumonia?").as_deref(),
            Some("pneumonia")
        );
        assert_eq!(
            extract_diagnosis("List patients diagnosed with osteoarthritis").as_deref(),
            Some("osteoarthritis")
        );
        assert_eq!(
            extract_diagnosis("Who has a migraine?").as_deref(),
            Some("migraine")
        );
    }

    #[test]
    fn strips_article_words_anywhere_in_the_capture() {
        assert_eq!(
            extract_diagnosis("Which patients had the flu?").as_deref(),
            Some("flu")
        );
        assert_eq!(
            extract_diagnosis("which patients have an anxiety disorder").as_deref(),
            Some("anxiety disorder")
        );
        assert_eq!(
            extract_diagnosis("which patients with depression and anxiety").as_deref(),
            Some("depression and anxiety")
        );
    }

    #[test]
    fn falls_back_to_known_terms() {
        assert_eq!(
            extract_diagnosis("Show me patients with COPD").as_deref(),
            Some("copd")
        );
        assert_eq!(
            extract_diagnosis("any myocardial infarction cases").as_deref(),
            Some("myocardial infarction")
        );
    }

    #[test]
    fn empty_rule_capture_does_not_fall_back() {
        assert_eq!(extract_diagnosis("Which patients have the?"), None);
        assert_eq!(extract_diagnosis("Which patients have?"), None);
    }
}
