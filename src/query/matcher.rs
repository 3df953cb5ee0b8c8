//! Diagnosis matching over a full scan of the stored chunks.

use super::types::DiagnosisMatch;
use crate::index::NoteChunk;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading an extra synonym table.
#[derive(Debug, Error)]
pub enum SynonymError {
    /// The synonym file could not be read.
    #[error("Failed to read synonym file {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The synonym file is not a JSON object of string arrays.
    #[error("Invalid synonym file {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Lookup table from a canonical diagnosis term to alias substrings searched in the full note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "headache".to_string(),
            vec!["headache".into(), "migraine".into(), "cephalgia".into()],
        );
        entries.insert(
            "diabetes".to_string(),
            vec!["diabetes".into(), "diabetic".into(), "blood glucose".into()],
        );
        Self { entries }
    }
}

impl SynonymTable {
    /// Add aliases for a canonical term. Terms and aliases are lower-cased; existing aliases
    /// are kept.
    pub fn extend_term<I, S>(&mut self, canonical: &str, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self
            .entries
            .entry(canonical.trim().to_lowercase())
            .or_default();
        for alias in aliases {
            let alias = alias.as_ref().trim().to_lowercase();
            if !alias.is_empty() && !entry.contains(&alias) {
                entry.push(alias);
            }
        }
    }

    /// Load the default table merged with a JSON object `{"term": ["alias", ...]}`.
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self, SynonymError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| SynonymError::Io {
            path: shown.clone(),
            source,
        })?;
        let extra: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&raw).map_err(|source| SynonymError::Parse {
                path: shown.clone(),
                source,
            })?;

        let mut table = Self::default();
        for (canonical, aliases) in extra {
            table.extend_term(&canonical, aliases);
        }
        tracing::info!(path = %shown, terms = table.entries.len(), "Loaded diagnosis synonyms");
        Ok(table)
    }

    /// Whether `term` has an entry and one of its aliases occurs in `text`.
    pub fn matches(&self, term: &str, text: &str) -> bool {
        self.entries
            .get(term)
            .is_some_and(|aliases| aliases.iter().any(|alias| text.contains(alias.as_str())))
    }
}

/// Return the first-seen record of every patient whose diagnosis, full note, or synonym aliases
/// contain `diagnosis`.
///
/// Matching is case-insensitive substring search, so negated mentions ("no signs of diabetes")
/// match as well. Chunks without metadata are skipped; later chunks of an already-matched
/// patient are ignored. Results keep scan order and are not capped.
pub fn find_by_diagnosis(
    chunks: &[NoteChunk],
    diagnosis: &str,
    synonyms: &SynonymTable,
) -> Vec<DiagnosisMatch> {
    let term = diagnosis.trim().to_lowercase();

    let (_, matches) = chunks.iter().fold(
        (HashSet::new(), Vec::new()),
        |(mut seen, mut matches): (HashSet<&str>, Vec<DiagnosisMatch>), chunk| {
            let Some(metadata) = chunk.metadata.as_ref() else {
                return (seen, matches);
            };
            if seen.contains(metadata.patient_id.as_str()) {
                return (seen, matches);
            }

            let doc_diag = metadata.diagnosis.to_lowercase();
            let full_note = chunk.full_note().to_lowercase();
            let is_match = doc_diag.contains(&term)
                || full_note.contains(&term)
                || synonyms.matches(&term, &full_note);

            if is_match {
                seen.insert(metadata.patient_id.as_str());
                matches.push(DiagnosisMatch {
                    patient_id: metadata.patient_id.clone(),
                    name: metadata.name.clone(),
                    age: metadata.age.clone(),
                    diagnosis: metadata.diagnosis.clone(),
                    note: chunk.full_note().to_string(),
                });
            }
            (seen, matches)
        },
    );

    matches
}
