//! Most-common-treatment aggregation and the per-patient directory.

use super::types::{PatientOverview, TreatmentReport, TreatmentSummary};
use crate::index::NoteChunk;
use std::collections::{HashMap, HashSet};

/// Compute the most frequent treatment, counting each patient at most once.
///
/// A patient contributes the treatment of their first chunk carrying a non-empty one. When two
/// treatments tie, the one collected first wins; callers should not rely on that order.
pub fn most_common_treatment(chunks: &[NoteChunk]) -> TreatmentReport {
    let mut seen = HashSet::new();
    let mut treatments: Vec<&str> = Vec::new();

    for metadata in chunks.iter().filter_map(|chunk| chunk.metadata.as_ref()) {
        if !metadata.treatment.is_empty() && seen.insert(metadata.patient_id.as_str()) {
            treatments.push(metadata.treatment.as_str());
        }
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for treatment in treatments.iter().copied() {
        *counts.entry(treatment).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for treatment in treatments.iter().copied() {
        let frequency = counts[treatment];
        if best.is_none_or(|(_, top)| frequency > top) {
            best = Some((treatment, frequency));
        }
    }

    match best {
        Some((treatment, frequency)) => TreatmentReport::Summary(TreatmentSummary {
            most_common_treatment: treatment.to_string(),
            frequency,
            total_analyzed: treatments.len(),
        }),
        None => TreatmentReport::no_treatments(),
    }
}

/// List every distinct, non-empty patient id with the metadata of its first chunk.
pub fn list_patients(chunks: &[NoteChunk]) -> Vec<PatientOverview> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter_map(|chunk| chunk.metadata.as_ref())
        .filter(|metadata| !metadata.patient_id.is_empty())
        .filter(|metadata| seen.insert(metadata.patient_id.as_str()))
        .map(|metadata| PatientOverview {
            patient_id: metadata.patient_id.clone(),
            name: metadata.name.clone(),
            diagnosis: metadata.diagnosis.clone(),
            treatment: metadata.treatment.clone(),
        })
        .collect()
}
