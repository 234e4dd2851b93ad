use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::document::{Document, DocumentId};

/// Per-criterion contribution to a total score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub criterion: String,
    pub raw: f64,
    pub weight: f64,
    pub weighted: f64,
}

/// How a document's tags relate to the target tags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagAffinityReport {
    /// Target tags the document carries directly.
    pub matched: Vec<String>,
    /// Target tags reachable through the compatibility matrix.
    pub compatible: Vec<String>,
    /// Target tags with no direct or compatible counterpart.
    pub incompatible: Vec<String>,
    /// Unweighted match ratio.
    pub raw_affinity: f64,
    /// Weight-normalized affinity. A perfect match is 1.0 regardless of the
    /// individual tag weights.
    pub weighted_affinity: f64,
}

/// The scorer's verdict on one document. Every subscore and the total are
/// in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub category: f64,
    pub tag: f64,
    pub priority: f64,
    pub dependency: f64,
    pub contextual: f64,
    pub total: f64,
    /// Metadata completeness in [0, 1]; sparse documents score low here no
    /// matter how well they match.
    pub confidence: f64,
    pub breakdown: Vec<BreakdownEntry>,
    pub tag_affinity: TagAffinityReport,
}

/// Aggregate score statistics over the selected set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoringStats {
    pub mean_total: f64,
    pub min_total: f64,
    pub max_total: f64,
    pub mean_confidence: f64,
}

impl ScoringStats {
    pub fn from_scores(scores: &[&ScoringResult]) -> Self {
        if scores.is_empty() {
            return ScoringStats::default();
        }
        let n = scores.len() as f64;
        ScoringStats {
            mean_total: scores.iter().map(|s| s.total).sum::<f64>() / n,
            min_total: scores.iter().map(|s| s.total).fold(f64::INFINITY, f64::min),
            max_total: scores.iter().map(|s| s.total).fold(0.0, f64::max),
            mean_confidence: scores.iter().map(|s| s.confidence).sum::<f64>() / n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    /// Selected size / hard cap, in [0, 1]. Zero when the cap is zero.
    pub space_utilization: f64,
    /// Blended score of relevance, utilization, diversity, and balance.
    pub quality_score: f64,
    /// Category spread of the selection, in [0, 1].
    pub diversity_score: f64,
    /// Evenness of the category distribution, in [0, 1].
    pub balance_score: f64,
}

/// Distributions over the selected documents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageAnalysis {
    pub categories: BTreeMap<String, usize>,
    pub tags: BTreeMap<String, usize>,
    pub audiences: BTreeMap<String, usize>,
    pub complexity: BTreeMap<String, usize>,
}

/// A required prerequisite that resolution left unsatisfiable, e.g. because
/// conflict handling excluded the prerequisite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsatisfiedDependency {
    pub document: DocumentId,
    pub missing_prerequisite: DocumentId,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DependencySummary {
    pub resolved_count: usize,
    /// Documents pulled in purely because something required them.
    pub included_dependency_count: usize,
    pub cycle_count: usize,
    pub missing_reference_count: usize,
    pub unsatisfied: Vec<UnsatisfiedDependency>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub resolved: usize,
    pub remaining: usize,
    /// Pairs left for manual review.
    pub flagged: Vec<(DocumentId, DocumentId)>,
}

/// Informational run metadata. `started_at` is wall-clock and excluded from
/// determinism comparisons; `fingerprint` is the deterministic identity of
/// the selected set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
    pub algorithms_used: Vec<String>,
    pub iterations: usize,
    pub convergence_achieved: bool,
    pub fingerprint: String,
}

/// The final product of one selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: Vec<Document>,
    pub strategy: String,
    pub scores: ScoringStats,
    pub optimization: OptimizationMetrics,
    pub coverage: CoverageAnalysis,
    pub dependencies: DependencySummary,
    pub conflicts: ConflictSummary,
    pub run: RunMetadata,
}

impl SelectionResult {
    pub fn total_size(&self) -> usize {
        self.selected.iter().map(|d| d.size).sum()
    }

    pub fn selected_ids(&self) -> Vec<&DocumentId> {
        self.selected.iter().map(|d| &d.id).collect()
    }
}

/// Deterministic identity of a selected set: sha256 over sorted
/// `id:size` lines. Identical selections always hash identically.
pub fn selection_fingerprint(selected: &[Document]) -> String {
    let mut lines: Vec<String> = selected
        .iter()
        .map(|d| format!("{}:{}", d.id.as_str(), d.size))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
