//! Standalone conflict analysis, usable without full dependency resolution.
//!
//! Four sources feed the analysis: conflicts declared in document relations
//! (always on), tag incompatibility through the shared compatibility matrix,
//! a content-duplication heuristic over normalized titles, and audience
//! mismatch within a category. Findings below the severity threshold are
//! dropped before reporting.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompatibilityMatrix;
use crate::graph::higher_priority_side;
use crate::types::{Document, DocumentId, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDetectorOptions {
    pub enable_tag_incompatibility: bool,
    pub enable_content_duplication: bool,
    pub enable_audience_mismatch: bool,
    /// Findings strictly below this severity are discarded.
    pub severity_threshold: Severity,
    /// When set, the result carries the exclusion outcome as well.
    pub auto_resolve: bool,
}

impl Default for ConflictDetectorOptions {
    fn default() -> Self {
        ConflictDetectorOptions {
            enable_tag_incompatibility: true,
            enable_content_duplication: true,
            enable_audience_mismatch: true,
            severity_threshold: Severity::Minor,
            auto_resolve: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    Declared,
    TagIncompatibility,
    ContentDuplication,
    AudienceMismatch,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::Declared => "declared",
            ConflictKind::TagIncompatibility => "tag-incompatibility",
            ConflictKind::ContentDuplication => "content-duplication",
            ConflictKind::AudienceMismatch => "audience-mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedConflict {
    pub kind: ConflictKind,
    /// Undirected pair, stored with the smaller id first.
    pub documents: (DocumentId, DocumentId),
    pub severity: Severity,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConflictAnalysisResult {
    pub conflicts: Vec<DetectedConflict>,
    pub counts_by_kind: BTreeMap<String, usize>,
    /// Present only when `auto_resolve` was requested.
    pub resolution: Option<ConflictResolutionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConflictResolutionOutcome {
    pub resolved_documents: Vec<Document>,
    pub excluded_documents: Vec<DocumentId>,
    /// Pairs that could not be settled (priority ties).
    pub unresolved: Vec<DetectedConflict>,
}

pub struct ConflictDetector {
    matrix: CompatibilityMatrix,
}

impl ConflictDetector {
    pub fn new(matrix: CompatibilityMatrix) -> Self {
        ConflictDetector { matrix }
    }

    pub fn detect_conflicts(
        &self,
        documents: &[Document],
        options: &ConflictDetectorOptions,
    ) -> ConflictAnalysisResult {
        let mut conflicts = Vec::new();

        conflicts.extend(declared_conflicts(documents));
        for (i, a) in documents.iter().enumerate() {
            for b in &documents[i + 1..] {
                if options.enable_tag_incompatibility {
                    conflicts.extend(self.tag_incompatibility(a, b));
                }
                if options.enable_content_duplication {
                    conflicts.extend(content_duplication(a, b));
                }
                if options.enable_audience_mismatch {
                    conflicts.extend(audience_mismatch(a, b));
                }
            }
        }

        conflicts.retain(|c| c.severity >= options.severity_threshold);
        conflicts.sort_by(|x, y| {
            x.documents
                .cmp(&y.documents)
                .then_with(|| x.kind.cmp(&y.kind))
        });
        conflicts.dedup_by(|x, y| x.documents == y.documents && x.kind == y.kind);

        let mut counts_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for conflict in &conflicts {
            *counts_by_kind
                .entry(conflict.kind.as_str().to_string())
                .or_default() += 1;
        }
        debug!(total = conflicts.len(), "conflict analysis finished");

        let resolution = options
            .auto_resolve
            .then(|| apply_conflict_resolutions(documents, &conflicts));

        ConflictAnalysisResult {
            conflicts,
            counts_by_kind,
            resolution,
        }
    }

    /// Two documents clash when each carries a configured primary tag and
    /// the pair is not whitelisted in the matrix. Unconfigured tags carry no
    /// signal either way.
    fn tag_incompatibility(&self, a: &Document, b: &Document) -> Option<DetectedConflict> {
        for tag_a in &a.tags_primary {
            if !self.matrix.is_configured(tag_a) {
                continue;
            }
            for tag_b in &b.tags_primary {
                if !self.matrix.is_configured(tag_b) {
                    continue;
                }
                if !self.matrix.is_compatible(tag_a, tag_b) {
                    return Some(DetectedConflict {
                        kind: ConflictKind::TagIncompatibility,
                        documents: ordered_pair(&a.id, &b.id),
                        severity: Severity::Moderate,
                        reason: format!("incompatible tags '{tag_a}' and '{tag_b}'"),
                    });
                }
            }
        }
        None
    }
}

fn declared_conflicts(documents: &[Document]) -> Vec<DetectedConflict> {
    let pool: BTreeSet<&DocumentId> = documents.iter().map(|d| &d.id).collect();
    let mut found = Vec::new();
    for doc in documents {
        for conflict in &doc.relations.conflicts {
            if conflict.document_id.is_empty()
                || conflict.document_id == doc.id
                || !pool.contains(&conflict.document_id)
            {
                continue;
            }
            found.push(DetectedConflict {
                kind: ConflictKind::Declared,
                documents: ordered_pair(&doc.id, &conflict.document_id),
                severity: conflict.severity,
                reason: conflict
                    .reason
                    .clone()
                    .unwrap_or_else(|| "declared conflict".to_string()),
            });
        }
    }
    found
}

/// Duplication heuristic: near-identical normalized titles, or the same
/// category plus identical primary-tag signature with substantial title
/// overlap.
fn content_duplication(a: &Document, b: &Document) -> Option<DetectedConflict> {
    let overlap = title_overlap(&a.title, &b.title);
    if overlap >= 0.8 {
        return Some(DetectedConflict {
            kind: ConflictKind::ContentDuplication,
            documents: ordered_pair(&a.id, &b.id),
            severity: Severity::Major,
            reason: format!("near-identical titles (overlap {overlap:.2})"),
        });
    }
    if a.category == b.category
        && !a.tags_primary.is_empty()
        && a.tags_primary == b.tags_primary
        && overlap >= 0.5
    {
        return Some(DetectedConflict {
            kind: ConflictKind::ContentDuplication,
            documents: ordered_pair(&a.id, &b.id),
            severity: Severity::Moderate,
            reason: "same category and tag signature with overlapping titles".to_string(),
        });
    }
    None
}

/// Disjoint declared audiences in the same category suggest the pair serves
/// different readers and should not be bundled.
fn audience_mismatch(a: &Document, b: &Document) -> Option<DetectedConflict> {
    if a.category != b.category || a.audience.is_empty() || b.audience.is_empty() {
        return None;
    }
    let disjoint = a.audience.intersection(&b.audience).next().is_none();
    disjoint.then(|| DetectedConflict {
        kind: ConflictKind::AudienceMismatch,
        documents: ordered_pair(&a.id, &b.id),
        severity: Severity::Minor,
        reason: "disjoint audiences within the same category".to_string(),
    })
}

/// Jaccard overlap of lowercase title tokens.
fn title_overlap(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> BTreeSet<String> {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    intersection / union
}

/// Mirrors the resolver's exclusion policy for callers that only need
/// conflict handling: the lower-priority side of each pair is dropped,
/// exact ties stay unresolved.
pub fn apply_conflict_resolutions(
    documents: &[Document],
    conflicts: &[DetectedConflict],
) -> ConflictResolutionOutcome {
    let by_id: BTreeMap<&DocumentId, &Document> = documents.iter().map(|d| (&d.id, d)).collect();
    let mut excluded: BTreeSet<DocumentId> = BTreeSet::new();
    let mut unresolved = Vec::new();

    for conflict in conflicts {
        let (first, second) = &conflict.documents;
        // A side already excluded settles the pair.
        if excluded.contains(first) || excluded.contains(second) {
            continue;
        }
        let (Some(a), Some(b)) = (by_id.get(first), by_id.get(second)) else {
            continue;
        };
        if a.priority_score == b.priority_score && a.priority_tier == b.priority_tier {
            unresolved.push(conflict.clone());
            continue;
        }
        let (_kept, dropped) = higher_priority_side(a, b);
        excluded.insert(dropped.id.clone());
    }

    let resolved_documents = documents
        .iter()
        .filter(|d| !excluded.contains(&d.id))
        .cloned()
        .collect();

    ConflictResolutionOutcome {
        resolved_documents,
        excluded_documents: excluded.into_iter().collect(),
        unresolved,
    }
}

fn ordered_pair(a: &DocumentId, b: &DocumentId) -> (DocumentId, DocumentId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
