//! Weighted multi-criteria document scoring.
//!
//! The scorer never fails on missing optional metadata: absent signals fall
//! back to documented neutral defaults and lower the result's confidence
//! instead.

pub mod affinity;

pub use affinity::tag_affinity;

use tracing::trace;

use crate::config::CompatibilityMatrix;
use crate::types::{
    BreakdownEntry, Document, ScoringResult, SelectionContext, Strategy, TagAffinityReport,
};

/// Neutral category score when no target category is set.
const CATEGORY_NEUTRAL: f64 = 0.5;
/// Category score when a target exists but the document carries no signal.
const CATEGORY_NO_SIGNAL: f64 = 0.3;
/// Contextual relevance when no hint covers the context type.
const CONTEXTUAL_DEFAULT: f64 = 0.2;
/// Dependency subscore baseline before bonuses and penalties.
const DEPENDENCY_BASE: f64 = 0.5;

pub struct DocumentScorer {
    matrix: CompatibilityMatrix,
}

impl DocumentScorer {
    pub fn new(matrix: CompatibilityMatrix) -> Self {
        DocumentScorer { matrix }
    }

    pub fn matrix(&self) -> &CompatibilityMatrix {
        &self.matrix
    }

    /// Scores one document against the selection context under the given
    /// strategy's criteria weights.
    pub fn score(
        &self,
        document: &Document,
        context: &SelectionContext,
        strategy: &Strategy,
    ) -> ScoringResult {
        let category = self.category_subscore(document, context);
        let tag_report = self.tag_report(document, context);
        let tag = if context.target_tags.is_empty() {
            // No target tags means no tag preference either way.
            0.5
        } else {
            tag_report.weighted_affinity
        };
        let priority = priority_subscore(document);
        let dependency = dependency_subscore(document, context);
        let contextual = contextual_subscore(document, context);

        let weights = &strategy.criteria;
        let weight_sum = weights.sum().max(f64::EPSILON);

        let entries = [
            ("category", category, weights.category),
            ("tag", tag, weights.tag),
            ("dependency", dependency, weights.dependency),
            ("priority", priority, weights.priority),
            ("contextual", contextual, weights.contextual),
        ];

        let mut breakdown = Vec::with_capacity(entries.len());
        let mut total = 0.0;
        for (criterion, raw, weight) in entries {
            let normalized = weight / weight_sum;
            let weighted = raw * normalized;
            total += weighted;
            breakdown.push(BreakdownEntry {
                criterion: criterion.to_string(),
                raw,
                weight: normalized,
                weighted,
            });
        }
        let total = total.clamp(0.0, 1.0);
        let confidence = metadata_confidence(document);

        debug_assert!(
            (0.0..=1.0).contains(&total),
            "total {total} out of range [0.0, 1.0]"
        );
        trace!(
            document = %document.id,
            total,
            confidence,
            "scored document"
        );

        ScoringResult {
            category,
            tag,
            priority,
            dependency,
            contextual,
            total,
            confidence,
            breakdown,
            tag_affinity: tag_report,
        }
    }

    fn category_subscore(&self, document: &Document, context: &SelectionContext) -> f64 {
        let Some(target) = context.target_category.as_deref() else {
            return CATEGORY_NEUTRAL;
        };
        if document.category == target {
            return 1.0;
        }
        document
            .composition_hints
            .as_ref()
            .and_then(|h| h.category_affinity.get(target))
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(CATEGORY_NO_SIGNAL)
    }

    fn tag_report(&self, document: &Document, context: &SelectionContext) -> TagAffinityReport {
        tag_affinity(
            document,
            &context.target_tags,
            &context.tag_weights,
            &self.matrix,
        )
    }
}

/// Priority prior scaled to [0, 1].
///
/// An exact 0 is treated as "unset" and maps to a neutral 0.5 rather than
/// the literal worst score. This is a deliberate policy, not a bug: pools
/// built from front matter routinely omit priority, and punishing those
/// documents to the bottom of every ranking is worse than staying neutral.
/// Callers meaning "lowest possible priority" should use a small nonzero
/// score.
fn priority_subscore(document: &Document) -> f64 {
    if document.priority_score == 0.0 {
        0.5
    } else {
        (document.priority_score / 100.0).clamp(0.0, 1.0)
    }
}

fn dependency_subscore(document: &Document, context: &SelectionContext) -> f64 {
    let selected = &context.selected_documents;
    let mut score = DEPENDENCY_BASE;

    // A satisfied prerequisite makes this document a natural next pick.
    let prerequisite_satisfied = document
        .relations
        .prerequisites
        .iter()
        .any(|p| selected.contains(&p.document_id));
    if prerequisite_satisfied {
        score += 0.3;
    }

    // Reference overlap, weighted by declared relevance.
    let references = &document.relations.references;
    if !references.is_empty() {
        let overlap: f64 = references
            .iter()
            .filter(|r| selected.contains(&r.document_id))
            .map(|r| r.relevance.clamp(0.0, 1.0))
            .sum();
        score += 0.3 * (overlap / references.len() as f64).min(1.0);
    }

    // Conflicts with already-selected documents push the score down hard.
    let conflict_penalty: f64 = document
        .relations
        .conflicts
        .iter()
        .filter(|c| selected.contains(&c.document_id))
        .map(|c| c.severity.penalty())
        .sum();
    score -= conflict_penalty.min(0.8);

    score.clamp(0.0, 1.0)
}

fn contextual_subscore(document: &Document, context: &SelectionContext) -> f64 {
    context
        .context_type
        .as_deref()
        .and_then(|ct| {
            document
                .composition_hints
                .as_ref()
                .and_then(|h| h.contextual_relevance.get(ct))
        })
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(CONTEXTUAL_DEFAULT)
}

/// Fraction of optional metadata signals the document actually carries.
/// Five signals are counted, so a document with at most two of them can
/// never exceed 0.4 confidence.
fn metadata_confidence(document: &Document) -> f64 {
    let signals = [
        !document.tags_primary.is_empty() || !document.tags_secondary.is_empty(),
        document.composition_hints.is_some(),
        !document.relations.is_empty(),
        !document.audience.is_empty(),
        document.priority_score > 0.0,
    ];
    let present = signals.iter().filter(|s| **s).count();
    present as f64 / signals.len() as f64
}
