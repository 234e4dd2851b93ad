//! The twelve built-in quality metrics.
//!
//! Every metric is a pure function of the evaluation input returning a
//! value and confidence in [0, 1] plus an explanation. Confidence reflects
//! how much signal the metric had to work with, not how good the value is.

use std::collections::BTreeSet;

use super::{MetricInput, MetricResult};
use crate::types::{Complexity, Importance};

fn result(value: f64, confidence: f64, expected: f64, reasoning: Vec<String>) -> MetricResult {
    MetricResult {
        value: value.clamp(0.0, 1.0),
        confidence: confidence.clamp(0.0, 1.0),
        details: super::MetricDetails {
            measured: value.clamp(0.0, 1.0),
            expected,
            reasoning,
            suggestions: Vec::new(),
        },
    }
}

fn with_suggestion(mut metric: MetricResult, condition: bool, suggestion: &str) -> MetricResult {
    if condition {
        metric.details.suggestions.push(suggestion.to_string());
    }
    metric
}

// ---- content ----

/// How well the selection matches the target category and tags.
pub(super) fn relevance(input: &MetricInput<'_>) -> MetricResult {
    if input.selection.is_empty() {
        return result(0.0, 0.3, 0.7, vec!["empty selection".to_string()]);
    }
    let has_category = input.constraints.target_category.is_some();
    let has_tags = !input.constraints.target_tags.is_empty();
    if !has_category && !has_tags {
        return result(
            0.5,
            0.2,
            0.7,
            vec!["no target category or tags to measure against".to_string()],
        );
    }

    let mut sum = 0.0;
    for doc in input.selection {
        let category_match = match input.constraints.target_category.as_deref() {
            Some(target) if doc.category == target => 1.0,
            Some(_) => 0.3,
            None => 0.5,
        };
        let tag_match = if has_tags {
            let hit = input
                .constraints
                .target_tags
                .iter()
                .filter(|t| doc.has_tag(t))
                .count();
            hit as f64 / input.constraints.target_tags.len() as f64
        } else {
            0.5
        };
        sum += 0.5 * category_match + 0.5 * tag_match;
    }
    let value = sum / input.selection.len() as f64;
    with_suggestion(
        result(
            value,
            0.9,
            0.7,
            vec![format!(
                "mean category/tag match over {} documents",
                input.selection.len()
            )],
        ),
        value < 0.5,
        "tighten target tags or category to improve relevance",
    )
}

/// Required-topic coverage.
pub(super) fn completeness(input: &MetricInput<'_>) -> MetricResult {
    let topics = &input.constraints.required_topics;
    if topics.is_empty() {
        return result(
            1.0,
            0.3,
            1.0,
            vec!["no required topics declared".to_string()],
        );
    }
    let covered = topics
        .iter()
        .filter(|topic| input.selection.iter().any(|d| d.has_tag(topic)))
        .count();
    let value = covered as f64 / topics.len() as f64;
    with_suggestion(
        result(
            value,
            0.9,
            1.0,
            vec![format!("{covered} of {} required topics covered", topics.len())],
        ),
        value < 1.0,
        "add documents covering the missing required topics",
    )
}

/// Proxy for trustworthiness: how completely the selected documents are
/// annotated. Content itself is opaque to this crate.
pub(super) fn accuracy(input: &MetricInput<'_>) -> MetricResult {
    if input.selection.is_empty() {
        return result(0.0, 0.3, 0.8, vec!["empty selection".to_string()]);
    }
    let mut sum = 0.0;
    for doc in input.selection {
        let signals = [
            !doc.tags_primary.is_empty(),
            doc.priority_score > 0.0,
            !doc.audience.is_empty(),
            doc.composition_hints.is_some(),
        ];
        sum += signals.iter().filter(|s| **s).count() as f64 / signals.len() as f64;
    }
    let value = sum / input.selection.len() as f64;
    with_suggestion(
        result(
            value,
            0.6,
            0.8,
            vec!["mean metadata completeness across the selection".to_string()],
        ),
        value < 0.5,
        "enrich document metadata (tags, priority, audience)",
    )
}

// ---- structure ----

/// Whether prerequisites precede their dependents in the selection order.
pub(super) fn logical_flow(input: &MetricInput<'_>) -> MetricResult {
    let ids: Vec<_> = input.selection.iter().map(|d| &d.id).collect();
    let mut checked = 0usize;
    let mut ordered = 0usize;
    for (position, doc) in input.selection.iter().enumerate() {
        for prereq in &doc.relations.prerequisites {
            if let Some(prereq_pos) = ids.iter().position(|id| **id == prereq.document_id) {
                checked += 1;
                if prereq_pos < position {
                    ordered += 1;
                }
            }
        }
    }
    if checked == 0 {
        return result(
            1.0,
            0.4,
            1.0,
            vec!["no in-selection prerequisite pairs to order".to_string()],
        );
    }
    let value = ordered as f64 / checked as f64;
    result(
        value,
        0.9,
        1.0,
        vec![format!("{ordered} of {checked} prerequisite pairs in order")],
    )
}

/// Fraction of required prerequisites of selected documents that made it
/// into the selection.
pub(super) fn dependency_satisfaction(input: &MetricInput<'_>) -> MetricResult {
    let ids: BTreeSet<_> = input.selection.iter().map(|d| &d.id).collect();
    let mut required = 0usize;
    let mut satisfied = 0usize;
    for doc in input.selection {
        for prereq in &doc.relations.prerequisites {
            if prereq.importance == Importance::Required {
                required += 1;
                if ids.contains(&prereq.document_id) {
                    satisfied += 1;
                }
            }
        }
    }
    let reported_unsatisfied = input
        .selection_result
        .map(|r| r.dependencies.unsatisfied.len())
        .unwrap_or(0);
    if required == 0 && reported_unsatisfied == 0 {
        return result(
            1.0,
            0.5,
            1.0,
            vec!["no required prerequisites declared".to_string()],
        );
    }
    let base = if required == 0 {
        1.0
    } else {
        satisfied as f64 / required as f64
    };
    // Resolution-reported breakage counts against the metric even when the
    // remaining selection looks internally consistent.
    let value = base - 0.2 * reported_unsatisfied as f64;
    with_suggestion(
        result(
            value,
            0.9,
            1.0,
            vec![format!(
                "{satisfied} of {required} required prerequisites included, {reported_unsatisfied} reported unsatisfied"
            )],
        ),
        value < 1.0,
        "include missing prerequisites or relax conflict resolution",
    )
}

/// Penalizes jumps from beginner straight to advanced material.
pub(super) fn complexity_appropriateness(input: &MetricInput<'_>) -> MetricResult {
    if input.selection.is_empty() {
        return result(0.0, 0.3, 0.8, vec!["empty selection".to_string()]);
    }
    let has = |c: Complexity| input.selection.iter().any(|d| d.complexity == c);
    let (value, why) = match (
        has(Complexity::Beginner),
        has(Complexity::Intermediate),
        has(Complexity::Advanced),
    ) {
        (true, false, true) => (0.5, "beginner and advanced with no intermediate bridge"),
        (true, true, true) => (1.0, "full complexity progression"),
        (false, false, false) => (0.8, "no complexity annotations"),
        _ => (0.9, "consistent complexity band"),
    };
    with_suggestion(
        result(value, 0.7, 0.8, vec![why.to_string()]),
        value <= 0.5,
        "add intermediate material to bridge the complexity gap",
    )
}

// ---- audience ----

pub(super) fn audience_alignment(input: &MetricInput<'_>) -> MetricResult {
    let target = &input.constraints.target_audience;
    if target.is_empty() {
        return result(
            0.7,
            0.3,
            0.8,
            vec!["no target audience declared".to_string()],
        );
    }
    if input.selection.is_empty() {
        return result(0.0, 0.5, 0.8, vec!["empty selection".to_string()]);
    }
    let aligned = input
        .selection
        .iter()
        .filter(|d| d.audience.is_empty() || target.iter().any(|t| d.audience.contains(t)))
        .count();
    let value = aligned as f64 / input.selection.len() as f64;
    result(
        value,
        0.9,
        0.8,
        vec![format!(
            "{aligned} of {} documents reach the target audience",
            input.selection.len()
        )],
    )
}

/// Mean pairwise tag overlap: a coherent set shares vocabulary.
pub(super) fn thematic_coherence(input: &MetricInput<'_>) -> MetricResult {
    if input.selection.len() < 2 {
        return result(
            0.5,
            0.3,
            0.6,
            vec!["fewer than two documents; coherence unmeasurable".to_string()],
        );
    }
    let tag_sets: Vec<BTreeSet<&str>> = input.selection.iter().map(|d| d.all_tags()).collect();
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for (i, a) in tag_sets.iter().enumerate() {
        for b in &tag_sets[i + 1..] {
            pairs += 1;
            if a.is_empty() || b.is_empty() {
                continue;
            }
            let intersection = a.intersection(b).count() as f64;
            let union = a.union(b).count() as f64;
            sum += intersection / union;
        }
    }
    let value = sum / pairs as f64;
    with_suggestion(
        result(
            value,
            0.8,
            0.6,
            vec![format!("mean tag overlap across {pairs} pairs")],
        ),
        value < 0.2,
        "the selection spans disparate themes; consider narrowing target tags",
    )
}

/// Fraction of configured cross-document primary-tag pairs that are
/// compatible under the matrix.
pub(super) fn tag_consistency(input: &MetricInput<'_>) -> MetricResult {
    let mut checked = 0usize;
    let mut consistent = 0usize;
    for (i, a) in input.selection.iter().enumerate() {
        for b in &input.selection[i + 1..] {
            for tag_a in &a.tags_primary {
                if !input.matrix.is_configured(tag_a) {
                    continue;
                }
                for tag_b in &b.tags_primary {
                    if !input.matrix.is_configured(tag_b) {
                        continue;
                    }
                    checked += 1;
                    if input.matrix.is_compatible(tag_a, tag_b) {
                        consistent += 1;
                    }
                }
            }
        }
    }
    if checked == 0 {
        return result(
            0.8,
            0.3,
            0.9,
            vec!["no configured tag pairs to check".to_string()],
        );
    }
    let value = consistent as f64 / checked as f64;
    result(
        value,
        0.8,
        0.9,
        vec![format!("{consistent} of {checked} tag pairs compatible")],
    )
}

// ---- coverage ----

pub(super) fn category_coverage(input: &MetricInput<'_>) -> MetricResult {
    let covered: BTreeSet<&str> = input.selection.iter().map(|d| d.category.as_str()).collect();
    if input.config.categories.is_empty() {
        let value = if covered.is_empty() { 0.0 } else { 1.0 };
        return result(
            value,
            0.3,
            0.6,
            vec!["no categories configured; presence-only check".to_string()],
        );
    }
    let hit = input
        .config
        .categories
        .iter()
        .filter(|c| covered.contains(c.as_str()))
        .count();
    let value = hit as f64 / input.config.categories.len() as f64;
    result(
        value,
        0.9,
        0.6,
        vec![format!(
            "{hit} of {} configured categories represented",
            input.config.categories.len()
        )],
    )
}

/// Distinct tags relative to selection size; a proxy for topical spread.
pub(super) fn topic_breadth(input: &MetricInput<'_>) -> MetricResult {
    if input.selection.is_empty() {
        return result(0.0, 0.3, 0.6, vec!["empty selection".to_string()]);
    }
    let distinct: BTreeSet<&str> = input
        .selection
        .iter()
        .flat_map(|d| d.all_tags())
        .collect();
    let value = (distinct.len() as f64 / (2.0 * input.selection.len() as f64)).min(1.0);
    result(
        value,
        0.6,
        0.6,
        vec![format!(
            "{} distinct tags over {} documents",
            distinct.len(),
            input.selection.len()
        )],
    )
}

/// Budget use measured against an ideal fill around 85%.
pub(super) fn space_efficiency(input: &MetricInput<'_>) -> MetricResult {
    let max = input.constraints.max_characters;
    if max == 0 {
        return result(
            0.0,
            0.5,
            0.85,
            vec!["zero budget; nothing to fill".to_string()],
        );
    }
    let used: usize = input.selection.iter().map(|d| d.size).sum();
    let utilization = used as f64 / max as f64;
    let value = if utilization > 1.0 {
        // Overflow is a validation failure; the metric bottoms out.
        0.0
    } else {
        (utilization / 0.85).min(1.0)
    };
    with_suggestion(
        result(
            value,
            0.9,
            0.85,
            vec![format!(
                "{used} of {max} size units used ({:.0}%)",
                utilization * 100.0
            )],
        ),
        utilization < 0.5,
        "budget is underused; consider adding supplementary documents",
    )
}
