//! Tag affinity between a document and the target tags.

use std::collections::BTreeMap;

use crate::config::CompatibilityMatrix;
use crate::types::{Document, TagAffinityReport};

/// Computes how well a document's tags cover the target tags.
///
/// Each target tag contributes `weight × 1.0` when carried directly,
/// `weight × c` when reachable through the compatibility matrix (or the
/// document's own tag-affinity hints), and nothing otherwise. The result is
/// normalized by the total weight, so a document matching every target tag
/// directly scores exactly 1.0 no matter what the weights are — weights only
/// shift comparisons between partially matching documents.
pub fn tag_affinity(
    document: &Document,
    target_tags: &[String],
    tag_weights: &BTreeMap<String, f64>,
    matrix: &CompatibilityMatrix,
) -> TagAffinityReport {
    if target_tags.is_empty() {
        return TagAffinityReport::default();
    }

    let mut matched = Vec::new();
    let mut compatible = Vec::new();
    let mut incompatible = Vec::new();

    let mut weighted_sum = 0.0;
    let mut raw_sum = 0.0;
    let mut total_weight = 0.0;
    let mut seen = std::collections::BTreeSet::new();

    for tag in target_tags {
        // Duplicate target tags count once.
        if !seen.insert(tag.as_str()) {
            continue;
        }
        let weight = tag_weights.get(tag).copied().unwrap_or(1.0).max(0.0);
        total_weight += weight;

        if document.has_tag(tag) {
            matched.push(tag.clone());
            weighted_sum += weight;
            raw_sum += 1.0;
            continue;
        }

        let via_matrix = document
            .all_tags()
            .iter()
            .filter_map(|own| matrix.compatibility(tag, own))
            .fold(0.0f64, f64::max);
        let via_hints = document
            .composition_hints
            .as_ref()
            .and_then(|h| h.tag_affinity.get(tag))
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let compatibility = via_matrix.max(via_hints);

        if compatibility > 0.0 {
            compatible.push(tag.clone());
            weighted_sum += weight * compatibility;
            raw_sum += compatibility;
        } else {
            incompatible.push(tag.clone());
        }
    }

    let count = seen.len() as f64;
    let weighted_affinity = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        // All-zero weights carry no preference; fall back to the raw ratio.
        raw_sum / count
    };

    TagAffinityReport {
        matched,
        compatible,
        incompatible,
        raw_affinity: raw_sum / count,
        weighted_affinity: weighted_affinity.clamp(0.0, 1.0),
    }
}
