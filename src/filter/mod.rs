//! Tag-based candidate filtering and tag-group analysis.
//!
//! Filtering runs before scoring: it removes documents that can never be
//! part of a valid selection and records every reason a document failed, not
//! just the first one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompatibilityMatrix;
use crate::types::{Document, DocumentId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub required_tags: Vec<String>,
    #[serde(default)]
    pub excluded_tags: Vec<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    /// When set, documents whose own primary tags contain a pair absent from
    /// the compatibility matrix are excluded.
    #[serde(default)]
    pub enforce_tag_compatibility: bool,
}

impl FilterOptions {
    pub fn is_identity(&self) -> bool {
        self.required_tags.is_empty()
            && self.excluded_tags.is_empty()
            && self.target_audience.is_empty()
            && !self.enforce_tag_compatibility
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExclusionReason {
    MissingRequiredTag { tag: String },
    CarriesExcludedTag { tag: String },
    AudienceMismatch,
    IncompatiblePrimaryTags { first: String, second: String },
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::MissingRequiredTag { tag } => {
                write!(f, "missing required tag '{tag}'")
            }
            ExclusionReason::CarriesExcludedTag { tag } => {
                write!(f, "carries excluded tag '{tag}'")
            }
            ExclusionReason::AudienceMismatch => f.write_str("no audience overlap with target"),
            ExclusionReason::IncompatiblePrimaryTags { first, second } => {
                write!(f, "incompatible primary tags '{first}' + '{second}'")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterStatistics {
    pub input_count: usize,
    pub output_count: usize,
    pub excluded_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub filtered: Vec<Document>,
    /// Every reason each excluded document failed; a document can fail
    /// several checks at once.
    pub exclusion_reasons: BTreeMap<DocumentId, Vec<ExclusionReason>>,
    pub statistics: FilterStatistics,
}

/// A tag pair that co-occurs across documents with high compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyPair {
    pub tags: (String, String),
    /// Compatibility weight of the pair, in (0, 1].
    pub strength: f64,
    pub co_occurrence: usize,
}

/// Reserved bucket for documents without primary tags.
pub const NO_TAGS_BUCKET: &str = "no-tags";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagGrouping {
    /// Documents bucketed by their exact primary-tag signature.
    pub groups: BTreeMap<String, Vec<DocumentId>>,
    pub largest_group: usize,
    pub smallest_group: usize,
    pub most_common_tags: Vec<String>,
    pub least_common_tags: Vec<String>,
    pub synergy_pairs: Vec<SynergyPair>,
}

pub struct TagBasedDocumentFilter {
    matrix: CompatibilityMatrix,
    synergy_threshold: f64,
}

impl TagBasedDocumentFilter {
    pub fn new(matrix: CompatibilityMatrix, synergy_threshold: f64) -> Self {
        TagBasedDocumentFilter {
            matrix,
            synergy_threshold,
        }
    }

    /// Applies inclusion/exclusion/compatibility rules. Empty options return
    /// the full input unchanged with zero exclusions.
    pub fn filter(&self, documents: &[Document], options: &FilterOptions) -> FilterOutcome {
        let mut filtered = Vec::with_capacity(documents.len());
        let mut exclusion_reasons: BTreeMap<DocumentId, Vec<ExclusionReason>> = BTreeMap::new();

        for doc in documents {
            let mut reasons = Vec::new();

            for tag in &options.required_tags {
                if !doc.has_tag(tag) {
                    reasons.push(ExclusionReason::MissingRequiredTag { tag: tag.clone() });
                }
            }
            for tag in &options.excluded_tags {
                if doc.has_tag(tag) {
                    reasons.push(ExclusionReason::CarriesExcludedTag { tag: tag.clone() });
                }
            }
            if !options.target_audience.is_empty() {
                let overlaps = options
                    .target_audience
                    .iter()
                    .any(|a| doc.audience.contains(a));
                if !overlaps {
                    reasons.push(ExclusionReason::AudienceMismatch);
                }
            }
            if options.enforce_tag_compatibility {
                reasons.extend(self.incompatible_pairs(doc));
            }

            if reasons.is_empty() {
                filtered.push(doc.clone());
            } else {
                exclusion_reasons.insert(doc.id.clone(), reasons);
            }
        }

        let statistics = FilterStatistics {
            input_count: documents.len(),
            output_count: filtered.len(),
            excluded_count: exclusion_reasons.len(),
        };
        debug!(
            input = statistics.input_count,
            kept = statistics.output_count,
            excluded = statistics.excluded_count,
            "filtered candidate pool"
        );

        FilterOutcome {
            filtered,
            exclusion_reasons,
            statistics,
        }
    }

    fn incompatible_pairs(&self, doc: &Document) -> Vec<ExclusionReason> {
        let tags: Vec<&String> = doc.tags_primary.iter().collect();
        let mut reasons = Vec::new();
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                if !self.matrix.is_compatible(a, b) {
                    reasons.push(ExclusionReason::IncompatiblePrimaryTags {
                        first: (*a).clone(),
                        second: (*b).clone(),
                    });
                }
            }
        }
        reasons
    }

    /// Buckets documents by their exact primary-tag signature and analyzes
    /// tag frequency and co-occurrence.
    pub fn group_documents_by_tags(&self, documents: &[Document]) -> TagGrouping {
        let mut groups: BTreeMap<String, Vec<DocumentId>> = BTreeMap::new();
        let mut tag_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut pair_counts: BTreeMap<(String, String), usize> = BTreeMap::new();

        for doc in documents {
            // BTreeSet already deduplicates and orders the signature parts.
            let signature = if doc.tags_primary.is_empty() {
                NO_TAGS_BUCKET.to_string()
            } else {
                doc.tags_primary
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("+")
            };
            groups.entry(signature).or_default().push(doc.id.clone());

            let tags: Vec<&String> = doc.tags_primary.iter().collect();
            for tag in &tags {
                *tag_counts.entry(tag.as_str()).or_default() += 1;
            }
            for (i, a) in tags.iter().enumerate() {
                for b in &tags[i + 1..] {
                    let key = if a <= b {
                        ((*a).clone(), (*b).clone())
                    } else {
                        ((*b).clone(), (*a).clone())
                    };
                    *pair_counts.entry(key).or_default() += 1;
                }
            }
        }

        let largest_group = groups.values().map(Vec::len).max().unwrap_or(0);
        let smallest_group = groups.values().map(Vec::len).min().unwrap_or(0);

        let max_count = tag_counts.values().copied().max().unwrap_or(0);
        let min_count = tag_counts.values().copied().min().unwrap_or(0);
        let most_common_tags: Vec<String> = tag_counts
            .iter()
            .filter(|(_, c)| **c == max_count && max_count > 0)
            .map(|(t, _)| t.to_string())
            .collect();
        let least_common_tags: Vec<String> = tag_counts
            .iter()
            .filter(|(_, c)| **c == min_count && min_count > 0)
            .map(|(t, _)| t.to_string())
            .collect();

        let mut synergy_pairs: Vec<SynergyPair> = pair_counts
            .into_iter()
            .filter(|(_, count)| *count >= 2)
            .filter_map(|((a, b), count)| {
                let strength = self.matrix.compatibility(&a, &b)?;
                (strength >= self.synergy_threshold).then_some(SynergyPair {
                    tags: (a, b),
                    strength,
                    co_occurrence: count,
                })
            })
            .collect();
        synergy_pairs.sort_by(|x, y| {
            y.strength
                .partial_cmp(&x.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| y.co_occurrence.cmp(&x.co_occurrence))
                .then_with(|| x.tags.cmp(&y.tags))
        });

        TagGrouping {
            groups,
            largest_group,
            smallest_group,
            most_common_tags,
            least_common_tags,
            synergy_pairs,
        }
    }
}
