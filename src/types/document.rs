use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque, caller-supplied document identifier.
///
/// Uniqueness within one selection run is the caller's contract; the
/// selector rejects pools that violate it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document id must not be empty")]
    EmptyId,
    #[error("Duplicate document ID: {0}")]
    DuplicateDocumentId(String),
}

/// Ordered priority bucket. Ordering is ascending, so `Critical` compares
/// greater than every other tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    #[default]
    Supplementary,
    Reference,
    Important,
    Essential,
    Critical,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// Whether a prerequisite is mandatory for the depending document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    #[default]
    Required,
    Optional,
}

/// Conflict severity. Ordering is ascending, so `Major` is the greatest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    #[default]
    Moderate,
    Major,
}

impl Severity {
    /// Penalty magnitude applied to the dependency subscore per overlapping
    /// conflict.
    pub fn penalty(self) -> f64 {
        match self {
            Severity::Major => 0.5,
            Severity::Moderate => 0.3,
            Severity::Minor => 0.1,
        }
    }
}

/// A prerequisite relation: the referenced document should precede this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub document_id: DocumentId,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A soft "relates to" link with a relevance weight in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedReference {
    pub document_id: DocumentId,
    pub relevance: f64,
}

/// A declared conflict: the two documents should not appear together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredConflict {
    pub document_id: DocumentId,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub reason: Option<String>,
}

/// All relationship declarations a document carries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentRelations {
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub references: Vec<RelatedReference>,
    #[serde(default)]
    pub conflicts: Vec<DeclaredConflict>,
    #[serde(default)]
    pub complements: Vec<DocumentId>,
    #[serde(default)]
    pub followups: Vec<DocumentId>,
}

impl DocumentRelations {
    pub fn is_empty(&self) -> bool {
        self.prerequisites.is_empty()
            && self.references.is_empty()
            && self.conflicts.is_empty()
            && self.complements.is_empty()
            && self.followups.is_empty()
    }
}

/// Optional per-document affinity hints used by the scorer. All values are
/// expected in [0, 1]; out-of-range values are clamped on read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositionHints {
    #[serde(default)]
    pub category_affinity: BTreeMap<String, f64>,
    #[serde(default)]
    pub tag_affinity: BTreeMap<String, f64>,
    #[serde(default)]
    pub contextual_relevance: BTreeMap<String, f64>,
}

/// The atomic unit of selection.
///
/// `size` is a dimensionless cost (character or word count, per the caller's
/// convention); this crate never inspects content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub category: String,
    pub size: usize,
    /// Relevance prior in [0, 100]. An exact 0 is treated as "unset" by the
    /// scorer; see `DocumentScorer::priority_subscore`.
    pub priority_score: f64,
    #[serde(default)]
    pub priority_tier: PriorityTier,
    #[serde(default)]
    pub tags_primary: BTreeSet<String>,
    #[serde(default)]
    pub tags_secondary: BTreeSet<String>,
    #[serde(default)]
    pub audience: BTreeSet<String>,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub relations: DocumentRelations,
    #[serde(default)]
    pub composition_hints: Option<CompositionHints>,
}

impl Document {
    pub fn new(
        id: impl Into<DocumentId>,
        title: impl Into<String>,
        category: impl Into<String>,
        size: usize,
    ) -> Self {
        Document {
            id: id.into(),
            title: title.into(),
            category: category.into(),
            size,
            priority_score: 0.0,
            priority_tier: PriorityTier::default(),
            tags_primary: BTreeSet::new(),
            tags_secondary: BTreeSet::new(),
            audience: BTreeSet::new(),
            complexity: Complexity::default(),
            relations: DocumentRelations::default(),
            composition_hints: None,
        }
    }

    /// Sets the priority prior, clamped into [0, 100].
    pub fn with_priority_score(mut self, score: f64) -> Self {
        self.priority_score = score.clamp(0.0, 100.0);
        self
    }

    pub fn with_priority_tier(mut self, tier: PriorityTier) -> Self {
        self.priority_tier = tier;
        self
    }

    pub fn with_primary_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_primary = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_secondary_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_secondary = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = audience.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_relations(mut self, relations: DocumentRelations) -> Self {
        self.relations = relations;
        self
    }

    pub fn with_composition_hints(mut self, hints: CompositionHints) -> Self {
        self.composition_hints = Some(hints);
        self
    }

    /// Primary and secondary tags as one deduplicated set.
    pub fn all_tags(&self) -> BTreeSet<&str> {
        self.tags_primary
            .iter()
            .chain(self.tags_secondary.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags_primary.contains(tag) || self.tags_secondary.contains(tag)
    }
}

/// Rejects pools with duplicate ids. Sort-then-scan keeps this O(n log n).
pub fn check_unique_ids(documents: &[Document]) -> Result<(), DocumentError> {
    let mut ids: Vec<&DocumentId> = documents.iter().map(|d| &d.id).collect();
    ids.sort();
    for pair in ids.windows(2) {
        if pair[0] == pair[1] {
            return Err(DocumentError::DuplicateDocumentId(
                pair[0].as_str().to_string(),
            ));
        }
    }
    Ok(())
}
