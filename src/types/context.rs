use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::document::DocumentId;

/// The selection algorithm. A closed set: unknown names are rejected at the
/// boundary instead of silently falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Greedy,
    Knapsack,
    Topsis,
    Hybrid,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Greedy => "greedy",
            Algorithm::Knapsack => "knapsack",
            Algorithm::Topsis => "topsis",
            Algorithm::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown selection strategy: {0}")]
pub struct UnknownStrategyError(pub String);

impl FromStr for Algorithm {
    type Err = UnknownStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(Algorithm::Greedy),
            "knapsack" => Ok(Algorithm::Knapsack),
            "topsis" => Ok(Algorithm::Topsis),
            "hybrid" => Ok(Algorithm::Hybrid),
            other => Err(UnknownStrategyError(other.to_string())),
        }
    }
}

/// Per-criterion weights for the total score. The sum is expected to land
/// near 1.0 but is not enforced; the scorer normalizes by the actual sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriteriaWeights {
    pub category: f64,
    pub tag: f64,
    pub dependency: f64,
    pub priority: f64,
    pub contextual: f64,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        CriteriaWeights {
            category: 0.25,
            tag: 0.30,
            dependency: 0.20,
            priority: 0.15,
            contextual: 0.10,
        }
    }
}

impl CriteriaWeights {
    pub fn sum(&self) -> f64 {
        self.category + self.tag + self.dependency + self.priority + self.contextual
    }
}

/// A named selection strategy: an algorithm plus criteria weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub algorithm: Algorithm,
    #[serde(default)]
    pub criteria: CriteriaWeights,
}

impl Strategy {
    pub fn new(name: impl Into<String>, algorithm: Algorithm) -> Self {
        Strategy {
            name: name.into(),
            algorithm,
            criteria: CriteriaWeights::default(),
        }
    }

    pub fn with_criteria(mut self, criteria: CriteriaWeights) -> Self {
        self.criteria = criteria;
        self
    }
}

/// Everything the scorer needs to judge one document against the current
/// selection state. Built by the selector from the constraints; callers
/// scoring documents directly can construct one by hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionContext {
    /// Target tags in caller-preference order.
    pub target_tags: Vec<String>,
    /// Per-tag weight overrides; absent tags weigh 1.0.
    #[serde(default)]
    pub tag_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub target_category: Option<String>,
    /// Free-form context type keyed into `CompositionHints::contextual_relevance`.
    #[serde(default)]
    pub context_type: Option<String>,
    /// Ids already chosen, for incremental scoring of dependency overlap.
    #[serde(default)]
    pub selected_documents: BTreeSet<DocumentId>,
    #[serde(default)]
    pub required_topics: Vec<String>,
    #[serde(default)]
    pub max_size: Option<usize>,
    #[serde(default)]
    pub target_size: Option<usize>,
}

/// Caller-facing constraints for one selection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConstraints {
    /// Hard size cap. Selections never exceed it except when forced-required
    /// documents overflow, which surfaces as a validation failure.
    pub max_characters: usize,
    /// Soft target; forced-required documents may exceed it.
    #[serde(default)]
    pub target_characters: Option<usize>,
    #[serde(default)]
    pub required_tags: Vec<String>,
    #[serde(default)]
    pub excluded_tags: Vec<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub target_category: Option<String>,
    #[serde(default)]
    pub target_tags: Vec<String>,
    #[serde(default)]
    pub tag_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub context_type: Option<String>,
    #[serde(default)]
    pub required_topics: Vec<String>,
}

impl SelectionConstraints {
    pub fn new(max_characters: usize) -> Self {
        SelectionConstraints {
            max_characters,
            target_characters: None,
            required_tags: Vec::new(),
            excluded_tags: Vec::new(),
            target_audience: Vec::new(),
            target_category: None,
            target_tags: Vec::new(),
            tag_weights: BTreeMap::new(),
            context_type: None,
            required_topics: Vec::new(),
        }
    }

    /// Derives the scorer-facing context for an empty starting selection.
    pub fn to_context(&self) -> SelectionContext {
        SelectionContext {
            target_tags: self.target_tags.clone(),
            tag_weights: self.tag_weights.clone(),
            target_category: self.target_category.clone(),
            context_type: self.context_type.clone(),
            selected_documents: BTreeSet::new(),
            required_topics: self.required_topics.clone(),
            max_size: Some(self.max_characters),
            target_size: self.target_characters,
        }
    }
}
