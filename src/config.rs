//! Selection configuration and the derived tag-compatibility matrix.
//!
//! Configuration is supplied whole by the caller (the file-loading
//! collaborator lives outside this crate). The compatibility matrix is
//! derived once per config and is read-only afterwards, so it can be shared
//! across concurrent selection calls.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Algorithm, CriteriaWeights, Strategy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown selection strategy: {0}")]
    UnknownStrategy(String),
    #[error("Malformed criteria weights for strategy '{strategy}': {reason}")]
    MalformedWeights { strategy: String, reason: String },
    #[error("Compatibility strength must be in (0, 1), got {0}")]
    InvalidCompatibilityStrength(f64),
    #[error("Synergy threshold must be in (0, 1], got {0}")]
    InvalidSynergyThreshold(f64),
}

/// One configured tag: its scoring weight and the tags it may legitimately
/// co-occur with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    pub name: String,
    #[serde(default = "default_tag_weight")]
    pub weight: f64,
    #[serde(default)]
    pub compatible_with: Vec<String>,
}

fn default_tag_weight() -> f64 {
    1.0
}

impl TagConfig {
    pub fn new(name: impl Into<String>) -> Self {
        TagConfig {
            name: name.into(),
            weight: 1.0,
            compatible_with: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn compatible_with<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_with = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Score bands and limits consumed by the quality evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum acceptable overall score (0-100); below it validation fails.
    pub quality_threshold: f64,
    /// Soft cap on documents per category before diversity penalties apply.
    pub per_category_cap: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            quality_threshold: 60.0,
            per_category_cap: 4,
        }
    }
}

/// Full selection configuration: categories, tags, named strategies, and
/// derived-cache parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub strategies: BTreeMap<String, Strategy>,
    /// Compatibility weight assigned to configured tag pairs.
    #[serde(default = "default_compatibility_strength")]
    pub compatibility_strength: f64,
    /// Minimum compatibility for a co-occurring pair to count as a synergy.
    #[serde(default = "default_synergy_threshold")]
    pub synergy_threshold: f64,
    #[serde(default)]
    pub quality: QualityThresholds,
}

fn default_compatibility_strength() -> f64 {
    0.7
}

fn default_synergy_threshold() -> f64 {
    0.6
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            categories: Vec::new(),
            tags: Vec::new(),
            strategies: BTreeMap::new(),
            compatibility_strength: default_compatibility_strength(),
            synergy_threshold: default_synergy_threshold(),
            quality: QualityThresholds::default(),
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.compatibility_strength > 0.0 && self.compatibility_strength < 1.0) {
            return Err(ConfigError::InvalidCompatibilityStrength(
                self.compatibility_strength,
            ));
        }
        if !(self.synergy_threshold > 0.0 && self.synergy_threshold <= 1.0) {
            return Err(ConfigError::InvalidSynergyThreshold(self.synergy_threshold));
        }
        for strategy in self.strategies.values() {
            validate_weights(&strategy.name, &strategy.criteria)?;
        }
        Ok(())
    }

    /// Looks up a named strategy, falling back to bare algorithm names
    /// ("greedy", "knapsack", ...) with default criteria. Anything else is a
    /// configuration error.
    pub fn resolve_strategy(&self, name: &str) -> Result<Strategy, ConfigError> {
        if let Some(strategy) = self.strategies.get(name) {
            validate_weights(&strategy.name, &strategy.criteria)?;
            return Ok(strategy.clone());
        }
        match name.parse::<Algorithm>() {
            Ok(algorithm) => Ok(Strategy::new(name, algorithm)),
            Err(_) => Err(ConfigError::UnknownStrategy(name.to_string())),
        }
    }

    pub fn configured_weight(&self, tag: &str) -> f64 {
        self.tags
            .iter()
            .find(|t| t.name == tag)
            .map(|t| t.weight)
            .unwrap_or(1.0)
    }

    pub fn build_compatibility_matrix(&self) -> CompatibilityMatrix {
        CompatibilityMatrix::from_config(self)
    }
}

fn validate_weights(strategy: &str, criteria: &CriteriaWeights) -> Result<(), ConfigError> {
    let weights = [
        criteria.category,
        criteria.tag,
        criteria.dependency,
        criteria.priority,
        criteria.contextual,
    ];
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ConfigError::MalformedWeights {
            strategy: strategy.to_string(),
            reason: "weights must be finite and non-negative".to_string(),
        });
    }
    if criteria.sum() <= 0.0 {
        return Err(ConfigError::MalformedWeights {
            strategy: strategy.to_string(),
            reason: "weights must not all be zero".to_string(),
        });
    }
    Ok(())
}

/// Read-only derived cache of pairwise tag compatibility.
///
/// Keys are sorted pairs, so lookups are symmetric by construction. Rebuilt
/// only when the configuration changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompatibilityMatrix {
    entries: BTreeMap<(String, String), f64>,
}

impl CompatibilityMatrix {
    pub fn from_config(config: &SelectionConfig) -> Self {
        let known: BTreeSet<&str> = config.tags.iter().map(|t| t.name.as_str()).collect();
        let mut entries = BTreeMap::new();
        for tag in &config.tags {
            for other in &tag.compatible_with {
                // Symmetric closure over the configured lists; listing a pair
                // on either side is enough.
                entries.insert(
                    pair_key(&tag.name, other),
                    config.compatibility_strength,
                );
            }
        }
        // A tag is always compatible with itself, configured or not.
        for tag in known {
            entries.insert(pair_key(tag, tag), 1.0);
        }
        CompatibilityMatrix { entries }
    }

    /// Compatibility weight for a pair, if the pair is whitelisted.
    pub fn compatibility(&self, a: &str, b: &str) -> Option<f64> {
        if a == b {
            return Some(1.0);
        }
        self.entries.get(&pair_key(a, b)).copied()
    }

    pub fn is_compatible(&self, a: &str, b: &str) -> bool {
        self.compatibility(a, b).is_some()
    }

    /// Whether the tag appeared in the configuration this matrix was built
    /// from. Unconfigured tags carry no incompatibility signal.
    pub fn is_configured(&self, tag: &str) -> bool {
        self.entries.contains_key(&pair_key(tag, tag))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_tags() -> SelectionConfig {
        SelectionConfig {
            tags: vec![
                TagConfig::new("beginner").compatible_with(["practical"]),
                TagConfig::new("practical"),
                TagConfig::new("advanced"),
            ],
            ..SelectionConfig::default()
        }
    }

    #[test]
    fn matrix_is_symmetric() {
        let matrix = config_with_tags().build_compatibility_matrix();
        assert!(matrix.is_compatible("beginner", "practical"));
        assert!(matrix.is_compatible("practical", "beginner"));
        assert!(!matrix.is_compatible("beginner", "advanced"));
    }

    #[test]
    fn same_tag_is_always_compatible() {
        let matrix = config_with_tags().build_compatibility_matrix();
        assert_eq!(matrix.compatibility("advanced", "advanced"), Some(1.0));
        assert_eq!(matrix.compatibility("unconfigured", "unconfigured"), Some(1.0));
    }

    #[test]
    fn resolve_strategy_falls_back_to_algorithm_names() {
        let config = SelectionConfig::default();
        let strategy = config.resolve_strategy("knapsack").unwrap();
        assert_eq!(strategy.algorithm, Algorithm::Knapsack);
    }

    #[test]
    fn resolve_strategy_rejects_unknown_names() {
        let config = SelectionConfig::default();
        let err = config.resolve_strategy("quantum").unwrap_err();
        assert!(err.to_string().contains("Unknown selection strategy"));
    }

    #[test]
    fn malformed_weights_fail_fast() {
        let mut config = SelectionConfig::default();
        let mut strategy = Strategy::new("broken", Algorithm::Greedy);
        strategy.criteria.tag = -1.0;
        config.strategies.insert("broken".into(), strategy);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedWeights { .. })
        ));
    }
}
