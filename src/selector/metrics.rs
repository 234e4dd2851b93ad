//! Coverage analysis and optimization metrics over a selected set.

use std::collections::BTreeSet;

use crate::types::{CoverageAnalysis, Document, OptimizationMetrics, ScoringResult};

pub fn coverage_analysis(selected: &[Document]) -> CoverageAnalysis {
    let mut coverage = CoverageAnalysis::default();
    for doc in selected {
        *coverage.categories.entry(doc.category.clone()).or_default() += 1;
        for tag in doc.all_tags() {
            *coverage.tags.entry(tag.to_string()).or_default() += 1;
        }
        for audience in &doc.audience {
            *coverage.audiences.entry(audience.clone()).or_default() += 1;
        }
        let complexity = format!("{:?}", doc.complexity).to_lowercase();
        *coverage.complexity.entry(complexity).or_default() += 1;
    }
    coverage
}

/// Blend weights for the composite quality score.
const QUALITY_RELEVANCE_WEIGHT: f64 = 0.4;
const QUALITY_UTILIZATION_WEIGHT: f64 = 0.3;
const QUALITY_DIVERSITY_WEIGHT: f64 = 0.2;
const QUALITY_BALANCE_WEIGHT: f64 = 0.1;

pub fn optimization_metrics(
    selected: &[Document],
    scores: &[&ScoringResult],
    pool: &[Document],
    max_characters: usize,
) -> OptimizationMetrics {
    let total_size: usize = selected.iter().map(|d| d.size).sum();
    let space_utilization = if max_characters == 0 {
        0.0
    } else {
        (total_size as f64 / max_characters as f64).min(1.0)
    };

    let diversity_score = diversity(selected, pool);
    let balance_score = balance(selected);

    let mean_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| s.total).sum::<f64>() / scores.len() as f64
    };

    let quality_score = QUALITY_RELEVANCE_WEIGHT * mean_score
        + QUALITY_UTILIZATION_WEIGHT * space_utilization
        + QUALITY_DIVERSITY_WEIGHT * diversity_score
        + QUALITY_BALANCE_WEIGHT * balance_score;

    OptimizationMetrics {
        space_utilization,
        quality_score: quality_score.clamp(0.0, 1.0),
        diversity_score,
        balance_score,
    }
}

/// Distinct categories selected over distinct categories available.
fn diversity(selected: &[Document], pool: &[Document]) -> f64 {
    let available: BTreeSet<&str> = pool.iter().map(|d| d.category.as_str()).collect();
    if available.is_empty() {
        return 0.0;
    }
    let covered: BTreeSet<&str> = selected.iter().map(|d| d.category.as_str()).collect();
    covered.len() as f64 / available.len() as f64
}

/// Evenness of the category distribution: smallest category count over the
/// largest. A single-category selection counts as perfectly balanced.
fn balance(selected: &[Document]) -> f64 {
    if selected.is_empty() {
        return 0.0;
    }
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for doc in selected {
        *counts.entry(doc.category.as_str()).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    let min = counts.values().copied().min().unwrap_or(0);
    if max == 0 {
        0.0
    } else {
        min as f64 / max as f64
    }
}
