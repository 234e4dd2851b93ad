//! Adaptive document selection: filter, resolve, score, optimize, report.
//!
//! The pipeline runs in fixed phases. Each phase hands an immutable snapshot
//! to the next, and the final result always materializes, even when the
//! selection ends up empty; only configuration errors abort a run.

pub mod algorithms;
pub mod metrics;

pub use algorithms::AlgoItem;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{CompatibilityMatrix, ConfigError, SelectionConfig};
use crate::filter::{FilterOptions, TagBasedDocumentFilter};
use crate::graph::{DependencyGraphResolver, ResolveOptions};
use crate::scoring::DocumentScorer;
use crate::types::{
    check_unique_ids, selection_fingerprint, Algorithm, ConflictSummary, CriteriaWeights,
    DependencySummary, Document, DocumentError, DocumentId, Importance, RunMetadata, ScoringResult,
    ScoringStats, SelectionConstraints, SelectionResult, Strategy, UnsatisfiedDependency,
};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorOptions {
    /// Named strategy from the configuration, or a bare algorithm name.
    pub strategy: String,
    /// Lets hybrid add TOPSIS to its candidate algorithms.
    pub enable_optimization: bool,
    /// Upper bound on hybrid refinement rounds.
    pub max_iterations: usize,
    pub enforce_tag_compatibility: bool,
    pub resolve: ResolveOptions,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        SelectorOptions {
            strategy: "hybrid".to_string(),
            enable_optimization: false,
            max_iterations: 10,
            enforce_tag_compatibility: false,
            resolve: ResolveOptions::default(),
        }
    }
}

/// Convergence threshold for hybrid refinement.
const CONVERGENCE_EPSILON: f64 = 1e-3;
/// How far each hybrid round moves the criteria weights toward the winning
/// score distribution.
const WEIGHT_BLEND: f64 = 0.3;

pub struct AdaptiveDocumentSelector {
    config: SelectionConfig,
    matrix: CompatibilityMatrix,
}

impl AdaptiveDocumentSelector {
    /// Validates the configuration up front; a malformed config never gets
    /// as far as a selection run.
    pub fn new(config: SelectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let matrix = config.build_compatibility_matrix();
        Ok(AdaptiveDocumentSelector { config, matrix })
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn select_documents(
        &self,
        documents: &[Document],
        constraints: &SelectionConstraints,
        options: &SelectorOptions,
    ) -> Result<SelectionResult, SelectionError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        check_unique_ids(documents)?;
        let strategy = self.config.resolve_strategy(&options.strategy)?;

        // Phase 1: tag filtering.
        let filter_options = FilterOptions {
            required_tags: constraints.required_tags.clone(),
            excluded_tags: constraints.excluded_tags.clone(),
            target_audience: constraints.target_audience.clone(),
            enforce_tag_compatibility: options.enforce_tag_compatibility,
        };
        let candidates: Vec<Document> = if filter_options.is_identity() {
            documents.to_vec()
        } else {
            let filter =
                TagBasedDocumentFilter::new(self.matrix.clone(), self.config.synergy_threshold);
            filter.filter(documents, &filter_options).filtered
        };

        // Phase 2: dependency resolution.
        let resolver = DependencyGraphResolver::new(options.resolve.clone());
        let resolution = resolver.resolve(&candidates);
        let excluded: BTreeSet<&DocumentId> = resolution.excluded.iter().collect();
        let candidates: Vec<Document> = candidates
            .iter()
            .filter(|d| !excluded.contains(&d.id))
            .cloned()
            .collect();

        let budget = constraints.max_characters;
        let mut unsatisfied: Vec<UnsatisfiedDependency> = resolution.unsatisfied.clone();

        // Phase 3: force-include required documents, strongest first. They
        // may exceed the soft target but never the hard cap; what does not
        // fit is reported through the unsatisfied list and, downstream,
        // validation.
        let mut forced_ids: BTreeSet<DocumentId> = BTreeSet::new();
        let mut forced_size = 0usize;
        if budget > 0 {
            let mut required_docs: Vec<&Document> = candidates
                .iter()
                .filter(|d| resolution.required.contains(&d.id))
                .collect();
            required_docs.sort_by(|a, b| {
                b.priority_score
                    .partial_cmp(&a.priority_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.priority_tier.cmp(&a.priority_tier))
                    .then_with(|| a.id.cmp(&b.id))
            });
            for doc in required_docs {
                if forced_size + doc.size <= budget {
                    forced_size += doc.size;
                    forced_ids.insert(doc.id.clone());
                } else {
                    // Attribute the overflow to each document whose required
                    // prerequisite this one is; "a is missing a" reads wrong.
                    for dependent in &candidates {
                        let needs_doc = dependent.relations.prerequisites.iter().any(|p| {
                            p.importance == Importance::Required && p.document_id == doc.id
                        });
                        if needs_doc {
                            unsatisfied.push(UnsatisfiedDependency {
                                document: dependent.id.clone(),
                                missing_prerequisite: doc.id.clone(),
                                cause: "required prerequisite does not fit the size budget"
                                    .to_string(),
                            });
                        }
                    }
                }
            }
        }

        // Phase 4: score every candidate against the forced baseline.
        let scorer = DocumentScorer::new(self.matrix.clone());
        let mut context = constraints.to_context();
        context.selected_documents = forced_ids.clone();
        let scores: BTreeMap<&DocumentId, ScoringResult> = candidates
            .iter()
            .map(|doc| (&doc.id, scorer.score(doc, &context, &strategy)))
            .collect();

        // Phase 5: run the selection algorithm over the unforced remainder.
        let rest: Vec<&Document> = candidates
            .iter()
            .filter(|d| !forced_ids.contains(&d.id))
            .collect();
        let items: Vec<AlgoItem> = rest
            .iter()
            .map(|doc| AlgoItem {
                id: doc.id.clone(),
                size: doc.size,
                value: scores[&doc.id].total,
                category: doc.category.clone(),
            })
            .collect();
        let remaining_budget = budget.saturating_sub(forced_size);
        let cap = self.config.quality.per_category_cap;

        let outcome = if budget == 0 {
            AlgorithmOutcome {
                picks: Vec::new(),
                algorithms_used: vec![strategy.algorithm.as_str().to_string()],
                iterations: 0,
                convergence_achieved: false,
            }
        } else {
            match strategy.algorithm {
                Algorithm::Greedy => AlgorithmOutcome::single(
                    "greedy",
                    algorithms::greedy(&items, remaining_budget),
                ),
                Algorithm::Knapsack => AlgorithmOutcome::single(
                    "knapsack",
                    algorithms::knapsack(&items, remaining_budget, cap),
                ),
                Algorithm::Topsis => AlgorithmOutcome::single(
                    "topsis",
                    algorithms::topsis(&items, remaining_budget),
                ),
                Algorithm::Hybrid => self.hybrid_select(HybridInput {
                    rest: &rest,
                    items: &items,
                    scores: &scores,
                    scorer: &scorer,
                    context: &context,
                    strategy: &strategy,
                    remaining_budget,
                    budget,
                    forced: &forced_ids,
                    candidates: &candidates,
                    pool: documents,
                    options,
                }),
            }
        };

        // Phase 6: assemble, in dependency-respecting order.
        let picked_ids: BTreeSet<&DocumentId> =
            outcome.picks.iter().map(|&i| &rest[i].id).collect();
        let by_id: BTreeMap<&DocumentId, &Document> =
            candidates.iter().map(|d| (&d.id, d)).collect();
        let selected: Vec<Document> = resolution
            .resolved
            .iter()
            .filter(|id| forced_ids.contains(id) || picked_ids.contains(id))
            .filter_map(|id| by_id.get(id).map(|d| (*d).clone()))
            .collect();

        let selected_scores: Vec<&ScoringResult> =
            selected.iter().filter_map(|d| scores.get(&d.id)).collect();
        let optimization =
            metrics::optimization_metrics(&selected, &selected_scores, documents, budget);
        let coverage = metrics::coverage_analysis(&selected);
        let stats = ScoringStats::from_scores(&selected_scores);
        let fingerprint = selection_fingerprint(&selected);

        debug_assert!(
            selected.iter().map(|d| d.size).sum::<usize>() <= budget,
            "selection must never exceed the hard budget"
        );
        debug!(
            strategy = strategy.name,
            selected = selected.len(),
            size = selected.iter().map(|d| d.size).sum::<usize>(),
            budget,
            "selection finished"
        );

        Ok(SelectionResult {
            selected,
            strategy: strategy.name.clone(),
            scores: stats,
            optimization,
            coverage,
            dependencies: DependencySummary {
                resolved_count: resolution.resolved.len(),
                included_dependency_count: forced_ids.len(),
                cycle_count: resolution.cycles.len(),
                missing_reference_count: resolution.missing_references.len(),
                unsatisfied,
            },
            conflicts: ConflictSummary {
                resolved: resolution.applied_resolutions.len(),
                remaining: resolution.flagged_pairs.len(),
                flagged: resolution.flagged_pairs.clone(),
            },
            run: RunMetadata {
                started_at,
                elapsed_ms: timer.elapsed().as_secs_f64() * 1000.0,
                algorithms_used: outcome.algorithms_used,
                iterations: outcome.iterations,
                convergence_achieved: outcome.convergence_achieved,
                fingerprint,
            },
        })
    }

    /// Runs greedy and knapsack (plus TOPSIS when optimization is enabled),
    /// keeps the winner by composite quality score, then iterates: each
    /// round nudges the criteria weights toward the winner's observed
    /// subscore distribution, rescores, and reruns. Stops early once the
    /// quality delta falls under the convergence threshold.
    fn hybrid_select(&self, input: HybridInput<'_>) -> AlgorithmOutcome {
        let cap = self.config.quality.per_category_cap;
        let run_all = |items: &[AlgoItem]| -> Vec<(&'static str, Vec<usize>)> {
            let mut runs = vec![
                ("greedy", algorithms::greedy(items, input.remaining_budget)),
                (
                    "knapsack",
                    algorithms::knapsack(items, input.remaining_budget, cap),
                ),
            ];
            if input.options.enable_optimization {
                runs.push(("topsis", algorithms::topsis(items, input.remaining_budget)));
            }
            runs
        };

        let quality_of = |picks: &[usize]| -> f64 {
            let mut chosen: Vec<Document> = input
                .candidates
                .iter()
                .filter(|d| input.forced.contains(&d.id))
                .cloned()
                .collect();
            chosen.extend(picks.iter().map(|&i| (*input.rest[i]).clone()));
            let chosen_scores: Vec<&ScoringResult> = chosen
                .iter()
                .filter_map(|d| input.scores.get(&d.id))
                .collect();
            // Same pool as the reported metrics, so the value hybrid ranks
            // by is the quality score the result carries.
            metrics::optimization_metrics(&chosen, &chosen_scores, input.pool, input.budget)
                .quality_score
        };

        let mut algorithms_used: Vec<String> = Vec::new();
        let mut note_used = |name: &str, used: &mut Vec<String>| {
            if !used.iter().any(|u| u == name) {
                used.push(name.to_string());
            }
        };

        let first_runs = run_all(input.items);
        let mut best_picks: Vec<usize> = Vec::new();
        let mut best_quality = f64::NEG_INFINITY;
        for (name, picks) in first_runs {
            note_used(name, &mut algorithms_used);
            let quality = quality_of(&picks);
            if quality > best_quality {
                best_quality = quality;
                best_picks = picks;
            }
        }

        let mut iterations = 1usize;
        let mut convergence_achieved = false;
        let mut weights = input.strategy.criteria;

        while iterations < input.options.max_iterations.max(1) {
            let Some(target) = winning_distribution(&best_picks, input.rest, input.scores) else {
                break;
            };
            weights = blend_weights(&weights, &target);
            let mut adjusted = input.strategy.clone();
            adjusted.criteria = weights;

            // Rescore the remainder under the nudged weights and rerun.
            let rescored: Vec<AlgoItem> = input
                .rest
                .iter()
                .zip(input.items)
                .map(|(doc, item)| AlgoItem {
                    value: input.scorer.score(doc, input.context, &adjusted).total,
                    ..item.clone()
                })
                .collect();

            let mut round_best_picks: Vec<usize> = Vec::new();
            let mut round_best_quality = f64::NEG_INFINITY;
            for (name, picks) in run_all(&rescored) {
                note_used(name, &mut algorithms_used);
                let quality = quality_of(&picks);
                if quality > round_best_quality {
                    round_best_quality = quality;
                    round_best_picks = picks;
                }
            }
            iterations += 1;

            let delta = (round_best_quality - best_quality).abs();
            if round_best_quality > best_quality {
                best_quality = round_best_quality;
                best_picks = round_best_picks;
            }
            if delta < CONVERGENCE_EPSILON {
                convergence_achieved = true;
                break;
            }
        }

        AlgorithmOutcome {
            picks: best_picks,
            algorithms_used,
            iterations,
            convergence_achieved,
        }
    }
}

struct HybridInput<'a> {
    rest: &'a [&'a Document],
    items: &'a [AlgoItem],
    scores: &'a BTreeMap<&'a DocumentId, ScoringResult>,
    scorer: &'a DocumentScorer,
    context: &'a crate::types::SelectionContext,
    strategy: &'a Strategy,
    remaining_budget: usize,
    budget: usize,
    forced: &'a BTreeSet<DocumentId>,
    candidates: &'a [Document],
    /// The unfiltered input pool; diversity counts categories against it.
    pool: &'a [Document],
    options: &'a SelectorOptions,
}

struct AlgorithmOutcome {
    picks: Vec<usize>,
    algorithms_used: Vec<String>,
    iterations: usize,
    convergence_achieved: bool,
}

impl AlgorithmOutcome {
    fn single(name: &str, picks: Vec<usize>) -> Self {
        AlgorithmOutcome {
            picks,
            algorithms_used: vec![name.to_string()],
            iterations: 1,
            convergence_achieved: false,
        }
    }
}

/// Mean subscore distribution over the winning picks, normalized to sum 1.
fn winning_distribution(
    picks: &[usize],
    rest: &[&Document],
    scores: &BTreeMap<&DocumentId, ScoringResult>,
) -> Option<CriteriaWeights> {
    if picks.is_empty() {
        return None;
    }
    let mut sums = [0.0f64; 5];
    for &i in picks {
        let score = scores.get(&rest[i].id)?;
        sums[0] += score.category;
        sums[1] += score.tag;
        sums[2] += score.dependency;
        sums[3] += score.priority;
        sums[4] += score.contextual;
    }
    let total: f64 = sums.iter().sum();
    if total <= 0.0 {
        return None;
    }
    Some(CriteriaWeights {
        category: sums[0] / total,
        tag: sums[1] / total,
        dependency: sums[2] / total,
        priority: sums[3] / total,
        contextual: sums[4] / total,
    })
}

fn blend_weights(current: &CriteriaWeights, target: &CriteriaWeights) -> CriteriaWeights {
    let keep = 1.0 - WEIGHT_BLEND;
    CriteriaWeights {
        category: keep * current.category + WEIGHT_BLEND * target.category,
        tag: keep * current.tag + WEIGHT_BLEND * target.tag,
        dependency: keep * current.dependency + WEIGHT_BLEND * target.dependency,
        priority: keep * current.priority + WEIGHT_BLEND * target.priority,
        contextual: keep * current.contextual + WEIGHT_BLEND * target.contextual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_strategy_fails_fast() {
        let selector = AdaptiveDocumentSelector::new(SelectionConfig::default()).unwrap();
        let docs = vec![Document::new("a", "A", "guide", 100)];
        let constraints = SelectionConstraints::new(1000);
        let options = SelectorOptions {
            strategy: "annealing".to_string(),
            ..SelectorOptions::default()
        };
        let err = selector
            .select_documents(&docs, &constraints, &options)
            .unwrap_err();
        assert!(err.to_string().contains("Unknown selection strategy"));
    }

    #[test]
    fn duplicate_ids_fail_fast() {
        let selector = AdaptiveDocumentSelector::new(SelectionConfig::default()).unwrap();
        let docs = vec![
            Document::new("a", "A", "guide", 100),
            Document::new("a", "A2", "guide", 100),
        ];
        let err = selector
            .select_documents(
                &docs,
                &SelectionConstraints::new(1000),
                &SelectorOptions::default(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate document ID"));
    }

    #[test]
    fn zero_budget_yields_empty_selection() {
        let selector = AdaptiveDocumentSelector::new(SelectionConfig::default()).unwrap();
        let docs = vec![
            Document::new("a", "A", "guide", 100).with_priority_score(90.0),
            Document::new("b", "B", "guide", 0),
        ];
        let result = selector
            .select_documents(
                &docs,
                &SelectionConstraints::new(0),
                &SelectorOptions::default(),
            )
            .unwrap();
        assert!(result.selected.is_empty());
        assert_eq!(result.optimization.space_utilization, 0.0);
    }

    #[test]
    fn blended_weights_move_toward_target() {
        let current = CriteriaWeights::default();
        let target = CriteriaWeights {
            category: 1.0,
            tag: 0.0,
            dependency: 0.0,
            priority: 0.0,
            contextual: 0.0,
        };
        let blended = blend_weights(&current, &target);
        assert!(blended.category > current.category);
        assert!(blended.tag < current.tag);
        assert!((blended.sum() - 1.0).abs() < 1e-9);
    }
}
