//! Quality evaluation of a selected document set.
//!
//! The evaluator runs a registry of metrics over a selection, aggregates
//! them into a 0-100 overall score with a letter grade, validates the
//! selection against hard and soft rules, and compares the score against
//! fixed benchmarks. Twelve metrics ship built in; callers can register
//! more with [`QualityEvaluator::add_metric`].

mod metrics;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{CompatibilityMatrix, ConfigError, SelectionConfig};
use crate::types::{Document, SelectionConstraints, SelectionResult};

/// Metric category. Group weights sum to 1.0; a group with no metrics
/// simply drops out of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricGroup {
    Content,
    Structure,
    Audience,
    Coverage,
}

impl MetricGroup {
    pub fn weight(self) -> f64 {
        match self {
            MetricGroup::Content => 0.30,
            MetricGroup::Structure => 0.25,
            MetricGroup::Audience => 0.20,
            MetricGroup::Coverage => 0.25,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricGroup::Content => "content",
            MetricGroup::Structure => "structure",
            MetricGroup::Audience => "audience",
            MetricGroup::Coverage => "coverage",
        }
    }
}

/// Explanation attached to every metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDetails {
    pub measured: f64,
    /// What a healthy selection typically measures for this metric.
    pub expected: f64,
    pub reasoning: Vec<String>,
    pub suggestions: Vec<String>,
}

/// One metric's verdict. `value` and `confidence` are in [0, 1];
/// confidence reflects available signal, not quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub value: f64,
    pub confidence: f64,
    pub details: MetricDetails,
}

/// Read-only view of everything a metric may inspect.
pub struct MetricInput<'a> {
    pub selection: &'a [Document],
    pub constraints: &'a SelectionConstraints,
    /// Full selection output when the evaluation follows a selector run;
    /// `None` when evaluating a hand-assembled set.
    pub selection_result: Option<&'a SelectionResult>,
    pub config: &'a SelectionConfig,
    pub matrix: &'a CompatibilityMatrix,
}

/// Metric implementations are pure functions of the input.
pub type MetricFn = Box<dyn Fn(&MetricInput<'_>) -> MetricResult + Send + Sync>;

struct RegisteredMetric {
    name: String,
    group: MetricGroup,
    func: MetricFn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub rule: String,
    pub severity: ValidationSeverity,
    pub message: String,
}

/// Rule outcomes. `score` is the fraction of rules that passed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: Vec<String>,
    pub failed: Vec<ValidationFailure>,
    pub score: f64,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self
            .failed
            .iter()
            .any(|f| f.severity == ValidationSeverity::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub vs_typical: f64,
    pub vs_good: f64,
    pub vs_excellent: f64,
    pub standing: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualitySummary {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub critical_issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// The evaluator's full verdict on one selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Confidence-weighted, group-weighted aggregate in [0, 100].
    pub overall_score: f64,
    /// Mean metric confidence in [0, 1].
    pub confidence: f64,
    pub grade: String,
    pub metrics: BTreeMap<String, MetricResult>,
    pub group_scores: BTreeMap<String, f64>,
    pub validation: ValidationReport,
    pub benchmark: BenchmarkComparison,
    pub summary: QualitySummary,
}

const BENCHMARK_TYPICAL: f64 = 65.0;
const BENCHMARK_GOOD: f64 = 80.0;
const BENCHMARK_EXCELLENT: f64 = 92.0;

/// Letter grade for a 0-100 score.
pub fn grade(score: f64) -> &'static str {
    match score {
        s if s >= 97.0 => "A+",
        s if s >= 93.0 => "A",
        s if s >= 90.0 => "A-",
        s if s >= 87.0 => "B+",
        s if s >= 83.0 => "B",
        s if s >= 80.0 => "B-",
        s if s >= 77.0 => "C+",
        s if s >= 73.0 => "C",
        s if s >= 70.0 => "C-",
        s if s >= 67.0 => "D+",
        s if s >= 63.0 => "D",
        s if s >= 60.0 => "D-",
        _ => "F",
    }
}

pub struct QualityEvaluator {
    config: SelectionConfig,
    matrix: CompatibilityMatrix,
    metrics: Vec<RegisteredMetric>,
}

impl QualityEvaluator {
    pub fn new(config: SelectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let matrix = config.build_compatibility_matrix();
        let mut evaluator = QualityEvaluator {
            config,
            matrix,
            metrics: Vec::new(),
        };
        evaluator.register_builtins();
        Ok(evaluator)
    }

    fn register_builtins(&mut self) {
        use MetricGroup::{Audience, Content, Coverage, Structure};
        let builtins: Vec<(&str, MetricGroup, MetricFn)> = vec![
            ("relevance", Content, Box::new(metrics::relevance)),
            ("completeness", Content, Box::new(metrics::completeness)),
            ("accuracy", Content, Box::new(metrics::accuracy)),
            ("logical-flow", Structure, Box::new(metrics::logical_flow)),
            (
                "dependency-satisfaction",
                Structure,
                Box::new(metrics::dependency_satisfaction),
            ),
            (
                "complexity-appropriateness",
                Structure,
                Box::new(metrics::complexity_appropriateness),
            ),
            (
                "audience-alignment",
                Audience,
                Box::new(metrics::audience_alignment),
            ),
            (
                "thematic-coherence",
                Audience,
                Box::new(metrics::thematic_coherence),
            ),
            ("tag-consistency", Audience, Box::new(metrics::tag_consistency)),
            (
                "category-coverage",
                Coverage,
                Box::new(metrics::category_coverage),
            ),
            ("topic-breadth", Coverage, Box::new(metrics::topic_breadth)),
            (
                "space-efficiency",
                Coverage,
                Box::new(metrics::space_efficiency),
            ),
        ];
        for (name, group, func) in builtins {
            self.metrics.push(RegisteredMetric {
                name: name.to_string(),
                group,
                func,
            });
        }
    }

    /// Registers an additional metric. It participates in its group's
    /// aggregate exactly like the built-ins. Registering a name twice makes
    /// the later registration win in the report.
    pub fn add_metric(
        &mut self,
        name: impl Into<String>,
        group: MetricGroup,
        func: MetricFn,
    ) {
        self.metrics.push(RegisteredMetric {
            name: name.into(),
            group,
            func,
        });
    }

    pub fn evaluate_quality(
        &self,
        selection: &[Document],
        constraints: &SelectionConstraints,
        selection_result: Option<&SelectionResult>,
    ) -> QualityReport {
        let input = MetricInput {
            selection,
            constraints,
            selection_result,
            config: &self.config,
            matrix: &self.matrix,
        };

        let mut results: BTreeMap<String, MetricResult> = BTreeMap::new();
        let mut groups: BTreeMap<MetricGroup, Vec<String>> = BTreeMap::new();
        for metric in &self.metrics {
            let outcome = (metric.func)(&input);
            let slot = groups.entry(metric.group).or_default();
            if !slot.contains(&metric.name) {
                slot.push(metric.name.clone());
            }
            results.insert(metric.name.clone(), outcome);
        }

        // Within a group each metric contributes in proportion to its
        // confidence; across groups the fixed group weights apply,
        // renormalized over the groups that produced any signal.
        let mut group_scores: BTreeMap<String, f64> = BTreeMap::new();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (group, names) in &groups {
            let mut value_sum = 0.0;
            let mut confidence_sum = 0.0;
            for name in names {
                if let Some(result) = results.get(name) {
                    value_sum += result.value * result.confidence;
                    confidence_sum += result.confidence;
                }
            }
            if confidence_sum > 0.0 {
                let score = value_sum / confidence_sum;
                group_scores.insert(group.as_str().to_string(), score);
                weighted_sum += group.weight() * score;
                weight_total += group.weight();
            }
        }
        let overall_score = if weight_total > 0.0 {
            (weighted_sum / weight_total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let confidence = if results.is_empty() {
            0.0
        } else {
            results.values().map(|r| r.confidence).sum::<f64>() / results.len() as f64
        };

        let validation =
            self.validate(selection, constraints, selection_result, overall_score);
        let summary = build_summary(&results, &validation);
        let benchmark = benchmark(overall_score);

        tracing::debug!(
            overall = overall_score,
            grade = grade(overall_score),
            valid = validation.is_valid(),
            "quality evaluation complete"
        );

        QualityReport {
            overall_score,
            confidence,
            grade: grade(overall_score).to_string(),
            metrics: results,
            group_scores,
            validation,
            benchmark,
            summary,
        }
    }

    fn validate(
        &self,
        selection: &[Document],
        constraints: &SelectionConstraints,
        selection_result: Option<&SelectionResult>,
        overall_score: f64,
    ) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut rule = |name: &str, ok: bool, severity: ValidationSeverity, message: String| {
            if ok {
                report.passed.push(name.to_string());
            } else {
                report.failed.push(ValidationFailure {
                    rule: name.to_string(),
                    severity,
                    message,
                });
            }
        };

        let total_size: usize = selection.iter().map(|d| d.size).sum();
        rule(
            "size-within-budget",
            total_size <= constraints.max_characters,
            ValidationSeverity::Error,
            format!(
                "selection size {total_size} exceeds the budget of {}",
                constraints.max_characters
            ),
        );

        let threshold = self.config.quality.quality_threshold;
        rule(
            "meets-quality-threshold",
            overall_score >= threshold,
            ValidationSeverity::Error,
            format!("overall score {overall_score:.1} is below the threshold of {threshold}"),
        );

        let unsatisfied = selection_result
            .map(|r| r.dependencies.unsatisfied.len())
            .unwrap_or(0);
        rule(
            "dependencies-satisfied",
            unsatisfied == 0,
            ValidationSeverity::Error,
            format!("{unsatisfied} required prerequisites are unsatisfied"),
        );

        rule(
            "non-empty-selection",
            !selection.is_empty(),
            ValidationSeverity::Warning,
            "the selection is empty".to_string(),
        );

        let mut category_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in selection {
            *category_counts.entry(doc.category.as_str()).or_default() += 1;
        }
        let cap = self.config.quality.per_category_cap;
        let over_cap: Vec<&&str> = category_counts
            .iter()
            .filter(|(_, count)| cap > 0 && **count > cap)
            .map(|(category, _)| category)
            .collect();
        rule(
            "per-category-cap",
            over_cap.is_empty(),
            ValidationSeverity::Warning,
            format!(
                "categories over the cap of {cap}: {}",
                over_cap
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );

        let cycles = selection_result
            .map(|r| r.dependencies.cycle_count)
            .unwrap_or(0);
        rule(
            "no-dependency-cycles",
            cycles == 0,
            ValidationSeverity::Warning,
            format!("{cycles} dependency cycles were detected during resolution"),
        );

        let total_rules = report.passed.len() + report.failed.len();
        report.score = if total_rules == 0 {
            1.0
        } else {
            report.passed.len() as f64 / total_rules as f64
        };
        report
    }
}

fn benchmark(score: f64) -> BenchmarkComparison {
    let standing = if score >= BENCHMARK_EXCELLENT {
        "excellent"
    } else if score >= BENCHMARK_GOOD {
        "good"
    } else if score >= BENCHMARK_TYPICAL {
        "typical"
    } else {
        "below typical"
    };
    BenchmarkComparison {
        vs_typical: score - BENCHMARK_TYPICAL,
        vs_good: score - BENCHMARK_GOOD,
        vs_excellent: score - BENCHMARK_EXCELLENT,
        standing: standing.to_string(),
    }
}

const STRENGTH_FLOOR: f64 = 0.8;
const WEAKNESS_CEILING: f64 = 0.5;

fn build_summary(
    results: &BTreeMap<String, MetricResult>,
    validation: &ValidationReport,
) -> QualitySummary {
    let mut summary = QualitySummary::default();
    for (name, result) in results {
        if result.confidence < 0.5 {
            continue;
        }
        if result.value >= STRENGTH_FLOOR {
            summary.strengths.push(name.clone());
        } else if result.value < WEAKNESS_CEILING {
            summary.weaknesses.push(name.clone());
        }
        for suggestion in &result.details.suggestions {
            if !summary.recommendations.contains(suggestion) {
                summary.recommendations.push(suggestion.clone());
            }
        }
    }
    for failure in &validation.failed {
        if failure.severity == ValidationSeverity::Error {
            summary.critical_issues.push(failure.message.clone());
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentRelations, Importance, Prerequisite};

    fn evaluator() -> QualityEvaluator {
        QualityEvaluator::new(SelectionConfig::default()).unwrap()
    }

    fn doc(id: &str, size: usize) -> Document {
        Document::new(id, id.to_uppercase(), "guide", size)
            .with_priority_score(70.0)
            .with_primary_tags(["rust"])
            .with_audience(["developers"])
    }

    #[test]
    fn grade_bands_cover_the_scale() {
        assert_eq!(grade(100.0), "A+");
        assert_eq!(grade(97.0), "A+");
        assert_eq!(grade(91.5), "A-");
        assert_eq!(grade(85.0), "B");
        assert_eq!(grade(60.0), "D-");
        assert_eq!(grade(59.9), "F");
        assert_eq!(grade(0.0), "F");
    }

    #[test]
    fn well_matched_selection_passes_validation() {
        let evaluator = evaluator();
        let selection = vec![doc("a", 500), doc("b", 350)];
        let mut constraints = SelectionConstraints::new(1000);
        constraints.target_tags = vec!["rust".to_string()];
        constraints.target_category = Some("guide".to_string());

        let report = evaluator.evaluate_quality(&selection, &constraints, None);
        assert!(report.overall_score > 60.0, "score {}", report.overall_score);
        assert!(report.validation.is_valid());
        assert_eq!(report.metrics.len(), 12);
        assert!(report.metrics.contains_key("relevance"));
        assert!(report.group_scores.contains_key("content"));
    }

    #[test]
    fn oversized_selection_fails_hard() {
        let evaluator = evaluator();
        let selection = vec![doc("a", 900), doc("b", 900)];
        let constraints = SelectionConstraints::new(1000);

        let report = evaluator.evaluate_quality(&selection, &constraints, None);
        assert!(!report.validation.is_valid());
        assert!(report
            .validation
            .failed
            .iter()
            .any(|f| f.rule == "size-within-budget"));
        assert!(!report.summary.critical_issues.is_empty());
    }

    #[test]
    fn empty_selection_warns_but_never_errors_on_emptiness() {
        let evaluator = evaluator();
        let constraints = SelectionConstraints::new(1000);
        let report = evaluator.evaluate_quality(&[], &constraints, None);
        let emptiness = report
            .validation
            .failed
            .iter()
            .find(|f| f.rule == "non-empty-selection")
            .unwrap();
        assert_eq!(emptiness.severity, ValidationSeverity::Warning);
    }

    #[test]
    fn missing_prerequisite_drags_dependency_metric_down() {
        let evaluator = evaluator();
        let mut dependent = doc("b", 300);
        dependent.relations = DocumentRelations {
            prerequisites: vec![Prerequisite {
                document_id: "missing".into(),
                importance: Importance::Required,
                reason: None,
            }],
            ..DocumentRelations::default()
        };
        let constraints = SelectionConstraints::new(1000);
        let report = evaluator.evaluate_quality(&[dependent], &constraints, None);
        let metric = &report.metrics["dependency-satisfaction"];
        assert_eq!(metric.value, 0.0);
        assert!(report
            .summary
            .weaknesses
            .contains(&"dependency-satisfaction".to_string()));
    }

    #[test]
    fn custom_metrics_join_their_group() {
        let mut evaluator = evaluator();
        evaluator.add_metric(
            "freshness",
            MetricGroup::Content,
            Box::new(|_input| MetricResult {
                value: 1.0,
                confidence: 1.0,
                details: MetricDetails {
                    measured: 1.0,
                    expected: 0.8,
                    reasoning: vec!["always fresh".to_string()],
                    suggestions: Vec::new(),
                },
            }),
        );
        let constraints = SelectionConstraints::new(1000);
        let report = evaluator.evaluate_quality(&[doc("a", 500)], &constraints, None);
        assert_eq!(report.metrics.len(), 13);
        assert!(report.metrics.contains_key("freshness"));
        assert!(report.summary.strengths.contains(&"freshness".to_string()));
    }

    #[test]
    fn benchmark_standing_tracks_the_score() {
        assert_eq!(benchmark(95.0).standing, "excellent");
        assert_eq!(benchmark(85.0).standing, "good");
        assert_eq!(benchmark(70.0).standing, "typical");
        assert_eq!(benchmark(40.0).standing, "below typical");
        assert!((benchmark(80.0).vs_typical - 15.0).abs() < 1e-9);
    }
}
