use docset_core::config::SelectionConfig;
use docset_core::quality::{QualityEvaluator, ValidationSeverity};
use docset_core::selector::{AdaptiveDocumentSelector, SelectorOptions};
use docset_core::types::{Document, SelectionConstraints};

fn make_doc(id: &str, size: usize, priority: f64) -> Document {
    Document::new(id, id.to_uppercase(), "guide", size)
        .with_priority_score(priority)
        .with_primary_tags(["rust"])
        .with_audience(["developers"])
}

#[test]
fn a_selector_result_evaluates_cleanly() {
    let config = SelectionConfig::default();
    let selector = AdaptiveDocumentSelector::new(config.clone()).unwrap();
    let evaluator = QualityEvaluator::new(config).unwrap();

    let docs = vec![
        make_doc("a", 400, 90.0),
        make_doc("b", 350, 80.0),
        make_doc("c", 600, 20.0),
    ];
    let mut constraints = SelectionConstraints::new(1000);
    constraints.target_tags = vec!["rust".to_string()];
    constraints.target_category = Some("guide".to_string());

    let result = selector
        .select_documents(&docs, &constraints, &SelectorOptions::default())
        .unwrap();
    let report = evaluator.evaluate_quality(&result.selected, &constraints, Some(&result));

    assert!(report.validation.is_valid(), "{:?}", report.validation.failed);
    assert!(report.overall_score >= 60.0, "score {}", report.overall_score);
    assert_ne!(report.grade, "F");
    assert_eq!(report.metrics.len(), 12);
    assert!(report.confidence > 0.0 && report.confidence <= 1.0);
}

#[test]
fn an_overflowing_selection_fails_validation_with_an_error() {
    let evaluator = QualityEvaluator::new(SelectionConfig::default()).unwrap();
    let selection = vec![make_doc("a", 800, 90.0), make_doc("b", 800, 80.0)];
    let constraints = SelectionConstraints::new(1000);

    let report = evaluator.evaluate_quality(&selection, &constraints, None);

    assert!(!report.validation.is_valid());
    let failure = report
        .validation
        .failed
        .iter()
        .find(|f| f.rule == "size-within-budget")
        .expect("budget rule must fail");
    assert_eq!(failure.severity, ValidationSeverity::Error);
    assert!(report
        .summary
        .critical_issues
        .iter()
        .any(|issue| issue.contains("exceeds the budget")));
}

#[test]
fn metric_details_explain_themselves() {
    let evaluator = QualityEvaluator::new(SelectionConfig::default()).unwrap();
    let selection = vec![make_doc("a", 400, 90.0)];
    let mut constraints = SelectionConstraints::new(1000);
    constraints.required_topics = vec!["rust".to_string(), "wasm".to_string()];

    let report = evaluator.evaluate_quality(&selection, &constraints, None);

    let completeness = &report.metrics["completeness"];
    assert!((completeness.value - 0.5).abs() < 1e-9);
    assert!(!completeness.details.reasoning.is_empty());
    assert!(!completeness.details.suggestions.is_empty());

    // Every metric stays inside the unit interval.
    for (name, metric) in &report.metrics {
        assert!(
            (0.0..=1.0).contains(&metric.value),
            "{name} value out of range"
        );
        assert!(
            (0.0..=1.0).contains(&metric.confidence),
            "{name} confidence out of range"
        );
    }
}

#[test]
fn benchmark_standing_matches_the_score() {
    let evaluator = QualityEvaluator::new(SelectionConfig::default()).unwrap();
    let selection = vec![make_doc("a", 850, 95.0)];
    let mut constraints = SelectionConstraints::new(1000);
    constraints.target_tags = vec!["rust".to_string()];
    constraints.target_category = Some("guide".to_string());

    let report = evaluator.evaluate_quality(&selection, &constraints, None);

    let expected = if report.overall_score >= 92.0 {
        "excellent"
    } else if report.overall_score >= 80.0 {
        "good"
    } else if report.overall_score >= 65.0 {
        "typical"
    } else {
        "below typical"
    };
    assert_eq!(report.benchmark.standing, expected);
    assert!(
        (report.benchmark.vs_typical - (report.overall_score - 65.0)).abs() < 1e-9
    );
}
