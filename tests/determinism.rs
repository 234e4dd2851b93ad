use chrono::{TimeZone, Utc};
use docset_core::config::{SelectionConfig, TagConfig};
use docset_core::selector::{AdaptiveDocumentSelector, SelectorOptions};
use docset_core::types::{Document, SelectionConstraints, SelectionResult};

fn make_doc(id: &str, size: usize, priority: f64, tags: &[&str]) -> Document {
    Document::new(id, id.to_uppercase(), "guide", size)
        .with_priority_score(priority)
        .with_primary_tags(tags.iter().copied())
        .with_audience(["developers"])
}

fn pool() -> Vec<Document> {
    vec![
        make_doc("alpha", 250, 80.0, &["rust", "async"]),
        make_doc("beta", 300, 70.0, &["rust"]),
        make_doc("gamma", 200, 60.0, &["tokio", "async"]),
        make_doc("delta", 400, 90.0, &["rust", "tokio"]),
    ]
}

fn config() -> SelectionConfig {
    SelectionConfig {
        categories: vec!["guide".to_string(), "reference".to_string()],
        tags: vec![
            TagConfig::new("rust").compatible_with(["async", "tokio"]),
            TagConfig::new("async").compatible_with(["tokio"]),
            TagConfig::new("tokio"),
        ],
        ..SelectionConfig::default()
    }
}

/// Wall-clock fields are informational and excluded from determinism
/// comparisons.
fn normalize(result: &mut SelectionResult) {
    result.run.started_at = Utc.timestamp_opt(0, 0).unwrap();
    result.run.elapsed_ms = 0.0;
}

#[test]
fn identical_inputs_serialize_byte_identically() {
    let selector = AdaptiveDocumentSelector::new(config()).unwrap();
    let docs = pool();
    let mut constraints = SelectionConstraints::new(800);
    constraints.target_tags = vec!["rust".to_string()];
    constraints.target_category = Some("guide".to_string());
    let options = SelectorOptions::default();

    let mut result1 = selector
        .select_documents(&docs, &constraints, &options)
        .unwrap();
    let mut result2 = selector
        .select_documents(&docs, &constraints, &options)
        .unwrap();

    assert_eq!(result1.run.fingerprint, result2.run.fingerprint);

    normalize(&mut result1);
    normalize(&mut result2);

    let json1 = serde_json::to_string_pretty(&result1).unwrap();
    let json2 = serde_json::to_string_pretty(&result2).unwrap();
    assert_eq!(json1, json2, "selection output is not deterministic");
}

#[test]
fn input_order_does_not_change_the_selected_set() {
    let selector = AdaptiveDocumentSelector::new(config()).unwrap();
    let forward = pool();
    let mut reversed = pool();
    reversed.reverse();

    let constraints = SelectionConstraints::new(800);
    // Greedy carries a full tie-break chain, so the chosen set is a pure
    // function of the pool contents.
    let options = SelectorOptions {
        strategy: "greedy".to_string(),
        ..SelectorOptions::default()
    };

    let result_fwd = selector
        .select_documents(&forward, &constraints, &options)
        .unwrap();
    let result_rev = selector
        .select_documents(&reversed, &constraints, &options)
        .unwrap();

    assert_eq!(result_fwd.run.fingerprint, result_rev.run.fingerprint);
    assert_eq!(result_fwd.selected_ids(), result_rev.selected_ids());
}

#[test]
fn result_round_trips_through_json() {
    let selector = AdaptiveDocumentSelector::new(config()).unwrap();
    let mut constraints = SelectionConstraints::new(800);
    constraints.target_tags = vec!["rust".to_string()];

    let result = selector
        .select_documents(&pool(), &constraints, &SelectorOptions::default())
        .unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let restored: SelectionResult = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, result);
    assert_eq!(restored.total_size(), result.total_size());
}
