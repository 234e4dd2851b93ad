use docset_core::graph::{ConflictResolution, DependencyGraphResolver, ResolveOptions};
use docset_core::types::{
    DeclaredConflict, Document, DocumentId, DocumentRelations, Importance, Prerequisite, Severity,
};

fn make_doc(id: &str, priority: f64) -> Document {
    Document::new(id, id.to_uppercase(), "guide", 100).with_priority_score(priority)
}

fn requires(ids: &[&str]) -> DocumentRelations {
    DocumentRelations {
        prerequisites: ids
            .iter()
            .map(|id| Prerequisite {
                document_id: (*id).into(),
                importance: Importance::Required,
                reason: None,
            })
            .collect(),
        ..DocumentRelations::default()
    }
}

fn conflicts_with(id: &str, severity: Severity) -> DocumentRelations {
    DocumentRelations {
        conflicts: vec![DeclaredConflict {
            document_id: id.into(),
            severity,
            reason: None,
        }],
        ..DocumentRelations::default()
    }
}

#[test]
fn cycles_are_reported_but_never_fatal() {
    let mut a = make_doc("a", 50.0);
    a.relations = requires(&["b"]);
    let mut b = make_doc("b", 50.0);
    b.relations = requires(&["a"]);

    let resolver = DependencyGraphResolver::new(ResolveOptions::default());
    let result = resolver.resolve(&[a, b]);

    assert_eq!(result.cycles.len(), 1);
    // Both documents survive resolution; the order falls back to a
    // deterministic traversal when no topological order exists.
    assert_eq!(result.resolved.len(), 2);
    assert!(result.errors.is_empty());
}

#[test]
fn dangling_references_are_collected_not_raised() {
    let mut a = make_doc("a", 50.0);
    a.relations = requires(&["ghost"]);

    let resolver = DependencyGraphResolver::new(ResolveOptions::default());
    let result = resolver.resolve(&[a]);

    assert_eq!(result.missing_references.len(), 1);
    assert_eq!(result.missing_references[0].from.as_str(), "a");
    assert_eq!(result.missing_references[0].to.as_str(), "ghost");
    assert_eq!(result.resolved.len(), 1);
}

#[test]
fn required_expansion_stops_at_max_depth() {
    // d3 -> d2 -> d1 -> d0, one hop allowed.
    let mut d3 = make_doc("d3", 50.0);
    d3.relations = requires(&["d2"]);
    let mut d2 = make_doc("d2", 50.0);
    d2.relations = requires(&["d1"]);
    let mut d1 = make_doc("d1", 50.0);
    d1.relations = requires(&["d0"]);
    let d0 = make_doc("d0", 50.0);

    let resolver = DependencyGraphResolver::new(ResolveOptions {
        max_depth: 1,
        ..ResolveOptions::default()
    });
    let result = resolver.resolve(&[d3, d2, d1, d0]);

    assert!(result.truncated);
    // Each document still contributes its direct prerequisite.
    for id in ["d2", "d1", "d0"] {
        assert!(result.required.contains(&DocumentId::new(id)));
    }
}

#[test]
fn excluding_a_prerequisite_surfaces_the_broken_chain() {
    // "a" requires "b"; "b" loses its conflict against "c". The exclusion
    // must be reported as an unsatisfied dependency, not hidden.
    let mut a = make_doc("a", 80.0);
    a.relations = requires(&["b"]);
    let mut b = make_doc("b", 50.0);
    b.relations = conflicts_with("c", Severity::Major);
    let c = make_doc("c", 90.0);

    let resolver = DependencyGraphResolver::new(ResolveOptions::default());
    let result = resolver.resolve(&[a, b, c]);

    assert_eq!(result.excluded, vec!["b".into()]);
    assert_eq!(result.unsatisfied.len(), 1);
    assert_eq!(result.unsatisfied[0].document.as_str(), "a");
    assert_eq!(result.unsatisfied[0].missing_prerequisite.as_str(), "b");
}

#[test]
fn exclude_conflicts_ties_are_flagged_not_dropped() {
    let mut a = make_doc("a", 50.0);
    a.relations = conflicts_with("b", Severity::Moderate);
    let b = make_doc("b", 50.0);

    let resolver = DependencyGraphResolver::new(ResolveOptions {
        conflict_resolution: ConflictResolution::ExcludeConflicts,
        ..ResolveOptions::default()
    });
    let result = resolver.resolve(&[a, b]);

    assert!(result.excluded.is_empty());
    assert_eq!(result.flagged_pairs.len(), 1);
    assert_eq!(result.resolved.len(), 2);
}

#[test]
fn manual_review_never_excludes() {
    let mut a = make_doc("a", 90.0);
    a.relations = conflicts_with("b", Severity::Major);
    let b = make_doc("b", 10.0);

    let resolver = DependencyGraphResolver::new(ResolveOptions {
        conflict_resolution: ConflictResolution::ManualReview,
        ..ResolveOptions::default()
    });
    let result = resolver.resolve(&[a, b]);

    assert!(result.excluded.is_empty());
    assert!(result.applied_resolutions.is_empty());
    assert_eq!(result.flagged_pairs.len(), 1);
}

#[test]
fn break_cycles_only_touches_conflicts_on_a_shared_cycle() {
    // a <-> b form a cycle and conflict; c conflicts d off-cycle.
    let mut a = make_doc("a", 60.0);
    a.relations = DocumentRelations {
        prerequisites: requires(&["b"]).prerequisites,
        conflicts: conflicts_with("b", Severity::Moderate).conflicts,
        ..DocumentRelations::default()
    };
    let mut b = make_doc("b", 40.0);
    b.relations = requires(&["a"]);
    let mut c = make_doc("c", 90.0);
    c.relations = conflicts_with("d", Severity::Major);
    let d = make_doc("d", 10.0);

    let resolver = DependencyGraphResolver::new(ResolveOptions {
        conflict_resolution: ConflictResolution::BreakCycles,
        ..ResolveOptions::default()
    });
    let result = resolver.resolve(&[a, b, c, d]);

    // The on-cycle pair is settled; the off-cycle pair is only flagged.
    assert_eq!(result.applied_resolutions.len(), 1);
    assert_eq!(result.excluded.len(), 1);
    assert_eq!(result.flagged_pairs.len(), 1);
    assert!(result
        .flagged_pairs
        .iter()
        .any(|(x, y)| x.as_str() == "c" && y.as_str() == "d"));
}

#[test]
fn empty_prerequisite_ids_land_in_errors() {
    let mut a = make_doc("a", 50.0);
    a.relations = DocumentRelations {
        prerequisites: vec![Prerequisite {
            document_id: "".into(),
            importance: Importance::Required,
            reason: None,
        }],
        ..DocumentRelations::default()
    };

    let resolver = DependencyGraphResolver::new(ResolveOptions::default());
    let result = resolver.resolve(&[a]);

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("empty id"));
    assert_eq!(result.resolved.len(), 1);
}
