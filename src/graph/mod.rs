//! Dependency-graph construction, resolution, and conflict handling.
//!
//! The graph is an adjacency map over document ids, so cyclic declarations
//! are just repeated keys rather than pointer cycles. Malformed dependency
//! entries (empty ids) and dangling references are collected and reported —
//! they never abort a resolution.

pub mod cycles;

pub use cycles::{detect_cycles, topological_order, TopologicalOrder};

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Document, DocumentId, Importance, Severity, UnsatisfiedDependency};

/// A dependency or reference pointing at an id absent from the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingReference {
    pub from: DocumentId,
    pub to: DocumentId,
}

/// Directed dependency graph over the candidate pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    nodes: BTreeSet<DocumentId>,
    edges: BTreeMap<DocumentId, BTreeSet<DocumentId>>,
    pub missing_references: Vec<MissingReference>,
}

impl DependencyGraph {
    pub fn add_node(&mut self, node: DocumentId) {
        self.nodes.insert(node);
    }

    pub fn add_edge(&mut self, from: DocumentId, to: DocumentId) {
        self.edges.entry(from).or_default().insert(to);
    }

    pub fn nodes(&self) -> &BTreeSet<DocumentId> {
        &self.nodes
    }

    pub fn successors<'g>(
        &'g self,
        node: &DocumentId,
    ) -> impl Iterator<Item = &'g DocumentId> + 'g {
        self.edges.get(node).into_iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Edges rendered as `"from->to"` keys, sorted.
    pub fn edge_keys(&self) -> Vec<String> {
        self.edges
            .iter()
            .flat_map(|(from, tos)| {
                tos.iter()
                    .map(move |to| format!("{}->{}", from.as_str(), to.as_str()))
            })
            .collect()
    }
}

/// How to settle a conflicting pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Drop the lower-scoring side; ties drop neither and get flagged.
    ExcludeConflicts,
    /// Always keep the higher-priority side, breaking ties by tier then id.
    #[default]
    HigherScoreWins,
    /// Only break conflicts that sit on a dependency cycle, dropping the
    /// side fewer documents require.
    BreakCycles,
    /// Exclude neither; flag every pair for human resolution.
    ManualReview,
}

impl ConflictResolution {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictResolution::ExcludeConflicts => "exclude-conflicts",
            ConflictResolution::HigherScoreWins => "higher-score-wins",
            ConflictResolution::BreakCycles => "break-cycles",
            ConflictResolution::ManualReview => "manual-review",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Maximum hops followed when expanding required prerequisites.
    pub max_depth: usize,
    /// Whether optional prerequisites produce graph edges.
    pub include_optional: bool,
    pub conflict_resolution: ConflictResolution,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            max_depth: 5,
            include_optional: false,
            conflict_resolution: ConflictResolution::default(),
        }
    }
}

/// One settled conflict pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedResolution {
    pub strategy: ConflictResolution,
    pub kept: DocumentId,
    pub excluded: DocumentId,
    pub reason: String,
}

/// The full outcome of dependency resolution. Always produced, even for
/// cyclic or partially malformed input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Kept documents in dependency-respecting order.
    pub resolved: Vec<DocumentId>,
    /// Ids that some pool document transitively requires.
    pub required: BTreeSet<DocumentId>,
    /// True when required expansion stopped at `max_depth`.
    pub truncated: bool,
    pub cycles: Vec<Vec<DocumentId>>,
    pub applied_resolutions: Vec<AppliedResolution>,
    pub excluded: Vec<DocumentId>,
    /// Conflict pairs left for manual review.
    pub flagged_pairs: Vec<(DocumentId, DocumentId)>,
    /// Required prerequisites broken by exclusion. Never silently dropped.
    pub unsatisfied: Vec<UnsatisfiedDependency>,
    /// Malformed dependency entries, recorded without aborting.
    pub errors: Vec<String>,
    pub missing_references: Vec<MissingReference>,
}

pub struct DependencyGraphResolver {
    options: ResolveOptions,
}

impl DependencyGraphResolver {
    pub fn new(options: ResolveOptions) -> Self {
        DependencyGraphResolver { options }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Builds the graph: one node per pool id, one `prereq -> doc` edge per
    /// admitted prerequisite, one `referenced -> doc` edge per reference.
    /// Dangling targets land in `missing_references`; malformed entries land
    /// in the returned error list.
    pub fn build_graph(&self, documents: &[Document]) -> (DependencyGraph, Vec<String>) {
        let mut graph = DependencyGraph::default();
        let mut errors = Vec::new();

        let pool: BTreeSet<&DocumentId> = documents.iter().map(|d| &d.id).collect();
        for doc in documents {
            graph.add_node(doc.id.clone());
        }

        for doc in documents {
            for prereq in &doc.relations.prerequisites {
                if prereq.document_id.is_empty() {
                    errors.push(format!(
                        "document '{}' declares a prerequisite with an empty id",
                        doc.id
                    ));
                    continue;
                }
                if prereq.importance == Importance::Optional && !self.options.include_optional {
                    continue;
                }
                if pool.contains(&prereq.document_id) {
                    graph.add_edge(prereq.document_id.clone(), doc.id.clone());
                } else {
                    graph.missing_references.push(MissingReference {
                        from: doc.id.clone(),
                        to: prereq.document_id.clone(),
                    });
                }
            }
            for reference in &doc.relations.references {
                if reference.document_id.is_empty() {
                    errors.push(format!(
                        "document '{}' declares a reference with an empty id",
                        doc.id
                    ));
                    continue;
                }
                if pool.contains(&reference.document_id) {
                    graph.add_edge(reference.document_id.clone(), doc.id.clone());
                } else {
                    graph.missing_references.push(MissingReference {
                        from: doc.id.clone(),
                        to: reference.document_id.clone(),
                    });
                }
            }
        }

        (graph, errors)
    }

    /// Full resolution: graph build, cycle detection, required expansion,
    /// conflict handling, and a dependency-respecting order of what remains.
    pub fn resolve(&self, documents: &[Document]) -> ResolutionResult {
        let by_id: BTreeMap<&DocumentId, &Document> =
            documents.iter().map(|d| (&d.id, d)).collect();

        let (graph, mut errors) = self.build_graph(documents);
        let cycles = detect_cycles(&graph);

        let (required, truncated) = self.required_closure(documents, &by_id);

        let (pairs, conflict_errors) = collect_conflict_pairs(documents, &by_id);
        errors.extend(conflict_errors);

        let mut applied_resolutions = Vec::new();
        let mut excluded_set: BTreeSet<DocumentId> = BTreeSet::new();
        let mut flagged_pairs = Vec::new();

        for pair in &pairs {
            let (a, b) = (&pair.a, &pair.b);
            let (Some(doc_a), Some(doc_b)) = (by_id.get(a), by_id.get(b)) else {
                continue;
            };
            match self.settle(doc_a, doc_b, pair.severity, &cycles, documents) {
                Settlement::Exclude { kept, excluded, reason } => {
                    excluded_set.insert(excluded.clone());
                    applied_resolutions.push(AppliedResolution {
                        strategy: self.options.conflict_resolution,
                        kept,
                        excluded,
                        reason,
                    });
                }
                Settlement::Flag => flagged_pairs.push((a.clone(), b.clone())),
            }
        }

        // Exclusions can break required chains; report, never hide.
        let mut unsatisfied = Vec::new();
        for doc in documents {
            if excluded_set.contains(&doc.id) {
                continue;
            }
            for prereq in &doc.relations.prerequisites {
                if prereq.importance == Importance::Required
                    && excluded_set.contains(&prereq.document_id)
                {
                    unsatisfied.push(UnsatisfiedDependency {
                        document: doc.id.clone(),
                        missing_prerequisite: prereq.document_id.clone(),
                        cause: format!(
                            "prerequisite excluded by {} conflict resolution",
                            self.options.conflict_resolution.as_str()
                        ),
                    });
                }
            }
        }

        let topo = topological_order(&graph);
        let resolved: Vec<DocumentId> = topo
            .order
            .into_iter()
            .filter(|id| !excluded_set.contains(id))
            .collect();

        debug!(
            resolved = resolved.len(),
            excluded = excluded_set.len(),
            cycles = cycles.len(),
            unsatisfied = unsatisfied.len(),
            "dependency resolution finished"
        );

        ResolutionResult {
            resolved,
            required,
            truncated,
            cycles,
            applied_resolutions,
            excluded: excluded_set.into_iter().collect(),
            flagged_pairs,
            unsatisfied,
            errors,
            missing_references: graph.missing_references,
        }
    }

    /// Breadth-first expansion of required prerequisites, transitively,
    /// bounded by `max_depth` hops from each declaring document. Chains cut
    /// at the bound set the truncation flag; truncation is reported, never
    /// an error.
    fn required_closure(
        &self,
        documents: &[Document],
        by_id: &BTreeMap<&DocumentId, &Document>,
    ) -> (BTreeSet<DocumentId>, bool) {
        let mut required: BTreeSet<DocumentId> = BTreeSet::new();
        let mut truncated = false;

        for doc in documents {
            let mut reached: BTreeSet<&DocumentId> = BTreeSet::new();
            let mut frontier: VecDeque<(&DocumentId, usize)> = doc
                .relations
                .prerequisites
                .iter()
                .filter(|p| p.importance == Importance::Required)
                .filter(|p| by_id.contains_key(&p.document_id))
                .map(|p| (&p.document_id, 1))
                .collect();

            while let Some((id, depth)) = frontier.pop_front() {
                if !reached.insert(id) {
                    continue;
                }
                required.insert(id.clone());
                let Some(target) = by_id.get(id) else { continue };
                for prereq in &target.relations.prerequisites {
                    if prereq.importance != Importance::Required
                        || !by_id.contains_key(&prereq.document_id)
                        || reached.contains(&prereq.document_id)
                    {
                        continue;
                    }
                    if depth >= self.options.max_depth {
                        truncated = true;
                    } else {
                        frontier.push_back((&prereq.document_id, depth + 1));
                    }
                }
            }
        }
        (required, truncated)
    }

    fn settle(
        &self,
        a: &Document,
        b: &Document,
        severity: Severity,
        cycles: &[Vec<DocumentId>],
        documents: &[Document],
    ) -> Settlement {
        match self.options.conflict_resolution {
            ConflictResolution::ManualReview => Settlement::Flag,
            ConflictResolution::ExcludeConflicts => {
                if a.priority_score == b.priority_score {
                    // Tie: drop neither, leave the pair for manual review.
                    Settlement::Flag
                } else {
                    let (kept, dropped) = if a.priority_score > b.priority_score {
                        (a, b)
                    } else {
                        (b, a)
                    };
                    Settlement::exclude(kept, dropped, severity, "lower priority score")
                }
            }
            ConflictResolution::HigherScoreWins => {
                let (kept, dropped) = higher_priority_side(a, b);
                Settlement::exclude(kept, dropped, severity, "lower priority score")
            }
            ConflictResolution::BreakCycles => {
                let on_shared_cycle = cycles
                    .iter()
                    .any(|cycle| cycle.contains(&a.id) && cycle.contains(&b.id));
                if !on_shared_cycle {
                    return Settlement::Flag;
                }
                let dependents_a = required_dependents(&a.id, documents);
                let dependents_b = required_dependents(&b.id, documents);
                let (kept, dropped) = if dependents_a != dependents_b {
                    if dependents_a > dependents_b {
                        (a, b)
                    } else {
                        (b, a)
                    }
                } else {
                    higher_priority_side(a, b)
                };
                Settlement::exclude(kept, dropped, severity, "least dependency impact on cycle")
            }
        }
    }
}

/// Deterministic "keep the stronger document" comparison: priority score,
/// then tier, then the lexicographically smaller id.
pub(crate) fn higher_priority_side<'a>(
    a: &'a Document,
    b: &'a Document,
) -> (&'a Document, &'a Document) {
    if a.priority_score != b.priority_score {
        if a.priority_score > b.priority_score {
            (a, b)
        } else {
            (b, a)
        }
    } else if a.priority_tier != b.priority_tier {
        if a.priority_tier > b.priority_tier {
            (a, b)
        } else {
            (b, a)
        }
    } else if a.id <= b.id {
        (a, b)
    } else {
        (b, a)
    }
}

fn required_dependents(id: &DocumentId, documents: &[Document]) -> usize {
    documents
        .iter()
        .filter(|doc| {
            doc.relations
                .prerequisites
                .iter()
                .any(|p| p.importance == Importance::Required && &p.document_id == id)
        })
        .count()
}

enum Settlement {
    Exclude {
        kept: DocumentId,
        excluded: DocumentId,
        reason: String,
    },
    Flag,
}

impl Settlement {
    fn exclude(kept: &Document, dropped: &Document, severity: Severity, why: &str) -> Self {
        Settlement::Exclude {
            kept: kept.id.clone(),
            excluded: dropped.id.clone(),
            reason: format!("{why} ({severity:?} conflict)"),
        }
    }
}

struct ConflictPair {
    a: DocumentId,
    b: DocumentId,
    severity: Severity,
}

/// Collects each declared conflict once per undirected pair, keeping the
/// highest declared severity. Conflicts pointing outside the pool are
/// ignored here (they cannot affect the selection).
fn collect_conflict_pairs(
    documents: &[Document],
    by_id: &BTreeMap<&DocumentId, &Document>,
) -> (Vec<ConflictPair>, Vec<String>) {
    let mut severities: BTreeMap<(DocumentId, DocumentId), Severity> = BTreeMap::new();
    let mut errors = Vec::new();

    for doc in documents {
        for conflict in &doc.relations.conflicts {
            if conflict.document_id.is_empty() {
                errors.push(format!(
                    "document '{}' declares a conflict with an empty id",
                    doc.id
                ));
                continue;
            }
            if conflict.document_id == doc.id {
                errors.push(format!("document '{}' declares a conflict with itself", doc.id));
                continue;
            }
            if !by_id.contains_key(&conflict.document_id) {
                continue;
            }
            let key = if doc.id <= conflict.document_id {
                (doc.id.clone(), conflict.document_id.clone())
            } else {
                (conflict.document_id.clone(), doc.id.clone())
            };
            severities
                .entry(key)
                .and_modify(|s| *s = (*s).max(conflict.severity))
                .or_insert(conflict.severity);
        }
    }

    let pairs = severities
        .into_iter()
        .map(|((a, b), severity)| ConflictPair { a, b, severity })
        .collect();
    (pairs, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeclaredConflict, DocumentRelations, Prerequisite};

    fn doc_with_prereq(id: &str, prereq: &str, importance: Importance) -> Document {
        Document::new(id, id.to_uppercase(), "guide", 100).with_relations(DocumentRelations {
            prerequisites: vec![Prerequisite {
                document_id: DocumentId::new(prereq),
                importance,
                reason: None,
            }],
            ..DocumentRelations::default()
        })
    }

    #[test]
    fn optional_prerequisites_follow_policy() {
        let docs = vec![
            Document::new("base", "Base", "guide", 100),
            doc_with_prereq("top", "base", Importance::Optional),
        ];
        let strict = DependencyGraphResolver::new(ResolveOptions::default());
        let (graph, _) = strict.build_graph(&docs);
        assert_eq!(graph.edge_count(), 0);

        let lenient = DependencyGraphResolver::new(ResolveOptions {
            include_optional: true,
            ..ResolveOptions::default()
        });
        let (graph, _) = lenient.build_graph(&docs);
        assert_eq!(graph.edge_keys(), vec!["base->top".to_string()]);
    }

    #[test]
    fn dangling_targets_become_missing_references() {
        let docs = vec![doc_with_prereq("top", "ghost", Importance::Required)];
        let resolver = DependencyGraphResolver::new(ResolveOptions::default());
        let (graph, errors) = resolver.build_graph(&docs);
        assert!(errors.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.missing_references.len(), 1);
        assert_eq!(graph.missing_references[0].to.as_str(), "ghost");
    }

    #[test]
    fn empty_ids_are_recorded_not_fatal() {
        let docs = vec![doc_with_prereq("top", "", Importance::Required)];
        let resolver = DependencyGraphResolver::new(ResolveOptions::default());
        let result = resolver.resolve(&docs);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.resolved.len(), 1);
    }

    #[test]
    fn required_closure_is_transitive_and_bounded() {
        let docs = vec![
            Document::new("d0", "D0", "guide", 10),
            doc_with_prereq("d1", "d0", Importance::Required),
            doc_with_prereq("d2", "d1", Importance::Required),
            doc_with_prereq("d3", "d2", Importance::Required),
        ];
        let deep = DependencyGraphResolver::new(ResolveOptions::default());
        let result = deep.resolve(&docs);
        assert!(result.required.contains(&DocumentId::new("d0")));
        assert!(!result.truncated);

        let shallow = DependencyGraphResolver::new(ResolveOptions {
            max_depth: 1,
            ..ResolveOptions::default()
        });
        let result = shallow.resolve(&docs);
        // One hop reaches the direct prerequisites only; deeper links report
        // truncation.
        assert!(result.truncated);
    }

    #[test]
    fn higher_score_wins_drops_the_loser_and_reports_broken_chains() {
        let a = doc_with_prereq("a", "b", Importance::Required).with_priority_score(90.0);
        let mut b = Document::new("b", "B", "guide", 100).with_priority_score(85.0);
        b.relations.conflicts.push(DeclaredConflict {
            document_id: DocumentId::new("c"),
            severity: Severity::Major,
            reason: None,
        });
        let c = Document::new("c", "C", "guide", 100).with_priority_score(95.0);

        let resolver = DependencyGraphResolver::new(ResolveOptions {
            conflict_resolution: ConflictResolution::HigherScoreWins,
            ..ResolveOptions::default()
        });
        let result = resolver.resolve(&[a, b, c]);

        assert_eq!(result.excluded, vec![DocumentId::new("b")]);
        assert_eq!(result.unsatisfied.len(), 1);
        assert_eq!(result.unsatisfied[0].document.as_str(), "a");
        assert_eq!(result.unsatisfied[0].missing_prerequisite.as_str(), "b");
    }

    #[test]
    fn exclude_conflicts_flags_ties() {
        let mut a = Document::new("a", "A", "guide", 100).with_priority_score(50.0);
        a.relations.conflicts.push(DeclaredConflict {
            document_id: DocumentId::new("b"),
            severity: Severity::Moderate,
            reason: None,
        });
        let b = Document::new("b", "B", "guide", 100).with_priority_score(50.0);

        let resolver = DependencyGraphResolver::new(ResolveOptions {
            conflict_resolution: ConflictResolution::ExcludeConflicts,
            ..ResolveOptions::default()
        });
        let result = resolver.resolve(&[a, b]);
        assert!(result.excluded.is_empty());
        assert_eq!(result.flagged_pairs.len(), 1);
    }

    #[test]
    fn manual_review_excludes_nothing() {
        let mut a = Document::new("a", "A", "guide", 100).with_priority_score(10.0);
        a.relations.conflicts.push(DeclaredConflict {
            document_id: DocumentId::new("b"),
            severity: Severity::Major,
            reason: None,
        });
        let b = Document::new("b", "B", "guide", 100).with_priority_score(90.0);

        let resolver = DependencyGraphResolver::new(ResolveOptions {
            conflict_resolution: ConflictResolution::ManualReview,
            ..ResolveOptions::default()
        });
        let result = resolver.resolve(&[a, b]);
        assert!(result.excluded.is_empty());
        assert_eq!(result.flagged_pairs.len(), 1);
        assert_eq!(result.resolved.len(), 2);
    }

    #[test]
    fn resolved_order_respects_prerequisites() {
        let docs = vec![
            doc_with_prereq("mid", "base", Importance::Required),
            Document::new("base", "Base", "guide", 10),
            doc_with_prereq("top", "mid", Importance::Required),
        ];
        let resolver = DependencyGraphResolver::new(ResolveOptions::default());
        let result = resolver.resolve(&docs);
        let pos = |id: &str| {
            result
                .resolved
                .iter()
                .position(|n| n.as_str() == id)
                .unwrap()
        };
        assert!(pos("base") < pos("mid"));
        assert!(pos("mid") < pos("top"));
    }

    #[test]
    fn cyclic_declarations_never_abort() {
        let docs = vec![
            doc_with_prereq("a", "b", Importance::Required),
            doc_with_prereq("b", "a", Importance::Required),
        ];
        let resolver = DependencyGraphResolver::new(ResolveOptions::default());
        let result = resolver.resolve(&docs);
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.resolved.len(), 2);
    }
}
