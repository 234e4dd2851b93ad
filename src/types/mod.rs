pub mod context;
pub mod document;
pub mod results;

pub use context::{
    Algorithm, CriteriaWeights, SelectionConstraints, SelectionContext, Strategy,
    UnknownStrategyError,
};
pub use document::{
    check_unique_ids, Complexity, CompositionHints, DeclaredConflict, Document, DocumentError,
    DocumentId, DocumentRelations, Importance, Prerequisite, PriorityTier, RelatedReference,
    Severity,
};
pub use results::{
    selection_fingerprint, BreakdownEntry, ConflictSummary, CoverageAnalysis, DependencySummary,
    OptimizationMetrics, RunMetadata, ScoringResult, ScoringStats, SelectionResult,
    TagAffinityReport, UnsatisfiedDependency,
};
