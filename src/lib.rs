//! Constrained multi-criteria document selection.
//!
//! `docset-core` scores, filters, and selects documents under a hard size
//! budget: weighted multi-criteria scoring, tag-compatibility filtering,
//! dependency resolution with cycle handling, conflict detection, four
//! selection algorithms (greedy, knapsack, TOPSIS, hybrid), and quality
//! evaluation of the resulting set. All operations are deterministic —
//! identical inputs always produce identical outputs, byte-for-byte.

pub mod config;
pub mod conflict;
pub mod filter;
pub mod graph;
pub mod quality;
pub mod scoring;
pub mod selector;
pub mod types;
