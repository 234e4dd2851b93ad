//! The four selection algorithms.
//!
//! Each algorithm is a pure function over lightweight items and a size
//! budget, returning indices into its input slice. Orchestration (forced
//! required documents, iteration, metric assembly) lives in the parent
//! module.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::DocumentId;

/// What an algorithm needs to know about one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgoItem {
    pub id: DocumentId,
    pub size: usize,
    pub value: f64,
    pub category: String,
}

/// Knapsack DP width cap; budgets are discretized so the table never grows
/// past this many columns.
const KNAPSACK_MAX_UNITS: usize = 2000;
/// Value bonus for the best item of each category (encourages introducing
/// new categories).
const DIVERSITY_BONUS: f64 = 0.05;
/// Value penalty for items ranked past the per-category cap.
const OVERCAP_PENALTY: f64 = 0.1;

/// Sort by value descending, smaller size first on ties, id as the final
/// tie-break; accept while the budget holds. O(n log n).
pub fn greedy(items: &[AlgoItem], budget: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        items[b]
            .value
            .partial_cmp(&items[a].value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| items[a].size.cmp(&items[b].size))
            .then_with(|| items[a].id.cmp(&items[b].id))
    });

    let mut selected = Vec::new();
    let mut used = 0usize;
    for index in order {
        if used + items[index].size <= budget {
            used += items[index].size;
            selected.push(index);
        }
    }
    selected.sort_unstable();
    selected
}

/// 0/1 dynamic-programming knapsack over discretized size units, maximizing
/// total value under the budget. A category-diversity adjustment is folded
/// into item values before the DP runs: the strongest item of each category
/// gets a small bonus, items ranked past `per_category_cap` within their
/// category get a penalty. O(n × budget).
pub fn knapsack(items: &[AlgoItem], budget: usize, per_category_cap: usize) -> Vec<usize> {
    if budget == 0 || items.is_empty() {
        return Vec::new();
    }

    // Item sizes round up, so the reconstructed selection can only be
    // smaller than the discretized optimum, never over the real budget.
    let unit = (budget / KNAPSACK_MAX_UNITS).max(1);
    let capacity = budget / unit;

    let values = adjusted_values(items, per_category_cap);
    let weights: Vec<usize> = items.iter().map(|i| i.size.div_ceil(unit)).collect();

    let mut dp = vec![0.0f64; capacity + 1];
    let mut take = vec![vec![false; capacity + 1]; items.len()];

    for (i, &w) in weights.iter().enumerate() {
        if w > capacity {
            continue;
        }
        for c in (w..=capacity).rev() {
            let candidate = dp[c - w] + values[i];
            if candidate > dp[c] {
                dp[c] = candidate;
                take[i][c] = true;
            }
        }
    }

    // Reconstruct from the last row down.
    let mut selected = Vec::new();
    let mut c = capacity;
    for i in (0..items.len()).rev() {
        if take[i][c] {
            selected.push(i);
            c -= weights[i];
        }
    }
    selected.sort_unstable();
    selected
}

fn adjusted_values(items: &[AlgoItem], per_category_cap: usize) -> Vec<f64> {
    // Rank items within their category by value.
    let mut by_category: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        by_category.entry(item.category.as_str()).or_default().push(i);
    }

    let mut values: Vec<f64> = items.iter().map(|i| i.value).collect();
    for indices in by_category.values_mut() {
        indices.sort_by(|&a, &b| {
            items[b]
                .value
                .partial_cmp(&items[a].value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| items[a].id.cmp(&items[b].id))
        });
        for (rank, &index) in indices.iter().enumerate() {
            if rank == 0 {
                values[index] += DIVERSITY_BONUS;
            } else if per_category_cap > 0 && rank >= per_category_cap {
                values[index] -= OVERCAP_PENALTY;
            }
        }
    }
    values
}

/// TOPSIS criterion weights: relevance, space efficiency, diversity
/// contribution.
const TOPSIS_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

/// Multi-criteria ranking by relative closeness to the ideal candidate.
///
/// Builds a decision matrix (relevance, space efficiency = value/size,
/// diversity contribution = rarity of the category in the pool), normalizes
/// each column to unit length, and ranks by closeness to the per-column
/// ideal versus the negative ideal. Acceptance is greedy over that ranking.
pub fn topsis(items: &[AlgoItem], budget: usize) -> Vec<usize> {
    if budget == 0 || items.is_empty() {
        return Vec::new();
    }

    let mut category_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *category_counts.entry(item.category.as_str()).or_default() += 1;
    }

    let raw: Vec<[f64; 3]> = items
        .iter()
        .map(|item| {
            let efficiency = item.value / item.size.max(1) as f64;
            let rarity = 1.0 / category_counts[item.category.as_str()] as f64;
            [item.value, efficiency, rarity]
        })
        .collect();

    // Vector normalization per column.
    let mut norms = [0.0f64; 3];
    for row in &raw {
        for (k, v) in row.iter().enumerate() {
            norms[k] += v * v;
        }
    }
    for norm in &mut norms {
        *norm = norm.sqrt().max(f64::EPSILON);
    }
    let matrix: Vec<[f64; 3]> = raw
        .iter()
        .map(|row| {
            [
                row[0] / norms[0] * TOPSIS_WEIGHTS[0],
                row[1] / norms[1] * TOPSIS_WEIGHTS[1],
                row[2] / norms[2] * TOPSIS_WEIGHTS[2],
            ]
        })
        .collect();

    // All three criteria are benefit criteria.
    let mut ideal = [f64::NEG_INFINITY; 3];
    let mut negative = [f64::INFINITY; 3];
    for row in &matrix {
        for k in 0..3 {
            ideal[k] = ideal[k].max(row[k]);
            negative[k] = negative[k].min(row[k]);
        }
    }

    let closeness: Vec<f64> = matrix
        .iter()
        .map(|row| {
            let d_pos: f64 = (0..3).map(|k| (row[k] - ideal[k]).powi(2)).sum::<f64>().sqrt();
            let d_neg: f64 = (0..3)
                .map(|k| (row[k] - negative[k]).powi(2))
                .sum::<f64>()
                .sqrt();
            if d_pos + d_neg == 0.0 {
                0.0
            } else {
                d_neg / (d_pos + d_neg)
            }
        })
        .collect();

    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        closeness[b]
            .partial_cmp(&closeness[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| items[a].id.cmp(&items[b].id))
    });

    let mut selected = Vec::new();
    let mut used = 0usize;
    for index in order {
        if used + items[index].size <= budget {
            used += items[index].size;
            selected.push(index);
        }
    }
    selected.sort_unstable();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, size: usize, value: f64) -> AlgoItem {
        AlgoItem {
            id: DocumentId::new(id),
            size,
            value,
            category: "guide".to_string(),
        }
    }

    fn total_size(items: &[AlgoItem], picks: &[usize]) -> usize {
        picks.iter().map(|&i| items[i].size).sum()
    }

    #[test]
    fn greedy_never_exceeds_budget() {
        let items = vec![item("a", 300, 0.9), item("b", 300, 0.8), item("c", 300, 0.7)];
        let picks = greedy(&items, 600);
        assert_eq!(picks.len(), 2);
        assert!(total_size(&items, &picks) <= 600);
    }

    #[test]
    fn greedy_prefers_smaller_on_equal_value() {
        let items = vec![item("big", 500, 0.8), item("small", 100, 0.8)];
        let picks = greedy(&items, 500);
        assert_eq!(picks, vec![1]);
    }

    #[test]
    fn knapsack_finds_the_optimal_subset() {
        // Five documents; the best subset under 600 is the three smallest,
        // beating the greedy-adjacent {500, 100} combination.
        let items = vec![
            item("d1", 100, 0.9),
            item("d2", 200, 0.8),
            item("d3", 300, 0.7),
            item("d4", 400, 0.6),
            item("d5", 500, 0.5),
        ];
        let picks = knapsack(&items, 600, 10);
        assert_eq!(picks, vec![0, 1, 2]);
        assert_eq!(total_size(&items, &picks), 600);
    }

    #[test]
    fn knapsack_respects_zero_budget() {
        let items = vec![item("a", 1, 0.9)];
        assert!(knapsack(&items, 0, 10).is_empty());
    }

    #[test]
    fn knapsack_discretizes_large_budgets() {
        let items = vec![
            item("a", 500_000, 0.9),
            item("b", 400_000, 0.8),
            item("c", 300_000, 0.3),
        ];
        let picks = knapsack(&items, 1_000_000, 10);
        assert!(total_size(&items, &picks) <= 1_000_000);
        assert!(picks.contains(&0));
        assert!(picks.contains(&1));
    }

    #[test]
    fn knapsack_over_cap_penalty_favors_spread() {
        let mut items = vec![
            item("g1", 100, 0.80),
            item("g2", 100, 0.79),
            item("g3", 100, 0.78),
        ];
        items.push(AlgoItem {
            id: DocumentId::new("r1"),
            size: 100,
            value: 0.75,
            category: "reference".to_string(),
        });
        // Cap of 2 per category pushes the third guide below the reference
        // doc even though its raw value is higher.
        let picks = knapsack(&items, 300, 2);
        assert!(picks.contains(&3));
        assert!(!picks.contains(&2));
    }

    #[test]
    fn topsis_ranks_efficient_items_first() {
        let items = vec![item("lean", 100, 0.8), item("heavy", 900, 0.85)];
        let picks = topsis(&items, 100);
        assert_eq!(picks, vec![0]);
    }

    #[test]
    fn topsis_never_exceeds_budget() {
        let items = vec![
            item("a", 400, 0.9),
            item("b", 400, 0.8),
            item("c", 400, 0.7),
        ];
        let picks = topsis(&items, 800);
        assert!(total_size(&items, &picks) <= 800);
        assert_eq!(picks.len(), 2);
    }
}
