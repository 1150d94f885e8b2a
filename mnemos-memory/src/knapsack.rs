// Copyright 2025 Mnemos (https://github.com/mnemos-ai)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Token-budgeted context packing via Lagrangian relaxation
//!
//! 0/1 knapsack relaxed to a density threshold:
//!
//! ```text
//!   maximize sum(v_i * x_i)  s.t.  sum(w_i * x_i) <= W
//!   x_i = 1  iff  v_i / w_i >= lambda
//! ```
//!
//! lambda is found by binary search; the whole pass is O(n log n). The last
//! K conversation turns are hard constraints packed before any candidate
//! and are never subject to lambda.

use serde::Serialize;

use mnemos_core::{config::KnapsackConfig, ConversationTurn, KnapsackItem};

/// Value assigned to force-included turns; above any plausible DIG score.
const TURN_VALUE: f64 = 1000.0;

const LAMBDA_ITERATIONS: usize = 50;
const LAMBDA_TOLERANCE: f64 = 1e-9;

/// Selected items plus budget utilization.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    pub selected: Vec<KnapsackItem>,
    pub total_tokens: usize,
    pub total_value: f64,
    /// total_tokens / original budget
    pub utilization: f64,
}

/// Packs candidates and recent turns into a token budget.
pub struct Optimizer {
    config: KnapsackConfig,
}

impl Optimizer {
    pub fn new(config: KnapsackConfig) -> Self {
        Self { config }
    }

    pub fn token_budget(&self) -> usize {
        self.config.token_budget
    }

    /// Select the highest-density candidates that fit after the last K
    /// turns are force-included. `budget_override` substitutes the
    /// configured budget for this call only.
    pub fn optimize(
        &self,
        mut candidates: Vec<KnapsackItem>,
        recent_turns: &[ConversationTurn],
        budget_override: Option<usize>,
    ) -> SelectionResult {
        let original_budget = budget_override.unwrap_or(self.config.token_budget);
        let mut budget = original_budget as i64;
        let mut selected = Vec::new();
        let mut total_tokens = 0usize;
        let mut total_value = 0.0f64;

        // Phase 1: the last K turns are hard constraints.
        let turn_count = self.config.force_recent_turns.min(recent_turns.len());
        for turn in &recent_turns[recent_turns.len() - turn_count..] {
            let weight = (turn.content.len() / 4).max(1);
            let item = KnapsackItem {
                id: format!("turn_{}_{}", turn.role, turn.timestamp.format("%H%M%S")),
                content: turn.content.clone(),
                value: TURN_VALUE,
                weight,
                force_include: true,
                density: TURN_VALUE / weight as f64,
            };
            total_tokens += weight;
            total_value += item.value;
            selected.push(item);
        }
        budget -= total_tokens as i64;

        // Phase 2: densities.
        for item in &mut candidates {
            if item.weight > 0 {
                item.density = item.value / item.weight as f64;
            }
        }

        // Phase 3: stable density sort, descending.
        candidates.sort_by(|a, b| {
            b.density
                .partial_cmp(&a.density)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Phase 4: shadow price.
        let lambda = find_lambda(&candidates, budget);

        // Phase 5: greedy selection under the threshold.
        for item in candidates {
            if budget <= 0 {
                break;
            }
            if item.density >= lambda && (item.weight as i64) <= budget {
                budget -= item.weight as i64;
                total_tokens += item.weight;
                total_value += item.value;
                selected.push(item);
            }
        }

        let utilization = if original_budget > 0 {
            total_tokens as f64 / original_budget as f64
        } else {
            0.0
        };

        SelectionResult {
            selected,
            total_tokens,
            total_value,
            utilization,
        }
    }
}

/// Binary search for the Lagrange multiplier: the density threshold at
/// which the admitted weight just fits the budget.
fn find_lambda(candidates: &[KnapsackItem], budget: i64) -> f64 {
    if candidates.is_empty() || budget <= 0 {
        return 0.0;
    }

    let mut lo = 0.0f64;
    let mut hi = candidates
        .iter()
        .map(|c| c.density)
        .fold(0.0f64, f64::max)
        + 1.0;

    for _ in 0..LAMBDA_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        let admitted: i64 = candidates
            .iter()
            .filter(|c| c.density >= mid)
            .map(|c| c.weight as i64)
            .sum();

        if admitted > budget {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < LAMBDA_TOLERANCE {
            break;
        }
    }

    lo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, value: f64, weight: usize) -> KnapsackItem {
        KnapsackItem::new(id, "x".repeat(weight * 4), value, weight)
    }

    fn turn(content_len: usize) -> ConversationTurn {
        ConversationTurn::new("user", "y".repeat(content_len))
    }

    fn optimizer(budget: usize, force_turns: usize) -> Optimizer {
        Optimizer::new(KnapsackConfig {
            token_budget: budget,
            force_recent_turns: force_turns,
        })
    }

    #[test]
    fn forced_turns_plus_best_candidate() {
        // Budget 100, three 20-token turns, candidates 30 tokens each:
        // only the densest candidate fits the remaining 40.
        let opt = optimizer(100, 3);
        let turns = vec![turn(80), turn(80), turn(80)];
        let candidates = vec![
            item("m1", 10.0, 30),
            item("m2", 9.0, 30),
            item("m3", 1.0, 30),
        ];

        let result = opt.optimize(candidates, &turns, None);

        assert_eq!(result.selected.len(), 4);
        assert!(result.selected[..3].iter().all(|i| i.force_include));
        assert_eq!(result.selected[3].id, "m1");
        assert_eq!(result.total_tokens, 90);
        assert!((result.utilization - 0.9).abs() < 1e-9);
    }

    #[test]
    fn budget_is_never_exceeded() {
        let opt = optimizer(50, 0);
        let candidates = vec![
            item("a", 5.0, 20),
            item("b", 4.0, 20),
            item("c", 3.0, 20),
            item("d", 2.0, 20),
        ];
        let result = opt.optimize(candidates, &[], None);
        assert!(result.total_tokens <= 50);
    }

    #[test]
    fn oversized_candidates_yield_empty_selection() {
        let opt = optimizer(10, 0);
        let result = opt.optimize(vec![item("big", 100.0, 50)], &[], None);
        assert!(result.selected.is_empty());
        assert_eq!(result.utilization, 0.0);
    }

    #[test]
    fn forced_turns_are_kept_even_when_over_budget() {
        // Turns are hard constraints; candidates get nothing.
        let opt = optimizer(10, 2);
        let turns = vec![turn(40), turn(40)];
        let result = opt.optimize(vec![item("m", 10.0, 5)], &turns, None);

        let forced: Vec<_> = result.selected.iter().filter(|i| i.force_include).collect();
        assert_eq!(forced.len(), 2);
        assert!(!result.selected.iter().any(|i| i.id == "m"));
    }

    #[test]
    fn selection_is_idempotent_under_repacking() {
        // Packing the previous selection together with rejects again
        // reproduces the same selection (lambda-threshold invariance).
        let opt = optimizer(60, 0);
        let candidates = vec![
            item("a", 9.0, 20),
            item("b", 6.0, 20),
            item("c", 3.0, 20),
            item("d", 0.5, 20),
        ];
        let first = opt.optimize(candidates.clone(), &[], None);
        let first_ids: Vec<&str> = first.selected.iter().map(|i| i.id.as_str()).collect();

        let second = opt.optimize(candidates, &[], None);
        let second_ids: Vec<&str> = second.selected.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(first_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn budget_override_applies_to_single_call() {
        let opt = optimizer(1000, 0);
        let result = opt.optimize(vec![item("a", 5.0, 30)], &[], Some(10));
        assert!(result.selected.is_empty());
        assert_eq!(opt.token_budget(), 1000);
    }

    #[test]
    fn zero_weight_items_get_minimum_weight() {
        let item = KnapsackItem::new("empty", "", 5.0, 0);
        assert_eq!(item.weight, 1);
    }
}
