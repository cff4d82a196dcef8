//! Exact cover with route costs (tail assignment).
//!
//! Qubit `r` selects route `r`. A route covers a set of rows (flights);
//! a valid assignment covers every row exactly once.
//!
//! ```text
//! cost(z) = -( Σ_r c_r z_r + μ Σ_f (1 - Σ_r F_fr z_r)² )
//! ```

use anyhow::{Result, ensure};

use arvak_varopt::Outcome;

use super::Problem;

/// An exact cover instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactCover {
    n_rows: usize,
    /// Rows covered by each route.
    routes: Vec<Vec<usize>>,
    /// Cost of each route.
    costs: Vec<f64>,
    /// Weight of the covering constraint.
    penalty: f64,
}

impl ExactCover {
    /// Create an instance from `(cost, covered rows)` per route.
    pub fn new(n_rows: usize, routes: Vec<(f64, Vec<usize>)>) -> Result<Self> {
        ensure!(!routes.is_empty(), "exact cover needs at least one route");
        for (r, (cost, rows)) in routes.iter().enumerate() {
            ensure!(cost.is_finite(), "route {} has non-finite cost", r);
            if let Some(&bad) = rows.iter().find(|&&f| f >= n_rows) {
                anyhow::bail!("route {} covers row {} of only {}", r, bad, n_rows);
            }
        }
        let (costs, routes): (Vec<f64>, Vec<Vec<usize>>) = routes.into_iter().unzip();
        Ok(Self {
            n_rows,
            routes,
            costs,
            penalty: 1.0,
        })
    }

    /// Set the constraint weight μ.
    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    /// Four flights and five candidate routes; the optimal cover is
    /// routes 2 and 3 with total cost 1.9.
    pub fn small_instance() -> Self {
        Self {
            n_rows: 4,
            routes: vec![
                vec![0, 1],
                vec![2, 3],
                vec![0, 2],
                vec![1, 3],
                vec![0, 1, 2, 3],
            ],
            costs: vec![1.0, 1.0, 1.5, 0.4, 2.5],
            penalty: 1.0,
        }
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.n_rows
    }

    /// How often each row is covered by the selected routes.
    pub fn coverage(&self, outcome: Outcome) -> Vec<usize> {
        let mut cover = vec![0; self.n_rows];
        for (r, rows) in self.routes.iter().enumerate() {
            if outcome.bit(r) {
                for &f in rows {
                    cover[f] += 1;
                }
            }
        }
        cover
    }

    /// Total cost of the selected routes.
    pub fn route_cost(&self, outcome: Outcome) -> f64 {
        self.costs
            .iter()
            .enumerate()
            .filter(|&(r, _)| outcome.bit(r))
            .map(|(_, c)| c)
            .sum()
    }

    fn violation(&self, outcome: Outcome) -> f64 {
        self.coverage(outcome)
            .iter()
            .map(|&k| (1.0 - k as f64).powi(2))
            .sum()
    }
}

impl Problem for ExactCover {
    fn identity(&self) -> String {
        let routes: Vec<String> = self
            .routes
            .iter()
            .zip(&self.costs)
            .map(|(rows, c)| format!("{}{:?}", c, rows))
            .collect();
        format!(
            "exact-cover/rows{}/mu{}/{}",
            self.n_rows,
            self.penalty,
            routes.join(",")
        )
    }

    fn num_qubits(&self) -> usize {
        self.routes.len()
    }

    fn cost(&self, outcome: Outcome) -> f64 {
        let (weight, constraint) = self.split_cost(outcome);
        weight + constraint
    }

    fn split_cost(&self, outcome: Outcome) -> (f64, f64) {
        (
            -self.route_cost(outcome),
            -self.penalty * self.violation(outcome),
        )
    }

    fn is_feasible(&self, outcome: Outcome) -> bool {
        self.coverage(outcome).iter().all(|&k| k == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_feasibility() {
        let ec = ExactCover::small_instance();
        assert!(ec.is_feasible(Outcome(0b00011)));
        assert!(ec.is_feasible(Outcome(0b01100)));
        assert!(ec.is_feasible(Outcome(0b10000)));
        assert!(!ec.is_feasible(Outcome(0b00101)));
        assert!(!ec.is_feasible(Outcome(0)));
    }

    #[test]
    fn test_cost_terms() {
        let ec = ExactCover::small_instance();
        // routes 0 and 2 cover row 0 twice, rows 1 and 2 once, row 3 never
        let z = Outcome(0b00101);
        assert_eq!(ec.coverage(z), vec![2, 1, 1, 0]);
        let (w, c) = ec.split_cost(z);
        assert_abs_diff_eq!(w, -2.5);
        assert_abs_diff_eq!(c, -2.0);
        assert_abs_diff_eq!(ec.cost(z), -4.5);
    }

    #[test]
    fn test_optimum_is_cheapest_cover() {
        let ec = ExactCover::small_instance();
        let (best, cost) = ec.brute_force_optimum().unwrap();
        assert_eq!(best, Outcome(0b01100));
        assert_abs_diff_eq!(cost, -1.9, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_out_of_range_rows() {
        assert!(ExactCover::new(2, vec![(1.0, vec![0, 2])]).is_err());
        assert!(ExactCover::new(2, vec![]).is_err());
        let ec = ExactCover::new(2, vec![(1.0, vec![0]), (2.0, vec![1])]).unwrap();
        assert_eq!(ec.num_qubits(), 2);
        assert!(ec.is_feasible(Outcome(0b11)));
    }
}
