//! Dense two-phase simplex for small linear programs.
//!
//! Minimizes `c·x` subject to rows `a·x (<=|>=|=) b` and `x >= 0`.
//! Phase one drives artificial variables to zero to find a feasible basis,
//! phase two optimizes the real objective. Entering and leaving columns are
//! picked with Bland's rule, so the method cannot cycle on degenerate
//! vertices.

const EPSILON: f64 = 1e-9;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;
const MAX_ITERATIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

impl Relation {
    fn flipped(self) -> Self {
        match self {
            Relation::LessEq => Relation::GreaterEq,
            Relation::GreaterEq => Relation::LessEq,
            Relation::Equal => Relation::Equal,
        }
    }
}

#[derive(Debug, Clone)]
struct Row {
    coefficients: Vec<(usize, f64)>,
    relation: Relation,
    rhs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
    IterationLimit,
}

/// A linear program under construction.
#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    objective: Vec<f64>,
    rows: Vec<Row>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-negative variable with objective coefficient `cost`.
    pub fn add_variable(&mut self, cost: f64) -> usize {
        self.objective.push(cost);
        self.objective.len() - 1
    }

    pub fn variable_count(&self) -> usize {
        self.objective.len()
    }

    pub fn add_constraint(&mut self, coefficients: Vec<(usize, f64)>, relation: Relation, rhs: f64) {
        self.rows.push(Row {
            coefficients,
            relation,
            rhs,
        });
    }

    pub fn solve(&self) -> LpOutcome {
        let n = self.objective.len();

        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| {
                if row.rhs < 0.0 {
                    Row {
                        coefficients: row.coefficients.iter().map(|&(j, a)| (j, -a)).collect(),
                        relation: row.relation.flipped(),
                        rhs: -row.rhs,
                    }
                } else {
                    row.clone()
                }
            })
            .collect();

        let slack_count = rows
            .iter()
            .filter(|r| r.relation != Relation::Equal)
            .count();
        let artificial_count = rows
            .iter()
            .filter(|r| r.relation != Relation::LessEq)
            .count();
        let artificial_start = n + slack_count;
        let width = artificial_start + artificial_count;

        let mut tableau = Tableau::new(rows.len(), width);
        let mut next_slack = n;
        let mut next_artificial = artificial_start;
        for (i, row) in rows.iter().enumerate() {
            for &(j, a) in &row.coefficients {
                tableau.cells[i][j] += a;
            }
            tableau.cells[i][width] = row.rhs;
            match row.relation {
                Relation::LessEq => {
                    tableau.cells[i][next_slack] = 1.0;
                    tableau.basis[i] = next_slack;
                    next_slack += 1;
                }
                Relation::GreaterEq => {
                    tableau.cells[i][next_slack] = -1.0;
                    next_slack += 1;
                    tableau.cells[i][next_artificial] = 1.0;
                    tableau.basis[i] = next_artificial;
                    next_artificial += 1;
                }
                Relation::Equal => {
                    tableau.cells[i][next_artificial] = 1.0;
                    tableau.basis[i] = next_artificial;
                    next_artificial += 1;
                }
            }
        }

        if artificial_count > 0 {
            let mut phase_one = vec![0.0; width];
            for cost in &mut phase_one[artificial_start..] {
                *cost = 1.0;
            }
            match tableau.minimize(&phase_one, width) {
                Pivoting::Optimal => {}
                Pivoting::Unbounded => return LpOutcome::Infeasible,
                Pivoting::IterationLimit => return LpOutcome::IterationLimit,
            }
            if tableau.objective_value(&phase_one) > FEASIBILITY_TOLERANCE {
                return LpOutcome::Infeasible;
            }
            tableau.drive_out_artificials(artificial_start);
        }

        let mut phase_two = vec![0.0; width];
        phase_two[..n].copy_from_slice(&self.objective);
        match tableau.minimize(&phase_two, artificial_start) {
            Pivoting::Optimal => {}
            Pivoting::Unbounded => return LpOutcome::Unbounded,
            Pivoting::IterationLimit => return LpOutcome::IterationLimit,
        }

        let mut values = vec![0.0; n];
        for (i, &column) in tableau.basis.iter().enumerate() {
            if column < n {
                values[column] = tableau.cells[i][width].max(0.0);
            }
        }
        let objective = values
            .iter()
            .zip(&self.objective)
            .map(|(x, c)| x * c)
            .sum();

        LpOutcome::Optimal { values, objective }
    }
}

enum Pivoting {
    Optimal,
    Unbounded,
    IterationLimit,
}

struct Tableau {
    cells: Vec<Vec<f64>>,
    basis: Vec<usize>,
    width: usize,
}

impl Tableau {
    fn new(rows: usize, width: usize) -> Self {
        Self {
            cells: vec![vec![0.0; width + 1]; rows],
            basis: vec![0; rows],
            width,
        }
    }

    fn objective_value(&self, cost: &[f64]) -> f64 {
        self.basis
            .iter()
            .enumerate()
            .map(|(i, &column)| cost[column] * self.cells[i][self.width])
            .sum()
    }

    /// Pivot until no column below `enter_limit` has a negative reduced cost.
    fn minimize(&mut self, cost: &[f64], enter_limit: usize) -> Pivoting {
        for _ in 0..MAX_ITERATIONS {
            let mut is_basic = vec![false; self.width];
            for &column in &self.basis {
                is_basic[column] = true;
            }

            let entering = (0..enter_limit).find(|&j| {
                if is_basic[j] {
                    return false;
                }
                let reduced = cost[j]
                    - self
                        .basis
                        .iter()
                        .enumerate()
                        .map(|(i, &column)| cost[column] * self.cells[i][j])
                        .sum::<f64>();
                reduced < -EPSILON
            });
            let Some(entering) = entering else {
                return Pivoting::Optimal;
            };

            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.cells.iter().enumerate() {
                let a = row[entering];
                if a <= EPSILON {
                    continue;
                }
                let ratio = row[self.width] / a;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - EPSILON
                            || ((ratio - best_ratio).abs() <= EPSILON
                                && self.basis[i] < self.basis[best])
                        {
                            Some((i, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }
            let Some((leaving, _)) = leaving else {
                return Pivoting::Unbounded;
            };

            self.pivot(leaving, entering);
        }
        Pivoting::IterationLimit
    }

    fn pivot(&mut self, row: usize, column: usize) {
        let divisor = self.cells[row][column];
        for value in &mut self.cells[row] {
            *value /= divisor;
        }
        let pivot_row = self.cells[row].clone();
        for (i, other) in self.cells.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = other[column];
            if factor.abs() <= f64::EPSILON {
                continue;
            }
            for (value, p) in other.iter_mut().zip(&pivot_row) {
                *value -= factor * p;
            }
        }
        self.basis[row] = column;
    }

    /// Replace artificial basic variables (all at zero after a feasible
    /// phase one) with structural or slack columns where possible. Rows
    /// where no such column exists are redundant and keep their artificial.
    fn drive_out_artificials(&mut self, artificial_start: usize) {
        for i in 0..self.basis.len() {
            if self.basis[i] < artificial_start {
                continue;
            }
            let replacement =
                (0..artificial_start).find(|&j| self.cells[i][j].abs() > EPSILON && !self.basis.contains(&j));
            if let Some(j) = replacement {
                self.pivot(i, j);
            }
        }
    }
}
