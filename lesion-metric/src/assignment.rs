//! Rectangular linear sum assignment.
//!
//! Shortest augmenting path solver of the Jonker-Volgenant family: one
//! Dijkstra-like search per row of the (transposed if needed) matrix, with
//! dual variables keeping reduced costs non-negative. Runs in
//! `O(min(n, m)^2 * max(n, m))`.

use serde::Serialize;

use crate::error::{LesionMetricError, LesionMetricResult};

/// Dense row-major matrix of assignment costs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl CostMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    /// Builds a matrix from nested rows.
    ///
    /// # Errors
    ///
    /// Returns [`LesionMetricError::InvalidCostMatrix`] when rows differ in
    /// length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> LesionMetricResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != cols) {
            return Err(LesionMetricError::InvalidCostMatrix {
                reason: format!(
                    "row {bad} has {} columns, expected {cols}",
                    rows[bad].len()
                ),
            });
        }
        let num_rows = rows.len();
        Ok(Self {
            rows: num_rows,
            cols,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Entry at `(row, col)`, or `None` outside the matrix.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.at(row, col))
        } else {
            None
        }
    }

    /// Sum of the entries at the given `(row, col)` pairs, or `None` if any
    /// pair lies outside the matrix.
    pub fn total(&self, pairs: &[(usize, usize)]) -> Option<f64> {
        pairs.iter().map(|&(row, col)| self.get(row, col)).sum()
    }

    /// Unchecked entry; callers keep `row < rows` and `col < cols`.
    pub(crate) fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub(crate) fn add(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.cols + col] += value;
    }

    pub(crate) fn divide_row(&mut self, row: usize, divisor: f64) {
        let start = row * self.cols;
        for value in &mut self.values[start..start + self.cols] {
            *value /= divisor;
        }
    }

    fn transposed(&self) -> Self {
        let mut values = Vec::with_capacity(self.values.len());
        for col in 0..self.cols {
            for row in 0..self.rows {
                values.push(self.at(row, col));
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            values,
        }
    }
}

/// Solves the rectangular linear sum assignment problem.
///
/// Returns `min(rows, cols)` `(row, col)` pairs, sorted by row, each row and
/// column used at most once, minimizing (or with `maximize`, maximizing) the
/// sum of the selected entries. An empty matrix yields no pairs.
///
/// # Errors
///
/// Returns [`LesionMetricError::InvalidCostMatrix`] when an entry is NaN or
/// infinite.
pub fn linear_sum_assignment(
    cost: &CostMatrix,
    maximize: bool,
) -> LesionMetricResult<Vec<(usize, usize)>> {
    if cost.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(position) = cost.values.iter().position(|value| !value.is_finite()) {
        return Err(LesionMetricError::InvalidCostMatrix {
            reason: format!(
                "entry ({}, {}) is not finite",
                position / cost.cols,
                position % cost.cols
            ),
        });
    }

    let transpose = cost.rows > cost.cols;
    let mut work = if transpose {
        cost.transposed()
    } else {
        cost.clone()
    };
    if maximize {
        work.values.iter_mut().for_each(|value| *value = -*value);
    }

    let col4row = solve_wide(&work)?;

    let mut pairs: Vec<(usize, usize)> = col4row
        .into_iter()
        .enumerate()
        .map(|(row, col)| if transpose { (col, row) } else { (row, col) })
        .collect();
    pairs.sort_unstable();
    Ok(pairs)
}

/// Minimizes over a matrix with `rows <= cols`; returns the column of each row.
fn solve_wide(cost: &CostMatrix) -> LesionMetricResult<Vec<usize>> {
    let (rows, cols) = (cost.rows, cost.cols);

    let mut u = vec![0.0; rows];
    let mut v = vec![0.0; cols];
    let mut shortest = vec![f64::INFINITY; cols];
    let mut path = vec![usize::MAX; cols];
    let mut col4row: Vec<Option<usize>> = vec![None; rows];
    let mut row4col: Vec<Option<usize>> = vec![None; cols];
    let mut visited_rows = vec![false; rows];
    let mut visited_cols = vec![false; cols];
    let mut remaining = vec![0usize; cols];

    for current in 0..rows {
        // Dijkstra-like search for the cheapest augmenting path from `current`.
        let mut min_value = 0.0;
        let mut num_remaining = cols;
        for (slot, col) in remaining.iter_mut().enumerate() {
            *col = cols - slot - 1;
        }
        visited_rows.fill(false);
        visited_cols.fill(false);
        shortest.fill(f64::INFINITY);

        let mut row = current;
        let sink = loop {
            let mut lowest = f64::INFINITY;
            let mut best = 0;
            visited_rows[row] = true;

            for slot in 0..num_remaining {
                let col = remaining[slot];
                let reduced = min_value + cost.at(row, col) - u[row] - v[col];
                if reduced < shortest[col] {
                    path[col] = row;
                    shortest[col] = reduced;
                }
                if shortest[col] < lowest
                    || (shortest[col] == lowest && row4col[col].is_none())
                {
                    lowest = shortest[col];
                    best = slot;
                }
            }

            min_value = lowest;
            if !min_value.is_finite() {
                return Err(LesionMetricError::InvalidCostMatrix {
                    reason: "no feasible assignment".to_owned(),
                });
            }

            let col = remaining[best];
            visited_cols[col] = true;
            num_remaining -= 1;
            remaining[best] = remaining[num_remaining];

            match row4col[col] {
                Some(next) => row = next,
                None => break col,
            }
        };

        // Dual update.
        u[current] += min_value;
        for other in 0..rows {
            if visited_rows[other] && other != current {
                if let Some(col) = col4row[other] {
                    u[other] += min_value - shortest[col];
                }
            }
        }
        for col in 0..cols {
            if visited_cols[col] {
                v[col] -= min_value - shortest[col];
            }
        }

        // Augment along the path back to `current`.
        let mut col = sink;
        loop {
            let row = path[col];
            row4col[col] = Some(row);
            let previous = col4row[row].replace(col);
            if row == current {
                break;
            }
            match previous {
                Some(previous) => col = previous,
                None => break,
            }
        }
    }

    col4row
        .into_iter()
        .map(|col| {
            col.ok_or_else(|| LesionMetricError::InvalidCostMatrix {
                reason: "row left unassigned".to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> CostMatrix {
        CostMatrix::from_rows(rows.iter().map(|row| row.to_vec()).collect()).unwrap()
    }

    /// Exhaustive search over all injective maps of the shorter side.
    fn brute_force(cost: &CostMatrix, maximize: bool) -> f64 {
        fn search(
            cost: &CostMatrix,
            row: usize,
            used: &mut [bool],
            maximize: bool,
        ) -> f64 {
            if row == cost.rows() {
                return 0.0;
            }
            let mut best = if maximize {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
            for col in 0..cost.cols() {
                if used[col] {
                    continue;
                }
                used[col] = true;
                let total = cost.at(row, col) + search(cost, row + 1, used, maximize);
                used[col] = false;
                best = if maximize {
                    best.max(total)
                } else {
                    best.min(total)
                };
            }
            best
        }

        let cost = if cost.rows() > cost.cols() {
            cost.transposed()
        } else {
            cost.clone()
        };
        search(&cost, 0, &mut vec![false; cost.cols()], maximize)
    }

    #[test]
    fn linear_sum_assignment_square_minimum() {
        let cost = matrix(&[&[4.0, 1.0, 3.0], &[2.0, 0.0, 5.0], &[3.0, 2.0, 2.0]]);
        let pairs = linear_sum_assignment(&cost, false).unwrap();

        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 2)]);
        assert_eq!(cost.total(&pairs).unwrap(), 5.0);
    }

    #[test]
    fn linear_sum_assignment_square_maximum() {
        let cost = matrix(&[&[4.0, 1.0, 3.0], &[2.0, 0.0, 5.0], &[3.0, 2.0, 2.0]]);
        let pairs = linear_sum_assignment(&cost, true).unwrap();

        assert_eq!(pairs, vec![(0, 0), (1, 2), (2, 1)]);
        assert_eq!(cost.total(&pairs).unwrap(), 11.0);
    }

    #[test]
    fn linear_sum_assignment_tall_matrix_assigns_every_column() {
        let cost = matrix(&[&[0.1, 0.9], &[0.8, 0.2], &[0.7, 0.6], &[0.0, 0.0]]);
        let pairs = linear_sum_assignment(&cost, true).unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
        assert!((cost.total(&pairs).unwrap() - 1.7).abs() < 1e-12);
    }

    #[test]
    fn linear_sum_assignment_wide_matrix_matches_brute_force() {
        let cost = matrix(&[
            &[0.3, 0.0, 0.9, 0.4, 0.5],
            &[0.6, 0.7, 0.2, 0.1, 0.8],
            &[0.5, 0.5, 0.9, 0.0, 0.3],
        ]);

        for maximize in [false, true] {
            let pairs = linear_sum_assignment(&cost, maximize).unwrap();
            assert_eq!(pairs.len(), 3);

            let mut cols: Vec<usize> = pairs.iter().map(|&(_, col)| col).collect();
            cols.sort_unstable();
            cols.dedup();
            assert_eq!(cols.len(), 3);

            assert!((cost.total(&pairs).unwrap() - brute_force(&cost, maximize)).abs() < 1e-12);
        }
    }

    #[test]
    fn linear_sum_assignment_empty_matrix_returns_no_pairs() {
        assert!(linear_sum_assignment(&CostMatrix::zeros(0, 3), true)
            .unwrap()
            .is_empty());
        assert!(linear_sum_assignment(&CostMatrix::zeros(2, 0), false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn linear_sum_assignment_non_finite_entry_is_rejected() {
        let cost = matrix(&[&[1.0, f64::NAN]]);
        let err = linear_sum_assignment(&cost, true).unwrap_err();
        assert!(matches!(err, LesionMetricError::InvalidCostMatrix { .. }));
    }

    #[test]
    fn cost_matrix_get_outside_bounds_is_none() {
        let cost = matrix(&[&[1.0, 2.0], &[3.0, 4.0]]);

        assert_eq!(cost.get(1, 0), Some(3.0));
        assert_eq!(cost.get(0, 2), None);
        assert_eq!(cost.get(2, 0), None);
        assert_eq!(cost.total(&[(0, 0), (1, 1)]), Some(5.0));
        assert_eq!(cost.total(&[(0, 0), (0, 2)]), None);
    }

    #[test]
    fn cost_matrix_from_ragged_rows_is_rejected() {
        let err = CostMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, LesionMetricError::InvalidCostMatrix { .. }));
    }
}
