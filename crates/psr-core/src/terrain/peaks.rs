//! Local-maximum peak finding with a minimum separation.
//!
//! A cell is a candidate when it equals the maximum of the
//! `(2d+1) × (2d+1)` window around it (edge-clamped), lies at least `d`
//! cells from every border, and is strictly brighter than the grid minimum.
//! Candidates are ranked by intensity (descending, ties in row-major order)
//! and accepted greedily when no accepted peak lies within Chebyshev
//! distance `d`. The result is fully deterministic.

use crate::grid::{Grid, IntensityGrid, Point, PointSet};

/// Find local maxima separated by more than `min_distance` cells.
pub fn find_peaks(grid: &IntensityGrid, min_distance: usize) -> PointSet {
    let (rows, cols) = grid.shape();
    if grid.is_empty() || rows <= 2 * min_distance || cols <= 2 * min_distance {
        return Vec::new();
    }

    let window_max = maximum_filter(grid, min_distance);
    let floor = grid.min_value();

    let mut candidates: Vec<(u8, Point)> = Vec::new();
    for r in min_distance..rows - min_distance {
        for c in min_distance..cols - min_distance {
            let v = grid.get(r, c);
            if v > floor && v == window_max.get(r, c) {
                candidates.push((v, Point::new(r, c)));
            }
        }
    }
    // Stable sort keeps row-major order among equal intensities.
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let mut accepted: PointSet = Vec::new();
    for (_, p) in candidates {
        if accepted.iter().all(|q| q.chebyshev(&p) > min_distance) {
            accepted.push(p);
        }
    }
    accepted
}

/// Separable sliding maximum with radius `radius`, indices clamped at the edges.
fn maximum_filter(grid: &IntensityGrid, radius: usize) -> IntensityGrid {
    let (rows, cols) = grid.shape();

    let mut horizontal: IntensityGrid = Grid::new(cols, rows, 0);
    for r in 0..rows {
        let row = grid.row(r);
        for c in 0..cols {
            let lo = c.saturating_sub(radius);
            let hi = (c + radius).min(cols - 1);
            let m = row[lo..=hi].iter().copied().max().unwrap_or(0);
            horizontal.set(r, c, m);
        }
    }

    let mut out: IntensityGrid = Grid::new(cols, rows, 0);
    for c in 0..cols {
        for r in 0..rows {
            let lo = r.saturating_sub(radius);
            let hi = (r + radius).min(rows - 1);
            let m = (lo..=hi).map(|rr| horizontal.get(rr, c)).max().unwrap_or(0);
            out.set(r, c, m);
        }
    }
    out
}
