//! Local roughness: population standard deviation over a square window.
//!
//! Window offsets run `-size/2 ..= size - size/2 - 1` on each axis, so even
//! sizes lean towards the top-left. Out-of-range samples are mirrored
//! (`d c b a | a b c d | d c b a`).

use crate::border::reflect;
use crate::grid::{IntensityGrid, RoughnessField};

/// Compute the roughness field of `grid` with a `size × size` window.
///
/// Window sums come from summed-area tables of `v` and `v²` over a
/// mirror-padded copy, so each cell costs O(1) whatever the window size.
/// The sums are exact integers, which keeps results bit-for-bit
/// reproducible regardless of threading.
pub fn roughness_field(grid: &IntensityGrid, size: usize) -> RoughnessField {
    let (rows, cols) = grid.shape();
    let mut out = RoughnessField::new(cols, rows, 0.0);
    if grid.is_empty() {
        return out;
    }

    let size = size.max(1);
    let tables = WindowSums::new(grid, size);
    let n = (size * size) as u64;
    let denom = (n * n) as f64;

    let fill_row = |r: usize, dst: &mut [f64]| {
        for (c, slot) in dst.iter_mut().enumerate() {
            let (sum, sum_sq) = tables.window(r, c, size);
            *slot = ((n * sum_sq - sum * sum) as f64 / denom).sqrt();
        }
    };

    #[cfg(feature = "threading")]
    {
        use rayon::prelude::*;
        out.data
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(r, dst)| fill_row(r, dst));
    }
    #[cfg(not(feature = "threading"))]
    {
        for (r, dst) in out.data.chunks_mut(cols).enumerate() {
            fill_row(r, dst);
        }
    }

    out
}

/// Inclusive prefix sums of `v` and `v²` over the padded image, one extra
/// leading row and column of zeros.
struct WindowSums {
    stride: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl WindowSums {
    fn new(grid: &IntensityGrid, size: usize) -> Self {
        let (rows, cols) = grid.shape();
        let lo = -((size / 2) as isize);
        let padded_rows = rows + size - 1;
        let padded_cols = cols + size - 1;
        let stride = padded_cols + 1;

        let col_src: Vec<usize> = (0..padded_cols)
            .map(|p| reflect(p as isize + lo, cols))
            .collect();

        let mut sum = vec![0u64; (padded_rows + 1) * stride];
        let mut sum_sq = vec![0u64; (padded_rows + 1) * stride];
        for pr in 0..padded_rows {
            let src = grid.row(reflect(pr as isize + lo, rows));
            let (mut run, mut run_sq) = (0u64, 0u64);
            for (pc, &c) in col_src.iter().enumerate() {
                let v = src[c] as u64;
                run += v;
                run_sq += v * v;
                let at = (pr + 1) * stride + pc + 1;
                sum[at] = sum[at - stride] + run;
                sum_sq[at] = sum_sq[at - stride] + run_sq;
            }
        }
        Self { stride, sum, sum_sq }
    }

    /// `(Σv, Σv²)` over the window anchored at output cell `(r, c)`.
    fn window(&self, r: usize, c: usize, size: usize) -> (u64, u64) {
        let s = self.stride;
        let (top, bottom) = (r * s, (r + size) * s);
        let (left, right) = (c, c + size);
        let rect = |t: &[u64]| {
            t[bottom + right] + t[top + left] - t[top + right] - t[bottom + left]
        };
        (rect(&self.sum), rect(&self.sum_sq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_grid_is_perfectly_smooth() {
        for &(rows, cols) in &[(1, 1), (3, 7), (16, 16)] {
            let g: IntensityGrid = Grid::new(cols, rows, 137);
            let f = roughness_field(&g, 5);
            assert_eq!(f.shape(), (rows, cols));
            assert!(f.data.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn checkerboard_centre_matches_hand_value() {
        // 3x3 window over a 0/100 checkerboard: 5 of one value, 4 of the other.
        let g: IntensityGrid =
            Grid::from_fn(9, 9, |r, c| if (r + c) % 2 == 0 { 100 } else { 0 });
        let f = roughness_field(&g, 3);
        let mean: f64 = 500.0 / 9.0;
        let var = (5.0 * (100.0 - mean).powi(2) + 4.0 * mean.powi(2)) / 9.0;
        assert_relative_eq!(f.get(4, 4), var.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn corner_uses_mirrored_samples() {
        // Row [0, 10, 20]; 3-wide window at col 0 reads [0, 0, 10].
        let g = Grid::from_rows(vec![vec![0u8, 10, 20]]).unwrap();
        let f = roughness_field(&g, 3);
        let m: f64 = 10.0 / 3.0;
        let expected = ((2.0 * m * m + (10.0 - m).powi(2)) / 3.0).sqrt();
        assert_relative_eq!(f.get(0, 0), expected, epsilon = 1e-12);
    }

    #[test]
    fn window_of_one_is_zero_everywhere() {
        let g: IntensityGrid = Grid::from_fn(5, 5, |r, c| (r * 40 + c) as u8);
        let f = roughness_field(&g, 1);
        assert!(f.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn even_window_leans_top_left() {
        // Size 2 reads offsets {-1, 0} on each axis.
        let g = Grid::from_rows(vec![vec![0u8, 0, 0], vec![0, 100, 0], vec![0, 0, 0]]).unwrap();
        let f = roughness_field(&g, 2);
        // One 100 among four samples: mean 25, variance 1875.
        let one_hot = 1875f64.sqrt();
        for &(r, c) in &[(1, 1), (1, 2), (2, 1), (2, 2)] {
            assert_relative_eq!(f.get(r, c), one_hot, epsilon = 1e-12);
        }
        // Windows that stop short of the centre cell see only zeros.
        for &(r, c) in &[(0, 0), (0, 1), (1, 0), (0, 2), (2, 0)] {
            assert_eq!(f.get(r, c), 0.0, "({r}, {c})");
        }
    }

    #[test]
    fn matches_direct_window_scan() {
        let g: IntensityGrid = Grid::from_fn(11, 7, |r, c| ((r * 37 + c * 91) % 256) as u8);
        for size in [2, 4, 5, 9, 16] {
            let f = roughness_field(&g, size);
            let lo = -((size / 2) as isize);
            let hi = (size - size / 2) as isize;
            for r in 0..7 {
                for c in 0..11 {
                    let mut w = Vec::new();
                    for dr in lo..hi {
                        for dc in lo..hi {
                            let rr = reflect(r as isize + dr, 7);
                            let cc = reflect(c as isize + dc, 11);
                            w.push(g.get(rr, cc) as f64);
                        }
                    }
                    let m = w.iter().sum::<f64>() / w.len() as f64;
                    let var = w.iter().map(|v| (v - m).powi(2)).sum::<f64>() / w.len() as f64;
                    assert_relative_eq!(f.get(r, c), var.sqrt(), epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let g: IntensityGrid = Grid::from_fn(33, 21, |r, c| ((r * 31 + c * 17) % 251) as u8);
        assert_eq!(roughness_field(&g, 5), roughness_field(&g, 5));
    }
}
