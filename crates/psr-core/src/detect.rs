//! Multi-method shadowed-region detection.
//!
//! Three independent masks over the enhanced grid:
//! - `threshold`: darker than a global cutoff,
//! - `adaptive`: darker than the Gaussian-weighted local mean minus a constant,
//! - `edges`: Canny edge map after Gaussian smoothing.
//!
//! Masks are never merged; each method's mask is kept as produced.

use std::fmt;

use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canny::canny;
use crate::error::{Error, Result};
use crate::grid::{BinaryMask, IntensityGrid};
use crate::params::{normalize_block_size, AnalysisParameters, MAX_SIGMA, MAX_WINDOW_SIZE};

/// Detection method, also the mask/coverage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Threshold,
    Adaptive,
    Edges,
}

impl DetectionMethod {
    pub const ALL: [DetectionMethod; 3] = [
        DetectionMethod::Threshold,
        DetectionMethod::Adaptive,
        DetectionMethod::Edges,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::Threshold => "threshold",
            DetectionMethod::Adaptive => "adaptive",
            DetectionMethod::Edges => "edges",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three masks produced by [`detect_regions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMasks {
    pub threshold: BinaryMask,
    pub adaptive: BinaryMask,
    pub edges: BinaryMask,
}

impl DetectionMasks {
    pub fn get(&self, method: DetectionMethod) -> &BinaryMask {
        match method {
            DetectionMethod::Threshold => &self.threshold,
            DetectionMethod::Adaptive => &self.adaptive,
            DetectionMethod::Edges => &self.edges,
        }
    }

    /// `(method, mask)` pairs in `threshold, adaptive, edges` order.
    pub fn iter(&self) -> impl Iterator<Item = (DetectionMethod, &BinaryMask)> {
        DetectionMethod::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

/// Run all three detection methods on an enhanced grid.
pub fn detect_regions(
    grid: &IntensityGrid,
    params: &AnalysisParameters,
) -> Result<DetectionMasks> {
    grid.ensure_non_degenerate()?;

    let threshold = threshold_mask(grid, params.basic_threshold);
    let adaptive = adaptive_mask(grid, params.adaptive_block_size, params.adaptive_c)?;
    let edges = edge_mask(
        grid,
        params.edge_sigma,
        params.edge_low_threshold,
        params.edge_high_threshold,
    )?;

    debug!(
        threshold = threshold.active_count(),
        adaptive = adaptive.active_count(),
        edges = edges.active_count(),
        "region masks"
    );

    Ok(DetectionMasks { threshold, adaptive, edges })
}

/// Active iff `v < cutoff`.
pub fn threshold_mask(grid: &IntensityGrid, cutoff: u8) -> BinaryMask {
    BinaryMask::from_fn(grid.width, grid.height, |r, c| grid.get(r, c) < cutoff)
}

/// Gaussian sigma implied by an odd kernel size (`0.3·((k−1)/2 − 1) + 0.8`).
pub fn block_sigma(block_size: usize) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Active iff `v < gaussian_mean − c` over a `block_size` neighbourhood.
/// Even block sizes are bumped to the next odd value.
pub fn adaptive_mask(grid: &IntensityGrid, block_size: usize, c: i32) -> Result<BinaryMask> {
    let block = normalize_block_size(block_size);
    if block < 3 {
        return Err(Error::invalid_parameter(
            "adaptive_block_size",
            block_size,
            "must be >= 2",
        ));
    }
    if block > MAX_WINDOW_SIZE {
        return Err(Error::invalid_parameter(
            "adaptive_block_size",
            block_size,
            format!("must be <= {MAX_WINDOW_SIZE}"),
        ));
    }
    let sigma = block_sigma(block);
    let local_mean = gaussian_blur_f32(&grid.to_gray_image()?, sigma);

    Ok(BinaryMask::from_fn(grid.width, grid.height, |r, col| {
        let mean = local_mean.get_pixel(col as u32, r as u32).0[0] as i32;
        (grid.get(r, col) as i32) < mean - c
    }))
}

/// Canny edges after Gaussian smoothing with `sigma`. The smoothing here
/// is the only blur applied, so small sigmas keep fine detail.
pub fn edge_mask(grid: &IntensityGrid, sigma: f32, low: f32, high: f32) -> Result<BinaryMask> {
    if !(sigma > 0.0) || sigma as f64 > MAX_SIGMA {
        return Err(Error::invalid_parameter(
            "edge_sigma",
            sigma,
            format!("must be within (0, {MAX_SIGMA}]"),
        ));
    }
    if high < low {
        return Err(Error::invalid_parameter(
            "edge_high_threshold",
            high,
            "must be >= edge_low_threshold",
        ));
    }
    let smoothed = gaussian_blur_f32(&grid.to_gray_image()?, sigma);
    let edges = canny(&smoothed, low, high);
    Ok(BinaryMask::from_fn(grid.width, grid.height, |r, c| edges[r * grid.width + c]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, MASK_ACTIVE};

    fn scenario_grid() -> IntensityGrid {
        Grid::from_rows(vec![
            vec![0, 20, 80, 120],
            vec![10, 60, 90, 140],
            vec![30, 70, 110, 200],
            vec![40, 85, 130, 255],
        ])
        .unwrap()
    }

    #[test]
    fn scenario_grid_yields_three_masks_of_source_shape() {
        let g = scenario_grid();
        let masks = detect_regions(&g, &AnalysisParameters::default()).unwrap();
        let keys: Vec<&str> = masks.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(keys, vec!["threshold", "adaptive", "edges"]);
        for (_, mask) in masks.iter() {
            assert_eq!((mask.height(), mask.width()), (4, 4));
            assert!(mask.as_grid().data.iter().all(|&v| v == 0 || v == MASK_ACTIVE));
        }
    }

    #[test]
    fn threshold_is_strictly_below_cutoff() {
        let g = scenario_grid();
        let m = threshold_mask(&g, 50);
        // 0, 20, 10, 30, 40 are below 50.
        assert_eq!(m.active_count(), 5);
        assert!(m.is_active(0, 0));
        assert!(!m.is_active(1, 1));
        let exact = Grid::from_rows(vec![vec![50u8, 49]]).unwrap();
        let m = threshold_mask(&exact, 50);
        assert!(!m.is_active(0, 0));
        assert!(m.is_active(0, 1));
    }

    #[test]
    fn adaptive_flags_dark_spot_in_bright_field() {
        let mut g: IntensityGrid = Grid::new(21, 21, 180);
        g.set(10, 10, 20);
        let m = adaptive_mask(&g, 11, 2).unwrap();
        assert!(m.is_active(10, 10));
        assert!(!m.is_active(0, 0));
        assert!(!m.is_active(10, 15));
    }

    #[test]
    fn adaptive_on_uniform_field_is_empty() {
        let g: IntensityGrid = Grid::new(16, 16, 77);
        assert_eq!(adaptive_mask(&g, 10, 2).unwrap().active_count(), 0);
    }

    #[test]
    fn even_block_matches_next_odd_on_textured_field() {
        let mut g: IntensityGrid = Grid::from_fn(30, 24, |r, c| (90 + (r * 5 + c * 3) % 70) as u8);
        g.set(12, 15, 10);
        g.set(5, 5, 30);
        let even = adaptive_mask(&g, 10, 2).unwrap();
        let odd = adaptive_mask(&g, 11, 2).unwrap();
        assert!(odd.active_count() > 0);
        assert_eq!(even, odd);
    }

    #[test]
    fn oversized_block_is_rejected() {
        let g: IntensityGrid = Grid::new(8, 8, 50);
        assert!(matches!(
            adaptive_mask(&g, 100_000, 2),
            Err(Error::InvalidParameter { field: "adaptive_block_size", .. })
        ));
        assert!(matches!(
            edge_mask(&g, 1000.0, 25.5, 51.0),
            Err(Error::InvalidParameter { field: "edge_sigma", .. })
        ));
    }

    #[test]
    fn small_sigma_keeps_detail_a_wider_blur_removes() {
        // Single dark pixel: gradient peak ~278 at sigma 0.5, ~54 at sigma 1.3.
        let mut g: IntensityGrid = Grid::new(21, 21, 200);
        g.set(10, 10, 0);
        let sharp = edge_mask(&g, 0.5, 60.0, 100.0).unwrap();
        assert!(sharp.active_count() > 0);
        assert!(sharp.is_active(10, 9));
        let soft = edge_mask(&g, 1.3, 60.0, 100.0).unwrap();
        assert_eq!(soft.active_count(), 0);
    }

    #[test]
    fn block_sigma_matches_kernel_rule() {
        assert!((block_sigma(3) - 0.8).abs() < 1e-6);
        assert!((block_sigma(11) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn edges_follow_a_vertical_step() {
        let g: IntensityGrid = Grid::from_fn(32, 32, |_, c| if c < 16 { 20 } else { 220 });
        let m = edge_mask(&g, 1.0, 25.5, 51.0).unwrap();
        assert!(m.active_count() > 0);
        // Nothing far from the step.
        for r in 0..32 {
            assert!(!m.is_active(r, 2));
            assert!(!m.is_active(r, 29));
        }
    }

    #[test]
    fn flat_grid_has_no_edges() {
        let g: IntensityGrid = Grid::new(12, 12, 128);
        assert_eq!(edge_mask(&g, 1.0, 25.5, 51.0).unwrap().active_count(), 0);
    }

    #[test]
    fn degenerate_grid_is_invalid_input() {
        let g: IntensityGrid = Grid::new(4, 0, 0);
        assert!(matches!(
            detect_regions(&g, &AnalysisParameters::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
