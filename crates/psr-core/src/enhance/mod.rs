//! Enhancement stage: an ordered list of optional sub-steps.
//!
//! Order is fixed (denoise → CLAHE → gamma → sharpen); which steps run is
//! decided by `AnalysisParameters`. Every step returns a fresh grid of the
//! input's shape.

pub mod clahe;

use imageproc::filter::{median_filter, sharpen3x3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::grid::IntensityGrid;
use crate::params::AnalysisParameters;
pub use clahe::apply_clahe;

/// One enhancement sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementStep {
    Denoise,
    Clahe,
    Gamma,
    Sharpen,
}

/// Steps enabled by `params`, in execution order.
pub fn enhancement_steps(params: &AnalysisParameters) -> Vec<EnhancementStep> {
    let mut steps = Vec::with_capacity(4);
    if params.denoise {
        steps.push(EnhancementStep::Denoise);
    }
    steps.push(EnhancementStep::Clahe);
    if params.gamma != 1.0 {
        steps.push(EnhancementStep::Gamma);
    }
    if params.sharpen {
        steps.push(EnhancementStep::Sharpen);
    }
    steps
}

/// Run the enabled sub-steps over `grid`.
pub fn enhance(grid: &IntensityGrid, params: &AnalysisParameters) -> Result<IntensityGrid> {
    grid.ensure_non_degenerate()?;

    let mut current = grid.clone();
    for step in enhancement_steps(params) {
        debug!(?step, "enhancement step");
        current = match step {
            EnhancementStep::Denoise => {
                let img = current.to_gray_image()?;
                let r = params.denoise_radius;
                IntensityGrid::from_gray_image(median_filter(&img, r, r))
            }
            EnhancementStep::Clahe => {
                apply_clahe(&current, params.clahe_clip_limit, params.clahe_tile_size)
            }
            EnhancementStep::Gamma => apply_gamma(&current, params.gamma),
            EnhancementStep::Sharpen => {
                let img = current.to_gray_image()?;
                IntensityGrid::from_gray_image(sharpen3x3(&img))
            }
        };
    }
    Ok(current)
}

/// Gamma correction through a 256-entry lookup table: `out = 255·(v/255)^(1/γ)`.
pub fn apply_gamma(grid: &IntensityGrid, gamma: f32) -> IntensityGrid {
    let inv = 1.0 / gamma as f64;
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = (255.0 * (i as f64 / 255.0).powf(inv)).round().clamp(0.0, 255.0) as u8;
    }
    grid.map(|&v| lut[v as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::grid::Grid;

    fn gradient(rows: usize, cols: usize) -> IntensityGrid {
        Grid::from_fn(cols, rows, |r, c| ((r * 7 + c * 3) % 256) as u8)
    }

    #[test]
    fn default_params_run_clahe_only() {
        assert_eq!(
            enhancement_steps(&AnalysisParameters::default()),
            vec![EnhancementStep::Clahe]
        );
    }

    #[test]
    fn all_toggles_enable_steps_in_order() {
        let p = AnalysisParameters {
            denoise: true,
            gamma: 1.8,
            sharpen: true,
            ..Default::default()
        };
        assert_eq!(
            enhancement_steps(&p),
            vec![
                EnhancementStep::Denoise,
                EnhancementStep::Clahe,
                EnhancementStep::Gamma,
                EnhancementStep::Sharpen
            ]
        );
    }

    #[test]
    fn every_variant_preserves_shape() {
        let g = gradient(23, 41);
        let p = AnalysisParameters {
            denoise: true,
            gamma: 0.6,
            sharpen: true,
            ..Default::default()
        };
        let out = enhance(&g, &p).unwrap();
        assert_eq!(out.shape(), g.shape());
        let out = enhance(&g, &AnalysisParameters::default()).unwrap();
        assert_eq!(out.shape(), g.shape());
    }

    #[test]
    fn input_is_not_mutated() {
        let g = gradient(16, 16);
        let before = g.clone();
        let _ = enhance(&g, &AnalysisParameters::default()).unwrap();
        assert_eq!(g, before);
    }

    #[test]
    fn gamma_keeps_endpoints_and_brightens_midtones() {
        let g = Grid::from_rows(vec![vec![0u8, 64, 255]]).unwrap();
        let out = apply_gamma(&g, 2.2);
        assert_eq!(out.get(0, 0), 0);
        assert_eq!(out.get(0, 2), 255);
        assert!(out.get(0, 1) > 64);
    }

    #[test]
    fn empty_grid_is_rejected() {
        let g: IntensityGrid = Grid::new(0, 0, 0);
        assert!(matches!(
            enhance(&g, &AnalysisParameters::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
