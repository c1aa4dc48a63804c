//! Summary statistics over the enhanced grid and the detection masks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detect::DetectionMethod;
use crate::error::{Error, Result};
use crate::grid::{BinaryMask, IntensityGrid};

/// Whole-grid intensity summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageStatistics {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: u8,
    pub max: u8,
    /// `max - min`.
    pub dynamic_range: u8,
}

/// Percentage (0–100) of active cells, keyed by the method that produced the mask.
pub type CoverageStatistics = BTreeMap<DetectionMethod, f64>;

/// Output of [`calculate_statistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub image_stats: ImageStatistics,
    pub psr_coverage: CoverageStatistics,
}

/// Mean, std, min, max and dynamic range over every cell.
pub fn image_statistics(grid: &IntensityGrid) -> Result<ImageStatistics> {
    grid.ensure_non_degenerate()?;

    let n = grid.len() as f64;
    let mean = grid.data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = grid
        .data
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let min = grid.min_value();
    let max = grid.max_value();

    Ok(ImageStatistics {
        mean,
        std: var.sqrt(),
        min,
        max,
        dynamic_range: max - min,
    })
}

/// `100 · active / total` for one mask.
pub fn coverage_percent(mask: &BinaryMask) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    100.0 * mask.active_count() as f64 / mask.len() as f64
}

/// Image statistics plus per-mask coverage. Keys of the coverage map are
/// exactly the methods passed in; every mask must match the grid's shape.
pub fn calculate_statistics<'a>(
    grid: &IntensityGrid,
    masks: impl IntoIterator<Item = (DetectionMethod, &'a BinaryMask)>,
) -> Result<Statistics> {
    let image_stats = image_statistics(grid)?;

    let mut psr_coverage = CoverageStatistics::new();
    for (method, mask) in masks {
        if mask.width() != grid.width || mask.height() != grid.height {
            return Err(Error::InvalidInput(format!(
                "{method} mask is {}x{}, grid is {}x{}",
                mask.height(),
                mask.width(),
                grid.height,
                grid.width
            )));
        }
        psr_coverage.insert(method, coverage_percent(mask));
    }

    Ok(Statistics { image_stats, psr_coverage })
}
