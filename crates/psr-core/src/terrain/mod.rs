//! Terrain analysis: peaks, valleys and local roughness.

pub mod peaks;
pub mod roughness;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::grid::{IntensityGrid, PointSet, RoughnessField};
use crate::params::AnalysisParameters;
pub use peaks::find_peaks;
pub use roughness::roughness_field;

/// Output of [`analyze_terrain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainAnalysis {
    /// Local maxima, brightest first.
    pub peaks: PointSet,
    /// Local maxima of the inverted grid, darkest first.
    pub valleys: PointSet,
    pub roughness: RoughnessField,
}

impl TerrainAnalysis {
    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }

    pub fn valley_count(&self) -> usize {
        self.valleys.len()
    }

    pub fn mean_roughness(&self) -> f64 {
        self.roughness.mean()
    }
}

/// Scalar terrain summary carried in the analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainSummary {
    pub peak_count: usize,
    pub valley_count: usize,
    pub mean_roughness: f64,
}

impl From<&TerrainAnalysis> for TerrainSummary {
    fn from(t: &TerrainAnalysis) -> Self {
        Self {
            peak_count: t.peak_count(),
            valley_count: t.valley_count(),
            mean_roughness: t.mean_roughness(),
        }
    }
}

/// Find peaks, valleys (peaks of `255 - v`) and the roughness field.
pub fn analyze_terrain(
    grid: &IntensityGrid,
    params: &AnalysisParameters,
) -> Result<TerrainAnalysis> {
    grid.ensure_non_degenerate()?;

    let peaks = find_peaks(grid, params.peak_min_distance);
    let valleys = find_peaks(&grid.inverted(), params.peak_min_distance);
    let roughness = roughness_field(grid, params.roughness_size);

    debug!(
        peaks = peaks.len(),
        valleys = valleys.len(),
        mean_roughness = roughness.mean(),
        "terrain analysed"
    );

    Ok(TerrainAnalysis { peaks, valleys, roughness })
}
