//! Single-panel and six-panel overview rendering.

use std::fmt;
use std::str::FromStr;

use image::{Rgb, RgbImage};
use psr_core::{AnalysisResult, BinaryMask, Grid, IntensityGrid};
use serde::{Deserialize, Serialize};

use crate::colormap::{normalize, Colormap};
use crate::error::RenderError;

/// Overview canvas colour (`#1a1a2e`).
pub const BACKGROUND: [u8; 3] = [0x1a, 0x1a, 0x2e];

/// Gap between overview panels and around the border, in pixels.
pub const PANEL_GAP: u32 = 8;

/// Which pipeline product a panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationKind {
    Original,
    Enhanced,
    Threshold,
    Adaptive,
    Edges,
    Roughness,
}

impl VisualizationKind {
    /// Overview order: row-major over a 3×2 grid.
    pub const ALL: [VisualizationKind; 6] = [
        VisualizationKind::Original,
        VisualizationKind::Enhanced,
        VisualizationKind::Threshold,
        VisualizationKind::Adaptive,
        VisualizationKind::Edges,
        VisualizationKind::Roughness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VisualizationKind::Original => "original",
            VisualizationKind::Enhanced => "enhanced",
            VisualizationKind::Threshold => "threshold",
            VisualizationKind::Adaptive => "adaptive",
            VisualizationKind::Edges => "edges",
            VisualizationKind::Roughness => "roughness",
        }
    }

    pub fn colormap(self) -> Colormap {
        match self {
            VisualizationKind::Original
            | VisualizationKind::Enhanced
            | VisualizationKind::Edges => Colormap::Gray,
            VisualizationKind::Threshold | VisualizationKind::Adaptive => Colormap::Hot,
            VisualizationKind::Roughness => Colormap::Viridis,
        }
    }
}

impl fmt::Display for VisualizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualizationKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisualizationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| RenderError::UnknownVisualization(s.to_string()))
    }
}

// ── Scalar → RGB ──────────────────────────────────────────────────────────────

/// Min–max normalize a scalar grid and colour it.
pub fn colorize(grid: &Grid<f64>, cmap: Colormap) -> RgbImage {
    let norm = normalize(&grid.data);
    let mut img = RgbImage::new(grid.width as u32, grid.height as u32);
    for (i, t) in norm.into_iter().enumerate() {
        let (r, c) = (i / grid.width, i % grid.width);
        img.put_pixel(c as u32, r as u32, Rgb(cmap.map(t)));
    }
    img
}

fn intensity(grid: &IntensityGrid) -> Grid<f64> {
    grid.map(|&v| v as f64)
}

fn mask_values(mask: &BinaryMask) -> Grid<f64> {
    mask.as_grid().map(|&v| v as f64)
}

/// Unscaled gray rendering of an intensity grid, used for upload previews.
pub fn render_intensity(grid: &IntensityGrid) -> RgbImage {
    RgbImage::from_fn(grid.width as u32, grid.height as u32, |x, y| {
        let v = grid.get(y as usize, x as usize);
        Rgb([v, v, v])
    })
}

/// Render one pipeline product. `original` is the unenhanced input.
pub fn render_panel(
    kind: VisualizationKind,
    original: &IntensityGrid,
    result: &AnalysisResult,
) -> RgbImage {
    let values = match kind {
        VisualizationKind::Original => intensity(original),
        VisualizationKind::Enhanced => intensity(&result.enhanced),
        VisualizationKind::Threshold => mask_values(&result.masks.threshold),
        VisualizationKind::Adaptive => mask_values(&result.masks.adaptive),
        VisualizationKind::Edges => mask_values(&result.masks.edges),
        VisualizationKind::Roughness => result.terrain.roughness.clone(),
    };
    colorize(&values, kind.colormap())
}

/// All six panels tiled 3 columns × 2 rows on the dark background.
pub fn render_overview(original: &IntensityGrid, result: &AnalysisResult) -> RgbImage {
    let (pw, ph) = (original.width as u32, original.height as u32);
    let width = 3 * pw + 4 * PANEL_GAP;
    let height = 2 * ph + 3 * PANEL_GAP;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb(BACKGROUND));

    for (i, kind) in VisualizationKind::ALL.into_iter().enumerate() {
        let panel = render_panel(kind, original, result);
        let col = (i % 3) as u32;
        let row = (i / 3) as u32;
        let x0 = PANEL_GAP + col * (pw + PANEL_GAP);
        let y0 = PANEL_GAP + row * (ph + PANEL_GAP);
        image::imageops::replace(&mut canvas, &panel, x0 as i64, y0 as i64);
    }
    canvas
}
