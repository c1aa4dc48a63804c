//! Pipeline orchestrator: runs all analysis stages in order.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::detect::{detect_regions, DetectionMasks};
use crate::enhance::enhance;
use crate::error::Result;
use crate::grid::IntensityGrid;
use crate::landing::{assess_landing_safety, LandingAssessment};
use crate::params::{normalize_block_size, AnalysisParameters};
use crate::stats::{calculate_statistics, CoverageStatistics, ImageStatistics, Statistics};
use crate::terrain::{analyze_terrain, TerrainAnalysis, TerrainSummary};

// ── Public structs ────────────────────────────────────────────────────────────

/// Structured result bundle handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub width: usize,
    pub height: usize,
    pub image_stats: ImageStatistics,
    pub psr_coverage: CoverageStatistics,
    pub terrain: TerrainSummary,
    pub landing_assessment: LandingAssessment,
    pub parameters: AnalysisParameters,
}

impl AnalysisReport {
    pub fn statistics(&self) -> Statistics {
        Statistics {
            image_stats: self.image_stats,
            psr_coverage: self.psr_coverage.clone(),
        }
    }
}

/// Full output: the report plus pixel-level products as raw arrays.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub report: AnalysisReport,
    pub enhanced: IntensityGrid,
    pub masks: DetectionMasks,
    pub terrain: TerrainAnalysis,
    pub elapsed_ms: u64,
}

/// Intermediate products without the landing decision, for previews that
/// only need masks and statistics.
#[derive(Debug, Clone)]
pub struct StageOutputs {
    pub enhanced: IntensityGrid,
    pub masks: DetectionMasks,
    pub terrain: TerrainAnalysis,
    pub statistics: Statistics,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Stateless pipeline bound to one validated parameter set.
#[derive(Debug, Clone, Default)]
pub struct PsrAnalyzer {
    params: AnalysisParameters,
}

impl PsrAnalyzer {
    /// Bind a parameter set, re-validating it. An even adaptive block size
    /// is bumped to the next odd value, as the detector does.
    pub fn new(mut params: AnalysisParameters) -> Result<Self> {
        params.adaptive_block_size = normalize_block_size(params.adaptive_block_size);
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &AnalysisParameters {
        &self.params
    }

    /// Enhancement only.
    pub fn enhance(&self, image: &IntensityGrid) -> Result<IntensityGrid> {
        enhance(image, &self.params)
    }

    /// Run every stage except the landing assessment.
    ///
    /// Pipeline order:
    ///   1. Enhancement
    ///   2. Region detection
    ///   3. Terrain analysis
    ///   4. Statistics
    pub fn run_stages(&self, image: &IntensityGrid) -> Result<StageOutputs> {
        image.ensure_non_degenerate()?;

        // ── 1. Enhancement ──────────────────────────────────────────────────
        let t = Instant::now();
        let enhanced = enhance(image, &self.params)?;
        debug!(elapsed_ms = t.elapsed().as_millis() as u64, "enhanced");

        // ── 2. Region detection ─────────────────────────────────────────────
        let t = Instant::now();
        let masks = detect_regions(&enhanced, &self.params)?;
        debug!(elapsed_ms = t.elapsed().as_millis() as u64, "regions detected");

        // ── 3. Terrain analysis ─────────────────────────────────────────────
        let t = Instant::now();
        let terrain = analyze_terrain(&enhanced, &self.params)?;
        debug!(elapsed_ms = t.elapsed().as_millis() as u64, "terrain analysed");

        // ── 4. Statistics ───────────────────────────────────────────────────
        let statistics = calculate_statistics(&enhanced, masks.iter())?;

        Ok(StageOutputs { enhanced, masks, terrain, statistics })
    }

    /// Run the full pipeline, landing assessment included.
    pub fn analyze(&self, image: &IntensityGrid) -> Result<AnalysisResult> {
        let start = Instant::now();
        let StageOutputs { enhanced, masks, terrain, statistics } = self.run_stages(image)?;

        // ── 5. Landing safety ───────────────────────────────────────────────
        let landing_assessment =
            assess_landing_safety(&terrain.roughness, Some(&self.params), &masks.edges);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            width = image.width,
            height = image.height,
            safe = landing_assessment.is_safe,
            elapsed_ms,
            "analysis complete"
        );

        let report = AnalysisReport {
            width: image.width,
            height: image.height,
            image_stats: statistics.image_stats,
            psr_coverage: statistics.psr_coverage,
            terrain: TerrainSummary::from(&terrain),
            landing_assessment,
            parameters: self.params.clone(),
        };

        Ok(AnalysisResult { report, enhanced, masks, terrain, elapsed_ms })
    }
}

/// One-shot convenience: validate `params`, analyse `image`.
pub fn run_analysis(image: &IntensityGrid, params: &AnalysisParameters) -> Result<AnalysisResult> {
    PsrAnalyzer::new(params.clone())?.analyze(image)
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionMethod;
    use crate::error::Error;
    use crate::grid::Grid;

    /// Crater-like scene: bright rim ring around a dark floor on a mid-grey plain.
    fn crater_scene(n: usize) -> IntensityGrid {
        let centre = n as f64 / 2.0;
        Grid::from_fn(n, n, |r, c| {
            let d = ((r as f64 - centre).powi(2) + (c as f64 - centre).powi(2)).sqrt();
            if d < n as f64 * 0.2 {
                15
            } else if d < n as f64 * 0.28 {
                230
            } else {
                110 + ((r * 7 + c * 3) % 20) as u8
            }
        })
    }

    #[test]
    fn all_products_share_source_shape() {
        let img = crater_scene(96);
        let result = run_analysis(&img, &AnalysisParameters::default()).unwrap();
        assert_eq!(result.enhanced.shape(), img.shape());
        for (_, mask) in result.masks.iter() {
            assert_eq!((mask.height(), mask.width()), img.shape());
        }
        assert_eq!(result.terrain.roughness.shape(), img.shape());
        assert_eq!((result.report.height, result.report.width), img.shape());
    }

    #[test]
    fn report_is_finite_and_bounded() {
        let img = crater_scene(64);
        let report = run_analysis(&img, &AnalysisParameters::default()).unwrap().report;
        assert!(report.image_stats.mean.is_finite());
        assert!(report.image_stats.std.is_finite());
        assert!(report.terrain.mean_roughness.is_finite());
        let keys: Vec<DetectionMethod> = report.psr_coverage.keys().copied().collect();
        assert_eq!(keys, DetectionMethod::ALL.to_vec());
        for pct in report.psr_coverage.values() {
            assert!((0.0..=100.0).contains(pct));
        }
        assert_eq!(report.landing_assessment.rationale.len(), 3);
    }

    #[test]
    fn identical_inputs_give_identical_reports() {
        let img = crater_scene(64);
        let a = run_analysis(&img, &AnalysisParameters::default()).unwrap();
        let b = run_analysis(&img, &AnalysisParameters::default()).unwrap();
        assert_eq!(a.report, b.report);
        assert_eq!(a.terrain, b.terrain);
        assert_eq!(a.masks, b.masks);
    }

    #[test]
    fn uniform_image_is_safe_and_flat() {
        let img: IntensityGrid = Grid::new(40, 40, 100);
        let report = run_analysis(&img, &AnalysisParameters::default()).unwrap().report;
        assert_eq!(report.image_stats.std, 0.0);
        assert_eq!(report.image_stats.dynamic_range, 0);
        assert_eq!(report.terrain.mean_roughness, 0.0);
        assert!(report.landing_assessment.is_safe);
    }

    #[test]
    fn degenerate_image_fails_before_any_stage() {
        let img: IntensityGrid = Grid::new(0, 10, 0);
        assert!(matches!(
            run_analysis(&img, &AnalysisParameters::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn hand_built_invalid_params_are_rejected() {
        let params = AnalysisParameters { roughness_size: 0, ..Default::default() };
        assert!(matches!(
            PsrAnalyzer::new(params),
            Err(Error::InvalidParameter { field: "roughness_size", .. })
        ));
    }

    #[test]
    fn even_block_size_is_normalized_not_rejected() {
        let params = AnalysisParameters { adaptive_block_size: 10, ..Default::default() };
        let analyzer = PsrAnalyzer::new(params).unwrap();
        assert_eq!(analyzer.params().adaptive_block_size, 11);

        let img = crater_scene(48);
        let even = run_analysis(
            &img,
            &AnalysisParameters { adaptive_block_size: 10, ..Default::default() },
        )
        .unwrap();
        let odd = run_analysis(&img, &AnalysisParameters::default()).unwrap();
        assert_eq!(even.masks, odd.masks);
        assert_eq!(even.report, odd.report);
    }

    #[test]
    fn oversized_window_is_rejected_without_running() {
        let img: IntensityGrid = Grid::new(8, 8, 100);
        let params =
            AnalysisParameters::from_json(serde_json::json!({ "roughness_size": 200000 }));
        assert!(matches!(params, Err(Error::InvalidParameter { field: "roughness_size", .. })));

        let params = AnalysisParameters { roughness_size: 200_000, ..Default::default() };
        assert!(matches!(
            run_analysis(&img, &params),
            Err(Error::InvalidParameter { field: "roughness_size", .. })
        ));
        let params = AnalysisParameters { edge_sigma: 1000.0, ..Default::default() };
        assert!(matches!(
            run_analysis(&img, &params),
            Err(Error::InvalidParameter { field: "edge_sigma", .. })
        ));
    }

    #[test]
    fn report_serializes_to_json() {
        let img = crater_scene(48);
        let report = run_analysis(&img, &AnalysisParameters::default()).unwrap().report;
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["psr_coverage"]["threshold"].is_number());
        assert!(json["terrain"]["peak_count"].is_u64());
        assert!(json["landing_assessment"]["is_safe"].is_boolean());
        assert_eq!(json["parameters"]["adaptive_block_size"], 11);
    }
}
