//! Landing safety assessment.
//!
//! Two independent criteria, each SAFE when strictly below its threshold:
//!
//!   roughness:    mean(roughness field)        < landing_roughness_threshold
//!   edge density: active(edges) / total(edges) < landing_edge_density_threshold
//!
//! The final verdict is SAFE only when both criteria are SAFE. The function
//! is pure: the same inputs always give the same verdict and text. Empty
//! inputs count as zero roughness / zero density.

use serde::{Deserialize, Serialize};

use crate::grid::{BinaryMask, RoughnessField};
use crate::params::{
    AnalysisParameters, DEFAULT_EDGE_DENSITY_THRESHOLD, DEFAULT_ROUGHNESS_THRESHOLD,
};

/// Result of [`assess_landing_safety`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingAssessment {
    pub is_safe: bool,
    /// Per-criterion lines followed by the final verdict line.
    pub rationale: Vec<String>,
    pub verdict: String,
}

impl LandingAssessment {
    /// Rationale joined with newlines.
    pub fn explanation(&self) -> String {
        self.rationale.join("\n")
    }
}

/// Decision thresholds for the two criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyThresholds {
    pub roughness: f64,
    /// Fraction in (0, 1].
    pub edge_density: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            roughness: DEFAULT_ROUGHNESS_THRESHOLD,
            edge_density: DEFAULT_EDGE_DENSITY_THRESHOLD,
        }
    }
}

impl From<&AnalysisParameters> for SafetyThresholds {
    fn from(p: &AnalysisParameters) -> Self {
        Self {
            roughness: p.landing_roughness_threshold,
            edge_density: p.landing_edge_density_threshold,
        }
    }
}

fn label(safe: bool) -> &'static str {
    if safe { "SAFE" } else { "UNSAFE" }
}

/// Classify landing safety from the roughness field and the edge mask.
/// `params` supplies the thresholds; `None` uses the documented defaults.
pub fn assess_landing_safety(
    roughness: &RoughnessField,
    params: Option<&AnalysisParameters>,
    edges: &BinaryMask,
) -> LandingAssessment {
    let thresholds = params.map(SafetyThresholds::from).unwrap_or_default();
    assess_with_thresholds(roughness, edges, thresholds)
}

pub fn assess_with_thresholds(
    roughness: &RoughnessField,
    edges: &BinaryMask,
    thresholds: SafetyThresholds,
) -> LandingAssessment {
    let mean_roughness = roughness.mean();
    let edge_density = edges.active_fraction();

    let roughness_safe = mean_roughness < thresholds.roughness;
    let edges_safe = edge_density < thresholds.edge_density;
    let is_safe = roughness_safe && edges_safe;

    let verdict = format!("FINAL ASSESSMENT: {} for landing", label(is_safe));
    let rationale = vec![
        format!(
            "Terrain Roughness: {} (mean {:.2}, threshold {:.2})",
            label(roughness_safe),
            mean_roughness,
            thresholds.roughness
        ),
        format!(
            "Edge Density: {} ({:.2}%, threshold {:.2}%)",
            label(edges_safe),
            edge_density * 100.0,
            thresholds.edge_density * 100.0
        ),
        verdict.clone(),
    ];

    LandingAssessment { is_safe, rationale, verdict }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn smooth_terrain_without_edges_is_safe() {
        let roughness: RoughnessField = Grid::new(3, 3, 10.0);
        let edges = BinaryMask::empty(10, 10);
        let a = assess_landing_safety(&roughness, None, &edges);
        assert!(a.is_safe);
        assert!(a.explanation().contains("FINAL ASSESSMENT: SAFE for landing"));
        assert_eq!(a.verdict, "FINAL ASSESSMENT: SAFE for landing");
    }

    #[test]
    fn rough_edgy_terrain_fails_both_criteria() {
        let roughness: RoughnessField = Grid::new(3, 3, 100.0);
        let edges = BinaryMask::from_fn(10, 10, |r, _| r < 6);
        let a = assess_landing_safety(&roughness, Some(&AnalysisParameters::default()), &edges);
        assert!(!a.is_safe);
        let text = a.explanation();
        assert!(text.contains("Terrain Roughness: UNSAFE"));
        assert!(text.contains("Edge Density: UNSAFE"));
        assert!(text.contains("FINAL ASSESSMENT: UNSAFE for landing"));
    }

    #[test]
    fn one_failing_criterion_is_enough() {
        let roughness: RoughnessField = Grid::new(3, 3, 100.0);
        let edges = BinaryMask::empty(10, 10);
        let a = assess_landing_safety(&roughness, None, &edges);
        assert!(!a.is_safe);
        assert!(a.rationale[0].starts_with("Terrain Roughness: UNSAFE"));
        assert!(a.rationale[1].starts_with("Edge Density: SAFE"));
    }

    #[test]
    fn all_zero_inputs_are_safe_and_finite() {
        let roughness: RoughnessField = Grid::new(4, 4, 0.0);
        let edges = BinaryMask::empty(4, 4);
        let a = assess_landing_safety(&roughness, None, &edges);
        assert!(a.is_safe);
        assert!(!a.explanation().contains("NaN"));

        let empty_r: RoughnessField = Grid::new(0, 0, 0.0);
        let a = assess_landing_safety(&empty_r, None, &BinaryMask::empty(0, 0));
        assert!(a.is_safe);
        assert!(!a.explanation().contains("NaN"));
    }

    #[test]
    fn assessment_is_pure() {
        let roughness: RoughnessField = Grid::from_fn(5, 5, |r, c| (r * 5 + c) as f64);
        let edges = BinaryMask::from_fn(5, 5, |r, c| r == c);
        let a = assess_landing_safety(&roughness, None, &edges);
        let b = assess_landing_safety(&roughness, None, &edges);
        assert_eq!(a, b);
    }

    #[test]
    fn configured_thresholds_are_honoured() {
        let roughness: RoughnessField = Grid::new(3, 3, 10.0);
        let edges = BinaryMask::empty(3, 3);
        let strict = AnalysisParameters { landing_roughness_threshold: 5.0, ..Default::default() };
        assert!(!assess_landing_safety(&roughness, Some(&strict), &edges).is_safe);
    }
}
