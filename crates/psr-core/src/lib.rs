//! Analysis core for lunar permanently shadowed region (PSR) imagery.
//!
//! Pipeline: enhance → detect regions → analyse terrain → statistics →
//! landing assessment. Everything here works on in-memory grids; file,
//! network and rendering concerns live in the sibling crates.

mod border;
mod canny;

pub mod analyzer;
pub mod detect;
pub mod enhance;
pub mod error;
pub mod grid;
pub mod landing;
pub mod params;
pub mod source;
pub mod stats;
pub mod terrain;

pub use analyzer::{run_analysis, AnalysisReport, AnalysisResult, PsrAnalyzer, StageOutputs};
pub use detect::{DetectionMasks, DetectionMethod};
pub use error::{Error, Result};
pub use grid::{BinaryMask, Grid, IntensityGrid, Point, PointSet, RoughnessField};
pub use landing::{assess_landing_safety, LandingAssessment};
pub use params::{AnalysisParameters, ParameterOverrides};
pub use stats::{CoverageStatistics, ImageStatistics, Statistics};
pub use terrain::{TerrainAnalysis, TerrainSummary};
