//! Analysis configuration.
//!
//! `AnalysisParameters` is only ever built validated: either from
//! `Default`, or from a loose `ParameterOverrides` record through
//! `TryFrom`, which is also the serde entry point. Missing keys take the
//! documented default; out-of-domain values fail with
//! [`Error::InvalidParameter`] naming the field.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Roughness (intensity std dev) at or above which terrain is unsafe.
/// Policy input carried over from field practice, not a calibrated physical limit.
pub const DEFAULT_ROUGHNESS_THRESHOLD: f64 = 30.0;

/// Fraction of edge cells at or above which terrain is unsafe.
/// Policy input, same caveat as the roughness cutoff.
pub const DEFAULT_EDGE_DENSITY_THRESHOLD: f64 = 0.10;

// ── Upper bounds ─────────────────────────────────────────────────────────────
//
// Every size and sigma knob is capped so a single parameter set cannot ask
// a stage for an unbounded buffer or kernel.

/// Largest roughness window and adaptive block side.
pub const MAX_WINDOW_SIZE: usize = 255;

/// Largest CLAHE tile grid per axis.
pub const MAX_CLAHE_TILES: usize = 64;

/// Largest peak/valley separation.
pub const MAX_PEAK_DISTANCE: usize = 4096;

/// Largest median denoise radius.
pub const MAX_DENOISE_RADIUS: u32 = 32;

/// Largest Gaussian sigma for edge pre-smoothing.
pub const MAX_SIGMA: f64 = 64.0;

/// Largest gamma exponent.
pub const MAX_GAMMA: f64 = 10.0;

/// Validated analysis knobs. Every stage reads only the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterOverrides")]
pub struct AnalysisParameters {
    /// CLAHE contrast clip limit, > 0.
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid is `clahe_tile_size × clahe_tile_size`.
    pub clahe_tile_size: usize,
    /// Cells strictly darker than this are threshold candidates.
    pub basic_threshold: u8,
    /// Adaptive neighbourhood side. Always odd after construction.
    pub adaptive_block_size: usize,
    /// Subtracted from the local Gaussian mean.
    pub adaptive_c: i32,
    /// Gaussian pre-smoothing before Canny.
    pub edge_sigma: f32,
    pub edge_low_threshold: f32,
    pub edge_high_threshold: f32,
    /// Minimum Chebyshev separation between peaks (and between valleys).
    pub peak_min_distance: usize,
    /// Side of the roughness window.
    pub roughness_size: usize,
    /// Median denoise before CLAHE.
    pub denoise: bool,
    pub denoise_radius: u32,
    /// Gamma applied after CLAHE; 1.0 disables the step.
    pub gamma: f32,
    /// 3×3 sharpen after gamma.
    pub sharpen: bool,
    pub landing_roughness_threshold: f64,
    pub landing_edge_density_threshold: f64,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tile_size: 8,
            basic_threshold: 50,
            adaptive_block_size: 11,
            adaptive_c: 2,
            edge_sigma: 1.0,
            edge_low_threshold: 25.5,
            edge_high_threshold: 51.0,
            peak_min_distance: 20,
            roughness_size: 5,
            denoise: false,
            denoise_radius: 1,
            gamma: 1.0,
            sharpen: false,
            landing_roughness_threshold: DEFAULT_ROUGHNESS_THRESHOLD,
            landing_edge_density_threshold: DEFAULT_EDGE_DENSITY_THRESHOLD,
        }
    }
}

/// Loose, every-key-optional form of [`AnalysisParameters`] as it arrives
/// from JSON. Numbers are taken as `f64` and range-checked on conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverrides {
    pub clahe_clip_limit: Option<f64>,
    pub clahe_tile_size: Option<f64>,
    pub basic_threshold: Option<f64>,
    pub adaptive_block_size: Option<f64>,
    pub adaptive_c: Option<f64>,
    pub edge_sigma: Option<f64>,
    pub edge_low_threshold: Option<f64>,
    pub edge_high_threshold: Option<f64>,
    pub peak_min_distance: Option<f64>,
    pub roughness_size: Option<f64>,
    pub denoise: Option<bool>,
    pub denoise_radius: Option<f64>,
    pub gamma: Option<f64>,
    pub sharpen: Option<bool>,
    pub landing_roughness_threshold: Option<f64>,
    pub landing_edge_density_threshold: Option<f64>,
}

/// Next odd value for even block sizes, unchanged otherwise.
pub fn normalize_block_size(size: usize) -> usize {
    if size % 2 == 0 { size + 1 } else { size }
}

fn integral(field: &'static str, v: f64) -> Result<i64> {
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(Error::invalid_parameter(field, v, "must be an integer"));
    }
    Ok(v as i64)
}

fn integral_at_least(field: &'static str, v: f64, min: i64) -> Result<usize> {
    let n = integral(field, v)?;
    if n < min {
        return Err(Error::invalid_parameter(field, v, format!("must be >= {min}")));
    }
    Ok(n as usize)
}

fn integral_within(field: &'static str, v: f64, min: i64, max: usize) -> Result<usize> {
    let n = integral_at_least(field, v, min)?;
    if n > max {
        return Err(Error::invalid_parameter(field, v, format!("must be <= {max}")));
    }
    Ok(n)
}

fn positive_at_most(field: &'static str, v: f64, max: f64) -> Result<f64> {
    let v = positive(field, v)?;
    if v > max {
        return Err(Error::invalid_parameter(field, v, format!("must be <= {max}")));
    }
    Ok(v)
}

fn positive(field: &'static str, v: f64) -> Result<f64> {
    if !v.is_finite() || v <= 0.0 {
        return Err(Error::invalid_parameter(field, v, "must be a finite value > 0"));
    }
    Ok(v)
}

impl TryFrom<ParameterOverrides> for AnalysisParameters {
    type Error = Error;

    fn try_from(o: ParameterOverrides) -> Result<Self> {
        let d = AnalysisParameters::default();

        let clahe_clip_limit = match o.clahe_clip_limit {
            Some(v) => positive("clahe_clip_limit", v)? as f32,
            None => d.clahe_clip_limit,
        };
        let clahe_tile_size = match o.clahe_tile_size {
            Some(v) => integral_within("clahe_tile_size", v, 1, MAX_CLAHE_TILES)?,
            None => d.clahe_tile_size,
        };
        let basic_threshold = match o.basic_threshold {
            Some(v) => {
                let n = integral("basic_threshold", v)?;
                u8::try_from(n).map_err(|_| {
                    Error::invalid_parameter("basic_threshold", v, "must be within 0..=255")
                })?
            }
            None => d.basic_threshold,
        };
        let adaptive_block_size = match o.adaptive_block_size {
            Some(v) => normalize_block_size(integral_within(
                "adaptive_block_size",
                v,
                2,
                MAX_WINDOW_SIZE,
            )?),
            None => d.adaptive_block_size,
        };
        let adaptive_c = match o.adaptive_c {
            Some(v) => {
                let n = integral("adaptive_c", v)?;
                i32::try_from(n).map_err(|_| {
                    Error::invalid_parameter("adaptive_c", v, "out of i32 range")
                })?
            }
            None => d.adaptive_c,
        };
        let edge_sigma = match o.edge_sigma {
            Some(v) => positive_at_most("edge_sigma", v, MAX_SIGMA)? as f32,
            None => d.edge_sigma,
        };
        let edge_low_threshold = match o.edge_low_threshold {
            Some(v) if !v.is_finite() || v < 0.0 => {
                return Err(Error::invalid_parameter("edge_low_threshold", v, "must be >= 0"));
            }
            Some(v) => v as f32,
            None => d.edge_low_threshold,
        };
        let edge_high_threshold = match o.edge_high_threshold {
            Some(v) if !v.is_finite() => {
                return Err(Error::invalid_parameter("edge_high_threshold", v, "must be finite"));
            }
            Some(v) => v as f32,
            None => d.edge_high_threshold,
        };
        if edge_high_threshold < edge_low_threshold {
            return Err(Error::invalid_parameter(
                "edge_high_threshold",
                edge_high_threshold,
                format!("must be >= edge_low_threshold ({edge_low_threshold})"),
            ));
        }
        let peak_min_distance = match o.peak_min_distance {
            Some(v) => integral_within("peak_min_distance", v, 1, MAX_PEAK_DISTANCE)?,
            None => d.peak_min_distance,
        };
        let roughness_size = match o.roughness_size {
            Some(v) => integral_within("roughness_size", v, 1, MAX_WINDOW_SIZE)?,
            None => d.roughness_size,
        };
        let denoise_radius = match o.denoise_radius {
            Some(v) => {
                integral_within("denoise_radius", v, 1, MAX_DENOISE_RADIUS as usize)? as u32
            }
            None => d.denoise_radius,
        };
        let gamma = match o.gamma {
            Some(v) => positive_at_most("gamma", v, MAX_GAMMA)? as f32,
            None => d.gamma,
        };
        let landing_roughness_threshold = match o.landing_roughness_threshold {
            Some(v) => positive("landing_roughness_threshold", v)?,
            None => d.landing_roughness_threshold,
        };
        let landing_edge_density_threshold = match o.landing_edge_density_threshold {
            Some(v) if !(v > 0.0 && v <= 1.0) => {
                return Err(Error::invalid_parameter(
                    "landing_edge_density_threshold",
                    v,
                    "must be within (0, 1]",
                ));
            }
            Some(v) => v,
            None => d.landing_edge_density_threshold,
        };

        Ok(Self {
            clahe_clip_limit,
            clahe_tile_size,
            basic_threshold,
            adaptive_block_size,
            adaptive_c,
            edge_sigma,
            edge_low_threshold,
            edge_high_threshold,
            peak_min_distance,
            roughness_size,
            denoise: o.denoise.unwrap_or(d.denoise),
            denoise_radius,
            gamma,
            sharpen: o.sharpen.unwrap_or(d.sharpen),
            landing_roughness_threshold,
            landing_edge_density_threshold,
        })
    }
}

impl AnalysisParameters {
    /// Parse a JSON object of overrides. `null` yields the defaults.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let overrides: ParameterOverrides = serde_json::from_value(value)
            .map_err(|e| Error::InvalidInput(format!("malformed parameters: {e}")))?;
        Self::try_from(overrides)
    }

    /// Re-check a hand-built record (fields are public). Even block sizes
    /// are rejected here; [`crate::PsrAnalyzer::new`] normalizes them first.
    pub fn validate(&self) -> Result<()> {
        Self::try_from(ParameterOverrides::from(self)).map(|_| ())?;
        if self.adaptive_block_size % 2 == 0 {
            return Err(Error::invalid_parameter(
                "adaptive_block_size",
                self.adaptive_block_size,
                "must be odd; build through ParameterOverrides to normalize",
            ));
        }
        Ok(())
    }
}

impl From<&AnalysisParameters> for ParameterOverrides {
    fn from(p: &AnalysisParameters) -> Self {
        Self {
            clahe_clip_limit: Some(p.clahe_clip_limit as f64),
            clahe_tile_size: Some(p.clahe_tile_size as f64),
            basic_threshold: Some(p.basic_threshold as f64),
            adaptive_block_size: Some(p.adaptive_block_size as f64),
            adaptive_c: Some(p.adaptive_c as f64),
            edge_sigma: Some(p.edge_sigma as f64),
            edge_low_threshold: Some(p.edge_low_threshold as f64),
            edge_high_threshold: Some(p.edge_high_threshold as f64),
            peak_min_distance: Some(p.peak_min_distance as f64),
            roughness_size: Some(p.roughness_size as f64),
            denoise: Some(p.denoise),
            denoise_radius: Some(p.denoise_radius as f64),
            gamma: Some(p.gamma as f64),
            sharpen: Some(p.sharpen),
            landing_roughness_threshold: Some(p.landing_roughness_threshold),
            landing_edge_density_threshold: Some(p.landing_edge_density_threshold),
        }
    }
}
