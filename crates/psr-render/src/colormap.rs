//! Scalar → RGB colour ramps.

use serde::{Deserialize, Serialize};

/// Colour ramp applied to a normalized scalar in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    Gray,
    Hot,
    Viridis,
}

/// Viridis sampled at nine evenly spaced stops, linearly interpolated between.
const VIRIDIS_STOPS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

impl Colormap {
    /// Map `t` (clamped to `[0, 1]`) to RGB.
    pub fn map(self, t: f64) -> [u8; 3] {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        match self {
            Colormap::Gray => {
                let v = to_byte(t);
                [v, v, v]
            }
            // Black → red → yellow → white, each channel ramping over a third.
            Colormap::Hot => [
                to_byte(3.0 * t),
                to_byte(3.0 * t - 1.0),
                to_byte(3.0 * t - 2.0),
            ],
            Colormap::Viridis => {
                let pos = t * (VIRIDIS_STOPS.len() - 1) as f64;
                let i = (pos.floor() as usize).min(VIRIDIS_STOPS.len() - 2);
                let f = pos - i as f64;
                let (a, b) = (VIRIDIS_STOPS[i], VIRIDIS_STOPS[i + 1]);
                [lerp(a[0], b[0], f), lerp(a[1], b[1], f), lerp(a[2], b[2], f)]
            }
        }
    }
}

fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn lerp(a: u8, b: u8, f: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * f).round() as u8
}

/// Min–max normalize `values` into `[0, 1]`. A constant input maps to 0.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    if !(span > 0.0) {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| (v - lo) / span).collect()
}
