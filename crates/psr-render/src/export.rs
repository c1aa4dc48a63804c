//! Encoded outputs: PNG bytes, base64 PNG, JSON and CSV reports.

use std::collections::BTreeMap;
use std::io::Cursor;

use base64::Engine;
use image::{ImageFormat, RgbImage};
use psr_core::{AnalysisReport, AnalysisResult, IntensityGrid};
use serde_json::Value;

use crate::error::{RenderError, Result};
use crate::panel::{render_panel, VisualizationKind};

pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// PNG bytes, standard base64 alphabet with padding.
pub fn to_base64_png(img: &RgbImage) -> Result<String> {
    let png = encode_png(img)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}

/// Every panel as base64 PNG, keyed by visualization name.
pub fn panels_to_base64(
    original: &IntensityGrid,
    result: &AnalysisResult,
) -> Result<BTreeMap<&'static str, String>> {
    let mut panels = BTreeMap::new();
    for kind in VisualizationKind::ALL {
        panels.insert(kind.as_str(), to_base64_png(&render_panel(kind, original, result))?);
    }
    Ok(panels)
}

/// Pretty-printed JSON, the `statistics.json` layout.
pub fn report_to_json(report: &AnalysisReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn cell(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flat `section,key,value` rows covering every scalar in the report.
pub fn report_to_csv(report: &AnalysisReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["section", "key", "value"])?;

    wtr.write_record(["image", "width", &report.width.to_string()])?;
    wtr.write_record(["image", "height", &report.height.to_string()])?;

    for section in ["image_stats", "psr_coverage", "terrain", "parameters"] {
        let value = match section {
            "image_stats" => serde_json::to_value(report.image_stats)?,
            "psr_coverage" => serde_json::to_value(&report.psr_coverage)?,
            "terrain" => serde_json::to_value(report.terrain)?,
            _ => serde_json::to_value(&report.parameters)?,
        };
        if let Value::Object(map) = value {
            for (key, v) in &map {
                wtr.write_record([section, key.as_str(), &cell(v)])?;
            }
        }
    }

    let landing = &report.landing_assessment;
    wtr.write_record(["landing_assessment", "is_safe", &landing.is_safe.to_string()])?;
    wtr.write_record(["landing_assessment", "verdict", &landing.verdict])?;

    let bytes = wtr
        .into_inner()
        .map_err(|e| RenderError::CsvBuffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RenderError::CsvBuffer(e.to_string()))
}
