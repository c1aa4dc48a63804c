/// PSR analysis CLI: analyse one image (file or URL) and write the report,
/// per-stage images and a six-panel overview to an output directory.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use psr_core::source::decode_grayscale;
use psr_core::{
    AnalysisParameters, AnalysisResult, IntensityGrid, ParameterOverrides, PsrAnalyzer,
};
use psr_render::{
    encode_png, render_overview, render_panel, report_to_csv, report_to_json, VisualizationKind,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod source;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "analyze", about = "Analyse a lunar PSR image and assess landing safety")]
struct Args {
    /// Image path, or an http(s) URL to download
    source: String,

    /// Output directory (default: psr_analysis_<YYYYmmdd_HHMMSS>)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// JSON file of parameter overrides; individual flags below win over it
    #[arg(long)]
    params: Option<PathBuf>,

    /// Write only statistics.json / statistics.csv
    #[arg(long)]
    no_images: bool,

    #[command(flatten)]
    overrides: ParamFlags,
}

/// Per-parameter overrides. Unset flags keep the file/default value.
#[derive(clap::Args, Debug, Default)]
struct ParamFlags {
    #[arg(long)]
    clahe_clip_limit: Option<f64>,
    #[arg(long)]
    clahe_tile_size: Option<f64>,
    #[arg(long)]
    basic_threshold: Option<f64>,
    /// Even values are bumped to the next odd size
    #[arg(long)]
    adaptive_block_size: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    adaptive_c: Option<f64>,
    #[arg(long)]
    edge_sigma: Option<f64>,
    #[arg(long)]
    edge_low_threshold: Option<f64>,
    #[arg(long)]
    edge_high_threshold: Option<f64>,
    #[arg(long)]
    peak_min_distance: Option<f64>,
    #[arg(long)]
    roughness_size: Option<f64>,
    #[arg(long)]
    denoise: Option<bool>,
    #[arg(long)]
    denoise_radius: Option<f64>,
    #[arg(long)]
    gamma: Option<f64>,
    #[arg(long)]
    sharpen: Option<bool>,
    #[arg(long)]
    landing_roughness_threshold: Option<f64>,
    #[arg(long)]
    landing_edge_density_threshold: Option<f64>,
}

impl ParamFlags {
    fn apply(&self, o: &mut ParameterOverrides) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { o.$field = Some(v); })*
            };
        }
        set!(
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
            denoise,
            denoise_radius,
            gamma,
            sharpen,
            landing_roughness_threshold,
            landing_edge_density_threshold,
        );
    }
}

// ── Parameters ───────────────────────────────────────────────────────────────

fn resolve_params(file: Option<&Path>, flags: &ParamFlags) -> Result<AnalysisParameters> {
    let mut overrides = match file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read parameters file {}", path.display()))?;
            serde_json::from_str::<ParameterOverrides>(&text)
                .with_context(|| format!("malformed parameters file {}", path.display()))?
        }
        None => ParameterOverrides::default(),
    };
    flags.apply(&mut overrides);
    Ok(AnalysisParameters::try_from(overrides)?)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(format!("psr_analysis_{}", chrono::Local::now().format("%Y%m%d_%H%M%S")))
}

// ── Output ───────────────────────────────────────────────────────────────────

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn write_outputs(
    dir: &Path,
    original: &IntensityGrid,
    result: &AnalysisResult,
    images: bool,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    write_file(&dir.join("statistics.json"), report_to_json(&result.report)?.as_bytes())?;
    write_file(&dir.join("statistics.csv"), report_to_csv(&result.report)?.as_bytes())?;

    if images {
        for kind in VisualizationKind::ALL {
            if kind == VisualizationKind::Original {
                continue;
            }
            let png = encode_png(&render_panel(kind, original, result))?;
            write_file(&dir.join(format!("{kind}.png")), &png)?;
        }
        let overview = encode_png(&render_overview(original, result))?;
        write_file(&dir.join("analysis_result.png"), &overview)?;
    }
    Ok(())
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn run(args: Args) -> Result<PathBuf> {
    let params = resolve_params(args.params.as_deref(), &args.overrides)?;
    let bytes = source::read_source(&args.source)?;
    let image = decode_grayscale(&bytes)
        .with_context(|| format!("failed to decode image from {}", args.source))?;
    info!(width = image.width, height = image.height, "image loaded");

    let result = PsrAnalyzer::new(params)?.analyze(&image)?;

    let out_dir = args.output_dir.unwrap_or_else(default_output_dir);
    write_outputs(&out_dir, &image, &result, !args.no_images)?;

    let report = &result.report;
    println!("PSR analysis of {} ({}x{})", args.source, report.width, report.height);
    for (method, pct) in &report.psr_coverage {
        println!("  {method:<10} coverage: {pct:6.2}%");
    }
    println!(
        "  peaks: {}  valleys: {}  mean roughness: {:.2}",
        report.terrain.peak_count, report.terrain.valley_count, report.terrain.mean_roughness
    );
    println!();
    println!("{}", report.landing_assessment.explanation());
    Ok(out_dir)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let out_dir = run(Args::parse())?;
    info!(dir = %out_dir.display(), "results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, r#"{"basic_threshold": 70, "roughness_size": 7}"#).unwrap();

        let flags = ParamFlags { roughness_size: Some(9.0), ..Default::default() };
        let p = resolve_params(Some(&path), &flags).unwrap();
        assert_eq!(p.basic_threshold, 70);
        assert_eq!(p.roughness_size, 9);
        assert_eq!(p.peak_min_distance, 20);
    }

    #[test]
    fn invalid_flag_value_is_reported() {
        let flags = ParamFlags { edge_sigma: Some(-1.0), ..Default::default() };
        let err = resolve_params(None, &flags).unwrap_err();
        assert!(format!("{err:#}").contains("edge_sigma"));
    }

    #[test]
    fn cli_parses_overrides() {
        let args = Args::try_parse_from([
            "analyze",
            "psr.png",
            "--adaptive-block-size",
            "10",
            "--adaptive-c",
            "-3",
            "--no-images",
        ])
        .unwrap();
        assert!(args.no_images);
        let p = resolve_params(None, &args.overrides).unwrap();
        assert_eq!(p.adaptive_block_size, 11);
        assert_eq!(p.adaptive_c, -3);
    }

    #[test]
    fn default_output_dir_is_timestamped() {
        let name = default_output_dir();
        let name = name.to_str().unwrap();
        assert!(name.starts_with("psr_analysis_"));
        assert_eq!(name.len(), "psr_analysis_".len() + 15);
    }

    #[test]
    fn writes_report_and_images() {
        let image: IntensityGrid =
            psr_core::Grid::from_fn(48, 40, |r, c| ((r * 5 + c * 3) % 200) as u8);
        let result = psr_core::run_analysis(&image, &AnalysisParameters::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        write_outputs(dir.path(), &image, &result, true).unwrap();
        let expected = [
            "statistics.json",
            "statistics.csv",
            "edges.png",
            "roughness.png",
            "analysis_result.png",
        ];
        for name in expected {
            assert!(dir.path().join(name).is_file(), "{name}");
        }

        let other = tempfile::tempdir().unwrap();
        write_outputs(other.path(), &image, &result, false).unwrap();
        assert!(!other.path().join("analysis_result.png").exists());
    }
}
