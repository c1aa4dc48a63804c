//! Presentation layer: colour ramps, panels, and encoded exports of
//! analysis results.

pub mod colormap;
pub mod error;
pub mod export;
pub mod panel;

pub use colormap::Colormap;
pub use error::{RenderError, Result};
pub use export::{encode_png, panels_to_base64, report_to_csv, report_to_json, to_base64_png};
pub use panel::{render_intensity, render_overview, render_panel, VisualizationKind};
