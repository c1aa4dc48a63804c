use thiserror::Error;

/// Errors raised while rendering or exporting analysis products.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown visualization type '{0}'")]
    UnknownVisualization(String),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV buffer error: {0}")]
    CsvBuffer(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
