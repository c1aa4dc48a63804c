//! Reading the analysis input from a local path or an HTTP(S) URL.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Raw encoded bytes of `source`.
pub fn read_source(source: &str) -> Result<Vec<u8>> {
    if is_url(source) {
        fetch_url(source)
    } else {
        let path = Path::new(source);
        fs::read(path).with_context(|| format!("failed to read image file {}", path.display()))
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>> {
    info!(url, "downloading image");
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("server rejected request for {url}"))?;
    let bytes = response
        .bytes()
        .with_context(|| format!("failed to read response body from {url}"))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.org/psr.png"));
        assert!(is_url("http://localhost:5000/display/abc"));
        assert!(!is_url("data/psr.png"));
        assert!(!is_url("ftp://example.org/psr.png"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_source("/definitely/not/here.png").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.png"));
    }

    #[test]
    fn local_file_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        assert_eq!(read_source(path.to_str().unwrap()).unwrap(), vec![1, 2, 3]);
    }
}
