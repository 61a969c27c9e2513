// src/fetch/mod.rs
//! Loader step: bring a remote file onto local disk.

use crate::error::{Error, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

const FALLBACK_NAME: &str = "download.bin";

/// Local file name for `url`: its last non-empty path segment.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_NAME)
        .to_string()
}

/// Download `url_str` into `dest_dir` under its original file name and return
/// the saved path. The body is written verbatim. Any network failure or
/// non-2xx status is a [`Error::Fetch`]; nothing is retried.
#[instrument(level = "info", skip(client, dest_dir), fields(dest = %dest_dir.as_ref().display()))]
pub async fn download_file(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str).map_err(|e| Error::fetch(url_str, e))?;
    let dest_path = dest_dir.join(file_name_for(&url));

    fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| Error::fetch(url_str, format!("creating {}: {}", dest_dir.display(), e)))?;

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| Error::fetch(url_str, e))?
        .error_for_status()
        .map_err(|e| Error::fetch(url_str, e))?;
    let bytes = resp.bytes().await.map_err(|e| Error::fetch(url_str, e))?;
    fs::write(&dest_path, &bytes)
        .await
        .map_err(|e| Error::fetch(url_str, format!("writing {}: {}", dest_path.display(), e)))?;

    info!(bytes = bytes.len(), path = %dest_path.display(), "downloaded");
    Ok(dest_path)
}
