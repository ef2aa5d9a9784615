//! Downloads source files over HTTP.

use std::{io::Write, path::Path};

use anyhow::{anyhow, Context, Error, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::cli::create_spinner;

/// Streams `url` into `destination` with a progress bar.
///
/// The body is written to a temporary file next to `destination` and moved
/// into place once complete, so an interrupted download never leaves a
/// truncated file behind.
pub async fn download_file(url: &str, destination: &Path) -> Result<(), Error> {
    let dir = destination
        .parent()
        .ok_or_else(|| anyhow!("{:?} has no parent directory", destination))?;
    std::fs::create_dir_all(dir)?;

    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());
    let progress_bar = create_spinner(format!("Downloading {name}"));

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::msg(format!("Failed to download {url}: {e}")))?;
    if !response.status().is_success() {
        progress_bar.abandon_with_message(format!("Failed to download {name}"));
        return Err(Error::msg(format!(
            "Failed to download {url}: {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        to_byte_bar(&progress_bar, total_size);
    }
    debug!(url, bytes = total_size, "download started");

    let mut file = NamedTempFile::new_in(dir)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {e}")))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }

    file.persist(destination)
        .with_context(|| format!("Failed to save download to {:?}", destination))?;
    progress_bar.finish_with_message(format!("Downloaded {name}"));
    info!(url, path = %destination.display(), bytes = downloaded, "download finished");

    Ok(())
}

/// Switches a spinner to a byte-count bar once the content length is known.
fn to_byte_bar(progress_bar: &ProgressBar, total_size: u64) {
    progress_bar.set_length(total_size);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
}

/// Downloads `url` unless `destination` already exists. Returns whether a
/// download happened.
pub async fn download_if_absent(url: &str, destination: &Path) -> Result<bool> {
    if destination.is_file() {
        debug!(path = %destination.display(), "already downloaded");
        return Ok(false);
    }
    download_file(url, destination).await?;

    Ok(true)
}

// -- Tests -------------------------------------------------------------------
