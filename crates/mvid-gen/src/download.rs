//! Streaming download of generated assets.

use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{GenError, GenResult};

/// Stream `url` into `dest`, creating parent directories as needed.
pub async fn download_asset(client: &Client, url: &str, dest: &Path) -> GenResult<()> {
    if let Some(parent) = dest.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| GenError::download(format!("request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(GenError::download(format!(
            "asset server returned {} for {url}",
            response.status()
        )));
    }

    let mut file = fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GenError::download(format!("stream error: {e}")))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written == 0 {
        return Err(GenError::download(format!("empty response body for {url}")));
    }

    info!(
        dest = %dest.display(),
        size_kb = written / 1024,
        "Downloaded asset"
    );
    Ok(())
}
