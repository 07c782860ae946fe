use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt as _;
use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};

pub const USER_AGENT: &str = concat!("freeserver/", env!("CARGO_PKG_VERSION"));

/// GET `url` and return the body as text. Anything other than `200 OK` is an error.
pub async fn fetch_text(client: &Client, url: &str, timeout: Duration) -> Result<String> {
    let resp = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .header("Cache-Control", "no-cache")
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AppError::network_with_url(url, e.to_string()))?;

    if resp.status() != StatusCode::OK {
        return Err(AppError::network_with_url(url, resp.status().to_string()));
    }

    resp.text()
        .await
        .map_err(|e| AppError::network_with_url(url, e.to_string()))
}

/// HEAD `url` and succeed only if the remote reports `200 OK`.
pub async fn probe(client: &Client, url: &str, timeout: Duration) -> Result<()> {
    let resp = client
        .head(url)
        .header("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AppError::network_with_url(url, e.to_string()))?;

    if resp.status() != StatusCode::OK {
        return Err(AppError::network_with_url(url, resp.status().to_string()));
    }

    Ok(())
}

/// Stream `url` into `dest`, creating parent directories as needed.
pub async fn download_file(client: &Client, url: &str, dest: &Path, timeout: Duration) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::io(e.to_string()))?;
    }

    let resp = client
        .get(url)
        .header("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AppError::network_with_url(url, e.to_string()))?;

    if resp.status() != StatusCode::OK {
        return Err(AppError::network_with_url(url, resp.status().to_string()));
    }

    let mut file = fs::File::create(dest).map_err(|e| AppError::io(e.to_string()))?;

    let mut stream = resp.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::network_with_url(url, e.to_string()))?;
        file.write_all(&chunk)
            .map_err(|e| AppError::io(e.to_string()))?;
    }

    file.flush().map_err(|e| AppError::io(e.to_string()))?;

    Ok(())
}
