use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use log::{debug, info};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::install::UpdateProgress;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} failed with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the failure came from the network side rather than local disk.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Status { .. })
    }
}

/// Integer download percentage, rounded half up and capped at 100.
#[must_use]
pub fn percent(downloaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let scaled = (u128::from(downloaded) * 100 + u128::from(total) / 2) / u128::from(total);
    Some(u8::try_from(scaled.min(100)).unwrap_or(100))
}

/// Stream `url` into `dest`, creating the parent directory if needed.
///
/// Progress is reported as a percentage whenever the server announces the
/// body length; each value is sent once. Cancellation is honoured between
/// chunks. On failure whatever was written stays on disk for the caller to
/// discard.
///
/// # Errors
/// Returns an error on request failure, a non-success status, a broken body
/// stream, a local write failure, or cancellation.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &mpsc::Sender<UpdateProgress>,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| DownloadError::io("failed to create download directory", parent, error))?;
    }

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DownloadError::Cancelled),
        response = client.get(url).send() => {
            response.map_err(|error| DownloadError::http("download request failed", error))?
        }
    };

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let total = response.content_length().filter(|&length| length > 0);
    match total {
        Some(total) => debug!("Downloading {total} bytes from {url}"),
        None => debug!("Downloading {url} (size unknown)"),
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|error| DownloadError::io("failed to create download file", dest, error))?;

    let mut downloaded: u64 = 0;
    let mut last_percent = None;
    let mut stream = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Download of {url} cancelled after {downloaded} bytes");
                return Err(DownloadError::Cancelled);
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };
        let chunk = chunk.map_err(|error| DownloadError::http("download stream error", error))?;
        file.write_all(&chunk)
            .await
            .map_err(|error| DownloadError::io("failed to write download data", dest, error))?;
        downloaded += chunk.len() as u64;

        if let Some(value) = total.and_then(|total| percent(downloaded, total))
            && last_percent != Some(value)
        {
            last_percent = Some(value);
            let _ = progress.send(UpdateProgress::Downloading { percent: value }).await;
        }
    }

    file.flush()
        .await
        .map_err(|error| DownloadError::io("failed to flush download file", dest, error))?;

    info!("Download complete: {downloaded} bytes");
    Ok(downloaded)
}
