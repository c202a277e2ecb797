//! Result artifact download
//!
//! Streams the archive behind a terminal task's `resourceLocation` to local disk
//! as `{task_id}.7z` and applies the minimum-size integrity heuristic: anything
//! under the floor is treated as a corrupt or truncated download, never as a
//! legitimately empty result.

use crate::error::{Error, Result};
use crate::types::TaskId;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Download the artifact at `url` into `download_dir` as `{task_id}.7z`.
///
/// The URL is a pre-signed absolute location, requested without the bearer token.
/// Returns the local path on success. A final size below `min_bytes` is an
/// [`Error::Integrity`]; the undersized file is kept on disk for inspection.
/// No retries — a failed download is the operator's to re-run.
pub async fn fetch_artifact(
    http: &reqwest::Client,
    url: &str,
    download_dir: &Path,
    task_id: &TaskId,
    min_bytes: u64,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(download_dir).await?;
    let dest = download_dir.join(format!("{task_id}.7z"));
    debug!(%url, dest = ?dest, "downloading artifact");

    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Transport {
            message: format!("artifact download rejected ({status})"),
            status: Some(status.as_u16()),
        });
    }

    let mut file = tokio::fs::File::create(&dest).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written < min_bytes {
        warn!(task_id = %task_id, size = written, min = min_bytes, "download undersized");
        return Err(Error::Integrity {
            path: dest,
            size: written,
            min: min_bytes,
        });
    }

    info!(task_id = %task_id, size = written, dest = ?dest, "artifact downloaded");
    Ok(dest)
}
