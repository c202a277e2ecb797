//! Archive unpacking
//!
//! Two independent stages, both required for a `Success` outcome:
//!
//! 1. The downloaded container is extracted with the external 7-Zip binary
//!    (`7z x <archive> -p<password> -o<dir> -y`) into a directory keyed by task id.
//! 2. The stage-1 output is scanned for a conventionally named nested archive
//!    (default `assessment.zip`, matched case-insensitively). When present it is
//!    opened without a password and its contents land in a folder named after the
//!    first three underscore-delimited tokens of its first entry — a naming
//!    convention imposed by the platform's packaging, not chosen here.
//!
//! A missing nested archive is a no-op, not a failure.

use crate::error::{Error, ExtractError, Result};
use crate::types::TaskId;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Handle to the external 7-Zip binary
#[derive(Clone, Debug)]
pub struct SevenZipTool {
    path: PathBuf,
}

impl SevenZipTool {
    /// Resolve the tool from an explicit configured path, or from PATH.
    pub fn resolve(configured: Option<&Path>) -> Result<Self> {
        match configured {
            Some(path) => {
                if path.exists() {
                    Ok(Self {
                        path: path.to_path_buf(),
                    })
                } else {
                    Err(Error::ToolMissing(path.display().to_string()))
                }
            }
            None => which::which("7z")
                .map(|path| Self { path })
                .map_err(|_| Error::ToolMissing("7z".to_string())),
        }
    }

    /// Path of the resolved binary
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract `archive` into `dest`, creating it first.
    ///
    /// The password flag is always passed; an absent password becomes `-p` with an
    /// empty value, which 7z treats as "no password". A non-zero exit status is a
    /// hard failure for the task, never retried.
    pub async fn extract(
        &self,
        archive: &Path,
        password: Option<&str>,
        dest: &Path,
    ) -> Result<()> {
        tokio::fs::create_dir_all(dest).await?;
        debug!(?archive, ?dest, "running 7z extraction");

        let output = tokio::process::Command::new(&self.path)
            .arg("x")
            .arg(archive)
            .arg(format!("-p{}", password.unwrap_or("")))
            .arg(format!("-o{}", dest.display()))
            .arg("-y")
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::ToolMissing(self.path.display().to_string())
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ExtractError::SevenZipFailed {
                archive: archive.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        info!(?archive, ?dest, "7z extraction successful");
        Ok(())
    }
}

/// Outputs of a full two-stage unpack for one task
#[derive(Clone, Debug, Default)]
pub struct UnpackReport {
    /// Top-level entry names produced by the primary extraction
    pub extracted_entries: Vec<String>,
    /// Derived folder names produced by the nested-archive pass
    pub nested_folders: Vec<String>,
}

/// Folder name for a nested archive, from the name of its first entry.
///
/// Takes the first path component and joins its first three underscore-delimited
/// tokens: `ACME_HOST_2024_report.json` → `ACME_HOST_2024`. Fragile coupling to
/// the platform's packaging format, kept pure so the convention can be swapped.
pub fn derive_collection_name(first_entry: &str) -> String {
    let top = first_entry.split('/').next().unwrap_or(first_entry);
    top.split('_').take(3).collect::<Vec<_>>().join("_")
}

/// Run both unpack stages for a downloaded task artifact.
///
/// Stage 1 extracts into `{extract_base}/{task_id}`; a run that produces no
/// entries is a failure (nothing to report or hand off). Stage 2 is the nested
/// conventional pass into `nested_base` and cannot fail the task outcome short of
/// an I/O error on the primary output directory.
pub async fn unpack_artifact(
    tool: &SevenZipTool,
    archive: &Path,
    task_id: &TaskId,
    password: Option<&str>,
    extract_base: &Path,
    nested_base: &Path,
    nested_archive_name: &str,
) -> Result<UnpackReport> {
    let task_dir = extract_base.join(task_id.as_str());
    tool.extract(archive, password, &task_dir).await?;

    let mut extracted_entries = Vec::new();
    for entry in std::fs::read_dir(&task_dir)? {
        extracted_entries.push(entry?.file_name().to_string_lossy().into_owned());
    }
    extracted_entries.sort();
    if extracted_entries.is_empty() {
        return Err(ExtractError::EmptyArchive {
            archive: archive.to_path_buf(),
        }
        .into());
    }

    let nested_folders = unpack_nested(&task_dir, nested_archive_name, nested_base)?;
    Ok(UnpackReport {
        extracted_entries,
        nested_folders,
    })
}

/// Stage 2: extract every conventional nested archive found in `task_dir`.
///
/// Returns the derived destination folder names, in directory-scan order. An
/// empty nested archive is logged and skipped; a directory with no conventional
/// entry yields an empty list.
pub fn unpack_nested(
    task_dir: &Path,
    nested_archive_name: &str,
    nested_base: &Path,
) -> Result<Vec<String>> {
    let mut derived_names = Vec::new();

    for entry in std::fs::read_dir(task_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.eq_ignore_ascii_case(nested_archive_name) || !entry.path().is_file() {
            continue;
        }

        let zip_path = entry.path();
        let file = std::fs::File::open(&zip_path)?;
        let mut archive =
            zip::ZipArchive::new(file).map_err(|e| ExtractError::BadNestedArchive {
                archive: zip_path.clone(),
                reason: e.to_string(),
            })?;

        if archive.is_empty() {
            warn!(archive = ?zip_path, "nested archive has no entries, skipping");
            continue;
        }

        let first_entry = archive
            .by_index(0)
            .map_err(|e| ExtractError::BadNestedArchive {
                archive: zip_path.clone(),
                reason: e.to_string(),
            })?
            .name()
            .to_string();
        let derived = derive_collection_name(&first_entry);

        let dest = nested_base.join(&derived);
        if dest.exists() {
            // Known upstream ambiguity: two tasks sharing a three-token prefix
            // overwrite each other. Logged, not deduped.
            warn!(folder = %derived, "nested destination already exists, overwriting");
        }
        std::fs::create_dir_all(&dest)?;
        archive
            .extract(&dest)
            .map_err(|e| ExtractError::BadNestedArchive {
                archive: zip_path.clone(),
                reason: e.to_string(),
            })?;

        info!(archive = ?zip_path, dest = ?dest, "nested archive extracted");
        derived_names.push(derived);
    }

    Ok(derived_names)
}
