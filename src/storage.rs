use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::ApiError;

lazy_static! {
    // Characters a client-supplied workbook name may contain. Everything else
    // is rejected outright (lookups) or replaced (uploads) before any
    // filesystem use, independent of the extension check.
    static ref FILENAME_OK: Regex = Regex::new(r"^[A-Za-z0-9._\- ()%]+$").unwrap();
    static ref FILENAME_BAD_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._\- ()%]+").unwrap();
}

/// Metadata for one stored workbook
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

/// Whether a filename carries the `.xlsx` extension (case-insensitive)
pub fn is_xlsx(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("xlsx"))
}

/// Validate a client-supplied workbook name before any filesystem use
///
/// The name must be a bare base name (any path component is treated as a
/// traversal attempt), must match the character allow-list, and must end in
/// `.xlsx`.
///
/// # Arguments
/// * `name` - The filename as received from the client
///
/// # Returns
/// * `Result<(), ApiError>` - `Ok` if safe to use, else a 400-class error
pub fn validate_name(name: &str) -> Result<(), ApiError> {
    let base = Path::new(name).file_name().and_then(|base| base.to_str());
    if base != Some(name) || !FILENAME_OK.is_match(name) {
        return Err(ApiError::BadRequest("Bad filename".to_string()));
    }
    if !is_xlsx(name) {
        return Err(ApiError::BadRequest("Only .xlsx allowed".to_string()));
    }
    Ok(())
}

/// Reduce an uploaded filename to a safe base name
///
/// Path components are stripped and every run of disallowed characters is
/// collapsed to a single underscore.
pub fn sanitize_upload_name(original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|base| base.to_str())
        .unwrap_or("upload.xlsx");
    FILENAME_BAD_CHARS.replace_all(base, "_").into_owned()
}

/// Build the collision-avoiding stored name for an upload
///
/// A UTC timestamp prefix keeps repeated uploads of the same workbook from
/// overwriting each other.
pub fn stored_name(original: &str) -> String {
    format!(
        "{}-{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        sanitize_upload_name(original)
    )
}

/// List stored `.xlsx` workbooks, most recently modified first
///
/// Entries whose metadata cannot be read are skipped rather than failing the
/// whole listing.
pub fn list_workbooks(dir: &Path) -> Result<Vec<StoredFile>, ApiError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if !is_xlsx(&name) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        let mtime = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        files.push(StoredFile {
            name,
            size: metadata.len(),
            mtime,
        });
    }

    files.sort_by(|a, b| b.mtime.cmp(&a.mtime));
    Ok(files)
}

/// Read a stored workbook's full bytes
pub fn read_workbook(dir: &Path, name: &str) -> Result<Vec<u8>, ApiError> {
    validate_name(name)?;
    let path = dir.join(name);
    if !path.exists() {
        return Err(ApiError::NotFound);
    }
    Ok(fs::read(path)?)
}

/// Persist an uploaded workbook under an already-sanitized name
pub fn save_workbook(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), ApiError> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(name), bytes)?;
    Ok(())
}

/// Remove a stored workbook
pub fn delete_workbook(dir: &Path, name: &str) -> Result<(), ApiError> {
    validate_name(name)?;
    let path = dir.join(name);
    if !path.exists() {
        return Err(ApiError::NotFound);
    }
    fs::remove_file(path)?;
    Ok(())
}
