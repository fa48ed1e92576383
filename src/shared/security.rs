use crate::shared::error::ReconcileError;
use crate::shared::Result;
use std::fs;
use std::path::Path;

/// Maximum size of a scan report file (100 MB)
pub const MAX_REPORT_SIZE: u64 = 100 * 1024 * 1024;

/// Checks that `path` names a regular file that is not a symbolic link and
/// is no larger than `max_size`, returning its size.
///
/// `symlink_metadata()` is used so the link itself is inspected, not its target.
pub fn validate_report_file(path: &Path, max_size: u64) -> Result<u64> {
    let metadata = fs::symlink_metadata(path).map_err(|e| ReconcileError::InvalidReportFile {
        path: path.to_path_buf(),
        details: format!("Failed to read file metadata: {}", e),
    })?;

    if metadata.is_symlink() {
        return Err(ReconcileError::SecurityError {
            path: path.to_path_buf(),
            reason: "Report file is a symbolic link".to_string(),
            hint: "Pass the path of the report itself rather than a link to it".to_string(),
        }
        .into());
    }

    if !metadata.is_file() {
        return Err(ReconcileError::InvalidReportFile {
            path: path.to_path_buf(),
            details: "Not a regular file".to_string(),
        }
        .into());
    }

    if metadata.len() > max_size {
        return Err(ReconcileError::SecurityError {
            path: path.to_path_buf(),
            reason: format!(
                "File is too large ({} bytes, maximum is {} bytes)",
                metadata.len(),
                max_size
            ),
            hint: "Split the report into one file per resource".to_string(),
        }
        .into());
    }

    Ok(metadata.len())
}

/// Rejects a database path that is a symbolic link. A path that does not
/// exist yet is accepted; the store creates it.
pub fn validate_database_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_symlink() => Err(ReconcileError::SecurityError {
            path: path.to_path_buf(),
            reason: "Database path is a symbolic link".to_string(),
            hint: "Point --database at the database file directly".to_string(),
        }
        .into()),
        Ok(metadata) if metadata.is_dir() => Err(ReconcileError::validation(format!(
            "database path {} is a directory",
            path.display()
        ))
        .into()),
        _ => Ok(()),
    }
}
