use std::fs;
use std::path::Path;
use tracing::debug;

use crate::application::dto::ScanReport;
use crate::ports::outbound::ReportReader;
use crate::shared::error::ReconcileError;
use crate::shared::security::{validate_report_file, MAX_REPORT_SIZE};
use crate::shared::Result;

/// FileSystemReportReader adapter for JSON scan reports on disk
///
/// Files are checked before they are opened: symbolic links, non-regular
/// files and files above the size limit are rejected.
pub struct FileSystemReportReader {
    max_size: u64,
}

impl FileSystemReportReader {
    pub fn new() -> Self {
        Self {
            max_size: MAX_REPORT_SIZE,
        }
    }

    pub fn with_max_size(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl Default for FileSystemReportReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportReader for FileSystemReportReader {
    fn read_report(&self, path: &Path) -> Result<ScanReport> {
        let size = validate_report_file(path, self.max_size)?;
        let content = fs::read_to_string(path).map_err(|e| ReconcileError::InvalidReportFile {
            path: path.to_path_buf(),
            details: format!("Failed to read file: {}", e),
        })?;
        let report: ScanReport =
            serde_json::from_str(&content).map_err(|e| ReconcileError::InvalidReportFile {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        debug!(
            path = %path.display(),
            bytes = size,
            kind = %report.kind,
            resources = report.resources.len(),
            "read scan report"
        );
        Ok(report)
    }
}
