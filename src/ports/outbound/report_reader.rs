use crate::application::dto::ScanReport;
use crate::shared::Result;
use std::path::Path;

/// ReportReader port for loading inbound scan reports
pub trait ReportReader {
    /// Reads and parses one scan report
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file does not exist, is a symbolic link or is too large
    /// - The content is not a valid scan report
    fn read_report(&self, path: &Path) -> Result<ScanReport>;
}
