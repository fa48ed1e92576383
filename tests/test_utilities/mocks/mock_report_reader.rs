use scan_tree::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Mock ReportReader serving reports from memory
#[derive(Default)]
pub struct MockReportReader {
    reports: HashMap<PathBuf, ScanReport>,
    should_fail: bool,
}

impl MockReportReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(mut self, path: impl Into<PathBuf>, report: ScanReport) -> Self {
        self.reports.insert(path.into(), report);
        self
    }

    /// Every read fails as if the file were not a scan report
    pub fn with_failure() -> Self {
        Self {
            reports: HashMap::new(),
            should_fail: true,
        }
    }
}

impl ReportReader for MockReportReader {
    fn read_report(&self, path: &Path) -> Result<ScanReport> {
        if self.should_fail {
            return Err(ReconcileError::InvalidReportFile {
                path: path.to_path_buf(),
                details: "mock failure".to_string(),
            }
            .into());
        }
        self.reports.get(path).cloned().ok_or_else(|| {
            ReconcileError::InvalidReportFile {
                path: path.to_path_buf(),
                details: "no such report".to_string(),
            }
            .into()
        })
    }
}
