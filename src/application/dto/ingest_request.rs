use std::path::PathBuf;

use crate::reconciliation::domain::ApplicationInfo;

/// IngestRequest - batch of report files for one application
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Application the reports belong to; created if it does not exist yet
    pub application: ApplicationInfo,
    /// Report files, reconciled in the given order
    pub report_paths: Vec<PathBuf>,
}

impl IngestRequest {
    pub fn new(application: ApplicationInfo, report_paths: Vec<PathBuf>) -> Self {
        Self {
            application,
            report_paths,
        }
    }
}

/// IngestResponse - outcome of a batch ingestion
#[derive(Debug, Clone, Default)]
pub struct IngestResponse {
    pub reports_committed: usize,
    pub resources: usize,
    pub packages: usize,
    pub vulnerabilities: usize,
}
