/// Data Transfer Objects for application layer
///
/// DTOs carry inbound scan reports and batch requests between adapters
/// and use cases, keeping the domain layer free of wire concerns.
mod commit_summary;
mod ingest_request;
mod scan_report;

pub use commit_summary::CommitSummary;
pub use ingest_request::{IngestRequest, IngestResponse};
pub use scan_report::{
    CisCheckScan, CvssScan, PackageInfo, PackageScan, ResourceInfo, ResourceScan, ScanReport,
    VulnerabilityScan,
};
