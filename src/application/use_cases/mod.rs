/// Use cases module containing application business logic orchestration
mod ingest_reports;
mod manage_applications;
mod reconcile_scan;

pub use ingest_reports::IngestReportsUseCase;
pub use manage_applications::ManageApplicationsUseCase;
pub use reconcile_scan::{ReconcileScanUseCase, TreeBuilder};
