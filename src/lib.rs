//! scan-tree - reconcile scan reports into a persistent application tree
//!
//! This library merges vulnerability-scan and content-analysis reports into a
//! stored Application → Resource → Package → Vulnerability tree, keeps track
//! of which tools reported what, and maintains aggregate views over the tree.
//! It follows hexagonal architecture and Domain-Driven Design principles.
//!
//! # Architecture
//!
//! The library is organized into the following layers:
//!
//! - **Domain Layer** (`reconciliation`): Tree entities, identity, attribution and the reconciliation engine
//! - **Application Layer** (`application`): Use cases, DTOs, read models and view maintenance
//! - **Ports** (`ports`): Interface definitions for infrastructure
//! - **Adapters** (`adapters`): Concrete implementations of ports
//! - **Shared** (`shared`): Common utilities and error types
//!
//! # Example
//!
//! ```no_run
//! use scan_tree::prelude::*;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<()> {
//! // Create adapters
//! let store = Arc::new(SqliteScanStore::open("scan-tree.db", Duration::from_secs(5))?);
//! let views = Arc::new(ViewDirtyFlag::new());
//!
//! // Create use case
//! let use_case = IngestReportsUseCase::new(
//!     FileSystemReportReader::new(),
//!     StderrProgressReporter::new(),
//!     ReconcileScanUseCase::new(Arc::clone(&store), Arc::clone(&views)),
//!     ManageApplicationsUseCase::new(Arc::clone(&store), Arc::clone(&views)),
//! );
//!
//! // Execute
//! let request = IngestRequest::new(
//!     ApplicationInfo::new("shop", ApplicationType::Image),
//!     vec![PathBuf::from("vulns.json"), PathBuf::from("content.json")],
//! );
//! use_case.execute(request).await?;
//!
//! // Bring the aggregate views up to date
//! ViewRefreshScheduler::new(Arc::clone(&store), views)
//!     .refresh_if_dirty()
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&store.application_views()?)?);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod ports;
pub mod reconciliation;
pub mod shared;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::outbound::console::StderrProgressReporter;
    pub use crate::adapters::outbound::filesystem::FileSystemReportReader;
    pub use crate::adapters::outbound::sqlite::SqliteScanStore;
    pub use crate::application::dto::{
        CommitSummary, IngestRequest, IngestResponse, ResourceScan, ScanReport,
    };
    pub use crate::application::read_models::{
        ApplicationViewRow, DashboardSummary, PackageViewRow, ResourceViewRow,
        VulnerabilityViewRow,
    };
    pub use crate::application::use_cases::{
        IngestReportsUseCase, ManageApplicationsUseCase, ReconcileScanUseCase,
    };
    pub use crate::application::view_maintenance::{ViewDirtyFlag, ViewRefreshScheduler};
    pub use crate::ports::inbound::ScanReconciliationPort;
    pub use crate::ports::outbound::{
        MaterializedView, ProgressReporter, ReportReader, ScanStore,
    };
    pub use crate::reconciliation::domain::{
        Application, ApplicationId, ApplicationInfo, ApplicationType, PackageId, ReportKind,
        ResourceId, ResourceType, Severity, VulnerabilityId,
    };
    pub use crate::shared::error::ReconcileError;
    pub use crate::shared::Result;
}
