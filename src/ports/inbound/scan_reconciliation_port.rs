use async_trait::async_trait;

use crate::application::dto::{CommitSummary, ScanReport};
use crate::reconciliation::domain::{ApplicationId, ResourceId};
use crate::shared::Result;

/// ScanReconciliationPort - Inbound port for committing scan reports
///
/// Each call is one reconciliation+commit cycle: the incoming subtree is
/// merged with what is stored and written in a single transaction. On
/// success the aggregate views are marked stale.
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait ScanReconciliationPort: Send + Sync {
    /// Reconciles every resource of `report` under an existing application.
    ///
    /// With `should_replace_resources` the application's resource list
    /// becomes exactly the reconciled resources; otherwise resources absent
    /// from the report are kept.
    ///
    /// # Errors
    /// - `NotFound` if the application does not exist
    /// - `TransactionFailure` naming the tree level that failed to write;
    ///   nothing is persisted in that case
    async fn reconcile_and_commit_application(
        &self,
        application_id: ApplicationId,
        report: ScanReport,
        should_replace_resources: bool,
    ) -> Result<CommitSummary>;

    /// Reconciles the report entry whose derived ID is `resource_id`,
    /// creating the resource if it is not stored yet.
    ///
    /// # Errors
    /// - `Validation` if no entry of the report resolves to `resource_id`
    /// - `TransactionFailure` as for the application-level cycle
    async fn reconcile_and_commit_resource(
        &self,
        resource_id: ResourceId,
        report: ScanReport,
    ) -> Result<CommitSummary>;

    /// Flags the aggregate views as stale without writing anything.
    fn mark_views_dirty(&self);
}
