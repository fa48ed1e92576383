mod tree_builder;

pub use tree_builder::TreeBuilder;

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::dto::{CommitSummary, ResourceScan, ScanReport};
use crate::application::view_maintenance::ViewDirtyFlag;
use crate::ports::inbound::ScanReconciliationPort;
use crate::ports::outbound::ScanStore;
use crate::reconciliation::domain::{ApplicationId, Resource, ResourceId, TransactionParams};
use crate::reconciliation::services::{merge_persisted_attribution, TreeReconciler, TreeWriter};
use crate::shared::error::ReconcileError;
use crate::shared::Result;

/// ReconcileScanUseCase - one reconciliation+commit cycle per call
///
/// Every cycle runs on a blocking worker inside a single store transaction:
/// load the stored subtree, build the incoming one, reconcile, fold in
/// persisted attribution, then write bottom-up. A successful commit marks
/// the aggregate views stale.
///
/// # Type Parameters
/// * `S` - ScanStore implementation
pub struct ReconcileScanUseCase<S> {
    store: Arc<S>,
    views: Arc<ViewDirtyFlag>,
}

impl<S> Clone for ReconcileScanUseCase<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            views: Arc::clone(&self.views),
        }
    }
}

impl<S: ScanStore + 'static> ReconcileScanUseCase<S> {
    pub fn new(store: Arc<S>, views: Arc<ViewDirtyFlag>) -> Self {
        Self { store, views }
    }

    /// Blocking form of [`ScanReconciliationPort::reconcile_and_commit_application`].
    pub fn commit_application(
        &self,
        application_id: ApplicationId,
        report: &ScanReport,
        should_replace_resources: bool,
    ) -> Result<CommitSummary> {
        let summary = self.store.in_transaction(|tx| {
            // Step 1: Load the stored tree
            let application = tx.load_application(&application_id)?.ok_or_else(|| {
                ReconcileError::NotFound {
                    entity: "application",
                    id: application_id.to_string(),
                }
            })?;

            // Step 2: Build the incoming subtree and its ledger
            let mut ledger = TransactionParams::new(report.kind, report.source);
            let incoming = TreeBuilder::build(&report.resources, &mut ledger);
            debug!(
                application = %application.name,
                kind = %report.kind,
                resources = incoming.len(),
                "reconciling report"
            );

            // Step 3: Reconcile against storage
            let mut application = TreeReconciler::new(&mut *tx, &mut ledger).reconcile_application(
                application,
                incoming,
                should_replace_resources,
            )?;

            // Step 4: Fold in attribution recorded by earlier commits
            merge_persisted_attribution(&mut *tx, &mut ledger, &mut application.resources)?;

            // Step 5: Write bottom-up
            TreeWriter::new(&mut *tx, &ledger).write_application(&application)?;

            Ok(CommitSummary {
                application_id: Some(application.id),
                ..Self::summarize(&application.resources)
            })
        })?;

        self.views.set_true();
        info!(
            application_id = %application_id,
            resources = summary.resources,
            packages = summary.packages,
            vulnerabilities = summary.vulnerabilities,
            "committed application tree"
        );
        Ok(summary)
    }

    /// Blocking form of [`ScanReconciliationPort::reconcile_and_commit_resource`].
    pub fn commit_resource(&self, resource_id: ResourceId, report: &ScanReport) -> Result<CommitSummary> {
        let scans: Vec<ResourceScan> = report
            .resources
            .iter()
            .filter(|scan| scan.resource_id() == resource_id)
            .cloned()
            .collect();
        if scans.is_empty() {
            return Err(ReconcileError::validation(format!(
                "report has no resource with id {}",
                resource_id
            ))
            .into());
        }

        let summary = self.store.in_transaction(|tx| {
            let mut ledger = TransactionParams::new(report.kind, report.source);
            let incoming = TreeBuilder::build(&scans, &mut ledger)
                .into_iter()
                .next()
                .ok_or_else(|| ReconcileError::validation("empty resource entry"))?;

            let resource = TreeReconciler::new(&mut *tx, &mut ledger).reconcile_resource(incoming)?;
            let mut resources = vec![resource];
            merge_persisted_attribution(&mut *tx, &mut ledger, &mut resources)?;

            let mut writer = TreeWriter::new(&mut *tx, &ledger);
            for resource in &resources {
                writer.write_resource(resource)?;
            }
            Ok(Self::summarize(&resources))
        })?;

        self.views.set_true();
        info!(
            resource_id = %resource_id,
            packages = summary.packages,
            vulnerabilities = summary.vulnerabilities,
            "committed resource tree"
        );
        Ok(summary)
    }

    fn summarize(resources: &[Resource]) -> CommitSummary {
        CommitSummary {
            application_id: None,
            resources: resources.len(),
            packages: resources.iter().map(|r| r.packages.len()).sum(),
            vulnerabilities: resources
                .iter()
                .flat_map(|r| &r.packages)
                .map(|p| p.vulnerabilities.len())
                .sum(),
        }
    }
}

#[async_trait]
impl<S: ScanStore + 'static> ScanReconciliationPort for ReconcileScanUseCase<S> {
    async fn reconcile_and_commit_application(
        &self,
        application_id: ApplicationId,
        report: ScanReport,
        should_replace_resources: bool,
    ) -> Result<CommitSummary> {
        let use_case = self.clone();
        tokio::task::spawn_blocking(move || {
            use_case.commit_application(application_id, &report, should_replace_resources)
        })
        .await
        .context("reconciliation worker panicked")?
    }

    async fn reconcile_and_commit_resource(
        &self,
        resource_id: ResourceId,
        report: ScanReport,
    ) -> Result<CommitSummary> {
        let use_case = self.clone();
        tokio::task::spawn_blocking(move || use_case.commit_resource(resource_id, &report))
            .await
            .context("reconciliation worker panicked")?
    }

    fn mark_views_dirty(&self) {
        self.views.set_true();
    }
}

#[cfg(test)]
mod tests;
