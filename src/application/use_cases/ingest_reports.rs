use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::application::dto::{CommitSummary, IngestRequest, IngestResponse, ResourceScan, ScanReport};
use crate::application::use_cases::ManageApplicationsUseCase;
use crate::ports::inbound::ScanReconciliationPort;
use crate::ports::outbound::{ProgressReporter, ReportReader, ScanStore};
use crate::reconciliation::domain::ResourceId;
use crate::shared::Result;

/// Resource-scoped commits allowed in flight at once
const MAX_CONCURRENT_RESOURCE_COMMITS: usize = 4;

/// IngestReportsUseCase - reads scan report files and commits them
///
/// # Type Parameters
/// * `RR` - ReportReader implementation
/// * `PR` - ProgressReporter implementation
/// * `P` - ScanReconciliationPort implementation
/// * `S` - ScanStore behind the application catalog
pub struct IngestReportsUseCase<RR, PR, P, S> {
    report_reader: RR,
    progress_reporter: PR,
    reconciler: P,
    catalog: ManageApplicationsUseCase<S>,
}

impl<RR, PR, P, S> IngestReportsUseCase<RR, PR, P, S>
where
    RR: ReportReader,
    PR: ProgressReporter,
    P: ScanReconciliationPort,
    S: ScanStore,
{
    pub fn new(
        report_reader: RR,
        progress_reporter: PR,
        reconciler: P,
        catalog: ManageApplicationsUseCase<S>,
    ) -> Self {
        Self {
            report_reader,
            progress_reporter,
            reconciler,
            catalog,
        }
    }

    /// Commits a batch of reports under one application.
    ///
    /// All files are read and parsed before anything is written. Reports
    /// are then reconciled one at a time in the given order, each in its
    /// own transaction; a failure stops the batch and leaves earlier
    /// reports committed.
    pub async fn execute(&self, request: IngestRequest) -> Result<IngestResponse> {
        // Step 1: Read every report up front
        let reports = self.read_reports(&request.report_paths)?;

        // Step 2: Register the application
        let application = self.catalog.get_or_create_application(request.application)?;
        self.progress_reporter.report(&format!(
            "📦 Application: {} ({})",
            application.name, application.id
        ));

        // Step 3: Reconcile reports in order
        let total = reports.len();
        let mut response = IngestResponse::default();
        for (i, (path, report)) in reports.into_iter().enumerate() {
            let should_replace = report.kind.replaces_application_resources();
            match self
                .reconciler
                .reconcile_and_commit_application(application.id, report, should_replace)
                .await
            {
                Ok(summary) => {
                    accumulate(&mut response, &summary);
                    self.progress_reporter.report_progress(
                        i + 1,
                        total,
                        Some(&path.display().to_string()),
                    );
                }
                Err(e) => {
                    self.progress_reporter.report_error(&format!(
                        "❌ Failed to commit {}: {}",
                        path.display(),
                        e
                    ));
                    return Err(e);
                }
            }
        }

        // Step 4: Report completion
        self.progress_reporter.report_completion(&format!(
            "✅ Committed {} report(s): {} resource(s), {} package(s), {} vulnerability(ies)",
            response.reports_committed, response.resources, response.packages, response.vulnerabilities
        ));
        Ok(response)
    }

    /// Commits every resource of the given reports on its own, without an
    /// owning application.
    ///
    /// Entries are grouped by resource across all reports. Each resource's
    /// entries are committed one report at a time in file order; up to
    /// `MAX_CONCURRENT_RESOURCE_COMMITS` different resources are reconciled
    /// at once. Entries of one report that resolve to the same resource are
    /// committed together.
    pub async fn execute_per_resource(&self, report_paths: &[PathBuf]) -> Result<IngestResponse> {
        let reports = self.read_reports(report_paths)?;
        let groups = group_by_resource(&reports);

        let total = groups.len();
        let mut commits = stream::iter(groups)
            .map(|(resource_id, reports)| async move {
                let result = self.commit_in_order(resource_id, reports).await;
                (resource_id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_RESOURCE_COMMITS);

        let mut response = IngestResponse::default();
        let mut done = 0;
        while let Some((resource_id, result)) = commits.next().await {
            match result {
                Ok(summary) => {
                    done += 1;
                    response.resources += summary.resources;
                    response.packages += summary.packages;
                    response.vulnerabilities += summary.vulnerabilities;
                    self.progress_reporter
                        .report_progress(done, total, Some(&resource_id.to_string()));
                }
                Err(e) => {
                    self.progress_reporter.report_error(&format!(
                        "❌ Failed to commit resource {}: {}",
                        resource_id, e
                    ));
                    return Err(e);
                }
            }
        }
        response.reports_committed = reports.len();

        self.progress_reporter.report_completion(&format!(
            "✅ Committed {} resource(s): {} package(s), {} vulnerability(ies)",
            response.resources, response.packages, response.vulnerabilities
        ));
        Ok(response)
    }

    /// Commits one resource's entries sequentially and returns the summary
    /// of the last commit, which describes the resource as stored.
    async fn commit_in_order(
        &self,
        resource_id: ResourceId,
        reports: Vec<ScanReport>,
    ) -> Result<CommitSummary> {
        let mut last = CommitSummary::default();
        for report in reports {
            last = self
                .reconciler
                .reconcile_and_commit_resource(resource_id, report)
                .await?;
        }
        Ok(last)
    }

    fn read_reports(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, ScanReport)>> {
        self.progress_reporter
            .report(&format!("📖 Reading {} scan report(s)...", paths.len()));
        paths
            .iter()
            .map(|path| Ok((path.clone(), self.read_one(path)?)))
            .collect()
    }

    fn read_one(&self, path: &Path) -> Result<ScanReport> {
        let report = self.report_reader.read_report(path)?;
        self.progress_reporter.report(&format!(
            "   - {}: {} with {} resource(s)",
            path.display(),
            report.kind,
            report.resources.len()
        ));
        Ok(report)
    }
}

/// Splits reports into per-resource entries, keeping file order within
/// each resource.
fn group_by_resource(reports: &[(PathBuf, ScanReport)]) -> BTreeMap<ResourceId, Vec<ScanReport>> {
    let mut groups: BTreeMap<ResourceId, Vec<ScanReport>> = BTreeMap::new();
    for (_, report) in reports {
        let mut by_resource: BTreeMap<ResourceId, Vec<ResourceScan>> = BTreeMap::new();
        for scan in &report.resources {
            by_resource.entry(scan.resource_id()).or_default().push(scan.clone());
        }
        for (resource_id, scans) in by_resource {
            groups.entry(resource_id).or_default().push(ScanReport {
                kind: report.kind,
                source: report.source,
                resources: scans,
            });
        }
    }
    groups
}

fn accumulate(response: &mut IngestResponse, summary: &CommitSummary) {
    response.reports_committed += 1;
    response.resources += summary.resources;
    response.packages += summary.packages;
    response.vulnerabilities += summary.vulnerabilities;
}
