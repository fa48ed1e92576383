use std::collections::HashMap;

use crate::application::dto::{PackageScan, ResourceScan, VulnerabilityScan};
use crate::reconciliation::domain::{
    CisDockerBenchmarkCheck, CisLevel, Cvss, Package, Resource, ResourceId, TransactionParams,
    Vulnerability,
};

/// Builds the incoming subtree of a report with deterministic IDs and
/// records what the report says about each edge in the ledger.
///
/// Entries that resolve to the same ID are grouped: packages within a
/// resource, vulnerabilities within a package, resources within a report.
pub struct TreeBuilder;

impl TreeBuilder {
    pub fn build(scans: &[ResourceScan], ledger: &mut TransactionParams) -> Vec<Resource> {
        let mut resources: Vec<Resource> = Vec::with_capacity(scans.len());
        let mut index: HashMap<ResourceId, usize> = HashMap::new();

        for scan in scans {
            let resource = Self::build_resource(scan, ledger);
            match index.get(&resource.id).copied() {
                Some(i) => Self::absorb_resource(&mut resources[i], resource),
                None => {
                    index.insert(resource.id, resources.len());
                    resources.push(resource);
                }
            }
        }
        resources
    }

    fn build_resource(scan: &ResourceScan, ledger: &mut TransactionParams) -> Resource {
        let mut resource = Resource::new(
            scan.resource.hash.clone(),
            scan.resource.name.clone(),
            scan.resource.resource_type,
        );

        for package_scan in &scan.packages {
            let package = Self::build_package(&resource.id, package_scan, ledger);
            Self::add_package(&mut resource, package);
        }

        for check in &scan.cis_docker_benchmark_checks {
            if check.level == CisLevel::Ignore {
                continue;
            }
            let check = CisDockerBenchmarkCheck::new(check.code.clone(), check.level, check.descriptions.clone());
            if !resource
                .cis_docker_benchmark_checks
                .iter()
                .any(|c| c.id == check.id)
            {
                resource.cis_docker_benchmark_checks.push(check);
            }
        }
        resource
    }

    fn build_package(
        resource_id: &ResourceId,
        scan: &PackageScan,
        ledger: &mut TransactionParams,
    ) -> Package {
        let mut package = Package::new(scan.package.name.clone(), scan.package.version.clone())
            .with_license(scan.package.license.clone())
            .with_language(scan.package.language.clone());

        if !scan.analyzers.is_empty() {
            ledger.record_analyzers(resource_id, &package.id, scan.analyzers.iter().cloned());
        }

        for finding in &scan.vulnerabilities {
            let vulnerability = Self::build_vulnerability(finding, ledger);
            ledger.record_fix_version(&package.id, &vulnerability.id, &finding.fix_version);
            ledger.record_scanners(resource_id, &package.id, finding.scanners.iter().cloned());
            package.attach_vulnerability(vulnerability);
        }
        package
    }

    fn build_vulnerability(finding: &VulnerabilityScan, ledger: &TransactionParams) -> Vulnerability {
        let mut vulnerability = Vulnerability::new(finding.name.clone(), finding.severity);
        vulnerability.cvss = finding
            .cvss
            .as_ref()
            .map(|cvss| Cvss::new(cvss.vector.clone(), cvss.base_score));
        vulnerability.description = finding.description.clone();
        vulnerability.links = finding.links.iter().cloned().collect();
        vulnerability.reporting_scanners = finding.scanners.iter().cloned().collect();
        vulnerability.source = ledger.source();
        vulnerability.scanned_at = ledger.scanned_at();
        vulnerability
    }

    fn add_package(resource: &mut Resource, package: Package) {
        match resource.packages.iter_mut().find(|p| p.id == package.id) {
            Some(existing) => {
                if existing.license.is_empty() {
                    existing.license = package.license;
                }
                if existing.language.is_empty() {
                    existing.language = package.language;
                }
                for vulnerability in package.vulnerabilities {
                    existing.attach_vulnerability(vulnerability);
                }
            }
            None => resource.packages.push(package),
        }
    }

    fn absorb_resource(target: &mut Resource, other: Resource) {
        for package in other.packages {
            Self::add_package(target, package);
        }
        for check in other.cis_docker_benchmark_checks {
            if !target
                .cis_docker_benchmark_checks
                .iter()
                .any(|c| c.id == check.id)
            {
                target.cis_docker_benchmark_checks.push(check);
            }
        }
    }
}
