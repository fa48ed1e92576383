//! Tree Reconciliation Engine.
//!
//! Merges an incoming partial subtree into the current one level by level
//! (application → resource → package → vulnerability). Merge decisions are
//! total; only subtree loads can fail.

use std::collections::HashMap;
use tracing::debug;

use crate::ports::outbound::SubtreeLoader;
use crate::reconciliation::domain::{
    Application, Package, PackageId, Resource, ResourceId, TransactionParams, Vulnerability,
    VulnerabilityId,
};
use crate::shared::Result;

/// Reconciles incoming resources against the current tree, loading
/// subtrees that are new to their parent from storage and recording edge
/// attribution in the ledger.
pub struct TreeReconciler<'a, L: SubtreeLoader + ?Sized> {
    loader: &'a mut L,
    ledger: &'a mut TransactionParams,
}

impl<'a, L: SubtreeLoader + ?Sized> TreeReconciler<'a, L> {
    pub fn new(loader: &'a mut L, ledger: &'a mut TransactionParams) -> Self {
        Self { loader, ledger }
    }

    /// Produces the application tree to commit.
    ///
    /// With `should_replace_resources` the merged resources become the
    /// application's only resources; otherwise they update matching entries
    /// in place and new ones are appended.
    pub fn reconcile_application(
        &mut self,
        mut application: Application,
        incoming: Vec<Resource>,
        should_replace_resources: bool,
    ) -> Result<Application> {
        let current = std::mem::take(&mut application.resources);
        let current_ids: Vec<ResourceId> = current.iter().map(|r| r.id).collect();
        let index: HashMap<ResourceId, usize> = current_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        let mut slots: Vec<Option<Resource>> = current.into_iter().map(Some).collect();

        let mut merged = Vec::with_capacity(incoming.len());
        for resource in incoming {
            let existing = index.get(&resource.id).and_then(|&i| slots[i].take());
            let resolved = match existing {
                Some(existing) => self.merge_resource(existing, resource)?,
                None => self.reconcile_resource(resource)?,
            };
            merged.push(resolved);
        }

        application.resources = if should_replace_resources {
            merged
        } else {
            overlay(&current_ids, slots, merged)
        };
        Ok(application)
    }

    /// Reconciles a resource that is not part of the current in-memory tree:
    /// it is merged into its stored subtree if one exists, otherwise it is
    /// new and every edge below it is a first observation.
    pub fn reconcile_resource(&mut self, incoming: Resource) -> Result<Resource> {
        match self.loader.load_resource(&incoming.id)? {
            Some(stored) => {
                debug!(resource_id = %incoming.id, "resource new to parent, merging into stored subtree");
                self.merge_resource(stored, incoming)
            }
            None => {
                debug!(resource_id = %incoming.id, "new resource");
                let shell = incoming.shell();
                self.merge_resource(shell, incoming)
            }
        }
    }

    /// Merges `incoming` into `existing`, which must have the same ID.
    ///
    /// Packages already on the resource are merged in place. Packages new to
    /// the resource are merged into their stored subtree when one exists.
    /// Either way the new edge is attributed to this report's scanners.
    /// Packages the report does not mention are kept unchanged.
    pub fn merge_resource(&mut self, existing: Resource, incoming: Resource) -> Result<Resource> {
        let Resource {
            packages: incoming_packages,
            cis_docker_benchmark_checks: incoming_checks,
            ..
        } = incoming;
        let mut resource = existing;
        self.ledger.mark_resource_touched(&resource.id);
        let mut index: HashMap<PackageId, usize> = resource
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();

        for package in incoming_packages {
            self.ledger.mark_package_touched(&resource.id, &package.id);
            match index.get(&package.id).copied() {
                Some(i) => self.merge_package(&mut resource.packages[i], package),
                None => {
                    let mut target = match self.loader.load_package(&package.id)? {
                        Some(stored) => {
                            debug!(resource_id = %resource.id, package_id = %package.id, "package new to resource, found in storage");
                            stored
                        }
                        None => {
                            debug!(resource_id = %resource.id, package_id = %package.id, "new package");
                            empty_like(&package)
                        }
                    };
                    self.merge_package(&mut target, package);
                    self.ledger.attribute_new_edge(&resource.id, &target.id);
                    index.insert(target.id, resource.packages.len());
                    resource.packages.push(target);
                }
            }
        }

        if !incoming_checks.is_empty() {
            resource.cis_docker_benchmark_checks = incoming_checks;
            self.ledger.mark_cis_reported(&resource.id);
        }

        Ok(resource)
    }

    /// Merges package scalars and, for reports that carry findings, replaces
    /// the vulnerability set with the incoming one. Scanner attribution of a
    /// vulnerability that stays attached is kept.
    pub fn merge_package(&mut self, existing: &mut Package, incoming: Package) {
        if !incoming.license.is_empty() {
            existing.license = incoming.license;
        }
        if !incoming.language.is_empty() {
            existing.language = incoming.language;
        }

        if !self.ledger.should_update_package_vulnerabilities() {
            return;
        }

        let previous: HashMap<VulnerabilityId, Vulnerability> = existing
            .vulnerabilities
            .drain(..)
            .map(|v| (v.id, v))
            .collect();
        for mut vulnerability in incoming.vulnerabilities {
            if let Some(earlier) = previous.get(&vulnerability.id) {
                vulnerability.absorb_scanners(earlier);
            }
            existing.attach_vulnerability(vulnerability);
        }
    }
}

fn empty_like(package: &Package) -> Package {
    Package {
        id: package.id,
        name: package.name.clone(),
        version: package.version.clone(),
        license: String::new(),
        language: String::new(),
        vulnerabilities: Vec::new(),
    }
}

/// Puts merged resources back at the position of the entry they replace and
/// appends the rest in report order.
fn overlay(
    current_ids: &[ResourceId],
    slots: Vec<Option<Resource>>,
    merged: Vec<Resource>,
) -> Vec<Resource> {
    let position: HashMap<ResourceId, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id, i))
        .collect();
    let mut pending: Vec<Option<Resource>> = merged.into_iter().map(Some).collect();
    let mut resources = Vec::with_capacity(slots.len() + pending.len());

    for (id, slot) in current_ids.iter().zip(slots) {
        match slot {
            Some(untouched) => resources.push(untouched),
            None => {
                if let Some(resource) = position.get(id).and_then(|&i| pending[i].take()) {
                    resources.push(resource);
                }
            }
        }
    }
    resources.extend(pending.into_iter().flatten());
    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::domain::{
        ApplicationType, CisDockerBenchmarkCheck, CisLevel, ReportKind, ResourceType, Severity,
        VulnerabilitySource,
    };
    use crate::reconciliation::services::memory::InMemoryTree;
    use std::collections::BTreeSet;

    fn vuln_scan_ledger() -> TransactionParams {
        TransactionParams::new(ReportKind::VulnerabilityScan, VulnerabilitySource::Cicd)
    }

    fn vulnerability(name: &str, scanner: &str) -> Vulnerability {
        let mut v = Vulnerability::new(name, Severity::High);
        v.reporting_scanners.insert(scanner.to_string());
        v
    }

    fn names(resource: &Resource) -> Vec<String> {
        resource.packages.iter().map(|p| p.name.clone()).collect()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // ========== reconcile_application() tests ==========

    #[test]
    fn test_replace_keeps_only_reobserved_resources() {
        let mut store = InMemoryTree::default();
        let mut ledger = vuln_scan_ledger();
        let mut application = Application::new("app1", ApplicationType::Pod);
        application.resources = vec![
            Resource::new("h1", "r1", ResourceType::Image),
            Resource::new("h2", "r2", ResourceType::Image),
        ];

        let incoming = vec![Resource::new("h2", "r2", ResourceType::Image)];
        let result = TreeReconciler::new(&mut store, &mut ledger)
            .reconcile_application(application, incoming, true)
            .unwrap();

        assert_eq!(result.resources.len(), 1);
        assert_eq!(result.resources[0].name, "r2");
    }

    #[test]
    fn test_append_updates_in_place_and_appends_new() {
        let mut store = InMemoryTree::default();
        let mut ledger = vuln_scan_ledger();
        let mut application = Application::new("app1", ApplicationType::Pod);
        application.resources = vec![
            Resource::new("h1", "r1", ResourceType::Image),
            Resource::new("h2", "r2", ResourceType::Image),
        ];

        let incoming = vec![
            Resource::new("h3", "r3", ResourceType::Image),
            Resource::new("h1", "r1", ResourceType::Image).with_package(Package::new("p1", "1.0")),
        ];
        let result = TreeReconciler::new(&mut store, &mut ledger)
            .reconcile_application(application, incoming, false)
            .unwrap();

        let order: Vec<&str> = result.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["r1", "r2", "r3"]);
        assert_eq!(names(&result.resources[0]), vec!["p1".to_string()]);
    }

    #[test]
    fn test_resource_new_to_application_is_loaded_from_storage() {
        let stored = Resource::new("h1", "r1", ResourceType::Image)
            .with_package(Package::new("p0", "1.0").with_vulnerability(vulnerability("CVE-0", "grype")));
        let mut store = InMemoryTree::default().with_resource(stored);
        let mut ledger = vuln_scan_ledger();

        let incoming = vec![Resource::new("h1", "r1", ResourceType::Image).with_package(Package::new("p1", "1.0"))];
        let result = TreeReconciler::new(&mut store, &mut ledger)
            .reconcile_application(Application::new("app2", ApplicationType::Pod), incoming, true)
            .unwrap();

        assert_eq!(names(&result.resources[0]), vec!["p0".to_string(), "p1".to_string()]);
        assert_eq!(result.resources[0].packages[0].vulnerabilities.len(), 1);
    }

    // ========== merge_resource() tests ==========

    #[test]
    fn test_unreported_package_keeps_vulnerabilities() {
        let mut store = InMemoryTree::default();
        let mut ledger = vuln_scan_ledger();
        let existing = Resource::new("h1", "r1", ResourceType::Image)
            .with_package(Package::new("a", "1.0").with_vulnerability(vulnerability("CVE-A", "grype")))
            .with_package(Package::new("b", "1.0").with_vulnerability(vulnerability("CVE-B", "grype")));
        let incoming = Resource::new("h1", "r1", ResourceType::Image).with_package(
            Package::new("a", "1.0").with_vulnerability(vulnerability("CVE-A2", "grype")),
        );

        let merged = TreeReconciler::new(&mut store, &mut ledger)
            .merge_resource(existing, incoming)
            .unwrap();

        let a = &merged.packages[0];
        let b = &merged.packages[1];
        assert_eq!(a.vulnerabilities.len(), 1);
        assert_eq!(a.vulnerabilities[0].name, "CVE-A2");
        assert_eq!(b.vulnerabilities.len(), 1);
        assert_eq!(b.vulnerabilities[0].name, "CVE-B");
    }

    #[test]
    fn test_new_edge_attributed_to_scanners_existing_edge_untouched() {
        let mut store = InMemoryTree::default();
        let existing = Resource::new("h1", "r1", ResourceType::Image).with_package(Package::new("a", "1.0"));
        let resource_id = existing.id;
        let mut ledger = vuln_scan_ledger();
        let a = PackageId::from_name_version("a", "1.0");
        let b = PackageId::from_name_version("b", "1.0");
        ledger.record_scanners(&resource_id, &a, vec!["scanner1".to_string()]);
        ledger.record_scanners(&resource_id, &b, vec!["scanner1".to_string()]);

        let incoming = Resource::new("h1", "r1", ResourceType::Image)
            .with_package(Package::new("a", "1.0"))
            .with_package(Package::new("b", "1.0"));
        TreeReconciler::new(&mut store, &mut ledger)
            .merge_resource(existing, incoming)
            .unwrap();

        assert!(ledger.analyzers(&resource_id, &a).is_none());
        assert_eq!(ledger.analyzers(&resource_id, &b), Some(&set(&["scanner1"])));
    }

    #[test]
    fn test_only_reported_path_is_marked_touched() {
        let mut store = InMemoryTree::default();
        let mut ledger = TransactionParams::new(ReportKind::ContentAnalysis, VulnerabilitySource::Cicd);
        let mut application = Application::new("app1", ApplicationType::Pod);
        application.resources = vec![
            Resource::new("h1", "r1", ResourceType::Image)
                .with_package(Package::new("p1", "1.0"))
                .with_package(Package::new("p2", "1.0")),
            Resource::new("h2", "r2", ResourceType::Image).with_package(Package::new("p1", "1.0")),
        ];
        let r1 = application.resources[0].id;
        let r2 = application.resources[1].id;

        let incoming = vec![Resource::new("h1", "r1", ResourceType::Image)
            .with_package(Package::new("p1", "1.0").with_license("MIT"))];
        TreeReconciler::new(&mut store, &mut ledger)
            .reconcile_application(application, incoming, false)
            .unwrap();

        let p1 = PackageId::from_name_version("p1", "1.0");
        let p2 = PackageId::from_name_version("p2", "1.0");
        assert!(ledger.resource_touched(&r1));
        assert!(ledger.package_touched(&r1, &p1));
        assert!(!ledger.package_touched(&r1, &p2));
        assert!(!ledger.resource_touched(&r2));
        assert!(!ledger.package_touched(&r2, &p1));
    }

    #[test]
    fn test_package_new_to_resource_is_loaded_from_storage() {
        let stored = Package::new("p1", "1.0")
            .with_license("MIT")
            .with_vulnerability(vulnerability("CVE-OLD", "trivy"));
        let mut store = InMemoryTree::default().with_package(stored);
        let mut ledger = TransactionParams::new(ReportKind::ContentAnalysis, VulnerabilitySource::Cicd);

        let merged = TreeReconciler::new(&mut store, &mut ledger)
            .merge_resource(
                Resource::new("h1", "r1", ResourceType::Image),
                Resource::new("h1", "r1", ResourceType::Image).with_package(Package::new("p1", "1.0")),
            )
            .unwrap();

        let package = &merged.packages[0];
        assert_eq!(package.license, "MIT");
        assert_eq!(package.vulnerabilities[0].name, "CVE-OLD");
    }

    #[test]
    fn test_cis_checks_absent_are_carried_forward() {
        let mut store = InMemoryTree::default();
        let mut ledger = vuln_scan_ledger();
        let existing = Resource::new("h1", "r1", ResourceType::Image)
            .with_cis_check(CisDockerBenchmarkCheck::new("CIS-1", CisLevel::Warn, ""))
            .with_cis_check(CisDockerBenchmarkCheck::new("CIS-2", CisLevel::Info, ""));
        let id = existing.id;

        let merged = TreeReconciler::new(&mut store, &mut ledger)
            .merge_resource(existing, Resource::new("h1", "r1", ResourceType::Image))
            .unwrap();

        assert_eq!(merged.cis_docker_benchmark_checks.len(), 2);
        assert!(!ledger.cis_reported(&id));
    }

    #[test]
    fn test_cis_checks_present_replace_previous_set() {
        let mut store = InMemoryTree::default();
        let mut ledger = vuln_scan_ledger();
        let existing = Resource::new("h1", "r1", ResourceType::Image)
            .with_cis_check(CisDockerBenchmarkCheck::new("CIS-1", CisLevel::Warn, ""))
            .with_cis_check(CisDockerBenchmarkCheck::new("CIS-2", CisLevel::Info, ""));
        let id = existing.id;
        let incoming = Resource::new("h1", "r1", ResourceType::Image)
            .with_cis_check(CisDockerBenchmarkCheck::new("CIS-3", CisLevel::Fatal, ""));

        let merged = TreeReconciler::new(&mut store, &mut ledger)
            .merge_resource(existing, incoming)
            .unwrap();

        assert_eq!(merged.cis_docker_benchmark_checks.len(), 1);
        assert_eq!(merged.cis_docker_benchmark_checks[0].code, "CIS-3");
        assert!(ledger.cis_reported(&id));
    }

    // ========== merge_package() tests ==========

    #[test]
    fn test_content_analysis_leaves_vulnerabilities_alone() {
        let mut store = InMemoryTree::default();
        let mut ledger = TransactionParams::new(ReportKind::ContentAnalysis, VulnerabilitySource::Cicd);
        let mut existing = Package::new("p1", "1.0").with_vulnerability(vulnerability("CVE-1", "grype"));

        TreeReconciler::new(&mut store, &mut ledger)
            .merge_package(&mut existing, Package::new("p1", "1.0").with_language("python"));

        assert_eq!(existing.vulnerabilities.len(), 1);
        assert_eq!(existing.language, "python");
    }

    #[test]
    fn test_reobserved_vulnerability_keeps_scanner_history() {
        let mut store = InMemoryTree::default();
        let mut ledger = vuln_scan_ledger();
        let mut existing = Package::new("p1", "1.0")
            .with_license("MIT")
            .with_vulnerability(vulnerability("CVE-1", "scanner1"));

        TreeReconciler::new(&mut store, &mut ledger).merge_package(
            &mut existing,
            Package::new("p1", "1.0").with_vulnerability(vulnerability("CVE-1", "scanner2")),
        );

        assert_eq!(existing.license, "MIT");
        assert_eq!(
            existing.vulnerabilities[0].reporting_scanners,
            set(&["scanner1", "scanner2"])
        );
    }
}
