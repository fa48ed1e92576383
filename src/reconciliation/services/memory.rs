//! In-memory `TreeTransaction` and `ScanStore` used by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use crate::application::read_models::{
    ApplicationViewRow, PackageViewRow, ResourceViewRow, VulnerabilityViewRow,
};
use crate::ports::outbound::{
    Association, Edge, EdgeAttribute, MaterializedView, ScanStore, SubtreeLoader, TreeTransaction,
};
use crate::reconciliation::domain::{
    Application, ApplicationId, CisDockerBenchmarkCheck, Package, PackageId, Resource, ResourceId,
    ResourcePkgId, Vulnerability, VulnerabilityId,
};
use crate::shared::Result;

#[derive(Default, Clone)]
pub struct InMemoryTree {
    pub applications: HashMap<ApplicationId, Application>,
    pub resources: HashMap<ResourceId, Resource>,
    pub packages: HashMap<PackageId, Package>,
    pub vulnerabilities: HashMap<VulnerabilityId, Vulnerability>,
    pub cis_checks: HashMap<Uuid, CisDockerBenchmarkCheck>,
    pub edges: HashMap<Association, BTreeMap<Uuid, BTreeMap<Uuid, EdgeAttribute>>>,
    /// Write operations in the order they happened
    pub log: Vec<String>,
    pub fail_on_package: Option<String>,
}

impl InMemoryTree {
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.seed_resource(&resource);
        self
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.seed_package(&package);
        self
    }

    pub fn with_application(mut self, application: Application) -> Self {
        for resource in &application.resources {
            self.seed_resource(resource);
            self.put_edge(
                Association::ApplicationResources,
                *application.id.as_uuid(),
                *resource.id.as_uuid(),
                EdgeAttribute::None,
            );
        }
        let mut row = application;
        row.resources.clear();
        self.applications.insert(row.id, row);
        self
    }

    pub fn with_edge_attribute(
        mut self,
        association: Association,
        parent: Uuid,
        child: Uuid,
        attribute: EdgeAttribute,
    ) -> Self {
        self.put_edge(association, parent, child, attribute);
        self
    }

    pub fn failing_on_package(mut self, name: &str) -> Self {
        self.fail_on_package = Some(name.to_string());
        self
    }

    pub fn edge(&self, association: Association, parent: &Uuid, child: &Uuid) -> Option<&EdgeAttribute> {
        self.edges
            .get(&association)
            .and_then(|by_parent| by_parent.get(parent))
            .and_then(|children| children.get(child))
    }

    fn seed_resource(&mut self, resource: &Resource) {
        for package in &resource.packages {
            self.seed_package(package);
            self.put_edge(
                Association::ResourcePackages,
                *resource.id.as_uuid(),
                *package.id.as_uuid(),
                EdgeAttribute::Analyzers(BTreeSet::new()),
            );
        }
        for check in &resource.cis_docker_benchmark_checks {
            self.cis_checks.insert(*check.id.as_uuid(), check.clone());
            self.put_edge(
                Association::ResourceCisChecks,
                *resource.id.as_uuid(),
                *check.id.as_uuid(),
                EdgeAttribute::None,
            );
        }
        let mut row = resource.shell();
        row.reporting_analyzers = resource.reporting_analyzers.clone();
        self.resources.insert(row.id, row);
    }

    fn seed_package(&mut self, package: &Package) {
        for vulnerability in &package.vulnerabilities {
            self.vulnerabilities
                .insert(vulnerability.id, vulnerability.clone());
            self.put_edge(
                Association::PackageVulnerabilities,
                *package.id.as_uuid(),
                *vulnerability.id.as_uuid(),
                EdgeAttribute::FixVersion(String::new()),
            );
        }
        let mut row = package.clone();
        row.vulnerabilities.clear();
        self.packages.insert(row.id, row);
    }

    fn put_edge(&mut self, association: Association, parent: Uuid, child: Uuid, attribute: EdgeAttribute) {
        self.edges
            .entry(association)
            .or_default()
            .entry(parent)
            .or_default()
            .insert(child, attribute);
    }

    fn children(&self, association: Association, parent: &Uuid) -> Vec<Uuid> {
        self.edges
            .get(&association)
            .and_then(|by_parent| by_parent.get(parent))
            .map(|children| children.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl SubtreeLoader for InMemoryTree {
    fn load_application(&mut self, id: &ApplicationId) -> Result<Option<Application>> {
        let Some(mut application) = self.applications.get(id).cloned() else {
            return Ok(None);
        };
        for child in self.children(Association::ApplicationResources, id.as_uuid()) {
            if let Some(resource) = self.load_resource(&ResourceId::from_uuid(child))? {
                application.resources.push(resource);
            }
        }
        Ok(Some(application))
    }

    fn load_resource(&mut self, id: &ResourceId) -> Result<Option<Resource>> {
        let Some(mut resource) = self.resources.get(id).cloned() else {
            return Ok(None);
        };
        for child in self.children(Association::ResourcePackages, id.as_uuid()) {
            if let Some(package) = self.load_package(&PackageId::from_uuid(child))? {
                resource.packages.push(package);
            }
        }
        for child in self.children(Association::ResourceCisChecks, id.as_uuid()) {
            if let Some(check) = self.cis_checks.get(&child) {
                resource.cis_docker_benchmark_checks.push(check.clone());
            }
        }
        Ok(Some(resource))
    }

    fn load_package(&mut self, id: &PackageId) -> Result<Option<Package>> {
        let Some(mut package) = self.packages.get(id).cloned() else {
            return Ok(None);
        };
        for child in self.children(Association::PackageVulnerabilities, id.as_uuid()) {
            if let Some(vulnerability) = self.vulnerabilities.get(&VulnerabilityId::from_uuid(child)) {
                package.vulnerabilities.push(vulnerability.clone());
            }
        }
        Ok(Some(package))
    }
}

impl TreeTransaction for InMemoryTree {
    fn find_application(&mut self, id: &ApplicationId) -> Result<Option<Application>> {
        Ok(self.applications.get(id).cloned())
    }

    fn resource_package_analyzers(
        &mut self,
        resource_ids: &[ResourceId],
    ) -> Result<HashMap<ResourcePkgId, BTreeSet<String>>> {
        let mut analyzers = HashMap::new();
        for resource_id in resource_ids {
            let Some(children) = self
                .edges
                .get(&Association::ResourcePackages)
                .and_then(|by_parent| by_parent.get(resource_id.as_uuid()))
            else {
                continue;
            };
            for (child, attribute) in children {
                if let EdgeAttribute::Analyzers(names) = attribute {
                    if !names.is_empty() {
                        analyzers.insert(
                            ResourcePkgId::new(resource_id, &PackageId::from_uuid(*child)),
                            names.clone(),
                        );
                    }
                }
            }
        }
        Ok(analyzers)
    }

    fn vulnerability_scanners(&mut self, id: &VulnerabilityId) -> Result<BTreeSet<String>> {
        Ok(self
            .vulnerabilities
            .get(id)
            .map(|v| v.reporting_scanners.clone())
            .unwrap_or_default())
    }

    fn upsert_application(&mut self, application: &Application) -> Result<()> {
        self.log.push(format!("application {}", application.name));
        let mut row = application.clone();
        row.resources.clear();
        self.applications.insert(row.id, row);
        Ok(())
    }

    fn upsert_resource(&mut self, resource: &Resource) -> Result<()> {
        self.log.push(format!("resource {}", resource.name));
        let mut row = resource.shell();
        row.reporting_analyzers = resource.reporting_analyzers.clone();
        self.resources.insert(row.id, row);
        Ok(())
    }

    fn upsert_package(&mut self, package: &Package) -> Result<()> {
        if self.fail_on_package.as_deref() == Some(package.name.as_str()) {
            anyhow::bail!("simulated failure writing package {}", package.name);
        }
        self.log.push(format!("package {}", package.name));
        let mut row = package.clone();
        row.vulnerabilities.clear();
        self.packages.insert(row.id, row);
        Ok(())
    }

    fn upsert_vulnerability(&mut self, vulnerability: &Vulnerability) -> Result<()> {
        self.log.push(format!("vulnerability {}", vulnerability.name));
        self.vulnerabilities
            .insert(vulnerability.id, vulnerability.clone());
        Ok(())
    }

    fn upsert_cis_check(&mut self, check: &CisDockerBenchmarkCheck) -> Result<()> {
        self.log.push(format!("cis {}", check.code));
        self.cis_checks.insert(*check.id.as_uuid(), check.clone());
        Ok(())
    }

    fn edges(&mut self, association: Association, parent_id: &Uuid) -> Result<Vec<Edge>> {
        Ok(self
            .edges
            .get(&association)
            .and_then(|by_parent| by_parent.get(parent_id))
            .map(|children| {
                children
                    .iter()
                    .map(|(child, attribute)| Edge::new(*child, attribute.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_edge(&mut self, association: Association, parent_id: &Uuid, edge: &Edge) -> Result<()> {
        self.log.push(format!("insert {}", association));
        self.put_edge(association, *parent_id, edge.child_id, edge.attribute.clone());
        Ok(())
    }

    fn update_edge(&mut self, association: Association, parent_id: &Uuid, edge: &Edge) -> Result<()> {
        self.log.push(format!("update {}", association));
        self.put_edge(association, *parent_id, edge.child_id, edge.attribute.clone());
        Ok(())
    }

    fn delete_edge(&mut self, association: Association, parent_id: &Uuid, child_id: &Uuid) -> Result<()> {
        self.log.push(format!("delete {}", association));
        if let Some(children) = self
            .edges
            .get_mut(&association)
            .and_then(|by_parent| by_parent.get_mut(parent_id))
        {
            children.remove(child_id);
        }
        Ok(())
    }

    fn delete_all_edges(&mut self, association: Association, parent_id: &Uuid) -> Result<usize> {
        Ok(self
            .edges
            .get_mut(&association)
            .and_then(|by_parent| by_parent.remove(parent_id))
            .map(|children| children.len())
            .unwrap_or(0))
    }

    fn delete_application(&mut self, id: &ApplicationId) -> Result<bool> {
        self.delete_all_edges(Association::ApplicationResources, id.as_uuid())?;
        Ok(self.applications.remove(id).is_some())
    }
}

/// Store whose transactions work on a copy of the tree that replaces the
/// original only when the work succeeds.
#[derive(Default)]
pub struct MemoryScanStore {
    tree: Mutex<InMemoryTree>,
    refreshed: Mutex<Vec<MaterializedView>>,
}

impl MemoryScanStore {
    pub fn new(tree: InMemoryTree) -> Self {
        Self {
            tree: Mutex::new(tree),
            refreshed: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> InMemoryTree {
        self.tree.lock().unwrap().clone()
    }

    pub fn refreshed(&self) -> Vec<MaterializedView> {
        self.refreshed.lock().unwrap().clone()
    }
}

impl ScanStore for MemoryScanStore {
    fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn TreeTransaction) -> Result<T>,
    {
        let mut tree = self.tree.lock().unwrap();
        let mut working = tree.clone();
        let output = work(&mut working)?;
        *tree = working;
        Ok(output)
    }

    fn refresh_materialized_view(&self, view: MaterializedView) -> Result<()> {
        self.refreshed.lock().unwrap().push(view);
        Ok(())
    }

    fn application_views(&self) -> Result<Vec<ApplicationViewRow>> {
        Ok(Vec::new())
    }

    fn resource_views(&self) -> Result<Vec<ResourceViewRow>> {
        Ok(Vec::new())
    }

    fn package_views(&self) -> Result<Vec<PackageViewRow>> {
        Ok(Vec::new())
    }

    fn vulnerability_views(&self) -> Result<Vec<VulnerabilityViewRow>> {
        Ok(Vec::new())
    }
}
