//! Transactional Tree Writer.
//!
//! Persists a reconciled tree bottom-up through a `TreeTransaction`. Each
//! association is replaced by computing its full target set and applying the
//! difference: insert missing edges, delete extra ones, update edges whose
//! attribute changed. An edge with no attribute in the ledger keeps the
//! stored value.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::ports::outbound::{Association, Edge, EdgeAttribute, TreeTransaction};
use crate::reconciliation::domain::{Application, Package, Resource, TransactionParams};
use crate::shared::error::{ReconcileError, TreeLevel};
use crate::shared::Result;

/// Edge changes applied while replacing one association
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssociationDiff {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl AssociationDiff {
    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

pub struct TreeWriter<'a, T: TreeTransaction + ?Sized> {
    tx: &'a mut T,
    ledger: &'a TransactionParams,
}

impl<'a, T: TreeTransaction + ?Sized> TreeWriter<'a, T> {
    pub fn new(tx: &'a mut T, ledger: &'a TransactionParams) -> Self {
        Self { tx, ledger }
    }

    /// Writes every resource the report touched, then the application row,
    /// then its resource association. Untouched resources only appear in the
    /// association.
    pub fn write_application(&mut self, application: &Application) -> Result<()> {
        for resource in &application.resources {
            if self.ledger.resource_touched(&resource.id) {
                self.write_resource(resource)?;
            }
        }

        self.write_application_rows(application)
            .map_err(|e| transaction_failure(TreeLevel::Application, e))
    }

    /// Writes the packages the report mentioned under the resource, then the
    /// resource row, its package association and, when this report carried
    /// checks for it, its CIS check association.
    pub fn write_resource(&mut self, resource: &Resource) -> Result<()> {
        for package in &resource.packages {
            if self.ledger.package_touched(&resource.id, &package.id) {
                self.write_package(package)?;
            }
        }

        self.write_resource_rows(resource)
            .map_err(|e| transaction_failure(TreeLevel::Resource, e))
    }

    /// Writes the package row and, for reports that carry findings, its
    /// vulnerability rows and association.
    pub fn write_package(&mut self, package: &Package) -> Result<()> {
        self.write_package_rows(package)
            .map_err(|e| transaction_failure(TreeLevel::Package, e))
    }

    fn write_application_rows(&mut self, application: &Application) -> Result<()> {
        self.tx.upsert_application(application)?;
        let targets = application
            .resources
            .iter()
            .map(|r| (*r.id.as_uuid(), None))
            .collect();
        self.replace_association(
            Association::ApplicationResources,
            application.id.as_uuid(),
            targets,
        )?;
        Ok(())
    }

    fn write_resource_rows(&mut self, resource: &Resource) -> Result<()> {
        self.tx.upsert_resource(resource)?;

        let targets = resource
            .packages
            .iter()
            .map(|p| {
                let analyzers = self
                    .ledger
                    .analyzers(&resource.id, &p.id)
                    .map(|names| EdgeAttribute::Analyzers(names.clone()));
                (*p.id.as_uuid(), analyzers)
            })
            .collect();
        self.replace_association(Association::ResourcePackages, resource.id.as_uuid(), targets)?;

        if self.ledger.cis_reported(&resource.id) {
            for check in &resource.cis_docker_benchmark_checks {
                self.tx.upsert_cis_check(check)?;
            }
            let targets = resource
                .cis_docker_benchmark_checks
                .iter()
                .map(|c| (*c.id.as_uuid(), None))
                .collect();
            self.replace_association(Association::ResourceCisChecks, resource.id.as_uuid(), targets)?;
        }
        Ok(())
    }

    fn write_package_rows(&mut self, package: &Package) -> Result<()> {
        self.tx.upsert_package(package)?;

        if !self.ledger.should_update_package_vulnerabilities() {
            return Ok(());
        }

        for vulnerability in &package.vulnerabilities {
            let mut row = vulnerability.clone();
            row.reporting_scanners
                .extend(self.tx.vulnerability_scanners(&vulnerability.id)?);
            self.tx.upsert_vulnerability(&row)?;
        }

        let targets = package
            .vulnerabilities
            .iter()
            .map(|v| {
                let fix_version = self
                    .ledger
                    .fix_version(&package.id, &v.id)
                    .map(|f| EdgeAttribute::FixVersion(f.to_string()));
                (*v.id.as_uuid(), fix_version)
            })
            .collect();
        self.replace_association(
            Association::PackageVulnerabilities,
            package.id.as_uuid(),
            targets,
        )?;
        Ok(())
    }

    /// Makes the children of `parent_id` in `association` exactly `targets`.
    ///
    /// A target attribute of `None` inserts the association's default and
    /// leaves an existing edge's attribute as stored.
    pub fn replace_association(
        &mut self,
        association: Association,
        parent_id: &Uuid,
        targets: Vec<(Uuid, Option<EdgeAttribute>)>,
    ) -> Result<AssociationDiff> {
        let existing: BTreeMap<Uuid, EdgeAttribute> = self
            .tx
            .edges(association, parent_id)?
            .into_iter()
            .map(|e| (e.child_id, e.attribute))
            .collect();
        let mut wanted = HashSet::with_capacity(targets.len());
        let mut diff = AssociationDiff::default();

        for (child_id, attribute) in targets {
            if !wanted.insert(child_id) {
                continue;
            }
            match existing.get(&child_id) {
                None => {
                    let attribute = attribute.unwrap_or_else(|| association.default_attribute());
                    self.tx
                        .insert_edge(association, parent_id, &Edge::new(child_id, attribute))?;
                    diff.inserted += 1;
                }
                Some(current) => {
                    if let Some(attribute) = attribute {
                        if &attribute != current {
                            self.tx
                                .update_edge(association, parent_id, &Edge::new(child_id, attribute))?;
                            diff.updated += 1;
                        }
                    }
                }
            }
        }

        for child_id in existing.keys() {
            if !wanted.contains(child_id) {
                self.tx.delete_edge(association, parent_id, child_id)?;
                diff.deleted += 1;
            }
        }

        if !diff.is_empty() {
            debug!(
                %association,
                parent_id = %parent_id,
                inserted = diff.inserted,
                updated = diff.updated,
                deleted = diff.deleted,
                "replaced association"
            );
        }
        Ok(diff)
    }
}

fn transaction_failure(level: TreeLevel, error: anyhow::Error) -> anyhow::Error {
    ReconcileError::TransactionFailure {
        level,
        details: format!("{:#}", error),
    }
    .into()
}
