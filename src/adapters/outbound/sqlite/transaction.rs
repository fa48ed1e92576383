use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use uuid::Uuid;

use super::db_array;
use crate::ports::outbound::{Association, Edge, EdgeAttribute, SubtreeLoader, TreeTransaction};
use crate::reconciliation::domain::{
    Application, ApplicationId, CisCheckId, CisDockerBenchmarkCheck, CisLevel, Cvss, Package,
    PackageId, Resource, ResourceId, ResourcePkgId, Severity, Vulnerability, VulnerabilityId,
};
use crate::shared::Result;

/// Join table behind an association
struct AssociationTable {
    table: &'static str,
    parent: &'static str,
    child: &'static str,
    attribute: Option<&'static str>,
}

fn association_table(association: Association) -> AssociationTable {
    match association {
        Association::ApplicationResources => AssociationTable {
            table: "application_resources",
            parent: "application_id",
            child: "resource_id",
            attribute: None,
        },
        Association::ResourcePackages => AssociationTable {
            table: "resource_packages",
            parent: "resource_id",
            child: "package_id",
            attribute: Some("analyzers"),
        },
        Association::PackageVulnerabilities => AssociationTable {
            table: "package_vulnerabilities",
            parent: "package_id",
            child: "vulnerability_id",
            attribute: Some("fix_version"),
        },
        Association::ResourceCisChecks => AssociationTable {
            table: "resource_cis_d_b_checks",
            parent: "resource_id",
            child: "cis_d_b_check_id",
            attribute: None,
        },
    }
}

fn encode_attribute(attribute: &EdgeAttribute) -> Option<String> {
    match attribute {
        EdgeAttribute::None => None,
        EdgeAttribute::Analyzers(names) => Some(db_array::encode(names)),
        EdgeAttribute::FixVersion(version) => Some(version.clone()),
    }
}

fn decode_attribute(association: Association, raw: Option<String>) -> EdgeAttribute {
    match (association, raw) {
        (Association::ResourcePackages, Some(raw)) => EdgeAttribute::Analyzers(db_array::decode(&raw)),
        (Association::PackageVulnerabilities, Some(raw)) => EdgeAttribute::FixVersion(raw),
        (association, _) => association.default_attribute(),
    }
}

pub(super) fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(super) fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(super) fn severity_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Severity>> {
    let level: Option<i64> = row.get(idx)?;
    match level {
        None => Ok(None),
        Some(level) => Severity::from_level(level)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, level)),
    }
}

pub(super) fn cis_level_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<CisLevel>> {
    let level: Option<i64> = row.get(idx)?;
    match level {
        None => Ok(None),
        Some(level) => CisLevel::from_level(level)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, level)),
    }
}

fn required<T>(value: Option<T>, idx: usize) -> rusqlite::Result<T> {
    value.ok_or(rusqlite::Error::InvalidColumnType(idx, "NULL".to_string(), Type::Null))
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    let labels: String = row.get(3)?;
    let environments: String = row.get(4)?;
    Ok(Application {
        id: ApplicationId::from_uuid(uuid_column(row, 0)?),
        name: row.get(1)?,
        application_type: parsed_column(row, 2)?,
        labels: db_array::decode(&labels),
        environments: db_array::decode(&environments),
        resources: Vec::new(),
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    let analyzers: String = row.get(4)?;
    Ok(Resource {
        id: ResourceId::from_uuid(uuid_column(row, 0)?),
        hash: row.get(1)?,
        name: row.get(2)?,
        resource_type: parsed_column(row, 3)?,
        reporting_analyzers: db_array::decode(&analyzers),
        packages: Vec::new(),
        cis_docker_benchmark_checks: Vec::new(),
    })
}

fn package_from_row(row: &Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        id: PackageId::from_uuid(uuid_column(row, 0)?),
        name: row.get(1)?,
        version: row.get(2)?,
        license: row.get(3)?,
        language: row.get(4)?,
        vulnerabilities: Vec::new(),
    })
}

fn vulnerability_from_row(row: &Row<'_>) -> rusqlite::Result<Vulnerability> {
    let vector: Option<String> = row.get(3)?;
    let base_score: Option<f64> = row.get(4)?;
    let cvss = match (vector, base_score, severity_column(row, 5)?) {
        (Some(vector), Some(base_score), Some(severity)) => Some(Cvss {
            vector,
            base_score,
            severity,
        }),
        _ => None,
    };
    let links: String = row.get(7)?;
    let scanners: String = row.get(8)?;
    Ok(Vulnerability {
        id: VulnerabilityId::from_uuid(uuid_column(row, 0)?),
        name: row.get(1)?,
        severity: required(severity_column(row, 2)?, 2)?,
        cvss,
        description: row.get(6)?,
        links: db_array::decode(&links),
        reporting_scanners: db_array::decode(&scanners),
        source: parsed_column(row, 9)?,
        scanned_at: row.get(10)?,
    })
}

fn cis_check_from_row(row: &Row<'_>) -> rusqlite::Result<CisDockerBenchmarkCheck> {
    Ok(CisDockerBenchmarkCheck {
        id: CisCheckId::from_uuid(uuid_column(row, 0)?),
        code: row.get(1)?,
        level: required(cis_level_column(row, 2)?, 2)?,
        descriptions: row.get(3)?,
    })
}

const VULNERABILITY_COLUMNS: &str = "v.id, v.name, v.severity, v.cvss_vector, v.cvss_base_score, \
     v.cvss_severity, v.description, v.links, v.reporting_scanners, v.source, v.scanned_at";

/// `TreeTransaction` over an open SQLite transaction
///
/// Loads return children ordered by ID so repeated loads of an unchanged
/// tree are identical.
pub struct SqliteTreeTransaction<'t> {
    conn: &'t Connection,
}

impl<'t> SqliteTreeTransaction<'t> {
    pub fn new(conn: &'t Connection) -> Self {
        Self { conn }
    }

    fn child_ids(&self, association: Association, parent_id: &Uuid) -> Result<Vec<Uuid>> {
        let table = association_table(association);
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {child} FROM {table} WHERE {parent} = ?1 ORDER BY {child}",
            child = table.child,
            table = table.table,
            parent = table.parent,
        ))?;
        let ids = stmt
            .query_map(params![parent_id.to_string()], |row| uuid_column(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

impl SubtreeLoader for SqliteTreeTransaction<'_> {
    fn load_application(&mut self, id: &ApplicationId) -> Result<Option<Application>> {
        let Some(mut application) = self.find_application(id)? else {
            return Ok(None);
        };
        for resource_id in self.child_ids(Association::ApplicationResources, id.as_uuid())? {
            if let Some(resource) = self.load_resource(&ResourceId::from_uuid(resource_id))? {
                application.resources.push(resource);
            }
        }
        Ok(Some(application))
    }

    fn load_resource(&mut self, id: &ResourceId) -> Result<Option<Resource>> {
        let resource = self
            .conn
            .prepare_cached(
                "SELECT id, hash, name, resource_type, reporting_analyzers FROM resources WHERE id = ?1",
            )?
            .query_row(params![id.to_string()], resource_from_row)
            .optional()?;
        let Some(mut resource) = resource else {
            return Ok(None);
        };

        for package_id in self.child_ids(Association::ResourcePackages, id.as_uuid())? {
            if let Some(package) = self.load_package(&PackageId::from_uuid(package_id))? {
                resource.packages.push(package);
            }
        }

        let mut stmt = self.conn.prepare_cached(
            "SELECT c.id, c.code, c.level, c.descriptions
             FROM resource_cis_d_b_checks rc
             JOIN cis_d_b_checks c ON c.id = rc.cis_d_b_check_id
             WHERE rc.resource_id = ?1
             ORDER BY c.id",
        )?;
        resource.cis_docker_benchmark_checks = stmt
            .query_map(params![id.to_string()], cis_check_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(resource))
    }

    fn load_package(&mut self, id: &PackageId) -> Result<Option<Package>> {
        let package = self
            .conn
            .prepare_cached("SELECT id, name, version, license, language FROM packages WHERE id = ?1")?
            .query_row(params![id.to_string()], package_from_row)
            .optional()?;
        let Some(mut package) = package else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {}
             FROM package_vulnerabilities pv
             JOIN vulnerabilities v ON v.id = pv.vulnerability_id
             WHERE pv.package_id = ?1
             ORDER BY v.id",
            VULNERABILITY_COLUMNS
        ))?;
        package.vulnerabilities = stmt
            .query_map(params![id.to_string()], vulnerability_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(package))
    }
}

impl TreeTransaction for SqliteTreeTransaction<'_> {
    fn find_application(&mut self, id: &ApplicationId) -> Result<Option<Application>> {
        let application = self
            .conn
            .prepare_cached(
                "SELECT id, name, application_type, labels, environments FROM applications WHERE id = ?1",
            )?
            .query_row(params![id.to_string()], application_from_row)
            .optional()?;
        Ok(application)
    }

    fn resource_package_analyzers(
        &mut self,
        resource_ids: &[ResourceId],
    ) -> Result<HashMap<ResourcePkgId, BTreeSet<String>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT package_id, analyzers FROM resource_packages WHERE resource_id = ?1")?;
        let mut analyzers = HashMap::new();
        for resource_id in resource_ids {
            let rows = stmt.query_map(params![resource_id.to_string()], |row| {
                let raw: String = row.get(1)?;
                Ok((PackageId::from_uuid(uuid_column(row, 0)?), db_array::decode(&raw)))
            })?;
            for row in rows {
                let (package_id, names) = row?;
                if !names.is_empty() {
                    analyzers.insert(ResourcePkgId::new(resource_id, &package_id), names);
                }
            }
        }
        Ok(analyzers)
    }

    fn vulnerability_scanners(&mut self, id: &VulnerabilityId) -> Result<BTreeSet<String>> {
        let raw: Option<String> = self
            .conn
            .prepare_cached("SELECT reporting_scanners FROM vulnerabilities WHERE id = ?1")?
            .query_row(params![id.to_string()], |row| row.get(0))
            .optional()?;
        Ok(raw.map(|raw| db_array::decode(&raw)).unwrap_or_default())
    }

    fn upsert_application(&mut self, application: &Application) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO applications (id, name, application_type, labels, environments)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    application_type = excluded.application_type,
                    labels = excluded.labels,
                    environments = excluded.environments",
            )?
            .execute(params![
                application.id.to_string(),
                application.name,
                application.application_type.as_str(),
                db_array::encode(&application.labels),
                db_array::encode(&application.environments),
            ])?;
        Ok(())
    }

    fn upsert_resource(&mut self, resource: &Resource) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO resources (id, hash, name, resource_type, reporting_analyzers)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    hash = excluded.hash,
                    name = excluded.name,
                    resource_type = excluded.resource_type,
                    reporting_analyzers = excluded.reporting_analyzers",
            )?
            .execute(params![
                resource.id.to_string(),
                resource.hash,
                resource.name,
                resource.resource_type.as_str(),
                db_array::encode(&resource.reporting_analyzers),
            ])?;
        Ok(())
    }

    fn upsert_package(&mut self, package: &Package) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO packages (id, name, version, license, language)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    version = excluded.version,
                    license = excluded.license,
                    language = excluded.language",
            )?
            .execute(params![
                package.id.to_string(),
                package.name,
                package.version,
                package.license,
                package.language,
            ])?;
        Ok(())
    }

    fn upsert_vulnerability(&mut self, vulnerability: &Vulnerability) -> Result<()> {
        let cvss = vulnerability.cvss.as_ref();
        self.conn
            .prepare_cached(
                "INSERT INTO vulnerabilities (id, name, severity, cvss_vector, cvss_base_score,
                    cvss_severity, description, links, reporting_scanners, source, scanned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    severity = excluded.severity,
                    cvss_vector = excluded.cvss_vector,
                    cvss_base_score = excluded.cvss_base_score,
                    cvss_severity = excluded.cvss_severity,
                    description = excluded.description,
                    links = excluded.links,
                    reporting_scanners = excluded.reporting_scanners,
                    source = excluded.source,
                    scanned_at = excluded.scanned_at",
            )?
            .execute(params![
                vulnerability.id.to_string(),
                vulnerability.name,
                vulnerability.severity.level(),
                cvss.map(|c| c.vector.as_str()),
                cvss.map(|c| c.base_score),
                cvss.map(|c| c.severity.level()),
                vulnerability.description,
                db_array::encode(&vulnerability.links),
                db_array::encode(&vulnerability.reporting_scanners),
                vulnerability.source.as_str(),
                vulnerability.scanned_at,
            ])?;
        Ok(())
    }

    fn upsert_cis_check(&mut self, check: &CisDockerBenchmarkCheck) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO cis_d_b_checks (id, code, level, descriptions)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    code = excluded.code,
                    level = excluded.level,
                    descriptions = excluded.descriptions",
            )?
            .execute(params![
                check.id.to_string(),
                check.code,
                check.level.level(),
                check.descriptions,
            ])?;
        Ok(())
    }

    fn edges(&mut self, association: Association, parent_id: &Uuid) -> Result<Vec<Edge>> {
        let table = association_table(association);
        let attribute = table.attribute.unwrap_or("NULL");
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {child}, {attribute} FROM {table} WHERE {parent} = ?1 ORDER BY {child}",
            child = table.child,
            table = table.table,
            parent = table.parent,
        ))?;
        let edges = stmt
            .query_map(params![parent_id.to_string()], |row| {
                let raw: Option<String> = row.get(1)?;
                Ok(Edge::new(uuid_column(row, 0)?, decode_attribute(association, raw)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    fn insert_edge(&mut self, association: Association, parent_id: &Uuid, edge: &Edge) -> Result<()> {
        let table = association_table(association);
        match (table.attribute, encode_attribute(&edge.attribute)) {
            (Some(column), Some(value)) => {
                self.conn
                    .prepare_cached(&format!(
                        "INSERT INTO {} ({}, {}, {}) VALUES (?1, ?2, ?3)",
                        table.table, table.parent, table.child, column
                    ))?
                    .execute(params![parent_id.to_string(), edge.child_id.to_string(), value])?;
            }
            _ => {
                self.conn
                    .prepare_cached(&format!(
                        "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                        table.table, table.parent, table.child
                    ))?
                    .execute(params![parent_id.to_string(), edge.child_id.to_string()])?;
            }
        }
        Ok(())
    }

    fn update_edge(&mut self, association: Association, parent_id: &Uuid, edge: &Edge) -> Result<()> {
        let table = association_table(association);
        let (Some(column), Some(value)) = (table.attribute, encode_attribute(&edge.attribute)) else {
            return Ok(());
        };
        self.conn
            .prepare_cached(&format!(
                "UPDATE {} SET {} = ?3 WHERE {} = ?1 AND {} = ?2",
                table.table, column, table.parent, table.child
            ))?
            .execute(params![parent_id.to_string(), edge.child_id.to_string(), value])?;
        Ok(())
    }

    fn delete_edge(&mut self, association: Association, parent_id: &Uuid, child_id: &Uuid) -> Result<()> {
        let table = association_table(association);
        self.conn
            .prepare_cached(&format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                table.table, table.parent, table.child
            ))?
            .execute(params![parent_id.to_string(), child_id.to_string()])?;
        Ok(())
    }

    fn delete_all_edges(&mut self, association: Association, parent_id: &Uuid) -> Result<usize> {
        let table = association_table(association);
        let removed = self
            .conn
            .prepare_cached(&format!(
                "DELETE FROM {} WHERE {} = ?1",
                table.table, table.parent
            ))?
            .execute(params![parent_id.to_string()])?;
        Ok(removed)
    }

    fn delete_application(&mut self, id: &ApplicationId) -> Result<bool> {
        self.delete_all_edges(Association::ApplicationResources, id.as_uuid())?;
        let removed = self
            .conn
            .prepare_cached("DELETE FROM applications WHERE id = ?1")?
            .execute(params![id.to_string()])?;
        Ok(removed > 0)
    }
}
