use anyhow::Context;
use rusqlite::{params, Connection, Params, Row};

use super::db_array;
use super::schema::live_source;
use super::transaction::{cis_level_column, parsed_column, severity_column, uuid_column};
use crate::application::read_models::{
    ApplicationViewRow, LanguageCount, LicenseCount, PackageViewRow, ResourceViewRow,
    SeverityCounts, VulnerabilityViewRow,
};
use crate::ports::outbound::MaterializedView;
use crate::reconciliation::domain::{ApplicationId, PackageId, ResourceId, VulnerabilityId};
use crate::shared::Result;

/// Replaces the snapshot table's rows with the live view's. Must run inside
/// a transaction so readers never observe an empty snapshot.
pub fn refresh(conn: &Connection, view: MaterializedView) -> Result<()> {
    conn.execute_batch(&format!(
        "DELETE FROM {view}; INSERT INTO {view} SELECT * FROM {source};",
        view = view.name(),
        source = live_source(view)
    ))
    .with_context(|| format!("failed to rebuild {}", view))
}

fn severity_counts(row: &Row<'_>, first: usize) -> rusqlite::Result<SeverityCounts> {
    Ok(SeverityCounts {
        critical: row.get::<_, Option<i64>>(first)?.unwrap_or(0),
        high: row.get::<_, Option<i64>>(first + 1)?.unwrap_or(0),
        medium: row.get::<_, Option<i64>>(first + 2)?.unwrap_or(0),
        low: row.get::<_, Option<i64>>(first + 3)?.unwrap_or(0),
        negligible: row.get::<_, Option<i64>>(first + 4)?.unwrap_or(0),
    })
}

/// Most severe counts first; the trailing `ORDER BY` keys break ties.
const MOST_VULNERABLE_ORDER: &str =
    "critical DESC, high DESC, medium DESC, low DESC, negligible DESC";

fn query_rows<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// `LIMIT` takes a signed integer; larger limits mean "all rows".
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

pub fn application_rows(conn: &Connection) -> Result<Vec<ApplicationViewRow>> {
    select_applications(conn, "ORDER BY name, id", [])
}

pub fn most_vulnerable_applications(conn: &Connection, limit: usize) -> Result<Vec<ApplicationViewRow>> {
    select_applications(
        conn,
        &format!("ORDER BY {}, name, id LIMIT ?1", MOST_VULNERABLE_ORDER),
        params![sql_limit(limit)],
    )
}

fn select_applications<P: Params>(conn: &Connection, tail: &str, params: P) -> Result<Vec<ApplicationViewRow>> {
    query_rows(
        conn,
        &format!(
            "SELECT id, name, application_type, labels, environments, resources, packages,
                    critical, high, medium, low, negligible, cis_level
             FROM applications_view {}",
            tail
        ),
        params,
        |row| {
            let labels: String = row.get(3)?;
            let environments: String = row.get(4)?;
            Ok(ApplicationViewRow {
                id: ApplicationId::from_uuid(uuid_column(row, 0)?),
                name: row.get(1)?,
                application_type: parsed_column(row, 2)?,
                labels: db_array::decode(&labels),
                environments: db_array::decode(&environments),
                resources: row.get(5)?,
                packages: row.get(6)?,
                vulnerabilities: severity_counts(row, 7)?,
                cis_docker_benchmark_level: cis_level_column(row, 12)?,
            })
        },
    )
}

pub fn resource_rows(conn: &Connection) -> Result<Vec<ResourceViewRow>> {
    select_resources(conn, "ORDER BY name, id", [])
}

pub fn most_vulnerable_resources(conn: &Connection, limit: usize) -> Result<Vec<ResourceViewRow>> {
    select_resources(
        conn,
        &format!("ORDER BY {}, name, id LIMIT ?1", MOST_VULNERABLE_ORDER),
        params![sql_limit(limit)],
    )
}

fn select_resources<P: Params>(conn: &Connection, tail: &str, params: P) -> Result<Vec<ResourceViewRow>> {
    query_rows(
        conn,
        &format!(
            "SELECT id, name, hash, resource_type, reporting_analyzers, applications, packages,
                    critical, high, medium, low, negligible, cis_level
             FROM resources_view {}",
            tail
        ),
        params,
        |row| {
            let analyzers: String = row.get(4)?;
            Ok(ResourceViewRow {
                id: ResourceId::from_uuid(uuid_column(row, 0)?),
                name: row.get(1)?,
                hash: row.get(2)?,
                resource_type: parsed_column(row, 3)?,
                reporting_analyzers: db_array::decode(&analyzers),
                applications: row.get(5)?,
                packages: row.get(6)?,
                vulnerabilities: severity_counts(row, 7)?,
                cis_docker_benchmark_level: cis_level_column(row, 12)?,
            })
        },
    )
}

pub fn package_rows(conn: &Connection) -> Result<Vec<PackageViewRow>> {
    select_packages(conn, "ORDER BY name, version, id", [])
}

pub fn most_vulnerable_packages(conn: &Connection, limit: usize) -> Result<Vec<PackageViewRow>> {
    select_packages(
        conn,
        &format!("ORDER BY {}, name, version, id LIMIT ?1", MOST_VULNERABLE_ORDER),
        params![sql_limit(limit)],
    )
}

fn select_packages<P: Params>(conn: &Connection, tail: &str, params: P) -> Result<Vec<PackageViewRow>> {
    query_rows(
        conn,
        &format!(
            "SELECT id, name, version, license, language, applications, resources,
                    critical, high, medium, low, negligible
             FROM packages_view {}",
            tail
        ),
        params,
        |row| {
            Ok(PackageViewRow {
                id: PackageId::from_uuid(uuid_column(row, 0)?),
                name: row.get(1)?,
                version: row.get(2)?,
                license: row.get(3)?,
                language: row.get(4)?,
                applications: row.get(5)?,
                resources: row.get(6)?,
                vulnerabilities: severity_counts(row, 7)?,
            })
        },
    )
}

pub fn vulnerability_rows(conn: &Connection) -> Result<Vec<VulnerabilityViewRow>> {
    query_rows(
        conn,
        "SELECT id, name, severity, cvss_base_score, cvss_severity, reporting_scanners,
                packages, resources, applications, fix_versions
         FROM vulnerabilities_view ORDER BY severity DESC, name, id",
        [],
        |row| {
            let scanners: String = row.get(5)?;
            let fix_versions: String = row.get(9)?;
            let severity = severity_column(row, 2)?.ok_or(rusqlite::Error::InvalidColumnType(
                2,
                "severity".to_string(),
                rusqlite::types::Type::Null,
            ))?;
            Ok(VulnerabilityViewRow {
                id: VulnerabilityId::from_uuid(uuid_column(row, 0)?),
                name: row.get(1)?,
                severity,
                cvss_base_score: row.get(3)?,
                cvss_severity: severity_column(row, 4)?,
                reporting_scanners: db_array::decode(&scanners),
                packages: row.get(6)?,
                resources: row.get(7)?,
                applications: row.get(8)?,
                fix_versions: db_array::decode(&fix_versions),
            })
        },
    )
}

/// Packages per non-empty value of `column` (`license` or `language`).
fn package_counts_by(conn: &Connection, column: &str) -> Result<Vec<(String, i64)>> {
    query_rows(
        conn,
        &format!(
            "SELECT {column}, COUNT(id) AS count FROM packages_view
             WHERE {column} <> ''
             GROUP BY {column}
             ORDER BY count DESC, {column}",
            column = column
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

pub fn package_counts_per_license(conn: &Connection) -> Result<Vec<LicenseCount>> {
    Ok(package_counts_by(conn, "license")?
        .into_iter()
        .map(|(license, count)| LicenseCount { license, count })
        .collect())
}

pub fn package_counts_per_language(conn: &Connection) -> Result<Vec<LanguageCount>> {
    Ok(package_counts_by(conn, "language")?
        .into_iter()
        .map(|(language, count)| LanguageCount { language, count })
        .collect())
}
