//! Base tables, live aggregate views and their snapshot tables.
//!
//! Sets are stored as db arrays (see [`super::db_array`]); severities and
//! CIS levels as their integer ordinals so views can aggregate them.

use anyhow::Context;
use rusqlite::Connection;

use crate::ports::outbound::MaterializedView;
use crate::shared::Result;

const BASE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    application_type TEXT NOT NULL,
    labels TEXT NOT NULL DEFAULT '',
    environments TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    hash TEXT NOT NULL,
    name TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    reporting_analyzers TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS packages (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    license TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS vulnerabilities (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    severity INTEGER NOT NULL,
    cvss_vector TEXT,
    cvss_base_score REAL,
    cvss_severity INTEGER,
    description TEXT NOT NULL DEFAULT '',
    links TEXT NOT NULL DEFAULT '',
    reporting_scanners TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL,
    scanned_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS cis_d_b_checks (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL,
    level INTEGER NOT NULL,
    descriptions TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS application_resources (
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    PRIMARY KEY (application_id, resource_id)
);
CREATE TABLE IF NOT EXISTS resource_packages (
    resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    package_id TEXT NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
    analyzers TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (resource_id, package_id)
);
CREATE TABLE IF NOT EXISTS package_vulnerabilities (
    package_id TEXT NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
    vulnerability_id TEXT NOT NULL REFERENCES vulnerabilities(id) ON DELETE CASCADE,
    fix_version TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (package_id, vulnerability_id)
);
CREATE TABLE IF NOT EXISTS resource_cis_d_b_checks (
    resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    cis_d_b_check_id TEXT NOT NULL REFERENCES cis_d_b_checks(id) ON DELETE CASCADE,
    PRIMARY KEY (resource_id, cis_d_b_check_id)
);

CREATE INDEX IF NOT EXISTS idx_application_resources_resource ON application_resources(resource_id);
CREATE INDEX IF NOT EXISTS idx_resource_packages_package ON resource_packages(package_id);
CREATE INDEX IF NOT EXISTS idx_package_vulnerabilities_vulnerability ON package_vulnerabilities(vulnerability_id);
"#;

const LIVE_VIEWS: &str = r#"
CREATE VIEW IF NOT EXISTS application_packages_live AS
SELECT DISTINCT ar.application_id, rp.package_id
FROM application_resources ar
JOIN resource_packages rp ON rp.resource_id = ar.resource_id;

CREATE VIEW IF NOT EXISTS application_vulnerabilities_live AS
SELECT DISTINCT ap.application_id, pv.vulnerability_id
FROM application_packages_live ap
JOIN package_vulnerabilities pv ON pv.package_id = ap.package_id;

CREATE VIEW IF NOT EXISTS resource_vulnerabilities_live AS
SELECT DISTINCT rp.resource_id, pv.vulnerability_id
FROM resource_packages rp
JOIN package_vulnerabilities pv ON pv.package_id = rp.package_id;

CREATE VIEW IF NOT EXISTS applications_live AS
SELECT
    a.id, a.name, a.application_type, a.labels, a.environments,
    (SELECT COUNT(*) FROM application_resources ar WHERE ar.application_id = a.id) AS resources,
    (SELECT COUNT(*) FROM application_packages_live ap WHERE ap.application_id = a.id) AS packages,
    SUM(CASE WHEN v.severity = 4 THEN 1 ELSE 0 END) AS critical,
    SUM(CASE WHEN v.severity = 3 THEN 1 ELSE 0 END) AS high,
    SUM(CASE WHEN v.severity = 2 THEN 1 ELSE 0 END) AS medium,
    SUM(CASE WHEN v.severity = 1 THEN 1 ELSE 0 END) AS low,
    SUM(CASE WHEN v.severity = 0 THEN 1 ELSE 0 END) AS negligible,
    (SELECT MAX(c.level)
        FROM application_resources ar
        JOIN resource_cis_d_b_checks rc ON rc.resource_id = ar.resource_id
        JOIN cis_d_b_checks c ON c.id = rc.cis_d_b_check_id
        WHERE ar.application_id = a.id) AS cis_level
FROM applications a
LEFT JOIN application_vulnerabilities_live av ON av.application_id = a.id
LEFT JOIN vulnerabilities v ON v.id = av.vulnerability_id
GROUP BY a.id;

CREATE VIEW IF NOT EXISTS resources_live AS
SELECT
    r.id, r.name, r.hash, r.resource_type, r.reporting_analyzers,
    (SELECT COUNT(*) FROM application_resources ar WHERE ar.resource_id = r.id) AS applications,
    (SELECT COUNT(*) FROM resource_packages rp WHERE rp.resource_id = r.id) AS packages,
    SUM(CASE WHEN v.severity = 4 THEN 1 ELSE 0 END) AS critical,
    SUM(CASE WHEN v.severity = 3 THEN 1 ELSE 0 END) AS high,
    SUM(CASE WHEN v.severity = 2 THEN 1 ELSE 0 END) AS medium,
    SUM(CASE WHEN v.severity = 1 THEN 1 ELSE 0 END) AS low,
    SUM(CASE WHEN v.severity = 0 THEN 1 ELSE 0 END) AS negligible,
    (SELECT MAX(c.level)
        FROM resource_cis_d_b_checks rc
        JOIN cis_d_b_checks c ON c.id = rc.cis_d_b_check_id
        WHERE rc.resource_id = r.id) AS cis_level
FROM resources r
LEFT JOIN resource_vulnerabilities_live rv ON rv.resource_id = r.id
LEFT JOIN vulnerabilities v ON v.id = rv.vulnerability_id
GROUP BY r.id;

CREATE VIEW IF NOT EXISTS packages_live AS
SELECT
    p.id, p.name, p.version, p.license, p.language,
    (SELECT COUNT(*) FROM application_packages_live ap WHERE ap.package_id = p.id) AS applications,
    (SELECT COUNT(*) FROM resource_packages rp WHERE rp.package_id = p.id) AS resources,
    SUM(CASE WHEN v.severity = 4 THEN 1 ELSE 0 END) AS critical,
    SUM(CASE WHEN v.severity = 3 THEN 1 ELSE 0 END) AS high,
    SUM(CASE WHEN v.severity = 2 THEN 1 ELSE 0 END) AS medium,
    SUM(CASE WHEN v.severity = 1 THEN 1 ELSE 0 END) AS low,
    SUM(CASE WHEN v.severity = 0 THEN 1 ELSE 0 END) AS negligible
FROM packages p
LEFT JOIN package_vulnerabilities pv ON pv.package_id = p.id
LEFT JOIN vulnerabilities v ON v.id = pv.vulnerability_id
GROUP BY p.id;

CREATE VIEW IF NOT EXISTS vulnerabilities_live AS
SELECT
    v.id, v.name, v.severity, v.cvss_base_score, v.cvss_severity, v.reporting_scanners,
    (SELECT COUNT(*) FROM package_vulnerabilities pv WHERE pv.vulnerability_id = v.id) AS packages,
    (SELECT COUNT(*) FROM resource_vulnerabilities_live rv WHERE rv.vulnerability_id = v.id) AS resources,
    (SELECT COUNT(*) FROM application_vulnerabilities_live av WHERE av.vulnerability_id = v.id) AS applications,
    COALESCE(
        (SELECT REPLACE(GROUP_CONCAT(DISTINCT '|' || pv.fix_version || '|'), '|,|', '||')
            FROM package_vulnerabilities pv
            WHERE pv.vulnerability_id = v.id AND pv.fix_version <> ''),
        '') AS fix_versions
FROM vulnerabilities v;
"#;

/// Live view a snapshot table is rebuilt from
pub fn live_source(view: MaterializedView) -> &'static str {
    match view {
        MaterializedView::Applications => "applications_live",
        MaterializedView::Resources => "resources_live",
        MaterializedView::Packages => "packages_live",
        MaterializedView::Vulnerabilities => "vulnerabilities_live",
    }
}

/// Creates everything that does not exist yet. Safe to run on every open.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(BASE_TABLES)
        .context("failed to create base tables")?;
    conn.execute_batch(LIVE_VIEWS)
        .context("failed to create aggregate views")?;
    for view in MaterializedView::ALL {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} AS SELECT * FROM {} WHERE 0;",
            view.name(),
            live_source(view)
        ))
        .with_context(|| format!("failed to create {}", view))?;
    }
    Ok(())
}
