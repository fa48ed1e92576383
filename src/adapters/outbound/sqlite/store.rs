use anyhow::Context;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::transaction::SqliteTreeTransaction;
use super::{schema, views};
use crate::application::read_models::{
    ApplicationViewRow, LanguageCount, LicenseCount, PackageViewRow, ResourceViewRow,
    VulnerabilityViewRow,
};
use crate::ports::outbound::{MaterializedView, ScanStore, TreeTransaction};
use crate::shared::Result;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// SqliteScanStore adapter for the scan tree and its aggregate views
///
/// Opens one connection per unit of work. Write transactions start
/// IMMEDIATE, so concurrent writers queue on the database lock (up to the
/// busy timeout) instead of failing on upgrade.
#[derive(Debug, Clone)]
pub struct SqliteScanStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteScanStore {
    /// Opens the database at `path`, creating it and its schema if needed.
    pub fn open(path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let store = Self {
            path: path.into(),
            busy_timeout,
        };
        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }
        let conn = store.connection()?;
        schema::initialize(&conn)?;
        debug!(path = %store.path.display(), "opened scan store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("failed to open database at {}", self.path.display()))?;
        conn.busy_timeout(self.busy_timeout)
            .context("failed to set busy timeout")?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        Ok(conn)
    }

    fn with_immediate_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start transaction")?;
        let result = f(&tx)?;
        tx.commit().context("failed to commit transaction")?;
        Ok(result)
    }
}

impl ScanStore for SqliteScanStore {
    fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn TreeTransaction) -> Result<T>,
    {
        self.with_immediate_tx(|tx| {
            let mut unit = SqliteTreeTransaction::new(tx);
            work(&mut unit)
        })
    }

    fn refresh_materialized_view(&self, view: MaterializedView) -> Result<()> {
        self.with_immediate_tx(|tx| views::refresh(tx, view))
    }

    fn application_views(&self) -> Result<Vec<ApplicationViewRow>> {
        views::application_rows(&self.connection()?)
    }

    fn resource_views(&self) -> Result<Vec<ResourceViewRow>> {
        views::resource_rows(&self.connection()?)
    }

    fn package_views(&self) -> Result<Vec<PackageViewRow>> {
        views::package_rows(&self.connection()?)
    }

    fn vulnerability_views(&self) -> Result<Vec<VulnerabilityViewRow>> {
        views::vulnerability_rows(&self.connection()?)
    }

    fn most_vulnerable_applications(&self, limit: usize) -> Result<Vec<ApplicationViewRow>> {
        views::most_vulnerable_applications(&self.connection()?, limit)
    }

    fn most_vulnerable_resources(&self, limit: usize) -> Result<Vec<ResourceViewRow>> {
        views::most_vulnerable_resources(&self.connection()?, limit)
    }

    fn most_vulnerable_packages(&self, limit: usize) -> Result<Vec<PackageViewRow>> {
        views::most_vulnerable_packages(&self.connection()?, limit)
    }

    fn package_counts_per_license(&self) -> Result<Vec<LicenseCount>> {
        views::package_counts_per_license(&self.connection()?)
    }

    fn package_counts_per_language(&self) -> Result<Vec<LanguageCount>> {
        views::package_counts_per_language(&self.connection()?)
    }
}
