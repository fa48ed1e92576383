use clap::{Parser, Subcommand};
use std::path::PathBuf;

use scan_tree::application::read_models::{
    ApplicationViewRow, DashboardSummary, PackageViewRow, ResourceViewRow, VulnerabilityViewRow,
    DEFAULT_MOST_VULNERABLE_LIMIT,
};
use scan_tree::ports::outbound::ScanStore;
use scan_tree::reconciliation::domain::ApplicationType;
use scan_tree::shared::Result;

/// Aggregate view selected by `views --kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Applications,
    Resources,
    Packages,
    Vulnerabilities,
    /// Most vulnerable applications, resources and packages plus package
    /// counts per license and language
    Dashboard,
}

impl std::str::FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "applications" | "apps" => Ok(ViewKind::Applications),
            "resources" => Ok(ViewKind::Resources),
            "packages" => Ok(ViewKind::Packages),
            "vulnerabilities" | "vulns" => Ok(ViewKind::Vulnerabilities),
            "dashboard" => Ok(ViewKind::Dashboard),
            _ => Err(format!(
                "Invalid view kind: {}. Please specify 'applications', 'resources', 'packages', 'vulnerabilities' or 'dashboard'",
                s
            )),
        }
    }
}

impl ViewKind {
    /// Reads the rows of this view and renders them as pretty JSON.
    /// `limit` caps each "most vulnerable" list of the dashboard.
    pub fn render<S: ScanStore>(&self, store: &S, limit: usize) -> Result<String> {
        let rendered = match self {
            ViewKind::Applications => {
                let rows: Vec<ApplicationViewRow> = store.application_views()?;
                serde_json::to_string_pretty(&rows)?
            }
            ViewKind::Resources => {
                let rows: Vec<ResourceViewRow> = store.resource_views()?;
                serde_json::to_string_pretty(&rows)?
            }
            ViewKind::Packages => {
                let rows: Vec<PackageViewRow> = store.package_views()?;
                serde_json::to_string_pretty(&rows)?
            }
            ViewKind::Vulnerabilities => {
                let rows: Vec<VulnerabilityViewRow> = store.vulnerability_views()?;
                serde_json::to_string_pretty(&rows)?
            }
            ViewKind::Dashboard => {
                let summary: DashboardSummary = store.dashboard(limit)?;
                serde_json::to_string_pretty(&summary)?
            }
        };
        Ok(rendered)
    }
}

/// Reconcile scan reports into a persistent application tree
#[derive(Parser, Debug)]
#[command(name = "scan-tree")]
#[command(version)]
#[command(about = "Reconcile scan reports into a persistent application tree", long_about = None)]
pub struct Args {
    /// Path to config file (defaults to auto-discovery of scan-tree.config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the config file)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Commit scan reports under one application, in the given order
    Ingest {
        /// Application name; created if it does not exist yet
        #[arg(short, long)]
        application: String,

        /// Application type: IMAGE, POD, DIRECTORY or FILE
        #[arg(short = 't', long = "type", default_value = "IMAGE")]
        application_type: ApplicationType,

        /// Application label. Can be specified multiple times
        #[arg(short, long = "label", value_name = "LABEL")]
        labels: Vec<String>,

        /// Application environment. Can be specified multiple times
        #[arg(short, long = "environment", value_name = "ENV")]
        environments: Vec<String>,

        /// Scan report files (JSON)
        #[arg(required = true, value_name = "REPORT")]
        reports: Vec<PathBuf>,
    },

    /// Commit every resource of the given reports on its own
    IngestResource {
        /// Scan report files (JSON)
        #[arg(required = true, value_name = "REPORT")]
        reports: Vec<PathBuf>,
    },

    /// Delete an application; its resources are kept
    DeleteApplication {
        /// Application name
        #[arg(short, long)]
        application: String,
    },

    /// Refresh all aggregate views now
    RefreshViews,

    /// Print aggregate view rows as JSON
    Views {
        /// View to print: applications, resources, packages, vulnerabilities or dashboard
        #[arg(short, long, default_value = "applications")]
        kind: ViewKind,

        /// Entries per "most vulnerable" list of the dashboard
        #[arg(short = 'n', long, default_value_t = DEFAULT_MOST_VULNERABLE_LIMIT)]
        limit: usize,
    },

    /// Run the view refresh scheduler until interrupted
    Watch,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
