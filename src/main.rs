mod cli;
mod config;

use anyhow::Context;
use cli::{Args, Command};
use config::Settings;
use scan_tree::adapters::outbound::console::StderrProgressReporter;
use scan_tree::adapters::outbound::filesystem::FileSystemReportReader;
use scan_tree::adapters::outbound::sqlite::SqliteScanStore;
use scan_tree::application::dto::{IngestRequest, IngestResponse};
use scan_tree::application::use_cases::{
    IngestReportsUseCase, ManageApplicationsUseCase, ReconcileScanUseCase,
};
use scan_tree::application::view_maintenance::{ViewDirtyFlag, ViewRefreshScheduler};
use scan_tree::reconciliation::domain::{ApplicationId, ApplicationInfo};
use scan_tree::shared::error::ExitCode;
use scan_tree::shared::security::validate_database_path;
use scan_tree::shared::Result;
use std::future::Future;
use std::io::IsTerminal;
use std::process;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "warn";

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    if let Err(e) = run(args).await {
        eprintln!("\n❌ An error occurred:\n");
        eprintln!("{}", e);

        // Display error chain
        for cause in e.chain().skip(1) {
            eprintln!("\nCaused by: {}", cause);
        }

        eprintln!();
        process::exit(ExitCode::for_error(&e).as_i32());
    }
}

async fn run(args: Args) -> Result<()> {
    // Load config: explicit path or auto-discovery in the working directory
    let config_file = match &args.config {
        Some(path) => Some(config::load_config_from_path(path)?),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            config::discover_config(&cwd)?
        }
    };

    init_tracing(
        args.verbose,
        config_file.as_ref().and_then(|c| c.log_level.as_deref()),
    );
    if let Some(config_file) = &config_file {
        config::warn_unknown_fields(config_file);
    }

    let settings = Settings::resolve(config_file, args.database);
    validate_database_path(&settings.database_path)?;

    // Create adapters (Dependency Injection)
    let store = Arc::new(SqliteScanStore::open(
        &settings.database_path,
        settings.busy_timeout,
    )?);
    let views = Arc::new(ViewDirtyFlag::new());
    let scheduler = || {
        ViewRefreshScheduler::new(Arc::clone(&store), Arc::clone(&views))
            .with_interval(settings.view_refresh_interval)
    };

    match args.command {
        Command::Ingest {
            application,
            application_type,
            labels,
            environments,
            reports,
        } => {
            let info = ApplicationInfo::new(application, application_type)
                .with_labels(labels)
                .with_environments(environments);
            let use_case = ingest_use_case(&store, &views);

            let response = with_background_refresh(scheduler(), async {
                use_case.execute(IngestRequest::new(info, reports)).await
            })
            .await?;
            log_ingest(&response);
        }
        Command::IngestResource { reports } => {
            let use_case = ingest_use_case(&store, &views);

            let response = with_background_refresh(scheduler(), async {
                use_case.execute_per_resource(&reports).await
            })
            .await?;
            log_ingest(&response);
        }
        Command::DeleteApplication { application } => {
            let catalog = ManageApplicationsUseCase::new(Arc::clone(&store), Arc::clone(&views));
            let id = ApplicationId::from_name(&application);
            catalog.delete_application(id)?;
            eprintln!("🗑️  Deleted application {} ({})", application, id);
            scheduler().refresh_if_dirty().await?;
        }
        Command::RefreshViews => {
            scheduler().refresh_all().await?;
            eprintln!("✅ Aggregate views refreshed");
        }
        Command::Views { kind, limit } => {
            let output = kind.render(store.as_ref(), limit)?;
            println!("{}", output);
        }
        Command::Watch => {
            eprintln!(
                "👀 Refreshing aggregate views every {}s (Ctrl-C to stop)",
                settings.view_refresh_interval.as_secs()
            );
            scheduler()
                .run_until(async {
                    // A failed signal handler install falls back to running until a refresh fails
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
        }
    }

    Ok(())
}

type CliIngestUseCase = IngestReportsUseCase<
    FileSystemReportReader,
    StderrProgressReporter,
    ReconcileScanUseCase<SqliteScanStore>,
    SqliteScanStore,
>;

fn ingest_use_case(store: &Arc<SqliteScanStore>, views: &Arc<ViewDirtyFlag>) -> CliIngestUseCase {
    IngestReportsUseCase::new(
        FileSystemReportReader::new(),
        StderrProgressReporter::new(),
        ReconcileScanUseCase::new(Arc::clone(store), Arc::clone(views)),
        ManageApplicationsUseCase::new(Arc::clone(store), Arc::clone(views)),
    )
}

/// Runs `work` while the refresh scheduler ticks in the background, then
/// stops the scheduler and flushes whatever `work` left dirty. A refresh
/// failure wins over the result of `work`.
async fn with_background_refresh<T, F>(
    scheduler: ViewRefreshScheduler<SqliteScanStore>,
    work: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(scheduler.run_until(async {
        let _ = stopped.await;
    }));

    let result = work.await;

    // The receiver is gone only if the scheduler already stopped on a failure
    let _ = stop.send(());
    handle
        .await
        .context("view refresh scheduler panicked")??;
    result
}

fn log_ingest(response: &IngestResponse) {
    info!(
        reports = response.reports_committed,
        resources = response.resources,
        packages = response.packages,
        vulnerabilities = response.vulnerabilities,
        "ingestion finished"
    );
}

fn init_tracing(verbose: u8, config_level: Option<&str>) {
    let level = match verbose {
        0 => config_level.unwrap_or(DEFAULT_LOG_LEVEL),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Ignore a second initialisation; the first subscriber stays in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_tree::ports::outbound::ScanStore;
    use scan_tree::reconciliation::domain::ApplicationType;
    use scan_tree::shared::error::ReconcileError;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> Arc<SqliteScanStore> {
        Arc::new(SqliteScanStore::open(dir.path().join("scan.db"), Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn test_background_refresh_flushes_on_completion() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let views = Arc::new(ViewDirtyFlag::new());
        let catalog = ManageApplicationsUseCase::new(Arc::clone(&store), Arc::clone(&views));
        let scheduler = ViewRefreshScheduler::new(Arc::clone(&store), Arc::clone(&views))
            .with_interval(Duration::from_secs(3600));

        with_background_refresh(scheduler, async {
            catalog.create_application(ApplicationInfo::new("shop", ApplicationType::Image))
        })
        .await
        .unwrap();

        assert!(!views.is_dirty());
        let rows = store.application_views().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "shop");
    }

    #[tokio::test]
    async fn test_background_refresh_returns_work_error() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let views = Arc::new(ViewDirtyFlag::new());
        let catalog = ManageApplicationsUseCase::new(Arc::clone(&store), Arc::clone(&views));
        let scheduler = ViewRefreshScheduler::new(Arc::clone(&store), Arc::clone(&views));

        let err = with_background_refresh(scheduler, async {
            catalog.delete_application(ApplicationId::from_name("missing"))
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::NotFound { .. })
        ));
        assert_eq!(ExitCode::for_error(&err), ExitCode::ClientError);
    }
}
