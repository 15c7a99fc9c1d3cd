use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, anyhow, bail};
use clap::Parser;
use rudis_import::{
    config::{Config, MediaStorage},
    import::Importer,
    media::{DisabledMedia, HttpMediaResolver, LocalDirStore, MediaResolver},
    progress::{NullReporter, ProgressReporter, create_reporter},
    repository::sqlite::LocalDatabase,
};
use tracing::{error, info};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "RUDIS_IMPORT_CONFIG")]
    config: Option<PathBuf>,
    #[clap(
        short,
        long,
        env = "RUDIS_IMPORT_DATABASE",
        default_value = "sqlite://import.db?mode=rwc"
    )]
    database: String,
    /// Print the import report as JSON on stdout
    #[clap(long)]
    json: bool,
    /// Skip featured image downloads
    #[clap(long)]
    no_media: bool,
    /// CSV file to import
    csv: PathBuf,
}

async fn import<M: MediaResolver>(
    opts: &Opts,
    config: &Config,
    db: &LocalDatabase,
    media: M,
) -> anyhow::Result<()> {
    let reporter: Arc<dyn ProgressReporter> = if opts.json {
        Arc::new(NullReporter)
    } else {
        create_reporter()
    };
    let importer = Importer::new(config, db.repository(), media).with_reporter(reporter.clone());
    let report = importer
        .import_file(&opts.csv)
        .await
        .with_context(|| format!("import {}", opts.csv.display()))?;
    reporter.finish();
    info!(
        succeeded = report.succeeded(),
        failed = report.failed,
        warnings = report.warnings,
        csv = %opts.csv.display(),
        "import done"
    );
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if report.failed > 0 {
        bail!(
            "{} of {} rows failed ({} imported)",
            report.failed,
            report.total,
            report.succeeded()
        );
    }
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = match &opts.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    config.validate().map_err(|msg| anyhow!("{msg}"))?;

    let db = LocalDatabase::open(&opts.database)
        .await
        .with_context(|| format!("open database {}", opts.database))?;
    info!(database = %opts.database, "opened database");

    let timeout = Duration::from_secs(config.media.timeout_secs);
    if opts.no_media {
        return import(&opts, &config, &db, DisabledMedia).await;
    }
    match &config.media.storage {
        MediaStorage::Asset { dir } => {
            let media = HttpMediaResolver::new(LocalDirStore::new(dir), timeout)
                .with_context(|| "build HTTP client")?;
            import(&opts, &config, &db, media).await
        }
        MediaStorage::Database => {
            let media = HttpMediaResolver::new(db.asset_client(), timeout)
                .with_context(|| "build HTTP client")?;
            import(&opts, &config, &db, media).await
        }
    }
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
