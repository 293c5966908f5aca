mod biolink;
mod bulk_writer;
mod config;
mod delta;
mod downloader;
mod errors;
mod graph;
mod model;
mod rrf;
mod transformer;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::fmt::format::FmtSpan;

use biolink::BiolinkMap;
use bulk_writer::BulkWriter;
use config::Config;
use delta::DeltaStrategy;
use downloader::{UmlsDownloader, UtsHttpDownloader};
use errors::Error;
use graph::{GraphClient, Neo4jClient};

/// The UMLS knowledge graph syncer
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a full UMLS release into bulk-importable CSVs
    FullImport {
        /// Directory containing MRCONSO.RRF, MRREL.RRF, MRSTY.RRF
        input_dir: PathBuf,

        /// Release version string, e.g. 2025AA
        #[arg(long)]
        version: String,

        /// Restrict to these source vocabularies (comma-separated); default is no filter
        #[arg(long, value_delimiter = ',')]
        sab_filter: Vec<String>,

        /// Directory the bulk-import CSVs are written to
        #[arg(long, default_value = "./import")]
        output_dir: PathBuf,

        /// Fetch the release from the UTS API if input_dir does not already exist
        #[arg(long, default_value_t = false)]
        download: bool,
    },

    /// Apply an incremental sync against a live graph database
    IncrementalSync {
        /// Directory containing MRCONSO.RRF, MRREL.RRF, MRSTY.RRF, DELETEDCUI.RRF, MERGEDCUI.RRF
        input_dir: PathBuf,

        /// Release version string, e.g. 2025AB
        #[arg(long)]
        version: String,

        /// Restrict to these source vocabularies (comma-separated); default is no filter
        #[arg(long, value_delimiter = ',')]
        sab_filter: Vec<String>,

        /// Override the configured upsert batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Force a rerun even if this version is already installed
        #[arg(long, default_value_t = false)]
        reapply: bool,

        /// Fetch the release from the UTS API if input_dir does not already exist
        #[arg(long, default_value_t = false)]
        download: bool,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::fmt().with_span_events(FmtSpan::CLOSE).with_target(false).init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    let started_at = chrono::Utc::now();

    match cli.command {
        Commands::FullImport { input_dir, version, sab_filter, output_dir, download } => {
            if !sab_filter.is_empty() {
                config.sab_filter = sab_filter;
            }
            ensure_input_available(&input_dir, &version, &config, download)?;

            let biolink = BiolinkMap::new();
            let snapshot = parse_and_transform(&input_dir, &version, &config, &biolink)?;

            let writer = BulkWriter::new(output_dir);
            let report = writer.write(&snapshot)?;
            info!(?report, started_at = %started_at.to_rfc3339(), "bulk CSVs ready");
            print_report_json(&report);
            println!("{}", writer.import_invocation(&config.neo4j_database));
        }

        Commands::IncrementalSync { input_dir, version, sab_filter, batch_size, reapply, download } => {
            if !sab_filter.is_empty() {
                config.sab_filter = sab_filter;
            }
            if let Some(batch_size) = batch_size {
                config.apoc_batch_size = batch_size;
            }
            ensure_input_available(&input_dir, &version, &config, download)?;

            let biolink = BiolinkMap::new();
            let snapshot = parse_and_transform(&input_dir, &version, &config, &biolink)?;

            let deleted = rrf::parse_deleted_cui(&input_dir.join("DELETEDCUI.RRF"), &config)?;
            let merged = rrf::parse_merged_cui(&input_dir.join("MERGEDCUI.RRF"), &config)?;

            let graph = Neo4jClient::connect(&config).await?;
            graph.ping().await?;

            let strategy = DeltaStrategy::new(&graph, &config);
            strategy.check_version_precondition(&version, reapply).await?;

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let report = strategy.run(&version, &deleted.records, &merged.records, &snapshot, &cancel).await?;
            let finished_at = chrono::Utc::now();
            info!(?report, started_at = %started_at.to_rfc3339(), finished_at = %finished_at.to_rfc3339(), "incremental sync complete");
            print_report_json(&report);
        }
    }

    Ok(())
}

fn print_report_json(report: &impl serde::Serialize) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::warn!(%err, "failed to serialize report as json"),
    }
}

/// If `input_dir` is missing and `download` was requested, attempts to fetch
/// the release via the UTS stub downloader; otherwise leaves the path as-is and
/// lets the parser surface a normal `io::Error` (spec §10).
fn ensure_input_available(input_dir: &std::path::Path, version: &str, config: &Config, download: bool) -> Result<(), Error> {
    if input_dir.exists() || !download {
        return Ok(());
    }

    let downloader = UtsHttpDownloader::new(config.umls_api_key.clone());
    downloader.fetch(version, input_dir)?;
    Ok(())
}

fn parse_and_transform(
    input_dir: &std::path::Path,
    version: &str,
    config: &Config,
    biolink: &BiolinkMap,
) -> Result<model::Snapshot, Error> {
    let spinner = utils::new_spinner("parsing MRCONSO.RRF");
    let mrconso = rrf::parse_mrconso(&input_dir.join("MRCONSO.RRF"), config)?;
    spinner.set_message("parsing MRREL.RRF");
    let mrrel = rrf::parse_mrrel(&input_dir.join("MRREL.RRF"), config)?;
    spinner.set_message("parsing MRSTY.RRF");
    let mrsty = rrf::parse_mrsty(&input_dir.join("MRSTY.RRF"), config)?;
    spinner.finish_with_message("parsed MRCONSO.RRF, MRREL.RRF, MRSTY.RRF");

    let totals = utils::new_spinner_totals("records transformed");
    let snapshot = transformer::transform(&mrconso.records, &mrrel.records, &mrsty.records, version, config, biolink);
    totals.set_position(snapshot.concepts.len() as u64);
    totals.finish();

    Ok(snapshot)
}
