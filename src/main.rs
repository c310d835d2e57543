use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pageviews_pipeline::app::ports::StoreConnector;
use pageviews_pipeline::config::Config;
use pageviews_pipeline::infra::http_client::ReqwestHttp;
use pageviews_pipeline::infra::sqlite_store::{DirectConnector, SharedConnector};
use pageviews_pipeline::pipeline::{
    extract_dump, fetch_dump, filter_pageviews, load_pageviews, top_companies, DumpHour,
    Extracted, Pipeline, WatchList,
};
use pageviews_pipeline::{logging, metrics};
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "pageviews_pipeline")]
#[command(about = "Download an hourly Wikipedia pageviews dump and rank watched companies")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./pageviews.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep one database connection open for the whole process instead of one per stage
    #[arg(long, global = true)]
    shared_connection: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fetch, extract, filter, load and analyze in order
    Run {
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download the compressed dump
    Fetch,
    /// Decompress the downloaded dump
    Extract,
    /// Filter the extracted dump down to the watch-list
    Filter,
    /// Load the filtered CSV into the pageviews table
    Load,
    /// Rank companies by their highest pageview count
    Analyze {
        /// Override the configured number of companies to report
        #[arg(long)]
        top: Option<usize>,
    },
}

fn build_connector(
    config: &Config,
    shared: bool,
    read_only: bool,
) -> anyhow::Result<Box<dyn StoreConnector>> {
    let url = config.database_url()?;
    if shared {
        Ok(Box::new(SharedConnector::open(url)?))
    } else if read_only {
        Ok(Box::new(DirectConnector::read_only(url)))
    } else {
        Ok(Box::new(DirectConnector::new(url)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Run { json } => {
            println!("🚀 Running pageviews pipeline...");
            let http = ReqwestHttp::new();
            let store = build_connector(&config, cli.shared_connection, false)?;

            let result = match Pipeline::new(&config, &http, store.as_ref()).run().await {
                Ok(result) => result,
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    println!("❌ Pipeline failed: {}", e);
                    return Err(e.into());
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("\n📊 Pipeline Results:");
                println!("   Rows filtered: {}", result.rows_filtered);
                println!("   Rows loaded: {}", result.rows_loaded);
                println!("   Duration: {:.2}s", result.duration_secs);
                for (rank, entry) in result.ranking.iter().enumerate() {
                    println!(
                        "   {}. {} ({} pageviews)",
                        rank + 1,
                        entry.company,
                        entry.max_pageviews
                    );
                }
            }
        }
        Commands::Fetch => {
            let http = ReqwestHttp::new();
            let path = fetch_dump(&http, &config.source_url, &config.download_path()).await?;
            println!("💾 Saved dump to {}", path.display());
        }
        Commands::Extract => {
            match extract_dump(&config.download_path(), &config.extracted_path())? {
                Extracted::Written(path) => println!("📦 Extracted to {}", path.display()),
                Extracted::SourceMissing(_) => {
                    bail!(
                        "nothing to extract: {} does not exist",
                        config.download_path().display()
                    )
                }
            }
        }
        Commands::Filter => {
            let watch_list = WatchList::new(&config.companies);
            let outcome =
                filter_pageviews(&watch_list, &config.extracted_path(), &config.filtered_path())?;
            println!(
                "🔧 Kept {} of {} lines in {}",
                outcome.rows.len(),
                outcome.lines_scanned,
                outcome.path.display()
            );
        }
        Commands::Load => {
            let store = build_connector(&config, cli.shared_connection, false)?;
            let rows = load_pageviews(store.as_ref(), &config.filtered_path())?;
            println!("✅ Loaded {} rows", rows);
        }
        Commands::Analyze { top } => {
            let store = build_connector(&config, cli.shared_connection, true)?;
            let top_n = top.unwrap_or(config.top_n).max(1);
            let dump_hour = DumpHour::from_url(&config.source_url);
            let ranking = top_companies(store.as_ref(), top_n, dump_hour.as_ref())?;
            for (rank, entry) in ranking.iter().enumerate() {
                println!("{}. {} {}", rank + 1, entry.company, entry.max_pageviews);
            }
        }
    }

    if let Some(snapshot) = metrics::render() {
        debug!("Metrics snapshot:\n{}", snapshot);
    }
    info!("done");
    Ok(())
}
