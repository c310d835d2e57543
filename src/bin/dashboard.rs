//! Pageviews Dashboard Binary
//!
//! Re-runs the aggregation query and renders the ranking as a bar chart.
//!
//! Usage:
//!   cargo run --bin pageviews-dashboard                      # chart to stdout
//!   cargo run --bin pageviews-dashboard -- --json chart.json # also write JSON

use anyhow::Context;
use clap::Parser;
use pageviews_pipeline::config::Config;
use pageviews_pipeline::dashboard::BarChart;
use pageviews_pipeline::infra::sqlite_store::DirectConnector;
use pageviews_pipeline::logging;
use pageviews_pipeline::pipeline::top_companies;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pageviews-dashboard")]
#[command(about = "Render the pageviews ranking as a bar chart")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the chart as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Width of the longest bar in terminal cells
    #[arg(long, default_value_t = 40)]
    width: usize,
}

fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init_logging();
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;

    let store = DirectConnector::read_only(config.database_url()?);
    let ranking = top_companies(&store, config.top_n, None)?;
    let chart = BarChart::from_ranking("Pageviews Analysis", &ranking);

    match chart.headline() {
        Some(headline) => println!("{}", headline),
        None => eprintln!("⚠️  No pageviews loaded yet; run the pipeline first"),
    }
    println!();
    print!("{}", chart.render_text(args.width));

    if let Some(path) = args.json {
        fs::write(&path, chart.to_json()?)
            .with_context(|| format!("writing chart to {}", path.display()))?;
        eprintln!("📄 Saved chart to: {}", path.display());
    }
    Ok(())
}
