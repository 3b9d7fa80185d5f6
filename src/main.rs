//! Topic-Harvest main entry point
//!
//! This is the command-line interface for the Topic-Harvest archive harvester.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use topic_harvest::config::{load_config_with_hash, resolve_token, Config};
use topic_harvest::crawler::{archive_file_name, run_harvest};
use topic_harvest::window::TopLevelWindows;
use tracing_subscriber::EnvFilter;

/// Topic-Harvest: a date-partitioned repository archive harvester
///
/// Topic-Harvest finds every GitHub repository tagged with a topic and created
/// within a date range, splitting the range so no search exceeds the API's
/// result cap, and downloads a source archive for each repository it finds.
#[derive(Parser, Debug)]
#[command(name = "topic-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A date-partitioned repository archive harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the harvest plan without sending any request
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Regenerate the markdown summary from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("topic_harvest=info,warn"),
            1 => EnvFilter::new("topic_harvest=debug,info"),
            2 => EnvFilter::new("topic_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the windows and paths a run would use
fn handle_dry_run(config: &Config) {
    println!("=== Topic-Harvest Dry Run ===\n");

    println!("Search:");
    println!("  Topic: {}", config.search.topic);
    println!("  API: {}", config.search.api_base_url);
    println!("  Page size: {}", config.search.per_page);
    println!("  Result cap per query: {}", config.search.max_results);
    println!("  Delay between pages: {}ms", config.search.page_delay_ms);
    println!("  Topic policy: {:?}", config.search.topic_policy);

    println!("\nRate limiting:");
    println!("  Reset margin: {}s", config.rate_limit.reset_margin_secs);
    println!("  Max attempts: {}", config.rate_limit.max_retries);
    println!(
        "  Backoff: {}ms x{}",
        config.rate_limit.initial_backoff_ms, config.rate_limit.backoff_multiplier
    );

    println!("\nArchives:");
    println!("  Directory: {}", config.archive.output_dir);
    println!("  Fallback branch: {}", config.archive.default_branch);
    println!("  Skip existing: {}", config.archive.skip_existing);
    println!("  Concurrency: {}", config.archive.concurrency);
    println!(
        "  Example name: {}",
        archive_file_name("owner/repository", &config.archive.default_branch)
    );

    println!("\nOutput:");
    println!("  Records: {}", config.output.records_path);
    println!("  Summary: {}", config.output.summary_path);
    if let Some(path) = &config.output.markdown_path {
        println!("  Markdown: {}", path);
    }
    if let Some(path) = &config.output.database_path {
        println!("  Database: {}", path);
    }

    let windows: Vec<_> =
        TopLevelWindows::new(config.window.start, config.window.finish, config.window.days)
            .collect();
    println!(
        "\nTop-level windows ({} of up to {} days):",
        windows.len(),
        config.window.days
    );
    for window in &windows {
        println!("  - {} ({} days)", window, window.days());
    }

    println!("\n✓ Configuration is valid");
    println!("  Token variable: {}", config.auth.token_env);
}

fn database_path(config: &Config) -> anyhow::Result<&Path> {
    match &config.output.database_path {
        Some(path) => Ok(Path::new(path)),
        None => bail!("no database configured: set output.database-path"),
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use topic_harvest::output::{load_statistics, print_statistics};
    use topic_harvest::storage::open_storage;

    let path = database_path(config)?;
    println!("Database: {}\n", path.display());

    let storage = open_storage(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: regenerates the markdown summary
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    use topic_harvest::output::export_summary;
    use topic_harvest::storage::open_storage;

    let path = database_path(config)?;
    let output = match &config.output.markdown_path {
        Some(output) => PathBuf::from(output),
        None => bail!("no markdown summary configured: set output.markdown-path"),
    };

    println!("=== Exporting Harvest Summary ===\n");
    println!("Database: {}", path.display());
    println!("Output: {}", output.display());
    println!();

    let storage = open_storage(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    let summary = export_summary(&storage, &output)?;

    println!(
        "✓ Summary of run {} ({} periods) exported to: {}",
        summary.run_id.unwrap_or_default(),
        summary.periods.len(),
        output.display()
    );

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String) -> anyhow::Result<()> {
    let token = resolve_token(&config.auth.token_env)?;

    tracing::info!(
        "Harvesting topic '{}' from {} to {} in windows of {} days",
        config.search.topic,
        config.window.start,
        config.window.finish,
        config.window.days
    );

    let periods = run_harvest(config, config_hash, &token)
        .await
        .context("harvest failed")?;

    let downloaded: u64 = periods.iter().map(|p| p.downloaded).sum();
    let failed: u64 = periods.iter().map(|p| p.failed).sum();
    tracing::info!(
        "DONE. Total downloaded={}, failed={} over {} periods",
        downloaded,
        failed,
        periods.len()
    );

    Ok(())
}
