use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use tidybank_core::{project_views, Resolver, ScriptedResolver};
use tidybank_import::{
    build_records, infer_roles, read_csv_file, CategoryEngine, InferenceOptions,
};
use tidybank_sheets::{write_view_csv, Locator, SheetsClient, SyncCoordinator, SyncOptions};

mod prompt;

#[derive(Parser, Debug)]
#[command(
    name = "tidybank",
    version,
    about = "Clean a bank CSV export and sync filtered views to Google Sheets"
)]
struct Cli {
    /// Path to the bank CSV export to process
    csv_file: PathBuf,

    /// Directory for local CSV snapshots of each view
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Field delimiter of the input file
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Target spreadsheet by exact id (fails if not found)
    #[arg(long, conflicts_with = "spreadsheet_name")]
    spreadsheet_id: Option<String>,

    /// Target spreadsheet by exact title (created when absent)
    #[arg(long)]
    spreadsheet_name: Option<String>,

    /// TOML file with categorization rules (built-in defaults when omitted)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Clean and snapshot only, skip the remote sync
    #[arg(long)]
    skip_upload: bool,

    /// Overwrite existing sheet data
    #[arg(long, conflicts_with = "append")]
    overwrite: bool,

    /// Append below existing sheet data
    #[arg(long)]
    append: bool,

    /// File holding a Google OAuth access token (or set TIDYBANK_TOKEN)
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Never prompt; skip unresolved roles and overwrite on conflicts
    #[arg(long)]
    non_interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    if !cli.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }

    let table = read_csv_file(&cli.csv_file, cli.delimiter as u8)
        .with_context(|| format!("reading {}", cli.csv_file.display()))?;
    tracing::info!(
        rows = table.rows.len(),
        columns = table.column_count(),
        "loaded input"
    );

    let engine = match &cli.rules {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading rules {}", path.display()))?;
            CategoryEngine::from_toml(&content).map_err(|e| anyhow::anyhow!(e))?
        }
        None => CategoryEngine::default(),
    };

    let mut resolver: Box<dyn Resolver> = if cli.non_interactive {
        Box::new(ScriptedResolver::unattended())
    } else {
        Box::new(prompt::StdinResolver)
    };

    let inference = InferenceOptions::default();
    let roles = infer_roles(&table, &inference, resolver.as_mut())
        .context("schema inference failed")?;

    let output = build_records(
        &table,
        &roles,
        &engine,
        &inference.amount_opts,
        &inference.date_opts,
    )?;

    for rejected in &output.summary.rejected {
        tracing::warn!(
            row = rejected.row_index,
            raw = %rejected.raw_amount,
            "row rejected: unparseable amount"
        );
    }
    if output.summary.unparseable_dates > 0 {
        tracing::warn!(
            count = output.summary.unparseable_dates,
            "rows kept with null dates"
        );
    }
    if output.records.is_empty() {
        bail!("no valid rows after cleaning");
    }
    println!(
        "Cleaned {} of {} rows ({} rejected)",
        output.summary.accepted,
        output.summary.input_rows,
        output.summary.rejected.len()
    );

    let merchants = engine.merchant_labels();
    let views = project_views(&output.records, &merchants);

    for view in &views {
        let path = write_view_csv(&cli.output_dir, view, &output.records)?;
        println!("  {} - {} rows -> {}", view.kind.sheet_name(), view.len(), path.display());
    }

    if cli.skip_upload {
        println!("Skipping upload; snapshots are in {}", cli.output_dir.display());
        return Ok(());
    }

    let token = load_token(&cli)?;
    let client = SheetsClient::new(token);
    let target = cli
        .spreadsheet_id
        .clone()
        .map(Locator::ById)
        .or_else(|| cli.spreadsheet_name.clone().map(Locator::ByName));
    let overwrite = if cli.overwrite {
        Some(true)
    } else if cli.append {
        Some(false)
    } else if cli.non_interactive {
        Some(true)
    } else {
        None
    };
    let options = SyncOptions {
        target,
        overwrite,
        ..SyncOptions::default()
    };

    let coordinator = SyncCoordinator::new(&client, options);
    let report = coordinator
        .sync(&views, &output.records, resolver.as_mut())
        .await
        .context("sync aborted")?;

    println!("\nSpreadsheet: {}", report.url);
    let mut failures = 0;
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("  {} - {} rows uploaded", outcome.view, outcome.rows_written),
            Some((step, cause)) => {
                failures += 1;
                println!("  {} - failed at {step}: {cause}", outcome.view);
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} views failed to sync", report.outcomes.len());
    }
    Ok(())
}

fn load_token(cli: &Cli) -> Result<String> {
    if let Some(path) = &cli.token_file {
        return Ok(std::fs::read_to_string(path)
            .with_context(|| format!("reading token {}", path.display()))?
            .trim()
            .to_string());
    }
    std::env::var("TIDYBANK_TOKEN")
        .map(|t| t.trim().to_string())
        .context("no access token: pass --token-file or set TIDYBANK_TOKEN")
}
