// Entry point of the Fitbit sheet sync tool.
//
// **Architecture Overview:**
// - `core/` = Business logic (row locator, sync run, config rules)
// - `infra/` = Implementations of core traits (Fitbit HTTP API, SQLite sheet, JSON files)
// - `settings.rs` = Paths and endpoints from the environment
//
// This file's job is to:
// 1. Parse the command line and set up logging
// 2. Load settings and the sync configuration
// 3. Wire services together (dependency injection)
// 4. Run the requested command

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
mod settings;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::config::{ConfigService, ConfigUpdate, SyncConfig};
use crate::core::fitbit::Period;
use crate::core::sheet::Sheet;
use crate::core::sync::{MetricOutcome, SyncService};
use crate::infra::config::JsonConfigStore;
use crate::infra::fitbit::{FitbitApiClient, FitbitOAuth, JsonTokenStore, DEFAULT_SCOPES};
use crate::infra::sheet::{InMemorySheet, SqliteSheet};
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "fitbit-sheet-sync")]
#[command(about = "Pull Fitbit time series into a date-ordered sheet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the Fitbit app credentials, metrics and lookback period
    Configure {
        /// OAuth 2.0 client id of your Fitbit app
        #[arg(long)]
        client_id: Option<String>,
        /// OAuth 2.0 client secret of your Fitbit app
        #[arg(long)]
        client_secret: Option<String>,
        /// Resources to fetch, comma-separated (e.g. activities/log/steps,body/weight)
        #[arg(long, value_delimiter = ',')]
        metrics: Option<Vec<String>>,
        /// Lookback period: 1d, 7d, 30d, 1w, 1m, 3m, 6m, 1y or max
        #[arg(long)]
        period: Option<Period>,
    },
    /// Authorize access to your Fitbit data
    Authorize {
        /// Code from the redirect URL after approving access
        #[arg(long)]
        code: Option<String>,
    },
    /// Fetch every configured metric and merge it into the sheet
    Refresh {
        /// Write into a throwaway in-memory sheet and print it instead
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the sheet
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env();
    tracing::debug!("Using data directory {}", settings.data_dir.display());

    match cli.command {
        Commands::Configure {
            client_id,
            client_secret,
            metrics,
            period,
        } => {
            let update = ConfigUpdate {
                client_id,
                client_secret,
                metrics,
                period,
            };
            configure(&settings, update).await
        }
        Commands::Authorize { code } => authorize(&settings, code).await,
        Commands::Refresh { dry_run } => refresh(&settings, dry_run).await,
        Commands::Show => show(&settings).await,
    }
}

/// Loads the sync config once for this run, with environment credentials on top.
async fn load_config(settings: &Settings) -> anyhow::Result<SyncConfig> {
    let service = ConfigService::new(JsonConfigStore::new(&settings.config_path));
    let config = service
        .load()
        .await
        .with_context(|| format!("Failed to read {}", settings.config_path.display()))?;

    Ok(config.with_credential_overrides(
        settings.client_id.clone(),
        settings.client_secret.clone(),
    ))
}

fn oauth(settings: &Settings, config: &SyncConfig) -> FitbitOAuth<JsonTokenStore> {
    FitbitOAuth::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        settings.oauth_endpoints(),
        JsonTokenStore::new(&settings.token_path),
    )
}

async fn open_sheet(settings: &Settings) -> anyhow::Result<SqliteSheet> {
    SqliteSheet::new(&settings.sheet_db.to_string_lossy(), &settings.sheet_name)
        .await
        .with_context(|| format!("Failed to open sheet at {}", settings.sheet_db.display()))
}

async fn configure(settings: &Settings, update: ConfigUpdate) -> anyhow::Result<()> {
    let service = ConfigService::new(JsonConfigStore::new(&settings.config_path));
    let config = service.configure(update).await?;

    println!("Configuration saved to {}", settings.config_path.display());
    let client_id = if config.client_id.is_empty() {
        "(not set)"
    } else {
        config.client_id.as_str()
    };
    println!("  client id: {}", client_id);
    println!("  period:    {}", config.period);
    println!("  metrics:");
    for metric in &config.metrics {
        println!("    - {}", metric);
    }
    Ok(())
}

async fn authorize(settings: &Settings, code: Option<String>) -> anyhow::Result<()> {
    let config = load_config(settings).await?;
    if !config.is_configured() {
        bail!("Set the client id and secret first with `fitbit-sheet-sync configure`");
    }
    let auth = oauth(settings, &config);

    match code {
        None => {
            let url = auth.authorization_url(&DEFAULT_SCOPES)?;
            println!("Open this URL, approve access, then run");
            println!("  fitbit-sheet-sync authorize --code <code from the redirect URL>");
            println!();
            println!("{}", url);
        }
        Some(code) => {
            let tokens = auth
                .exchange_code(&code)
                .await
                .context("Fitbit did not accept the authorization code")?;
            println!(
                "Authorized. Tokens saved to {} (valid until {})",
                settings.token_path.display(),
                tokens.expires_at
            );
        }
    }
    Ok(())
}

async fn refresh(settings: &Settings, dry_run: bool) -> anyhow::Result<()> {
    let config = load_config(settings).await?;
    let client = FitbitApiClient::new(&settings.api_base_url, oauth(settings, &config))?;

    if dry_run {
        let sheet = InMemorySheet::new();
        run_refresh(client, sheet.clone(), &config).await?;
        tracing::debug!("Dry run inserted {} rows", sheet.insertions());
        println!();
        return print_rows(&sheet).await;
    }

    let sheet = open_sheet(settings).await?;
    run_refresh(client, sheet, &config).await
}

async fn run_refresh<S: Sheet>(
    client: FitbitApiClient<JsonTokenStore>,
    sheet: S,
    config: &SyncConfig,
) -> anyhow::Result<()> {
    let service = SyncService::new(client, sheet);
    let report = service.refresh(config).await?;

    println!("Refreshed {} for {}", config.period, report.user);
    for outcome in &report.outcomes {
        match outcome {
            MetricOutcome::Written {
                metric,
                title,
                column,
                rows,
            } => println!(
                "  ok     {} -> column {} '{}' ({} rows)",
                metric, column, title, rows
            ),
            MetricOutcome::Failed { reason, .. } => {
                println!("  failed {}: {}", outcome.metric(), reason)
            }
        }
    }
    if report.failures() > 0 {
        tracing::warn!(
            "{} of {} metrics could not be refreshed",
            report.failures(),
            report.outcomes.len()
        );
    }
    Ok(())
}

async fn show(settings: &Settings) -> anyhow::Result<()> {
    let sheet = open_sheet(settings).await?;
    print_rows(&sheet).await
}

async fn print_rows<S: Sheet>(sheet: &S) -> anyhow::Result<()> {
    let rows = sheet.snapshot().await?;
    if rows.is_empty() {
        println!("The sheet is empty. Run `fitbit-sheet-sync refresh` first.");
        return Ok(());
    }

    for row in rows {
        let line: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
        println!("{}", line.join("\t"));
    }
    Ok(())
}
