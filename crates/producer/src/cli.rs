use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::account::{Account, AccountStore, InitOutcome};
use crate::config::{CliOverrides, ProducerConfig};
use crate::funding::{fund_accounts, units_to_wei, DEFAULT_FUNDING_AMOUNT};
use crate::generate::{GenerationPlan, RpcMethod};
use crate::output::{write_records, OutputFormat};
use crate::rpc::{ChainEndpoint, JsonRpcClient};
use crate::session::Session;

/// Synthetic JSON-RPC workload generator for Ethereum-compatible endpoints
#[derive(Parser, Debug)]
#[command(name = "data-producer")]
#[command(about = "Create funded accounts and generate JSON-RPC request files for stress tests")]
#[command(version)]
pub struct Cli {
    /// JSON-RPC endpoint URL
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Configuration file (defaults to <data dir>/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum number of worker threads
    #[arg(long, global = true)]
    pub parallelism: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local account pool
    Init(InitArgs),
    /// Account balance operations
    Balance {
        #[command(subcommand)]
        command: BalanceCommands,
    },
    /// Generate a request file for one RPC method
    Generate(GenerateArgs),
}

#[derive(Subcommand, Debug)]
pub enum BalanceCommands {
    /// Fund every stored account from the admin account
    Init(BalanceInitArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Number of accounts (defaults to the configured maximum)
    #[arg(long)]
    pub quantity: Option<usize>,
}

#[derive(Args, Debug)]
pub struct BalanceInitArgs {
    /// Native units sent to each account
    #[arg(long, default_value_t = DEFAULT_FUNDING_AMOUNT)]
    pub amount: u64,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of request records (defaults to the configured maximum)
    #[arg(long)]
    pub quantity: Option<usize>,

    /// Output file format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Directory the request file is written to
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// JSON-RPC method to generate requests for
    #[arg(value_enum)]
    pub method: RpcMethod,
}

pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<()> {
    let Cli {
        url,
        config,
        parallelism,
        command,
    } = cli;

    let mut overrides = CliOverrides {
        url,
        parallelism,
        ..CliOverrides::default()
    };
    if let Commands::Generate(args) = &command {
        overrides.output_dir = args.out_dir.clone();
        overrides.format = args.format;
    }
    let config =
        ProducerConfig::load(config.as_deref(), &overrides).context("loading configuration")?;

    match command {
        Commands::Init(args) => handle_init(&config, args),
        Commands::Balance {
            command: BalanceCommands::Init(args),
        } => handle_balance_init(&config, args),
        Commands::Generate(args) => handle_generate(&config, args, connect),
    }
}

fn connect(config: &ProducerConfig) -> Result<Session> {
    let client = JsonRpcClient::dial(&config.url)
        .with_context(|| format!("connecting to {}", config.url))?;
    let endpoint: Arc<dyn ChainEndpoint> = Arc::new(client);
    let admin = Account::from_hex(&config.admin_private_key).context("parsing admin key")?;
    let session = Session::connect(endpoint, admin, config.retry_policy())
        .context("initializing session")?;
    Ok(session)
}

fn load_accounts(config: &ProducerConfig) -> Result<Vec<String>> {
    let store = AccountStore::new(&config.data_dir);
    store
        .load()
        .with_context(|| format!("loading accounts from {}", store.path().display()))
}

fn handle_init(config: &ProducerConfig, args: InitArgs) -> Result<()> {
    let quantity = args.quantity.unwrap_or(config.max_quantity);
    let store = AccountStore::new(&config.data_dir);
    let outcome = store
        .ensure(quantity, &config.worker_pool())
        .context("initializing accounts")?;

    match outcome {
        InitOutcome::Reused { count } => {
            println!("✅ {count} accounts already initialized");
        }
        InitOutcome::Generated { requested, written } => {
            println!("✅ Generated {written} of {requested} accounts");
        }
    }
    println!("   File: {}", store.path().display());
    Ok(())
}

fn handle_balance_init(config: &ProducerConfig, args: BalanceInitArgs) -> Result<()> {
    let accounts = load_accounts(config)?;
    let value = units_to_wei(args.amount)?;
    let session = connect(config)?;

    let outcome = fund_accounts(&session, &accounts, value, &config.worker_pool());
    if !outcome.is_complete() {
        warn!(missing = outcome.missing(), "some accounts were not funded");
    }
    println!(
        "✅ Funded {} of {} accounts with {} units each",
        outcome.completed, outcome.requested, args.amount
    );
    Ok(())
}

/// `connect` runs only after the plan has been validated.
fn handle_generate<C>(config: &ProducerConfig, args: GenerateArgs, connect: C) -> Result<()>
where
    C: FnOnce(&ProducerConfig) -> Result<Session>,
{
    let quantity = args.quantity.unwrap_or(config.max_quantity);
    let accounts = load_accounts(config)?;
    let plan = GenerationPlan::new(args.method, quantity, &accounts, config.max_quantity)?;
    let session = connect(config)?;

    let outcome = plan
        .execute(&session, &config.worker_pool(), &config.generation_settings())
        .with_context(|| format!("preparing {} requests", plan.method()))?;
    let path = write_records(
        &config.output_dir,
        plan.method().as_str(),
        &outcome.output,
        config.format,
    )
    .context("writing request file")?;

    if !outcome.is_complete() {
        warn!(
            missing = outcome.missing(),
            "request file is partial, see errors above"
        );
    }
    println!(
        "✅ Generated {} of {} {} requests",
        outcome.completed,
        outcome.requested,
        plan.method()
    );
    println!("   File: {}", path.display());
    Ok(())
}
