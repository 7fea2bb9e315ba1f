//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use tokenlist_chain::{
    BadgeReader, ContractReader, CurateSubgraph, EnsUpdater, T2crTokens, connect,
    connect_with_signer, parse_signer,
};
use tokenlist_core::assembler::ListHeader;
use tokenlist_core::pipeline::{
    Adapters, PipelineConfig, ProgressReporter, RunOutcome, RunReport, run_pipeline,
};
use tokenlist_core::publisher::Publisher;
use tokenlist_core::sources::{BlobSource, CurateRegistry, NoPreviousList, PreviousListSource};
use tokenlist_core::validation::validate_list;
use tokenlist_core::versioning::diff_tokens;
use tokenlist_publish::{
    Estuary, GatewayReader, IpfsGateway, ListLocation, Pinata, RetryPolicy, http_client,
};
use tokenlist_shared::{
    AppConfig, RunMode, TokenKey, TokenListError, VersionedList, cache_path, format_timestamp,
    init_config, load_config, load_config_from, resolve_secret, validate_config,
};
use tokenlist_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// tokenlist: reconcile, version and publish the curated token list.
#[derive(Parser)]
#[command(
    name = "tokenlist",
    version,
    about = "Build the curated token list from the on-chain registry and publish new versions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.tokenlist/tokenlist.toml).
    #[arg(long, global = true, env = "TOKENLIST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the list and publish it if its version changed.
    Run {
        /// Build, validate and write the list without publishing.
        #[arg(long)]
        dry_run: bool,

        /// First publication: version 1.0.0 with no previous list to compare.
        #[arg(long)]
        initial: bool,

        /// Write the document here (overrides list.output_path).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what changed between two list files and the version it implies.
    Diff {
        /// Previously published list.
        previous: PathBuf,
        /// Candidate list.
        next: PathBuf,
    },

    /// Check a list file against the token list schema.
    Validate {
        file: PathBuf,
    },

    /// Show recorded publications, newest first.
    History {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "tokenlist=info",
        1 => "tokenlist=debug",
        _ => "tokenlist=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            dry_run,
            initial,
            output,
        } => cmd_run(config_path, dry_run, initial, output).await,
        Command::Diff { previous, next } => cmd_diff(&previous, &next),
        Command::Validate { file } => cmd_validate(&file),
        Command::History { limit } => cmd_history(config_path, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    Ok(match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn read_list(path: &Path) -> Result<VersionedList> {
    let raw = std::fs::read_to_string(path).map_err(|e| TokenListError::io(path, e))?;
    Ok(VersionedList::from_json(&raw)?)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    dry_run: bool,
    initial: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load(config_path)?;
    let mode = if dry_run {
        RunMode::DryRun
    } else if initial {
        RunMode::Initial
    } else {
        RunMode::Update
    };
    validate_config(&config, mode)?;

    let (Some(view), Some(registry)) = (config.chain.tokens_view_address, config.chain.t2cr_address)
    else {
        return Err(eyre!("chain contracts are not configured"));
    };

    // --- Chain side ---
    let provider = connect(&config.chain.provider_url, config.chain.timeout_secs)?;
    let tokens = T2crTokens::new(provider.clone(), view, registry, config.chain.page_size);
    let probe = ContractReader::new(provider.clone());
    let badges = BadgeReader::new(provider.clone());
    let curate = match (&config.curate.subgraph_url, config.curate.registry_address) {
        (Some(url), Some(address)) => {
            Some(CurateSubgraph::new(url, address, config.chain.timeout_secs)?)
        }
        _ => None,
    };

    // --- Publish side ---
    let client = http_client(config.publish.timeout_secs)?;
    let gateway = IpfsGateway::new(client.clone(), &config.publish.ipfs_gateway);
    let estuary = match &config.publish.estuary_base_url {
        Some(url) => Some(Estuary::new(
            client.clone(),
            url,
            resolve_secret(&config.publish.estuary_api_key_env)?,
        )),
        None => None,
    };
    let pinata = match &config.publish.pinata_url {
        Some(url) => Some(Pinata::new(
            client.clone(),
            url,
            resolve_secret(&config.publish.pinata_api_key_env)?,
            resolve_secret(&config.publish.pinata_secret_api_key_env)?,
        )),
        None => None,
    };
    // Dry runs update no name and need no wallet key.
    let ens = match &config.ens.list_name {
        Some(name) if config.ens.enabled && !dry_run => {
            let signer = parse_signer(&resolve_secret(&config.ens.wallet_key_env)?)?;
            let manager = signer.address();
            let provider = connect_with_signer(
                &config.chain.provider_url,
                config.chain.timeout_secs,
                signer,
            )?;
            Some((
                name.clone(),
                EnsUpdater::new(provider, config.ens.registry_address, manager),
            ))
        }
        _ => None,
    };
    // An initial publication has nothing to compare against yet.
    let previous_location = config
        .list
        .latest_list_url
        .as_deref()
        .filter(|_| !initial)
        .map(|location| ListLocation::new(client.clone(), location));
    let logo_reader = config
        .list
        .mirror_logos
        .then(|| GatewayReader::new(client.clone(), &config.list.logo_gateway));

    let storage = if config.cache.disabled {
        None
    } else {
        match Storage::open(&cache_path(&config)?).await {
            Ok(storage) => Some(storage),
            Err(e) => {
                warn!(error = %e, "cache unavailable, continuing without it");
                None
            }
        }
    };

    let policy = RetryPolicy::from(&config.publish.retry);
    let mut publisher = Publisher::new(policy).with_store("ipfs", &gateway);
    if let Some(estuary) = &estuary {
        publisher = publisher.with_store("estuary", estuary);
    }
    if let Some(pinata) = &pinata {
        publisher = publisher.with_pin(pinata);
    }
    if let Some((name, updater)) = &ens {
        publisher = publisher.with_name(name.clone(), updater);
    }

    let previous: &dyn PreviousListSource = match &previous_location {
        Some(location) => location,
        None => &NoPreviousList,
    };
    let adapters = Adapters {
        tokens: &tokens,
        probe: &probe,
        curate: curate.as_ref().map(|c| c as &dyn CurateRegistry),
        badges: &badges,
        previous,
        blobs: logo_reader.as_ref().map(|r| r as &dyn BlobSource),
        publisher: &publisher,
        storage: storage.as_ref(),
    };

    let pipeline_config = PipelineConfig {
        chain_id: config.chain.chain_id,
        header: ListHeader::from_config(&config.list, &config.badges),
        file_name: config.list.file_name.clone(),
        badges: config.badges.clone(),
        output_path: output.or_else(|| config.list.output_path.as_ref().map(PathBuf::from)),
        dry_run,
        initial,
        timestamp: format_timestamp(Utc::now()),
        mirror_logos: config.list.mirror_logos,
        retry: policy,
    };

    info!(
        chain_id = pipeline_config.chain_id,
        channels = %publisher.channels().collect::<Vec<_>>().join(","),
        dry_run,
        initial,
        "starting run"
    );

    let reporter = CliProgress::new();
    let report = run_pipeline(&pipeline_config, &adapters, &reporter).await?;
    print_report(&report, &config.publish.ipfs_gateway);

    Ok(())
}

fn print_report(report: &RunReport, gateway: &str) {
    let stats = &report.stats;
    let previous = report
        .previous_version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".into());

    println!();
    match &report.outcome {
        RunOutcome::Unchanged => println!("  List unchanged at {}", report.version),
        RunOutcome::DryRun { rendered } => {
            println!("  Dry run: would publish {}", report.version);
            println!("  SHA-256:   {}", rendered.sha256);
        }
        RunOutcome::Published { rendered, receipt } => {
            println!("  Published {}", report.version);
            println!("  CID:       {} (via {})", receipt.content_id, receipt.channel);
            println!("  URL:       {gateway}/ipfs/{}", receipt.content_id);
            println!("  SHA-256:   {}", rendered.sha256);
            if let Some(name) = &receipt.pointer {
                println!("  ENS:       {name}");
            }
        }
    }
    println!("  Previous:  {previous} ({} bump)", report.bump);
    println!(
        "  Changes:   +{} ~{} -{}",
        report.diff.added.len(),
        report.diff.changed.len(),
        report.diff.removed.len()
    );
    println!(
        "  Tokens:    {} raw, {} unique, {} listed",
        stats.raw, stats.deduplicated, stats.listed
    );
    println!(
        "  Decimals:  {} direct, {} curated, {} NFTs, {} dropped",
        stats.direct, stats.curated, stats.reclassified, stats.unresolved
    );
    println!("  Invalid:   {}", stats.invalid);
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn token_resolved(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Resolving decimals [{current}/{total}]"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// diff / validate
// ---------------------------------------------------------------------------

fn cmd_diff(previous: &Path, next: &Path) -> Result<()> {
    let before = read_list(previous)?;
    let after = read_list(next)?;

    let diff = diff_tokens(&before.tokens, &after.tokens, &[]);
    let implied = diff.bump().apply(before.version)?;

    let name_of = |list: &VersionedList, key: TokenKey| {
        list.tokens
            .iter()
            .find(|t| t.key() == key)
            .map(|t| t.symbol.clone())
            .unwrap_or_default()
    };

    for key in &diff.added {
        println!("+ {key} {}", name_of(&after, *key));
    }
    for key in &diff.changed {
        println!("~ {key} {}", name_of(&after, *key));
    }
    for key in &diff.removed {
        println!("- {key} {}", name_of(&before, *key));
    }

    println!();
    println!("  {} -> {} ({} bump)", before.version, implied, diff.bump());
    if after.version != implied {
        println!("  Note: {} declares version {}", next.display(), after.version);
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let list = read_list(file)?;
    match validate_list(&list) {
        Ok(()) => {
            println!(
                "{} is valid ({} tokens, version {})",
                file.display(),
                list.tokens.len(),
                list.version
            );
            Ok(())
        }
        Err(TokenListError::Schema { errors }) => {
            for error in &errors {
                println!("  {error}");
            }
            Err(eyre!("{} has {} schema violation(s)", file.display(), errors.len()))
        }
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// history / config
// ---------------------------------------------------------------------------

async fn cmd_history(config_path: Option<&Path>, limit: u32) -> Result<()> {
    let config = load(config_path)?;
    let path = cache_path(&config)?;
    if !path.exists() {
        println!("No publications recorded yet.");
        return Ok(());
    }

    let storage = Storage::open_readonly(&path).await?;
    let list_name = ListHeader::from_config(&config.list, &config.badges).name;
    let records = storage.list_publications(&list_name, limit).await?;

    if records.is_empty() {
        println!("No publications recorded for {list_name}.");
        return Ok(());
    }

    println!("{:<10} {:<26} {:>7}  {}", "VERSION", "PUBLISHED", "TOKENS", "CID");
    for record in records {
        println!(
            "{:<10} {:<26} {:>7}  {}",
            record.version.to_string(),
            record.published_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            record.token_count,
            record.content_id.as_deref().unwrap_or("(dry run)"),
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
