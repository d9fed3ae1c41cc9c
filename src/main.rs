use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{error, info, warn};
use quai_dash::config::{config_dir, AppConfig};
use quai_dash::core::{
    classify, totals_store, AppContext, Dashboard, ExportFormat, HeuristicClassifier,
    MiningTotals, PollManager, WalletLookup,
};
use quai_dash::ReconciledView;
use quai_dash_core::Registry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// quai-dash - metrics core for a Quai Network GPU mining dashboard
#[derive(Parser, Debug, Clone)]
#[command(name = "quai-dash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the one in the platform config directory
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Node JSON-RPC endpoint (enables the node source)
    #[arg(long = "rpc-url", value_name = "URL")]
    rpc_url: Option<String>,

    /// Prometheus base URL (enables the Prometheus source)
    #[arg(long = "prometheus-url", value_name = "URL")]
    prometheus_url: Option<String>,

    /// Block explorer base URL (enables the explorer source)
    #[arg(long = "explorer-url", value_name = "URL")]
    explorer_url: Option<String>,

    /// Wallet address to look up at startup
    #[arg(long = "wallet", value_name = "ADDRESS")]
    wallet: Option<String>,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,

    /// Stop after this many reconcile ticks
    #[arg(long = "ticks", value_name = "N")]
    ticks: Option<u64>,

    /// Export current stats and history on exit (json or csv)
    #[arg(long = "export", value_name = "FORMAT")]
    export: Option<ExportFormat>,

    /// Export destination, defaults to quai-dash-export.<format>
    #[arg(short = 'o', long = "output", value_name = "PATH", requires = "export")]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // Level 0 (default): warn only
    // Level 1: info, one summary line per tick
    // Level 2: debug
    // Level 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting quai-dash v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Load the config file, falling back to defaults when it does not exist yet
fn load_config(cli: &Cli) -> Result<(AppConfig, PathBuf)> {
    match &cli.config {
        Some(path) if path.exists() => {
            let config = AppConfig::load_from_path(path)
                .with_context(|| format!("loading config from {:?}", path))?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            Ok((config, dir))
        }
        Some(path) => {
            warn!("Config file {:?} not found, using defaults", path);
            let mut config = AppConfig::default();
            config.preferences = AppConfig::preferences_store(path).load();
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            Ok((config, dir))
        }
        None => Ok((AppConfig::load()?, config_dir()?)),
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(url) = &cli.rpc_url {
        config.sources.node.rpc_url = url.clone();
        config.sources.node.enabled = true;
    }
    if let Some(url) = &cli.prometheus_url {
        config.sources.prometheus.url = url.clone();
        config.sources.prometheus.enabled = true;
    }
    if let Some(url) = &cli.explorer_url {
        config.sources.explorer.base_url = url.clone();
        config.sources.explorer.enabled = true;
    }
    if let Some(address) = &cli.wallet {
        config.wallet_address = Some(address.clone());
    }
}

fn summary(view: &ReconciledView) -> String {
    let sources: Vec<String> = view
        .sources
        .iter()
        .map(|report| format!("{}={}", report.kind, report.status))
        .collect();
    format!(
        "height {} | net {} H/s | local {} H/s | power {} W | shares {}/{} | {}",
        view.block_height.display_or("-"),
        view.network_hash_rate.display_or("-"),
        view.local_hash_rate.display_or("-"),
        view.power_usage.display_or("-"),
        view.totals.accepted_shares,
        view.totals.rejected_shares,
        sources.join(" "),
    )
}

async fn lookup_wallet(config: &AppConfig, address: &str) {
    let wallet = match WalletLookup::new(&config.sources.node, &config.sources.explorer) {
        Ok(wallet) => wallet,
        Err(e) => {
            warn!("Wallet lookup unavailable: {}", e);
            return;
        }
    };
    match wallet.lookup(address).await {
        Ok(info) => info!(
            "Wallet {}: {:.6} QUAI, {} transactions",
            info.address,
            info.balance_quai(),
            info.tx_count
        ),
        Err(e) => warn!("Wallet lookup for {} failed: {}", address, e),
    }
    match wallet.recent_transactions(address).await {
        Ok(transactions) => {
            let classified = classify(transactions, &HeuristicClassifier::default());
            let rewards = classified.iter().filter(|tx| tx.locked_reward).count();
            info!(
                "Wallet {}: {} recent transactions, {} locked rewards",
                address,
                classified.len(),
                rewards
            );
        }
        Err(e) => warn!("Transaction listing for {} failed: {}", address, e),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (mut config, dir) = load_config(&cli)?;
    apply_overrides(&mut config, &cli);

    let persistence = config.preferences.persistence_enabled;
    let totals = if persistence {
        totals_store(&dir).load()
    } else {
        MiningTotals::default()
    };

    if let Some(address) = config.wallet_address.clone() {
        lookup_wallet(&config, &address).await;
    }

    let tick = config.reconcile.tick_interval();
    let ctx = AppContext::new(config);

    let mut registry = Registry::new();
    quai_dash_sources::register_all(&mut registry);
    let mut polls = PollManager::new(Arc::clone(&ctx), registry);
    polls.start_all()?;

    let mut dashboard = Dashboard::new(Arc::clone(&ctx), totals, Utc::now());
    let mut interval = tokio::time::interval(tick);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Reconciling every {:?}", tick);
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutting down");
                break;
            }
        }

        let view = dashboard.tick(Utc::now());
        info!("{}", summary(&view));

        ticks += 1;
        if cli.ticks.map_or(false, |limit| ticks >= limit) {
            break;
        }
    }
    polls.stop_all();

    if let Some(format) = cli.export {
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("quai-dash-export.{}", format.extension())));
        dashboard.export(&path, format)?;
    } else if ctx.config().preferences.auto_export_enabled {
        let name = format!("quai-dash-{}.json", Utc::now().format("%Y%m%d-%H%M%S"));
        let path = dir.join("exports").join(name);
        if let Err(e) = dashboard.export(&path, ExportFormat::Json) {
            warn!("Auto-export failed: {:#}", e);
        }
    }

    if persistence {
        totals_store(&dir).save(dashboard.totals())?;
    }
    Ok(())
}
