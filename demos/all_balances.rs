use std::path::PathBuf;

use clap::Parser;

use tracing_subscriber::prelude::*;
use utxo_ledger_export::balances::{AllBalances, BalancesConfig};
use utxo_ledger_export::driver::replay_file;
use utxo_ledger_export::ledger_utils::address_mapper::Base58AddressMapper;
use utxo_ledger_export::utils::{load_restrict_set, load_yaml_config, log_layer, open_report};

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: PathBuf,
}

#[tokio::main]
async fn main() {
    if let Err(err) = _main().await {
        tracing::error!("fatal: {:#}", err);
        std::process::exit(1);
    }
}

async fn _main() -> anyhow::Result<()> {
    // Start logging setup block
    let fmt_layer = log_layer();

    tracing_subscriber::registry().with(fmt_layer).init();

    let Cli { config_path } = Cli::parse();

    tracing::info!("Config file {:?}", config_path);
    let config: BalancesConfig = load_yaml_config(&config_path)?;
    tracing::info!("Config: {:?}", config);

    let mapper = Base58AddressMapper::default();
    let restrict = load_restrict_set(&config.restrict_paths, &mapper)?;
    let report = open_report(config.report_path.as_deref())?;

    let balances = AllBalances::from_config(&config, restrict, mapper, report);
    let balances = replay_file(balances, &config.events_path)?;
    if let Some(summary) = balances.summary() {
        tracing::info!(
            "report done: {} of {} addresses shown",
            summary.shown,
            summary.observed
        );
    }
    Ok(())
}
