use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use tracing_subscriber::prelude::*;
use utxo_ledger_export::csv_dump::{CsvDump, CsvTables, ExportConfig};
use utxo_ledger_export::driver::replay_file;
use utxo_ledger_export::ledger_utils::address_mapper::Base58AddressMapper;
use utxo_ledger_export::utils::{load_yaml_config, log_layer};

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
    let config: ExportConfig = load_yaml_config(&config_path)?;
    tracing::info!("Config: {:?}", config);

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "can't create output dir {path}",
            path = config.output_dir.display()
        )
    })?;
    let tables = CsvTables::create(&config.output_dir)?;

    let dump = CsvDump::from_config(&config, tables, Base58AddressMapper::default());
    let dump = replay_file(dump, &config.events_path)?;
    tracing::info!("export done: {:?}", dump.summary());
    Ok(())
}
