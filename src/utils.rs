use crate::ledger_utils::address_mapper::AddressMapper;
use crate::ledger_utils::restrict_set::RestrictSet;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

pub fn load_yaml_config<T: DeserializeOwned>(config_path: &Path) -> anyhow::Result<T> {
    let file = File::open(config_path).with_context(|| {
        format!(
            "Cannot read config file {path}",
            path = config_path.display()
        )
    })?;
    let config: T = serde_yaml::from_reader(file).with_context(|| {
        format!(
            "Cannot read config file {path}",
            path = config_path.display()
        )
    })?;
    Ok(config)
}

pub fn load_restrict_set<Mapper: AddressMapper>(
    paths: &[PathBuf],
    mapper: &Mapper,
) -> anyhow::Result<RestrictSet> {
    let mut restrict = RestrictSet::default();
    for path in paths {
        let loaded = restrict.load_from_file(path, mapper)?;
        tracing::info!("loaded {} addresses from {:?}", loaded, path);
    }
    Ok(restrict)
}

/// Log lines go to stderr, stdout is left to the report.
pub fn log_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    log_layer_to(std::io::stderr)
}

pub fn log_layer_to<S, W>(make_writer: W) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    tracing_subscriber::fmt::layer::<S>().with_writer(make_writer)
}

/// Report sink: the given file, or stdout.
pub fn open_report(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path).with_context(|| {
                format!("can't create report file {path}", path = path.display())
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}
