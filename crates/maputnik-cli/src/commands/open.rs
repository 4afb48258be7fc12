use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use maputnik_core::ValidationReport;
use maputnik_runtime::{EditorConfig, EditorStore};
use url::Url;

use crate::commands::validate::print_report;
use crate::error::{CliError, Result};
use crate::util::is_remote;

#[derive(Debug, Clone, Args)]
pub struct OpenArgs {
    /// Style file path or http(s) URL.
    pub input: String,

    /// Directory to persist the session in.
    #[arg(long)]
    pub storage: Option<PathBuf>,

    /// Address bar URL the session starts from.
    #[arg(long)]
    pub address: Option<String>,

    /// Print the errors as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Load a style through the editor store, persist it, and print the
/// resulting address bar URL and validation errors.
pub fn run_open(args: OpenArgs, config: &EditorConfig, out: &mut dyn Write) -> Result<()> {
    let mut config = config.clone();
    if let Some(dir) = &args.storage {
        config.storage.dir = Some(dir.clone());
    }
    if let Some(address) = &args.address {
        Url::parse(address)
            .map_err(|err| CliError::invalid(format!("--address {address}: {err}")))?;
        config.address.base_url = address.clone();
    }
    let wait = Duration::from_secs(config.fetch.timeout_secs);

    let mut store = EditorStore::builder(config).build()?;
    if is_remote(&args.input) {
        store.load_remote(&args.input)?;
    } else {
        store.import_file(&args.input)?;
    }
    store.pump_until_idle(wait);

    let document = store.document();
    writeln!(
        out,
        "style {} ({}): {} layer(s), {} source(s)",
        document.id,
        document.name.as_deref().unwrap_or("unnamed"),
        document.layers.len(),
        document.sources.len()
    )?;
    let resolved = store.state().sources.get();
    for (id, source) in resolved.iter().filter(|(_, s)| !s.layers.is_empty()) {
        writeln!(out, "  source {id}: {}", source.layers.join(", "))?;
    }
    writeln!(out, "{}", store.address())?;

    let errors = store.errors();
    let report = ValidationReport {
        dirty: store.dirty(),
        errors,
    };
    print_report(&report, args.json, out)?;
    if report.is_valid() {
        Ok(())
    } else {
        Err(CliError::ValidationFailed {
            count: report.errors.len(),
        })
    }
}
