use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use maputnik_core::{SpecValidator, ValidationReport, validate_style};
use maputnik_runtime::EditorConfig;
use serde_json::json;

use crate::error::{CliError, Result};
use crate::util::read_style;

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Style document to check.
    pub file: PathBuf,

    /// Print the errors as a JSON array.
    #[arg(long)]
    pub json: bool,
}

pub fn run_validate(args: ValidateArgs, _config: &EditorConfig, out: &mut dyn Write) -> Result<()> {
    let style = read_style(&args.file)?;
    let report = validate_style(&SpecValidator::new(), &style)?;
    print_report(&report, args.json, out)?;
    if report.is_valid() {
        Ok(())
    } else {
        Err(CliError::ValidationFailed {
            count: report.errors.len(),
        })
    }
}

pub(crate) fn print_report(
    report: &ValidationReport,
    as_json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    if as_json {
        writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(&json!({
                "valid": report.is_valid(),
                "errors": report.errors,
            }))?
        )?;
        return Ok(());
    }
    for error in &report.errors {
        match &error.parsed {
            Some(parsed) => writeln!(
                out,
                "layer {} [{}]: {}",
                parsed.layer_index, parsed.key, parsed.message
            )?,
            None => writeln!(out, "{}", error.message)?,
        }
    }
    if report.is_valid() {
        writeln!(out, "style is valid")?;
    }
    Ok(())
}
