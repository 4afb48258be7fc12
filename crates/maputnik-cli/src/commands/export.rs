use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use maputnik_core::{ExportFormat, export_html, export_json, substitute_tokens};
use maputnik_runtime::EditorConfig;

use crate::error::Result;
use crate::util::{read_style, write_string};

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Style document to export.
    pub file: PathBuf,

    /// `json` or `html`.
    #[arg(long, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run_export(args: ExportArgs, config: &EditorConfig, out: &mut dyn Write) -> Result<()> {
    let tokens = config.token_table();
    let style = substitute_tokens(&read_style(&args.file)?, &tokens);
    let text = match args.format {
        ExportFormat::Json => export_json(&style, &tokens)?,
        ExportFormat::Html => export_html(&style, &tokens)?,
    };
    match &args.output {
        Some(path) => {
            write_string(path, &text)?;
            writeln!(out, "wrote {}", path.display())?;
        }
        None => writeln!(out, "{text}")?,
    }
    Ok(())
}
