use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use maputnik_core::{SpecValidator, validate_style, validate_value};
use maputnik_runtime::EditorConfig;
use tracing::info;

use crate::error::Result;
use crate::util::{read_style, write_string};

#[derive(Debug, Clone, Args)]
pub struct RepairArgs {
    /// Style document to repair.
    pub file: PathBuf,

    /// Where to write the repaired document.
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Write the repaired copy of a style. A valid style is written unchanged.
pub fn run_repair(args: RepairArgs, _config: &EditorConfig, out: &mut dyn Write) -> Result<()> {
    let style = read_style(&args.file)?;
    let validator = SpecValidator::new();
    let report = validate_style(&validator, &style)?;

    let repaired = match report.dirty {
        Some(dirty) => dirty.into_value(),
        None => style.to_value()?,
    };
    write_string(&args.output, &serde_json::to_string_pretty(&repaired)?)?;

    let remaining = validate_value(&validator, &repaired).errors.len();
    info!(
        fixed = report.errors.len(),
        remaining,
        output = %args.output.display(),
        "style repaired"
    );
    writeln!(
        out,
        "{} error(s) repaired, {} remaining; wrote {}",
        report.errors.len(),
        remaining,
        args.output.display()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::fs;

    #[test]
    fn invalid_properties_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("in.json");
        fs::write(
            &file,
            r#"{"version": 8, "sources": {}, "layers": [
                {"id": "bg", "type": "background",
                 "paint": {"background-color": 5, "background-opacity": 0.4}}
            ]}"#,
        )
        .unwrap();
        let output = dir.path().join("out/repaired.json");

        let mut out = Vec::new();
        run_repair(
            RepairArgs {
                file,
                output: output.clone(),
            },
            &EditorConfig::default(),
            &mut out,
        )
        .unwrap();

        let repaired: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(repaired["layers"][0]["paint"], json!({"background-opacity": 0.4}));
        assert!(String::from_utf8(out).unwrap().starts_with("1 error(s) repaired, 0 remaining"));
    }
}
