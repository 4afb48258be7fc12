use std::fs;
use std::path::Path;

use maputnik_core::{StyleDocument, parse_style};
use maputnik_runtime::EditorConfig;

use crate::error::{CliError, Result};

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

pub fn write_string(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

pub fn read_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and normalise a style document.
pub fn read_style(path: &Path) -> Result<StyleDocument> {
    Ok(parse_style(&read_string(path)?)?)
}

/// Load the editor config; `.json` files are read as JSON, anything else as TOML.
pub fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let config = if path.extension().is_some_and(|ext| ext == "json") {
        EditorConfig::from_json_file(path)?
    } else {
        EditorConfig::from_toml_file(path)?
    };
    Ok(config.validated()?)
}

#[must_use]
pub fn is_remote(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_string_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/style.json");
        write_string(&path, "{}").unwrap();
        assert_eq!(read_string(&path).unwrap(), "{}");
    }

    #[test]
    fn missing_file_names_path() {
        let err = read_style(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn config_format_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("config.json");
        fs::write(&json, r#"{"history": {"max_depth": 5}}"#).unwrap();
        assert_eq!(load_config(Some(&json)).unwrap().history.max_depth, Some(5));

        let toml = dir.path().join("config.toml");
        fs::write(&toml, "[history]\nmax_depth = 0\n").unwrap();
        assert!(load_config(Some(&toml)).is_err());
    }

    #[test]
    fn remote_inputs() {
        assert!(is_remote("https://x/style.json"));
        assert!(!is_remote("style.json"));
    }
}
