//! Shared plumbing for the uilens command-line tools.
//!
//! Each binary hand-rolls its own `parse_arguments`; the pieces they have
//! in common (logging init, artifact I/O) live here.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for a CLI tool. `RUST_LOG` wins when set; otherwise
/// `--verbose` selects debug over info.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load a ui-map document from disk. YAML is accepted alongside JSON so
/// hand-tweaked maps keep working; the extension decides the parser.
pub fn load_ui_map(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("{} is not valid YAML", path.display()))
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", path.display()))
    }
}

/// Write a generated artifact, creating parent directories as needed.
pub fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_json_ui_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui_map.json");
        fs::write(&path, r#"{"base_url": "http://h", "graph": {"nodes": []}}"#).unwrap();

        let doc = load_ui_map(&path).unwrap();
        assert_eq!(doc["base_url"], "http://h");
    }

    #[test]
    fn loads_yaml_ui_map_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui_map.yaml");
        fs::write(&path, "base_url: http://h\ngraph:\n  nodes: []\n").unwrap();

        let doc = load_ui_map(&path).unwrap();
        assert_eq!(doc["base_url"], "http://h");
        assert!(doc["graph"]["nodes"].is_array());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_ui_map(&path).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_ui_map(Path::new("/nonexistent/ui_map.json")).is_err());
    }

    #[test]
    fn write_artifact_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/selectors.yaml");
        write_artifact(&path, "pages: {}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "pages: {}\n");
    }

    #[test]
    fn artifacts_round_trip_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui_map.json");
        let doc = json!({"graph": {"nodes": [], "links": []}});
        write_artifact(&path, &serde_json::to_string_pretty(&doc).unwrap()).unwrap();
        assert_eq!(load_ui_map(&path).unwrap(), doc);
    }
}
