//! Tool catalog loading.
//!
//! The catalog is data: a list of `{name, description, parameters}` entries
//! the host bridge understands. A default catalog ships with the crate;
//! users can point `bridge.catalog_path` at their own JSON or TOML file.

use aegent_core::tool::{ToolCatalog, ToolSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CATALOG: &str = include_str!("../catalog/default_catalog.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse catalog at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Unsupported catalog format: {0} (expected .json or .toml)")]
    UnsupportedFormat(PathBuf),
}

/// Accepts a bare array or a `{ "tools": [...] }` wrapper.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<ToolSpec>),
    Wrapped { tools: Vec<ToolSpec> },
}

impl CatalogFile {
    fn into_catalog(self) -> ToolCatalog {
        match self {
            CatalogFile::List(specs) | CatalogFile::Wrapped { tools: specs } => {
                ToolCatalog::from_specs(specs)
            }
        }
    }
}

/// Load a catalog from a `.json` or `.toml` file.
///
/// TOML files use `[[tools]]` tables since TOML has no top-level arrays.
pub fn load_catalog(path: &Path) -> Result<ToolCatalog, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let parse_err = |reason: String| CatalogError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let file: CatalogFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        _ => return Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
    };

    let catalog = file.into_catalog();
    tracing::info!(path = %path.display(), tools = catalog.len(), "Loaded tool catalog");
    Ok(catalog)
}

/// The catalog bundled with the crate.
pub fn default_catalog() -> ToolCatalog {
    match serde_json::from_str::<CatalogFile>(DEFAULT_CATALOG) {
        Ok(file) => file.into_catalog(),
        Err(e) => {
            tracing::error!(error = %e, "Bundled tool catalog is invalid");
            ToolCatalog::new()
        }
    }
}

/// Load from `path` when given, otherwise the bundled catalog.
pub fn resolve_catalog(path: Option<&Path>) -> Result<ToolCatalog, CatalogError> {
    match path {
        Some(p) => load_catalog(p),
        None => Ok(default_catalog()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_parses() {
        let catalog = default_catalog();
        assert!(catalog.len() >= 10);
        assert!(catalog.get("create_composition").is_some());
        assert!(catalog.get("create_shape_layer").is_some());
        assert!(catalog.get("stop").is_none());
    }

    #[test]
    fn bundled_catalog_marks_required_params() {
        let catalog = default_catalog();
        let sig = catalog.get("set_keyframe").unwrap().signature();
        assert!(sig.contains("layerIndex"));
        assert!(!sig.contains("layerIndex?"));
    }

    #[test]
    fn load_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.json");
        std::fs::write(
            &path,
            r#"[{"name":"ping","description":"Ping the host"}]"#,
        )
        .unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.names(), vec!["ping"]);
    }

    #[test]
    fn load_toml_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.toml");
        std::fs::write(
            &path,
            r#"
[[tools]]
name = "render_queue_add"
description = "Queue the active comp for rendering"

[tools.parameters]
type = "object"
required = ["outputPath"]

[tools.parameters.properties.outputPath]
type = "string"
"#,
        )
        .unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("render_queue_add").unwrap().signature(),
            "render_queue_add(outputPath)"
        );
    }

    #[test]
    fn unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.yaml");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            load_catalog(&path),
            Err(CatalogError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn resolve_without_path_uses_bundled() {
        let catalog = resolve_catalog(None).unwrap();
        assert!(!catalog.is_empty());
    }
}
