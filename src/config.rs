//! Configuration loading.
//!
//! Looks for, in order: an explicit path, `./relq.toml`, then
//! `<config dir>/relq/config.toml`. With none present the defaults apply.
//!
//! ```toml
//! dialect = "mysql"
//! schema_path = "schema.toml"
//! max_depth = 16
//! ```

use crate::error::{RelqError, RelqResult};
use crate::transpiler::{CompileOptions, DEFAULT_MAX_DEPTH, Dialect};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "relq.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelqConfig {
    pub dialect: Dialect,
    /// TOML schema describing models, fields and relations.
    pub schema_path: Option<PathBuf>,
    /// Bound on filter and inclusion nesting.
    pub max_depth: usize,
}

impl Default for RelqConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            schema_path: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RelqConfig {
    pub fn from_toml(content: &str) -> RelqResult<Self> {
        let config: RelqConfig =
            toml::from_str(content).map_err(|e| RelqError::Config(format!("Failed to parse config: {}", e)))?;
        if config.max_depth == 0 {
            return Err(RelqError::Config("max_depth must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> RelqResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        // A relative schema path is relative to the config file.
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            config.schema_path = config
                .schema_path
                .map(|schema| if schema.is_relative() { dir.join(schema) } else { schema });
        }
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `explicit` if given, else the first config file found.
    pub fn load(explicit: Option<&Path>) -> RelqResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match Self::discover() {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// First existing config file in lookup order.
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("relq").join("config.toml"))
            .filter(|p| p.is_file())
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            max_depth: self.max_depth,
        }
    }
}
