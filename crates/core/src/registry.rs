//! In-memory index of command definitions, keyed by name.
//!
//! Loaded once at startup from a directory of YAML / JSON files and shared
//! read-only between concurrent runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigError;
use crate::spec::CommandSpec;

/// File extensions recognised as command definitions.
const DEFINITION_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Read-only registry of [`CommandSpec`]s.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<CommandSpec>>,
}

impl CommandRegistry {
    /// Build a registry from already-parsed definitions.
    ///
    /// Fails if two definitions share a name.
    pub fn from_specs(specs: impl IntoIterator<Item = CommandSpec>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for spec in specs {
            registry.insert(spec)?;
        }
        Ok(registry)
    }

    /// Load every `*.yaml`, `*.yml` and `*.json` file directly under `dir`.
    ///
    /// Files are visited in filename order so duplicate detection is
    /// deterministic. Other files and subdirectories are ignored.
    pub fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && definition_extension(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Self::default();
        for path in paths {
            let spec = load_file(&path)?;
            tracing::debug!(command = %spec.name, path = %path.display(), "Loaded command definition");
            registry.insert(spec)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, spec: CommandSpec) -> Result<(), ConfigError> {
        if self.commands.contains_key(&spec.name) {
            return Err(ConfigError::DuplicateCommand(spec.name));
        }
        self.commands.insert(spec.name.clone(), Arc::new(spec));
        Ok(())
    }

    /// Look up a command by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<CommandSpec>> {
        self.commands.get(name).cloned()
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn definition_extension(path: &Path) -> Option<&str> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| DEFINITION_EXTENSIONS.contains(e))
}

/// Parse a single definition file, choosing the format by extension.
fn load_file(path: &Path) -> Result<CommandSpec, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed = match definition_extension(path) {
        Some("json") => serde_json::from_str(&contents).map_err(|e| e.to_string()),
        _ => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
