use std::path::{Path, PathBuf};

use super::env::load_env_vars;
use super::{Settings, SettingsError};

/// A settings source in the loading pipeline.
#[derive(Debug)]
enum SettingsSource {
    File { path: PathBuf, required: bool },
    Env { prefix: String, separator: String },
}

/// Layered loader for [`Settings`].
///
/// Sources are merged in registration order, with later sources overriding
/// earlier ones. Nested tables are merged recursively; other values
/// (including arrays) are replaced entirely. Fields no source mentions keep
/// their defaults.
///
/// ## Example
///
/// ```no_run
/// use profile_config::SettingsLoader;
///
/// let settings = SettingsLoader::new()
///     .with_file("profile-config.toml", false)
///     .with_env("PROFILE_CONFIG", "__")
///     .build()?;
/// # Ok::<(), profile_config::SettingsError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "loaders do nothing until .build() is called"]
pub struct SettingsLoader {
    sources: Vec<SettingsSource>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.sources.push(SettingsSource::File {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Loads overrides from environment variables with the given prefix.
    ///
    /// `PREFIX__FALLBACK_PORT=9000` with separator `__` sets `fallback_port`.
    /// Values are coerced to integer, float, boolean, or string (fallback).
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.sources.push(SettingsSource::Env {
            prefix: prefix.into(),
            separator: separator.into(),
        });
        self
    }

    /// Loads, merges and deserializes every registered source.
    pub fn build(self) -> Result<Settings, SettingsError> {
        let mut merged = toml::Table::new();

        for source in self.sources {
            match source {
                SettingsSource::File { path, required } => {
                    if let Some(table) = load_settings_file(&path, required)? {
                        deep_merge(&mut merged, table);
                    }
                }
                SettingsSource::Env { prefix, separator } => {
                    load_env_vars(&mut merged, &prefix, &separator);
                }
            }
        }

        let value = toml::Value::Table(merged);
        value.try_into().map_err(SettingsError::DeserializeError)
    }
}

/// Loads and parses a TOML settings file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
fn load_settings_file(path: &Path, required: bool) -> Result<Option<toml::Table>, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let table = toml::from_str(&contents).map_err(|e| SettingsError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(table))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(SettingsError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(SettingsError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
