//! Resolver settings and the layered loader that produces them.
//!
//! Every field has a default matching the conventional Spring Boot layout, so
//! `Settings::default()` is enough for most callers. Deployments that need a
//! different layout can describe it in TOML:
//!
//! ```toml
//! default_environment = "application"
//! config_names = ["application", "bootstrap"]
//! fallback_port = 8080
//! scan_on_query = true
//! ```

mod builder;
mod env;
mod error;

pub use builder::SettingsLoader;
pub use error::SettingsError;

use serde::Deserialize;

/// Names and conventions used to classify files and answer well-known queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment name of the base (non-suffixed) configuration.
    pub default_environment: String,
    /// File stems that count as configuration files.
    pub config_names: Vec<String>,
    /// Separator between a file stem and its environment suffix.
    pub environment_separator: String,
    /// Character delimiting raw-token spans such as `@project.version@`.
    pub placeholder_marker: char,
    /// Key in the base configuration that declares the active environment.
    pub active_profiles_key: String,
    pub server_port_key: String,
    pub context_path_key: String,
    /// Port returned whenever the configured one is missing or unusable.
    pub fallback_port: u16,
    /// Compare file timestamps on every query. When disabled, only change
    /// notifications and explicit invalidation evict cache entries.
    pub scan_on_query: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_environment: "application".to_string(),
            config_names: vec!["application".to_string(), "bootstrap".to_string()],
            environment_separator: "-".to_string(),
            placeholder_marker: '@',
            active_profiles_key: "spring.profiles.active".to_string(),
            server_port_key: "server.port".to_string(),
            context_path_key: "server.servlet.context-path".to_string(),
            fallback_port: 8080,
            scan_on_query: true,
        }
    }
}

impl Settings {
    /// Parses settings from a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, SettingsError> {
        toml::from_str(contents).map_err(SettingsError::DeserializeError)
    }

    /// Returns true if `value` is wholly wrapped in the placeholder marker,
    /// e.g. `@profiles.active@`.
    pub(crate) fn is_marker_wrapped(&self, value: &str) -> bool {
        let marker = self.placeholder_marker;
        value.len() > 2 * marker.len_utf8()
            && value.starts_with(marker)
            && value.ends_with(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            default_environment = "base"
            fallback_port = 9000
            placeholder_marker = "%"
            "#,
        )
        .unwrap();
        assert_eq!(settings.default_environment, "base");
        assert_eq!(settings.fallback_port, 9000);
        assert_eq!(settings.placeholder_marker, '%');
        assert_eq!(settings.server_port_key, "server.port");
    }

    #[test]
    fn test_invalid_type_is_rejected() {
        let result = Settings::from_toml_str("fallback_port = \"high\"");
        assert!(matches!(result, Err(SettingsError::DeserializeError(_))));
    }

    #[test]
    fn test_marker_wrapped() {
        let settings = Settings::default();
        assert!(settings.is_marker_wrapped("@profiles.active@"));
        assert!(!settings.is_marker_wrapped("@@"));
        assert!(!settings.is_marker_wrapped("dev"));
        assert!(!settings.is_marker_wrapped("@dev"));
    }
}
