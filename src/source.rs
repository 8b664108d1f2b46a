//! Configuration files and their classification.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::format::Format;
use crate::Settings;

/// One file reported by a [`ModuleFiles`](crate::ModuleFiles) implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }
}

/// Whether a file feeds the base configuration or one environment's overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Base,
    Overlay(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub format: Format,
    pub role: Role,
}

/// Classifies a path by file name alone.
///
/// `application.yml` is a base file, `application-dev.properties` an overlay
/// for `dev`; anything whose stem (minus an environment suffix) is not one of
/// the configured names, or whose extension is unknown, is not a configuration
/// file. The suffix starts after the last separator.
pub fn classify(path: &Path, settings: &Settings) -> Option<Classified> {
    let file_name = path.file_name()?.to_str()?;
    let (stem, extension) = file_name.rsplit_once('.')?;
    let format = Format::from_extension(extension)?;
    let is_config_name = |name: &str| settings.config_names.iter().any(|n| n == name);

    if is_config_name(stem) {
        return Some(Classified {
            format,
            role: Role::Base,
        });
    }

    let separator = settings.environment_separator.as_str();
    if separator.is_empty() {
        return None;
    }
    let (base, env) = stem.rsplit_once(separator)?;
    if env.is_empty() || !is_config_name(base) {
        return None;
    }
    Some(Classified {
        format,
        role: Role::Overlay(env.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role_of(name: &str) -> Option<Role> {
        classify(Path::new(name), &Settings::default()).map(|c| c.role)
    }

    #[test]
    fn test_base_files() {
        assert_eq!(role_of("application.yml"), Some(Role::Base));
        assert_eq!(role_of("bootstrap.properties"), Some(Role::Base));
        assert_eq!(role_of("/srv/app/resources/application.yaml"), Some(Role::Base));
    }

    #[test]
    fn test_overlay_files() {
        assert_eq!(role_of("application-dev.yml"), Some(Role::Overlay("dev".into())));
        assert_eq!(
            role_of("bootstrap-prod.properties"),
            Some(Role::Overlay("prod".into()))
        );
    }

    #[test]
    fn test_suffix_split_at_last_separator() {
        assert_eq!(role_of("application-us-east.yml"), None);
        let settings = Settings {
            config_names: vec!["my-app".into()],
            ..Settings::default()
        };
        let classified = classify(Path::new("my-app-qa.yml"), &settings).unwrap();
        assert_eq!(classified.role, Role::Overlay("qa".into()));
        assert_eq!(classified.format, Format::Structured);
    }

    #[test]
    fn test_non_config_files() {
        assert_eq!(role_of("logback.xml"), None);
        assert_eq!(role_of("messages.properties"), None);
        assert_eq!(role_of("application.json"), None);
        assert_eq!(role_of("application-.yml"), None);
        assert_eq!(role_of("application"), None);
    }

    #[test]
    fn test_format_detection() {
        let classified = classify(Path::new("application-dev.properties"), &Settings::default());
        assert_eq!(classified.map(|c| c.format), Some(Format::Flat));
    }
}
