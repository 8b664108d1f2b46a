use std::io;

use thiserror::Error;

use crate::settings::SettingsError;

/// Top-level error type for the profile-config library.
///
/// Configuration queries never fail; errors surface only from setup
/// (settings, watching) and from explicit rebuilds.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to list configuration files of module '{module}': {source}")]
    Discovery { module: String, source: io::Error },

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}
