//! Spring-style layered configuration resolution for project modules.
//!
//! A module's resource root holds a base configuration (`application.yml`,
//! `application.properties`) and per-environment overlays
//! (`application-dev.yml`). [`ConfigResolver`] parses and merges them, works
//! out the active environment and answers key, port and context-path queries
//! from a cache that is refreshed when the files change.

mod cache;
mod context;
mod error;
mod format;
mod merge;
mod module;
mod resolver;
mod settings;
mod source;
mod watch;

pub use cache::{CacheEntry, ResolutionCache, Watermark};
pub use context::{parse_port, EnvironmentContext, EnvironmentContextBuilder, EnvironmentSummary};
pub use error::Error;
pub use format::{
    ConfigParser, FlatConfig, FlatParser, Format, ParseError, ParsedSource, PlaceholderTable,
    StructuredParser,
};
pub use merge::MergeEngine;
pub use module::{FsModuleFiles, Module, ModuleFiles, NoProfiles, ProfileSignal, StaticProfiles};
pub use resolver::{ConfigResolver, ConfigResolverBuilder};
pub use settings::{Settings, SettingsError, SettingsLoader};
pub use source::{classify, Classified, ConfigFile, Role};
pub use watch::ConfigWatcher;
