//! Per-environment overlay-over-base merging.
//!
//! Values are already flat, so a merge is a single shadowing pass: for each
//! key the environment's value wins, otherwise the base value is used.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::format::FlatConfig;

/// One base configuration, any number of named overlays, and the merged view
/// of each overlay, kept current on every update.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    default_env: String,
    base: FlatConfig,
    overlays: BTreeMap<String, FlatConfig>,
    views: HashMap<String, FlatConfig>,
}

impl MergeEngine {
    /// Creates an engine whose base-only view is named `default_env`.
    pub fn new(default_env: impl Into<String>) -> Self {
        let default_env = default_env.into();
        let mut views = HashMap::new();
        views.insert(default_env.clone(), FlatConfig::new());
        Self {
            default_env,
            base: FlatConfig::new(),
            overlays: BTreeMap::new(),
            views,
        }
    }

    /// Replaces the base configuration and recomputes every view.
    pub fn set_base(&mut self, config: FlatConfig) {
        self.base = config;
        self.views.clear();
        let base_view = self.merged(&self.default_env);
        self.views.insert(self.default_env.clone(), base_view);
        let envs: Vec<String> = self.overlays.keys().cloned().collect();
        for env in envs {
            self.refresh(&env);
        }
        debug!(entries = self.base.len(), views = self.views.len(), "base configuration replaced");
    }

    /// Stores one environment's overlay and recomputes only its view.
    pub fn set_overlay(&mut self, env: impl Into<String>, config: FlatConfig) {
        let env = env.into();
        self.overlays.insert(env.clone(), config);
        self.refresh(&env);
    }

    /// Looks `key` up in `env`'s view, then in the base-only view.
    pub fn lookup(&self, env: &str, key: &str) -> Option<&str> {
        self.views
            .get(env)
            .and_then(|view| view.get(key))
            .or_else(|| self.default_view().get(key))
    }

    /// The merged view for `env`, or the base-only view if `env` is unknown.
    pub fn view(&self, env: &str) -> &FlatConfig {
        self.views.get(env).unwrap_or_else(|| self.default_view())
    }

    /// Every environment with a view: the default plus each overlay.
    pub fn environments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default_env.as_str()).chain(
            self.overlays
                .keys()
                .map(String::as_str)
                .filter(move |env| *env != self.default_env),
        )
    }

    fn default_view(&self) -> &FlatConfig {
        // Present from construction on; `set_base` reinserts it.
        static EMPTY: FlatConfig = FlatConfig::EMPTY;
        self.views.get(&self.default_env).unwrap_or(&EMPTY)
    }

    fn refresh(&mut self, env: &str) {
        let merged = self.merged(env);
        debug!(env, entries = merged.len(), "merged view recomputed");
        self.views.insert(env.to_string(), merged);
    }

    fn merged(&self, env: &str) -> FlatConfig {
        let mut merged = self.base.clone();
        if let Some(overlay) = self.overlays.get(env) {
            merged.extend_from(overlay);
        }
        merged
    }
}
