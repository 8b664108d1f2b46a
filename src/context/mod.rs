//! Per-module environment resolution.

mod port;

pub use port::parse_port;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::format::FlatConfig;
use crate::merge::MergeEngine;
use crate::Settings;

/// Port and context path of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSummary {
    pub server_port: u16,
    pub context_path: String,
}

/// The resolved configuration of one module.
///
/// Knows which environments the module declares, which one its base
/// configuration marks as active, and answers key queries through a
/// [`MergeEngine`]. Immutable once built; a changed module gets a new context.
///
/// ## Example
///
/// ```
/// use profile_config::{EnvironmentContext, FlatConfig, Settings};
///
/// let base: FlatConfig = [("a", "1"), ("b", "2")].into_iter().collect();
/// let dev: FlatConfig = [("b", "3")].into_iter().collect();
///
/// let context = EnvironmentContext::builder(Settings::default())
///     .with_base(base)
///     .with_overlay("dev", dev)
///     .build();
///
/// assert_eq!(context.get_in("dev", "b"), "3");
/// assert_eq!(context.get_in("dev", "a"), "1");
/// assert_eq!(context.get_in("dev", "missing"), "");
/// ```
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    settings: Arc<Settings>,
    /// Environments backed by at least one file, in discovery order.
    discovered: Vec<String>,
    declared_active: Option<String>,
    engine: MergeEngine,
}

impl EnvironmentContext {
    pub fn builder(settings: impl Into<Arc<Settings>>) -> EnvironmentContextBuilder {
        EnvironmentContextBuilder {
            settings: settings.into(),
            base: None,
            overlays: Vec::new(),
        }
    }

    /// A context with no files behind it.
    pub fn empty(settings: impl Into<Arc<Settings>>) -> Self {
        Self::builder(settings).build()
    }

    /// Every known environment, always including the default one.
    pub fn environments(&self) -> BTreeSet<String> {
        self.engine
            .environments()
            .chain(self.discovered.iter().map(String::as_str))
            .map(str::to_string)
            .collect()
    }

    pub fn is_known(&self, env: &str) -> bool {
        env == self.settings.default_environment || self.discovered.iter().any(|e| e == env)
    }

    /// The active environment as declared by the base configuration, if any.
    pub fn declared_active(&self) -> Option<&str> {
        self.declared_active.as_deref()
    }

    /// True if the base configuration leaves the choice to the build tool by
    /// declaring a marker-wrapped token such as `@profiles.active@`.
    pub fn defers_to_build_profiles(&self) -> bool {
        self.declared_active
            .as_deref()
            .is_some_and(|declared| self.settings.is_marker_wrapped(declared))
    }

    /// Picks the active environment.
    ///
    /// In order: the first build profile naming a known environment (only when
    /// the declaration defers to the build tool), the declared environment if
    /// known, the default environment if it has a file, the first discovered
    /// environment, and finally the default environment.
    pub fn resolve_active(&self, build_profiles: &[String]) -> String {
        if self.defers_to_build_profiles() {
            if let Some(profile) = build_profiles.iter().find(|p| self.is_known(p)) {
                return profile.clone();
            }
            debug!(profiles = ?build_profiles, "no build profile names a known environment");
        }

        if let Some(declared) = self.declared_active.as_deref() {
            if self.is_known(declared) {
                return declared.to_string();
            }
        }

        let default_env = &self.settings.default_environment;
        if self.discovered.iter().any(|e| e == default_env) {
            return default_env.clone();
        }

        self.discovered
            .first()
            .unwrap_or(default_env)
            .clone()
    }

    /// Value of `key` in `env`, falling back to the default environment.
    /// Returns an empty string if neither has it.
    pub fn get_in(&self, env: &str, key: &str) -> String {
        self.engine
            .lookup(env, key)
            .unwrap_or_default()
            .to_string()
    }

    pub fn server_port_in(&self, env: &str) -> u16 {
        let raw = self.get_in(env, &self.settings.server_port_key);
        parse_port(&raw, self.settings.fallback_port)
    }

    /// Raw context path of `env`, without normalization.
    pub fn context_path_in(&self, env: &str) -> String {
        self.get_in(env, &self.settings.context_path_key)
    }

    /// The complete merged view of `env`.
    pub fn all_config(&self, env: &str) -> FlatConfig {
        self.engine.view(env).clone()
    }

    pub fn summaries(&self) -> BTreeMap<String, EnvironmentSummary> {
        self.environments()
            .into_iter()
            .map(|env| {
                let summary = EnvironmentSummary {
                    server_port: self.server_port_in(&env),
                    context_path: self.context_path_in(&env),
                };
                (env, summary)
            })
            .collect()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Builder for [`EnvironmentContext`].
///
/// Base sources are always merged before overlays, whatever order they were
/// added in, so the active-environment declaration is read from the complete
/// base configuration. Repeated sources for the same role are combined with
/// the later one winning on shared keys.
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct EnvironmentContextBuilder {
    settings: Arc<Settings>,
    base: Option<FlatConfig>,
    overlays: Vec<(String, FlatConfig)>,
}

impl EnvironmentContextBuilder {
    pub fn with_base(mut self, config: FlatConfig) -> Self {
        match &mut self.base {
            Some(base) => base.extend_from(&config),
            None => self.base = Some(config),
        }
        self
    }

    pub fn with_overlay(mut self, env: impl Into<String>, config: FlatConfig) -> Self {
        let env = env.into();
        match self.overlays.iter_mut().find(|(name, _)| *name == env) {
            Some((_, existing)) => existing.extend_from(&config),
            None => self.overlays.push((env, config)),
        }
        self
    }

    pub fn build(self) -> EnvironmentContext {
        let settings = self.settings;
        let mut engine = MergeEngine::new(settings.default_environment.clone());
        let mut discovered = Vec::new();
        let mut declared_active = None;

        if let Some(base) = self.base {
            declared_active = base
                .get(&settings.active_profiles_key)
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            discovered.push(settings.default_environment.clone());
            engine.set_base(base);
        }

        for (env, config) in self.overlays {
            if !discovered.contains(&env) {
                discovered.push(env.clone());
            }
            engine.set_overlay(env, config);
        }

        EnvironmentContext {
            settings,
            discovered,
            declared_active,
            engine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(pairs: &[(&str, &str)]) -> FlatConfig {
        pairs.iter().copied().collect()
    }

    fn settings() -> Settings {
        Settings {
            default_environment: "base".into(),
            ..Settings::default()
        }
    }

    fn context_with(base: &[(&str, &str)], overlays: &[&str]) -> EnvironmentContext {
        let mut builder = EnvironmentContext::builder(settings()).with_base(config(base));
        for env in overlays {
            builder = builder.with_overlay(*env, config(&[("env.name", *env)]));
        }
        builder.build()
    }

    #[test]
    fn test_scenario_lookups() {
        let context = EnvironmentContext::builder(settings())
            .with_base(config(&[("a", "1"), ("b", "2")]))
            .with_overlay("dev", config(&[("b", "3"), ("c", "4")]))
            .build();

        assert_eq!(context.get_in("dev", "a"), "1");
        assert_eq!(context.get_in("dev", "b"), "3");
        assert_eq!(context.get_in("dev", "c"), "4");
        assert_eq!(context.get_in("base", "c"), "");
        assert_eq!(context.get_in("unknown", "a"), "1");
    }

    #[test]
    fn test_environments_include_default() {
        let context = EnvironmentContext::builder(settings())
            .with_overlay("dev", FlatConfig::new())
            .build();
        let envs: Vec<String> = context.environments().into_iter().collect();
        assert_eq!(envs, vec!["base".to_string(), "dev".to_string()]);
    }

    #[test]
    fn test_no_declaration_selects_default() {
        let context = context_with(&[("a", "1")], &["dev", "prod"]);
        assert_eq!(context.resolve_active(&[]), "base");
    }

    #[test]
    fn test_declared_active_used_when_known() {
        let context = context_with(&[("spring.profiles.active", "prod, dev")], &["dev", "prod"]);
        assert_eq!(context.declared_active(), Some("prod"));
        assert_eq!(context.resolve_active(&["dev".into()]), "prod");
    }

    #[test]
    fn test_declared_active_unknown_falls_back_to_default() {
        let context = context_with(&[("spring.profiles.active", "staging")], &["dev"]);
        assert_eq!(context.resolve_active(&[]), "base");
    }

    #[test]
    fn test_build_profile_used_when_deferred() {
        let context = context_with(&[("spring.profiles.active", "@profiles.active@")], &["prod"]);
        assert!(context.defers_to_build_profiles());
        assert_eq!(context.resolve_active(&["prod".into(), "qa".into()]), "prod");
        assert_eq!(context.resolve_active(&["qa".into(), "prod".into()]), "prod");
    }

    #[test]
    fn test_unmatched_build_profiles_fall_through() {
        let context = context_with(&[("spring.profiles.active", "@profiles.active@")], &["prod"]);
        assert_eq!(context.resolve_active(&["qa".into()]), "base");
        assert_eq!(context.resolve_active(&[]), "base");
    }

    #[test]
    fn test_profiles_ignored_without_sentinel() {
        let context = context_with(&[("a", "1")], &["prod"]);
        assert_eq!(context.resolve_active(&["prod".into()]), "base");
    }

    #[test]
    fn test_first_discovered_when_no_base_file() {
        let context = EnvironmentContext::builder(settings())
            .with_overlay("qa", FlatConfig::new())
            .with_overlay("dev", FlatConfig::new())
            .build();
        assert_eq!(context.resolve_active(&[]), "qa");
    }

    #[test]
    fn test_empty_context() {
        let context = EnvironmentContext::empty(settings());
        assert_eq!(context.resolve_active(&[]), "base");
        assert_eq!(context.get_in("base", "anything"), "");
        assert_eq!(context.server_port_in("base"), 8080);
        assert_eq!(context.environments().len(), 1);
    }

    #[test]
    fn test_repeated_sources_are_combined() {
        let context = EnvironmentContext::builder(settings())
            .with_base(config(&[("a", "yaml"), ("b", "yaml")]))
            .with_base(config(&[("a", "props")]))
            .with_overlay("dev", config(&[("c", "1")]))
            .with_overlay("dev", config(&[("d", "2")]))
            .build();

        assert_eq!(context.get_in("base", "a"), "props");
        assert_eq!(context.get_in("base", "b"), "yaml");
        assert_eq!(context.get_in("dev", "c"), "1");
        assert_eq!(context.get_in("dev", "d"), "2");
    }

    #[test]
    fn test_summaries_per_environment() {
        let context = EnvironmentContext::builder(settings())
            .with_base(config(&[
                ("server.port", "8081"),
                ("server.servlet.context-path", "/app"),
            ]))
            .with_overlay("prod", config(&[("server.port", "${PORT:80}")]))
            .with_overlay("dev", config(&[("server.servlet.context-path", "/dev")]))
            .build();

        let summaries = context.summaries();
        assert_eq!(summaries.len(), 3);
        assert_eq!(
            summaries["prod"],
            EnvironmentSummary {
                server_port: 80,
                context_path: "/app".into()
            }
        );
        assert_eq!(summaries["dev"].server_port, 8081);
        assert_eq!(summaries["dev"].context_path, "/dev");
        assert_eq!(summaries["base"].context_path, "/app");
    }
}
