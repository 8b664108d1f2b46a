//! Cached configuration queries per module.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheEntry, ResolutionCache, Watermark};
use crate::context::{EnvironmentContext, EnvironmentSummary};
use crate::format::{FlatConfig, Format};
use crate::module::{FsModuleFiles, Module, ModuleFiles, NoProfiles, ProfileSignal};
use crate::source::{classify, Classified, ConfigFile, Role};
use crate::{Error, Settings};

/// Resolves configuration values for project modules.
///
/// Each module's files are parsed and merged on first use and cached. A query
/// compares the newest modification time of the module's configuration files
/// with the cached watermark and rebuilds when it moved; change notifications
/// ([`on_file_changed`](Self::on_file_changed)) and explicit invalidation
/// evict entries directly. Queries never fail: missing keys come back as empty
/// strings and unreadable files as empty configurations.
///
/// ## Example
///
/// ```no_run
/// use profile_config::{ConfigResolver, Module};
///
/// let resolver = ConfigResolver::builder().build();
/// let module = Module::new("web", "web/src/main/resources");
///
/// let port = resolver.server_port(&module, None);
/// let datasource = resolver.get_config(&module, "spring.datasource.url");
/// ```
pub struct ConfigResolver {
    settings: Arc<Settings>,
    files: Box<dyn ModuleFiles>,
    profiles: Box<dyn ProfileSignal>,
    cache: ResolutionCache,
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("settings", &self.settings)
            .field("files", &self.files)
            .field("cached_modules", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl ConfigResolver {
    pub fn builder() -> ConfigResolverBuilder {
        ConfigResolverBuilder::default()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Value of `key` in the module's active environment, or `""`.
    pub fn get_config(&self, module: &Module, key: &str) -> String {
        let context = self.context(module);
        let env = self.active_in(module, &context);
        context.get_in(&env, key)
    }

    /// Value of `key` in `env`, falling back to the default environment, or `""`.
    pub fn get_config_in(&self, module: &Module, env: &str, key: &str) -> String {
        self.context(module).get_in(env, key)
    }

    /// Server port of `env` (the active environment when `None`). Always a
    /// usable port; see [`parse_port`](crate::parse_port).
    pub fn server_port(&self, module: &Module, env: Option<&str>) -> u16 {
        let context = self.context(module);
        match env.filter(|e| !e.trim().is_empty()) {
            Some(env) => context.server_port_in(env),
            None => {
                let env = self.active_in(module, &context);
                context.server_port_in(&env)
            }
        }
    }

    /// Raw context path of the active environment.
    pub fn context_path(&self, module: &Module) -> String {
        let context = self.context(module);
        let env = self.active_in(module, &context);
        context.context_path_in(&env)
    }

    pub fn environments(&self, module: &Module) -> BTreeSet<String> {
        self.context(module).environments()
    }

    pub fn active_environment(&self, module: &Module) -> String {
        let context = self.context(module);
        self.active_in(module, &context)
    }

    /// Complete merged configuration of `env`.
    pub fn all_config(&self, module: &Module, env: &str) -> FlatConfig {
        self.context(module).all_config(env)
    }

    /// Port and context path of every environment of the module.
    pub fn environment_summaries(&self, module: &Module) -> BTreeMap<String, EnvironmentSummary> {
        self.context(module).summaries()
    }

    pub fn invalidate(&self, module: &Module) {
        if self.cache.evict(module) {
            debug!(module = %module, "configuration cache invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.evict_all();
        debug!("configuration cache cleared");
    }

    /// Change-feed entry point: evicts every module owning `path` if it is a
    /// configuration file. Returns the number of evicted modules.
    pub fn on_file_changed(&self, path: &Path) -> usize {
        if classify(path, &self.settings).is_none() {
            return 0;
        }
        self.cache.evict_owners(path)
    }

    pub fn is_cached(&self, module: &Module) -> bool {
        self.cache.contains(module)
    }

    /// The module's context, from cache when fresh.
    ///
    /// If the module's files cannot be listed, the previous entry is kept and
    /// returned; without one an empty, uncached context is returned.
    pub fn context(&self, module: &Module) -> Arc<EnvironmentContext> {
        let generation = self.cache.generation();
        let cached = self.cache.get(module);
        if let Some(entry) = &cached {
            if !self.settings.scan_on_query {
                return Arc::clone(&entry.context);
            }
        }

        let files = match self.scan(module) {
            Ok(files) => files,
            Err(e) => {
                return match cached {
                    Some(entry) => {
                        warn!(module = %module, error = %e, "keeping stale configuration");
                        Arc::clone(&entry.context)
                    }
                    None => {
                        warn!(module = %module, error = %e, "no configuration available");
                        Arc::new(EnvironmentContext::empty(Arc::clone(&self.settings)))
                    }
                };
            }
        };

        let watermark = Watermark::from_times(files.iter().map(|(file, _)| file.modified));
        if let Some(entry) = &cached {
            if !entry.watermark.is_older_than(&watermark) {
                return Arc::clone(&entry.context);
            }
        }

        self.store(module, files, watermark, generation)
    }

    /// Rebuilds the module's context unconditionally and caches it.
    pub fn try_rebuild(&self, module: &Module) -> Result<Arc<EnvironmentContext>, Error> {
        let generation = self.cache.generation();
        let files = self.scan(module)?;
        let watermark = Watermark::from_times(files.iter().map(|(file, _)| file.modified));
        Ok(self.store(module, files, watermark, generation))
    }

    /// Builds a context from `files` and caches it, unless the cache was
    /// evicted after `generation` was taken; then the context is returned
    /// uncached so the next query reads the files again.
    fn store(
        &self,
        module: &Module,
        files: Vec<(ConfigFile, Classified)>,
        watermark: Watermark,
        generation: u64,
    ) -> Arc<EnvironmentContext> {
        let context = Arc::new(self.build_context(module, files));
        debug!(
            module = %module,
            files = watermark.files,
            environments = context.environments().len(),
            "configuration rebuilt"
        );
        let entry = CacheEntry {
            context: Arc::clone(&context),
            watermark,
        };
        if !self.cache.store(module.clone(), entry, generation) {
            debug!(module = %module, "evicted during rebuild, result not cached");
        }
        context
    }

    fn active_in(&self, module: &Module, context: &EnvironmentContext) -> String {
        let profiles = if context.defers_to_build_profiles() {
            self.profiles.active_profiles(module)
        } else {
            Vec::new()
        };
        context.resolve_active(&profiles)
    }

    /// Lists the module's configuration files, base files first, then
    /// overlays; structured before flat within a role, then by name.
    fn scan(&self, module: &Module) -> Result<Vec<(ConfigFile, Classified)>, Error> {
        let listed = self
            .files
            .config_files(module)
            .map_err(|source| Error::Discovery {
                module: module.name().to_string(),
                source,
            })?;

        let mut files: Vec<(ConfigFile, Classified)> = listed
            .into_iter()
            .filter_map(|file| {
                let classified = classify(&file.path, &self.settings)?;
                Some((file, classified))
            })
            .collect();

        files.sort_by(|(a_file, a), (b_file, b)| {
            let rank = |c: &Classified| {
                (
                    matches!(c.role, Role::Overlay(_)),
                    c.format == Format::Flat,
                )
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a_file.path.cmp(&b_file.path))
        });
        Ok(files)
    }

    fn build_context(
        &self,
        module: &Module,
        files: Vec<(ConfigFile, Classified)>,
    ) -> EnvironmentContext {
        let marker = self.settings.placeholder_marker;
        let mut builder = EnvironmentContext::builder(Arc::clone(&self.settings));

        for (file, classified) in files {
            let config = match self.files.read(&file) {
                Ok(bytes) => classified.format.load(&bytes, marker, &file.path.display()),
                Err(e) => {
                    warn!(
                        module = %module,
                        path = %file.path.display(),
                        error = %e,
                        "unreadable configuration file treated as empty"
                    );
                    FlatConfig::new()
                }
            };
            builder = match classified.role {
                Role::Base => builder.with_base(config),
                Role::Overlay(env) => builder.with_overlay(env, config),
            };
        }
        builder.build()
    }
}

/// Builder for [`ConfigResolver`].
///
/// Defaults to [`Settings::default`], the local file system and no build
/// profile integration.
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigResolverBuilder {
    settings: Settings,
    files: Box<dyn ModuleFiles>,
    profiles: Box<dyn ProfileSignal>,
}

impl Default for ConfigResolverBuilder {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            files: Box::new(FsModuleFiles),
            profiles: Box::new(NoProfiles),
        }
    }
}

impl ConfigResolverBuilder {
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_files(mut self, files: impl ModuleFiles + 'static) -> Self {
        self.files = Box::new(files);
        self
    }

    pub fn with_profiles(mut self, profiles: impl ProfileSignal + 'static) -> Self {
        self.profiles = Box::new(profiles);
        self
    }

    pub fn build(self) -> ConfigResolver {
        ConfigResolver {
            settings: Arc::new(self.settings),
            files: self.files,
            profiles: self.profiles,
            cache: ResolutionCache::new(),
        }
    }
}
