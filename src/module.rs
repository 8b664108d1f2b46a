//! Modules and the collaborators that describe them.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::source::ConfigFile;

/// A project module: a name plus the resource root holding its
/// configuration files. Cache entries are keyed by the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Module {
    name: String,
    resource_root: PathBuf,
}

impl Module {
    pub fn new(name: impl Into<String>, resource_root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            resource_root: resource_root.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }

    /// Returns true if `path` lies under this module's resource root.
    ///
    /// Paths are compared as given first, then canonicalized, so a relative
    /// root still owns the absolute paths a file watcher reports. A path whose
    /// file no longer exists is resolved through its parent directory.
    pub fn owns(&self, path: &Path) -> bool {
        if path.starts_with(&self.resource_root) {
            return true;
        }
        let Ok(root) = self.resource_root.canonicalize() else {
            return false;
        };
        canonical(path).is_some_and(|path| path.starts_with(root))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn canonical(path: &Path) -> Option<PathBuf> {
    if let Ok(path) = path.canonicalize() {
        return Some(path);
    }
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}

/// File discovery and raw reads for a module.
pub trait ModuleFiles: Send + Sync + fmt::Debug {
    /// Lists candidate files in the module's resource root. Files that are not
    /// configuration files are filtered out by the caller.
    fn config_files(&self, module: &Module) -> io::Result<Vec<ConfigFile>>;

    fn read(&self, file: &ConfigFile) -> io::Result<Vec<u8>>;
}

/// [`ModuleFiles`] backed by the local file system. Only regular files
/// directly under the resource root are reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsModuleFiles;

impl ModuleFiles for FsModuleFiles {
    fn config_files(&self, module: &Module) -> io::Result<Vec<ConfigFile>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(module.resource_root())? {
            let entry = entry?;
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified()?;
            files.push(ConfigFile::new(entry.path(), modified));
        }
        Ok(files)
    }

    fn read(&self, file: &ConfigFile) -> io::Result<Vec<u8>> {
        std::fs::read(&file.path)
    }
}

/// The build tool's currently active profiles for a module, in priority order.
pub trait ProfileSignal: Send + Sync {
    fn active_profiles(&self, module: &Module) -> Vec<String>;
}

/// No build tool integration: never reports a profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProfiles;

impl ProfileSignal for NoProfiles {
    fn active_profiles(&self, _module: &Module) -> Vec<String> {
        Vec::new()
    }
}

/// The same profile list for every module.
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles(pub Vec<String>);

impl ProfileSignal for StaticProfiles {
    fn active_profiles(&self, _module: &Module) -> Vec<String> {
        self.0.clone()
    }
}

impl<F> ProfileSignal for F
where
    F: Fn(&Module) -> Vec<String> + Send + Sync,
{
    fn active_profiles(&self, module: &Module) -> Vec<String> {
        self(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_owns_is_component_wise() {
        let module = Module::new("web", "/project/web/src/main/resources");
        assert!(module.owns(Path::new("/project/web/src/main/resources/application.yml")));
        assert!(!module.owns(Path::new("/project/web/src/main/resources2/application.yml")));
        assert!(!module.owns(Path::new("/project/api/src/main/resources/application.yml")));
    }

    #[test]
    fn test_relative_root_owns_absolute_paths() {
        let temp = TempDir::new_in(".").unwrap();
        std::fs::write(temp.path().join("application.yml"), "a: 1").unwrap();
        let module = Module::new("web", temp.path());
        assert!(module.resource_root().is_relative());

        let absolute = temp.path().canonicalize().unwrap();
        assert!(module.owns(&absolute.join("application.yml")));
        // Deleted files still resolve through their directory.
        assert!(module.owns(&absolute.join("application-gone.yml")));
        assert!(!module.owns(&absolute.with_file_name("elsewhere").join("application.yml")));
    }

    #[test]
    fn test_fs_lists_regular_files_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("application.yml"), "a: 1").unwrap();
        std::fs::create_dir(temp.path().join("static")).unwrap();
        std::fs::write(temp.path().join("static").join("application.yml"), "a: 2").unwrap();

        let module = Module::new("web", temp.path());
        let files = FsModuleFiles.config_files(&module).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, temp.path().join("application.yml"));
        assert_eq!(FsModuleFiles.read(&files[0]).unwrap(), b"a: 1");
    }

    #[test]
    fn test_fs_missing_root_is_an_error() {
        let module = Module::new("gone", "/nonexistent/resources");
        assert!(FsModuleFiles.config_files(&module).is_err());
    }

    #[test]
    fn test_closure_profile_signal() {
        let signal = |module: &Module| vec![format!("{}-profile", module.name())];
        let module = Module::new("web", "/tmp");
        assert_eq!(signal.active_profiles(&module), vec!["web-profile".to_string()]);
        assert!(NoProfiles.active_profiles(&module).is_empty());
        assert_eq!(
            StaticProfiles(vec!["prod".into()]).active_profiles(&module),
            vec!["prod".to_string()]
        );
    }
}
