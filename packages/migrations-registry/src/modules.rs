//! Resolution of module-relative migration directories (`@Module/subpath`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RegistryError;

const MODULE_MARKER: char = '@';

/// Maps a module name to its installed root, as known at startup.
pub trait ModuleResolver: Send + Sync {
    fn locate(&self, module: &str) -> Option<PathBuf>;

    /// Names of every module the host knows about, for error reporting.
    fn available(&self) -> Vec<String>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticModuleResolver {
    roots: BTreeMap<String, PathBuf>,
}

impl StaticModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, module: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(module.into(), root.into());
        self
    }

    /// Parses `Name=/path,Other=/path`. Blank entries are skipped.
    pub fn parse(spec: &str) -> Result<Self, RegistryError> {
        let mut resolver = Self::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((name, root)) = entry.split_once('=') else {
                return Err(RegistryError::config(format!(
                    "module entry '{entry}' must look like Name=/path"
                )));
            };
            resolver = resolver.with(name.trim(), root.trim());
        }
        Ok(resolver)
    }
}

impl ModuleResolver for StaticModuleResolver {
    fn locate(&self, module: &str) -> Option<PathBuf> {
        self.roots.get(module).cloned()
    }

    fn available(&self) -> Vec<String> {
        self.roots.keys().cloned().collect()
    }
}

/// Turns `@Module/subpath` into `<module root>/subpath`; other paths pass through.
pub fn resolve_directory(
    path: &str,
    resolver: &dyn ModuleResolver,
) -> Result<PathBuf, RegistryError> {
    let Some(relative) = path.strip_prefix(MODULE_MARKER) else {
        return Ok(PathBuf::from(path));
    };

    let (module, rest) = match relative.find('/') {
        Some(idx) => relative.split_at(idx),
        None => (relative, ""),
    };

    let root = resolver
        .locate(module)
        .ok_or_else(|| RegistryError::UnknownModule {
            module: module.to_string(),
            available: resolver.available(),
        })?;

    let resolved = PathBuf::from(format!("{}{}", display_root(&root), rest));
    debug!(
        "module_path=resolved module={} path={}",
        module,
        resolved.display()
    );
    Ok(resolved)
}

fn display_root(root: &Path) -> String {
    root.to_string_lossy().trim_end_matches('/').to_string()
}
