// ABOUTME: Two-phase module loader: resolve -> cycle-check -> parse-validate
// -> execute-for-exports, with a canonical-path cache behind a mutex

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Mutex;

use crate::config::ModuleConfig;
use crate::context::{Kwargs, NamespaceCall};
use crate::error::{ModuleErrorKind, RuntimeErrorKind};
use crate::value::Value;

/// A loaded library's exports table. Cached by canonical path, so repeated
/// imports observe the same table identity.
#[derive(Debug)]
pub struct ModuleExports {
    pub library: String,
    pub exports: IndexMap<String, Value>,
}

/// The namespace value an `import ALIAS from "PATH"` binds: members are the
/// exports, method calls resolve through them.
pub struct ModuleNamespace {
    exports: Rc<ModuleExports>,
}

impl ModuleNamespace {
    pub fn new(exports: Rc<ModuleExports>) -> Self {
        ModuleNamespace { exports }
    }
}

impl NamespaceCall for ModuleNamespace {
    fn name(&self) -> &str {
        &self.exports.library
    }

    fn get(&self, member: &str) -> Option<Value> {
        self.exports.exports.get(member).cloned()
    }

    fn invoke(
        &self,
        method: &str,
        _args: &[Value],
        _kwargs: &Kwargs,
    ) -> Result<Value, RuntimeErrorKind> {
        // Exported functions are returned by `get` and called by the
        // interpreter; reaching here means the name isn't exported.
        Err(RuntimeErrorKind::MemberNotExported {
            member: method.to_string(),
            library: self.exports.library.clone(),
        })
    }
}

/// Path resolution, cycle bookkeeping, and the exports cache. Executing a
/// library's declarations is the interpreter's job; the loader only hands
/// out sources and records the results.
pub struct ModuleLoader {
    config: ModuleConfig,
    cache: Mutex<std::collections::HashMap<PathBuf, Rc<ModuleExports>>>,
    loading: Mutex<Vec<PathBuf>>,
}

impl ModuleLoader {
    pub fn new(config: ModuleConfig) -> Self {
        ModuleLoader {
            config,
            cache: Mutex::new(std::collections::HashMap::new()),
            loading: Mutex::new(Vec::new()),
        }
    }

    pub fn strict_imports(&self) -> bool {
        self.config.strict_imports
    }

    /// Resolve an import path to a canonical absolute path. Search order:
    /// importer-relative, `lib/` under the importer, then the configured
    /// roots (project `lib/`, user dir, system dir). First hit wins.
    pub fn resolve(
        &self,
        path_str: &str,
        importer: Option<&Path>,
    ) -> Result<PathBuf, ModuleErrorKind> {
        let requested = Path::new(path_str);
        let mut candidates: Vec<PathBuf> = Vec::new();

        if requested.is_absolute() {
            candidates.push(requested.to_path_buf());
        } else {
            if let Some(importer_dir) = importer.and_then(|p| p.parent()) {
                candidates.push(importer_dir.join(requested));
                candidates.push(importer_dir.join("lib").join(requested));
            } else {
                candidates.push(requested.to_path_buf());
            }
            for root in &self.config.search_roots {
                candidates.push(root.join(requested));
            }
        }

        for candidate in candidates {
            if candidate.is_file() {
                return candidate.canonicalize().map_err(|e| ModuleErrorKind::Io {
                    path: path_str.to_string(),
                    message: e.to_string(),
                });
            }
        }
        Err(ModuleErrorKind::NotFound {
            path: path_str.to_string(),
        })
    }

    pub fn cached(&self, abs: &Path) -> Option<Rc<ModuleExports>> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(abs).cloned())
    }

    /// Push onto the active-loading stack, refusing cycles with the full
    /// chain reported.
    pub fn begin(&self, abs: &Path) -> Result<(), ModuleErrorKind> {
        let mut loading = self
            .loading
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if loading.iter().any(|p| p == abs) {
            let mut cycle: Vec<String> = loading
                .iter()
                .skip_while(|p| *p != abs)
                .map(|p| p.display().to_string())
                .collect();
            cycle.push(abs.display().to_string());
            return Err(ModuleErrorKind::CircularImport { cycle });
        }
        loading.push(abs.to_path_buf());
        Ok(())
    }

    /// Pop without caching; used when the load failed.
    pub fn abort(&self, abs: &Path) {
        let mut loading = self
            .loading
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(idx) = loading.iter().rposition(|p| p == abs) {
            loading.remove(idx);
        }
    }

    /// Pop and insert the exports into the cache.
    pub fn finish(&self, abs: &Path, exports: Rc<ModuleExports>) {
        self.abort(abs);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(abs.to_path_buf(), exports);
        }
    }

    /// Read a module's source through a capability handle on its directory;
    /// only the resolved directory is reachable.
    pub fn read_source(&self, abs: &Path) -> Result<String, ModuleErrorKind> {
        let display = abs.display().to_string();
        let parent = abs.parent().ok_or_else(|| ModuleErrorKind::Io {
            path: display.clone(),
            message: "path has no parent directory".to_string(),
        })?;
        let file_name = abs.file_name().ok_or_else(|| ModuleErrorKind::Io {
            path: display.clone(),
            message: "path has no file name".to_string(),
        })?;

        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
            ModuleErrorKind::Io {
                path: display.clone(),
                message: e.to_string(),
            }
        })?;
        dir.read_to_string(file_name).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ModuleErrorKind::NotFound { path: display }
            } else {
                ModuleErrorKind::Io {
                    path: display,
                    message: e.to_string(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> ModuleLoader {
        ModuleLoader::new(ModuleConfig {
            search_roots: vec![],
            strict_imports: true,
        })
    }

    #[test]
    fn test_cycle_detection() {
        let l = loader();
        let a = PathBuf::from("/tmp/a.flow");
        let b = PathBuf::from("/tmp/b.flow");

        l.begin(&a).unwrap();
        l.begin(&b).unwrap();
        let err = l.begin(&a).unwrap_err();
        match err {
            ModuleErrorKind::CircularImport { cycle } => {
                assert_eq!(cycle.len(), 3);
                assert!(cycle[0].ends_with("a.flow"));
                assert!(cycle[2].ends_with("a.flow"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_finish_caches_and_pops() {
        let l = loader();
        let a = PathBuf::from("/tmp/a.flow");
        l.begin(&a).unwrap();
        let exports = Rc::new(ModuleExports {
            library: "a".to_string(),
            exports: IndexMap::new(),
        });
        l.finish(&a, exports.clone());

        // Re-entering is fine now, and the cache returns the same table.
        l.begin(&a).unwrap();
        l.abort(&a);
        assert!(Rc::ptr_eq(&l.cached(&a).unwrap(), &exports));
    }

    #[test]
    fn test_missing_module() {
        let l = loader();
        let err = l.resolve("definitely_missing.flow", None).unwrap_err();
        assert!(matches!(err, ModuleErrorKind::NotFound { .. }));
    }

    #[test]
    fn test_module_namespace_members() {
        let mut exports = IndexMap::new();
        exports.insert("version".to_string(), Value::Int(1));
        let ns = ModuleNamespace::new(Rc::new(ModuleExports {
            library: "u".to_string(),
            exports,
        }));
        assert!(matches!(ns.get("version"), Some(Value::Int(1))));
        assert!(ns.get("helper").is_none());
        let err = ns.invoke("helper", &[], &Kwargs::new()).unwrap_err();
        assert!(matches!(err, RuntimeErrorKind::MemberNotExported { .. }));
    }
}
