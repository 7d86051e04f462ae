//! Native module loading.
//!
//! Every platform detail of opening libraries and resolving symbols stays behind
//! [`ModuleLoader`]; the manager only sees opaque module handles.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use libloading::Library;

/// Model plugin errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to load library {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Missing factory symbol: {0}")]
    MissingSymbol(String),

    #[error("Factory returned no instance")]
    NullInstance,

    #[error("ABI version mismatch: expected {expected}, found {found}")]
    AbiMismatch { expected: u32, found: u32 },

    #[error("Plugin panicked: {0}")]
    Panicked(String),
}

/// Opens libraries and resolves their exported symbols.
pub trait ModuleLoader {
    /// Handle of one open library. Dropping it must not unload anything still in use by
    /// an instance; the manager guarantees instances are gone before [`close`](Self::close).
    type Module;

    fn open(&self, path: &Path) -> Result<Self::Module, ModelError>;

    /// Address of an exported symbol, `None` if the library does not export it.
    fn resolve(&self, module: &Self::Module, symbol: &str) -> Option<*const c_void>;

    fn close(&self, module: Self::Module) {
        drop(module);
    }

    /// Library files in `dir`, sorted by file name.
    fn list_libraries(&self, dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_library_file(path))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        files
    }
}

/// Check if a file is a library based on the platform extension.
pub fn is_library_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(std::env::consts::DLL_EXTENSION))
}

/// [`ModuleLoader`] backed by `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl LibraryLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for LibraryLoader {
    type Module = Library;

    fn open(&self, path: &Path) -> Result<Library, ModelError> {
        // SAFETY: loading runs the library's initialisers; model libraries are trusted
        // the same way any linked code is.
        unsafe { Library::new(path) }.map_err(|e| ModelError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn resolve(&self, module: &Library, symbol: &str) -> Option<*const c_void> {
        // SAFETY: the symbol is read as an address only; callers cast it to the
        // documented factory signature.
        let symbol = unsafe { module.get::<*const c_void>(symbol.as_bytes()) }.ok()?;
        let address = *symbol;
        (!address.is_null()).then_some(address)
    }

    fn close(&self, module: Library) {
        if let Err(e) = module.close() {
            tracing::warn!("Failed to close library: {}", e);
        }
    }
}
