//! Models manager.
//!
//! Discovers unit and solver libraries in an ordered list of directories, keeps their
//! descriptors, and owns every instance created from them together with the module that
//! holds its code.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::api::{Solver, SolverInstance, Unit, UnitInstance};
use super::descriptor::{SolverDescriptor, UnitDescriptor};
use super::loader::{LibraryLoader, ModelError, ModuleLoader};
use super::probe;
use crate::config::{DirConfig, ModelsConfig};

/// One entry of the directory list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelsDir {
    path: PathBuf,
    key: String,
    active: bool,
    /// Whether the directory's current contents are already in the descriptor lists.
    checked: bool,
}

impl ModelsDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }
}

/// Opaque address of a live unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitHandle(u64);

/// Opaque address of a live solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SolverHandle(u64);

impl UnitHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl SolverHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Diagnostic view of a live instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveModel<H> {
    pub handle: H,
    pub key: String,
    pub file_location: PathBuf,
    pub loaded_at: DateTime<Utc>,
}

/// A live instance and the module its code lives in.
struct LoadedModel<I, M> {
    // Must stay declared before `module`: fields drop in declaration order.
    instance: Box<I>,
    module: M,
    key: String,
    file_location: PathBuf,
    loaded_at: DateTime<Utc>,
}

impl<I, M> LoadedModel<I, M> {
    fn live<H>(&self, handle: H) -> LiveModel<H> {
        LiveModel {
            handle,
            key: self.key.clone(),
            file_location: self.file_location.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

/// Destroy the instance, then close its module.
fn release<L: ModuleLoader, I>(loader: &L, model: LoadedModel<I, L::Module>) {
    let LoadedModel {
        instance,
        module,
        key,
        ..
    } = model;
    probe::drop_instance(instance);
    loader.close(module);
    debug!(key = %key, "Released model instance");
}

fn log_rejection(file: &Path, kind: &str, err: &ModelError) {
    match err {
        ModelError::MissingSymbol(_) => debug!(file = %file.display(), "No {} in library: {}", kind, err),
        _ => warn!(file = %file.display(), "Rejected {} library: {}", kind, err),
    }
}

/// Registry of model directories, discovered models and live instances.
pub struct ModelsManager<L: ModuleLoader = LibraryLoader> {
    loader: L,
    /// Directory relative paths fall back to when nothing is found at them directly.
    base_dir: Option<PathBuf>,
    dirs: Vec<ModelsDir>,
    units: Vec<UnitDescriptor>,
    solvers: Vec<SolverDescriptor>,
    live_units: BTreeMap<UnitHandle, LoadedModel<UnitInstance, L::Module>>,
    live_solvers: BTreeMap<SolverHandle, LoadedModel<SolverInstance, L::Module>>,
    next_handle: u64,
}

impl ModelsManager<LibraryLoader> {
    pub fn new() -> Self {
        Self::with_loader(LibraryLoader::new())
    }

    /// Build a manager whose directory list is taken from `config`.
    pub fn from_config(config: &ModelsConfig) -> Self {
        let mut manager = Self::new();
        manager.apply_config(config);
        manager
    }
}

impl Default for ModelsManager<LibraryLoader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ModuleLoader> ModelsManager<L> {
    /// Create a manager using a custom module loader.
    pub fn with_loader(loader: L) -> Self {
        let base_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            loader,
            base_dir,
            dirs: Vec::new(),
            units: Vec::new(),
            solvers: Vec::new(),
            live_units: BTreeMap::new(),
            live_solvers: BTreeMap::new(),
            next_handle: 1,
        }
    }

    /// Set the directory relative model paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Append every directory of `config`, keeping the current ones.
    pub fn apply_config(&mut self, config: &ModelsConfig) {
        for dir in &config.dirs {
            self.add_dir(&dir.path, dir.active);
        }
    }

    /// Current directory list as a configuration.
    pub fn to_config(&self) -> ModelsConfig {
        ModelsConfig {
            dirs: self
                .dirs
                .iter()
                .map(|d| DirConfig::new(d.path.clone(), d.active))
                .collect(),
        }
    }

    // ========== Directories ==========

    pub fn dirs_number(&self) -> usize {
        self.dirs.len()
    }

    pub fn dirs(&self) -> &[ModelsDir] {
        &self.dirs
    }

    /// Append a directory. Returns `false` if the same path is already listed.
    pub fn add_dir(&mut self, path: impl AsRef<Path>, active: bool) -> bool {
        let path = path.as_ref();
        if self.dirs.iter().any(|d| d.path == path) {
            return false;
        }
        let key = self.unique_dir_key();
        self.dirs.push(ModelsDir {
            path: path.to_path_buf(),
            key,
            active,
            checked: false,
        });
        self.update_available_models();
        true
    }

    fn unique_dir_key(&self) -> String {
        loop {
            let key = Uuid::new_v4().simple().to_string();
            if !self.dirs.iter().any(|d| d.key == key) {
                return key;
            }
        }
    }

    pub fn remove_dir(&mut self, index: usize) -> bool {
        if index >= self.dirs.len() {
            return false;
        }
        self.dirs.remove(index);
        self.update_available_models();
        true
    }

    /// Move a directory one step towards the front.
    pub fn up_dir(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.dirs.len() {
            return false;
        }
        self.dirs.swap(index, index - 1);
        self.update_available_models();
        true
    }

    /// Move a directory one step towards the back.
    pub fn down_dir(&mut self, index: usize) -> bool {
        if index + 1 >= self.dirs.len() {
            return false;
        }
        self.dirs.swap(index, index + 1);
        self.update_available_models();
        true
    }

    pub fn dir_path(&self, index: usize) -> Option<&Path> {
        self.dirs.get(index).map(|d| d.path.as_path())
    }

    /// Activity of a directory, `false` for an unknown index.
    pub fn dir_activity(&self, index: usize) -> bool {
        self.dirs.get(index).is_some_and(|d| d.active)
    }

    /// Activating an inactive directory schedules it for a fresh scan.
    pub fn set_dir_activity(&mut self, index: usize, active: bool) {
        let Some(dir) = self.dirs.get_mut(index) else {
            return;
        };
        if active && !dir.active {
            dir.checked = false;
        }
        dir.active = active;
        self.update_available_models();
    }

    /// Forget every directory and descriptor. Live instances are kept.
    pub fn clear(&mut self) {
        self.dirs.clear();
        self.update_available_models();
    }

    /// Rescan every active directory from disk.
    pub fn rescan(&mut self) {
        let active: Vec<String> = self
            .dirs
            .iter_mut()
            .filter(|d| d.active)
            .map(|d| {
                d.checked = false;
                d.key.clone()
            })
            .collect();
        self.units.retain(|u| !active.contains(&u.info.dir_key));
        self.solvers.retain(|s| !active.contains(&s.info.dir_key));
        self.update_available_models();
    }

    // ========== Discovery ==========

    /// Reconcile the descriptor lists with the directory list.
    pub fn update_available_models(&mut self) {
        let positions: HashMap<String, (usize, bool)> = self
            .dirs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.key.clone(), (i, d.active)))
            .collect();
        let is_live = |key: &str| positions.get(key).is_some_and(|(_, active)| *active);
        self.units.retain(|u| is_live(&u.info.dir_key));
        self.solvers.retain(|s| is_live(&s.info.dir_key));

        for i in 0..self.dirs.len() {
            if !self.dirs[i].active || self.dirs[i].checked {
                continue;
            }
            let (mut units, mut solvers) = self.models_list(&self.dirs[i].path);
            let key = &self.dirs[i].key;
            info!(
                dir = %self.dirs[i].path.display(),
                units = units.len(),
                solvers = solvers.len(),
                "Scanned models directory"
            );
            for unit in &mut units {
                unit.info.dir_key = key.clone();
            }
            for solver in &mut solvers {
                solver.info.dir_key = key.clone();
            }
            self.units.append(&mut units);
            self.solvers.append(&mut solvers);
            self.dirs[i].checked = true;
        }

        let position = |key: &str| positions.get(key).map_or(usize::MAX, |(i, _)| *i);
        for unit in &mut self.units {
            unit.info.position = position(&unit.info.dir_key);
        }
        for solver in &mut self.solvers {
            solver.info.position = position(&solver.info.dir_key);
        }
        self.units.sort_by_key(|u| u.info.position);
        self.solvers.sort_by_key(|s| s.info.position);
    }

    /// Models found in `dir`, read as an absolute path first and then relative to the
    /// base directory.
    fn models_list(&self, dir: &Path) -> (Vec<UnitDescriptor>, Vec<SolverDescriptor>) {
        let found = self.models_in_dir(dir);
        if !found.0.is_empty() || !found.1.is_empty() {
            return found;
        }
        match &self.base_dir {
            Some(base) if dir.is_relative() => self.models_in_dir(&base.join(dir)),
            _ => found,
        }
    }

    fn models_in_dir(&self, dir: &Path) -> (Vec<UnitDescriptor>, Vec<SolverDescriptor>) {
        let mut units = Vec::new();
        let mut solvers = Vec::new();
        for file in self.loader.list_libraries(dir) {
            let module = match self.loader.open(&file) {
                Ok(module) => module,
                Err(e) => {
                    warn!("Failed to open {}: {}", file.display(), e);
                    continue;
                }
            };
            match probe::try_unit_descriptor(&self.loader, &module, &file) {
                Ok(unit) => {
                    debug!(file = %file.display(), id = %unit.info.unique_id, "Found unit");
                    units.push(unit);
                }
                Err(unit_err) => {
                    log_rejection(&file, "unit", &unit_err);
                    match probe::try_solver_descriptor(&self.loader, &module, &file) {
                        Ok(solver) => {
                            debug!(file = %file.display(), id = %solver.info.unique_id, "Found solver");
                            solvers.push(solver);
                        }
                        Err(e) => log_rejection(&file, "solver", &e),
                    }
                }
            }
            self.loader.close(module);
        }
        (units, solvers)
    }

    // ========== Descriptors ==========

    pub fn available_units(&self) -> &[UnitDescriptor] {
        &self.units
    }

    pub fn available_solvers(&self) -> &[SolverDescriptor] {
        &self.solvers
    }

    /// First available unit with the given key.
    pub fn unit_descriptor(&self, key: &str) -> Option<&UnitDescriptor> {
        self.units.iter().find(|u| u.info.unique_id == key)
    }

    /// Solver whose library has the same file name as `file_name`.
    pub fn solver_descriptor(&self, file_name: impl AsRef<Path>) -> Option<&SolverDescriptor> {
        let name = file_name.as_ref().file_name()?;
        self.solvers
            .iter()
            .find(|s| s.info.file_location.file_name() == Some(name))
    }

    /// File name of the library providing the solver with the given key.
    pub fn solver_lib_name(&self, key: &str) -> Option<String> {
        self.solvers
            .iter()
            .find(|s| s.info.unique_id == key)
            .and_then(|s| s.info.file_name())
            .map(str::to_string)
    }

    // ========== Instances ==========

    fn next_id(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    /// Open `file` and construct an instance from it. The module is closed again on any
    /// failure.
    fn load_model<I>(
        &self,
        key: &str,
        file: PathBuf,
        create: impl FnOnce(&L, &L::Module) -> Result<Box<I>, ModelError>,
    ) -> Option<LoadedModel<I, L::Module>> {
        let module = match self.loader.open(&file) {
            Ok(module) => module,
            Err(e) => {
                warn!(key, "Failed to open {}: {}", file.display(), e);
                return None;
            }
        };
        match create(&self.loader, &module) {
            Ok(instance) => Some(LoadedModel {
                instance,
                module,
                key: key.to_string(),
                file_location: file,
                loaded_at: Utc::now(),
            }),
            Err(e) => {
                warn!(key, file = %file.display(), "Failed to instantiate model: {}", e);
                self.loader.close(module);
                None
            }
        }
    }

    /// Create a unit from the first library that provides `key`.
    pub fn instantiate_unit(&mut self, key: &str) -> Option<UnitHandle> {
        let files: Vec<PathBuf> = self
            .units
            .iter()
            .filter(|u| u.info.unique_id == key)
            .map(|u| u.info.file_location.clone())
            .collect();
        if files.is_empty() {
            debug!(key, "No such unit available");
            return None;
        }

        let model = files
            .into_iter()
            .find_map(|file| self.load_model(key, file, probe::create_unit))?;
        let handle = UnitHandle(self.next_id());
        info!(key, handle = handle.0, file = %model.file_location.display(), "Instantiated unit");
        self.live_units.insert(handle, model);
        Some(handle)
    }

    /// Create a solver from the first library that provides `key`.
    pub fn instantiate_solver(&mut self, key: &str) -> Option<SolverHandle> {
        let candidates: Vec<_> = self
            .solvers
            .iter()
            .filter(|s| s.info.unique_id == key)
            .map(|s| (s.info.file_location.clone(), s.solver_type))
            .collect();
        if candidates.is_empty() {
            debug!(key, "No such solver available");
            return None;
        }

        let model = candidates.into_iter().find_map(|(file, solver_type)| {
            self.load_model(key, file, |loader, module| {
                probe::create_solver(loader, module, solver_type)
            })
        })?;
        let handle = SolverHandle(self.next_id());
        info!(key, handle = handle.0, file = %model.file_location.display(), "Instantiated solver");
        self.live_solvers.insert(handle, model);
        Some(handle)
    }

    pub fn unit(&self, handle: UnitHandle) -> Option<&dyn Unit> {
        let model = self.live_units.get(&handle)?;
        let unit: &dyn Unit = model.instance.unit.as_ref();
        Some(unit)
    }

    pub fn unit_mut(&mut self, handle: UnitHandle) -> Option<&mut dyn Unit> {
        let model = self.live_units.get_mut(&handle)?;
        let unit: &mut dyn Unit = model.instance.unit.as_mut();
        Some(unit)
    }

    pub fn solver(&self, handle: SolverHandle) -> Option<&dyn Solver> {
        let model = self.live_solvers.get(&handle)?;
        let solver: &dyn Solver = model.instance.solver.as_ref();
        Some(solver)
    }

    pub fn solver_mut(&mut self, handle: SolverHandle) -> Option<&mut dyn Solver> {
        let model = self.live_solvers.get_mut(&handle)?;
        let solver: &mut dyn Solver = model.instance.solver.as_mut();
        Some(solver)
    }

    /// Destroy a unit and close its library. Unknown handles are ignored.
    pub fn free_unit(&mut self, handle: UnitHandle) {
        if let Some(model) = self.live_units.remove(&handle) {
            release(&self.loader, model);
        }
    }

    /// Destroy a solver and close its library. Unknown handles are ignored.
    pub fn free_solver(&mut self, handle: SolverHandle) {
        if let Some(model) = self.live_solvers.remove(&handle) {
            release(&self.loader, model);
        }
    }

    pub fn live_units(&self) -> Vec<LiveModel<UnitHandle>> {
        self.live_units.iter().map(|(h, m)| m.live(*h)).collect()
    }

    pub fn live_solvers(&self) -> Vec<LiveModel<SolverHandle>> {
        self.live_solvers.iter().map(|(h, m)| m.live(*h)).collect()
    }
}

impl<L: ModuleLoader> Drop for ModelsManager<L> {
    fn drop(&mut self) {
        for (_, model) in std::mem::take(&mut self.live_units) {
            release(&self.loader, model);
        }
        for (_, model) in std::mem::take(&mut self.live_solvers) {
            release(&self.loader, model);
        }
    }
}

impl<L: ModuleLoader> std::fmt::Debug for ModelsManager<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelsManager")
            .field("dirs", &self.dirs)
            .field("units", &self.units.len())
            .field("solvers", &self.solvers.len())
            .field("live_units", &self.live_units.len())
            .field("live_solvers", &self.live_solvers.len())
            .finish()
    }
}
