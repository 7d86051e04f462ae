//! Models manager tests driven by an in-process module loader.
//!
//! Library files are real (empty) files in temporary directories so directory listing and
//! path resolution run for real; opening one hands out the factories registered for its
//! file stem.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr;

use procsim_core::models::{ModelError, UNIT_FACTORY_SYMBOL};
use procsim_core::prelude::*;
use tempfile::TempDir;

thread_local! {
    static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record(event: String) {
    EVENTS.with(|e| e.borrow_mut().push(event));
}

fn take_events() -> Vec<String> {
    EVENTS.with(|e| std::mem::take(&mut *e.borrow_mut()))
}

// ========== Fake models ==========

struct FakeUnit {
    id: &'static str,
    parameters: UnitParametersManager,
}

impl FakeUnit {
    fn new(id: &'static str) -> Self {
        let mut parameters = UnitParametersManager::new();
        parameters.add_const_parameter("rate", "kg/s", "Mass flow", 0.0, 100.0, 1.0);
        Self { id, parameters }
    }
}

impl Drop for FakeUnit {
    fn drop(&mut self) {
        record(format!("drop {}", self.id));
    }
}

impl Unit for FakeUnit {
    fn unique_id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        "Fake unit"
    }

    fn author(&self) -> &str {
        "tests"
    }

    fn version(&self) -> u32 {
        7
    }

    fn is_dynamic(&self) -> bool {
        self.id == "buffer"
    }

    fn parameters(&self) -> &UnitParametersManager {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut UnitParametersManager {
        &mut self.parameters
    }
}

struct FakeSolver;

impl Drop for FakeSolver {
    fn drop(&mut self) {
        record("drop solver".to_string());
    }
}

impl Solver for FakeSolver {
    fn unique_id(&self) -> &str {
        "cell-average"
    }

    fn name(&self) -> &str {
        "Cell average"
    }

    fn author(&self) -> &str {
        "tests"
    }

    fn version(&self) -> u32 {
        2
    }

    fn solver_type(&self) -> SolverType {
        SolverType::Agglomeration
    }
}

fn boxed_unit(id: &'static str) -> *mut UnitInstance {
    Box::into_raw(Box::new(UnitInstance::new(FakeUnit::new(id))))
}

extern "C-unwind" fn create_mixer() -> *mut UnitInstance {
    boxed_unit("mixer")
}

extern "C-unwind" fn create_buffer() -> *mut UnitInstance {
    boxed_unit("buffer")
}

extern "C-unwind" fn create_foreign_unit() -> *mut UnitInstance {
    let mut instance = UnitInstance::new(FakeUnit::new("foreign"));
    instance.compiler_version = COMPILER_VERSION + 1;
    Box::into_raw(Box::new(instance))
}

extern "C-unwind" fn create_panicking_unit() -> *mut UnitInstance {
    panic!("unit constructor failed")
}

extern "C-unwind" fn create_null_unit() -> *mut UnitInstance {
    ptr::null_mut()
}

extern "C-unwind" fn create_solver() -> *mut SolverInstance {
    Box::into_raw(Box::new(SolverInstance::new(FakeSolver)))
}

fn unit_factory(f: extern "C-unwind" fn() -> *mut UnitInstance) -> *const c_void {
    f as *const c_void
}

fn solver_factory(f: extern "C-unwind" fn() -> *mut SolverInstance) -> *const c_void {
    f as *const c_void
}

// ========== Fake loader ==========

#[derive(Default)]
struct FakeLoader {
    libraries: HashMap<String, Vec<(&'static str, *const c_void)>>,
    broken: RefCell<HashSet<String>>,
    broken_dirs: RefCell<Vec<PathBuf>>,
}

struct FakeModule {
    name: String,
    path: PathBuf,
}

impl FakeLoader {
    fn new() -> Self {
        let mut loader = Self::default();
        loader.register("mixer", UNIT_FACTORY_SYMBOL, unit_factory(create_mixer));
        loader.register("buffer", UNIT_FACTORY_SYMBOL, unit_factory(create_buffer));
        loader.register("foreign", UNIT_FACTORY_SYMBOL, unit_factory(create_foreign_unit));
        loader.register("panicky", UNIT_FACTORY_SYMBOL, unit_factory(create_panicking_unit));
        loader.register("null", UNIT_FACTORY_SYMBOL, unit_factory(create_null_unit));
        loader.register(
            "agg",
            SolverType::Agglomeration.factory_symbol(),
            solver_factory(create_solver),
        );
        loader.libraries.insert("empty".to_string(), Vec::new());
        loader
    }

    fn register(&mut self, library: &str, symbol: &'static str, address: *const c_void) {
        self.libraries
            .entry(library.to_string())
            .or_default()
            .push((symbol, address));
    }

    /// Make every symbol of `library` unresolvable from now on.
    fn break_library(&self, library: &str) {
        self.broken.borrow_mut().insert(library.to_string());
    }

    /// Make every library opened from `dir` unresolvable from now on.
    fn break_dir(&self, dir: &Path) {
        self.broken_dirs.borrow_mut().push(dir.to_path_buf());
    }
}

fn stem(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().into_owned()
}

impl ModuleLoader for FakeLoader {
    type Module = FakeModule;

    fn open(&self, path: &Path) -> std::result::Result<FakeModule, ModelError> {
        let name = stem(path);
        if !self.libraries.contains_key(&name) {
            return Err(ModelError::LoadFailed {
                path: path.to_path_buf(),
                reason: "not a library".to_string(),
            });
        }
        record(format!("open {name}"));
        Ok(FakeModule {
            name,
            path: path.to_path_buf(),
        })
    }

    fn resolve(&self, module: &FakeModule, symbol: &str) -> Option<*const c_void> {
        if self.broken.borrow().contains(&module.name)
            || self
                .broken_dirs
                .borrow()
                .iter()
                .any(|dir| module.path.starts_with(dir))
        {
            return None;
        }
        self.libraries[&module.name]
            .iter()
            .find(|(name, _)| *name == symbol)
            .map(|(_, address)| *address)
    }

    fn close(&self, module: FakeModule) {
        record(format!("close {}", module.name));
    }
}

// ========== Helpers ==========

fn library_dir(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    add_library(dir.path(), names);
    dir
}

fn add_library(dir: &Path, names: &[&str]) {
    for name in names {
        let file = dir.join(format!("{name}.{}", std::env::consts::DLL_EXTENSION));
        std::fs::write(file, b"").unwrap();
    }
}

fn manager() -> ModelsManager<FakeLoader> {
    ModelsManager::with_loader(FakeLoader::new())
}

fn unit_ids(manager: &ModelsManager<FakeLoader>) -> Vec<String> {
    manager
        .available_units()
        .iter()
        .map(|u| u.info.unique_id.clone())
        .collect()
}

fn count(events: &[String], event: &str) -> usize {
    events.iter().filter(|e| *e == event).count()
}

// ========== Discovery ==========

#[test]
fn test_discovers_units_and_solvers() {
    let dir = library_dir(&["mixer", "buffer", "agg"]);
    let mut m = manager();
    assert!(m.add_dir(dir.path(), true));

    assert_eq!(unit_ids(&m), vec!["buffer", "mixer"]);
    let buffer = m.unit_descriptor("buffer").unwrap();
    assert!(buffer.is_dynamic);
    assert_eq!(buffer.info.version, 7);
    assert_eq!(buffer.info.dir_key, m.dirs()[0].key());
    assert_eq!(buffer.info.position, 0);

    let solvers = m.available_solvers();
    assert_eq!(solvers.len(), 1);
    assert_eq!(solvers[0].solver_type, SolverType::Agglomeration);
    assert_eq!(solvers[0].info.unique_id, "cell-average");
    assert!(m.dirs()[0].is_checked());
}

#[test]
fn test_probe_modules_are_closed() {
    let dir = library_dir(&["mixer", "agg"]);
    take_events();
    let mut m = manager();
    m.add_dir(dir.path(), true);

    let events = take_events();
    assert_eq!(count(&events, "open mixer"), count(&events, "close mixer"));
    assert_eq!(count(&events, "open agg"), count(&events, "close agg"));
    let drop_at = events.iter().position(|e| e == "drop mixer").unwrap();
    let close_at = events.iter().position(|e| e == "close mixer").unwrap();
    assert!(drop_at < close_at);
}

#[test]
fn test_bad_libraries_do_not_abort_scan() {
    let dir = library_dir(&["foreign", "panicky", "null", "empty", "garbage", "mixer", "agg"]);
    take_events();
    let mut m = manager();
    m.add_dir(dir.path(), true);

    assert_eq!(unit_ids(&m), vec!["mixer"]);
    assert_eq!(m.available_solvers().len(), 1);

    let events = take_events();
    // Instances with a foreign ABI tag are never destroyed by the host.
    assert_eq!(count(&events, "drop foreign"), 0);
    for name in ["foreign", "panicky", "null", "empty"] {
        assert_eq!(count(&events, &format!("close {name}")), 1, "{name}");
    }
}

#[test]
fn test_missing_directory_yields_nothing() {
    let mut m = manager();
    assert!(m.add_dir("/definitely/not/a/models/dir", true));
    assert!(m.available_units().is_empty());
    assert_eq!(m.dirs_number(), 1);
}

#[test]
fn test_relative_dir_resolves_against_base_dir() {
    let base = tempfile::tempdir().unwrap();
    let models = base.path().join("procsim-test-models");
    std::fs::create_dir(&models).unwrap();
    add_library(&models, &["mixer"]);

    let mut m = manager().with_base_dir(base.path());
    m.add_dir("procsim-test-models", true);
    assert_eq!(unit_ids(&m), vec!["mixer"]);
}

// ========== Directories ==========

#[test]
fn test_duplicate_dir_is_rejected() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    assert!(m.add_dir(dir.path(), true));
    assert!(!m.add_dir(dir.path(), false));
    assert_eq!(m.dirs_number(), 1);
    assert!(m.dir_activity(0));
}

#[test]
fn test_dir_keys_are_unique() {
    let a = library_dir(&[]);
    let b = library_dir(&[]);
    let mut m = manager();
    m.add_dir(a.path(), true);
    m.add_dir(b.path(), true);
    assert_ne!(m.dirs()[0].key(), m.dirs()[1].key());
}

#[test]
fn test_order_follows_directories() {
    let first = library_dir(&["mixer"]);
    let second = library_dir(&["buffer"]);
    let mut m = manager();
    m.add_dir(first.path(), true);
    m.add_dir(second.path(), true);
    assert_eq!(unit_ids(&m), vec!["mixer", "buffer"]);

    assert!(m.up_dir(1));
    assert_eq!(unit_ids(&m), vec!["buffer", "mixer"]);
    assert_eq!(m.unit_descriptor("mixer").unwrap().info.position, 1);
    assert_eq!(m.dir_path(0), Some(second.path()));

    assert!(m.down_dir(0));
    assert_eq!(unit_ids(&m), vec!["mixer", "buffer"]);

    assert!(!m.up_dir(0));
    assert!(!m.down_dir(1));
    assert!(!m.up_dir(5));
    assert!(!m.down_dir(5));
}

#[test]
fn test_remove_dir_drops_its_models() {
    let first = library_dir(&["mixer"]);
    let second = library_dir(&["buffer", "agg"]);
    let mut m = manager();
    m.add_dir(first.path(), true);
    m.add_dir(second.path(), true);

    assert!(m.remove_dir(1));
    assert_eq!(unit_ids(&m), vec!["mixer"]);
    assert!(m.available_solvers().is_empty());
    assert!(!m.remove_dir(1));
}

#[test]
fn test_deactivation_hides_and_reactivation_rescans() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    take_events();

    m.set_dir_activity(0, false);
    assert!(!m.dir_activity(0));
    assert!(m.available_units().is_empty());

    m.set_dir_activity(0, true);
    assert_eq!(unit_ids(&m), vec!["mixer"]);
    assert_eq!(count(&take_events(), "open mixer"), 1);
}

#[test]
fn test_deactivating_one_dir_keeps_the_others() {
    let first = library_dir(&["mixer", "agg"]);
    let second = library_dir(&["buffer"]);
    let mut m = manager();
    m.add_dir(first.path(), true);
    m.add_dir(second.path(), true);
    assert_eq!(unit_ids(&m), vec!["mixer", "buffer"]);
    let buffer_before = m.unit_descriptor("buffer").unwrap().clone();
    take_events();

    m.set_dir_activity(0, false);
    assert_eq!(unit_ids(&m), vec!["buffer"]);
    assert!(m.available_solvers().is_empty());
    assert_eq!(m.unit_descriptor("buffer"), Some(&buffer_before));
    assert!(take_events().is_empty());

    m.set_dir_activity(0, true);
    assert_eq!(unit_ids(&m), vec!["mixer", "buffer"]);
    assert_eq!(m.available_solvers().len(), 1);
    let events = take_events();
    assert_eq!(count(&events, "open mixer"), 1);
    assert_eq!(count(&events, "open buffer"), 0);
}

#[test]
fn test_repeated_activation_does_not_rescan() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    take_events();

    m.set_dir_activity(0, true);
    assert!(take_events().is_empty());
    assert_eq!(unit_ids(&m), vec!["mixer"]);
}

#[test]
fn test_inactive_dir_is_not_scanned() {
    let dir = library_dir(&["mixer"]);
    take_events();
    let mut m = manager();
    m.add_dir(dir.path(), false);
    assert!(m.available_units().is_empty());
    assert!(take_events().is_empty());
    assert!(!m.dirs()[0].is_checked());
}

#[test]
fn test_rescan_picks_up_new_libraries() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);

    add_library(dir.path(), &["buffer"]);
    m.update_available_models();
    assert_eq!(unit_ids(&m), vec!["mixer"]);

    m.rescan();
    assert_eq!(unit_ids(&m), vec!["buffer", "mixer"]);
}

#[test]
fn test_clear_forgets_dirs_and_models() {
    let dir = library_dir(&["mixer", "agg"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    let handle = m.instantiate_unit("mixer").unwrap();

    m.clear();
    assert_eq!(m.dirs_number(), 0);
    assert!(m.available_units().is_empty());
    assert!(m.available_solvers().is_empty());
    assert!(m.unit(handle).is_some());
}

#[test]
fn test_config_round_trip() {
    let a = library_dir(&["mixer"]);
    let b = library_dir(&[]);
    let mut m = manager();
    m.add_dir(a.path(), true);
    m.add_dir(b.path(), false);

    let config = m.to_config();
    assert_eq!(config.dirs.len(), 2);
    assert!(!config.dirs[1].active);

    let mut restored = manager();
    restored.apply_config(&config);
    assert_eq!(restored.to_config(), config);
    assert_eq!(unit_ids(&restored), vec!["mixer"]);
}

// ========== Descriptors ==========

#[test]
fn test_solver_lookups_by_file_and_key() {
    let dir = library_dir(&["agg"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);

    let file = format!("agg.{}", std::env::consts::DLL_EXTENSION);
    let descriptor = m.solver_descriptor(&file).unwrap();
    assert_eq!(descriptor.info.unique_id, "cell-average");
    let full = PathBuf::from("/elsewhere").join(&file);
    assert!(m.solver_descriptor(full).is_some());
    assert!(m.solver_descriptor("other.so").is_none());

    assert_eq!(m.solver_lib_name("cell-average"), Some(file));
    assert_eq!(m.solver_lib_name("unknown"), None);
    assert!(m.unit_descriptor("cell-average").is_none());
}

// ========== Instances ==========

#[test]
fn test_unknown_key_records_nothing() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    take_events();

    assert!(m.instantiate_unit("nope").is_none());
    assert!(m.instantiate_solver("mixer").is_none());
    assert!(m.live_units().is_empty());
    assert!(m.live_solvers().is_empty());
    assert!(take_events().is_empty());
}

#[test]
fn test_free_destroys_instance_before_closing_module() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    take_events();

    let handle = m.instantiate_unit("mixer").unwrap();
    assert_eq!(take_events(), vec!["open mixer"]);
    assert_eq!(m.live_units().len(), 1);
    assert_eq!(m.live_units()[0].key, "mixer");

    m.free_unit(handle);
    assert_eq!(take_events(), vec!["drop mixer", "close mixer"]);
    assert!(m.unit(handle).is_none());

    m.free_unit(handle);
    assert!(take_events().is_empty());
}

#[test]
fn test_each_instance_keeps_its_own_module() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    take_events();

    let a = m.instantiate_unit("mixer").unwrap();
    let b = m.instantiate_unit("mixer").unwrap();
    assert_ne!(a, b);
    assert_eq!(count(&take_events(), "open mixer"), 2);

    m.free_unit(a);
    assert!(m.unit(b).is_some());
    assert_eq!(take_events(), vec!["drop mixer", "close mixer"]);
}

#[test]
fn test_unit_parameters_are_reachable() {
    let dir = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    let handle = m.instantiate_unit("mixer").unwrap();

    let unit = m.unit_mut(handle).unwrap();
    unit.parameters_mut()
        .const_parameter_mut("rate")
        .unwrap()
        .set_value(42.0);
    assert_eq!(m.unit(handle).unwrap().parameters().const_value("rate"), 42.0);
    assert_eq!(m.unit(handle).unwrap().unique_id(), "mixer");
}

#[test]
fn test_failed_candidate_falls_through_to_next() {
    let first = library_dir(&["mixer"]);
    let second = tempfile::tempdir().unwrap();
    let mut m = manager();
    m.add_dir(first.path(), true);
    m.add_dir(second.path(), true);

    // Same unit provided twice; only the second library stays usable.
    let copy = second
        .path()
        .join(format!("mixer.{}", std::env::consts::DLL_EXTENSION));
    std::fs::write(&copy, b"").unwrap();
    m.rescan();
    assert_eq!(unit_ids(&m), vec!["mixer", "mixer"]);

    m.loader().break_library("mixer");
    take_events();
    assert!(m.instantiate_unit("mixer").is_none());
    let events = take_events();
    assert_eq!(count(&events, "open mixer"), 2);
    assert_eq!(count(&events, "close mixer"), 2);
    assert!(m.live_units().is_empty());
}

#[test]
fn test_broken_first_candidate_uses_second_library() {
    let first = library_dir(&["mixer"]);
    let second = library_dir(&["mixer"]);
    let mut m = manager();
    m.add_dir(first.path(), true);
    m.add_dir(second.path(), true);
    assert_eq!(unit_ids(&m), vec!["mixer", "mixer"]);

    m.loader().break_dir(first.path());
    take_events();
    let handle = m.instantiate_unit("mixer").unwrap();
    assert_eq!(
        take_events(),
        vec!["open mixer", "close mixer", "open mixer"]
    );

    let live = m.live_units();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].handle, handle);
    assert!(live[0].file_location.starts_with(second.path()));
    assert!(!live[0].file_location.starts_with(first.path()));
    assert_eq!(m.unit(handle).unwrap().unique_id(), "mixer");
}

#[test]
fn test_solver_lifecycle() {
    let dir = library_dir(&["agg"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    take_events();

    let handle = m.instantiate_solver("cell-average").unwrap();
    assert_eq!(m.solver(handle).unwrap().solver_type(), SolverType::Agglomeration);
    assert_eq!(m.live_solvers().len(), 1);

    m.free_solver(handle);
    assert_eq!(take_events(), vec!["open agg", "drop solver", "close agg"]);
    m.free_solver(handle);
    assert!(m.solver(handle).is_none());
}

#[test]
fn test_drop_releases_live_instances() {
    let dir = library_dir(&["mixer", "agg"]);
    let mut m = manager();
    m.add_dir(dir.path(), true);
    m.instantiate_unit("mixer").unwrap();
    m.instantiate_solver("cell-average").unwrap();
    take_events();

    drop(m);
    assert_eq!(
        take_events(),
        vec!["drop mixer", "close mixer", "drop solver", "close agg"]
    );
}
