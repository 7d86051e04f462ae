//! Constructing and validating plugin instances.

use std::any::Any;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use super::api::{
    InstanceRecord, SolverFactory, SolverInstance, UnitFactory, UnitInstance, COMPILER_VERSION,
    UNIT_FACTORY_SYMBOL,
};
use super::descriptor::{unify_path, ModelInfo, SolverDescriptor, UnitDescriptor};
use super::loader::{ModelError, ModuleLoader};
use crate::types::SolverType;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Call a factory and take ownership of the record it returns.
///
/// A record with a foreign ABI tag is leaked: its layout cannot be trusted, so neither can
/// its destructor.
///
/// # Safety
///
/// `factory` must follow the instance factory contract: return null or a pointer obtained
/// from `Box::into_raw`.
unsafe fn construct<T: InstanceRecord>(
    factory: unsafe extern "C-unwind" fn() -> *mut T,
) -> Result<Box<T>, ModelError> {
    let raw = panic::catch_unwind(|| unsafe { factory() })
        .map_err(|payload| ModelError::Panicked(panic_message(payload.as_ref())))?;
    if raw.is_null() {
        return Err(ModelError::NullInstance);
    }
    let found = unsafe { T::abi_tag(raw) };
    if found != COMPILER_VERSION {
        return Err(ModelError::AbiMismatch {
            expected: COMPILER_VERSION,
            found,
        });
    }
    Ok(unsafe { Box::from_raw(raw) })
}

fn resolve<L: ModuleLoader>(
    loader: &L,
    module: &L::Module,
    symbol: &str,
) -> Result<*const c_void, ModelError> {
    loader
        .resolve(module, symbol)
        .ok_or_else(|| ModelError::MissingSymbol(symbol.to_string()))
}

/// Construct a unit from an open module.
pub(crate) fn create_unit<L: ModuleLoader>(
    loader: &L,
    module: &L::Module,
) -> Result<Box<UnitInstance>, ModelError> {
    let address = resolve(loader, module, UNIT_FACTORY_SYMBOL)?;
    // SAFETY: the exported symbol is declared with the `UnitFactory` signature.
    unsafe {
        let factory = std::mem::transmute::<*const c_void, UnitFactory>(address);
        construct(factory)
    }
}

/// Construct a solver of the given type from an open module.
pub(crate) fn create_solver<L: ModuleLoader>(
    loader: &L,
    module: &L::Module,
    solver_type: SolverType,
) -> Result<Box<SolverInstance>, ModelError> {
    let address = resolve(loader, module, solver_type.factory_symbol())?;
    // SAFETY: the exported symbol is declared with the `SolverFactory` signature.
    unsafe {
        let factory = std::mem::transmute::<*const c_void, SolverFactory>(address);
        construct(factory)
    }
}

/// Read a descriptor out of a live record, treating a panic as failure.
fn describe<T, D>(
    instance: &T,
    read: impl FnOnce(&T) -> D,
) -> Result<D, ModelError> {
    panic::catch_unwind(AssertUnwindSafe(|| read(instance)))
        .map_err(|payload| ModelError::Panicked(panic_message(payload.as_ref())))
}

pub(crate) fn drop_instance<T>(instance: Box<T>) {
    if panic::catch_unwind(AssertUnwindSafe(move || drop(instance))).is_err() {
        warn!("Model instance panicked while being destroyed");
    }
}

/// Try to read a unit descriptor from `file`. The module stays open.
pub(crate) fn try_unit_descriptor<L: ModuleLoader>(
    loader: &L,
    module: &L::Module,
    file: &Path,
) -> Result<UnitDescriptor, ModelError> {
    let instance = create_unit(loader, module)?;
    let descriptor = describe(instance.as_ref(), |i| {
        let unit = i.unit.as_ref();
        UnitDescriptor {
            info: ModelInfo {
                unique_id: unit.unique_id().to_string(),
                name: unit.name().to_string(),
                author: unit.author().to_string(),
                version: unit.version(),
                file_location: unify_path(file),
                ..Default::default()
            },
            is_dynamic: unit.is_dynamic(),
        }
    });
    drop_instance(instance);
    descriptor
}

/// Try every concrete solver type against `file`, first match wins. The module stays open.
pub(crate) fn try_solver_descriptor<L: ModuleLoader>(
    loader: &L,
    module: &L::Module,
    file: &Path,
) -> Result<SolverDescriptor, ModelError> {
    let mut last_error = ModelError::MissingSymbol("solver factory".to_string());
    for solver_type in SolverType::CONCRETE {
        let instance = match create_solver(loader, module, solver_type) {
            Ok(instance) => instance,
            Err(e) => {
                debug!(file = %file.display(), %solver_type, "No solver: {}", e);
                last_error = e;
                continue;
            }
        };
        let descriptor = describe(instance.as_ref(), |i| {
            let solver = i.solver.as_ref();
            SolverDescriptor {
                info: ModelInfo {
                    unique_id: solver.unique_id().to_string(),
                    name: solver.name().to_string(),
                    author: solver.author().to_string(),
                    version: solver.version(),
                    file_location: unify_path(file),
                    ..Default::default()
                },
                solver_type: solver.solver_type(),
            }
        });
        drop_instance(instance);
        match descriptor {
            Ok(descriptor) => return Ok(descriptor),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}
