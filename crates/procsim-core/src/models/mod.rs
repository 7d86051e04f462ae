//! Model plugins: discovery, instantiation and release of unit and solver libraries.

mod api;
mod descriptor;
mod loader;
mod manager;
mod probe;

pub use api::{
    InstanceRecord, Solver, SolverFactory, SolverInstance, Unit, UnitFactory, UnitInstance,
    COMPILER_VERSION, UNIT_FACTORY_SYMBOL,
};
pub use descriptor::{ModelInfo, SolverDescriptor, UnitDescriptor};
pub use loader::{is_library_file, LibraryLoader, ModelError, ModuleLoader};
pub use manager::{LiveModel, ModelsDir, ModelsManager, SolverHandle, UnitHandle};
