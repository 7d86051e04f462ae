//! Core types for ProcSim.
//!
//! This crate holds the two pieces every simulation host needs before it can run a
//! flowsheet: the typed parameter registry owned by each unit, and the models manager
//! that discovers, instantiates and releases unit and solver plugins.

pub mod config;
pub mod error;
pub mod macros;
pub mod models;
pub mod parameter;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use types::SolverType;

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{env_vars, DirConfig, ModelsConfig};

    // Error handling
    pub use crate::error::{Error, Result};

    // Parameters
    pub use crate::parameter::{
        ComboParameter, ConstParameter, DependentValues, Parameter, ParameterKind, ParameterRef,
        ParameterValue, SolverParameter, TdParameter, UnitParametersManager, UNDEFINED_ITEM,
        UP_MAX, UP_MIN,
    };

    // Persistence
    pub use crate::storage::{KeyedStore, MemoryStore, RedbStore, StoreError, StoreValue};

    // Model plugins
    pub use crate::models::{
        LibraryLoader, ModelInfo, ModelsManager, ModuleLoader, Solver, SolverDescriptor,
        SolverHandle, SolverInstance, Unit, UnitDescriptor, UnitHandle, UnitInstance,
        COMPILER_VERSION,
    };
    pub use crate::types::SolverType;
}
