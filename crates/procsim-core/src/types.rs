//! Shared domain types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an external solver.
///
/// The discriminant is part of both the persisted parameter format and the plugin ABI:
/// it selects which factory symbol a solver library is probed for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum SolverType {
    #[default]
    None = 0,
    Agglomeration = 1,
    Pbm = 2,
}

impl SolverType {
    /// Solver kinds a library can actually provide, in probing order.
    pub const CONCRETE: [SolverType; 2] = [SolverType::Agglomeration, SolverType::Pbm];

    /// Name of the factory symbol exported for this solver kind.
    pub fn factory_symbol(self) -> &'static str {
        match self {
            SolverType::None => "procsim_create_solver_none",
            SolverType::Agglomeration => "procsim_create_agglomeration_solver",
            SolverType::Pbm => "procsim_create_pbm_solver",
        }
    }

    /// Convert from the persisted numeric tag. Unknown tags map to `None`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => SolverType::Agglomeration,
            2 => SolverType::Pbm,
            _ => SolverType::None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverType::None => "none",
            SolverType::Agglomeration => "agglomeration",
            SolverType::Pbm => "pbm",
        };
        f.write_str(name)
    }
}
