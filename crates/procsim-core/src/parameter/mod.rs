//! Unit parameters.
//!
//! A unit exposes its configurable inputs through a [`UnitParametersManager`]. Each
//! [`Parameter`] carries one of eight payload kinds; group parameters additionally
//! drive the visibility of other parameters through the manager's group map.

mod dependent;
mod persist;
mod registry;
mod value;

pub use dependent::DependentValues;
pub use persist::{
    COMBO_SAVE_VERSION, COMPOUND_SAVE_VERSION, CONST_SAVE_VERSION, CHECKBOX_SAVE_VERSION,
    GROUP_SAVE_VERSION, MANAGER_SAVE_VERSION, SOLVER_SAVE_VERSION, STRING_SAVE_VERSION,
    TD_SAVE_VERSION,
};
pub use registry::{GroupMap, UnitParametersManager};
pub use value::{
    CheckboxParameter, ComboParameter, CompoundParameter, ConstParameter, Parameter,
    ParameterKind, ParameterValue, SolverParameter, StringParameter, TdParameter,
};

/// Lower bound used when a numeric parameter is declared without one.
pub const UP_MIN: f64 = -f64::MAX;
/// Upper bound used when a numeric parameter is declared without one.
pub const UP_MAX: f64 = f64::MAX;
/// Combo selection meaning "nothing selected".
pub const UNDEFINED_ITEM: usize = usize::MAX;

/// Address of a parameter inside a manager: its stable index or its unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ParameterRef<'_> {
    fn from(index: usize) -> Self {
        ParameterRef::Index(index)
    }
}

impl<'a> From<&'a str> for ParameterRef<'a> {
    fn from(name: &'a str) -> Self {
        ParameterRef::Name(name)
    }
}

impl<'a> From<&'a String> for ParameterRef<'a> {
    fn from(name: &'a String) -> Self {
        ParameterRef::Name(name.as_str())
    }
}

impl<'a> From<&'a Parameter> for ParameterRef<'a> {
    fn from(parameter: &'a Parameter) -> Self {
        ParameterRef::Name(parameter.name())
    }
}
