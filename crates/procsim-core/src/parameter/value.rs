//! Parameter kinds and their payloads.

use std::collections::BTreeMap;
use std::fmt;

use super::dependent::DependentValues;
use super::{UNDEFINED_ITEM, UP_MAX, UP_MIN};
use crate::types::SolverType;

/// Kind of a unit parameter. The discriminant is the persisted type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ParameterKind {
    TimeDependent = 1,
    Constant = 2,
    String = 3,
    Checkbox = 4,
    Solver = 5,
    Combo = 6,
    Group = 7,
    Compound = 8,
}

impl ParameterKind {
    pub fn from_u32(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => ParameterKind::TimeDependent,
            2 => ParameterKind::Constant,
            3 => ParameterKind::String,
            4 => ParameterKind::Checkbox,
            5 => ParameterKind::Solver,
            6 => ParameterKind::Combo,
            7 => ParameterKind::Group,
            8 => ParameterKind::Compound,
            _ => return None,
        })
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::TimeDependent => "time-dependent",
            ParameterKind::Constant => "constant",
            ParameterKind::String => "string",
            ParameterKind::Checkbox => "checkbox",
            ParameterKind::Solver => "solver",
            ParameterKind::Combo => "combo",
            ParameterKind::Group => "group",
            ParameterKind::Compound => "compound",
        };
        f.write_str(name)
    }
}

/// Scalar value with inclusive bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstParameter {
    value: f64,
    min: f64,
    max: f64,
}

impl ConstParameter {
    pub fn new(min: f64, max: f64, value: f64) -> Self {
        Self { value, min, max }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_min(&mut self, min: f64) {
        self.min = min;
    }

    pub fn set_max(&mut self, max: f64) {
        self.max = max;
    }

    pub fn is_in_bounds(&self) -> bool {
        self.min <= self.value && self.value <= self.max
    }

    pub fn clear(&mut self) {
        self.value = 0.0;
    }
}

impl Default for ConstParameter {
    fn default() -> Self {
        Self::new(UP_MIN, UP_MAX, 0.0)
    }
}

/// Time-dependent curve with bounds applied to every value.
#[derive(Debug, Clone, PartialEq)]
pub struct TdParameter {
    values: DependentValues,
    min: f64,
    max: f64,
}

impl TdParameter {
    /// New curve holding `value` at time zero.
    pub fn new(min: f64, max: f64, value: f64) -> Self {
        let mut values = DependentValues::new();
        values.set_value(0.0, value);
        Self { values, min, max }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn set_min(&mut self, min: f64) {
        self.min = min;
    }

    pub fn set_max(&mut self, max: f64) {
        self.max = max;
    }

    /// Interpolated value at `time`, `0.0` if the curve is empty.
    pub fn value(&self, time: f64) -> f64 {
        self.values.value(time)
    }

    pub fn set_value(&mut self, time: f64, value: f64) {
        self.values.set_value(time, value);
    }

    pub fn remove_value(&mut self, time: f64) {
        self.values.remove_value(time);
    }

    pub fn times(&self) -> Vec<f64> {
        self.values.times()
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.values()
    }

    pub fn data(&self) -> &DependentValues {
        &self.values
    }

    pub(crate) fn set_data(&mut self, values: DependentValues) {
        self.values = values;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_in_bounds(&self) -> bool {
        self.values
            .iter()
            .all(|(_, v)| self.min <= v && v <= self.max)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Default for TdParameter {
    fn default() -> Self {
        Self {
            values: DependentValues::new(),
            min: UP_MIN,
            max: UP_MAX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringParameter {
    value: String,
}

impl StringParameter {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckboxParameter {
    checked: bool,
}

impl CheckboxParameter {
    pub fn new(checked: bool) -> Self {
        Self { checked }
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn set_checked(&mut self, checked: bool) {
        self.checked = checked;
    }

    pub fn clear(&mut self) {
        self.checked = false;
    }
}

/// Reference to an external solver, resolved by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverParameter {
    key: String,
    solver_type: SolverType,
}

impl SolverParameter {
    pub fn new(solver_type: SolverType) -> Self {
        Self {
            key: String::new(),
            solver_type,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn set_solver_type(&mut self, solver_type: SolverType) {
        self.solver_type = solver_type;
    }

    pub fn clear(&mut self) {
        self.key.clear();
        self.solver_type = SolverType::None;
    }
}

/// Selection of one item out of a fixed `item-id -> name` map.
///
/// Also used as the payload of group parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ComboParameter {
    items: BTreeMap<usize, String>,
    selected: usize,
}

impl ComboParameter {
    /// Items are paired with names positionally; surplus entries of the longer list are ignored.
    pub fn new(default_item: usize, items: &[usize], names: &[String]) -> Self {
        Self {
            items: items.iter().copied().zip(names.iter().cloned()).collect(),
            selected: default_item,
        }
    }

    pub fn value(&self) -> usize {
        self.selected
    }

    pub fn set_value(&mut self, item: usize) {
        self.selected = item;
    }

    pub fn items(&self) -> Vec<usize> {
        self.items.keys().copied().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.items.values().cloned().collect()
    }

    pub fn item_map(&self) -> &BTreeMap<usize, String> {
        &self.items
    }

    pub(crate) fn set_items(&mut self, items: BTreeMap<usize, String>) {
        self.items = items;
    }

    /// Item id carrying `name`, or [`UNDEFINED_ITEM`].
    pub fn item_by_name(&self, name: &str) -> usize {
        self.items
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
            .unwrap_or(UNDEFINED_ITEM)
    }

    pub fn has_item(&self, item: usize) -> bool {
        self.items.contains_key(&item)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.items.values().any(|n| n == name)
    }

    pub fn is_in_bounds(&self) -> bool {
        self.has_item(self.selected)
    }

    pub fn clear(&mut self) {
        self.selected = UNDEFINED_ITEM;
    }
}

impl Default for ComboParameter {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            selected: UNDEFINED_ITEM,
        }
    }
}

/// Key into the global compounds table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompoundParameter {
    key: String,
}

impl CompoundParameter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub fn clear(&mut self) {
        self.key.clear();
    }
}

/// Kind-specific payload of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    TimeDependent(TdParameter),
    Constant(ConstParameter),
    String(StringParameter),
    Checkbox(CheckboxParameter),
    Solver(SolverParameter),
    Combo(ComboParameter),
    Group(ComboParameter),
    Compound(CompoundParameter),
}

impl ParameterValue {
    /// Empty payload of the given kind, used when loading parameters that do not exist yet.
    pub fn default_for(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::TimeDependent => ParameterValue::TimeDependent(TdParameter::default()),
            ParameterKind::Constant => ParameterValue::Constant(ConstParameter::default()),
            ParameterKind::String => ParameterValue::String(StringParameter::default()),
            ParameterKind::Checkbox => ParameterValue::Checkbox(CheckboxParameter::default()),
            ParameterKind::Solver => ParameterValue::Solver(SolverParameter::default()),
            ParameterKind::Combo => ParameterValue::Combo(ComboParameter::default()),
            ParameterKind::Group => ParameterValue::Group(ComboParameter::default()),
            ParameterKind::Compound => ParameterValue::Compound(CompoundParameter::default()),
        }
    }

    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::TimeDependent(_) => ParameterKind::TimeDependent,
            ParameterValue::Constant(_) => ParameterKind::Constant,
            ParameterValue::String(_) => ParameterKind::String,
            ParameterValue::Checkbox(_) => ParameterKind::Checkbox,
            ParameterValue::Solver(_) => ParameterKind::Solver,
            ParameterValue::Combo(_) => ParameterKind::Combo,
            ParameterValue::Group(_) => ParameterKind::Group,
            ParameterValue::Compound(_) => ParameterKind::Compound,
        }
    }
}

/// A named, described unit parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    units: String,
    description: String,
    value: ParameterValue,
}

macro_rules! typed_access {
    ($as_ref:ident, $as_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $as_ref(&self) -> Option<&$ty> {
            match &self.value {
                ParameterValue::$variant(p) => Some(p),
                _ => None,
            }
        }

        pub fn $as_mut(&mut self) -> Option<&mut $ty> {
            match &mut self.value {
                ParameterValue::$variant(p) => Some(p),
                _ => None,
            }
        }
    };
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        description: impl Into<String>,
        value: ParameterValue,
    ) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            description: description.into(),
            value,
        }
    }

    pub fn kind(&self) -> ParameterKind {
        self.value.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_units(&mut self, units: impl Into<String>) {
        self.units = units.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut ParameterValue {
        &mut self.value
    }

    /// Whether all stored values satisfy the kind's bounds.
    pub fn is_in_bounds(&self) -> bool {
        match &self.value {
            ParameterValue::Constant(p) => p.is_in_bounds(),
            ParameterValue::TimeDependent(p) => p.is_in_bounds(),
            ParameterValue::Combo(p) | ParameterValue::Group(p) => p.is_in_bounds(),
            _ => true,
        }
    }

    /// Reset the payload to its empty state. Name, units and description are kept.
    pub fn clear(&mut self) {
        match &mut self.value {
            ParameterValue::TimeDependent(p) => p.clear(),
            ParameterValue::Constant(p) => p.clear(),
            ParameterValue::String(p) => p.clear(),
            ParameterValue::Checkbox(p) => p.clear(),
            ParameterValue::Solver(p) => p.clear(),
            ParameterValue::Combo(p) | ParameterValue::Group(p) => p.clear(),
            ParameterValue::Compound(p) => p.clear(),
        }
    }

    typed_access!(as_const, as_const_mut, Constant, ConstParameter);
    typed_access!(as_td, as_td_mut, TimeDependent, TdParameter);
    typed_access!(as_string, as_string_mut, String, StringParameter);
    typed_access!(as_checkbox, as_checkbox_mut, Checkbox, CheckboxParameter);
    typed_access!(as_solver, as_solver_mut, Solver, SolverParameter);
    typed_access!(as_combo, as_combo_mut, Combo, ComboParameter);
    typed_access!(as_group, as_group_mut, Group, ComboParameter);
    typed_access!(as_compound, as_compound_mut, Compound, CompoundParameter);
}
