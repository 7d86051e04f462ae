//! Registry of the parameters of one unit.

use std::collections::BTreeMap;

use super::value::{
    CheckboxParameter, ComboParameter, CompoundParameter, ConstParameter, Parameter,
    ParameterValue, SolverParameter, StringParameter, TdParameter,
};
use super::{ParameterRef, UNDEFINED_ITEM};
use crate::types::SolverType;

/// `parameter index -> block index -> group ids`.
///
/// A parameter without an entry is always active.
pub type GroupMap = BTreeMap<usize, BTreeMap<usize, Vec<usize>>>;

/// Owns the parameters of a unit and their group memberships.
///
/// Parameters are addressed by insertion index or by their unique name. A block is a
/// group parameter; each of its items is a group. A parameter registered under
/// `(block, group)` is active while the block selects that group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitParametersManager {
    parameters: Vec<Parameter>,
    groups: GroupMap,
}

macro_rules! typed_getters {
    ($get:ident, $get_mut:ident, $as_ref:ident, $as_mut:ident, $ty:ty) => {
        pub fn $get<'a>(&self, key: impl Into<ParameterRef<'a>>) -> Option<&$ty> {
            self.parameter(key).and_then(Parameter::$as_ref)
        }

        pub fn $get_mut<'a>(&mut self, key: impl Into<ParameterRef<'a>>) -> Option<&mut $ty> {
            self.parameter_mut(key).and_then(Parameter::$as_mut)
        }
    };
}

impl UnitParametersManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name() == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name() == name)
    }

    fn resolve(&self, key: ParameterRef<'_>) -> Option<usize> {
        match key {
            ParameterRef::Index(i) if i < self.parameters.len() => Some(i),
            ParameterRef::Index(_) => None,
            ParameterRef::Name(name) => self.index_of(name),
        }
    }

    /// Append a parameter unless one with the same name exists. Returns its index.
    pub(crate) fn push_parameter(&mut self, parameter: Parameter) -> Option<usize> {
        if self.name_exists(parameter.name()) {
            return None;
        }
        self.parameters.push(parameter);
        Some(self.parameters.len() - 1)
    }

    pub fn add_const_parameter(
        &mut self,
        name: &str,
        units: &str,
        description: &str,
        min: f64,
        max: f64,
        value: f64,
    ) {
        let payload = ConstParameter::new(min, max, value);
        self.push_parameter(Parameter::new(name, units, description, ParameterValue::Constant(payload)));
    }

    /// Adds a time-dependent parameter holding `value` at time zero.
    pub fn add_td_parameter(
        &mut self,
        name: &str,
        units: &str,
        description: &str,
        min: f64,
        max: f64,
        value: f64,
    ) {
        let payload = TdParameter::new(min, max, value);
        self.push_parameter(Parameter::new(
            name,
            units,
            description,
            ParameterValue::TimeDependent(payload),
        ));
    }

    pub fn add_string_parameter(&mut self, name: &str, description: &str, value: &str) {
        let payload = StringParameter::new(value);
        self.push_parameter(Parameter::new(name, "", description, ParameterValue::String(payload)));
    }

    pub fn add_checkbox_parameter(&mut self, name: &str, description: &str, checked: bool) {
        let payload = CheckboxParameter::new(checked);
        self.push_parameter(Parameter::new(name, "", description, ParameterValue::Checkbox(payload)));
    }

    pub fn add_solver_parameter(&mut self, name: &str, description: &str, solver_type: SolverType) {
        let payload = SolverParameter::new(solver_type);
        self.push_parameter(Parameter::new(name, "", description, ParameterValue::Solver(payload)));
    }

    pub fn add_combo_parameter(
        &mut self,
        name: &str,
        description: &str,
        default_item: usize,
        items: &[usize],
        names: &[String],
    ) {
        let payload = ComboParameter::new(default_item, items, names);
        self.push_parameter(Parameter::new(name, "", description, ParameterValue::Combo(payload)));
    }

    pub fn add_group_parameter(
        &mut self,
        name: &str,
        description: &str,
        default_item: usize,
        items: &[usize],
        names: &[String],
    ) {
        let payload = ComboParameter::new(default_item, items, names);
        self.push_parameter(Parameter::new(name, "", description, ParameterValue::Group(payload)));
    }

    pub fn add_compound_parameter(&mut self, name: &str, description: &str) {
        let payload = CompoundParameter::new();
        self.push_parameter(Parameter::new(name, "", description, ParameterValue::Compound(payload)));
    }

    /// All parameters in index order.
    pub fn all_parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn parameter<'a>(&self, key: impl Into<ParameterRef<'a>>) -> Option<&Parameter> {
        self.resolve(key.into()).map(|i| &self.parameters[i])
    }

    pub fn parameter_mut<'a>(&mut self, key: impl Into<ParameterRef<'a>>) -> Option<&mut Parameter> {
        self.resolve(key.into()).map(move |i| &mut self.parameters[i])
    }

    typed_getters!(const_parameter, const_parameter_mut, as_const, as_const_mut, ConstParameter);
    typed_getters!(td_parameter, td_parameter_mut, as_td, as_td_mut, TdParameter);
    typed_getters!(string_parameter, string_parameter_mut, as_string, as_string_mut, StringParameter);
    typed_getters!(checkbox_parameter, checkbox_parameter_mut, as_checkbox, as_checkbox_mut, CheckboxParameter);
    typed_getters!(solver_parameter, solver_parameter_mut, as_solver, as_solver_mut, SolverParameter);
    typed_getters!(combo_parameter, combo_parameter_mut, as_combo, as_combo_mut, ComboParameter);
    typed_getters!(group_parameter, group_parameter_mut, as_group, as_group_mut, ComboParameter);
    typed_getters!(compound_parameter, compound_parameter_mut, as_compound, as_compound_mut, CompoundParameter);

    // Value getters fall back to the kind's empty value so host code can read
    // parameters without branching on presence.

    pub fn const_value<'a>(&self, key: impl Into<ParameterRef<'a>>) -> f64 {
        self.const_parameter(key).map_or(0.0, ConstParameter::value)
    }

    pub fn td_value<'a>(&self, key: impl Into<ParameterRef<'a>>, time: f64) -> f64 {
        self.td_parameter(key).map_or(0.0, |p| p.value(time))
    }

    pub fn string_value<'a>(&self, key: impl Into<ParameterRef<'a>>) -> String {
        self.string_parameter(key)
            .map(|p| p.value().to_string())
            .unwrap_or_default()
    }

    pub fn checkbox_value<'a>(&self, key: impl Into<ParameterRef<'a>>) -> bool {
        self.checkbox_parameter(key)
            .is_some_and(CheckboxParameter::is_checked)
    }

    pub fn solver_value<'a>(&self, key: impl Into<ParameterRef<'a>>) -> String {
        self.solver_parameter(key)
            .map(|p| p.key().to_string())
            .unwrap_or_default()
    }

    pub fn combo_value<'a>(&self, key: impl Into<ParameterRef<'a>>) -> usize {
        self.combo_parameter(key)
            .map_or(UNDEFINED_ITEM, ComboParameter::value)
    }

    pub fn group_value<'a>(&self, key: impl Into<ParameterRef<'a>>) -> usize {
        self.group_parameter(key)
            .map_or(UNDEFINED_ITEM, ComboParameter::value)
    }

    pub fn compound_value<'a>(&self, key: impl Into<ParameterRef<'a>>) -> String {
        self.compound_parameter(key)
            .map(|p| p.key().to_string())
            .unwrap_or_default()
    }

    /// Every solver parameter, in index order.
    pub fn all_solver_parameters(&self) -> Vec<&SolverParameter> {
        self.parameters.iter().filter_map(Parameter::as_solver).collect()
    }

    /// Sorted, de-duplicated time points of all time-dependent parameters within
    /// `[t_beg, t_end]`.
    pub fn all_time_points(&self, t_beg: f64, t_end: f64) -> Vec<f64> {
        let mut points: Vec<f64> = self
            .parameters
            .iter()
            .filter_map(Parameter::as_td)
            .flat_map(|p| p.data().iter().map(|(t, _)| t))
            .filter(|t| *t >= t_beg && *t <= t_end)
            .collect();
        points.sort_by(f64::total_cmp);
        points.dedup();
        points
    }

    /// Register `parameters` under `group` of the group parameter at index `block`.
    ///
    /// Does nothing unless the block is a group parameter, the group is one of its items
    /// and every parameter exists.
    pub fn add_parameters_to_group(&mut self, block: usize, group: usize, parameters: &[usize]) {
        let Some(block_param) = self.group_parameter(block) else {
            return;
        };
        if !block_param.has_item(group) {
            return;
        }
        if parameters.iter().any(|&p| p >= self.parameters.len()) {
            return;
        }
        for &parameter in parameters {
            self.add_to_group(parameter, block, group);
        }
    }

    /// Name-based variant of [`add_parameters_to_group`](Self::add_parameters_to_group);
    /// `group` is the display name of the block's item.
    pub fn add_parameters_to_group_by_name(&mut self, block: &str, group: &str, parameters: &[&str]) {
        let Some(block_index) = self.index_of(block) else {
            return;
        };
        let Some(group_id) = self
            .group_parameter(block_index)
            .map(|g| g.item_by_name(group))
            .filter(|&id| id != UNDEFINED_ITEM)
        else {
            return;
        };
        let indices: Option<Vec<usize>> = parameters.iter().map(|name| self.index_of(name)).collect();
        if let Some(indices) = indices {
            self.add_parameters_to_group(block_index, group_id, &indices);
        }
    }

    pub(crate) fn add_to_group(&mut self, parameter: usize, block: usize, group: usize) {
        let groups = self
            .groups
            .entry(parameter)
            .or_default()
            .entry(block)
            .or_default();
        if !groups.contains(&group) {
            groups.push(group);
        }
    }

    /// Whether the parameter is currently visible.
    ///
    /// Ungrouped parameters are always active; grouped ones are active while at least
    /// one of their blocks selects one of their groups. Unknown parameters are inactive.
    pub fn is_parameter_active<'a>(&self, key: impl Into<ParameterRef<'a>>) -> bool {
        let Some(index) = self.resolve(key.into()) else {
            return false;
        };
        let Some(blocks) = self.groups.get(&index) else {
            return true;
        };
        blocks.iter().any(|(&block, groups)| {
            self.group_parameter(block)
                .is_some_and(|g| groups.contains(&g.value()))
        })
    }

    pub fn group_map(&self) -> &GroupMap {
        &self.groups
    }

    pub(crate) fn clear_groups(&mut self) {
        self.groups.clear();
    }

    /// Reset every parameter's payload; memberships are kept.
    pub fn clear_values(&mut self) {
        for parameter in &mut self.parameters {
            parameter.clear();
        }
    }
}
