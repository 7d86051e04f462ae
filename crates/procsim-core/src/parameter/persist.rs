//! Saving and loading a parameter registry through a [`KeyedStore`].

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::dependent::DependentValues;
use super::registry::UnitParametersManager;
use super::value::{ComboParameter, Parameter, ParameterKind, ParameterValue};
use crate::storage::{join, KeyedStore, Result};
use crate::types::SolverType;

pub const MANAGER_SAVE_VERSION: u64 = 1;
pub const CONST_SAVE_VERSION: u64 = 2;
pub const TD_SAVE_VERSION: u64 = 2;
pub const STRING_SAVE_VERSION: u64 = 1;
pub const CHECKBOX_SAVE_VERSION: u64 = 1;
pub const SOLVER_SAVE_VERSION: u64 = 1;
pub const COMBO_SAVE_VERSION: u64 = 2;
pub const GROUP_SAVE_VERSION: u64 = 2;
pub const COMPOUND_SAVE_VERSION: u64 = 1;

fn kind_version(kind: ParameterKind) -> u64 {
    match kind {
        ParameterKind::TimeDependent => TD_SAVE_VERSION,
        ParameterKind::Constant => CONST_SAVE_VERSION,
        ParameterKind::String => STRING_SAVE_VERSION,
        ParameterKind::Checkbox => CHECKBOX_SAVE_VERSION,
        ParameterKind::Solver => SOLVER_SAVE_VERSION,
        ParameterKind::Combo => COMBO_SAVE_VERSION,
        ParameterKind::Group => GROUP_SAVE_VERSION,
        ParameterKind::Compound => COMPOUND_SAVE_VERSION,
    }
}

fn param_path(path: &str, index: usize) -> String {
    join(path, &format!("param_{index}"))
}

impl UnitParametersManager {
    /// Write every parameter and the group map under `path`.
    pub fn save_to_store(&self, store: &mut impl KeyedStore, path: &str) -> Result<()> {
        store.write_u64(&join(path, "version"), MANAGER_SAVE_VERSION)?;
        store.write_u64(&join(path, "number"), self.len() as u64)?;

        for (i, parameter) in self.iter().enumerate() {
            save_fields(store, &param_path(path, i), parameter)?;
        }

        let mut parameters = Vec::new();
        let mut blocks = Vec::new();
        let mut groups = Vec::new();
        for (&parameter, block_map) in self.group_map() {
            for (&block, ids) in block_map {
                for &group in ids {
                    parameters.push(parameter as u64);
                    blocks.push(block as u64);
                    groups.push(group as u64);
                }
            }
        }
        let groups_path = join(path, "groups");
        store.write(&join(&groups_path, "parameters"), parameters.into())?;
        store.write(&join(&groups_path, "blocks"), blocks.into())?;
        store.write(&join(&groups_path, "groups"), groups.into())?;

        debug!(path, parameters = self.len(), "Saved unit parameters");
        Ok(())
    }

    /// Merge parameters stored under `path` into this registry.
    ///
    /// Stored parameters are matched by name. Unknown names are appended, kind mismatches are
    /// skipped, and fields missing from older formats keep their current values.
    pub fn load_from_store(&mut self, store: &impl KeyedStore, path: &str) -> Result<()> {
        let version = store.read_u64(&join(path, "version"))?.unwrap_or(MANAGER_SAVE_VERSION);
        if version > MANAGER_SAVE_VERSION {
            warn!(path, version, "Parameters were saved by a newer format version");
        }
        let Some(number) = store.read_u64(&join(path, "number"))? else {
            debug!(path, "No stored parameters");
            return Ok(());
        };

        let mut saved_names = Vec::new();
        for i in 0..number {
            let p_path = param_path(path, i as usize);
            if store.read(&join(&p_path, "type"))?.is_none() {
                warn!(path, index = i, number, "Stored parameter is missing, stopping load");
                break;
            }
            let name = store.read_text(&join(&p_path, "name"))?;
            if let Some(name) = &name {
                self.load_parameter(store, &p_path, name)?;
            }
            saved_names.push(name);
        }

        self.load_groups(store, path, &saved_names)?;
        Ok(())
    }

    fn load_parameter(&mut self, store: &impl KeyedStore, path: &str, name: &str) -> Result<()> {
        let tag = store.read_u64(&join(path, "type"))?.unwrap_or(0);
        let Some(kind) = u32::try_from(tag).ok().and_then(ParameterKind::from_u32) else {
            warn!(parameter = name, tag, "Unknown stored parameter type, skipping");
            return Ok(());
        };

        let index = match self.index_of(name) {
            Some(index) => index,
            None => {
                let created = Parameter::new(name, "", "", ParameterValue::default_for(kind));
                match self.push_parameter(created) {
                    Some(index) => index,
                    None => return Ok(()),
                }
            }
        };
        let Some(parameter) = self.parameter_mut(index) else {
            return Ok(());
        };
        if parameter.kind() != kind {
            warn!(
                parameter = name,
                stored = %kind,
                current = %parameter.kind(),
                "Stored parameter kind does not match, skipping"
            );
            return Ok(());
        }

        let version = store.read_u64(&join(path, "version"))?.unwrap_or(1);
        if version > kind_version(kind) {
            warn!(parameter = name, version, "Parameter was saved by a newer format version");
        }
        load_fields(store, path, version, parameter)
    }

    fn load_groups(
        &mut self,
        store: &impl KeyedStore,
        path: &str,
        saved_names: &[Option<String>],
    ) -> Result<()> {
        let groups_path = join(path, "groups");
        let (Some(parameters), Some(blocks), Some(groups)) = (
            store.read_u64s(&join(&groups_path, "parameters"))?,
            store.read_u64s(&join(&groups_path, "blocks"))?,
            store.read_u64s(&join(&groups_path, "groups"))?,
        ) else {
            return Ok(());
        };

        let current = |saved: u64| -> Option<usize> {
            let name = saved_names.get(saved as usize)?.as_deref()?;
            self.index_of(name)
        };
        let mut triples = Vec::with_capacity(parameters.len());
        for ((&parameter, &block), &group) in parameters.iter().zip(&blocks).zip(&groups) {
            match (current(parameter), current(block)) {
                (Some(p), Some(b)) if self.group_parameter(b).is_some() => {
                    triples.push((p, b, group as usize))
                }
                _ => debug!(parameter, block, "Dropping stored group membership"),
            }
        }

        self.clear_groups();
        for (parameter, block, group) in triples {
            self.add_to_group(parameter, block, group);
        }
        Ok(())
    }
}

fn save_fields(store: &mut impl KeyedStore, path: &str, parameter: &Parameter) -> Result<()> {
    let kind = parameter.kind();
    store.write_u64(&join(path, "type"), u64::from(kind.as_u32()))?;
    store.write_u64(&join(path, "version"), kind_version(kind))?;
    store.write_text(&join(path, "name"), parameter.name())?;
    store.write_text(&join(path, "units"), parameter.units())?;
    store.write_text(&join(path, "description"), parameter.description())?;

    match parameter.value() {
        ParameterValue::Constant(p) => {
            store.write_f64(&join(path, "value"), p.value())?;
            store.write_f64(&join(path, "min"), p.min())?;
            store.write_f64(&join(path, "max"), p.max())?;
        }
        ParameterValue::TimeDependent(p) => {
            store.write(&join(path, "times"), p.times().into())?;
            store.write(&join(path, "values"), p.values().into())?;
            store.write_f64(&join(path, "min"), p.min())?;
            store.write_f64(&join(path, "max"), p.max())?;
        }
        ParameterValue::String(p) => store.write_text(&join(path, "value"), p.value())?,
        ParameterValue::Checkbox(p) => store.write_bool(&join(path, "checked"), p.is_checked())?,
        ParameterValue::Solver(p) => {
            store.write_text(&join(path, "key"), p.key())?;
            store.write_u64(&join(path, "solver_type"), u64::from(p.solver_type().as_u32()))?;
        }
        ParameterValue::Combo(p) | ParameterValue::Group(p) => save_combo(store, path, p)?,
        ParameterValue::Compound(p) => store.write_text(&join(path, "key"), p.key())?,
    }
    Ok(())
}

fn save_combo(store: &mut impl KeyedStore, path: &str, combo: &ComboParameter) -> Result<()> {
    let items: Vec<u64> = combo.items().into_iter().map(|i| i as u64).collect();
    store.write(&join(path, "items"), items.into())?;
    store.write(&join(path, "names"), combo.names().into())?;
    store.write_u64(&join(path, "selected"), selection_to_store(combo.value()))
}

// `UNDEFINED_ITEM` is `usize::MAX`; it is stored as `u64::MAX` on every platform.
fn selection_to_store(item: usize) -> u64 {
    u64::try_from(item).unwrap_or(u64::MAX)
}

fn selection_from_store(item: u64) -> usize {
    usize::try_from(item).unwrap_or(usize::MAX)
}

fn load_fields(
    store: &impl KeyedStore,
    path: &str,
    version: u64,
    parameter: &mut Parameter,
) -> Result<()> {
    if let Some(units) = store.read_text(&join(path, "units"))? {
        parameter.set_units(units);
    }
    if let Some(description) = store.read_text(&join(path, "description"))? {
        parameter.set_description(description);
    }

    match parameter.value_mut() {
        ParameterValue::Constant(p) => {
            if let Some(value) = store.read_f64(&join(path, "value"))? {
                p.set_value(value);
            }
            if version >= 2 {
                if let Some(min) = store.read_f64(&join(path, "min"))? {
                    p.set_min(min);
                }
                if let Some(max) = store.read_f64(&join(path, "max"))? {
                    p.set_max(max);
                }
            }
        }
        ParameterValue::TimeDependent(p) => {
            if version >= 2 {
                let times = store.read_f64s(&join(path, "times"))?;
                let values = store.read_f64s(&join(path, "values"))?;
                if let (Some(times), Some(values)) = (times, values) {
                    p.set_data(DependentValues::from_pairs(times.into_iter().zip(values)));
                }
                if let Some(min) = store.read_f64(&join(path, "min"))? {
                    p.set_min(min);
                }
                if let Some(max) = store.read_f64(&join(path, "max"))? {
                    p.set_max(max);
                }
            } else if let Some(data) = store.read_f64s(&join(path, "data"))? {
                let pairs = data.chunks_exact(2).map(|pair| (pair[0], pair[1]));
                p.set_data(DependentValues::from_pairs(pairs));
            }
        }
        ParameterValue::String(p) => {
            if let Some(value) = store.read_text(&join(path, "value"))? {
                p.set_value(value);
            }
        }
        ParameterValue::Checkbox(p) => {
            if let Some(checked) = store.read_bool(&join(path, "checked"))? {
                p.set_checked(checked);
            }
        }
        ParameterValue::Solver(p) => {
            if let Some(key) = store.read_text(&join(path, "key"))? {
                p.set_key(key);
            }
            if let Some(tag) = store.read_u64(&join(path, "solver_type"))? {
                p.set_solver_type(SolverType::from_u32(u32::try_from(tag).unwrap_or(0)));
            }
        }
        ParameterValue::Combo(p) | ParameterValue::Group(p) => load_combo(store, path, version, p)?,
        ParameterValue::Compound(p) => {
            if let Some(key) = store.read_text(&join(path, "key"))? {
                p.set_key(key);
            }
        }
    }
    Ok(())
}

fn load_combo(
    store: &impl KeyedStore,
    path: &str,
    version: u64,
    combo: &mut ComboParameter,
) -> Result<()> {
    let Some(selected) = store.read_u64(&join(path, "selected"))? else {
        return Ok(());
    };
    let selected = selection_from_store(selected);
    if version < 2 {
        combo.set_value(selected);
        return Ok(());
    }

    let items = store.read_u64s(&join(path, "items"))?;
    let names = store.read_texts(&join(path, "names"))?;
    let (Some(items), Some(names)) = (items, names) else {
        combo.set_value(selected);
        return Ok(());
    };
    let saved: BTreeMap<usize, String> = items
        .into_iter()
        .map(selection_from_store)
        .zip(names)
        .collect();

    if combo.item_map().is_empty() {
        // Freshly created from the store: adopt the saved item list as is.
        combo.set_items(saved);
        combo.set_value(selected);
    } else if let Some(name) = saved.get(&selected) {
        // Item ids may have been renumbered since the save; the name is authoritative.
        let item = combo.item_by_name(name);
        combo.set_value(if combo.has_item(item) { item } else { selected });
    } else {
        combo.set_value(selected);
    }
    Ok(())
}
