//! Demo unit library: a cone/impact crusher.
//!
//! Build it as a `cdylib` and point a models directory at the output to see it in
//! `procsim models`.

use procsim_core::prelude::*;

/// Crusher with two breakage models and an optional classifier.
pub struct Crusher {
    parameters: UnitParametersManager,
}

impl Crusher {
    pub const KEY: &'static str = "procsim-demo-crusher";

    pub fn new() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut p = UnitParametersManager::new();
        p.add_group_parameter("model", "Breakage model", 0, &[0, 1], &names(&["cone", "impact"]));
        p.add_const_parameter("gap", "mm", "Closed side setting", 1.0, 50.0, 12.0);
        p.add_td_parameter("speed", "rpm", "Rotor speed", 0.0, 3000.0, 1200.0);
        p.add_checkbox_parameter("wear", "Account for liner wear", false);
        p.add_combo_parameter(
            "distribution",
            "Product size distribution",
            1,
            &[0, 1],
            &names(&["normal", "rrsb"]),
        );
        p.add_solver_parameter("agglomeration", "Fines agglomeration", SolverType::Agglomeration);
        p.add_compound_parameter("material", "Crushed material");
        p.add_string_parameter("tag", "Equipment tag", "CR-101");

        p.add_parameters_to_group_by_name("model", "cone", &["gap"]);
        p.add_parameters_to_group_by_name("model", "impact", &["speed", "wear"]);
        Self { parameters: p }
    }
}

impl Default for Crusher {
    fn default() -> Self {
        Self::new()
    }
}

impl Unit for Crusher {
    fn unique_id(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Crusher"
    }

    fn author(&self) -> &str {
        "ProcSim Contributors"
    }

    fn version(&self) -> u32 {
        1
    }

    fn parameters(&self) -> &UnitParametersManager {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut UnitParametersManager {
        &mut self.parameters
    }
}

procsim_core::export_unit!(Crusher);
