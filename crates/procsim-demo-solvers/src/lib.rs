//! Demo solver library exporting a cell-average agglomeration solver.

use procsim_core::prelude::*;

#[derive(Debug, Default)]
pub struct CellAverage;

impl CellAverage {
    pub const KEY: &'static str = "procsim-demo-cell-average";
}

impl Solver for CellAverage {
    fn unique_id(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Cell average"
    }

    fn author(&self) -> &str {
        "ProcSim Contributors"
    }

    fn version(&self) -> u32 {
        1
    }

    fn solver_type(&self) -> SolverType {
        SolverType::Agglomeration
    }
}

procsim_core::export_solver!(Agglomeration, CellAverage);
