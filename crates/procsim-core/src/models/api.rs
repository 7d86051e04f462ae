//! Plugin-side interface: the traits a model implements and the records its factory
//! hands to the host.

use crate::parameter::UnitParametersManager;
use crate::types::SolverType;

/// ABI tag stamped into every instance record.
///
/// Bumped whenever [`Unit`], [`Solver`] or the instance records change shape. The host
/// refuses instances carrying any other value.
pub const COMPILER_VERSION: u32 = 3;

/// Exported symbol constructing a unit.
pub const UNIT_FACTORY_SYMBOL: &str = "procsim_create_unit";

/// A unit model living in a plugin library.
pub trait Unit {
    /// Key identifying this model across libraries and sessions.
    fn unique_id(&self) -> &str;

    fn name(&self) -> &str;

    fn author(&self) -> &str;

    fn version(&self) -> u32;

    /// Whether the unit carries internal state between time steps.
    fn is_dynamic(&self) -> bool {
        false
    }

    fn parameters(&self) -> &UnitParametersManager;

    fn parameters_mut(&mut self) -> &mut UnitParametersManager;
}

/// An external solver living in a plugin library.
pub trait Solver {
    fn unique_id(&self) -> &str;

    fn name(&self) -> &str;

    fn author(&self) -> &str;

    fn version(&self) -> u32;

    fn solver_type(&self) -> SolverType;
}

/// Record returned by a unit factory.
///
/// `compiler_version` must stay the first field: the host reads it before trusting the
/// rest of the layout.
#[repr(C)]
pub struct UnitInstance {
    pub compiler_version: u32,
    pub unit: Box<dyn Unit>,
}

impl UnitInstance {
    pub fn new(unit: impl Unit + 'static) -> Self {
        Self {
            compiler_version: COMPILER_VERSION,
            unit: Box::new(unit),
        }
    }
}

/// Record returned by a solver factory. Same layout rules as [`UnitInstance`].
#[repr(C)]
pub struct SolverInstance {
    pub compiler_version: u32,
    pub solver: Box<dyn Solver>,
}

impl SolverInstance {
    pub fn new(solver: impl Solver + 'static) -> Self {
        Self {
            compiler_version: COMPILER_VERSION,
            solver: Box::new(solver),
        }
    }
}

/// Signature of [`UNIT_FACTORY_SYMBOL`].
pub type UnitFactory = unsafe extern "C-unwind" fn() -> *mut UnitInstance;

/// Signature of the per-type solver factories (see [`SolverType::factory_symbol`]).
pub type SolverFactory = unsafe extern "C-unwind" fn() -> *mut SolverInstance;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::UnitInstance {}
    impl Sealed for super::SolverInstance {}
}

/// Instance records starting with a `u32` ABI tag.
pub trait InstanceRecord: sealed::Sealed {
    /// Read the ABI tag without touching the rest of the record.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null and point to memory at least `size_of::<u32>()` bytes long.
    unsafe fn abi_tag(ptr: *const Self) -> u32 {
        // Both records are `repr(C)` with the tag first.
        unsafe { ptr.cast::<u32>().read_unaligned() }
    }
}

impl InstanceRecord for UnitInstance {}
impl InstanceRecord for SolverInstance {}
