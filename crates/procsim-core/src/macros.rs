//! Declarative macros for model libraries.

/// Export a unit factory from a model library.
///
/// The library must be built as a `cdylib`. The expression constructs the unit; it
/// defaults to `Default::default()`. A panic during construction is caught inside the
/// library and reported to the host as a missing instance.
///
/// # Example
///
/// ```ignore
/// use procsim_core::prelude::*;
///
/// #[derive(Default)]
/// struct Mixer {
///     parameters: UnitParametersManager,
/// }
///
/// impl Unit for Mixer {
///     // ...
/// }
///
/// procsim_core::export_unit!(Mixer);
/// ```
#[macro_export]
macro_rules! export_unit {
    ($ty:ty, $ctor:expr) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C-unwind" fn procsim_create_unit() -> *mut $crate::models::UnitInstance {
            match ::std::panic::catch_unwind(|| -> $ty { $ctor }) {
                Ok(unit) => ::std::boxed::Box::into_raw(::std::boxed::Box::new(
                    $crate::models::UnitInstance::new(unit),
                )),
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
    ($ty:ty) => {
        $crate::export_unit!($ty, <$ty as ::std::default::Default>::default());
    };
}

/// Export a solver factory from a model library.
///
/// The first argument names the solver kind and selects the exported symbol, matching
/// [`SolverType::factory_symbol`](crate::types::SolverType::factory_symbol).
///
/// ```ignore
/// procsim_core::export_solver!(Agglomeration, CellAverage);
/// procsim_core::export_solver!(Pbm, Moments, Moments::with_order(4));
/// ```
#[macro_export]
macro_rules! export_solver {
    (Agglomeration, $ty:ty, $ctor:expr) => {
        $crate::__export_solver_fn!(procsim_create_agglomeration_solver, $ty, $ctor);
    };
    (Pbm, $ty:ty, $ctor:expr) => {
        $crate::__export_solver_fn!(procsim_create_pbm_solver, $ty, $ctor);
    };
    (Agglomeration, $ty:ty) => {
        $crate::export_solver!(Agglomeration, $ty, <$ty as ::std::default::Default>::default());
    };
    (Pbm, $ty:ty) => {
        $crate::export_solver!(Pbm, $ty, <$ty as ::std::default::Default>::default());
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __export_solver_fn {
    ($symbol:ident, $ty:ty, $ctor:expr) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C-unwind" fn $symbol() -> *mut $crate::models::SolverInstance {
            match ::std::panic::catch_unwind(|| -> $ty { $ctor }) {
                Ok(solver) => ::std::boxed::Box::into_raw(::std::boxed::Box::new(
                    $crate::models::SolverInstance::new(solver),
                )),
                Err(_) => ::std::ptr::null_mut(),
            }
        }
    };
}
