// Core of the generic report engine: indicators computed over report records,
// laid out as data matrices through report views.
// The optional `python` feature exposes the workspace as the `_core` module.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod report;
pub mod snapshot;
pub mod store;

#[cfg(feature = "python")]
pub mod bindings;

pub use compute::{ComputationError, Engine, Ledger};
pub use config::{ConfigError, EngineConfig, RowErrorPolicy};
pub use report::{FormError, RecordForm, Row, ViewAssembler};
pub use snapshot::{Snapshot, SnapshotError};
pub use store::{AttributeStore, EavStore, Registry, StoreError};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Returns the version of the compiled core.
#[cfg(feature = "python")]
#[pyfunction]
fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// --- Module Definition ---
/// The `_core` Python module; the leading underscore marks it as the
/// compiled half of a Python package.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(core_version, m)?)?;
    m.add_class::<bindings::python::PyReportWorkspace>()?;
    Ok(())
}
