//! Defines the error types for the entity store.
use super::types::{IndicatorId, ReportId, StrategyKind, ViewId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: String },
    #[error("The {field} of indicator '{indicator}' can not be changed anymore")]
    IndicatorImmutableField { indicator: String, field: &'static str },
    #[error("Indicator can not be saved without a {field}")]
    IncompleteIndicator { field: &'static str },
    #[error("Binding {parameter} as a parameter of {owner} would create a cycle")]
    CyclicParameter { owner: IndicatorId, parameter: IndicatorId },
    #[error("Indicator {owner} already has a parameter at order {order}")]
    DuplicateParameterOrder { owner: IndicatorId, order: i32 },
    #[error("Indicator {indicator} is already selected in view {view} at order {order}")]
    DuplicateSelection { view: ViewId, indicator: IndicatorId, order: i32 },
    #[error("A {kind} indicator accepts at most {max} parameters ('{indicator}')")]
    ArityExceeded { indicator: String, kind: StrategyKind, max: usize },
    #[error("Indicator '{indicator}' is a parameter of {dependents:?}")]
    IndicatorInUse { indicator: String, dependents: Vec<String> },
    #[error("Report {report} already has a view named '{name}'")]
    DuplicateViewName { report: ReportId, name: String },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound { entity, id: id.to_string() }
    }
}
