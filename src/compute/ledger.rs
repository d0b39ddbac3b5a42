//! ledger.rs
//! Request-scoped memo of computed values, keyed by (record, indicator).

use crate::store::{IndicatorId, RawValue, RecordId, StoreError, StrategyKind};
use std::collections::HashMap;

pub use self::error::ComputationError;
mod error {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ComputationError {
        #[error("Can not get value with an unsaved indicator '{name}'")]
        UnboundIndicator { name: String },
        #[error("Division by zero at indicator '{indicator}'")]
        DivisionByZero { indicator: String },
        #[error("The {kind} indicator '{indicator}' has no parameters")]
        EmptyParameterList { indicator: String, kind: StrategyKind },
        #[error("The {kind} indicator '{indicator}' expects {expected} parameters, got {actual}")]
        ParameterCountMismatch { indicator: String, kind: StrategyKind, expected: usize, actual: usize },
        #[error("Operand {position} of '{indicator}' has no value")]
        MissingOperand { indicator: String, position: usize },
        #[error("Operand {position} of '{indicator}' is not a number")]
        NonNumericOperand { indicator: String, position: usize },
        #[error("Invalid time format '{format}'")]
        InvalidTimeFormat { format: String },
        #[error(transparent)]
        Store(#[from] StoreError),
    }
}

/// Memoized per-record values for one matrix build.
///
/// A `None` value records that the indicator resolved to nothing for that
/// record, which is distinct from "not computed yet".
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    values: HashMap<(RecordId, IndicatorId), Option<RawValue>>,
    hits: usize,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    #[inline(always)]
    pub fn get(&mut self, record: RecordId, indicator: IndicatorId) -> Option<&Option<RawValue>> {
        let found = self.values.get(&(record, indicator));
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    #[inline(always)]
    pub fn insert(&mut self, record: RecordId, indicator: IndicatorId, value: Option<RawValue>) {
        self.values.insert((record, indicator), value);
    }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// How many lookups were answered from the cache.
    pub fn hits(&self) -> usize { self.hits }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_value_is_cached() {
        let mut ledger = Ledger::new();
        let (r, i) = (RecordId(0), IndicatorId(3));
        assert!(ledger.get(r, i).is_none());
        ledger.insert(r, i, None);
        assert_eq!(ledger.get(r, i), Some(&None));
        assert_eq!(ledger.hits(), 1);
    }
}
