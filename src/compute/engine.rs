//! A synchronous, single-threaded evaluation engine.
use crate::compute::ledger::{ComputationError, Ledger};
use crate::compute::strategy::Operands;
use crate::report::Row;
use crate::store::{AttributeStore, Indicator, IndicatorId, RawValue, RecordId, Registry, StrategyKind};
use smallvec::SmallVec;

pub struct Engine<'a> {
    registry: &'a Registry,
    attributes: &'a dyn AttributeStore,
    memoize: bool,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry, attributes: &'a dyn AttributeStore) -> Self {
        Self { registry, attributes, memoize: true }
    }

    pub fn with_memoization(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// The value of `indicator` for one record.
    ///
    /// `row` holds the record's already extracted or computed values. An
    /// indicator that was never saved has no strategy to dispatch to and is
    /// rejected up front.
    pub fn value(
        &self,
        indicator: &Indicator,
        record: RecordId,
        row: &Row,
        ledger: &mut Ledger,
    ) -> Result<Option<RawValue>, ComputationError> {
        match indicator.id {
            Some(id) if indicator.is_bound() => self.resolve(id, record, row, ledger),
            _ => Err(ComputationError::UnboundIndicator { name: indicator.name.clone() }),
        }
    }

    /// Recursively resolves a persisted indicator, operands first in
    /// ascending parameter order.
    pub fn resolve(
        &self,
        id: IndicatorId,
        record: RecordId,
        row: &Row,
        ledger: &mut Ledger,
    ) -> Result<Option<RawValue>, ComputationError> {
        if self.memoize {
            if let Some(cached) = ledger.get(record, id) {
                tracing::trace!(%record, indicator = %id, "ledger hit");
                return Ok(cached.clone());
            }
        }

        let indicator = self.registry.indicator(id)?;
        let kind = indicator
            .strategy
            .ok_or_else(|| ComputationError::UnboundIndicator { name: indicator.name.clone() })?;
        let concept = self.registry.concept_of(id)?;

        let parameters = self.registry.parameters_of(id);
        let mut values: SmallVec<[Option<RawValue>; 4]> = SmallVec::with_capacity(parameters.len());
        for &param in &parameters {
            values.push(self.resolve(param, record, row, ledger)?);
        }

        let direct = match kind {
            StrategyKind::Value => row
                .get(&concept.slug)
                .cloned()
                .or_else(|| self.attributes.get(record, &concept.slug)),
            _ => None,
        };

        let operands = Operands { indicator: &indicator.name, kind, direct, values: &values };
        let result = (kind.evaluator())(&operands)?;
        tracing::trace!(%record, indicator = %indicator.name, %kind, value = ?result, "resolved");

        if self.memoize {
            ledger.insert(record, id, result.clone());
        }
        Ok(result)
    }
}
