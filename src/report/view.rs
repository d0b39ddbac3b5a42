//! Builds the data matrix of a report view.
//!
//! A matrix build runs four phases over the report's records:
//! 1. **Extract**: each record becomes a row of `{concept slug: raw value}`
//!    for the selected indicators it has data for.
//! 2. **Resolve**: every selected indicator is evaluated in view order and
//!    written back into the row, so later columns can read earlier ones.
//! 3. **Aggregate**: the view's aggregators regroup the rows.
//! 4. **Format**: each row is rendered to strings, one cell per column.

use crate::compute::{ComputationError, Engine, Ledger};
use crate::config::{EngineConfig, RowErrorPolicy};
use crate::report::{aggregator, format, Row};
use crate::store::{AttributeStore, Indicator, Record, Registry, ViewId};

/// One selected column: the indicator and the slug it writes to.
#[derive(Debug, Clone)]
pub struct Column<'a> {
    pub indicator: &'a Indicator,
    pub slug: &'a str,
}

pub struct ViewAssembler<'a> {
    registry: &'a Registry,
    attributes: &'a dyn AttributeStore,
    config: EngineConfig,
}

impl<'a> ViewAssembler<'a> {
    pub fn new(registry: &'a Registry, attributes: &'a dyn AttributeStore) -> Self {
        Self { registry, attributes, config: EngineConfig::default() }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Indicators of the view ordered by selection order.
    ///
    /// When the view aggregates, only numeric indicators and the first
    /// aggregator's grouping indicator are kept.
    pub fn selected_indicators(&self, view: ViewId) -> Result<Vec<&'a Indicator>, ComputationError> {
        Ok(self.columns(view)?.into_iter().map(|c| c.indicator).collect())
    }

    pub fn labels(&self, view: ViewId) -> Result<Vec<String>, ComputationError> {
        Ok(self.columns(view)?.into_iter().map(|c| c.indicator.name.clone()).collect())
    }

    pub fn columns(&self, view: ViewId) -> Result<Vec<Column<'a>>, ComputationError> {
        let registry = self.registry;
        registry.view(view)?;

        let grouping = match registry.aggregators_of(view).first() {
            Some(agg) => Some(registry.concept_of(agg.indicator)?.id),
            None => None,
        };

        let mut columns = Vec::new();
        for sel in registry.selections_of(view) {
            let indicator = registry.indicator(sel.indicator)?;
            let concept = registry.concept_of(sel.indicator)?;
            if let Some(group_concept) = grouping {
                if !concept.datatype.is_numeric() && concept.id != group_concept {
                    continue;
                }
            }
            columns.push(Column { indicator, slug: concept.slug.as_str() });
        }
        Ok(columns)
    }

    /// Phases 1 to 3: the raw, unformatted rows.
    pub fn resolved_rows(&self, view: ViewId) -> Result<Vec<Row>, ComputationError> {
        let registry = self.registry;
        let report = registry.view(view)?.report;
        let columns = self.columns(view)?;
        let engine = Engine::new(registry, self.attributes).with_memoization(self.config.memoize);
        let mut ledger = Ledger::new();

        let mut rows = Vec::new();
        for record in registry.records_of(report) {
            match self.resolve_record(&engine, &mut ledger, record, &columns) {
                Ok(row) => rows.push(row),
                Err(e) if self.config.on_row_error == RowErrorPolicy::SkipRow => {
                    tracing::warn!(record = %record.id, error = %e, "record skipped");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(%view, rows = rows.len(), ledger_hits = ledger.hits(), "rows resolved");

        for agg in registry.aggregators_of(view) {
            let key = &registry.concept_of(agg.indicator)?.slug;
            rows = aggregator::aggregate(rows, key);
        }
        Ok(rows)
    }

    fn resolve_record(
        &self,
        engine: &Engine<'_>,
        ledger: &mut Ledger,
        record: &Record,
        columns: &[Column<'a>],
    ) -> Result<Row, ComputationError> {
        // Extract
        let mut row = Row::new();
        for col in columns {
            if let Some(value) = self.attributes.get(record.id, col.slug) {
                row.insert(col.slug, value);
            }
        }

        // Resolve
        for col in columns {
            if let Some(value) = engine.value(col.indicator, record.id, &row, ledger)? {
                row.insert(col.slug, value);
            }
        }
        Ok(row)
    }

    /// The formatted data matrix, one cell per label in label order.
    pub fn data_matrix(&self, view: ViewId) -> Result<Vec<Row<String>>, ComputationError> {
        let time_format = &self.registry.view(view)?.time_format;
        let columns = self.columns(view)?;
        let rows = self.resolved_rows(view)?;

        rows.iter()
            .map(|row| -> Result<Row<String>, ComputationError> {
                let mut out = Row::new();
                for col in &columns {
                    out.push(col.slug, format::format_cell(row.get(col.slug), time_format)?);
                }
                Ok(out)
            })
            .collect()
    }
}
