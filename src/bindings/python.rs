use crate::analysis::topology;
use crate::config::EngineConfig;
use crate::display::trace;
use crate::report::ViewAssembler;
use crate::snapshot::{self, Snapshot};
use crate::store::{
    AggregatorId, ConceptId, Datatype, EavStore, IndicatorId, RawValue, RecordId, Registry, ReportId,
    SelectedIndicatorId, StrategyKind, ViewId,
};
use chrono::NaiveDate;
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_datatype(name: &str) -> PyResult<Datatype> {
    match name {
        "int" => Ok(Datatype::Int),
        "float" => Ok(Datatype::Float),
        "text" => Ok(Datatype::Text),
        "date" => Ok(Datatype::Date),
        "bool" => Ok(Datatype::Bool),
        _ => Err(PyValueError::new_err(format!("Unknown datatype '{}'", name))),
    }
}

fn parse_strategy(name: &str) -> PyResult<StrategyKind> {
    StrategyKind::from_name(name).ok_or_else(|| PyValueError::new_err(format!("Unknown strategy '{}'", name)))
}

fn parse_date(text: &str) -> PyResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| PyValueError::new_err(format!("Invalid date '{}': {}", text, e)))
}

/// A registry plus its record values, driven from Python by plain ids.
#[pyclass(name = "_ReportWorkspace")]
#[derive(Debug, Clone, Default)]
pub struct PyReportWorkspace {
    registry: Registry,
    attributes: EavStore,
    config: EngineConfig,
}

#[pymethods]
impl PyReportWorkspace {
    #[new]
    #[pyo3(signature = (config_json=None))]
    pub fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json_str(json).map_err(to_py_err)?,
            None => EngineConfig::default(),
        };
        Ok(Self { registry: config.new_registry(), attributes: EavStore::new(), config })
    }

    /// Restores a saved workspace. A given config also sets the time format
    /// of views created from now on.
    #[staticmethod]
    #[pyo3(signature = (path, config_json=None))]
    pub fn load(path: &str, config_json: Option<&str>) -> PyResult<Self> {
        let mut snap = snapshot::load(path).map_err(|e| PyIOError::new_err(e.to_string()))?;
        let config = match config_json {
            Some(json) => {
                let config = EngineConfig::from_json_str(json).map_err(to_py_err)?;
                snap.registry.default_time_format = config.default_time_format.clone();
                config
            }
            None => EngineConfig { default_time_format: snap.registry.default_time_format.clone(), ..EngineConfig::default() },
        };
        Ok(Self { registry: snap.registry, attributes: snap.attributes, config })
    }

    pub fn save(&self, path: &str) -> PyResult<()> {
        let snap = Snapshot::new(self.registry.clone(), self.attributes.clone());
        snapshot::save(path, &snap).map_err(|e| PyIOError::new_err(e.to_string()))
    }

    // --- Structure ---

    pub fn create_report(&mut self, name: String) -> usize {
        self.registry.create_report(name).index()
    }

    pub fn create_concept(&mut self, name: String, datatype: &str) -> PyResult<usize> {
        Ok(self.registry.create_concept(name, parse_datatype(datatype)?).index())
    }

    /// Creates an indicator over a fresh concept, parameters bound at orders 1..n.
    #[pyo3(signature = (name, strategy, datatype, parameters=Vec::new()))]
    pub fn create_indicator(&mut self, name: &str, strategy: &str, datatype: &str, parameters: Vec<usize>) -> PyResult<usize> {
        let params: Vec<IndicatorId> = parameters.into_iter().map(IndicatorId::new).collect();
        self.registry
            .create_indicator_with_new_concept(name, parse_datatype(datatype)?, parse_strategy(strategy)?, &params)
            .map(|id| id.index())
            .map_err(to_py_err)
    }

    #[pyo3(signature = (concept, strategy, parameters=Vec::new(), name=None))]
    pub fn create_indicator_from_concept(
        &mut self,
        concept: usize,
        strategy: &str,
        parameters: Vec<usize>,
        name: Option<&str>,
    ) -> PyResult<usize> {
        let params: Vec<IndicatorId> = parameters.into_iter().map(IndicatorId::new).collect();
        self.registry
            .create_indicator_from_concept(ConceptId::new(concept), parse_strategy(strategy)?, name, &params)
            .map(|id| id.index())
            .map_err(to_py_err)
    }

    pub fn bind_parameter(&mut self, owner: usize, parameter: usize, order: i32) -> PyResult<()> {
        self.registry
            .bind_parameter(IndicatorId::new(owner), IndicatorId::new(parameter), order)
            .map_err(to_py_err)
    }

    pub fn delete_indicator(&mut self, indicator: usize) -> PyResult<()> {
        self.registry.delete_indicator(IndicatorId::new(indicator)).map_err(to_py_err)
    }

    pub fn add_indicator_to_report(&mut self, report: usize, indicator: usize) -> PyResult<()> {
        self.registry
            .add_indicator_to_report(ReportId::new(report), IndicatorId::new(indicator))
            .map_err(to_py_err)
    }

    pub fn create_view(&mut self, report: usize, name: String) -> PyResult<usize> {
        self.registry.create_view(ReportId::new(report), name).map(|v| v.index()).map_err(to_py_err)
    }

    pub fn create_view_from_report(&mut self, report: usize, name: String) -> PyResult<usize> {
        self.registry
            .create_view_from_report(ReportId::new(report), name)
            .map(|v| v.index())
            .map_err(to_py_err)
    }

    pub fn set_view_time_format(&mut self, view: usize, time_format: String) -> PyResult<()> {
        self.registry.set_view_time_format(ViewId::new(view), time_format).map_err(to_py_err)
    }

    #[pyo3(signature = (view, indicator, order=None))]
    pub fn add_indicator(&mut self, view: usize, indicator: usize, order: Option<i32>) -> PyResult<usize> {
        self.registry
            .add_indicator(ViewId::new(view), IndicatorId::new(indicator), order)
            .map(|s| s.index())
            .map_err(to_py_err)
    }

    pub fn set_selection_order(&mut self, selection: usize, order: i32) -> PyResult<()> {
        self.registry
            .set_selection_order(SelectedIndicatorId::new(selection), order)
            .map_err(to_py_err)
    }

    pub fn add_aggregator(&mut self, view: usize, indicator: usize) -> PyResult<usize> {
        self.registry
            .add_aggregator(ViewId::new(view), IndicatorId::new(indicator))
            .map(|a: AggregatorId| a.index())
            .map_err(to_py_err)
    }

    // --- Records ---

    /// `date` is ISO formatted (`YYYY-MM-DD`).
    pub fn add_record(&mut self, report: usize, date: &str) -> PyResult<usize> {
        self.registry
            .create_record(ReportId::new(report), parse_date(date)?)
            .map(|r| r.index())
            .map_err(to_py_err)
    }

    /// Stores a bool, int, float or str value under a concept slug.
    pub fn set_attribute(&mut self, record: usize, slug: String, value: &Bound<'_, PyAny>) -> PyResult<()> {
        // bool first: Python bools also extract as ints
        let raw = if let Ok(b) = value.extract::<bool>() {
            RawValue::Bool(b)
        } else if let Ok(i) = value.extract::<i64>() {
            RawValue::Int(i)
        } else if let Ok(f) = value.extract::<f64>() {
            RawValue::Float(f)
        } else if let Ok(s) = value.extract::<String>() {
            RawValue::Text(s)
        } else {
            return Err(PyValueError::new_err("Unsupported attribute value"));
        };
        self.registry.record(RecordId::new(record)).map_err(to_py_err)?;
        self.attributes.set(RecordId::new(record), slug, raw);
        Ok(())
    }

    pub fn remove_attribute(&mut self, record: usize, slug: &str) -> bool {
        self.attributes.remove(RecordId::new(record), slug).is_some()
    }

    pub fn set_record_validated(&mut self, record: usize, validated: bool) -> PyResult<()> {
        self.registry.set_record_validated(RecordId::new(record), validated).map_err(to_py_err)
    }

    pub fn set_date_attribute(&mut self, record: usize, slug: String, date: &str) -> PyResult<()> {
        let date = parse_date(date)?;
        self.registry.record(RecordId::new(record)).map_err(to_py_err)?;
        self.attributes.set(RecordId::new(record), slug, date);
        Ok(())
    }

    // --- Output ---

    pub fn labels(&self, view: usize) -> PyResult<Vec<String>> {
        self.assembler().labels(ViewId::new(view)).map_err(to_py_err)
    }

    /// Rows as ordered `(slug, cell)` pairs, one pair per label.
    pub fn data_matrix(&self, view: usize) -> PyResult<Vec<Vec<(String, String)>>> {
        let rows = self
            .assembler()
            .data_matrix(ViewId::new(view))
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.into_iter().collect()).collect())
    }

    pub fn trace(&self, record: usize, indicator: usize) -> String {
        trace::format_trace(&self.registry, &self.attributes, RecordId::new(record), IndicatorId::new(indicator))
    }

    pub fn evaluation_order(&self) -> PyResult<Vec<usize>> {
        topology::evaluation_order(&self.registry)
            .map(|v| v.into_iter().map(|id| id.index()).collect())
            .map_err(to_py_err)
    }
}

impl PyReportWorkspace {
    fn assembler(&self) -> ViewAssembler<'_> {
        ViewAssembler::new(&self.registry, &self.attributes).with_config(self.config.clone())
    }
}
