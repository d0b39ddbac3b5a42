use super::error::StoreError;
use super::types::*;
use crate::analysis::topology;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Time format given to views created without an explicit one.
pub const DEFAULT_TIME_FORMAT: &str = "%m/%d/%y";

fn default_time_format() -> String { DEFAULT_TIME_FORMAT.to_string() }

/// The entity store for reports, records, indicators and views.
///
/// Ids are dense indices into the entity vectors. Deleted indicators leave a
/// `None` slot behind so that ids stay stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub reports: Vec<Report>,
    pub records: Vec<Record>,
    pub concepts: Vec<Concept>,
    pub indicators: Vec<Option<Indicator>>,
    pub parameters: Vec<Parameter>,
    /// Many-to-many membership, in insertion order.
    pub report_indicators: Vec<(ReportId, IndicatorId)>,
    pub views: Vec<ReportView>,
    pub selections: Vec<SelectedIndicator>,
    pub aggregators: Vec<Aggregator>,

    #[serde(default = "default_time_format")]
    pub default_time_format: String,
    next_selection: u32,

    // Ephemeral state for uniqueness checks (Not serialized, rebuilt on load)
    #[serde(skip)]
    used_slugs: HashSet<String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            reports: Vec::new(),
            records: Vec::new(),
            concepts: Vec::new(),
            indicators: Vec::new(),
            parameters: Vec::new(),
            report_indicators: Vec::new(),
            views: Vec::new(),
            selections: Vec::new(),
            aggregators: Vec::new(),
            default_time_format: default_time_format(),
            next_selection: 0,
            used_slugs: HashSet::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn with_time_format(time_format: impl Into<String>) -> Self {
        Self { default_time_format: time_format.into(), ..Self::default() }
    }

    /// Rebuilds the `used_slugs` set after deserialization.
    pub fn rebuild_slug_cache(&mut self) {
        self.used_slugs = self.concepts.iter().map(|c| c.slug.clone()).collect();
    }

    // --- Reports & Records ---

    pub fn create_report(&mut self, name: impl Into<String>) -> ReportId {
        let id = ReportId::new(self.reports.len());
        self.reports.push(Report { id, name: name.into() });
        id
    }

    pub fn report(&self, id: ReportId) -> Result<&Report, StoreError> {
        self.reports.get(id.index()).ok_or_else(|| StoreError::not_found("Report", id))
    }

    pub fn create_record(&mut self, report: ReportId, date: NaiveDate) -> Result<RecordId, StoreError> {
        self.report(report)?;
        let id = RecordId::new(self.records.len());
        self.records.push(Record { id, report, date, validated: false });
        Ok(id)
    }

    pub fn record(&self, id: RecordId) -> Result<&Record, StoreError> {
        self.records.get(id.index()).ok_or_else(|| StoreError::not_found("Record", id))
    }

    pub fn set_record_validated(&mut self, id: RecordId, validated: bool) -> Result<(), StoreError> {
        let record = self.records.get_mut(id.index()).ok_or_else(|| StoreError::not_found("Record", id))?;
        record.validated = validated;
        Ok(())
    }

    /// Records of a report in creation order.
    pub fn records_of(&self, report: ReportId) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(move |r| r.report == report)
    }

    /// Records of a report dated within `[start, end]`, ordered by date.
    pub fn records_between(&self, report: ReportId, start: NaiveDate, end: NaiveDate) -> Vec<&Record> {
        let mut found: Vec<&Record> = self
            .records_of(report)
            .filter(|r| r.date >= start && r.date <= end)
            .collect();
        found.sort_by_key(|r| (r.date, r.id));
        found
    }

    // --- Concepts ---

    pub fn create_concept(&mut self, name: impl Into<String>, datatype: Datatype) -> ConceptId {
        let name = name.into();
        let id = ConceptId::new(self.concepts.len());

        // --- Unique Slug Enforcement ---
        let base = slugify(&name);
        let mut candidate = base.clone();
        let mut counter = 1;
        while self.used_slugs.contains(&candidate) {
            candidate = format!("{}_{}", base, counter);
            counter += 1;
        }
        self.used_slugs.insert(candidate.clone());

        self.concepts.push(Concept { id, name, slug: candidate, datatype });
        id
    }

    pub fn concept(&self, id: ConceptId) -> Result<&Concept, StoreError> {
        self.concepts.get(id.index()).ok_or_else(|| StoreError::not_found("Concept", id))
    }

    // --- Indicators ---

    pub fn indicator(&self, id: IndicatorId) -> Result<&Indicator, StoreError> {
        self.indicators
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| StoreError::not_found("Indicator", id))
    }

    /// The concept an indicator is bound to.
    pub fn concept_of(&self, id: IndicatorId) -> Result<&Concept, StoreError> {
        let indicator = self.indicator(id)?;
        let concept = indicator.concept.ok_or(StoreError::IncompleteIndicator { field: "concept" })?;
        self.concept(concept)
    }

    /// Persists an indicator, binding it on first save.
    ///
    /// Once saved, `concept` and `strategy` are compared against the stored
    /// state and any change is rejected, leaving the stored entity untouched.
    pub fn save_indicator(&mut self, indicator: &mut Indicator) -> Result<IndicatorId, StoreError> {
        let concept = indicator.concept.ok_or(StoreError::IncompleteIndicator { field: "concept" })?;
        let strategy = indicator.strategy.ok_or(StoreError::IncompleteIndicator { field: "strategy" })?;
        self.concept(concept)?;

        match indicator.id {
            None => {
                let id = IndicatorId::new(self.indicators.len());
                indicator.id = Some(id);
                self.indicators.push(Some(indicator.clone()));
                tracing::debug!(indicator = %indicator.name, %strategy, "indicator bound");
                Ok(id)
            }
            Some(id) => {
                let stored = self.indicator(id)?;
                if stored.concept != Some(concept) {
                    return Err(StoreError::IndicatorImmutableField { indicator: stored.name.clone(), field: "concept" });
                }
                if stored.strategy != Some(strategy) {
                    return Err(StoreError::IndicatorImmutableField { indicator: stored.name.clone(), field: "strategy" });
                }
                self.indicators[id.index()] = Some(indicator.clone());
                Ok(id)
            }
        }
    }

    /// Wraps an existing concept. Parameters are bound at orders `1..=n`.
    /// The name defaults to the concept's name.
    pub fn create_indicator_from_concept(
        &mut self,
        concept: ConceptId,
        kind: StrategyKind,
        name: Option<&str>,
        parameters: &[IndicatorId],
    ) -> Result<IndicatorId, StoreError> {
        let name = match name {
            Some(n) => n.to_string(),
            None => self.concept(concept)?.name.clone(),
        };
        self.check_parameters(&name, kind, parameters)?;

        let mut indicator = Indicator { id: None, name, concept: Some(concept), strategy: Some(kind) };
        let id = self.save_indicator(&mut indicator)?;
        for (pos, &p) in parameters.iter().enumerate() {
            self.bind_parameter(id, p, pos as i32 + 1)?;
        }
        Ok(id)
    }

    /// Materializes a fresh concept named after the indicator, then wraps it.
    pub fn create_indicator_with_new_concept(
        &mut self,
        name: &str,
        datatype: Datatype,
        kind: StrategyKind,
        parameters: &[IndicatorId],
    ) -> Result<IndicatorId, StoreError> {
        // checked before the concept reserves its slug
        self.check_parameters(name, kind, parameters)?;
        let concept = self.create_concept(name, datatype);
        self.create_indicator_from_concept(concept, kind, Some(name), parameters)
    }

    /// Arity and existence checks shared by the indicator constructors.
    fn check_parameters(&self, name: &str, kind: StrategyKind, parameters: &[IndicatorId]) -> Result<(), StoreError> {
        if let Some(max) = kind.max_parameters() {
            if parameters.len() > max {
                return Err(StoreError::ArityExceeded { indicator: name.to_string(), kind, max });
            }
        }
        for &p in parameters {
            self.indicator(p)?;
        }
        Ok(())
    }

    pub fn bind_parameter(&mut self, owner: IndicatorId, parameter: IndicatorId, order: i32) -> Result<(), StoreError> {
        let owner_ind = self.indicator(owner)?;
        self.indicator(parameter)?;
        let kind = owner_ind.strategy.ok_or(StoreError::IncompleteIndicator { field: "strategy" })?;

        if let Some(max) = kind.max_parameters() {
            if self.parameters.iter().filter(|p| p.owner == owner).count() >= max {
                return Err(StoreError::ArityExceeded { indicator: owner_ind.name.clone(), kind, max });
            }
        }
        if self.parameters.iter().any(|p| p.owner == owner && p.order == order) {
            return Err(StoreError::DuplicateParameterOrder { owner, order });
        }
        if topology::would_create_cycle(self, owner, parameter) {
            return Err(StoreError::CyclicParameter { owner, parameter });
        }

        self.parameters.push(Parameter { owner, indicator: parameter, order });
        Ok(())
    }

    /// Parameters of `owner`, ascending by order.
    pub fn parameters_of(&self, owner: IndicatorId) -> ParameterList {
        let mut params: Vec<&Parameter> = self.parameters.iter().filter(|p| p.owner == owner).collect();
        params.sort_by_key(|p| p.order);
        params.into_iter().map(|p| p.indicator).collect()
    }

    /// Indicators that use `id` as a parameter.
    pub fn dependents_of(&self, id: IndicatorId) -> Vec<IndicatorId> {
        let mut deps: Vec<IndicatorId> = self.parameters.iter().filter(|p| p.indicator == id).map(|p| p.owner).collect();
        deps.sort();
        deps.dedup();
        deps
    }

    /// Deletes an indicator that no other indicator depends on. Its own
    /// parameter edges, view selections, aggregators and report memberships
    /// go with it.
    pub fn delete_indicator(&mut self, id: IndicatorId) -> Result<(), StoreError> {
        let name = self.indicator(id)?.name.clone();
        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            let dependents = dependents
                .into_iter()
                .filter_map(|d| self.indicator(d).ok().map(|i| i.name.clone()))
                .collect();
            return Err(StoreError::IndicatorInUse { indicator: name, dependents });
        }

        self.parameters.retain(|p| p.owner != id);
        self.selections.retain(|s| s.indicator != id);
        self.aggregators.retain(|a| a.indicator != id);
        self.report_indicators.retain(|&(_, i)| i != id);
        self.indicators[id.index()] = None;
        tracing::debug!(indicator = %name, "indicator deleted");
        Ok(())
    }

    pub fn add_indicator_to_report(&mut self, report: ReportId, indicator: IndicatorId) -> Result<(), StoreError> {
        self.report(report)?;
        self.indicator(indicator)?;
        if !self.report_has_indicator(report, indicator) {
            self.report_indicators.push((report, indicator));
        }
        Ok(())
    }

    pub fn report_has_indicator(&self, report: ReportId, indicator: IndicatorId) -> bool {
        self.report_indicators.contains(&(report, indicator))
    }

    /// Indicators of a report in membership order.
    pub fn report_indicators(&self, report: ReportId) -> Vec<IndicatorId> {
        self.report_indicators.iter().filter(|(r, _)| *r == report).map(|&(_, i)| i).collect()
    }

    // --- Views ---

    pub fn create_view(&mut self, report: ReportId, name: impl Into<String>) -> Result<ViewId, StoreError> {
        let name = name.into();
        self.report(report)?;
        if self.views.iter().any(|v| v.report == report && v.name == name) {
            return Err(StoreError::DuplicateViewName { report, name });
        }
        let id = ViewId::new(self.views.len());
        self.views.push(ReportView { id, report, name, time_format: self.default_time_format.clone() });
        Ok(id)
    }

    /// Creates a view bound to every indicator of the report, by ascending id.
    pub fn create_view_from_report(&mut self, report: ReportId, name: impl Into<String>) -> Result<ViewId, StoreError> {
        let view = self.create_view(report, name)?;
        let mut indicators = self.report_indicators(report);
        indicators.sort();
        for indicator in indicators {
            self.add_indicator(view, indicator, None)?;
        }
        Ok(view)
    }

    pub fn view(&self, id: ViewId) -> Result<&ReportView, StoreError> {
        self.views.get(id.index()).ok_or_else(|| StoreError::not_found("View", id))
    }

    pub fn set_view_time_format(&mut self, id: ViewId, time_format: impl Into<String>) -> Result<(), StoreError> {
        let view = self.views.get_mut(id.index()).ok_or_else(|| StoreError::not_found("View", id))?;
        view.time_format = time_format.into();
        Ok(())
    }

    /// Selects an indicator in a view, appending it after the current last
    /// column when no order is given. The indicator joins the view's report
    /// if it is not a member yet. Selecting the same indicator twice yields
    /// two columns.
    pub fn add_indicator(&mut self, view: ViewId, indicator: IndicatorId, order: Option<i32>) -> Result<SelectedIndicatorId, StoreError> {
        let report = self.view(view)?.report;
        self.indicator(indicator)?;

        let order = match order {
            Some(o) => o,
            None => self.selections.iter().filter(|s| s.view == view).map(|s| s.order).max().map_or(1, |m| m + 1),
        };
        if self.selections.iter().any(|s| s.view == view && s.indicator == indicator && s.order == order) {
            return Err(StoreError::DuplicateSelection { view, indicator, order });
        }

        let id = SelectedIndicatorId(self.next_selection);
        self.next_selection += 1;
        self.selections.push(SelectedIndicator { id, view, indicator, order });

        if !self.report_has_indicator(report, indicator) {
            self.report_indicators.push((report, indicator));
        }
        Ok(id)
    }

    pub fn set_selection_order(&mut self, id: SelectedIndicatorId, order: i32) -> Result<(), StoreError> {
        let current = *self
            .selections
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("SelectedIndicator", id))?;
        if self.selections.iter().any(|s| s.id != id && s.view == current.view && s.indicator == current.indicator && s.order == order) {
            return Err(StoreError::DuplicateSelection { view: current.view, indicator: current.indicator, order });
        }
        if let Some(sel) = self.selections.iter_mut().find(|s| s.id == id) {
            sel.order = order;
        }
        Ok(())
    }

    /// Selections of a view ascending by order; ties keep creation order.
    pub fn selections_of(&self, view: ViewId) -> Vec<&SelectedIndicator> {
        let mut sels: Vec<&SelectedIndicator> = self.selections.iter().filter(|s| s.view == view).collect();
        sels.sort_by_key(|s| (s.order, s.id));
        sels
    }

    /// Groups a view by `indicator`, which joins the view's report like a
    /// selected indicator does.
    pub fn add_aggregator(&mut self, view: ViewId, indicator: IndicatorId) -> Result<AggregatorId, StoreError> {
        let report = self.view(view)?.report;
        self.indicator(indicator)?;
        let id = AggregatorId::new(self.aggregators.len());
        self.aggregators.push(Aggregator { id, view, indicator });

        if !self.report_has_indicator(report, indicator) {
            self.report_indicators.push((report, indicator));
        }
        Ok(id)
    }

    /// Aggregators of a view in application order.
    pub fn aggregators_of(&self, view: ViewId) -> Vec<&Aggregator> {
        let mut aggs: Vec<&Aggregator> = self.aggregators.iter().filter(|a| a.view == view).collect();
        aggs.sort_by_key(|a| a.id);
        aggs
    }
}
