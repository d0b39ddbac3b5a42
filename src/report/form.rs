//! Record entry: turns raw form input into a validated record.
use crate::store::{AttributeStore, Concept, Datatype, EavStore, RawValue, RecordId, Registry, ReportId, StoreError, StrategyKind};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("Invalid fields: {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
    Invalid(BTreeMap<String, String>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Date formats accepted for date fields, tried in order.
const DATE_INPUTS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

/// One input field per value-indicator concept of a report.
#[derive(Debug, Clone)]
pub struct RecordForm {
    report: ReportId,
    name: String,
    fields: Vec<Concept>,
}

impl RecordForm {
    pub fn for_report(registry: &Registry, report: ReportId) -> Result<Self, StoreError> {
        let report_name = registry.report(report)?.name.clone();
        let mut fields: Vec<Concept> = Vec::new();
        for id in registry.report_indicators(report) {
            if registry.indicator(id)?.strategy != Some(StrategyKind::Value) {
                continue;
            }
            let concept = registry.concept_of(id)?;
            if !fields.iter().any(|f| f.id == concept.id) {
                fields.push(concept.clone());
            }
        }
        fields.sort_by(|a, b| a.slug.cmp(&b.slug));

        let name = format!("{}RecordForm", report_name.split_whitespace().collect::<String>());
        Ok(Self { report, name, fields })
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn field_slugs(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.slug.as_str()).collect()
    }

    /// Parses every field, collecting all errors keyed by slug.
    pub fn validate(&self, inputs: &HashMap<String, String>) -> Result<Vec<(String, RawValue)>, FormError> {
        let mut values = Vec::with_capacity(self.fields.len());
        let mut errors = BTreeMap::new();
        for field in &self.fields {
            let raw = inputs.get(&field.slug).map(|s| s.trim()).filter(|s| !s.is_empty());
            match raw {
                None => {
                    errors.insert(field.slug.clone(), "This field is required.".to_string());
                }
                Some(text) => match parse_input(text, field.datatype) {
                    Some(v) => values.push((field.slug.clone(), v)),
                    None => {
                        errors.insert(field.slug.clone(), format!("Enter a valid {:?} value.", field.datatype).to_lowercase());
                    }
                },
            }
        }
        if errors.is_empty() {
            Ok(values)
        } else {
            Err(FormError::Invalid(errors))
        }
    }

    /// Validates then stores a new, unvalidated record dated `date`.
    pub fn save(
        &self,
        registry: &mut Registry,
        attributes: &mut EavStore,
        inputs: &HashMap<String, String>,
        date: NaiveDate,
    ) -> Result<RecordId, FormError> {
        let values = self.validate(inputs)?;
        let record = registry.create_record(self.report, date)?;
        for (slug, value) in values {
            attributes.set(record, slug, value);
        }
        tracing::debug!(%record, form = %self.name, "record saved");
        Ok(record)
    }

    /// Current values of a record, as form input strings.
    pub fn initial(&self, attributes: &dyn AttributeStore, record: RecordId) -> HashMap<String, String> {
        self.fields
            .iter()
            .filter_map(|f| {
                let value = attributes.get(record, &f.slug)?;
                let text = match value {
                    RawValue::Date(d) => d.format(DATE_INPUTS[0]).to_string(),
                    RawValue::Float(x) => crate::report::format::format_float(x),
                    RawValue::Int(i) => i.to_string(),
                    RawValue::Text(s) => s,
                    RawValue::Bool(b) => b.to_string(),
                };
                Some((f.slug.clone(), text))
            })
            .collect()
    }
}

fn parse_input(text: &str, datatype: Datatype) -> Option<RawValue> {
    match datatype {
        Datatype::Int => text.parse::<i64>().ok().map(RawValue::Int),
        Datatype::Float => text.parse::<f64>().ok().filter(|f| f.is_finite()).map(RawValue::Float),
        Datatype::Text => Some(RawValue::Text(text.to_string())),
        Datatype::Bool => match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(RawValue::Bool(true)),
            "false" | "no" | "0" | "off" => Some(RawValue::Bool(false)),
            _ => None,
        },
        Datatype::Date => DATE_INPUTS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
            .map(RawValue::Date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> (Registry, ReportId) {
        let mut reg = Registry::new();
        let report = reg.create_report("Square");
        for name in ["Width", "Height"] {
            let c = reg.create_concept(name, Datatype::Int);
            let i = reg.create_indicator_from_concept(c, StrategyKind::Value, None, &[]).unwrap();
            reg.add_indicator_to_report(report, i).unwrap();
        }
        (reg, report)
    }

    fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_form_fields() {
        let (reg, report) = square();
        let form = RecordForm::for_report(&reg, report).unwrap();
        assert_eq!(form.name(), "SquareRecordForm");
        assert_eq!(form.field_slugs(), vec!["height", "width"]);
    }

    #[test]
    fn test_computed_indicators_are_not_fields() {
        let (mut reg, report) = square();
        let ids = reg.report_indicators(report);
        let area = reg.create_indicator_with_new_concept("Area", Datatype::Int, StrategyKind::Product, &ids).unwrap();
        reg.add_indicator_to_report(report, area).unwrap();
        let form = RecordForm::for_report(&reg, report).unwrap();
        assert_eq!(form.field_slugs(), vec!["height", "width"]);
    }

    #[test]
    fn test_basic_validation() {
        let (reg, report) = square();
        let form = RecordForm::for_report(&reg, report).unwrap();
        assert!(form.validate(&inputs(&[("width", "5"), ("height", "3")])).is_ok());

        let Err(FormError::Invalid(errors)) = form.validate(&inputs(&[("width", "5")])) else {
            panic!("missing field must be rejected");
        };
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["height"]);

        let Err(FormError::Invalid(errors)) = form.validate(&inputs(&[("width", "five"), ("height", "3")])) else {
            panic!("non numeric input must be rejected");
        };
        assert_eq!(errors["width"], "enter a valid int value.");
    }

    #[test]
    fn test_saving_creates_a_record() {
        let (mut reg, report) = square();
        let mut eav = EavStore::new();
        let form = RecordForm::for_report(&reg, report).unwrap();
        let date = NaiveDate::from_ymd_opt(2011, 4, 2).unwrap();
        let record = form.save(&mut reg, &mut eav, &inputs(&[("width", "5"), ("height", "3")]), date).unwrap();

        assert_eq!(reg.records_of(report).count(), 1);
        assert!(!reg.record(record).unwrap().validated);
        assert_eq!(eav.get(record, "height"), Some(RawValue::Int(3)));
        assert_eq!(eav.get(record, "width"), Some(RawValue::Int(5)));
        assert_eq!(form.initial(&eav, record), inputs(&[("width", "5"), ("height", "3")]));
    }

    #[test]
    fn test_failed_save_creates_nothing() {
        let (mut reg, report) = square();
        let mut eav = EavStore::new();
        let form = RecordForm::for_report(&reg, report).unwrap();
        let date = NaiveDate::from_ymd_opt(2011, 4, 2).unwrap();
        assert!(form.save(&mut reg, &mut eav, &inputs(&[("width", "5")]), date).is_err());
        assert_eq!(reg.records_of(report).count(), 0);
    }

    #[test]
    fn test_parse_dates_and_bools() {
        let d = NaiveDate::from_ymd_opt(2011, 3, 9).unwrap();
        assert_eq!(parse_input("2011-03-09", Datatype::Date), Some(RawValue::Date(d)));
        assert_eq!(parse_input("03/09/2011", Datatype::Date), Some(RawValue::Date(d)));
        assert_eq!(parse_input("Yes", Datatype::Bool), Some(RawValue::Bool(true)));
        assert_eq!(parse_input("maybe", Datatype::Bool), None);
        assert_eq!(parse_input("2.5", Datatype::Float), Some(RawValue::Float(2.5)));
    }
}
