use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

macro_rules! entity_id {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
            pub struct $name(pub u32);

            impl $name {
                #[inline(always)]
                pub fn index(&self) -> usize { self.0 as usize }
                pub fn new(idx: usize) -> Self { Self(idx as u32) }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "#{}", self.0)
                }
            }
        )*
    };
}

entity_id!(
    ReportId,
    RecordId,
    ConceptId,
    /// Identity of a persisted indicator. Unsaved indicators have none.
    IndicatorId,
    ViewId,
    SelectedIndicatorId,
    AggregatorId,
);

/// The storage type of a concept's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    Int,
    Float,
    Text,
    Date,
    Bool,
}

impl Datatype {
    /// Only numeric columns survive a sum-style aggregation.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Datatype::Int | Datatype::Float)
    }
}

/// An external, named and typed field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub name: String,
    pub slug: String,
    pub datatype: Datatype,
}

/// How an indicator derives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    Value,
    Ratio,
    Rate,
    Average,
    Sum,
    Product,
    Difference,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::Value,
        StrategyKind::Ratio,
        StrategyKind::Rate,
        StrategyKind::Average,
        StrategyKind::Sum,
        StrategyKind::Product,
        StrategyKind::Difference,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Value => "value",
            StrategyKind::Ratio => "ratio",
            StrategyKind::Rate => "rate",
            StrategyKind::Average => "average",
            StrategyKind::Sum => "sum",
            StrategyKind::Product => "product",
            StrategyKind::Difference => "difference",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Maximum number of parameters the kind accepts, `None` when unbounded.
    pub fn max_parameters(&self) -> Option<usize> {
        match self {
            StrategyKind::Value => Some(0),
            StrategyKind::Ratio | StrategyKind::Rate | StrategyKind::Difference => Some(2),
            StrategyKind::Average | StrategyKind::Sum | StrategyKind::Product => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named rule for deriving a value from a record.
///
/// An indicator without an `id` has never been saved. It stays `Unbound`
/// until the registry persists it, after which `concept` and `strategy`
/// are frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: Option<IndicatorId>,
    pub name: String,
    pub concept: Option<ConceptId>,
    pub strategy: Option<StrategyKind>,
}

impl Indicator {
    pub fn draft(name: impl Into<String>) -> Self {
        Self { id: None, name: name.into(), concept: None, strategy: None }
    }

    pub fn is_bound(&self) -> bool {
        self.id.is_some() && self.concept.is_some() && self.strategy.is_some()
    }
}

/// An ordered edge from a computed indicator to one of its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub owner: IndicatorId,
    pub indicator: IndicatorId,
    pub order: i32,
}

/// Operand indicators of one owner, ascending by `order`.
pub type ParameterList = SmallVec<[IndicatorId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub name: String,
}

/// One batch of raw observations. The values live in the attribute store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub report: ReportId,
    pub date: NaiveDate,
    pub validated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportView {
    pub id: ViewId,
    pub report: ReportId,
    pub name: String,
    pub time_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedIndicator {
    pub id: SelectedIndicatorId,
    pub view: ViewId,
    pub indicator: IndicatorId,
    pub order: i32,
}

/// Groups the rows of a view by the value of `indicator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregator {
    pub id: AggregatorId,
    pub view: ViewId,
    pub indicator: IndicatorId,
}

/// A raw attribute or computed value, before formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Bool(bool),
}

impl RawValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(i) => Some(*i as f64),
            RawValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, RawValue::Int(_) | RawValue::Float(_))
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self { RawValue::Int(v) }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self { RawValue::Int(v as i64) }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self { RawValue::Float(v) }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self { RawValue::Text(v.to_string()) }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self { RawValue::Text(v) }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self { RawValue::Bool(v) }
}

impl From<NaiveDate> for RawValue {
    fn from(v: NaiveDate) -> Self { RawValue::Date(v) }
}

/// Derives a slug from a display name: lowercase ASCII alphanumerics with
/// every other run of characters collapsed into a single `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("concept");
    }
    slug
}
