//! Data matrices, aggregation and record entry for report views.
pub mod aggregator;
pub mod form;
pub mod format;
pub mod row;
pub mod view;

pub use form::{FormError, RecordForm};
pub use row::Row;
pub use view::{Column, ViewAssembler};
