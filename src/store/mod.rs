//! Entities of the reporting domain and the store that owns them.
pub mod attributes;
pub mod error;
pub mod registry;
pub mod types;

pub use attributes::{AttributeStore, EavStore};
pub use error::StoreError;
pub use registry::Registry;
pub use types::*;
