//! JSON persistence of a whole workspace: the registry and its attribute values.
use crate::analysis::topology;
use crate::store::{EavStore, Registry, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Inconsistent snapshot: {0}")]
    Invalid(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub registry: Registry,
    pub attributes: EavStore,
}

impl Snapshot {
    pub fn new(registry: Registry, attributes: EavStore) -> Self {
        Self { registry, attributes }
    }
}

pub fn save(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    tracing::info!(
        path = %path.display(),
        indicators = snapshot.registry.indicators.len(),
        records = snapshot.registry.records.len(),
        "snapshot saved"
    );
    Ok(())
}

/// Reads a snapshot back and rebuilds the registry's derived state.
///
/// A parameter graph that is no longer acyclic is rejected, since nothing
/// could be evaluated from it.
pub fn load(path: impl AsRef<Path>) -> Result<Snapshot, SnapshotError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let mut snapshot: Snapshot = serde_json::from_str(&text)?;
    snapshot.registry.rebuild_slug_cache();
    topology::evaluation_order(&snapshot.registry)?;
    tracing::info!(
        path = %path.display(),
        indicators = snapshot.registry.indicators.len(),
        records = snapshot.registry.records.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AttributeStore, Datatype, Parameter, RawValue, StrategyKind};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn workspace() -> Snapshot {
        let mut reg = Registry::new();
        let report = reg.create_report("Square");
        let ch = reg.create_concept("Height", Datatype::Int);
        let h = reg.create_indicator_from_concept(ch, StrategyKind::Value, None, &[]).unwrap();
        reg.add_indicator_to_report(report, h).unwrap();
        let record = reg.create_record(report, NaiveDate::from_ymd_opt(2011, 5, 1).unwrap()).unwrap();
        let mut eav = EavStore::new();
        eav.set(record, "height", 10);
        Snapshot::new(reg, eav)
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workspace.json");
        save(&path, &workspace()).unwrap();

        let mut loaded = load(&path).unwrap();
        let record = loaded.registry.records[0].id;
        assert_eq!(loaded.attributes.get(record, "height"), Some(RawValue::Int(10)));

        // the slug cache is live again: a second "Height" concept gets a suffix
        let c = loaded.registry.create_concept("Height", Datatype::Int);
        assert_eq!(loaded.registry.concept(c).unwrap().slug, "height_1");
    }

    #[test]
    fn test_cyclic_snapshot_is_rejected() {
        let mut snap = workspace();
        let a = snap.registry.create_indicator_with_new_concept("A", Datatype::Int, StrategyKind::Sum, &[]).unwrap();
        let b = snap.registry.create_indicator_with_new_concept("B", Datatype::Int, StrategyKind::Sum, &[a]).unwrap();
        // edited by hand on disk
        snap.registry.parameters.push(Parameter { owner: a, indicator: b, order: 1 });

        let dir = tempdir().unwrap();
        let path = dir.path().join("cyclic.json");
        save(&path, &snap).unwrap();
        assert!(matches!(load(&path), Err(SnapshotError::Invalid(StoreError::CyclicParameter { .. }))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(load(dir.path().join("nope.json")), Err(SnapshotError::Io(_))));
    }
}
