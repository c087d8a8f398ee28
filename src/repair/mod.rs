//! Read-time reconstruction of an entity from its visible versions.
//!
//! Callers hand over the committed rows of one id, newest first. The newest
//! `Complete` row with content is the base; every newer committed version is
//! folded onto it as a change-log delta, oldest to newest.

pub mod changelog;

pub use changelog::{ChangeLogEntry, ChangeType, apply, diff};

use crate::error::EngineError;
use crate::model::{Entity, FieldMap, Id, MvccEntity};
use changelog::diff_fields;
use tracing::warn;

/// Current value of `id` given its committed rows, newest first.
///
/// `Ok(None)` means deleted or never written. A window with no usable base
/// is `RepairExhausted`.
pub fn resolve(id: &Id, visible: &[MvccEntity]) -> Result<Option<Entity>, EngineError> {
    let Some(newest) = visible.first() else {
        return Ok(None);
    };
    let Some(payload) = newest.payload() else {
        return Ok(None);
    };
    if newest.is_complete() {
        return Ok(Some(payload.clone()));
    }
    let base_idx = visible
        .iter()
        .position(|row| row.is_complete() && row.payload().is_some())
        .ok_or_else(|| EngineError::RepairExhausted {
            id: id.clone(),
            scanned: visible.len(),
        })?;
    materialize(id, &visible[..=base_idx]).map(Some)
}

/// Replays `rows[..last]` onto the base at `rows[last]`. `rows` is newest
/// first and every row after the base must belong to `id`.
fn materialize(id: &Id, rows: &[MvccEntity]) -> Result<Entity, EngineError> {
    let (base, newer) = rows
        .split_last()
        .ok_or_else(|| EngineError::Validation("repair needs a base version".into()))?;
    let base_fields = base
        .payload()
        .map(Entity::fields)
        .ok_or_else(|| EngineError::Validation("repair base has no payload".into()))?;

    let empty = FieldMap::new();
    let mut working = base_fields.clone();
    let mut previous = base_fields;
    for row in newer.iter().rev() {
        if row.id() != id {
            return Err(EngineError::MalformedPayload(format!(
                "row for {} found while repairing {}",
                row.id(),
                id
            )));
        }
        // A tombstone between base and target reads as an empty snapshot.
        let snapshot = row.payload().map(Entity::fields).unwrap_or(&empty);
        let changes = diff_fields(id, Some(row.version()), previous, snapshot);
        apply(&mut working, id, &changes)?;
        previous = snapshot;
    }

    let target = newer.first().unwrap_or(base);
    warn!(
        id = %id,
        base = %base.version(),
        target = %target.version(),
        replayed = newer.len(),
        "repaired entity from unpromoted versions"
    );
    Ok(Entity::from_fields(id.clone(), working).with_version(target.version()))
}
