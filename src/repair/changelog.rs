use crate::error::EngineError;
use crate::model::{Entity, FieldMap, Id, Value};
use crate::version::Version;
use compact_str::CompactString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    PropertyWrite,
    PropertyDelete,
}

/// One field-level delta between two snapshots of the same entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogEntry {
    id: Id,
    version: Option<Version>,
    field: CompactString,
    change_type: ChangeType,
    value: Option<Value>,
}

impl ChangeLogEntry {
    pub fn write(id: Id, version: Option<Version>, field: CompactString, value: Value) -> Self {
        Self {
            id,
            version,
            field,
            change_type: ChangeType::PropertyWrite,
            value: Some(value),
        }
    }

    pub fn delete(id: Id, version: Option<Version>, field: CompactString) -> Self {
        Self {
            id,
            version,
            field,
            change_type: ChangeType::PropertyDelete,
            value: None,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Version of the newer snapshot the change was taken from.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

/// Whole-payload diff: every field of `newer` that is new or changed is a
/// write, every field only in `older` is a delete. Pure.
pub fn diff(older: &Entity, newer: &Entity) -> Vec<ChangeLogEntry> {
    diff_fields(newer.id(), newer.version(), older.fields(), newer.fields())
}

pub(crate) fn diff_fields(
    id: &Id,
    version: Option<Version>,
    older: &FieldMap,
    newer: &FieldMap,
) -> Vec<ChangeLogEntry> {
    let mut changes = Vec::new();
    for (field, value) in newer.iter() {
        if older.get(field) != Some(value) {
            changes.push(ChangeLogEntry::write(
                id.clone(),
                version,
                field.clone(),
                value.clone(),
            ));
        }
    }
    for field in older.keys() {
        if !newer.contains_key(field) {
            changes.push(ChangeLogEntry::delete(id.clone(), version, field.clone()));
        }
    }
    changes
}

/// Applies `changes` in order onto `target`. A change for another entity or
/// a write without a valid value is `MalformedPayload`; `target` is only
/// modified when every change is well-formed.
pub fn apply(
    target: &mut FieldMap,
    id: &Id,
    changes: &[ChangeLogEntry],
) -> Result<(), EngineError> {
    for change in changes {
        if change.id() != id {
            return Err(EngineError::MalformedPayload(format!(
                "change for {} applied to {}",
                change.id(),
                id
            )));
        }
        if change.change_type() == ChangeType::PropertyWrite {
            let value = change.value().ok_or_else(|| {
                EngineError::MalformedPayload(format!(
                    "write of field '{}' has no value",
                    change.field()
                ))
            })?;
            value.validate().map_err(|e| {
                EngineError::MalformedPayload(format!("field '{}': {e}", change.field()))
            })?;
        }
    }
    for change in changes {
        match (change.change_type(), change.value()) {
            (ChangeType::PropertyWrite, Some(value)) => {
                target.insert(change.field.clone(), value.clone());
            }
            (ChangeType::PropertyDelete, _) => {
                target.remove(change.field());
            }
            (ChangeType::PropertyWrite, None) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ChangeLogEntry, ChangeType, apply, diff};
    use crate::model::{Entity, Id, Value};
    use crate::model::value::FieldMap;
    use crate::version::Version;

    #[test]
    fn diff_emits_writes_and_deletes() {
        let id = Id::new("user");
        let older = Entity::new(id.clone())
            .with_field("name", "a")
            .with_field("age", 1i64)
            .with_field("city", "x");
        let newer = Entity::new(id.clone())
            .with_field("name", "a")
            .with_field("age", 2i64)
            .with_field("email", "a@b");
        let mut changes = diff(&older, &newer);
        changes.sort_by(|a, b| a.field().cmp(b.field()));

        let summary: Vec<(&str, ChangeType)> = changes
            .iter()
            .map(|c| (c.field(), c.change_type()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("age", ChangeType::PropertyWrite),
                ("city", ChangeType::PropertyDelete),
                ("email", ChangeType::PropertyWrite),
            ]
        );
        assert_eq!(changes[0].value(), Some(&Value::from(2i64)));
    }

    #[test]
    fn identical_snapshots_produce_no_changes() {
        let id = Id::new("user");
        let entity = Entity::new(id).with_field("name", "a");
        assert!(diff(&entity, &entity.clone()).is_empty());
    }

    #[test]
    fn apply_turns_older_into_newer() {
        let id = Id::new("user");
        let older = Entity::new(id.clone())
            .with_field("name", "a")
            .with_field("tags", Value::List(vec![Value::from("x")]));
        let newer = Entity::new(id.clone()).with_field("name", "b");
        let mut fields = older.fields().clone();
        apply(&mut fields, &id, &diff(&older, &newer)).expect("apply");
        assert_eq!(&fields, newer.fields());
    }

    #[test]
    fn malformed_changes_leave_target_untouched() {
        let id = Id::new("user");
        let mut fields = FieldMap::new();
        fields.insert("name".into(), Value::from("a"));
        let before = fields.clone();
        let changes = vec![
            ChangeLogEntry::delete(id.clone(), Some(Version::MIN), "name".into()),
            ChangeLogEntry::write(
                id.clone(),
                Some(Version::MIN),
                "score".into(),
                Value::Float(f64::NAN),
            ),
        ];
        let err = apply(&mut fields, &id, &changes).expect_err("nan value");
        assert_eq!(err.code_str(), "malformed_payload");
        assert_eq!(fields, before);

        let foreign = vec![ChangeLogEntry::delete(Id::new("user"), None, "name".into())];
        assert!(apply(&mut fields, &id, &foreign).is_err());
    }
}
