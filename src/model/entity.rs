use crate::model::id::Id;
use crate::model::value::{FieldMap, Value};
use crate::version::Version;
use compact_str::CompactString;
use std::collections::HashMap;

/// A schemaless entity: identity, the version it was read or written at,
/// and an ordered field map.
///
/// Identity and version are fixed at construction; only the engine stamps a
/// version, through [`Entity::with_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    id: Id,
    version: Option<Version>,
    fields: FieldMap,
}

impl Entity {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            version: None,
            fields: FieldMap::new(),
        }
    }

    pub fn from_fields(id: Id, fields: FieldMap) -> Self {
        Self {
            id,
            version: None,
            fields,
        }
    }

    pub fn with_field(mut self, name: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn set_field(&mut self, name: impl Into<CompactString>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn into_fields(self) -> FieldMap {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Same fields, ignoring identity and version.
    pub fn same_payload(&self, other: &Entity) -> bool {
        self.fields == other.fields
    }
}

/// Result of a multi-id load. Ids that resolved to nothing are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySet {
    entities: HashMap<Id, Entity>,
}

impl EntitySet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id().clone(), entity);
    }

    pub fn get(&self, id: &Id) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }
}
