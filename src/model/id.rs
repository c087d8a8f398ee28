use crate::error::EngineError;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of an entity within a scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id {
    uuid: Uuid,
    entity_type: CompactString,
}

impl Id {
    /// Fresh time-ordered identity of the given type.
    pub fn new(entity_type: impl Into<CompactString>) -> Self {
        Self {
            uuid: Uuid::now_v7(),
            entity_type: entity_type.into(),
        }
    }

    pub fn from_parts(uuid: Uuid, entity_type: impl Into<CompactString>) -> Self {
        Self {
            uuid,
            entity_type: entity_type.into(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.uuid.is_nil() {
            return Err(EngineError::Validation("entity id uuid is required".into()));
        }
        if self.entity_type.trim().is_empty() {
            return Err(EngineError::Validation("entity id type is required".into()));
        }
        Ok(())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.uuid)
    }
}

/// Tenant namespace applied to every stored key. Supplied by the caller on
/// every operation, never inferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    tenant: Uuid,
    name: CompactString,
}

impl Scope {
    pub fn new(tenant: Uuid, name: impl Into<CompactString>) -> Self {
        Self {
            tenant,
            name: name.into(),
        }
    }

    pub fn tenant(&self) -> Uuid {
        self.tenant
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tenant.is_nil() {
            return Err(EngineError::Validation("scope tenant is required".into()));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("scope name is required".into()));
        }
        Ok(())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{Id, Scope};
    use uuid::Uuid;

    #[test]
    fn nil_or_untyped_ids_are_rejected() {
        assert!(Id::from_parts(Uuid::nil(), "user").validate().is_err());
        assert!(Id::from_parts(Uuid::new_v4(), " ").validate().is_err());
        assert!(Id::new("user").validate().is_ok());
    }

    #[test]
    fn fresh_ids_are_time_based() {
        let a = Id::new("user");
        let b = Id::new("user");
        assert_ne!(a, b);
        assert_eq!(a.uuid().get_version_num(), 7);
    }

    #[test]
    fn scope_requires_tenant_and_name() {
        assert!(Scope::new(Uuid::nil(), "users").validate().is_err());
        assert!(Scope::new(Uuid::new_v4(), "").validate().is_err());
        assert!(Scope::new(Uuid::new_v4(), "users").validate().is_ok());
    }
}
