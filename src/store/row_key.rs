use crate::model::{Id, Scope};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Order-preserving row key: `(tenant, scope name, id type, id uuid)`.
///
/// The scope prefix comes first so rows of different tenants never share a
/// key, and text components are terminated so one component can never bleed
/// into the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    bytes: SmallVec<[u8; 64]>,
}

impl RowKey {
    pub fn for_entity(scope: &Scope, id: &Id) -> Self {
        let mut out = SmallVec::<[u8; 64]>::new();
        out.extend_from_slice(scope.tenant().as_bytes());
        append_text(scope.name(), &mut out);
        append_text(id.entity_type(), &mut out);
        out.extend_from_slice(id.uuid().as_bytes());
        Self { bytes: out }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

fn append_text(s: &str, out: &mut SmallVec<[u8; 64]>) {
    for byte in s.as_bytes() {
        if *byte == 0 {
            // Escape interior nulls so the terminator stays unambiguous.
            out.extend_from_slice(&[0x00, 0xFF]);
        } else {
            out.push(*byte);
        }
    }
    out.push(0x00);
}

#[cfg(test)]
mod tests {
    use super::RowKey;
    use crate::model::{Id, Scope};
    use uuid::Uuid;

    #[test]
    fn tenants_never_share_row_keys() {
        let id = Id::new("user");
        let a = RowKey::for_entity(&Scope::new(Uuid::new_v4(), "users"), &id);
        let b = RowKey::for_entity(&Scope::new(Uuid::new_v4(), "users"), &id);
        assert_ne!(a, b);
    }

    #[test]
    fn text_components_do_not_bleed() {
        let tenant = Uuid::new_v4();
        let uuid = Uuid::new_v4();
        let a = RowKey::for_entity(&Scope::new(tenant, "ab"), &Id::from_parts(uuid, "c"));
        let b = RowKey::for_entity(&Scope::new(tenant, "a"), &Id::from_parts(uuid, "bc"));
        assert_ne!(a, b);
    }

    #[test]
    fn interior_nulls_are_escaped() {
        let tenant = Uuid::new_v4();
        let uuid = Uuid::new_v4();
        let a = RowKey::for_entity(&Scope::new(tenant, "a\0"), &Id::from_parts(uuid, "b"));
        let b = RowKey::for_entity(&Scope::new(tenant, "a"), &Id::from_parts(uuid, "\0b"));
        assert_ne!(a, b);
    }
}
