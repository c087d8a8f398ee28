pub mod entity;
pub mod id;
pub mod mvcc;
pub mod value;

pub use entity::{Entity, EntitySet};
pub use id::{Id, Scope};
pub use mvcc::{MvccEntity, MvccLogEntry, Stage, Status, VersionSet};
pub use value::{FieldMap, Location, Value};
