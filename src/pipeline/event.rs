use crate::model::{Id, Scope};
use crate::version::Version;

/// The value flowing between two pipeline stages, tagged with the scope it
/// belongs to. Each stage consumes one of these and produces the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionIoEvent<T> {
    scope: Scope,
    event: T,
}

impl<T> CollectionIoEvent<T> {
    pub fn new(scope: Scope, event: T) -> Self {
        Self { scope, event }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn event(&self) -> &T {
        &self.event
    }

    pub fn into_parts(self) -> (Scope, T) {
        (self.scope, self.event)
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> CollectionIoEvent<U> {
        CollectionIoEvent {
            scope: self.scope,
            event: f(self.event),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitKind {
    Write,
    Delete,
}

/// Published after a version commits. Consumed by out-of-process indexers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    pub scope: Scope,
    pub id: Id,
    pub version: Version,
    pub kind: CommitKind,
}
