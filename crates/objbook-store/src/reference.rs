use std::fmt;
use std::sync::Arc;

use crate::class::Param;
use crate::instance::Entity;

/// A reference waiting for its target to exist in the destination book.
///
/// `source` owns `param`; once `target` is present, the parameter is pointed
/// at it and the record is dropped.
#[derive(Clone)]
pub struct ReferenceRecord {
    pub source: Entity,
    pub param: Arc<Param>,
    pub target: Entity,
}

impl ReferenceRecord {
    pub fn new(source: Entity, param: Arc<Param>, target: Entity) -> Self {
        Self {
            source,
            param,
            target,
        }
    }

    /// Records are the same link when source, parameter name and target
    /// match.
    pub fn same_link(&self, other: &Self) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.param.name() == other.param.name()
    }
}

impl fmt::Debug for ReferenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReferenceRecord({:?}.{} -> {:?})",
            self.source,
            self.param.name(),
            self.target
        )
    }
}
