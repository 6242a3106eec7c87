use objbook_store::Entity;

use crate::error::CopyError;

/// Outcome of a batch or recursive copy.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Entities newly created in the destination.
    pub copied: Vec<Entity>,
    /// Entities skipped because the destination already held them.
    pub skipped: Vec<Entity>,
    /// Entities that could not be copied.
    pub failed: Vec<(Entity, CopyError)>,
    /// Entities of the source collection already present in the
    /// destination before copying started.
    pub duplicates_detected: usize,
    /// References linked at the end of the call.
    pub references_linked: usize,
    /// References still waiting for their target afterwards.
    pub unresolved_references: usize,
}

impl BatchReport {
    /// The aggregate error flag: something failed, or duplicates were
    /// found by the pre-pass.
    pub fn had_errors(&self) -> bool {
        !self.failed.is_empty() || self.duplicates_detected > 0
    }

    /// Entities looked at, whatever the outcome.
    pub fn total(&self) -> usize {
        self.copied.len() + self.skipped.len() + self.failed.len()
    }

    pub(crate) fn record(&mut self, entity: Entity, outcome: Result<(), CopyError>) {
        match outcome {
            Ok(()) => self.copied.push(entity),
            Err(CopyError::AlreadyPresent(_)) => self.skipped.push(entity),
            Err(err) => self.failed.push((entity, err)),
        }
    }
}
