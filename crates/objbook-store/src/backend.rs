use crate::instance::Instance;

/// Persistence hooks invoked around instance edits.
///
/// `edit_begin` runs when an instance enters its outermost edit and
/// `edit_commit` when that edit closes. Nested edits do not reach the
/// backend.
pub trait Backend: Send + Sync {
    fn edit_begin(&self, _inst: &Instance) {}

    /// Persist the instance. An error leaves the instance dirty.
    fn edit_commit(&self, inst: &Instance) -> Result<(), String>;
}

/// Backend that accepts every commit and stores nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn edit_commit(&self, _inst: &Instance) -> Result<(), String> {
        Ok(())
    }
}
