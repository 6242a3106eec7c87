use tracing::{debug, warn};

use objbook_store::Book;

/// Counts from one resolution pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub linked: usize,
    pub remaining: usize,
    pub dropped: usize,
}

/// Link every pending reference whose target now exists in `book`.
///
/// Records whose target is still missing stay pending for a later copy.
/// Records whose source has since been deleted, or whose link fails, are
/// dropped.
pub fn resolve_pending(book: &mut Book) -> Resolution {
    let mut resolution = Resolution::default();
    let mut waiting = Vec::new();

    for record in book.take_pending_references() {
        if !book.contains(&record.source) {
            warn!(record = ?record, "dropping reference from missing source");
            resolution.dropped += 1;
            continue;
        }
        if !book.contains(&record.target) {
            waiting.push(record);
            continue;
        }
        match book.link_reference(&record) {
            Ok(()) => {
                debug!(record = ?record, "linked reference");
                resolution.linked += 1;
            }
            Err(err) => {
                warn!(record = ?record, error = %err, "could not link reference");
                resolution.dropped += 1;
            }
        }
    }

    resolution.remaining = waiting.len();
    book.push_pending_references(waiting);
    resolution
}
