//! Undo and redo.
//!
//! Changes are recorded as parameter-level snapshots grouped into named
//! operations. `operations[..cursor]` are the applied ones: [`Book::undo`]
//! steps the cursor back and replays that operation's `before` captures,
//! [`Book::redo`] replays its `after` captures and steps forward.
//!
//! Each snapshot's action names what undo does to the entity: a recorded
//! creation is undone by a `Delete`, a recorded deletion by a `Create`.
//! Redo does the opposite. Replay runs in three phases (instantiate,
//! restore fields, delete) so field writes always land on a live entity.
//!
//! The key-value side-table has no scalar value, so it is snapshotted one
//! leaf path at a time using the lossless [`KvpValue`] text form.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use objbook_types::{KvpValue, Timestamp};

use crate::accessor::Accessor;
use crate::book::Book;
use crate::class::Param;
use crate::dispatch;
use crate::error::{StoreError, StoreResult};
use crate::instance::{Entity, Instance};

/// What replaying a snapshot does to its entity when undoing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UndoAction {
    /// Nothing; the value did not change.
    NoOp,
    /// Re-instantiate the entity (it was deleted).
    Create,
    /// Delete the entity (it was created).
    Delete,
    /// Restore a parameter value.
    Modify,
}

/// A captured parameter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capture {
    /// Not captured yet; filled from the live book when the operation ends.
    Pending,
    /// No value: the entity or key-value slot did not exist.
    Absent,
    Value(String),
}

/// One parameter-level snapshot.
#[derive(Clone)]
pub struct UndoEntity {
    /// `None` for the existence snapshots of `Create` / `Delete`.
    pub param: Option<Arc<Param>>,
    pub entity: Entity,
    /// Slot path when `param` is the key-value side-table.
    pub kvp_path: Option<String>,
    pub before: Capture,
    pub after: Capture,
    pub action: UndoAction,
}

impl UndoEntity {
    fn existence(entity: Entity, action: UndoAction) -> Self {
        Self {
            param: None,
            entity,
            kvp_path: None,
            before: Capture::Absent,
            after: Capture::Absent,
            action,
        }
    }

    fn modify(entity: Entity, param: Arc<Param>, kvp_path: Option<String>, before: Capture) -> Self {
        Self {
            param: Some(param),
            entity,
            kvp_path,
            before,
            after: Capture::Pending,
            action: UndoAction::Modify,
        }
    }

    fn param_name(&self) -> Option<&str> {
        self.param.as_deref().map(Param::name)
    }

    fn targets(&self, entity: &Entity, param: &str) -> bool {
        self.entity == *entity && self.param_name() == Some(param)
    }
}

impl fmt::Debug for UndoEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoEntity")
            .field("entity", &self.entity)
            .field("param", &self.param_name())
            .field("kvp_path", &self.kvp_path)
            .field("before", &self.before)
            .field("after", &self.after)
            .field("action", &self.action)
            .finish()
    }
}

/// One user-visible step.
#[derive(Clone, Debug)]
pub struct UndoOperation {
    pub label: String,
    pub timestamp: Timestamp,
    pub entries: Vec<UndoEntity>,
}

#[derive(Debug)]
struct OpenOperation {
    label: String,
    entries: Vec<UndoEntity>,
    /// Side-tables touched by `record_modify_before`, scanned for new slots
    /// when the operation closes.
    watched: Vec<(Entity, Arc<Param>)>,
    /// Initial state of entities first modified at cursor 0. Committed as
    /// its own operation just before this one, and only if this one is.
    baseline: Vec<UndoEntity>,
}

/// The per-book operation list, cursor and open recording.
#[derive(Debug, Default)]
pub struct UndoLog {
    operations: VecDeque<UndoOperation>,
    cursor: usize,
    open: Option<OpenOperation>,
    replaying: bool,
}

impl UndoLog {
    pub fn operations(&self) -> impl Iterator<Item = &UndoOperation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    /// Most recent `after` value known for a parameter (or slot) in the
    /// applied operations.
    fn last_known(&self, entity: &Entity, param: &str, path: Option<&str>) -> Option<Capture> {
        self.operations
            .range(..self.cursor)
            .rev()
            .flat_map(|op| op.entries.iter().rev())
            .find(|e| e.targets(entity, param) && e.kvp_path.as_deref() == path)
            .map(|e| e.after.clone())
            .filter(|after| *after != Capture::Pending)
    }

    /// Every slot path recorded for a side-table in the applied operations.
    fn known_paths(&self, entity: &Entity, param: &str) -> BTreeSet<String> {
        self.operations
            .range(..self.cursor)
            .flat_map(|op| op.entries.iter())
            .filter(|e| e.targets(entity, param))
            .filter_map(|e| e.kvp_path.clone())
            .collect()
    }

    fn push(&mut self, op: UndoOperation, limit: usize) {
        self.operations.truncate(self.cursor);
        self.operations.push_back(op);
        self.cursor = self.operations.len();
        while self.operations.len() > limit {
            if let Some(dropped) = self.operations.pop_front() {
                debug!(label = %dropped.label, "dropped oldest undo operation");
            }
            self.cursor = self.cursor.saturating_sub(1);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Book {
    // -----------------------------------------------------------------------
    // Operation grouping
    // -----------------------------------------------------------------------

    /// Begin recording an operation. An operation already open is
    /// discarded unrecorded.
    pub fn start_operation(&mut self, label: &str) {
        if !self.config.undo_enabled || self.undo.replaying {
            return;
        }
        if let Some(open) = self.undo.open.take() {
            debug!(label = %open.label, entries = open.entries.len(), "discarded open undo operation");
        }
        self.undo.open = Some(OpenOperation {
            label: label.to_string(),
            entries: Vec::new(),
            watched: Vec::new(),
            baseline: Vec::new(),
        });
    }

    /// Close the open operation and append it to the list, discarding any
    /// redo tail. Returns `false` when nothing was recorded.
    pub fn end_operation(&mut self) -> StoreResult<bool> {
        let Some(open) = self.undo.open.take() else {
            return Ok(false);
        };
        let OpenOperation {
            label,
            mut entries,
            watched,
            baseline,
        } = open;

        for (entity, param) in &watched {
            self.append_new_slots(&mut entries, entity, param);
        }
        for entry in &mut entries {
            if entry.after == Capture::Pending {
                entry.after = self.capture(&entry.entity, entry.param.as_deref(), entry.kvp_path.as_deref());
            }
            if entry.action == UndoAction::Modify && entry.before == entry.after {
                entry.action = UndoAction::NoOp;
            }
        }
        if entries.is_empty() {
            return Ok(false);
        }

        if !baseline.is_empty() {
            debug!(entries = baseline.len(), "recorded undo baseline");
            let base = UndoOperation {
                label: self.config.baseline_label.clone(),
                timestamp: Timestamp::now(),
                entries: baseline,
            };
            self.undo.push(base, self.config.undo_limit);
        }
        info!(label = %label, entries = entries.len(), "recorded undo operation");
        let op = UndoOperation {
            label,
            timestamp: Timestamp::now(),
            entries,
        };
        self.undo.push(op, self.config.undo_limit);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Record that `entity` was just created; undo deletes it.
    pub fn record_create(&mut self, entity: &Entity) {
        if let Some(open) = self.recording() {
            open.entries
                .push(UndoEntity::existence(entity.clone(), UndoAction::Delete));
        }
    }

    /// Record that `entity` is about to be deleted: every copyable
    /// parameter is captured so undo can restore it field by field.
    pub fn record_delete(&mut self, entity: &Entity) -> StoreResult<()> {
        if self.recording().is_none() {
            return Ok(());
        }
        let class = self.registry.class(entity.type_tag.as_str())?;
        let inst = self.instance(entity)?;

        let mut entries = vec![UndoEntity::existence(entity.clone(), UndoAction::Create)];
        for param in class.copyable_params() {
            for (path, before) in self.snapshot(inst, param)? {
                let mut entry = UndoEntity::modify(entity.clone(), Arc::clone(param), path, before);
                entry.after = Capture::Absent;
                entries.push(entry);
            }
        }
        if let Some(open) = self.recording() {
            open.entries.extend(entries);
        }
        Ok(())
    }

    /// Capture a parameter's value before it changes.
    pub fn record_modify_before(&mut self, entity: &Entity, name: &str) -> StoreResult<()> {
        if self.recording().is_none() {
            return Ok(());
        }
        let param = self.undoable_param(entity, name)?;
        self.ensure_baseline(entity)?;

        let already = self
            .undo
            .open
            .as_ref()
            .is_some_and(|open| open.entries.iter().any(|e| e.targets(entity, name)));
        if already {
            return Ok(());
        }

        let snapshot = self.snapshot(self.instance(entity)?, &param)?;
        if let Some(open) = self.recording() {
            for (path, before) in snapshot {
                open.entries
                    .push(UndoEntity::modify(entity.clone(), Arc::clone(&param), path, before));
            }
            if matches!(param.accessor(), Accessor::Kvp) {
                open.watched.push((entity.clone(), param));
            }
        }
        Ok(())
    }

    /// Capture a parameter's value after it changed.
    ///
    /// Without a matching `record_modify_before`, the before value is taken
    /// from the most recent applied operation that knew it.
    pub fn record_modify_after(&mut self, entity: &Entity, name: &str) -> StoreResult<()> {
        if self.recording().is_none() {
            return Ok(());
        }
        let param = self.undoable_param(entity, name)?;
        self.ensure_baseline(entity)?;

        let had_before = self
            .undo
            .open
            .as_ref()
            .is_some_and(|open| open.entries.iter().any(|e| e.targets(entity, name)));
        let current = if had_before {
            Vec::new()
        } else {
            self.snapshot(self.instance(entity)?, &param)?
        };

        let mut entries = match self.undo.open.as_mut() {
            Some(open) => std::mem::take(&mut open.entries),
            None => return Ok(()),
        };

        if had_before {
            let watched = self.undo.open.as_mut().and_then(|open| {
                let at = open
                    .watched
                    .iter()
                    .position(|(e, p)| e == entity && p.name() == name)?;
                Some(open.watched.remove(at))
            });
            if let Some((entity, param)) = watched {
                self.append_new_slots(&mut entries, &entity, &param);
            }
            for entry in entries.iter_mut().filter(|e| e.targets(entity, name)) {
                entry.after = self.capture(entity, Some(param.as_ref()), entry.kvp_path.as_deref());
            }
        } else {
            let mut paths: BTreeSet<Option<String>> =
                current.iter().map(|(path, _)| path.clone()).collect();
            if matches!(param.accessor(), Accessor::Kvp) {
                paths.extend(self.undo.known_paths(entity, name).into_iter().map(Some));
            }
            for path in paths {
                let before = self
                    .undo
                    .last_known(entity, name, path.as_deref())
                    .unwrap_or(Capture::Absent);
                let after = self.capture(entity, Some(param.as_ref()), path.as_deref());
                let mut entry = UndoEntity::modify(entity.clone(), Arc::clone(&param), path, before);
                entry.after = after;
                entries.push(entry);
            }
        }

        if let Some(open) = self.undo.open.as_mut() {
            open.entries = entries;
        }
        Ok(())
    }

    fn recording(&mut self) -> Option<&mut OpenOperation> {
        if !self.config.undo_enabled || self.undo.replaying {
            return None;
        }
        self.undo.open.as_mut()
    }

    fn undoable_param(&self, entity: &Entity, name: &str) -> StoreResult<Arc<Param>> {
        let param = self.registry.param(entity.type_tag.as_str(), name)?;
        if !param.is_copyable() {
            return Err(StoreError::ReadOnly(name.to_string()));
        }
        Ok(param)
    }

    /// Before the first modification, capture the entity's current state
    /// so the initial values stay reachable once the operation commits.
    fn ensure_baseline(&mut self, entity: &Entity) -> StoreResult<()> {
        if self.undo.cursor > 0 {
            return Ok(());
        }
        let captured = self
            .undo
            .open
            .as_ref()
            .is_some_and(|open| open.baseline.iter().any(|e| e.entity == *entity));
        if captured {
            return Ok(());
        }
        let class = self.registry.class(entity.type_tag.as_str())?;
        let inst = self.instance(entity)?;
        let mut entries = Vec::new();
        for param in class.copyable_params() {
            for (path, value) in self.snapshot(inst, param)? {
                let mut entry =
                    UndoEntity::modify(entity.clone(), Arc::clone(param), path, value.clone());
                entry.after = value;
                entries.push(entry);
            }
        }
        if let Some(open) = self.undo.open.as_mut() {
            open.baseline.extend(entries);
        }
        Ok(())
    }

    /// Current value(s) of a parameter: one capture for scalars, one per
    /// leaf slot for the side-table.
    fn snapshot(
        &self,
        inst: &Instance,
        param: &Param,
    ) -> StoreResult<Vec<(Option<String>, Capture)>> {
        if matches!(param.accessor(), Accessor::Kvp) {
            return inst
                .kvp()
                .leaves()
                .into_iter()
                .map(|(path, value)| -> StoreResult<_> {
                    Ok((Some(path), Capture::Value(value.to_text()?)))
                })
                .collect();
        }
        let text = dispatch::get_as_string(inst, param)?;
        Ok(vec![(None, Capture::Value(text))])
    }

    /// Live value for one snapshot target; `Absent` when the entity or slot
    /// is gone.
    fn capture(&self, entity: &Entity, param: Option<&Param>, path: Option<&str>) -> Capture {
        let (Some(inst), Some(param)) = (self.get(entity), param) else {
            return Capture::Absent;
        };
        let text = match path {
            Some(path) => inst
                .kvp()
                .get_slot(path)
                .map(|value| value.to_text().map_err(StoreError::from)),
            None => Some(dispatch::get_as_string(inst, param)),
        };
        match text {
            Some(Ok(text)) => Capture::Value(text),
            Some(Err(err)) => {
                warn!(entity = %entity, param = %param.name(), error = %err, "could not capture value");
                Capture::Absent
            }
            None => Capture::Absent,
        }
    }

    /// Add entries for side-table slots that appeared since `before`.
    fn append_new_slots(&self, entries: &mut Vec<UndoEntity>, entity: &Entity, param: &Arc<Param>) {
        let Some(inst) = self.get(entity) else {
            return;
        };
        let known: BTreeSet<String> = entries
            .iter()
            .filter(|e| e.targets(entity, param.name()))
            .filter_map(|e| e.kvp_path.clone())
            .collect();
        for (path, _) in inst.kvp().leaves() {
            if !known.contains(&path) {
                entries.push(UndoEntity::modify(
                    entity.clone(),
                    Arc::clone(param),
                    Some(path),
                    Capture::Absent,
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// Step back one operation. Returns `false` at the start of history.
    pub fn undo(&mut self) -> StoreResult<bool> {
        if !self.can_undo() {
            return Ok(false);
        }
        self.discard_open();
        self.undo.cursor -= 1;
        let op = self.undo.operations[self.undo.cursor].clone();
        self.replay(&op, Direction::Undo);
        Ok(true)
    }

    /// Step forward one operation. Returns `false` at the end of history.
    pub fn redo(&mut self) -> StoreResult<bool> {
        if !self.can_redo() {
            return Ok(false);
        }
        self.discard_open();
        let op = self.undo.operations[self.undo.cursor].clone();
        self.replay(&op, Direction::Redo);
        self.undo.cursor += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.cursor > 0 && !self.undo.operations.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.cursor < self.undo.operations.len()
    }

    fn discard_open(&mut self) {
        if let Some(open) = self.undo.open.take() {
            debug!(label = %open.label, "discarded open undo operation before replay");
        }
    }

    fn replay(&mut self, op: &UndoOperation, direction: Direction) {
        debug!(label = %op.label, ?direction, entries = op.entries.len(), "replaying undo operation");
        let (instantiate, destroy) = match direction {
            Direction::Undo => (UndoAction::Create, UndoAction::Delete),
            Direction::Redo => (UndoAction::Delete, UndoAction::Create),
        };

        self.undo.replaying = true;
        self.suspend_events();

        for entry in op.entries.iter().filter(|e| e.action == instantiate) {
            if self.contains(&entry.entity) {
                continue;
            }
            if let Err(err) = self.create_entity_with_guid(entry.entity.type_tag.as_str(), entry.entity.guid) {
                warn!(entity = %entry.entity, error = %err, "could not re-instantiate entity");
            }
        }

        let modifies = op.entries.iter().filter(|e| e.action == UndoAction::Modify);
        let ordered: Vec<&UndoEntity> = match direction {
            Direction::Undo => modifies.rev().collect(),
            Direction::Redo => modifies.collect(),
        };
        for entry in ordered {
            let capture = match direction {
                Direction::Undo => &entry.before,
                Direction::Redo => &entry.after,
            };
            if let Err(err) = self.restore(entry, capture) {
                warn!(
                    entity = %entry.entity,
                    param = ?entry.param_name(),
                    error = %err,
                    "could not restore value"
                );
            }
        }

        for entry in op.entries.iter().filter(|e| e.action == destroy) {
            if !self.contains(&entry.entity) {
                continue;
            }
            if let Err(err) = self.delete_entity(&entry.entity) {
                warn!(entity = %entry.entity, error = %err, "could not delete entity");
            }
        }

        self.resume_events();
        self.undo.replaying = false;
    }

    fn restore(&mut self, entry: &UndoEntity, capture: &Capture) -> StoreResult<()> {
        let Some(param) = entry.param.as_deref() else {
            return Ok(());
        };
        if !self.contains(&entry.entity) {
            return Ok(());
        }
        match (&entry.kvp_path, capture) {
            (_, Capture::Pending) => Ok(()),
            (None, Capture::Absent) => Ok(()),
            (None, Capture::Value(text)) => {
                self.edit(&entry.entity, |inst| dispatch::set_from_string(inst, param, text))?
            }
            (Some(path), Capture::Absent) => self.edit(&entry.entity, |inst| {
                inst.kvp_mut().delete_slot(path);
            }),
            (Some(path), Capture::Value(text)) => {
                let value = KvpValue::from_text(text)?;
                self.edit(&entry.entity, |inst| inst.kvp_mut().set_slot(path, value))??;
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Label of the operation `undo` would replay.
    pub fn undo_label(&self) -> Option<&str> {
        let at = self.undo.cursor.checked_sub(1)?;
        self.undo.operations.get(at).map(|op| op.label.as_str())
    }

    /// Label of the operation `redo` would replay.
    pub fn redo_label(&self) -> Option<&str> {
        self.undo
            .operations
            .get(self.undo.cursor)
            .map(|op| op.label.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.undo.operations.len()
    }

    pub fn undo_cursor(&self) -> usize {
        self.undo.cursor
    }

    pub fn is_recording(&self) -> bool {
        self.undo.is_recording()
    }

    /// Forget all history and any open operation.
    pub fn clear_undo(&mut self) {
        self.undo = UndoLog::default();
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }
}

#[cfg(test)]
mod tests {
    use objbook_types::Guid;
    use proptest::prelude::*;

    use super::*;
    use crate::config::StoreConfig;
    use crate::fixtures::{registry, Invoice};

    fn book_with_invoice(amount: &str) -> (Book, Entity) {
        let mut book = Book::new(registry());
        let x = book.create_entity("invoice").unwrap();
        book.set_param_from_string(&x, "amount", amount).unwrap();
        (book, x)
    }

    fn amount(book: &Book, x: &Entity) -> String {
        book.get_param_as_string(x, "amount").unwrap()
    }

    fn set_amount_op(book: &mut Book, x: &Entity, label: &str, value: &str) {
        book.start_operation(label);
        book.modify_param(x, "amount", value).unwrap();
        assert!(book.end_operation().unwrap());
    }

    /// Every copyable value of `x`, side-table slots included.
    fn state(book: &Book, x: &Entity) -> Vec<String> {
        let class = book.registry().class("invoice").unwrap();
        let inst = book.get(x).unwrap();
        let mut out = Vec::new();
        for param in class.copyable_params() {
            if matches!(param.accessor(), Accessor::Kvp) {
                for (path, value) in inst.kvp().leaves() {
                    out.push(format!("{path}={}", value.to_text().unwrap()));
                }
            } else {
                out.push(dispatch::get_as_string(inst, param).unwrap());
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Concrete scenario and cursor bounds
    // -----------------------------------------------------------------------

    #[test]
    fn amount_ten_to_twenty() {
        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "set to 20", "20");
        assert_eq!(amount(&book, &x), "20/1");

        assert!(book.undo().unwrap());
        assert_eq!(amount(&book, &x), "10/1");
        assert!(book.redo().unwrap());
        assert_eq!(amount(&book, &x), "20/1");
    }

    #[test]
    fn baseline_synthesized_before_first_modification() {
        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "set to 20", "20");
        assert_eq!(book.undo_len(), 2);
        assert_eq!(book.undo_cursor(), 2);
        assert_eq!(book.undo_label(), Some("set to 20"));

        book.undo().unwrap();
        assert_eq!(book.undo_label(), Some("baseline"));
        assert_eq!(book.redo_label(), Some("set to 20"));
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut book = Book::new(registry());
        assert!(!book.can_undo());
        assert!(!book.can_redo());
        assert!(!book.undo().unwrap());
        assert!(!book.redo().unwrap());

        let x = book.create_entity("invoice").unwrap();
        set_amount_op(&mut book, &x, "one", "1");
        set_amount_op(&mut book, &x, "two", "2");
        let len = book.undo_len();

        while book.undo().unwrap() {}
        assert_eq!(book.undo_cursor(), 0);
        assert!(!book.can_undo());
        assert!(book.can_redo());

        while book.redo().unwrap() {}
        assert_eq!(book.undo_cursor(), len);
        assert!(!book.can_redo());
        assert!(book.can_undo());
    }

    #[test]
    fn inverse_law() {
        let (mut book, x) = book_with_invoice("10");
        book.set_param_from_string(&x, "id", "INV-1").unwrap();
        book.edit(&x, |inst| {
            inst.kvp_mut()
                .set_slot("terms/note", KvpValue::String("net".into()))
                .unwrap();
        })
        .unwrap();
        let pre = state(&book, &x);

        set_amount_op(&mut book, &x, "amount", "20");

        book.start_operation("id and terms");
        book.modify_param(&x, "id", "INV-2").unwrap();
        book.record_modify_before(&x, "slots").unwrap();
        book.edit(&x, |inst| {
            let kvp = inst.kvp_mut();
            kvp.set_slot("terms/days", KvpValue::Int64(30)).unwrap();
            kvp.delete_slot("terms/note");
        })
        .unwrap();
        book.record_modify_after(&x, "slots").unwrap();
        assert!(book.end_operation().unwrap());

        book.start_operation("paid");
        book.modify_param(&x, "paid", "true").unwrap();
        book.modify_param(&x, "amount", "30").unwrap();
        assert!(book.end_operation().unwrap());
        let post = state(&book, &x);
        assert_ne!(pre, post);

        for _ in 0..3 {
            assert!(book.undo().unwrap());
        }
        assert_eq!(state(&book, &x), pre);
        for _ in 0..3 {
            assert!(book.redo().unwrap());
        }
        assert_eq!(state(&book, &x), post);
    }

    // -----------------------------------------------------------------------
    // Operation grouping
    // -----------------------------------------------------------------------

    #[test]
    fn restart_discards_open_operation() {
        let (mut book, x) = book_with_invoice("10");
        book.start_operation("abandoned");
        book.record_modify_before(&x, "id").unwrap();
        book.start_operation("kept");
        assert!(book.is_recording());
        assert!(!book.end_operation().unwrap());
        assert!(!book.is_recording());
        assert_eq!(book.undo_len(), 0);
    }

    #[test]
    fn aborted_operation_keeps_redo_history() {
        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "a", "20");
        while book.undo().unwrap() {}
        let len = book.undo_len();

        book.start_operation("b");
        book.record_modify_before(&x, "amount").unwrap();
        book.start_operation("c");
        assert!(!book.end_operation().unwrap());

        assert_eq!(book.undo_len(), len);
        assert_eq!(book.undo_cursor(), 0);
        assert!(book.can_redo());
        assert_eq!(book.redo_label(), Some("baseline"));

        book.start_operation("d");
        book.record_modify_before(&x, "amount").unwrap();
        assert!(!book.undo().unwrap());
        assert!(book.redo().unwrap());
        assert!(book.redo().unwrap());
        assert_eq!(amount(&book, &x), "20/1");
    }

    #[test]
    fn baseline_commits_with_its_operation() {
        let (mut book, x) = book_with_invoice("10");
        book.start_operation("a");
        book.record_modify_before(&x, "amount").unwrap();
        assert_eq!(book.undo_len(), 0);
        book.set_param_from_string(&x, "amount", "20").unwrap();
        book.record_modify_after(&x, "amount").unwrap();
        assert!(book.end_operation().unwrap());

        let labels: Vec<_> = book.undo_log().operations().map(|op| op.label.clone()).collect();
        assert_eq!(labels, ["baseline", "a"]);
    }

    #[test]
    fn repeated_change_in_one_operation_redoes_the_last_value() {
        let (mut book, x) = book_with_invoice("10");
        book.start_operation("twice");
        book.modify_param(&x, "amount", "20").unwrap();
        book.modify_param(&x, "amount", "30").unwrap();
        assert!(book.end_operation().unwrap());

        book.undo().unwrap();
        assert_eq!(amount(&book, &x), "10/1");
        book.redo().unwrap();
        assert_eq!(amount(&book, &x), "30/1");
    }

    #[test]
    fn end_without_start_records_nothing() {
        let mut book = Book::new(registry());
        assert!(!book.end_operation().unwrap());
        assert_eq!(book.undo_len(), 0);
    }

    #[test]
    fn recording_outside_an_operation_is_ignored() {
        let (mut book, x) = book_with_invoice("10");
        book.modify_param(&x, "amount", "20").unwrap();
        assert_eq!(book.undo_len(), 0);
        assert_eq!(amount(&book, &x), "20/1");
    }

    #[test]
    fn unchanged_value_is_a_noop() {
        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "same", "10");
        let op = book.undo_log().operations().last().unwrap();
        assert_eq!(op.label, "same");
        assert!(op.entries.iter().all(|e| e.action == UndoAction::NoOp));
    }

    #[test]
    fn read_only_params_cannot_be_recorded() {
        let (mut book, x) = book_with_invoice("10");
        book.start_operation("derived");
        assert!(matches!(
            book.record_modify_before(&x, "line_count"),
            Err(StoreError::ReadOnly(_))
        ));
    }

    #[test]
    fn undo_discards_open_operation() {
        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "first", "20");
        book.start_operation("half done");
        book.record_modify_before(&x, "amount").unwrap();
        assert!(book.undo().unwrap());
        assert!(!book.is_recording());
        assert_eq!(amount(&book, &x), "10/1");
    }

    #[test]
    fn new_operation_discards_redo_tail() {
        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "a", "20");
        set_amount_op(&mut book, &x, "b", "30");
        book.undo().unwrap();
        assert!(book.can_redo());
        set_amount_op(&mut book, &x, "c", "40");
        assert!(!book.can_redo());
        assert_eq!(book.undo_len(), 3);
        assert_eq!(book.undo_label(), Some("c"));
    }

    #[test]
    fn oldest_operation_dropped_past_limit() {
        let config = StoreConfig {
            undo_limit: 3,
            ..Default::default()
        };
        let mut book = Book::with_config(registry(), config);
        let x = book.create_entity("invoice").unwrap();
        for n in 1..=5 {
            set_amount_op(&mut book, &x, &format!("op{n}"), &n.to_string());
        }
        assert_eq!(book.undo_len(), 3);
        assert_eq!(book.undo_cursor(), 3);

        while book.undo().unwrap() {}
        // op3 is the oldest retained; undoing it leaves op2's value.
        assert_eq!(amount(&book, &x), "2/1");
    }

    #[test]
    fn disabled_undo_records_nothing() {
        let mut book = Book::with_config(registry(), StoreConfig::without_undo());
        let x = book.create_entity("invoice").unwrap();
        book.start_operation("ignored");
        book.modify_param(&x, "amount", "20").unwrap();
        assert!(!book.end_operation().unwrap());
        assert_eq!(book.undo_len(), 0);
    }

    #[test]
    fn modify_after_alone_uses_last_known_value() {
        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "to 20", "20");

        book.start_operation("to 30");
        book.set_param_from_string(&x, "amount", "30").unwrap();
        book.record_modify_after(&x, "amount").unwrap();
        assert!(book.end_operation().unwrap());

        book.undo().unwrap();
        assert_eq!(amount(&book, &x), "20/1");
        book.undo().unwrap();
        assert_eq!(amount(&book, &x), "10/1");
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn undo_delete_restores_fields() {
        let (mut book, x) = book_with_invoice("10");
        let customer = book.create_entity("customer").unwrap();
        let line = Guid::new();
        book.set_param_from_string(&x, "id", "INV-9").unwrap();
        book.set_param_from_string(&x, "customer", &customer.guid.to_hex())
            .unwrap();
        book.set_param_from_string(&x, "lines", &line.to_hex()).unwrap();
        book.edit(&x, |inst| {
            inst.kvp_mut().set_slot("terms/days", KvpValue::Int64(30)).unwrap();
        })
        .unwrap();
        let before = state(&book, &x);

        book.start_operation("delete");
        book.record_delete(&x).unwrap();
        book.delete_entity(&x).unwrap();
        assert!(book.end_operation().unwrap());
        assert!(!book.contains(&x));

        assert!(book.undo().unwrap());
        assert!(book.contains(&x));
        assert_eq!(state(&book, &x), before);
        let inst = book.get(&x).unwrap();
        assert_eq!(inst.data::<Invoice>().unwrap().customer, Some(customer.guid));
        assert_eq!(inst.data::<Invoice>().unwrap().lines, vec![line]);

        assert!(book.redo().unwrap());
        assert!(!book.contains(&x));
    }

    #[test]
    fn undo_create_deletes_and_redo_restores() {
        let mut book = Book::new(registry());
        book.start_operation("new invoice");
        let x = book.create_entity("invoice").unwrap();
        book.record_create(&x);
        book.modify_param(&x, "amount", "5").unwrap();
        assert!(book.end_operation().unwrap());

        assert!(book.undo().unwrap());
        assert!(!book.contains(&x));

        assert!(book.redo().unwrap());
        assert!(book.contains(&x));
        assert_eq!(amount(&book, &x), "5/1");
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    /// `(param, text)` for a random change to one of the invoice's scalars.
    fn change() -> impl Strategy<Value = (&'static str, String)> {
        prop_oneof![
            any::<i32>().prop_map(|n| ("amount", n.to_string())),
            "[A-Z0-9-]{0,10}".prop_map(|id| ("id", id)),
            any::<bool>().prop_map(|b| ("paid", b.to_string())),
            any::<i32>().prop_map(|n| ("count", n.to_string())),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn undo_then_redo_is_an_inverse(
            ops in prop::collection::vec(prop::collection::vec(change(), 1..4), 1..6)
        ) {
            let (mut book, x) = book_with_invoice("10");
            let pre = state(&book, &x);

            for (n, changes) in ops.iter().enumerate() {
                book.start_operation(&format!("op{n}"));
                for (param, text) in changes {
                    book.modify_param(&x, param, text).unwrap();
                }
                prop_assert!(book.end_operation().unwrap());
            }
            let post = state(&book, &x);

            for _ in &ops {
                prop_assert!(book.undo().unwrap());
            }
            prop_assert_eq!(state(&book, &x), pre);
            for _ in &ops {
                prop_assert!(book.redo().unwrap());
            }
            prop_assert_eq!(state(&book, &x), post);
            prop_assert!(!book.can_redo());
        }
    }

    #[test]
    fn replay_emits_one_batch() {
        use std::sync::Mutex;

        use crate::event::ChangeEvent;

        let (mut book, x) = book_with_invoice("10");
        set_amount_op(&mut book, &x, "to 20", "20");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        book.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        book.undo().unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], ChangeEvent::Batch(_)));
    }
}
