use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use objbook_types::{Guid, TypeTag};

use crate::backend::{Backend, NullBackend};
use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::dispatch::{self, ParamValue};
use crate::error::{StoreError, StoreResult};
use crate::event::{ChangeEvent, EventBus, HandlerId};
use crate::instance::{Entity, Instance};
use crate::reference::ReferenceRecord;
use crate::registry::Registry;
use crate::undo::UndoLog;

/// A container owning one [`Collection`] per entity type, an undo log and
/// the references still waiting to be linked.
pub struct Book {
    pub(crate) id: Guid,
    pub(crate) registry: Arc<Registry>,
    pub(crate) config: StoreConfig,
    pub(crate) collections: BTreeMap<TypeTag, Collection>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) events: EventBus,
    pub(crate) undo: UndoLog,
    pub(crate) pending: Vec<ReferenceRecord>,
    pub(crate) dirty: bool,
}

impl Book {
    /// Create an empty book with the default configuration.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, StoreConfig::default())
    }

    /// Create an empty book with an explicit configuration.
    pub fn with_config(registry: Arc<Registry>, config: StoreConfig) -> Self {
        Self {
            id: Guid::new(),
            registry,
            config,
            collections: BTreeMap::new(),
            backend: Arc::new(NullBackend),
            events: EventBus::new(),
            undo: UndoLog::default(),
            pending: Vec::new(),
            dirty: false,
        }
    }

    /// The book's identifier, as stored on each of its instances.
    pub fn id(&self) -> Guid {
        self.id
    }

    /// The registry this book resolves types against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Settings the book was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Replace the edit hooks. Books start with [`NullBackend`].
    pub fn set_backend(&mut self, backend: Arc<dyn Backend>) {
        self.backend = backend;
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Instantiate a new entity of `type_tag` with a fresh identifier.
    pub fn create_entity(&mut self, type_tag: &str) -> StoreResult<Entity> {
        self.create_entity_with_guid(type_tag, Guid::new())
    }

    /// Instantiate a new, empty entity with the given identifier.
    pub fn create_entity_with_guid(&mut self, type_tag: &str, guid: Guid) -> StoreResult<Entity> {
        if guid.is_null() {
            return Err(StoreError::NullGuid);
        }
        let class = self.registry.class(type_tag)?;
        let entity = Entity::new(class.type_tag().clone(), guid);
        if self.contains(&entity) {
            return Err(StoreError::AlreadyPresent(entity));
        }
        let data = class
            .construct()
            .ok_or_else(|| StoreError::NoConstructor(type_tag.to_string()))?;

        let collection = self
            .collections
            .entry(class.type_tag().clone())
            .or_insert_with(|| Collection::new(class.type_tag().clone()));
        if collection
            .insert(Instance::new(entity.clone(), self.id, data))
            .is_err()
        {
            return Err(StoreError::AlreadyPresent(entity));
        }
        self.dirty = true;
        debug!(entity = %entity, book = %self.id.short_hex(), "created entity");
        self.events.emit(ChangeEvent::Created(entity.clone()));
        Ok(entity)
    }

    /// Look up a live instance.
    pub fn get(&self, entity: &Entity) -> Option<&Instance> {
        self.collections.get(&entity.type_tag)?.get(&entity.guid)
    }

    pub(crate) fn get_mut(&mut self, entity: &Entity) -> Option<&mut Instance> {
        self.collections.get_mut(&entity.type_tag)?.get_mut(&entity.guid)
    }

    /// Like [`Book::get`], but a missing entity is an error.
    pub fn instance(&self, entity: &Entity) -> StoreResult<&Instance> {
        self.get(entity)
            .ok_or_else(|| StoreError::EntityNotFound(entity.clone()))
    }

    fn instance_mut(&mut self, entity: &Entity) -> StoreResult<&mut Instance> {
        self.get_mut(entity)
            .ok_or_else(|| StoreError::EntityNotFound(entity.clone()))
    }

    /// Returns `true` if the entity is live in this book.
    pub fn contains(&self, entity: &Entity) -> bool {
        self.get(entity).is_some()
    }

    /// The collection for one type, if any instance was ever created.
    pub fn collection(&self, type_tag: &str) -> Option<&Collection> {
        self.collections.get(type_tag)
    }

    /// Collections in type-name order.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    /// Number of live instances across all types.
    pub fn count(&self) -> usize {
        self.collections.values().map(Collection::len).sum()
    }

    /// Request deletion. The instance is removed when its outermost edit
    /// commits; outside any edit that is immediately.
    pub fn delete_entity(&mut self, entity: &Entity) -> StoreResult<()> {
        self.begin_edit(entity)?;
        self.instance_mut(entity)?.mark_for_delete();
        self.commit_edit(entity)
    }

    // -----------------------------------------------------------------------
    // Edit transactions
    // -----------------------------------------------------------------------

    /// Open an edit. Returns the new nesting depth; the backend hears only
    /// about the outermost one.
    pub fn begin_edit(&mut self, entity: &Entity) -> StoreResult<u32> {
        let backend = Arc::clone(&self.backend);
        let inst = self.instance_mut(entity)?;
        let level = inst.enter_edit();
        if level == 1 {
            backend.edit_begin(inst);
        }
        Ok(level)
    }

    /// Close an edit. When the depth returns to zero the instance is
    /// removed if deletion was requested, otherwise handed to the backend.
    pub fn commit_edit(&mut self, entity: &Entity) -> StoreResult<()> {
        let backend = Arc::clone(&self.backend);
        let inst = self.instance_mut(entity)?;
        let level = inst
            .leave_edit()
            .ok_or_else(|| StoreError::NotEditing(entity.clone()))?;
        if level > 0 {
            return Ok(());
        }

        if inst.is_pending_delete() {
            if let Some(collection) = self.collections.get_mut(&entity.type_tag) {
                collection.remove(&entity.guid);
            }
            self.dirty = true;
            debug!(entity = %entity, "destroyed entity");
            self.events.emit(ChangeEvent::Destroyed(entity.clone()));
            return Ok(());
        }

        let modified = inst.is_dirty();
        if modified {
            inst.touch();
        }
        let committed = backend.edit_commit(inst);
        if committed.is_ok() {
            inst.mark_clean();
        }
        if modified {
            self.dirty = true;
            self.events.emit(ChangeEvent::Modified(entity.clone()));
        }
        committed.map_err(|reason| {
            warn!(entity = %entity, reason = %reason, "backend rejected commit");
            StoreError::Backend(reason)
        })
    }

    /// Run `f` on the instance inside one edit.
    pub fn edit<R>(&mut self, entity: &Entity, f: impl FnOnce(&mut Instance) -> R) -> StoreResult<R> {
        self.begin_edit(entity)?;
        let out = f(self.instance_mut(entity)?);
        self.commit_edit(entity)?;
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    /// Read a parameter by name.
    pub fn get_param(&self, entity: &Entity, name: &str) -> StoreResult<ParamValue> {
        let param = self.registry.param(entity.type_tag.as_str(), name)?;
        dispatch::read(self.instance(entity)?, &param)
    }

    /// Write a parameter by name inside one edit.
    pub fn set_param(&mut self, entity: &Entity, name: &str, value: ParamValue) -> StoreResult<()> {
        let param = self.registry.param(entity.type_tag.as_str(), name)?;
        self.edit(entity, |inst| dispatch::write(inst, &param, value))?
    }

    /// Read a parameter by name in its text form.
    pub fn get_param_as_string(&self, entity: &Entity, name: &str) -> StoreResult<String> {
        let param = self.registry.param(entity.type_tag.as_str(), name)?;
        dispatch::get_as_string(self.instance(entity)?, &param)
    }

    /// Parse and write a parameter by name inside one edit.
    pub fn set_param_from_string(&mut self, entity: &Entity, name: &str, text: &str) -> StoreResult<()> {
        let param = self.registry.param(entity.type_tag.as_str(), name)?;
        self.edit(entity, |inst| dispatch::set_from_string(inst, &param, text))?
    }

    /// Set a parameter from text, recording before and after values into
    /// the open undo operation.
    pub fn modify_param(&mut self, entity: &Entity, name: &str, text: &str) -> StoreResult<()> {
        self.record_modify_before(entity, name)?;
        self.set_param_from_string(entity, name, text)?;
        self.record_modify_after(entity, name)
    }

    // -----------------------------------------------------------------------
    // Pending references
    // -----------------------------------------------------------------------

    /// References recorded by earlier copies whose targets have not arrived.
    pub fn pending_references(&self) -> &[ReferenceRecord] {
        &self.pending
    }

    /// Queue references for linking, skipping any already queued.
    pub fn push_pending_references(&mut self, records: impl IntoIterator<Item = ReferenceRecord>) {
        for record in records {
            if !self.pending.iter().any(|r| r.same_link(&record)) {
                self.pending.push(record);
            }
        }
    }

    /// Remove and return every pending reference.
    pub fn take_pending_references(&mut self) -> Vec<ReferenceRecord> {
        std::mem::take(&mut self.pending)
    }

    /// Drop every pending reference. Returns how many were dropped.
    pub fn clear_pending_references(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Point `record.param` on its source at `record.target`, inside one
    /// edit of the source.
    pub fn link_reference(&mut self, record: &ReferenceRecord) -> StoreResult<()> {
        let param = Arc::clone(&record.param);
        let target = record.target.clone();
        self.edit(&record.source, |inst| {
            dispatch::link_reference(inst, &param, &target)
        })?
    }

    // -----------------------------------------------------------------------
    // Events and state
    // -----------------------------------------------------------------------

    /// Register a change handler.
    pub fn subscribe<F>(&mut self, handler: F) -> HandlerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Hold back events until the matching [`Book::resume_events`].
    pub fn suspend_events(&mut self) {
        self.events.suspend();
    }

    /// Release held events as one batch once every suspend is matched.
    pub fn resume_events(&mut self) {
        self.events.resume();
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns `true` if anything changed since the last [`Book::mark_clean`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the book-level dirty flag.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl fmt::Debug for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Book")
            .field("id", &self.id)
            .field("entities", &self.count())
            .field("pending_references", &self.pending.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
