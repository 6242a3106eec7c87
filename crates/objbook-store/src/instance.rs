use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use objbook_types::{Guid, KvpFrame, Timestamp, TypeError, TypeTag};

/// Identity of an entity: its type plus its identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    pub type_tag: TypeTag,
    pub guid: Guid,
}

impl Entity {
    pub fn new(type_tag: TypeTag, guid: Guid) -> Self {
        Self { type_tag, guid }
    }

    /// Parse the `type:guid` text form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (tag, guid) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| TypeError::InvalidText {
                kind: "entity",
                text: s.to_string(),
            })?;
        if tag.is_empty() {
            return Err(TypeError::InvalidText {
                kind: "entity",
                text: s.to_string(),
            });
        }
        Ok(Self::new(TypeTag::new(tag), Guid::from_hex(guid)?))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}:{})", self.type_tag, self.guid.short_hex())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_tag, self.guid)
    }
}

/// Typed payload of an instance.
///
/// Implemented for every `Send + Sync + Debug` type; registered accessors
/// downcast to their concrete type.
pub trait EntityData: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> EntityData for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An entity plus its bookkeeping.
///
/// The owning book is recorded as its identifier only; the book owns the
/// instance, never the other way round.
#[derive(Debug)]
pub struct Instance {
    entity: Entity,
    book: Guid,
    kvp: KvpFrame,
    edit_level: u32,
    dirty: bool,
    do_free: bool,
    last_update: Timestamp,
    data: Box<dyn EntityData>,
}

impl Instance {
    pub(crate) fn new(entity: Entity, book: Guid, data: Box<dyn EntityData>) -> Self {
        Self {
            entity,
            book,
            kvp: KvpFrame::new(),
            edit_level: 0,
            dirty: false,
            do_free: false,
            last_update: Timestamp::now(),
            data,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.entity.type_tag
    }

    pub fn guid(&self) -> Guid {
        self.entity.guid
    }

    /// Identifier of the owning book.
    pub fn book_id(&self) -> Guid {
        self.book
    }

    pub fn kvp(&self) -> &KvpFrame {
        &self.kvp
    }

    /// Mutable side-table access. Marks the instance dirty.
    pub fn kvp_mut(&mut self) -> &mut KvpFrame {
        self.dirty = true;
        &mut self.kvp
    }

    /// Current edit nesting depth. Zero outside any edit.
    pub fn edit_level(&self) -> u32 {
        self.edit_level
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set once a deletion has been requested; the instance is removed when
    /// the enclosing edit commits.
    pub fn is_pending_delete(&self) -> bool {
        self.do_free
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    /// Borrow the payload as `T`, if that is its concrete type.
    pub fn data<T: Any>(&self) -> Option<&T> {
        (*self.data).as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the payload as `T`. Marks the instance dirty.
    pub fn data_mut<T: Any>(&mut self) -> Option<&mut T> {
        let data = (*self.data).as_any_mut().downcast_mut::<T>()?;
        self.dirty = true;
        Some(data)
    }

    pub(crate) fn enter_edit(&mut self) -> u32 {
        self.edit_level += 1;
        self.edit_level
    }

    pub(crate) fn leave_edit(&mut self) -> Option<u32> {
        self.edit_level = self.edit_level.checked_sub(1)?;
        Some(self.edit_level)
    }

    pub(crate) fn mark_for_delete(&mut self) {
        self.do_free = true;
    }

    pub(crate) fn touch(&mut self) {
        self.last_update = Timestamp::now();
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
