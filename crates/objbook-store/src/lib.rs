//! Books of dynamically typed entities for objbook.
//!
//! Entity types are registered at startup as a declarative table of named,
//! typed parameters. Every generic operation on an entity of unknown type
//! (stringifying a field, copying it into another book, snapshotting it for
//! undo) goes through that table rather than through compiled accessors.
//!
//! # Key Types
//!
//! - [`Registry`] / [`ObjectClass`] / [`Param`] -- the parameter registry
//! - [`Accessor`] -- typed getter/setter closures, one variant per [`ParamKind`](objbook_types::ParamKind)
//! - [`dispatch`] -- read, write, stringify and copy a parameter
//! - [`Book`] / [`Collection`] / [`Instance`] / [`Entity`] -- the data model
//! - [`EventBus`] -- change notification with suspend/resume batching
//! - [`UndoLog`] -- named, replayable groups of parameter snapshots
//!
//! # Design Rules
//!
//! 1. The registry is append-only; classes are never mutated after
//!    registration.
//! 2. There is one branch over parameter kinds, in [`dispatch`].
//! 3. An instance refers to its book by identifier only.
//! 4. The backend commit hook fires only when an instance's edit depth
//!    returns to zero.
//! 5. No public entry point panics; failures come back as [`StoreError`].

pub mod accessor;
pub mod backend;
pub mod book;
pub mod class;
pub mod collection;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod instance;
pub mod reference;
pub mod registry;
pub mod undo;

#[cfg(test)]
mod fixtures;

pub use accessor::{Accessor, Field, ScalarType};
pub use backend::{Backend, NullBackend};
pub use book::Book;
pub use class::{ClassBuilder, Constructor, ObjectClass, Param};
pub use collection::Collection;
pub use config::StoreConfig;
pub use dispatch::{ParamValue, Transfer};
pub use error::{StoreError, StoreResult};
pub use event::{ChangeEvent, EventBus, HandlerId};
pub use instance::{Entity, EntityData, Instance};
pub use reference::ReferenceRecord;
pub use registry::Registry;
pub use undo::{Capture, UndoAction, UndoEntity, UndoLog, UndoOperation};
