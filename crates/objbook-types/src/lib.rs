//! Foundation types for objbook.
//!
//! This crate provides the identity, temporal, numeric and side-table types
//! shared by every other objbook crate. Every other objbook crate depends on
//! `objbook-types`.
//!
//! # Key Types
//!
//! - [`Guid`] -- 128-bit entity identifier with a fixed-width hex text form
//! - [`TypeTag`] -- interned entity type name
//! - [`Timestamp`] -- UTC instant with a lossless RFC 3339 text form
//! - [`Numeric`] -- exact rational value (`num/denom`)
//! - [`KvpFrame`] / [`KvpValue`] -- the open key/value side-table of an instance
//! - [`ParamKind`] -- the closed set of parameter type-tags

pub mod error;
pub mod guid;
pub mod kind;
pub mod kvp;
pub mod numeric;
pub mod tag;
pub mod temporal;

pub use error::TypeError;
pub use guid::Guid;
pub use kind::ParamKind;
pub use kvp::{KvpFrame, KvpValue};
pub use numeric::Numeric;
pub use tag::TypeTag;
pub use temporal::Timestamp;
