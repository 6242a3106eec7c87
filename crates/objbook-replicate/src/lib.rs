//! Entity replication between objbook books.
//!
//! Copies keep the source identifier, never overwrite, and never follow a
//! reference as a scalar: references are recorded on the destination book
//! and linked once their target has been copied, in whatever order the
//! copies happen.
//!
//! # Entry Points
//!
//! - [`copy_entity`] -- one entity; fails if already present
//! - [`copy_list`] -- independent copies; present entities are skipped
//! - [`copy_collection`] -- like `copy_list`, with a duplicate pre-pass
//! - [`copy_one_recursive`] / [`copy_collection_recursive`] -- plus two hops
//!   of the source book's reference graph
//!
//! Batch calls report through [`BatchReport`] rather than failing.

pub mod engine;
pub mod error;
pub mod report;
pub mod resolve;

pub use engine::{
    copy_collection, copy_collection_recursive, copy_entity, copy_list, copy_one_recursive,
};
pub use error::{CopyError, CopyResult};
pub use report::BatchReport;
pub use resolve::{resolve_pending, Resolution};
