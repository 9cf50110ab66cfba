//! docrel - the metadata catalog of a document-to-relational engine
//!
//! Documents are shredded into relational tables; this crate tracks how.
//! The catalog is organized in three layers: immutable snapshots of the
//! whole structure ([`catalog`]), mutable views that accumulate changes
//! on top of a snapshot ([`mutable`]), and the repository that owns the
//! committed snapshot and merges views back into it ([`repository`]).

pub mod catalog;
pub mod mutable;
pub mod observability;
pub mod repository;

pub use catalog::Snapshot;
pub use mutable::MutableSnapshot;
pub use repository::{MergeError, MergeResult, MvccRepository};
