//! Cross-index traversal engine for code navigation: given a
//! `(repository, commit, file, line, character)` query, returns a
//! paginated list of code locations satisfying a relation
//! (definition-of, reference-to, implementation-of, or prototype-of the
//! symbol under the cursor).
//!
//! This crate owns the traversal engine only. Index storage, upload
//! visibility computation, moniker grammar, commit-graph remapping,
//! authorization, and transport all live in the embedding service and
//! are consumed here through the narrow traits in [`collaborators`].

pub mod collaborators;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod local_phase;
pub mod model;
pub mod moniker;
pub mod remote_phase;

#[cfg(any(test, feature = "testing"))]
pub mod testutil;

pub use cursor::Cursor;
pub use error::{GatherError, GatherResult};
pub use model::{Location, Position, Range, Relation, Upload, UploadId, UploadLocation};
