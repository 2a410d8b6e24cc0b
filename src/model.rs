use serde::{Deserialize, Serialize};

/// Identifier of a precomputed semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UploadId(pub i32);

/// A relation table selecting which pre-indexed edge set to traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Definitions,
    References,
    Implementations,
}

impl Relation {
    pub fn table_name(self) -> &'static str {
        match self {
            Relation::Definitions => "definitions",
            Relation::References => "references",
            Relation::Implementations => "implementations",
        }
    }
}

/// Zero-based `(line, character)` position into a text document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open span within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Precomputed per-(repository, commit, root) semantic index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub root: String,
}

/// An upload that covers the query position, carrying everything the
/// local phase needs to extract and translate results from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleUpload {
    pub upload_id: UploadId,
    /// Path relative to the repository root.
    pub target_path: String,
    /// Path as it appears inside the upload (i.e. relative to `Upload::root`).
    pub target_path_without_root: String,
    /// Query position, possibly adjusted by commit-graph translation.
    pub target_position: Position,
}

/// A location inside one upload's own coordinate space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub upload_id: UploadId,
    pub path: String,
    pub range: Range,
}

/// A `Location` whose coordinates have been translated back to the
/// requested `(repo, commit, path)`, ready to return to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLocation {
    pub upload_id: UploadId,
    pub path: String,
    pub range: Range,
}

/// Arguments common to all four public operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalArgs {
    pub repository_id: i32,
    pub commit: String,
    pub path: String,
    pub line: u32,
    pub character: u32,
    pub limit: u32,
}
