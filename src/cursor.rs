//! Opaque, resumable traversal state.
//!
//! A `Cursor` is the sole continuation carried between requests: no
//! process-wide state persists between `gather` calls, so everything the
//! engine needs to pick back up lives here.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::GatherError;
use crate::model::{Position, UploadId};

/// Which phase of the traversal a cursor is positioned at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Fresh,
    Local,
    Remote,
    Done,
}

/// A compact, cursor-cached view of a `VisibleUpload`, avoiding a
/// round-trip through the upload resolver when a cursor is rehydrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorVisibleUpload {
    pub upload_id: UploadId,
    pub target_path: String,
    pub target_path_without_root: String,
    pub target_position: Position,
}

/// Traversal state, serialized opaquely across the request/response
/// boundary. All fields default to their zero value, matching a fresh
/// request's all-empty cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub visible_uploads: Vec<CursorVisibleUpload>,
    #[serde(default)]
    pub local_upload_offset: u32,
    #[serde(default)]
    pub local_location_offset: u32,
    #[serde(default)]
    pub symbol_names: Vec<String>,
    #[serde(default)]
    pub skip_paths_by_upload_id: BTreeMap<UploadId, String>,
    #[serde(default)]
    pub definition_ids: Vec<UploadId>,
    #[serde(default)]
    pub upload_ids: Vec<UploadId>,
    /// `-1` means the upload-candidate stream is exhausted.
    #[serde(default)]
    pub remote_upload_offset: i64,
    #[serde(default)]
    pub remote_location_offset: u32,
}

impl Cursor {
    /// A fresh cursor, as supplied for the first page of a query.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// The terminal cursor: once returned, the client must not call again.
    pub fn exhausted() -> Self {
        Self {
            phase: Phase::Done,
            ..Self::default()
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Normalizes a freshly-decoded (or freshly-constructed) cursor:
    /// `Phase::Fresh` is treated as `Phase::Local`.
    pub fn normalize(mut self) -> Self {
        if self.phase == Phase::Fresh {
            self.phase = Phase::Local;
        }
        self
    }

    /// Checks Invariant 1: `LocalUploadOffset <= len(VisibleUploads)`.
    pub fn validate(&self) -> Result<(), GatherError> {
        if self.local_upload_offset as usize > self.visible_uploads.len() {
            return Err(GatherError::InvalidCursor(format!(
                "local_upload_offset {} exceeds visible_uploads len {}",
                self.local_upload_offset,
                self.visible_uploads.len()
            )));
        }
        Ok(())
    }

    /// Advances `local_location_offset`, rolling over to the next visible
    /// upload when the current document's locations are exhausted.
    pub fn bump_local_location_offset(&mut self, consumed: usize, total: usize) {
        let next_offset = self.local_location_offset as usize + consumed;
        if next_offset >= total {
            self.local_location_offset = 0;
            self.local_upload_offset += 1;
        } else {
            self.local_location_offset = next_offset as u32;
        }
    }

    /// Advances `remote_upload_offset`, marking the candidate-upload
    /// stream exhausted once a batch comes back short.
    pub fn bump_remote_upload_offset(&mut self, batch_len: usize, total_count: usize) {
        let next_offset = self.remote_upload_offset + batch_len as i64;
        if next_offset as usize >= total_count {
            self.remote_upload_offset = -1;
        } else {
            self.remote_upload_offset = next_offset;
        }
    }

    /// Advances `remote_location_offset`; once a batch of uploads has
    /// yielded every one of its locations, resets to page the next batch.
    pub fn bump_remote_location_offset(&mut self, consumed: usize, total_count: usize) {
        let next_offset = self.remote_location_offset as usize + consumed;
        if next_offset >= total_count {
            self.remote_location_offset = 0;
            self.upload_ids.clear();
        } else {
            self.remote_location_offset = next_offset as u32;
        }
    }
}

/// Encodes a cursor as a URL-safe, unpadded base64 string wrapping a JSON
/// payload. JSON's field-name-keyed encoding is what makes unknown-field
/// tolerance on decode free: a new optional field just needs `#[serde(default)]`
/// and older-encoded cursors keep decoding without it present.
pub fn encode(cursor: &Cursor) -> String {
    let bytes = serde_json::to_vec(cursor).expect("Cursor serialization is infallible");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes a cursor produced by `encode`. An empty string decodes to a
/// fresh cursor, matching how callers naturally represent "no cursor yet".
pub fn decode(encoded: &str) -> Result<Cursor, GatherError> {
    if encoded.is_empty() {
        return Ok(Cursor::fresh());
    }

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|err| GatherError::InvalidCursor(err.to_string()))?;
    let cursor: Cursor = serde_json::from_slice(&bytes)
        .map_err(|err| GatherError::InvalidCursor(err.to_string()))?;
    cursor.validate()?;
    Ok(cursor)
}
