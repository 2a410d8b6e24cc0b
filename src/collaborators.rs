//! Narrow interfaces to the systems this crate does not implement:
//! index storage, upload visibility, moniker indexes, and bulk location
//! storage. The traversal engine only ever talks to these traits.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GatherError;
use crate::model::{Location, Position, Upload, UploadId, UploadLocation, VisibleUpload};
use crate::moniker::QualifiedMoniker;

/// A location inside one upload's document, keyed by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationKey {
    pub upload_id: UploadId,
    pub path: String,
    pub position: Position,
}

/// Extracts in-document locations and cross-index symbol names from a
/// single point inside one index's document.
#[async_trait]
pub trait LocationExtractor: Send + Sync {
    async fn extract(
        &self,
        token: &CancellationToken,
        key: LocationKey,
    ) -> Result<(Vec<Location>, Vec<String>), GatherError>;
}

/// Resolves query positions to visible uploads, loads upload metadata,
/// and translates indexed locations back to the requested commit.
#[async_trait]
pub trait UploadResolver: Send + Sync {
    async fn visible_uploads_at(
        &self,
        token: &CancellationToken,
        repository_id: i32,
        commit: &str,
        line: u32,
        character: u32,
    ) -> Result<Vec<VisibleUpload>, GatherError>;

    /// Translates indexed locations back to the requested commit.
    ///
    /// `dedup` distinguishes definition-set locations (authoritative,
    /// exact-commit translation; `dedup = false`) from reference-set
    /// locations (commit translation may fall back to the indexed commit
    /// when the requested commit has since diverged; `dedup = true`).
    /// Every referenced upload MUST already be hydrated in the cache: an
    /// un-hydrated upload is a `ConcurrentModification`, never a silent drop.
    async fn translate(
        &self,
        token: &CancellationToken,
        cache: &dyn UploadMetadataCache,
        locations: Vec<Location>,
        dedup: bool,
    ) -> Result<Vec<UploadLocation>, GatherError>;
}

/// Request-scoped cache of upload metadata. The only state shared across
/// collaborator calls within one request; never shared across requests.
#[async_trait]
pub trait UploadMetadataCache: Send + Sync {
    fn get(&self, upload_id: UploadId) -> Option<Upload>;

    /// Batch-loads metadata for the given uploads from the authoritative
    /// store. Must be called before any `UploadResolver::translate` of
    /// locations belonging to these uploads.
    async fn hydrate(
        &self,
        token: &CancellationToken,
        upload_ids: &[UploadId],
    ) -> Result<(), GatherError>;
}

/// Finds candidate uploads that mention a set of symbol names.
#[async_trait]
pub trait MonikerIndex: Send + Sync {
    async fn uploads_defining(
        &self,
        token: &CancellationToken,
        monikers: &[QualifiedMoniker],
    ) -> Result<Vec<Upload>, GatherError>;

    /// Pages uploads that reference (but do not necessarily define) the
    /// given monikers, excluding `exclude_upload_ids`. Returns
    /// `(upload_ids, total_count)`.
    #[allow(clippy::too_many_arguments)]
    async fn uploads_referencing(
        &self,
        token: &CancellationToken,
        monikers: &[QualifiedMoniker],
        exclude_upload_ids: &[UploadId],
        repository_id: i32,
        commit: &str,
        limit: u32,
        offset: i64,
    ) -> Result<(Vec<UploadId>, usize), GatherError>;
}

/// Matching locations restricted to a relation table, paginated by offset.
#[async_trait]
pub trait BulkLocationStore: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn get(
        &self,
        token: &CancellationToken,
        table: &'static str,
        upload_ids: &[UploadId],
        skip_paths_by_upload_id: &std::collections::BTreeMap<UploadId, String>,
        monikers: &[QualifiedMoniker],
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Location>, usize), GatherError>;
}

/// Request-scoped configuration and collaborator handles.
///
/// `location_extractor` is deliberately not here: it is selected per
/// operation (definitions vs. references vs. implementations vs.
/// prototypes extract different relations from the same document) and is
/// passed explicitly to `engine::gather`.
pub struct RequestState<'a> {
    pub upload_resolver: &'a dyn UploadResolver,
    pub upload_cache: &'a dyn UploadMetadataCache,
    pub moniker_index: &'a dyn MonikerIndex,
    pub bulk_location_store: &'a dyn BulkLocationStore,
    pub max_indexes_per_moniker_search: u32,
}
