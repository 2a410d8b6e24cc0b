//! In-memory fakes of the four collaborator traits, for exercising the
//! traversal engine without a real upload store, moniker index, or
//! database behind it.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{
    BulkLocationStore, LocationExtractor, LocationKey, MonikerIndex, UploadMetadataCache,
    UploadResolver,
};
use crate::error::GatherError;
use crate::model::{Location, Range, Upload, UploadId, UploadLocation, VisibleUpload};
use crate::moniker::QualifiedMoniker;

/// A document's in-place locations plus the cross-index symbol names
/// found at that position.
type DocumentEntry = (Vec<Location>, Vec<String>);

/// A hand-populated world of uploads, documents, and indexed rows, fed
/// straight to the four fake collaborators below.
#[derive(Default)]
pub struct FakeWorld {
    pub uploads: Vec<Upload>,
    pub visible: Vec<VisibleUpload>,
    /// `(upload_id, path, line, character) -> (locations in that document, related symbols)`
    pub documents: BTreeMap<(UploadId, String, u32, u32), DocumentEntry>,
    /// uploads defining a given symbol identifier, for `uploads_defining`.
    pub definitions: BTreeMap<String, Vec<UploadId>>,
    /// uploads referencing a given symbol identifier, in stable order, for `uploads_referencing` paging.
    pub references: BTreeMap<String, Vec<UploadId>>,
    /// `(table, upload_id) -> locations`, the backing rows for `BulkLocationStore::get`.
    pub rows: BTreeMap<(&'static str, UploadId), Vec<Location>>,
}

/// A fake that never honors cancellation mid-call (cooperative checks at
/// phase boundaries are the engine's job, not the collaborator's, in
/// these tests) but honors a pre-tripped token.
fn check_cancelled(token: &CancellationToken) -> Result<(), GatherError> {
    if token.is_cancelled() {
        Err(GatherError::Cancelled)
    } else {
        Ok(())
    }
}

pub struct FakeLocationExtractor<'a>(pub &'a FakeWorld);

#[async_trait]
impl LocationExtractor for FakeLocationExtractor<'_> {
    async fn extract(
        &self,
        token: &CancellationToken,
        key: LocationKey,
    ) -> Result<(Vec<Location>, Vec<String>), GatherError> {
        check_cancelled(token)?;
        let lookup = (key.upload_id, key.path, key.position.line, key.position.character);
        Ok(self.0.documents.get(&lookup).cloned().unwrap_or_default())
    }
}

pub struct FakeUploadResolver<'a>(pub &'a FakeWorld);

#[async_trait]
impl UploadResolver for FakeUploadResolver<'_> {
    async fn visible_uploads_at(
        &self,
        token: &CancellationToken,
        _repository_id: i32,
        _commit: &str,
        _line: u32,
        _character: u32,
    ) -> Result<Vec<VisibleUpload>, GatherError> {
        check_cancelled(token)?;
        Ok(self.0.visible.clone())
    }

    async fn translate(
        &self,
        token: &CancellationToken,
        cache: &dyn UploadMetadataCache,
        locations: Vec<Location>,
        _dedup: bool,
    ) -> Result<Vec<UploadLocation>, GatherError> {
        check_cancelled(token)?;
        let mut out = Vec::with_capacity(locations.len());
        for location in locations {
            if cache.get(location.upload_id).is_none() {
                return Err(GatherError::ConcurrentModification(location.upload_id.0));
            }
            out.push(UploadLocation {
                upload_id: location.upload_id,
                path: location.path,
                range: location.range,
            });
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct FakeUploadMetadataCache {
    cached: RwLock<BTreeMap<UploadId, Upload>>,
}

#[async_trait]
impl UploadMetadataCache for FakeUploadMetadataCache {
    fn get(&self, upload_id: UploadId) -> Option<Upload> {
        self.cached.read().unwrap().get(&upload_id).cloned()
    }

    async fn hydrate(
        &self,
        token: &CancellationToken,
        _upload_ids: &[UploadId],
    ) -> Result<(), GatherError> {
        check_cancelled(token)?;
        // In a real adapter this would query the authoritative store; the
        // fake just trusts the caller to have seeded `catalog`.
        Ok(())
    }
}

impl FakeUploadMetadataCache {
    /// Seeds the cache directly, standing in for `hydrate` reaching the
    /// authoritative upload store.
    pub fn seed(&self, world: &FakeWorld) {
        let mut cached = self.cached.write().unwrap();
        for upload in &world.uploads {
            cached.insert(upload.id, upload.clone());
        }
    }

    /// Evicts an upload, simulating it falling out of the request cache
    /// between the cursor being minted and the cursor being resumed.
    pub fn evict(&self, upload_id: UploadId) {
        self.cached.write().unwrap().remove(&upload_id);
    }
}

pub struct FakeMonikerIndex<'a>(pub &'a FakeWorld);

#[async_trait]
impl MonikerIndex for FakeMonikerIndex<'_> {
    async fn uploads_defining(
        &self,
        token: &CancellationToken,
        monikers: &[QualifiedMoniker],
    ) -> Result<Vec<Upload>, GatherError> {
        check_cancelled(token)?;
        let mut ids = std::collections::BTreeSet::new();
        for moniker in monikers {
            if let Some(upload_ids) = self.0.definitions.get(&moniker.identifier) {
                ids.extend(upload_ids.iter().copied());
            }
        }
        Ok(self
            .0
            .uploads
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn uploads_referencing(
        &self,
        token: &CancellationToken,
        monikers: &[QualifiedMoniker],
        exclude_upload_ids: &[UploadId],
        _repository_id: i32,
        _commit: &str,
        limit: u32,
        offset: i64,
    ) -> Result<(Vec<UploadId>, usize), GatherError> {
        check_cancelled(token)?;
        let excluded: std::collections::BTreeSet<_> = exclude_upload_ids.iter().copied().collect();
        let mut ids = std::collections::BTreeSet::new();
        for moniker in monikers {
            if let Some(upload_ids) = self.0.references.get(&moniker.identifier) {
                ids.extend(upload_ids.iter().copied().filter(|id| !excluded.contains(id)));
            }
        }
        let all: Vec<UploadId> = ids.into_iter().collect();
        let total_count = all.len();
        let offset = offset.max(0) as usize;
        let page = all
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();
        Ok((page, total_count))
    }
}

pub struct FakeBulkLocationStore<'a>(pub &'a FakeWorld);

#[async_trait]
impl BulkLocationStore for FakeBulkLocationStore<'_> {
    async fn get(
        &self,
        token: &CancellationToken,
        table: &'static str,
        upload_ids: &[UploadId],
        skip_paths_by_upload_id: &BTreeMap<UploadId, String>,
        _monikers: &[QualifiedMoniker],
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Location>, usize), GatherError> {
        check_cancelled(token)?;
        let mut matching = Vec::new();
        for upload_id in upload_ids {
            let Some(rows) = self.0.rows.get(&(table, *upload_id)) else {
                continue;
            };
            for row in rows {
                if skip_paths_by_upload_id.get(upload_id) == Some(&row.path) {
                    continue;
                }
                matching.push(row.clone());
            }
        }
        let total_count = matching.len();
        let offset = offset as usize;
        let page = matching.into_iter().skip(offset).take(limit as usize).collect();
        Ok((page, total_count))
    }
}

/// Convenience constructor for a one-line `Range` in tests.
pub fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
    Range {
        start: crate::model::Position::new(sl, sc),
        end: crate::model::Position::new(el, ec),
    }
}
