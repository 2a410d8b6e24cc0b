//! Remote phase: using symbol names discovered locally, find other
//! uploads that mention them and pull matching locations out of them.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::collaborators::RequestState;
use crate::cursor::{Cursor, Phase};
use crate::error::GatherError;
use crate::model::{Relation, UploadId, UploadLocation};
use crate::moniker::symbols_to_monikers;

/// Runs one round of the remote phase, appending up to `remaining` locations.
///
/// No-op unless `cursor.phase == Phase::Remote`.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(request_state, token, cursor), fields(remaining))]
pub async fn gather_remote_locations(
    token: &CancellationToken,
    request_state: &RequestState<'_>,
    repository_id: i32,
    commit: &str,
    relation: Relation,
    include_referencing_indexes: bool,
    cursor: &mut Cursor,
    remaining: u32,
) -> Result<Vec<UploadLocation>, GatherError> {
    if cursor.phase != Phase::Remote {
        return Ok(Vec::new());
    }

    let monikers = symbols_to_monikers(&cursor.symbol_names)?;
    if monikers.is_empty() {
        *cursor = Cursor::exhausted();
        return Ok(Vec::new());
    }
    trace!(num_monikers = monikers.len(), "chasing symbols remotely");

    let fallback = prepare_candidate_uploads(
        token,
        request_state,
        repository_id,
        commit,
        include_referencing_indexes,
        &monikers,
        cursor,
    )
    .await?;

    if cursor.upload_ids.is_empty() {
        *cursor = Cursor::exhausted();
        return Ok(Vec::new());
    }
    trace!(upload_ids = ?cursor.upload_ids, "searching for symbols remotely");

    let (locations, total_count) = request_state
        .bulk_location_store
        .get(
            token,
            relation.table_name(),
            &cursor.upload_ids,
            &cursor.skip_paths_by_upload_id,
            &monikers,
            remaining,
            cursor.remote_location_offset,
        )
        .await?;

    cursor.bump_remote_location_offset(locations.len(), total_count);

    // Definition-set locations (fallback = false) are authoritative at the
    // exact commit. Reference-only locations (fallback = true) may need a
    // fallback commit translation because the index that found them was
    // reached by chasing a symbol, not by visibility at the query commit.
    request_state
        .upload_resolver
        .translate(token, request_state.upload_cache, locations, fallback)
        .await
}

/// Returns `fallback`: whether locations drawn from `cursor.upload_ids`
/// for this invocation come from the reference-only candidate set.
async fn prepare_candidate_uploads(
    token: &CancellationToken,
    request_state: &RequestState<'_>,
    repository_id: i32,
    commit: &str,
    include_referencing_indexes: bool,
    monikers: &[crate::moniker::QualifiedMoniker],
    cursor: &mut Cursor,
) -> Result<bool, GatherError> {
    let mut fallback = true;

    if cursor.definition_ids.is_empty()
        && cursor.upload_ids.is_empty()
        && cursor.remote_upload_offset == 0
    {
        let defining_uploads = request_state
            .moniker_index
            .uploads_defining(token, monikers)
            .await?;

        let mut id_set: BTreeSet<UploadId> = cursor
            .visible_uploads
            .iter()
            .map(|u| u.upload_id)
            .collect();
        id_set.extend(defining_uploads.into_iter().map(|u| u.id));
        let ids: Vec<UploadId> = id_set.into_iter().collect();

        fallback = false;
        cursor.upload_ids = ids.clone();
        cursor.definition_ids = ids;
    }

    if include_referencing_indexes
        && cursor.upload_ids.is_empty()
        && cursor.remote_upload_offset != -1
    {
        let (upload_ids, total_count) = request_state
            .moniker_index
            .uploads_referencing(
                token,
                monikers,
                &cursor.definition_ids,
                repository_id,
                commit,
                request_state.max_indexes_per_moniker_search,
                cursor.remote_upload_offset,
            )
            .await?;

        cursor.bump_remote_upload_offset(upload_ids.len(), total_count);
        cursor.upload_ids = upload_ids;
    }

    // Every upload id we're about to search or translate locations from
    // must be hydrated before `UploadResolver::translate` is called.
    request_state
        .upload_cache
        .hydrate(token, &cursor.upload_ids)
        .await?;

    Ok(fallback)
}
