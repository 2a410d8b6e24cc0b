//! The traversal engine: alternates local and remote phases, accumulating
//! up to `limit` locations per request, and emits a resumable cursor.

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::collaborators::{LocationExtractor, RequestState};
use crate::cursor::{Cursor, CursorVisibleUpload, Phase};
use crate::error::GatherError;
use crate::local_phase::gather_local_locations;
use crate::model::{PositionalArgs, Relation, UploadLocation};
use crate::remote_phase::gather_remote_locations;

/// `(locations, next_cursor)`, the shape every public operation returns.
pub type GatherOutcome = (Vec<UploadLocation>, Cursor);

/// Runs the traversal engine for one request, alternating local and
/// remote phases until the page fills or the traversal is exhausted.
#[allow(clippy::too_many_arguments)]
pub async fn gather(
    token: &CancellationToken,
    args: &PositionalArgs,
    request_state: &RequestState<'_>,
    extractor: &dyn LocationExtractor,
    relation: Relation,
    include_referencing_indexes: bool,
    cursor: Cursor,
) -> Result<GatherOutcome, GatherError> {
    if args.limit == 0 {
        return Err(GatherError::InvalidArgs(
            "limit must be greater than zero".to_string(),
        ));
    }

    let mut cursor = cursor.normalize();

    if cursor.is_exhausted() {
        return Ok((Vec::new(), cursor));
    }

    hydrate_visible_uploads(token, args, request_state, &mut cursor).await?;

    let mut all_locations = Vec::new();

    while cursor.phase != Phase::Done {
        if all_locations.len() as u32 >= args.limit {
            break;
        }

        let remaining = args.limit - all_locations.len() as u32;
        trace!(phase = ?cursor.phase, gathered = all_locations.len(), "gather round");

        let local =
            gather_local_locations(token, request_state, extractor, &mut cursor, remaining).await?;
        all_locations.extend(local);

        if all_locations.len() as u32 >= args.limit {
            break;
        }

        let remaining = args.limit - all_locations.len() as u32;
        let remote = gather_remote_locations(
            token,
            request_state,
            args.repository_id,
            &args.commit,
            relation,
            include_referencing_indexes,
            &mut cursor,
            remaining,
        )
        .await?;
        all_locations.extend(remote);
    }

    Ok((all_locations, cursor))
}

/// Computes or rehydrates `cursor.visible_uploads`.
///
/// If the cursor already carries a cached view, each referenced upload is
/// looked up live in the request cache (a miss is `ConcurrentModification`,
/// since the cursor is now stale relative to the cache that produced it).
/// Otherwise the uploads covering the query position are resolved fresh
/// and stashed for subsequent pages.
async fn hydrate_visible_uploads(
    token: &CancellationToken,
    args: &PositionalArgs,
    request_state: &RequestState<'_>,
    cursor: &mut Cursor,
) -> Result<(), GatherError> {
    if !cursor.visible_uploads.is_empty() {
        for cached in &cursor.visible_uploads {
            if request_state.upload_cache.get(cached.upload_id).is_none() {
                return Err(GatherError::ConcurrentModification(cached.upload_id.0));
            }
        }
        return Ok(());
    }

    let visible_uploads = request_state
        .upload_resolver
        .visible_uploads_at(token, args.repository_id, &args.commit, args.line, args.character)
        .await?;

    request_state
        .upload_cache
        .hydrate(
            token,
            &visible_uploads.iter().map(|u| u.upload_id).collect::<Vec<_>>(),
        )
        .await?;

    cursor.visible_uploads = visible_uploads
        .into_iter()
        .map(|u| CursorVisibleUpload {
            upload_id: u.upload_id,
            target_path: u.target_path,
            target_path_without_root: u.target_path_without_root,
            target_position: u.target_position,
        })
        .collect();

    Ok(())
}

/// Returns definitions of the symbol under the cursor.
pub async fn get_definitions(
    token: &CancellationToken,
    args: &PositionalArgs,
    request_state: &RequestState<'_>,
    extractor: &dyn LocationExtractor,
    cursor: Cursor,
) -> Result<GatherOutcome, GatherError> {
    gather(token, args, request_state, extractor, Relation::Definitions, false, cursor).await
}

/// Returns references to the symbol under the cursor.
pub async fn get_references(
    token: &CancellationToken,
    args: &PositionalArgs,
    request_state: &RequestState<'_>,
    extractor: &dyn LocationExtractor,
    cursor: Cursor,
) -> Result<GatherOutcome, GatherError> {
    gather(token, args, request_state, extractor, Relation::References, true, cursor).await
}

/// Returns implementations of the symbol under the cursor.
pub async fn get_implementations(
    token: &CancellationToken,
    args: &PositionalArgs,
    request_state: &RequestState<'_>,
    extractor: &dyn LocationExtractor,
    cursor: Cursor,
) -> Result<GatherOutcome, GatherError> {
    gather(token, args, request_state, extractor, Relation::Implementations, true, cursor).await
}

/// Returns definitions of the interface the symbol under the cursor implements.
pub async fn get_prototypes(
    token: &CancellationToken,
    args: &PositionalArgs,
    request_state: &RequestState<'_>,
    extractor: &dyn LocationExtractor,
    cursor: Cursor,
) -> Result<GatherOutcome, GatherError> {
    gather(token, args, request_state, extractor, Relation::Definitions, false, cursor).await
}
