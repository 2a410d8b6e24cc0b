//! Local phase: gather locations from inside the visible uploads
//! themselves, and collect the symbol names the remote phase will chase.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::collaborators::{LocationExtractor, LocationKey, RequestState};
use crate::cursor::{Cursor, Phase};
use crate::error::GatherError;
use crate::model::UploadLocation;
use crate::moniker::is_local_symbol;

/// Runs one round of the local phase, appending up to `remaining` locations.
///
/// No-op (returns an empty page, cursor unchanged) unless `cursor.phase ==
/// Phase::Local`.
#[tracing::instrument(skip(request_state, extractor, token, cursor), fields(remaining))]
pub async fn gather_local_locations(
    token: &CancellationToken,
    request_state: &RequestState<'_>,
    extractor: &dyn LocationExtractor,
    cursor: &mut Cursor,
    remaining: u32,
) -> Result<Vec<UploadLocation>, GatherError> {
    if cursor.phase != Phase::Local {
        return Ok(Vec::new());
    }

    if cursor.local_upload_offset as usize >= cursor.visible_uploads.len() {
        cursor.phase = Phase::Remote;
        return Ok(Vec::new());
    }

    let mut page = Vec::new();
    let mut symbol_names: BTreeSet<String> = cursor.symbol_names.iter().cloned().collect();

    while (cursor.local_upload_offset as usize) < cursor.visible_uploads.len() {
        if token.is_cancelled() {
            return Err(GatherError::Cancelled);
        }
        if page.len() as u32 >= remaining {
            break;
        }

        let visible = cursor.visible_uploads[cursor.local_upload_offset as usize].clone();
        trace!(upload_id = visible.upload_id.0, path = %visible.target_path_without_root, "extracting local document");

        let (doc_locations, related_symbols) = extractor
            .extract(
                token,
                LocationKey {
                    upload_id: visible.upload_id,
                    path: visible.target_path_without_root.clone(),
                    position: visible.target_position,
                },
            )
            .await?;

        let page_limit = (remaining as usize).saturating_sub(page.len());
        let total = doc_locations.len();
        let offset = cursor.local_location_offset as usize;
        let slice: Vec<_> = doc_locations
            .into_iter()
            .skip(offset)
            .take(page_limit)
            .collect();

        cursor.bump_local_location_offset(slice.len(), total);

        if !slice.is_empty() {
            let translated = request_state
                .upload_resolver
                .translate(token, request_state.upload_cache, slice, true)
                .await?;
            if !translated.is_empty() {
                cursor
                    .skip_paths_by_upload_id
                    .insert(visible.upload_id, visible.target_path_without_root.clone());
            }
            page.extend(translated);
        }

        for symbol_name in related_symbols {
            if !is_local_symbol(&symbol_name) {
                symbol_names.insert(symbol_name);
            }
        }
    }

    cursor.symbol_names = symbol_names.into_iter().collect();
    Ok(page)
}
