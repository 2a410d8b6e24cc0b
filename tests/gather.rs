//! Integration tests against the in-memory fakes, covering the
//! traversal engine's universal invariants and boundary scenarios.

use codenav::collaborators::RequestState;
use codenav::cursor::Cursor;
use codenav::engine;
use codenav::model::{Location, Position, PositionalArgs, Relation, Upload, UploadId, VisibleUpload};
use codenav::testutil::{
    range, FakeBulkLocationStore, FakeLocationExtractor, FakeMonikerIndex,
    FakeUploadMetadataCache, FakeUploadResolver, FakeWorld,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn args(limit: u32) -> PositionalArgs {
    PositionalArgs {
        repository_id: 1,
        commit: "deadbeef".to_string(),
        path: "src/lib.rs".to_string(),
        line: 10,
        character: 4,
        limit,
    }
}

async fn run_gather(
    world: &FakeWorld,
    cache: &FakeUploadMetadataCache,
    relation: Relation,
    include_referencing_indexes: bool,
    limit: u32,
    cursor: Cursor,
) -> (Vec<codenav::model::UploadLocation>, Cursor) {
    let extractor = FakeLocationExtractor(world);
    let resolver = FakeUploadResolver(world);
    let moniker_index = FakeMonikerIndex(world);
    let store = FakeBulkLocationStore(world);
    let request_state = RequestState {
        upload_resolver: &resolver,
        upload_cache: cache,
        moniker_index: &moniker_index,
        bulk_location_store: &store,
        max_indexes_per_moniker_search: 10,
    };
    let token = CancellationToken::new();

    engine::gather(
        &token,
        &args(limit),
        &request_state,
        &extractor,
        relation,
        include_referencing_indexes,
        cursor,
    )
    .await
    .expect("gather should succeed")
}

/// Drains a query to exhaustion, asserting the universal invariants along
/// the way, and returns every location gathered in order.
async fn drain(
    world: &FakeWorld,
    cache: &FakeUploadMetadataCache,
    relation: Relation,
    include_referencing_indexes: bool,
    limit: u32,
) -> Vec<codenav::model::UploadLocation> {
    let mut cursor = Cursor::fresh();
    let mut all = Vec::new();
    loop {
        let (page, next) = run_gather(world, cache, relation, include_referencing_indexes, limit, cursor).await;
        assert!(page.len() as u32 <= limit, "page exceeded limit");
        all.extend(page);
        if next.is_exhausted() {
            // Calling again with the exhausted cursor must be a no-op.
            let (page, next2) = run_gather(world, cache, relation, include_referencing_indexes, limit, next).await;
            assert!(page.is_empty());
            assert!(next2.is_exhausted());
            break;
        }
        cursor = next;
    }
    all
}

fn upload(id: i32) -> Upload {
    Upload {
        id: UploadId(id),
        root: String::new(),
    }
}

/// S1: a single local occurrence, no cross-index symbols.
#[tokio::test]
async fn s1_single_local_occurrence_no_cross_index_symbols() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });
    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (
            vec![Location {
                upload_id: UploadId(1),
                path: "src/lib.rs".to_string(),
                range: range(10, 0, 10, 8),
            }],
            vec![],
        ),
    );

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    let (page, next) = run_gather(&world, &cache, Relation::Definitions, false, 10, Cursor::fresh()).await;
    assert_eq!(page.len(), 1);
    assert!(next.is_exhausted());
}

/// S2: symbol defined locally in upload A and also in upload B; the local
/// phase's in-document definitions must come first, then B's, in order.
#[tokio::test]
async fn s2_local_then_remote_definition_ordering() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.uploads.push(upload(2));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });

    let symbol = "scip-rust cargo demo 1.0 fn widget().".to_string();

    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (
            vec![Location {
                upload_id: UploadId(1),
                path: "src/lib.rs".to_string(),
                range: range(10, 0, 10, 8),
            }],
            vec![symbol.clone()],
        ),
    );

    world.definitions.insert(symbol.clone(), vec![UploadId(2)]);
    world.rows.insert(
        ("definitions", UploadId(2)),
        vec![Location {
            upload_id: UploadId(2),
            path: "src/other.rs".to_string(),
            range: range(3, 0, 3, 6),
        }],
    );

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    let all = drain(&world, &cache, Relation::Definitions, false, 10).await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].upload_id, UploadId(1));
    assert_eq!(all[1].upload_id, UploadId(2));
}

/// S3: limit = 1 across three local results yields three calls, the last
/// exhausted.
#[tokio::test]
async fn s3_limit_one_pages_through_three_local_results() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });
    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (
            vec![
                Location { upload_id: UploadId(1), path: "src/lib.rs".to_string(), range: range(1, 0, 1, 1) },
                Location { upload_id: UploadId(1), path: "src/lib.rs".to_string(), range: range(2, 0, 2, 1) },
                Location { upload_id: UploadId(1), path: "src/lib.rs".to_string(), range: range(3, 0, 3, 1) },
            ],
            vec![],
        ),
    );

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    // The engine may need one extra round-trip beyond the three
    // result-bearing pages to notice the local phase exhausted the last
    // upload exactly as it filled the final page (the phase transition
    // to "remote" is only detected on the next call's entry check).
    let mut cursor = Cursor::fresh();
    let mut pages = 0;
    let mut all = Vec::new();
    loop {
        let (page, next) = run_gather(&world, &cache, Relation::Definitions, false, 1, cursor).await;
        pages += 1;
        assert!(page.len() <= 1);
        all.extend(page);
        if next.is_exhausted() {
            break;
        }
        cursor = next;
        assert!(pages <= 10, "did not converge");
    }
    assert_eq!(pages, 4);
    assert_eq!(all.len(), 3);
}

/// S4: a cursor naming an upload the cache no longer has is a
/// `ConcurrentModification`.
#[tokio::test]
async fn s4_evicted_upload_is_concurrent_modification() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });
    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (
            vec![
                Location { upload_id: UploadId(1), path: "src/lib.rs".to_string(), range: range(1, 0, 1, 1) },
                Location { upload_id: UploadId(1), path: "src/lib.rs".to_string(), range: range(2, 0, 2, 1) },
            ],
            vec![],
        ),
    );

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    let (_page, next) = run_gather(&world, &cache, Relation::Definitions, false, 1, Cursor::fresh()).await;
    assert!(!next.is_exhausted());

    cache.evict(UploadId(1));

    let extractor = FakeLocationExtractor(&world);
    let resolver = FakeUploadResolver(&world);
    let moniker_index = FakeMonikerIndex(&world);
    let store = FakeBulkLocationStore(&world);
    let request_state = RequestState {
        upload_resolver: &resolver,
        upload_cache: &cache,
        moniker_index: &moniker_index,
        bulk_location_store: &store,
        max_indexes_per_moniker_search: 10,
    };
    let token = CancellationToken::new();
    let err = engine::gather(&token, &args(1), &request_state, &extractor, Relation::Definitions, false, next)
        .await
        .unwrap_err();
    assert!(matches!(err, codenav::GatherError::ConcurrentModification(1)));
}

/// S5: a local-prefixed symbol is never chased remotely.
#[tokio::test]
async fn s5_local_symbol_is_excluded_from_remote_chase() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });
    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (vec![], vec!["lsif .localFoo".to_string()]),
    );

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    let (page, next) = run_gather(&world, &cache, Relation::Definitions, false, 10, Cursor::fresh()).await;
    assert!(page.is_empty());
    assert!(next.is_exhausted());
}

/// S6: references relation pages through two candidate upload batches.
#[tokio::test]
async fn s6_references_page_through_candidate_upload_batches() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });

    let symbol = "scip-rust cargo demo 1.0 fn widget().".to_string();
    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (vec![], vec![symbol.clone()]),
    );

    for id in 2..=6 {
        world.uploads.push(upload(id));
    }
    world.references.insert(symbol.clone(), vec![2, 3, 4, 5, 6].into_iter().map(UploadId).collect());
    for id in 2..=6 {
        world.rows.insert(
            ("references", UploadId(id)),
            vec![Location {
                upload_id: UploadId(id),
                path: format!("src/mod_{id}.rs"),
                range: range(0, 0, 0, 1),
            }],
        );
    }

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    let all = drain(&world, &cache, Relation::References, true, 10).await;
    assert_eq!(all.len(), 5);
}

/// Universal invariant 7: when referencing indexes are excluded, no
/// reference-only upload ever appears in a candidate upload batch.
#[tokio::test]
async fn definitions_never_include_reference_only_uploads() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.uploads.push(upload(2));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });

    let symbol = "scip-rust cargo demo 1.0 fn widget().".to_string();
    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (vec![], vec![symbol.clone()]),
    );
    // upload 2 only references the symbol, never defines it.
    world.references.insert(symbol, vec![UploadId(2)]);

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    let all = drain(&world, &cache, Relation::Definitions, false, 10).await;
    assert!(all.is_empty());
}

/// Invariant: no emitted location belongs to a skipped `(upload, path)`.
#[tokio::test]
async fn remote_phase_filters_out_skip_paths() {
    let mut world = FakeWorld::default();
    world.uploads.push(upload(1));
    world.visible.push(VisibleUpload {
        upload_id: UploadId(1),
        target_path: "src/lib.rs".to_string(),
        target_path_without_root: "src/lib.rs".to_string(),
        target_position: Position::new(10, 4),
    });

    let symbol = "scip-rust cargo demo 1.0 fn widget().".to_string();
    world.documents.insert(
        (UploadId(1), "src/lib.rs".to_string(), 10, 4),
        (
            vec![Location { upload_id: UploadId(1), path: "src/lib.rs".to_string(), range: range(1, 0, 1, 1) }],
            vec![symbol.clone()],
        ),
    );

    world.definitions.insert(symbol, vec![UploadId(1)]);
    // Same upload, same path already emitted locally: this row must be
    // filtered out of the remote phase's results.
    world.rows.insert(
        ("definitions", UploadId(1)),
        vec![
            Location { upload_id: UploadId(1), path: "src/lib.rs".to_string(), range: range(1, 0, 1, 1) },
            Location { upload_id: UploadId(1), path: "src/other.rs".to_string(), range: range(5, 0, 5, 1) },
        ],
    );

    let cache = FakeUploadMetadataCache::default();
    cache.seed(&world);

    let all = drain(&world, &cache, Relation::Definitions, false, 10).await;
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|l| l.path == "src/lib.rs"));
    assert!(all.iter().any(|l| l.path == "src/other.rs"));
}

/// Invalid args: zero limit is rejected.
#[tokio::test]
async fn zero_limit_is_invalid_args() {
    let world = FakeWorld::default();
    let cache = FakeUploadMetadataCache::default();
    let err = {
        let extractor = FakeLocationExtractor(&world);
        let resolver = FakeUploadResolver(&world);
        let moniker_index = FakeMonikerIndex(&world);
        let store = FakeBulkLocationStore(&world);
        let request_state = RequestState {
            upload_resolver: &resolver,
            upload_cache: &cache,
            moniker_index: &moniker_index,
            bulk_location_store: &store,
            max_indexes_per_moniker_search: 10,
        };
        let token = CancellationToken::new();
        engine::gather(&token, &args(0), &request_state, &extractor, Relation::Definitions, false, Cursor::fresh())
            .await
            .unwrap_err()
    };
    assert!(matches!(err, codenav::GatherError::InvalidArgs(_)));
}

/// Resuming the exhausted cursor is always a no-op.
#[tokio::test]
async fn exhausted_cursor_is_terminal() {
    let world = FakeWorld::default();
    let cache = FakeUploadMetadataCache::default();
    let (page, next) = run_gather(&world, &cache, Relation::Definitions, false, 10, Cursor::exhausted()).await;
    assert!(page.is_empty());
    assert!(next.is_exhausted());
}
