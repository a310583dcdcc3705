mod common;

use bgg_gateway::cache::{CacheProvider, Collection};
use bgg_gateway::metrics::CacheEventType;
use bgg_gateway::refresh::{
    snapshot_key, Caller, CategorySnapshot, CategoryStatus, RefreshJob, RefreshSettings,
};
use bgg_gateway::upstream::{CategoryRank, GameRecord};
use common::{fast_limiter, memory_metrics, Call, ScriptedCatalog};
use std::sync::Arc;
use std::time::Duration;

fn settings(categories: &[&str], items_per_category: usize) -> RefreshSettings {
    RefreshSettings {
        categories: categories.iter().map(|c| c.to_string()).collect(),
        items_per_category,
        item_delay: Duration::from_millis(250),
        max_pages: 3,
    }
}

async fn snapshot(store: &CacheProvider, category: &str, month: &str) -> CategorySnapshot {
    store
        .get_document(Collection::Snapshots, &snapshot_key(category, month))
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("no snapshot for {category}"))
}

fn ids(snapshot: &CategorySnapshot) -> Vec<&str> {
    snapshot.games.iter().map(|g| g.id.as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_one_failed_item_does_not_affect_other_categories() {
    let source = Arc::new(
        ScriptedCatalog::new()
            .with_listing("strategy", vec![vec!["1", "2", "3"]])
            .with_listing("family", vec![vec!["4", "5", "6"]])
            .with_listing("party", vec![vec!["7", "8", "9"]])
            .with_failing_item("5"),
    );
    let store = CacheProvider::memory(1_000);
    let (metrics, log) = memory_metrics();
    let job = RefreshJob::new(
        source.clone(),
        fast_limiter("bulk", 1),
        store.clone(),
        metrics,
        settings(&["strategy", "family", "party"], 3),
    );

    let report = job.run(&Caller::admin("ops")).await.unwrap();

    assert_eq!(report.failed_categories(), 0);
    assert_eq!(report.total_games(), 8);
    assert_eq!(ids(&snapshot(&store, "strategy", &report.month).await), vec!["1", "2", "3"]);
    assert_eq!(ids(&snapshot(&store, "party", &report.month).await), vec!["7", "8", "9"]);

    let family = snapshot(&store, "family", &report.month).await;
    assert_eq!(ids(&family), vec!["4", "6"]);
    assert_eq!(family.total_games, 2);
    assert_eq!(family.failed_items.len(), 1);
    assert_eq!(family.failed_items[0].id, "5");
    assert_eq!(report.outcome("family").unwrap().failed_items, 1);

    // The failed item was retried once, every other item fetched once
    let things = source.thing_calls();
    assert_eq!(things.iter().filter(|id| *id == "5").count(), 2);
    assert_eq!(things.len(), 10);

    let game: GameRecord = store
        .get_document(Collection::Games, "7")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(game.rank_for("boardgame"), Some(&CategoryRank::Ranked(7)));
    assert!(store.get(Collection::Games, "5").await.unwrap().is_none());

    let refresh_events = log.events_of(CacheEventType::CacheRefresh);
    assert_eq!(refresh_events.len(), 1);
    assert_eq!(refresh_events[0].data["totalGames"], 8);
}

#[tokio::test(start_paused = true)]
async fn test_failed_listing_skips_only_that_category() {
    let source = Arc::new(
        ScriptedCatalog::new()
            .with_listing("strategy", vec![vec!["1"]])
            .with_listing("party", vec![vec!["2"]]),
    );
    let store = CacheProvider::memory(1_000);
    let (metrics, _log) = memory_metrics();
    let job = RefreshJob::new(
        source.clone(),
        fast_limiter("bulk", 0),
        store.clone(),
        metrics,
        settings(&["strategy", "missing", "party"], 5),
    );

    let report = job.run(&Caller::admin("ops")).await.unwrap();

    assert_eq!(report.failed_categories(), 1);
    let missing = report.outcome("missing").unwrap();
    assert_eq!(missing.status, CategoryStatus::Failed);
    assert!(missing.error.is_some());
    assert!(store
        .get(Collection::Snapshots, &snapshot_key("missing", &report.month))
        .await
        .unwrap()
        .is_none());
    assert_eq!(ids(&snapshot(&store, "party", &report.month).await), vec!["2"]);
}

#[tokio::test(start_paused = true)]
async fn test_listing_walks_pages_until_enough_items() {
    let source = Arc::new(
        ScriptedCatalog::new().with_listing("strategy", vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]),
    );
    let store = CacheProvider::memory(1_000);
    let (metrics, _log) = memory_metrics();
    let job = RefreshJob::new(
        source.clone(),
        fast_limiter("bulk", 0),
        store.clone(),
        metrics,
        settings(&["strategy"], 3),
    );

    let report = job.run(&Caller::admin("ops")).await.unwrap();

    assert_eq!(ids(&snapshot(&store, "strategy", &report.month).await), vec!["1", "2", "3"]);
    let pages: Vec<u32> = source
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Page { page, .. } => Some(page),
            _ => None,
        })
        .collect();
    assert_eq!(pages, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_delay_between_items() {
    let source = Arc::new(ScriptedCatalog::new().with_listing("strategy", vec![vec!["1", "2", "3"]]));
    let (metrics, _log) = memory_metrics();
    let job = RefreshJob::new(
        source,
        fast_limiter("bulk", 0),
        CacheProvider::memory(1_000),
        metrics,
        settings(&["strategy"], 3),
    );

    let started = tokio::time::Instant::now();
    job.run(&Caller::admin("ops")).await.unwrap();

    // Two inter-item delays of 250ms on top of limiter spacing
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_non_admin_is_rejected_before_any_call() {
    let source = Arc::new(ScriptedCatalog::new().with_listing("strategy", vec![vec!["1"]]));
    let (metrics, _log) = memory_metrics();
    let job = RefreshJob::new(
        source.clone(),
        fast_limiter("bulk", 0),
        CacheProvider::memory(1_000),
        metrics,
        settings(&["strategy"], 3),
    );

    let err = job.run(&Caller::anonymous()).await.unwrap_err();
    assert!(matches!(err, bgg_gateway::GatewayError::PermissionDenied(_)));
    assert_eq!(source.call_count(), 0);
}
