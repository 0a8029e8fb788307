mod common;

use common::{payload_for, start_time};
use confluence::domain::entities::reading::SourceReading;
use confluence::domain::ports::cache_store::CacheStore;
use confluence::domain::ports::clock::Clock;
use confluence::domain::values::score::Score;
use confluence::domain::values::source_kind::SourceKind;
use confluence::infrastructure::clock::ManualClock;
use confluence::infrastructure::sqlite::cache_store::SqliteCacheStore;
use confluence::infrastructure::sqlite::open_database;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(900);

fn setup() -> (Arc<ManualClock>, SqliteCacheStore) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = SqliteCacheStore::new(open_database(":memory:").unwrap(), clock.clone());
    (clock, store)
}

fn reading(clock: &ManualClock, kind: SourceKind, score: f64) -> SourceReading {
    SourceReading::new(
        "AAPL",
        Score::new(score).unwrap(),
        payload_for(kind, "AAPL"),
        clock.now(),
        TTL,
    )
}

#[test]
fn test_put_then_get() {
    let (clock, store) = setup();
    let r = reading(&clock, SourceKind::Equity, 62.0);
    store.put(SourceKind::Equity, "AAPL", &r, TTL);
    assert_eq!(store.get(SourceKind::Equity, "AAPL"), Some(r));
}

#[test]
fn test_miss_on_other_key_or_kind() {
    let (clock, store) = setup();
    store.put(SourceKind::Equity, "AAPL", &reading(&clock, SourceKind::Equity, 62.0), TTL);
    assert!(store.get(SourceKind::Equity, "MSFT").is_none());
    assert!(store.get(SourceKind::Sentiment, "AAPL").is_none());
}

#[test]
fn test_expiry_boundary() {
    let (clock, store) = setup();
    store.put(SourceKind::Equity, "AAPL", &reading(&clock, SourceKind::Equity, 62.0), TTL);

    clock.advance(TTL);
    assert!(store.get(SourceKind::Equity, "AAPL").is_some(), "valid up to and including expiry");

    clock.advance(Duration::from_millis(1));
    assert!(store.get(SourceKind::Equity, "AAPL").is_none());
}

#[test]
fn test_put_supersedes() {
    let (clock, store) = setup();
    store.put(SourceKind::Macro, "GLOBAL", &reading(&clock, SourceKind::Macro, 10.0), TTL);
    clock.advance(Duration::from_secs(60));
    let newer = reading(&clock, SourceKind::Macro, -35.0);
    store.put(SourceKind::Macro, "GLOBAL", &newer, TTL);

    assert_eq!(store.get(SourceKind::Macro, "GLOBAL"), Some(newer));
    let counts = store.counts().unwrap();
    let macro_count = counts.iter().find(|c| c.kind == "macro").unwrap();
    assert_eq!(macro_count.live, 1);
}

#[test]
fn test_purge_and_counts() {
    let (clock, store) = setup();
    store.put(SourceKind::Equity, "AAPL", &reading(&clock, SourceKind::Equity, 62.0), TTL);
    store.put(
        SourceKind::Sentiment,
        "AAPL",
        &reading(&clock, SourceKind::Sentiment, 58.0),
        Duration::from_secs(1800),
    );
    clock.advance(Duration::from_secs(1000));

    let counts = store.counts().unwrap();
    assert_eq!(counts.len(), 3);
    let equity = counts.iter().find(|c| c.kind == "equity").unwrap();
    assert_eq!((equity.live, equity.expired), (0, 1));
    let sentiment = counts.iter().find(|c| c.kind == "sentiment").unwrap();
    assert_eq!((sentiment.live, sentiment.expired), (1, 0));

    assert_eq!(store.purge_expired().unwrap(), 1);
    assert_eq!(store.purge_expired().unwrap(), 0);
    assert!(store.get(SourceKind::Sentiment, "AAPL").is_some());
}

#[test]
fn test_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let path = path.to_str().unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));
    let r = reading(&clock, SourceKind::Equity, 62.0);

    {
        let store = SqliteCacheStore::new(open_database(path).unwrap(), clock.clone());
        store.put(SourceKind::Equity, "AAPL", &r, TTL);
    }

    let reopened = SqliteCacheStore::new(open_database(path).unwrap(), clock.clone());
    assert_eq!(reopened.get(SourceKind::Equity, "AAPL"), Some(r));
}
