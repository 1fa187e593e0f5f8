//! Price resolution against a real SQLite store.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{FailingStore, StaticOrigin, resolver};
use rust_decimal_macros::dec;
use stock_feed::{OriginError, PricePoint, PriceStore, ResolveError, SqlitePriceStore, Ticker};

#[tokio::test]
async fn origin_price_is_written_through_and_registered() {
    let store = Arc::new(SqlitePriceStore::in_memory().await.unwrap());
    let origin = Arc::new(StaticOrigin::with_prices(&[("ABC", dec!(100.00))]));
    let resolver = resolver(store.clone(), origin.clone());
    let abc = Ticker::new("ABC");

    let point = resolver.resolve(&abc).await.unwrap().unwrap();

    assert_eq!(point.ticker, abc);
    assert_eq!(point.price, dec!(100.00));
    assert_eq!(store.count_for(&abc).await.unwrap(), 1);
    assert!(resolver.registry().contains(&abc));
    assert_eq!(origin.quote_calls(), 1);
}

#[tokio::test]
async fn origin_price_matches_later_store_reads() {
    let store = Arc::new(SqlitePriceStore::in_memory().await.unwrap());
    let origin = Arc::new(StaticOrigin::with_prices(&[("ABC", dec!(12.3456789))]));
    let resolver = resolver(store.clone(), origin.clone());
    let abc = Ticker::new("ABC");

    let from_origin = resolver.resolve(&abc).await.unwrap().unwrap();
    let from_store = resolver.resolve(&abc).await.unwrap().unwrap();

    assert_eq!(from_origin.price, dec!(12.345679));
    assert_eq!(from_store, from_origin);
    assert_eq!(origin.quote_calls(), 1);
}

#[tokio::test]
async fn stored_price_wins_without_origin_call() {
    let store = Arc::new(SqlitePriceStore::in_memory().await.unwrap());
    let abc = Ticker::new("ABC");
    let t0 = Utc::now() - Duration::minutes(1);
    store
        .append(&PricePoint::at(abc.clone(), dec!(100.00), t0))
        .await
        .unwrap();
    let origin = Arc::new(StaticOrigin::with_prices(&[("ABC", dec!(999))]));
    let resolver = resolver(store.clone(), origin.clone());

    let point = resolver.resolve(&abc).await.unwrap().unwrap();

    assert_eq!(point.price, dec!(100.00));
    assert_eq!(origin.quote_calls(), 0);
    assert_eq!(store.count_for(&abc).await.unwrap(), 1);
    assert!(resolver.registry().contains(&abc));
}

#[tokio::test]
async fn lowercase_request_resolves_normalized_ticker() {
    let store = Arc::new(SqlitePriceStore::in_memory().await.unwrap());
    let origin = Arc::new(StaticOrigin::with_prices(&[("MSFT", dec!(410.5))]));
    let resolver = resolver(store, origin);

    let point = resolver.resolve(&Ticker::new(" msft ")).await.unwrap().unwrap();

    assert_eq!(point.ticker.as_str(), "MSFT");
    assert_eq!(resolver.registry().all_tickers(), vec![Ticker::new("MSFT")]);
}

#[tokio::test]
async fn unknown_ticker_is_absent_and_never_registered() {
    let store = Arc::new(SqlitePriceStore::in_memory().await.unwrap());
    let origin = Arc::new(StaticOrigin::default());
    let resolver = resolver(store.clone(), origin.clone());
    let zzz = Ticker::new("ZZZ");

    assert!(resolver.resolve(&zzz).await.unwrap().is_none());
    // Absence is not cached, so the origin is asked again
    assert!(resolver.resolve(&zzz).await.unwrap().is_none());

    assert_eq!(origin.quote_calls(), 2);
    assert_eq!(store.count_for(&zzz).await.unwrap(), 0);
    assert!(resolver.registry().is_empty());
}

#[tokio::test]
async fn origin_failure_surfaces_as_error() {
    let store = Arc::new(SqlitePriceStore::in_memory().await.unwrap());
    let origin = Arc::new(StaticOrigin::with_prices(&[("ABC", dec!(1))]));
    origin.fail_with(OriginError::RateLimited("quota".into()));
    let resolver = resolver(store, origin);

    let result = resolver.resolve(&Ticker::new("ABC")).await;

    assert!(matches!(
        result,
        Err(ResolveError::Origin(OriginError::RateLimited(_)))
    ));
    assert!(resolver.registry().is_empty());
}

#[tokio::test]
async fn store_failure_surfaces_as_error() {
    let origin = Arc::new(StaticOrigin::with_prices(&[("ABC", dec!(1))]));
    let resolver = resolver(Arc::new(FailingStore), origin.clone());

    let result = resolver.resolve(&Ticker::new("ABC")).await;

    assert!(matches!(result, Err(ResolveError::Store(_))));
    assert_eq!(origin.quote_calls(), 0);
}

#[tokio::test]
async fn concurrent_resolutions_register_once() {
    let store = Arc::new(SqlitePriceStore::in_memory().await.unwrap());
    let origin = Arc::new(StaticOrigin::with_prices(&[("ABC", dec!(10)), ("XYZ", dec!(20))]));
    let resolver = resolver(store, origin);

    let mut handles = Vec::new();
    for i in 0..20 {
        let resolver = Arc::clone(&resolver);
        let symbol = if i % 2 == 0 { "ABC" } else { "XYZ" };
        handles.push(tokio::spawn(async move {
            resolver.resolve(&Ticker::new(symbol)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_some());
    }

    let mut active = resolver.registry().all_tickers();
    active.sort();
    assert_eq!(active, vec![Ticker::new("ABC"), Ticker::new("XYZ")]);
}

#[tokio::test]
async fn search_passes_matches_through() {
    let origin = Arc::new(StaticOrigin::with_matches(vec![stock_feed::TickerMatch {
        symbol: "TSCO.LON".into(),
        display_name: "Tesco PLC".into(),
    }]));
    let resolver = resolver(Arc::new(FailingStore), origin.clone());

    let matches = resolver.search("tesco").await.unwrap();
    resolver.search("tesco").await.unwrap();

    assert_eq!(matches[0].symbol, "TSCO.LON");
    // Not cached
    assert_eq!(origin.search_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}
