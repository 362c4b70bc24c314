mod common;

use std::{sync::Arc, time::Duration};

use chrono::Duration as ChronoDuration;
use futures::future::join_all;
use serde_json::json;

use common::*;
use spotdeck::{error::SpotifyError, spotify::auth::TokenCache};

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(FakeTokenEndpoint::new().with_delay(Duration::from_millis(50)));
    let cache = TokenCache::new(credentials, endpoint.clone(), manual_clock());

    let callers = (0..16).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.access_token().await })
    });
    let tokens: Vec<_> = join_all(callers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(tokens.iter().all(|t| t == "access-1"));
    assert_eq!(endpoint.calls(), 1);
    assert_eq!(cache.refresh_count(), 1);
}

#[tokio::test]
async fn token_is_reused_until_safety_margin() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(FakeTokenEndpoint::new());
    let clock = manual_clock();
    let cache = TokenCache::new(credentials, endpoint.clone(), clock.clone());

    assert_eq!(cache.access_token().await.unwrap(), "access-1");

    // 61 seconds before the declared expiry
    clock.advance(ChronoDuration::seconds(3600 - 61));
    assert_eq!(cache.access_token().await.unwrap(), "access-1");
    assert_eq!(endpoint.calls(), 1);

    // 59 seconds before the declared expiry
    clock.advance(ChronoDuration::seconds(2));
    assert_eq!(cache.access_token().await.unwrap(), "access-2");
    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn requests_an_hour_apart_refresh_twice() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(FakeTokenEndpoint::new());
    let clock = manual_clock();
    let cache = TokenCache::new(credentials, endpoint.clone(), clock.clone());

    cache.access_token().await.unwrap();
    clock.advance(ChronoDuration::seconds(3601));
    cache.access_token().await.unwrap();

    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn huge_declared_lifetime_is_capped() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(FakeTokenEndpoint::new().with_expires_in(u64::MAX));
    let clock = manual_clock();
    let cache = TokenCache::new(credentials, endpoint.clone(), clock.clone());

    cache.access_token().await.unwrap();
    clock.advance(ChronoDuration::days(2));
    cache.access_token().await.unwrap();

    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn missing_credential_never_calls_the_endpoint() {
    let sandbox = Sandbox::new();
    let endpoint = Arc::new(FakeTokenEndpoint::new());
    let cache = TokenCache::new(sandbox.credentials(), endpoint.clone(), manual_clock());

    let err = cache.access_token().await.unwrap_err();
    assert!(matches!(err, SpotifyError::NoCredential));
    assert_eq!(err.status(), 401);
    assert_eq!(endpoint.calls(), 0);
}

#[tokio::test]
async fn refresh_failure_reaches_every_waiter_and_is_not_cached() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(
        FakeTokenEndpoint::new()
            .with_delay(Duration::from_millis(50))
            .then(Err(SpotifyError::from_response(
                400,
                json!({"error": "invalid_grant", "error_description": "Refresh token revoked"}),
            ))),
    );
    let cache = TokenCache::new(credentials, endpoint.clone(), manual_clock());

    let callers = (0..5).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.access_token().await })
    });
    for joined in join_all(callers).await {
        let err = joined.unwrap().unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "Refresh token revoked");
    }
    assert_eq!(endpoint.calls(), 1);

    // The next caller starts a new exchange.
    assert_eq!(cache.access_token().await.unwrap(), "access-2");
    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn invalidate_forces_a_new_exchange() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(FakeTokenEndpoint::new());
    let cache = TokenCache::new(credentials, endpoint.clone(), manual_clock());

    assert_eq!(cache.access_token().await.unwrap(), "access-1");
    cache.invalidate_token("some-other-token");
    assert_eq!(cache.access_token().await.unwrap(), "access-1");

    cache.invalidate_token("access-1");
    assert_eq!(cache.access_token().await.unwrap(), "access-2");

    cache.invalidate();
    assert_eq!(cache.access_token().await.unwrap(), "access-3");
    assert_eq!(endpoint.calls(), 3);
}
