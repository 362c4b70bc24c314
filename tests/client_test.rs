mod common;

use std::sync::Arc;

use reqwest::Method;
use serde_json::json;

use common::*;
use spotdeck::{
    error::SpotifyError,
    spotify::{
        auth::TokenCache,
        client::{UnauthorizedRetry, UpstreamBody},
        player,
    },
    types::PlayRequest,
};

async fn setup(transport: RecordingTransport) -> (Sandbox, Arc<FakeTokenEndpoint>, Arc<RecordingTransport>, spotdeck::spotify::client::SpotifyClient) {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(FakeTokenEndpoint::new());
    let transport = Arc::new(transport);
    let client = client(credentials, endpoint.clone(), transport.clone(), manual_clock());
    (sandbox, endpoint, transport, client)
}

#[tokio::test]
async fn unauthorized_then_ok_refreshes_once_and_retries() {
    let transport = RecordingTransport::no_content()
        .then(Ok(raw(401, r#"{"error":{"status":401,"message":"The access token expired"}}"#)))
        .then(Ok(raw(200, r#"{"id":"me"}"#)));
    let (_sandbox, endpoint, transport, client) = setup(transport).await;

    let me = client.get("me", &[]).await.unwrap();

    assert_eq!(me, json!({"id": "me"}));
    assert_eq!(endpoint.calls(), 2);
    let seen = transport.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].token, "access-1");
    assert_eq!(seen[1].token, "access-2");
    assert_eq!(seen[1].request.url.as_str(), "https://api.test/v1/me");
}

#[tokio::test]
async fn second_unauthorized_is_not_retried_again() {
    let transport = RecordingTransport::new(|_| {
        Ok(raw(401, r#"{"error":{"status":401,"message":"Invalid access token"}}"#))
    });
    let (_sandbox, endpoint, transport, client) = setup(transport).await;

    let err = client.get("me", &[]).await.unwrap_err();

    assert_eq!(err.status(), 401);
    assert_eq!(err.to_string(), "Invalid access token");
    assert_eq!(transport.count(), 2);
    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn failed_refresh_after_unauthorized_reports_first_response() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(
        FakeTokenEndpoint::new()
            .then(Ok(token("access-1", 3600)))
            .then(Err(SpotifyError::Transport("connection reset".into()))),
    );
    let transport = Arc::new(RecordingTransport::new(|_| {
        Ok(raw(401, r#"{"error":{"status":401,"message":"The access token expired"}}"#))
    }));
    let client = client(credentials, endpoint.clone(), transport.clone(), manual_clock());

    let err = client.get("me/player", &[]).await.unwrap_err();

    assert_eq!(err.status(), 401);
    assert_eq!(err.to_string(), "The access token expired");
    assert_eq!(transport.count(), 1);
    assert_eq!(endpoint.calls(), 2);
}

#[tokio::test]
async fn no_content_is_a_distinct_success() {
    let (_sandbox, _endpoint, transport, client) = setup(RecordingTransport::no_content()).await;

    let body = client
        .send(Method::PUT, "me/player/pause", &[], None)
        .await
        .unwrap();

    assert_eq!(body, UpstreamBody::NoContent);
    assert_eq!(transport.targets(), vec!["me/player/pause"]);
}

#[tokio::test]
async fn malformed_success_body_is_wrapped() {
    let transport = RecordingTransport::new(|_| Ok(raw(200, "not json")));
    let (_sandbox, _endpoint, _transport, client) = setup(transport).await;

    let body = client.get("me", &[]).await.unwrap();
    assert_eq!(body, json!({"raw": "not json"}));
}

#[tokio::test]
async fn upstream_error_keeps_status_message_and_payload() {
    let transport = RecordingTransport::new(|_| {
        Ok(raw(
            404,
            r#"{"error":{"status":404,"message":"Player command failed: No active device found"}}"#,
        ))
    });
    let (_sandbox, _endpoint, _transport, client) = setup(transport).await;

    let err = player::play(
        &client,
        &PlayRequest::context("spotify:playlist:X".into(), true),
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), 404);
    assert_eq!(err.to_string(), "Player command failed: No active device found");
    assert!(err.raw().is_some());
}

#[tokio::test]
async fn transport_failure_maps_to_500() {
    let transport =
        RecordingTransport::new(|_| Err(SpotifyError::Transport("dns error".into())));
    let (_sandbox, endpoint, _transport, client) = setup(transport).await;

    let err = client.get("me", &[]).await.unwrap_err();
    assert_eq!(err.status(), 500);
    assert!(err.raw().is_none());
    assert_eq!(endpoint.calls(), 1);
}

#[tokio::test]
async fn play_payload_and_device_query() {
    let (_sandbox, _endpoint, transport, client) = setup(RecordingTransport::no_content()).await;

    player::play(
        &client,
        &PlayRequest::tracks(vec!["spotify:track:T".into()], true),
        Some("dev 1"),
    )
    .await
    .unwrap();

    let seen = transport.seen();
    assert_eq!(seen[0].request.method, Method::PUT);
    assert_eq!(seen[0].target(), "me/player/play?device_id=dev+1");
    assert_eq!(
        seen[0].request.body,
        Some(json!({"uris": ["spotify:track:T"], "position_ms": 0}))
    );
}

#[tokio::test]
async fn retry_policy_without_unauthorized_makes_one_attempt() {
    let sandbox = Sandbox::new();
    let credentials = sandbox.connect().await;
    let endpoint = Arc::new(FakeTokenEndpoint::new());
    let tokens = TokenCache::new(credentials, endpoint.clone(), manual_clock());

    let attempts = std::sync::atomic::AtomicUsize::new(0);
    let res = UnauthorizedRetry
        .run(&tokens, |token| {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move {
                assert_eq!(token, "access-1");
                Ok(raw(500, "boom"))
            }
        })
        .await
        .unwrap();

    assert_eq!(res.status, 500);
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(endpoint.calls(), 1);
}
