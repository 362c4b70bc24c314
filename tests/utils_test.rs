use spotdeck::spotify::uri::{play_request_for, to_uri};
use spotdeck::utils::*;

#[test]
fn test_generate_state() {
    let state = generate_state();

    // Should be exactly 32 characters
    assert_eq!(state.len(), 32);

    // Should contain only alphanumeric characters
    assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));

    // Two generated states should be different
    let state2 = generate_state();
    assert_ne!(state, state2);
}

#[test]
fn test_basic_auth_header() {
    // base64("id:secret")
    assert_eq!(basic_auth_header("id", "secret"), "Basic aWQ6c2VjcmV0");
}

#[test]
fn test_clamp_param() {
    assert_eq!(clamp_param(None, 10, 0, 10), 10);
    assert_eq!(clamp_param(Some(""), 10, 0, 10), 10);
    assert_eq!(clamp_param(Some("abc"), 10, 0, 10), 10);
    assert_eq!(clamp_param(Some("5"), 10, 0, 10), 5);
    assert_eq!(clamp_param(Some("7.9"), 10, 0, 10), 7);
    assert_eq!(clamp_param(Some("-3"), 0, 0, 1000), 0);
    assert_eq!(clamp_param(Some("5000"), 0, 0, 1000), 1000);
    assert_eq!(clamp_param(Some(" 42 "), 50, 1, 50), 42);
}

#[test]
fn test_url_and_uri_resolve_to_same_target() {
    let from_url = to_uri("https://open.spotify.com/intl-pt/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc");
    let from_uri = to_uri("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M");

    assert_eq!(from_url.as_deref(), Some("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"));
    assert_eq!(from_url, from_uri);

    assert_eq!(
        play_request_for("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", true),
        play_request_for("spotify:track:4uLU6hMCjMI75M1A2tKUQC", true)
    );
}

#[tokio::test]
async fn test_pace_zero_returns_immediately() {
    let start = std::time::Instant::now();
    pace(std::time::Duration::ZERO).await;
    assert!(start.elapsed() < std::time::Duration::from_millis(50));
}
