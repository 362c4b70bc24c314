//! Resolution of user-supplied references into canonical `spotify:` URIs and
//! play payloads.

use url::Url;

use crate::types::PlayRequest;

/// Entity types that have an `open.spotify.com/{type}/{id}` page.
const LINKABLE_KINDS: [&str; 6] = ["track", "album", "playlist", "artist", "episode", "show"];

/// Normalises a reference into a `spotify:{type}:{id}` URI.
///
/// `spotify:` URIs pass through unchanged. Web player links are converted
/// from their path; an `intl-xx` locale prefix is ignored. Everything else,
/// including blank input, is unresolvable.
///
/// # Example
///
/// ```
/// use spotdeck::spotify::uri::to_uri;
///
/// assert_eq!(
///     to_uri("https://open.spotify.com/track/abc123?si=x").as_deref(),
///     Some("spotify:track:abc123")
/// );
/// assert_eq!(to_uri("not a reference"), None);
/// ```
pub fn to_uri(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.starts_with("spotify:") {
        return Some(input.to_string());
    }
    if !input.contains("open.spotify.com/") {
        return None;
    }

    let url = Url::parse(input).ok()?;
    let mut segments = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .skip_while(|s| s.starts_with("intl-"));

    let kind = segments.next()?;
    let id = segments.next()?;
    LINKABLE_KINDS
        .contains(&kind)
        .then(|| format!("spotify:{kind}:{id}"))
}

/// Builds the play payload for a reference.
///
/// Tracks are played as an explicit list, albums, playlists and artists as
/// a context. Episodes, shows and unresolvable input yield `None`.
pub fn play_request_for(input: &str, from_start: bool) -> Option<PlayRequest> {
    let uri = to_uri(input)?;
    if uri.starts_with("spotify:track:") {
        return Some(PlayRequest::tracks(vec![uri], from_start));
    }
    if ["spotify:album:", "spotify:playlist:", "spotify:artist:"]
        .iter()
        .any(|prefix| uri.starts_with(prefix))
    {
        return Some(PlayRequest::context(uri, from_start));
    }
    None
}

/// `spotify:playlist:{id}` for a bare playlist id.
pub fn playlist_uri(id: &str) -> Option<String> {
    let id = id.trim();
    (!id.is_empty()).then(|| format!("spotify:playlist:{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_passes_through() {
        assert_eq!(
            to_uri("  spotify:playlist:37i9dQZF1DX  ").as_deref(),
            Some("spotify:playlist:37i9dQZF1DX")
        );
    }

    #[test]
    fn web_links_convert() {
        assert_eq!(
            to_uri("https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy?si=abc").as_deref(),
            Some("spotify:album:4aawyAB9vmqN3uQ7FjRGTy")
        );
        assert_eq!(
            to_uri("https://open.spotify.com/intl-pt/track/abc123").as_deref(),
            Some("spotify:track:abc123")
        );
        assert_eq!(
            to_uri("https://open.spotify.com/episode/ep1").as_deref(),
            Some("spotify:episode:ep1")
        );
    }

    #[test]
    fn unknown_or_incomplete_links_are_rejected() {
        assert_eq!(to_uri("https://open.spotify.com/user/someone"), None);
        assert_eq!(to_uri("https://open.spotify.com/track"), None);
        assert_eq!(to_uri("https://example.com/track/abc"), None);
        assert_eq!(to_uri(""), None);
        assert_eq!(to_uri("   "), None);
    }

    #[test]
    fn link_and_uri_give_the_same_payload() {
        let from_link = play_request_for("https://open.spotify.com/track/abc123", true);
        let from_uri = play_request_for("spotify:track:abc123", true);
        assert_eq!(from_link, from_uri);
        assert_eq!(
            from_uri,
            Some(PlayRequest::tracks(vec!["spotify:track:abc123".into()], true))
        );
    }

    #[test]
    fn contexts_and_position() {
        let req = play_request_for("spotify:playlist:X", false).unwrap();
        assert_eq!(req.context_uri.as_deref(), Some("spotify:playlist:X"));
        assert_eq!(req.position_ms, None);

        let req = play_request_for("spotify:artist:Y", true).unwrap();
        assert_eq!(req.context_uri.as_deref(), Some("spotify:artist:Y"));
        assert_eq!(req.position_ms, Some(0));
    }

    #[test]
    fn non_playable_references() {
        assert_eq!(play_request_for("spotify:episode:e", true), None);
        assert_eq!(play_request_for("spotify:show:s", true), None);
        assert_eq!(play_request_for("https://open.spotify.com/user/u", true), None);
    }
}
