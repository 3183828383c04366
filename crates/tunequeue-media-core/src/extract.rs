//! Video identifier extraction and canonical URL helpers.

use std::sync::LazyLock;

use regex::Regex;

const VIDEO_ID_LEN: usize = 11;

static VIDEO_ID_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*")
});

/// Extract the 11-character video identifier from a watch, short, or embed URL.
///
/// Returns `None` when the URL is not recognised or the captured identifier
/// has the wrong length.
#[must_use]
pub fn extract_video_id(url: &str) -> Option<String> {
    let pattern = VIDEO_ID_PATTERN.as_ref().ok()?;
    let id = pattern.captures(url)?.get(2)?.as_str();
    (id.chars().count() == VIDEO_ID_LEN).then(|| id.to_string())
}

/// Public playlist URL for a playlist identifier.
#[must_use]
pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

/// Public watch URL for a video identifier.
#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_common_url_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?start=3",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ#t=1",
            "https://www.youtube.com/u/x/dQw4w9WgXcQ",
        ] {
            assert_eq!(
                extract_video_id(url).as_deref(),
                Some("dQw4w9WgXcQ"),
                "url: {url}"
            );
        }
    }

    #[test]
    fn rejects_wrong_length_and_unknown_shapes() {
        assert_eq!(extract_video_id("https://youtu.be/short"), None);
        assert_eq!(extract_video_id("https://example.com/page"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn builds_canonical_urls() {
        assert_eq!(
            playlist_url("PL123"),
            "https://www.youtube.com/playlist?list=PL123"
        );
        assert_eq!(
            watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
