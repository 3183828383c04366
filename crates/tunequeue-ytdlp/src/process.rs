//! Argument building and stdout parsing for yt-dlp invocations.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tunequeue_media_core::{FetchQuality, FetchRequest, TrackMetadata, watch_url};

/// Marker prefixed to progress lines through `--progress-template`.
pub const PROGRESS_MARKER: &str = "tq-progress";

const PROGRESS_TEMPLATE: &str = "download:tq-progress %(progress._percent_str)s";
const FINISHED_TEMPLATE: &str = "after_move:%(.{id,filepath,artist,track,title})j";

/// One meaningful line of yt-dlp stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    /// Download percentage.
    Progress(f64),
    /// Final file location and metadata after post-download moves.
    Finished {
        /// Location of the downloaded file.
        file: PathBuf,
        /// Metadata for the display name.
        metadata: TrackMetadata,
    },
}

#[derive(Debug, Deserialize)]
struct FinishedInfo {
    filepath: PathBuf,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    track: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Format selector for the requested quality.
#[must_use]
pub const fn format_selector(quality: FetchQuality) -> &'static str {
    match quality {
        FetchQuality::Lowest => "worstaudio",
        FetchQuality::Highest => "bestaudio",
    }
}

/// Arguments for downloading one item into `raw_dir`.
///
/// The output name carries the request's `fetch_id`, so concurrent fetches of
/// the same item never share a file.
#[must_use]
pub fn fetch_args(
    request: &FetchRequest,
    raw_dir: &Path,
    quality: FetchQuality,
) -> Vec<OsString> {
    let mut output = raw_dir.as_os_str().to_os_string();
    output.push(std::path::MAIN_SEPARATOR_STR);
    output.push(format!("%(id)s-{}.%(ext)s", request.fetch_id.simple()));

    let mut args: Vec<OsString> = [
        "-f",
        format_selector(quality),
        "--no-playlist",
        "--newline",
        "--no-simulate",
        "--progress-template",
        PROGRESS_TEMPLATE,
        "--print",
        FINISHED_TEMPLATE,
        "-o",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(output);
    args.push(OsString::from(watch_url(&request.item_id)));
    args
}

/// Arguments for listing the entries of a playlist URL.
#[must_use]
pub fn playlist_args(playlist_url: &str) -> Vec<OsString> {
    ["--flat-playlist", "--print", "url", playlist_url]
        .into_iter()
        .map(OsString::from)
        .collect()
}

/// Interpret one stdout line; unrelated lines yield `None`.
#[must_use]
pub fn parse_output_line(line: &str) -> Option<OutputLine> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix(PROGRESS_MARKER) {
        let value = rest.trim().trim_end_matches('%').trim();
        return value.parse::<f64>().ok().filter(|value| value.is_finite()).map(OutputLine::Progress);
    }
    if trimmed.starts_with('{') {
        let info: FinishedInfo = serde_json::from_str(trimmed).ok()?;
        return Some(OutputLine::Finished {
            file: info.filepath,
            metadata: TrackMetadata {
                artist: info.artist,
                title: info.track,
                video_title: info.title.unwrap_or_default(),
            },
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn rendered(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn fetch_args_select_quality_and_output_template() {
        let request = FetchRequest::new(Uuid::new_v4(), "dQw4w9WgXcQ");
        let args = fetch_args(&request, Path::new("/srv/storage/.raw"), FetchQuality::Lowest);
        let args = rendered(&args);
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "worstaudio");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&PROGRESS_TEMPLATE.to_string()));
        assert!(args.contains(&FINISHED_TEMPLATE.to_string()));
        assert_eq!(
            args[args.len() - 2],
            format!(
                "/srv/storage/.raw{}%(id)s-{}.%(ext)s",
                std::path::MAIN_SEPARATOR,
                request.fetch_id.simple()
            )
        );
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );

        let highest = FetchRequest::new(Uuid::new_v4(), "x");
        let best = rendered(&fetch_args(&highest, Path::new("raw"), FetchQuality::Highest));
        assert_eq!(best[1], "bestaudio");
    }

    #[test]
    fn concurrent_fetches_of_one_item_write_different_files() {
        let raw_dir = Path::new("/srv/storage/.raw");
        let output_of = |request: &FetchRequest| {
            let args = rendered(&fetch_args(request, raw_dir, FetchQuality::Lowest));
            args[args.len() - 2].clone()
        };
        let first = FetchRequest::new(Uuid::new_v4(), "dQw4w9WgXcQ");
        let second = FetchRequest::new(Uuid::new_v4(), "dQw4w9WgXcQ");
        let same_batch = FetchRequest::new(first.batch_id, "dQw4w9WgXcQ");

        assert_ne!(output_of(&first), output_of(&second));
        assert_ne!(output_of(&first), output_of(&same_batch));
    }

    #[test]
    fn playlist_args_print_flat_urls() {
        assert_eq!(
            rendered(&playlist_args("https://www.youtube.com/playlist?list=PL1")),
            vec![
                "--flat-playlist",
                "--print",
                "url",
                "https://www.youtube.com/playlist?list=PL1"
            ]
        );
    }

    #[test]
    fn progress_lines_are_parsed() {
        assert_eq!(
            parse_output_line("tq-progress  42.7%"),
            Some(OutputLine::Progress(42.7))
        );
        assert_eq!(
            parse_output_line("tq-progress 100.0%"),
            Some(OutputLine::Progress(100.0))
        );
        assert_eq!(parse_output_line("tq-progress   N/A"), None);
        assert_eq!(parse_output_line("[youtube] Extracting URL"), None);
    }

    #[test]
    fn finished_line_maps_metadata() {
        let line = r#"{"id": "abc", "filepath": "/raw/abc.webm", "artist": "A", "track": "T", "title": "A - T (Official)"}"#;
        assert_eq!(
            parse_output_line(line),
            Some(OutputLine::Finished {
                file: PathBuf::from("/raw/abc.webm"),
                metadata: TrackMetadata {
                    artist: Some("A".into()),
                    title: Some("T".into()),
                    video_title: "A - T (Official)".into(),
                },
            })
        );

        let sparse = r#"{"id": "abc", "filepath": "/raw/abc.webm", "artist": null, "track": null, "title": "X"}"#;
        match parse_output_line(sparse) {
            Some(OutputLine::Finished { metadata, .. }) => assert_eq!(metadata.display_name(), "X"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
