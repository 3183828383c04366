//! Shared HTTP constants (headers, content types, user-facing messages).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 20;

pub(crate) const CONTENT_TYPE_MPEG: &str = "audio/mpeg";
pub(crate) const CONTENT_TYPE_PROMETHEUS: &str = "text/plain; version=0.0.4";
pub(crate) const ARTIFACT_EXTENSION: &str = "mp3";

pub(crate) const MSG_IDS_EMPTY: &str = "List of ids is empty";
pub(crate) const MSG_PLAYLIST_ID_MISSING: &str = "Playlist id missing";
pub(crate) const MSG_PLAYLIST_EMPTY: &str = "Cant find any songs in playlist";
pub(crate) const MSG_PROCESS_ID_MISSING: &str = "Process id missing";
pub(crate) const MSG_NO_SUCH_PROCESS: &str = "No such process";
pub(crate) const MSG_FILE_LOCATION_MISSING: &str = "File location missing";
pub(crate) const MSG_FILE_NOT_FOUND: &str = "File not found";
