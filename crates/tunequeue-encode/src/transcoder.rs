//! Encoder seam and the ffmpeg-backed adapter.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Fixed output profile applied to every artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeProfile {
    /// Audio codec passed to the encoder.
    pub codec: &'static str,
    /// Constant bitrate.
    pub bitrate: &'static str,
    /// Container format.
    pub format: &'static str,
    /// ID3v2 tag revision forced for player compatibility.
    pub id3v2_version: &'static str,
}

impl TranscodeProfile {
    /// 320 kbps MP3 with ID3v2.4 tags.
    pub const MP3_320: Self = Self {
        codec: "libmp3lame",
        bitrate: "320k",
        format: "mp3",
        id3v2_version: "4",
    };
}

/// Encoder contract used by the post-processing pipeline.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Re-encode `source` into `destination` using the fixed profile.
    async fn transcode(&self, source: &Path, destination: &Path) -> anyhow::Result<()>;
}

/// Number of trailing stderr lines kept when ffmpeg fails.
const STDERR_TAIL_LINES: usize = 3;

/// Runs the `ffmpeg` executable as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
    profile: TranscodeProfile,
}

impl FfmpegTranscoder {
    /// Adapter invoking `program` with the 320 kbps MP3 profile.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            profile: TranscodeProfile::MP3_320,
        }
    }

    /// Command-line arguments for one conversion.
    #[must_use]
    pub fn args(&self, source: &Path, destination: &Path) -> Vec<OsString> {
        let profile = self.profile;
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_os_string());
        args.extend(
            [
                "-vn",
                "-codec:a",
                profile.codec,
                "-b:a",
                profile.bitrate,
                "-id3v2_version",
                profile.id3v2_version,
                "-f",
                profile.format,
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(destination.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, source: &Path, destination: &Path) -> anyhow::Result<()> {
        debug!(
            program = %self.program,
            source = %source.display(),
            destination = %destination.display(),
            "spawning encoder"
        );
        let output = Command::new(&self.program)
            .args(self.args(source, destination))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to start {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().filter(|line| !line.trim().is_empty()).collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ");
            if tail.is_empty() {
                bail!("{} exited with {}", self.program, output.status);
            }
            bail!("{} exited with {}: {tail}", self.program, output.status);
        }
        Ok(())
    }
}
