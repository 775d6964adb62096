//! Transcoder command construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Playlist written by the transcoder inside each artifact directory.
pub const PLAYLIST_FILE: &str = "playlist.m3u8";

/// Segment filename pattern handed to the transcoder.
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// HLS muxer settings shared by every stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsOutputConfig {
    /// Target segment duration in seconds (`-hls_time`).
    pub segment_duration_secs: u32,
    /// Number of segments kept in the playlist (`-hls_list_size`).
    pub playlist_size: u32,
    /// Delete segments that fall out of the playlist window.
    pub delete_old_segments: bool,
    pub video_codec: String,
    pub audio_codec: String,
}

impl Default for HlsOutputConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: 2,
            playlist_size: 5,
            delete_old_segments: true,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

/// A fully built transcoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TranscoderCommand {
    /// Build the HLS transcode command for one stream.
    ///
    /// The output is fully determined by the inputs: the same source and
    /// artifact directory always produce the same argument vector.
    pub fn hls(
        program: impl Into<String>,
        source_url: &str,
        artifact_dir: &Path,
        config: &HlsOutputConfig,
    ) -> Self {
        let mut args = Vec::with_capacity(20);

        // 1. Input
        args.extend(["-i".to_string(), source_url.to_string()]);

        // 2. Codecs
        args.extend([
            "-c:v".to_string(),
            config.video_codec.clone(),
            "-c:a".to_string(),
            config.audio_codec.clone(),
        ]);

        // 3. HLS muxer
        args.extend([
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            config.segment_duration_secs.to_string(),
            "-hls_list_size".to_string(),
            config.playlist_size.to_string(),
        ]);
        if config.delete_old_segments {
            args.extend(["-hls_flags".to_string(), "delete_segments".to_string()]);
        }

        // 4. Output paths
        args.extend([
            "-hls_segment_filename".to_string(),
            artifact_dir.join(SEGMENT_PATTERN).to_string_lossy().to_string(),
        ]);
        args.push(artifact_dir.join(PLAYLIST_FILE).to_string_lossy().to_string());

        Self {
            program: program.into(),
            args,
        }
    }

    /// Program followed by its arguments, as retained for diagnostics.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + 1);
        line.push(self.program.clone());
        line.extend(self.args.iter().cloned());
        line
    }
}
