use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Fail instead of prompting when the output exists
    pub fn no_overwrite(self) -> Self {
        self.arg("-n")
    }

    /// Overwrite or refuse, never prompt
    pub fn overwrite_policy(self, overwrite: bool) -> Self {
        if overwrite {
            self.overwrite()
        } else {
            self.no_overwrite()
        }
    }

    /// Quiet ffmpeg/ffprobe chatter down to errors
    pub fn errors_only(self) -> Self {
        self.arg("-v").arg("error")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy video stream
    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Select a stream for the output
    pub fn map<S: Into<String>>(self, specifier: S) -> Self {
        self.arg("-map").arg(specifier)
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Limit output duration (seconds)
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(seconds.to_string())
    }

    /// Shift timestamps of the next input (seconds)
    pub fn input_offset(self, seconds: f64) -> Self {
        self.arg("-itsoffset").arg(seconds.to_string())
    }

    /// Human readable command line for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.binary_path.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute the command and return its stdout.
    ///
    /// Spawn failures and non-zero exits are both reported through `on_failure`,
    /// with the tool's stderr attached verbatim.
    pub async fn execute(&self, on_failure: fn(String) -> SyncError) -> Result<Vec<u8>> {
        debug!("Executing media command: {}", self.command_line());
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| on_failure(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(on_failure(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

/// Builder for the ffmpeg/ffprobe invocations the synchronizer needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build container duration probe
    pub fn probe_duration<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Duration probe")
            .errors_only()
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .output(path)
    }

    /// Build audio stream listing (JSON)
    pub fn list_audio_streams<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Audio stream query")
            .errors_only()
            .args(["-show_entries", "stream=index,codec_type"])
            .args(["-select_streams", "a"])
            .args(["-of", "json"])
            .output(path)
    }

    /// Build lossless extraction of the first audio stream
    pub fn extract_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        sample_rate: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio extraction")
            .overwrite()
            .input(video_path)
            .no_video()
            .map("0:a:0")
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .output(audio_path)
    }

    /// Build silent mono track of the given length
    pub fn synthesize_silence<P: AsRef<Path>>(
        &self,
        duration_secs: f64,
        audio_path: P,
        sample_rate: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Silent audio generation")
            .overwrite()
            .args(["-f", "lavfi"])
            .arg("-i")
            .arg(format!("anullsrc=channel_layout=mono:sample_rate={}", sample_rate))
            .duration(duration_secs)
            .audio_codec("pcm_s16le")
            .output(audio_path)
    }

    /// Build decode to mono 16-bit PCM WAV, optionally truncated
    pub fn decode_to_wav<P: AsRef<Path>>(
        &self,
        input_path: P,
        wav_path: P,
        sample_rate: u32,
        max_secs: Option<f64>,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.ffmpeg_path, "Audio decoding")
            .overwrite()
            .input(input_path)
            .no_video()
            .audio_channels(1)
            .audio_sample_rate(sample_rate)
            .audio_codec("pcm_s16le");

        if let Some(secs) = max_secs {
            cmd = cmd.duration(secs);
        }

        cmd.output(wav_path)
    }

    /// Build remux of the video stream with the shifted replacement audio
    pub fn remux_with_offset<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        output_path: P,
        offset_secs: f64,
        overwrite: bool,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio/video remux")
            .overwrite_policy(overwrite)
            .input(video_path)
            .input_offset(offset_secs)
            .input(audio_path)
            .map("0:v:0")
            .map("1:a:0")
            .copy_video()
            .copy_audio()
            .output(output_path)
    }

    /// Build version check command for ffmpeg
    pub fn ffmpeg_version(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "ffmpeg version check").arg("-version")
    }

    /// Build version check command for ffprobe
    pub fn ffprobe_version(&self) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "ffprobe version check").arg("-version")
    }
}
