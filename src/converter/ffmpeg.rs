//! Audio and video conversion through the `ffmpeg` binary.

use super::ConversionCapability;
use crate::error::ConversionError;
use crate::format::{Format, MediaKind};
use crate::job::ConversionOptions;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 12;

/// ffmpeg diagnostics that mean the input itself is unreadable.
const CORRUPT_INPUT_MARKERS: [&str; 4] = [
    "Invalid data found when processing input",
    "moov atom not found",
    "could not find codec parameters",
    "End of file",
];

/// Converts audio and video by running ffmpeg in a scratch directory.
///
/// Every conversion gets its own uniquely named directory under `temp_root`,
/// removed when the conversion future completes or is dropped. The child
/// process is killed if the future is dropped mid-run.
///
/// Honoured hints: `bitrate`, `sample_rate`, `audio_channels`, and for video
/// targets `resolution` and `frame_rate`.
pub struct FfmpegConverter {
    binary: PathBuf,
    temp_root: PathBuf,
}

impl FfmpegConverter {
    pub fn new(binary: impl Into<PathBuf>, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            temp_root: temp_root.into(),
        }
    }

    fn command(&self, input: &std::path::Path, output: &std::path::Path, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(["-hide_banner", "-nostdin", "-y", "-i"])
            .arg(input)
            .args(args)
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ConversionCapability for FfmpegConverter {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn detect_format(&self, bytes: &[u8]) -> Option<Format> {
        sniff(bytes)
    }

    fn accepts(&self, from: Format, to: Format) -> bool {
        matches!(
            (from.kind(), to.kind()),
            (MediaKind::Audio, MediaKind::Audio)
                | (MediaKind::Video, MediaKind::Video)
                | (MediaKind::Video, MediaKind::Audio)
        )
    }

    async fn convert(
        &self,
        input: Vec<u8>,
        from: Format,
        to: Format,
        options: ConversionOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        let args = ffmpeg_args(from, to, &options)?;

        let workdir = tempfile::Builder::new()
            .prefix("media-converter-")
            .tempdir_in(&self.temp_root)
            .map_err(|e| {
                ConversionError::ConversionFailure(format!("cannot create scratch directory: {}", e))
            })?;
        // Aliases like 3gg are not known to ffmpeg; name files by canonical extension.
        let input_path = workdir.path().join(format!("input.{}", from.canonical()));
        let output_path = workdir.path().join(format!("output.{}", to.canonical()));

        tokio::fs::write(&input_path, &input).await.map_err(|e| {
            ConversionError::ConversionFailure(format!("cannot stage input file: {}", e))
        })?;

        debug!(
            binary = %self.binary.display(),
            workdir = %workdir.path().display(),
            ?args,
            "running ffmpeg"
        );

        let output = match self.command(&input_path, &output_path, &args).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConversionError::ConversionFailure(format!(
                    "ffmpeg is required for audio/video conversion but was not found at {}",
                    self.binary.display()
                )));
            }
            Err(e) => {
                return Err(ConversionError::ConversionFailure(format!(
                    "failed to start ffmpeg: {}",
                    e
                )));
            }
        };

        if !output.status.success() {
            let details = stderr_tail(&output.stderr);
            warn!(status = %output.status, details = %details, "ffmpeg conversion failed");
            if CORRUPT_INPUT_MARKERS.iter().any(|m| details.contains(m)) {
                return Err(ConversionError::CorruptInput(details));
            }
            return Err(ConversionError::ConversionFailure(format!(
                "ffmpeg exited with {}: {}",
                output.status, details
            )));
        }

        let converted = tokio::fs::read(&output_path).await.map_err(|e| {
            ConversionError::ConversionFailure(format!("ffmpeg produced no output file: {}", e))
        })?;
        if converted.is_empty() {
            return Err(ConversionError::ConversionFailure(
                "ffmpeg produced an empty output file".to_string(),
            ));
        }
        Ok(converted)
    }
}

/// Builds the ffmpeg arguments placed between the input and output paths.
fn ffmpeg_args(
    from: Format,
    to: Format,
    options: &ConversionOptions,
) -> Result<Vec<String>, ConversionError> {
    let mut args = Vec::new();
    let audio_out = to.kind() == MediaKind::Audio;

    if from.kind() == MediaKind::Video && audio_out {
        args.push("-vn".to_string());
    }
    if let Some(bitrate) = options.get("bitrate") {
        check_value("bitrate", bitrate)?;
        args.push(if audio_out { "-b:a" } else { "-b:v" }.to_string());
        args.push(bitrate.to_string());
    }
    if let Some(rate) = options.parse::<u32>("sample_rate")? {
        args.push("-ar".to_string());
        args.push(rate.to_string());
    }
    if let Some(channels) = options.parse::<u8>("audio_channels")? {
        args.push("-ac".to_string());
        args.push(channels.to_string());
    }
    if !audio_out {
        if let Some((width, height)) = options.dimensions("resolution")? {
            args.push("-s".to_string());
            args.push(format!("{}x{}", width, height));
        }
        if let Some(fps) = options.parse::<f32>("frame_rate")? {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ConversionError::ConversionFailure(format!(
                    "frame_rate must be positive, got {}",
                    fps
                )));
            }
            args.push("-r".to_string());
            args.push(fps.to_string());
        }
    }
    Ok(args)
}

/// Rejects option values that ffmpeg could mistake for flags.
fn check_value(key: &str, value: &str) -> Result<(), ConversionError> {
    let valid = !value.starts_with('-')
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ConversionError::ConversionFailure(format!(
            "invalid value for option {}: {:?}",
            key, value
        )))
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Identifies common audio/video containers from their leading bytes.
fn sniff(bytes: &[u8]) -> Option<Format> {
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" {
        return match &bytes[8..12] {
            b"WAVE" => Some(Format::WAV),
            b"AVI " => Some(Format::AVI),
            _ => None,
        };
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        return if brand == b"qt  " {
            Some(Format::MOV)
        } else if brand.starts_with(b"3g") {
            Some(Format::THREE_GP)
        } else {
            Some(Format::MP4)
        };
    }
    if bytes.starts_with(b"FLV") {
        return Some(Format::FLV);
    }
    if bytes.starts_with(b"MThd") {
        return Some(Format::MID);
    }
    if bytes.starts_with(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
        return Some(Format::MP3);
    }
    None
}
