// Argument-vector construction for the five operation modes
//
// The flag sets here are the wire contract with the engine; order and spelling
// must be reproduced exactly.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::encoders::{EncoderCapabilities, VideoEncoderOption, resolve_encoder};

/// The three re-encoding tasks. Extraction and remuxing have their own
/// builders, so this type only names modes that produce a re-encoded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    YouTubeOptimize,
    YifyReencode,
    CustomEncode,
}

/// Quality/speed tiers, passed verbatim (lower-cased) as the encoder preset.
/// Only consulted in CustomEncode mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EncodePreset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl EncodePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
        }
    }
}

/// Output container for modes that produce a muxed video file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ContainerOption {
    #[default]
    Mkv,
    Mp4,
}

impl ContainerOption {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mkv => "mkv",
            Self::Mp4 => "mp4",
        }
    }
}

/// A fully built engine invocation: the argument vector and the output path
/// the command will produce.
#[derive(Debug, Clone)]
pub struct CommandPlan {
    pub args: Vec<OsString>,
    pub output_path: PathBuf,
}

impl CommandPlan {
    /// Render the argument vector for display (dry runs, logs).
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn resolve_audio_codec(codec: &str) -> &'static str {
    match codec {
        "aac" => "aac",
        "mp3" => "libmp3lame",
        "wav" => "pcm_s16le",
        "flac" => "flac",
        _ => "pcm_s16le",
    }
}

fn audio_extension(codec: &str) -> &'static str {
    match codec {
        "aac" => "m4a",
        "mp3" => "mp3",
        "wav" => "wav",
        "flac" => "flac",
        _ => "wav",
    }
}

/// Output path for audio extraction: the input with its extension replaced by
/// the codec's container extension.
pub fn audio_output_path(input: &Path, audio_codec: &str) -> PathBuf {
    input.with_extension(audio_extension(audio_codec))
}

/// Output path for muxed-video modes: `_encoded` inserted before the chosen
/// container extension.
pub fn video_output_path(input: &Path, container: ContainerOption) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}_encoded.{}", container.extension());
    match input.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

// All commands overwrite unconditionally, suppress the status banner, and
// request the unbuffered key=value progress stream on stdout so that stream
// carries nothing but progress lines.
fn progress_preamble(args: &mut Vec<OsString>, verbose: bool) {
    args.push("-y".into());
    args.push("-hide_banner".into());
    args.push("-nostats".into());
    if verbose {
        args.push("-v".into());
        args.push("verbose".into());
    }
    args.push("-progress".into());
    args.push("pipe:1".into());
}

/// ExtractAudio: drop the video stream, encode audio with the requested codec.
pub fn build_extract_audio(input: &Path, audio_codec: &str) -> CommandPlan {
    let output_path = audio_output_path(input, audio_codec);

    let mut args = Vec::new();
    progress_preamble(&mut args, false);
    args.push("-i".into());
    args.push(input.into());
    args.push("-vn".into());
    args.push("-acodec".into());
    args.push(resolve_audio_codec(audio_codec).into());
    args.push(output_path.clone().into());

    CommandPlan { args, output_path }
}

/// RemuxAudio: stream-copy video from the first input and audio from the
/// second, no re-encode.
pub fn build_remux(video: &Path, audio: &Path, container: ContainerOption) -> CommandPlan {
    let output_path = video_output_path(video, container);

    let mut args = Vec::new();
    progress_preamble(&mut args, false);
    args.push("-i".into());
    args.push(video.into());
    args.push("-i".into());
    args.push(audio.into());
    args.push("-c".into());
    args.push("copy".into());
    args.push("-map".into());
    args.push("0:v:0".into());
    args.push("-map".into());
    args.push("1:a:0".into());
    args.push(output_path.clone().into());

    CommandPlan { args, output_path }
}

/// Per-run options for the three encoding modes.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub encoder: VideoEncoderOption,
    pub preset: EncodePreset,
    pub container: ContainerOption,
}

/// YouTubeOptimize / YifyReencode / CustomEncode. `Auto` encoder choices are
/// resolved against the probed capability set; everything else is
/// deterministic given the inputs.
pub fn build_encode(
    mode: EncodeMode,
    video: &Path,
    audio: Option<&Path>,
    opts: EncodeOptions,
    caps: &EncoderCapabilities,
) -> CommandPlan {
    let encoder = resolve_encoder(opts.encoder, caps);
    let output_path = video_output_path(video, opts.container);

    let mut args = Vec::new();
    progress_preamble(&mut args, true);
    args.push("-i".into());
    args.push(video.into());
    if let Some(audio) = audio {
        args.push("-i".into());
        args.push(audio.into());
    }

    args.push("-c:v".into());
    args.push(encoder.into());

    match mode {
        EncodeMode::YouTubeOptimize => {
            // Streaming-friendly: high quality CRF, 192k AAC, moov atom up front.
            args.push("-preset".into());
            args.push("slow".into());
            args.push("-crf".into());
            args.push("18".into());
            args.push("-c:a".into());
            args.push("aac".into());
            args.push("-b:a".into());
            args.push("192k".into());
            args.push("-movflags".into());
            args.push("+faststart".into());
        }
        EncodeMode::YifyReencode => {
            args.push("-preset".into());
            args.push("slow".into());
            args.push("-crf".into());
            args.push("22".into());
            args.push("-c:a".into());
            args.push("aac".into());
            args.push("-b:a".into());
            args.push("128k".into());
        }
        EncodeMode::CustomEncode => {
            args.push("-preset".into());
            args.push(opts.preset.as_str().into());
            if audio.is_some() {
                args.push("-c:a".into());
                args.push("aac".into());
                args.push("-b:a".into());
                args.push("192k".into());
            } else {
                args.push("-c:a".into());
                args.push("copy".into());
            }
        }
    }

    if audio.is_some() {
        args.push("-map".into());
        args.push("0:v:0".into());
        args.push("-map".into());
        args.push("1:a:0".into());
    } else {
        args.push("-map".into());
        args.push("0:v:0".into());
        args.push("-map".into());
        args.push("0:a:0?".into());
    }

    args.push(output_path.clone().into());

    CommandPlan { args, output_path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_output_extension_follows_codec() {
        assert_eq!(
            audio_output_path(Path::new("/media/clip.mkv"), "mp3"),
            PathBuf::from("/media/clip.mp3")
        );
        assert_eq!(
            audio_output_path(Path::new("/media/clip.mkv"), "aac"),
            PathBuf::from("/media/clip.m4a")
        );
        // Unknown codecs fall back to wav.
        assert_eq!(
            audio_output_path(Path::new("/media/clip.mkv"), "ogg"),
            PathBuf::from("/media/clip.wav")
        );
    }

    #[test]
    fn video_output_gets_encoded_suffix() {
        assert_eq!(
            video_output_path(Path::new("/media/movie.avi"), ContainerOption::Mp4),
            PathBuf::from("/media/movie_encoded.mp4")
        );
        assert_eq!(
            video_output_path(Path::new("movie.avi"), ContainerOption::Mkv),
            PathBuf::from("movie_encoded.mkv")
        );
    }
}
