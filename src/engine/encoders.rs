// Encoder capability probing and hardware-first encoder selection

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Hardware H.264 encoders in priority order (Quick Sync first).
const H264_HW_PRIORITY: [&str; 5] = [
    "h264_qsv",
    "h264_nvenc",
    "h264_amf",
    "h264_vaapi",
    "h264_v4l2m2m",
];

/// Hardware HEVC encoders, same vendor order.
const HEVC_HW_PRIORITY: [&str; 5] = [
    "hevc_qsv",
    "hevc_nvenc",
    "hevc_amf",
    "hevc_vaapi",
    "hevc_v4l2m2m",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    H264,
    Hevc,
}

/// Video encoder selection as exposed to the caller. `Auto` is resolved
/// against the probed capability set; every other variant passes through
/// literally as the ffmpeg encoder identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum VideoEncoderOption {
    #[default]
    Auto,
    Libx264,
    Libx265,
    H264Nvenc,
    HevcNvenc,
    H264Amf,
    HevcAmf,
    H264Qsv,
    HevcQsv,
}

impl VideoEncoderOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Libx264 => "libx264",
            Self::Libx265 => "libx265",
            Self::H264Nvenc => "h264_nvenc",
            Self::HevcNvenc => "hevc_nvenc",
            Self::H264Amf => "h264_amf",
            Self::HevcAmf => "hevc_amf",
            Self::H264Qsv => "h264_qsv",
            Self::HevcQsv => "hevc_qsv",
        }
    }
}

fn encoder_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // One line per encoder: a 6-character capability field with the video flag
    // first, whitespace, then the encoder identifier.
    RE.get_or_init(|| Regex::new(r"V.....\s+([a-zA-Z0-9_]+)").unwrap())
}

/// Extract every video encoder identifier from `ffmpeg -encoders` output.
pub fn parse_encoder_list(output: &str) -> BTreeSet<String> {
    encoder_line_re()
        .captures_iter(output)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// The engine's compiled-in encoder set, discovered once per engine path.
///
/// Probing is idempotent: after a successful enumeration further calls are
/// no-ops until [`set_engine_path`](Self::set_engine_path) re-points the
/// engine. A failed enumeration leaves the flag clear so a retry is allowed.
#[derive(Debug, Default)]
pub struct EncoderCapabilities {
    engine_path: Option<PathBuf>,
    encoders: BTreeSet<String>,
    probed: bool,
}

impl EncoderCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-point the engine; invalidates the capability set.
    pub fn set_engine_path(&mut self, path: &Path) {
        if self.engine_path.as_deref() != Some(path) {
            self.engine_path = Some(path.to_path_buf());
            self.encoders.clear();
            self.probed = false;
        }
    }

    pub fn is_probed(&self) -> bool {
        self.probed
    }

    pub fn contains(&self, encoder: &str) -> bool {
        self.encoders.contains(encoder)
    }

    pub fn encoders(&self) -> impl Iterator<Item = &str> {
        self.encoders.iter().map(String::as_str)
    }

    /// Probe the engine's encoder list, if not already done for this path.
    pub fn ensure_probed(&mut self, engine_path: &Path) {
        self.set_engine_path(engine_path);
        let engine = engine_path.to_path_buf();
        self.ensure_probed_with(move || list_encoders(&engine));
    }

    /// Same as [`ensure_probed`](Self::ensure_probed) with an injectable
    /// enumeration, so idempotence is testable without a real engine.
    pub fn ensure_probed_with<F>(&mut self, enumerate: F)
    where
        F: FnOnce() -> Result<String>,
    {
        if self.probed {
            return;
        }

        match enumerate() {
            Ok(output) => {
                self.encoders = parse_encoder_list(&output);
                self.probed = true;
                debug!(count = self.encoders.len(), "probed engine encoders");
            }
            Err(err) => {
                // Leave `probed` clear so a later call may retry.
                self.encoders.clear();
                warn!("could not probe encoders: {err:#}");
            }
        }
    }
}

fn list_encoders(engine_path: &Path) -> Result<String> {
    let output = Command::new(engine_path)
        .args(["-hide_banner", "-encoders"])
        .output()
        .with_context(|| format!("failed to run {}", engine_path.display()))?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Resolve an encoder choice to a concrete ffmpeg encoder identifier.
pub fn resolve_encoder(choice: VideoEncoderOption, caps: &EncoderCapabilities) -> String {
    match choice {
        VideoEncoderOption::Auto => auto_encoder(caps),
        other => other.as_str().to_string(),
    }
}

/// The `Auto` walk: H.264 hardware first, then software H.264, then the HEVC
/// hardware list, then software HEVC. `libx264` is the ultimate default when
/// nothing matched (including an unprobed or empty capability set).
fn auto_encoder(caps: &EncoderCapabilities) -> String {
    for enc in H264_HW_PRIORITY {
        if caps.contains(enc) {
            return enc.to_string();
        }
    }
    if caps.contains("libx264") {
        return "libx264".to_string();
    }

    for enc in HEVC_HW_PRIORITY {
        if caps.contains(enc) {
            return enc.to_string();
        }
    }
    if caps.contains("libx265") {
        return "libx265".to_string();
    }

    "libx264".to_string()
}

/// Best available hardware encoder for a codec family, or `None` when only
/// software is present. Drives selection hints, never command construction.
pub fn best_hardware_encoder(
    family: CodecFamily,
    caps: &EncoderCapabilities,
) -> Option<&'static str> {
    let priority = match family {
        CodecFamily::H264 => &H264_HW_PRIORITY,
        CodecFamily::Hevc => &HEVC_HW_PRIORITY,
    };
    priority.iter().copied().find(|enc| caps.contains(enc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const SAMPLE_ENCODERS: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libx265              libx265 H.265 / HEVC
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder
 V....D h264_qsv             H.264 / AVC (Intel Quick Sync Video)
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3)
";

    fn caps_with(encoders: &[&str]) -> EncoderCapabilities {
        let mut caps = EncoderCapabilities::new();
        let listing: String = encoders
            .iter()
            .map(|e| format!(" V....D {e:<20} test\n"))
            .collect();
        caps.ensure_probed_with(|| Ok(listing));
        caps
    }

    #[test]
    fn parses_video_encoders_only() {
        let set = parse_encoder_list(SAMPLE_ENCODERS);
        assert!(set.contains("libx264"));
        assert!(set.contains("h264_nvenc"));
        assert!(set.contains("h264_qsv"));
        assert!(!set.contains("aac"));
        assert!(!set.contains("libmp3lame"));
    }

    #[test]
    fn auto_prefers_quicksync_over_nvenc_and_software() {
        let caps = caps_with(&["h264_qsv", "h264_nvenc", "libx264"]);
        assert_eq!(resolve_encoder(VideoEncoderOption::Auto, &caps), "h264_qsv");
    }

    #[test]
    fn auto_falls_back_to_software() {
        let caps = caps_with(&["libx264"]);
        assert_eq!(resolve_encoder(VideoEncoderOption::Auto, &caps), "libx264");
    }

    #[test]
    fn auto_tries_hevc_before_defaulting() {
        let caps = caps_with(&["hevc_vaapi"]);
        assert_eq!(
            resolve_encoder(VideoEncoderOption::Auto, &caps),
            "hevc_vaapi"
        );

        let empty = caps_with(&[]);
        assert_eq!(resolve_encoder(VideoEncoderOption::Auto, &empty), "libx264");
    }

    #[test]
    fn explicit_choice_passes_through() {
        let caps = caps_with(&["h264_qsv"]);
        assert_eq!(
            resolve_encoder(VideoEncoderOption::HevcNvenc, &caps),
            "hevc_nvenc"
        );
    }

    #[test]
    fn best_hardware_ignores_software() {
        let caps = caps_with(&["libx264", "libx265", "hevc_amf"]);
        assert_eq!(best_hardware_encoder(CodecFamily::H264, &caps), None);
        assert_eq!(
            best_hardware_encoder(CodecFamily::Hevc, &caps),
            Some("hevc_amf")
        );
    }

    #[test]
    fn probing_is_idempotent_until_path_changes() {
        let calls = Cell::new(0u32);
        let enumerate = || {
            calls.set(calls.get() + 1);
            Ok(SAMPLE_ENCODERS.to_string())
        };

        let mut caps = EncoderCapabilities::new();
        caps.set_engine_path(Path::new("/opt/ffmpeg/bin/ffmpeg"));
        caps.ensure_probed_with(enumerate);
        caps.ensure_probed_with(|| {
            calls.set(calls.get() + 1);
            Ok(SAMPLE_ENCODERS.to_string())
        });
        assert_eq!(calls.get(), 1);

        // Re-pointing the engine invalidates the set and allows re-probing.
        caps.set_engine_path(Path::new("/usr/bin/ffmpeg"));
        assert!(!caps.is_probed());
        caps.ensure_probed_with(|| {
            calls.set(calls.get() + 1);
            Ok(SAMPLE_ENCODERS.to_string())
        });
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn failed_probe_leaves_retry_open() {
        let mut caps = EncoderCapabilities::new();
        caps.ensure_probed_with(|| anyhow::bail!("spawn failed"));
        assert!(!caps.is_probed());
        assert_eq!(caps.encoders().count(), 0);

        caps.ensure_probed_with(|| Ok(SAMPLE_ENCODERS.to_string()));
        assert!(caps.is_probed());
        assert!(caps.contains("libx265"));
    }
}
