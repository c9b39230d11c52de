// Total-duration resolution, needed to turn progress timestamps into percent

use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use tracing::warn;

use super::paths::resolve_probe_tool;

fn banner_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Duration:\s*(\d{2}):(\d{2}):(\d{2}\.\d{2})").unwrap())
}

/// Parse the probe tool's bare-numeric duration output (seconds).
pub fn parse_probe_duration(output: &str) -> Option<f64> {
    output.trim().parse::<f64>().ok()
}

/// Parse the engine's free-text diagnostic banner for a
/// `Duration: HH:MM:SS.ff` marker.
pub fn parse_banner_duration(stderr: &str) -> Option<f64> {
    let caps = banner_re().captures(stderr)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Determine total media duration in seconds.
///
/// Tries the precise probe tool first, then falls back to scanning the
/// engine's own diagnostic banner. Returns `0.0` when neither works; callers
/// must treat that as "duration unknown" and abort before tracking progress.
pub fn resolve_duration(engine_path: &Path, media_path: &Path) -> f64 {
    if let Some(probe) = resolve_probe_tool(engine_path) {
        match probe_tool_duration(&probe, media_path) {
            Ok(Some(seconds)) => return seconds,
            Ok(None) => {}
            Err(err) => warn!("ffprobe duration lookup failed: {err}"),
        }
    }

    match banner_duration(engine_path, media_path) {
        Ok(Some(seconds)) => seconds,
        Ok(None) => 0.0,
        Err(err) => {
            warn!("could not get media duration: {err}");
            0.0
        }
    }
}

fn probe_tool_duration(probe: &Path, media: &Path) -> std::io::Result<Option<f64>> {
    let output = Command::new(probe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(media)
        .output()?;

    Ok(parse_probe_duration(&String::from_utf8_lossy(
        &output.stdout,
    )))
}

fn banner_duration(engine: &Path, media: &Path) -> std::io::Result<Option<f64>> {
    // `-i` with no output makes the engine print stream info to stderr and exit.
    let output = Command::new(engine)
        .args(["-hide_banner", "-i"])
        .arg(media)
        .output()?;

    Ok(parse_banner_duration(&String::from_utf8_lossy(
        &output.stderr,
    )))
}
