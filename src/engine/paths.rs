// Locating the ffmpeg/ffprobe executables

use std::path::{Path, PathBuf};

#[cfg(windows)]
pub const ENGINE_BINARY: &str = "ffmpeg.exe";
#[cfg(not(windows))]
pub const ENGINE_BINARY: &str = "ffmpeg";

#[cfg(windows)]
pub const PROBE_BINARY: &str = "ffprobe.exe";
#[cfg(not(windows))]
pub const PROBE_BINARY: &str = "ffprobe";

/// Directory the running executable lives in.
fn app_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Resolve the ffmpeg executable.
///
/// Search order: the explicit candidate if it exists, `ffmpeg` next to our own
/// binary, then a bundled `ffmpeg/bin/ffmpeg` subdirectory. `None` means "not
/// installed here" and is a recoverable configuration state, not an error.
pub fn resolve_engine(candidate: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = candidate {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
    }

    let app = app_dir()?;

    let local = app.join(ENGINE_BINARY);
    if local.is_file() {
        return Some(local);
    }

    let bundle = app.join("ffmpeg").join("bin").join(ENGINE_BINARY);
    if bundle.is_file() {
        return Some(bundle);
    }

    None
}

/// Resolve the ffprobe executable, preferring a sibling of the resolved engine
/// and falling back to the same application-relative locations as
/// [`resolve_engine`].
pub fn resolve_probe_tool(engine_path: &Path) -> Option<PathBuf> {
    if let Some(dir) = engine_path.parent() {
        let sibling = dir.join(PROBE_BINARY);
        if sibling.is_file() {
            return Some(sibling);
        }
    }

    let app = app_dir()?;

    let local = app.join(PROBE_BINARY);
    if local.is_file() {
        return Some(local);
    }

    let bundle = app.join("ffmpeg").join("bin").join(PROBE_BINARY);
    if bundle.is_file() {
        return Some(bundle);
    }

    None
}
