// Parsing of the engine's key=value progress stream

/// One parsed unit of progress derived from a streamed `out_time_us=` line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSample {
    /// Media time encoded so far, in seconds.
    pub elapsed_s: f64,
    /// Percent of the total duration. Not guaranteed monotonic if the engine
    /// emits out-of-order timestamps.
    pub percent: f64,
    /// `HH:MM:SS` of media time remaining; absent until percent > 0.
    pub eta: Option<String>,
}

/// Parse a single progress line against the known total duration.
///
/// Only `out_time_us=<integer microseconds>` is consumed; `N/A` means "no
/// sample yet" and every other key is ignored. `total_duration_s` must be
/// positive (callers abort runs with unknown duration before starting).
pub fn sample_from_line(line: &str, total_duration_s: f64) -> Option<ProgressSample> {
    let value = line.strip_prefix("out_time_us=")?.trim();
    if value == "N/A" {
        return None;
    }
    let out_time_us: f64 = value.parse().ok()?;

    let elapsed_s = out_time_us / 1_000_000.0;
    let percent = (elapsed_s / total_duration_s) * 100.0;

    let eta = if percent > 0.0 {
        Some(format_eta(total_duration_s - elapsed_s))
    } else {
        None
    };

    Some(ProgressSample {
        elapsed_s,
        percent,
        eta,
    })
}

/// Format remaining media seconds as `HH:MM:SS`, clamped at zero.
pub fn format_eta(remaining_s: f64) -> String {
    let total = remaining_s.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_percent_of_ten_seconds() {
        let sample = sample_from_line("out_time_us=5000000", 10.0).unwrap();
        assert_eq!(sample.elapsed_s, 5.0);
        assert_eq!(sample.percent, 50.0);
        assert_eq!(sample.eta.as_deref(), Some("00:00:05"));
    }

    #[test]
    fn not_available_is_skipped() {
        assert_eq!(sample_from_line("out_time_us=N/A", 10.0), None);
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(sample_from_line("fps=30.0", 10.0), None);
        assert_eq!(sample_from_line("progress=continue", 10.0), None);
        assert_eq!(sample_from_line("frame=100", 10.0), None);
    }

    #[test]
    fn zero_elapsed_has_no_eta() {
        let sample = sample_from_line("out_time_us=0", 10.0).unwrap();
        assert_eq!(sample.percent, 0.0);
        assert_eq!(sample.eta, None);
    }

    #[test]
    fn eta_never_goes_negative() {
        // Engine ran past the probed duration; clamp rather than underflow.
        let sample = sample_from_line("out_time_us=12000000", 10.0).unwrap();
        assert!(sample.percent > 100.0);
        assert_eq!(sample.eta.as_deref(), Some("00:00:00"));
    }

    #[test]
    fn eta_formats_hours() {
        assert_eq!(format_eta(5415.5), "01:30:15");
    }
}
