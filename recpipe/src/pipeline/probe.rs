//! Media facts recovered from tool output.

use std::sync::OnceLock;

use regex::Regex;

static DURATION: OnceLock<Regex> = OnceLock::new();

/// Find the first `Duration: HH:MM:SS.xx` in `lines` and return it in seconds.
pub fn parse_duration<S: AsRef<str>>(lines: &[S]) -> Option<f64> {
    let re = DURATION.get_or_init(|| {
        Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap()
    });

    lines.iter().find_map(|line| {
        let caps = re.captures(line.as_ref())?;
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    })
}
