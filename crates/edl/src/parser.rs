//! Line-oriented EDL parsing.
//!
//! Each line describes one cut region. The first two fields are the start and
//! end of the region; any further fields (comskip writes an action code) are
//! ignored. Fields may be separated by whitespace or commas.

use tracing::warn;

use crate::{Commercial, EdlError, Result};

/// How bare numeric fields are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EdlUnits {
    /// Bare numbers are seconds.
    #[default]
    Seconds,
    /// Bare numbers are frame indices at the given frame rate.
    Frames { fps: f64 },
}

/// Parse a single EDL line.
///
/// Returns `Ok(None)` for blank lines and `#` comments. `line_no` is 1-based
/// and only used for error reporting.
pub fn parse_line(line: &str, line_no: usize, units: EdlUnits) -> Result<Option<Commercial>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() < 2 {
        return Err(EdlError::MissingFields {
            line: line_no,
            found: fields.len(),
        });
    }

    let start = parse_time(fields[0], units).ok_or_else(|| EdlError::InvalidTime {
        line: line_no,
        value: fields[0].to_string(),
    })?;
    let end = parse_time(fields[1], units).ok_or_else(|| EdlError::InvalidTime {
        line: line_no,
        value: fields[1].to_string(),
    })?;

    if end < start {
        return Err(EdlError::InvertedRange {
            line: line_no,
            start,
            end,
        });
    }

    Ok(Some(Commercial::new(start, end)))
}

/// Parse EDL text, skipping malformed lines.
///
/// Malformed lines are logged and dropped so that one bad row from the
/// detector does not discard every other break it found.
pub fn parse_str_with(text: &str, units: EdlUnits) -> Vec<Commercial> {
    let mut commercials = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_line(line, idx + 1, units) {
            Ok(Some(commercial)) => commercials.push(commercial),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping malformed EDL line"),
        }
    }
    commercials
}

/// Parse EDL text where bare numbers are seconds.
pub fn parse_str(text: &str) -> Vec<Commercial> {
    parse_str_with(text, EdlUnits::Seconds)
}

/// Parse a time field: `HH:MM:SS[.fff]`, `MM:SS[.fff]` or a bare number.
fn parse_time(field: &str, units: EdlUnits) -> Option<f64> {
    if field.contains(':') {
        let mut total = 0.0;
        let parts: Vec<&str> = field.split(':').collect();
        if parts.len() > 3 {
            return None;
        }
        for part in parts {
            let value: f64 = part.parse().ok()?;
            if !value.is_finite() || value < 0.0 {
                return None;
            }
            total = total * 60.0 + value;
        }
        return Some(total);
    }

    let value: f64 = field.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    match units {
        EdlUnits::Seconds => Some(value),
        EdlUnits::Frames { fps } if fps > 0.0 => Some(value / fps),
        EdlUnits::Frames { .. } => None,
    }
}
