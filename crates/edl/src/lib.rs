//! Edit decision list (EDL) support for commercial detection output.
//!
//! Commercial detectors such as comskip write one cut region per line:
//!
//! ```text
//! 60.00   90.00   0
//! 600.00  645.00  0
//! ```
//!
//! This crate reads those files into [`Commercial`] values and writes them
//! back in the same tab-separated form.

mod error;
mod parser;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::{EdlError, Result};
pub use parser::{EdlUnits, parse_line, parse_str, parse_str_with};

/// One detected commercial break, in seconds from the start of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Commercial {
    pub start: f64,
    pub end: f64,
}

impl Commercial {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length of the break in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Read an EDL file.
///
/// A missing file means the detector found nothing and yields an empty list.
pub fn read_file(path: &Path, units: EdlUnits) -> Result<Vec<Commercial>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_str_with(&text, units)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Render commercials as EDL text (`start<TAB>end<TAB>0` per line).
pub fn to_edl_string(commercials: &[Commercial]) -> String {
    let mut out = String::with_capacity(commercials.len() * 24);
    for c in commercials {
        out.push_str(&format!("{:.2}\t{:.2}\t0\n", c.start, c.end));
    }
    out
}

/// Write commercials to an EDL file.
pub fn write_file(path: &Path, commercials: &[Commercial]) -> Result<()> {
    std::fs::write(path, to_edl_string(commercials))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_preserves_segments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("show.edl");
        let commercials = vec![
            Commercial::new(0.0, 12.5),
            Commercial::new(300.25, 421.0),
            Commercial::new(1800.0, 1950.75),
        ];

        write_file(&path, &commercials).unwrap();
        let parsed = read_file(&path, EdlUnits::Seconds).unwrap();

        assert_eq!(parsed, commercials);
    }

    #[test]
    fn empty_file_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.edl");
        std::fs::write(&path, "").unwrap();

        assert!(read_file(&path, EdlUnits::Seconds).unwrap().is_empty());
    }

    #[test]
    fn missing_file_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let parsed = read_file(&dir.path().join("absent.edl"), EdlUnits::Seconds).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn commercial_duration() {
        assert_eq!(Commercial::new(600.0, 645.0).duration(), 45.0);
    }
}
