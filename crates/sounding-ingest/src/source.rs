//! A minimal line-oriented sounding source.
//!
//! Each non-blank, non-`#`-prefixed line is eight or nine whitespace-
//! separated fields:
//!
//! ```text
//! east north depth depth_variance along_track_variance across_track_variance beam_angle_deg timestamp_seconds [backscatter]
//! ```

use std::io::BufRead;

use mapsheet_common::Timestamp;
use mapsheet_core::Sounding;

use crate::error::{IngestError, Result};

/// Parses one sounding record from a single line. `line_no` is 1-based,
/// used only to annotate a parse error.
pub fn parse_line(line: &str, line_no: usize) -> Result<Sounding> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 8 && fields.len() != 9 {
        return Err(IngestError::MalformedRecord {
            line: line_no,
            reason: format!("expected 8 or 9 fields, found {}", fields.len()),
        });
    }

    let field = |idx: usize| -> Result<f64> {
        fields[idx].parse::<f64>().map_err(|e| IngestError::MalformedRecord {
            line: line_no,
            reason: format!("field {idx}: {e}"),
        })
    };

    let backscatter = if fields.len() == 9 {
        Some(
            fields[8]
                .parse::<u16>()
                .map_err(|e| IngestError::MalformedRecord {
                    line: line_no,
                    reason: format!("backscatter field: {e}"),
                })?,
        )
    } else {
        None
    };

    Ok(Sounding {
        east: field(0)?,
        north: field(1)?,
        depth: field(2)? as f32,
        depth_variance: field(3)? as f32,
        along_track_variance: field(4)? as f32,
        across_track_variance: field(5)? as f32,
        beam_angle_deg: field(6)? as f32,
        timestamp: Timestamp::new(field(7)?),
        backscatter,
    })
}

/// A streaming iterator over sounding records read from `r`, skipping
/// blank lines and `#` comments. Reads one line at a time; a multi-
/// gigabyte sounding file never has to fit in memory at once.
pub struct SoundingLines<R: BufRead> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> SoundingLines<R> {
    pub fn new(r: R) -> Self {
        Self {
            lines: r.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for SoundingLines<R> {
    type Item = Result<Sounding>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.lines.next()?;
            self.line_no += 1;
            let line = match raw {
                Ok(l) => l,
                Err(e) => return Some(Err(IngestError::Source(e))),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some(parse_line(trimmed, self.line_no));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_eight_field_record_without_backscatter() {
        let s = parse_line("100.0 200.0 42.5 1.0 0.0 0.0 3.0 17.0", 1).unwrap();
        assert_eq!(s.east, 100.0);
        assert_eq!(s.depth, 42.5);
        assert_eq!(s.backscatter, None);
    }

    #[test]
    fn parses_nine_field_record_with_backscatter() {
        let s = parse_line("100.0 200.0 42.5 1.0 0.0 0.0 3.0 17.0 250", 1).unwrap();
        assert_eq!(s.backscatter, Some(250));
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(parse_line("1.0 2.0", 1).is_err());
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let text = "# header comment\n\n100.0 200.0 42.5 1.0 0.0 0.0 3.0 17.0\n";
        let cursor = Cursor::new(text.as_bytes());
        let records: Vec<_> = SoundingLines::new(cursor).collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_ok());
    }
}
