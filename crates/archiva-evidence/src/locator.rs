//! Streaming lookup of an object's record in a secure export.
//!
//! Exports can cover very large collections, so records are parsed one line
//! at a time and the scan stops at the first match.

use crate::model::CheckFailure;
use archiva_core::{MetadataType, TraceabilitySecureRecord};
use std::io::BufRead;

pub const RECORD_NOT_FOUND: &str = "Could not find matching traceability info in the file";

/// Lazy sequence of the records of an NDJSON export. Blank lines are skipped.
pub struct SecureRecords<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl<R: BufRead> SecureRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for SecureRecords<R> {
    type Item = Result<TraceabilitySecureRecord, CheckFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(CheckFailure::fatal(format!(
                        "Could not read secure export: {e}"
                    ))))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|e| {
                CheckFailure::fatal(format!(
                    "Invalid traceability record at line {}: {e}",
                    self.line_number
                ))
            }));
        }
    }
}

/// First record of `reader` matching `(id, object_type)`.
pub fn locate<R: BufRead>(
    reader: R,
    object_type: MetadataType,
    id: &str,
) -> Result<TraceabilitySecureRecord, CheckFailure> {
    for record in SecureRecords::new(reader) {
        let record = record?;
        if record.matches(object_type, id) {
            return Ok(record);
        }
    }
    Err(CheckFailure::ko(RECORD_NOT_FOUND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiva_core::EvidenceStatus;
    use std::io::Cursor;

    fn record_line(id: &str, kind: &str) -> String {
        format!(
            r#"{{"lfcId":"{id}","metadataType":"{kind}","version":1,"hashMetadata":"m","hashLFC":"l","hashGlobalFromStorage":"g"}}"#
        )
    }

    #[test]
    fn first_match_wins_and_blank_lines_are_skipped() {
        let input = format!(
            "{}\n\n{}\n{}\n",
            record_line("u1", "UNIT"),
            record_line("x", "OBJECTGROUP"),
            record_line("x", "UNIT")
        );
        let record = locate(Cursor::new(input), MetadataType::ObjectGroup, "x").unwrap();
        assert_eq!(record.metadata_type, MetadataType::ObjectGroup);
    }

    #[test]
    fn exhausted_input_is_ko() {
        let input = format!("{}\n", record_line("u1", "UNIT"));
        let failure = locate(Cursor::new(input), MetadataType::Unit, "X").unwrap_err();
        assert_eq!(failure.status, EvidenceStatus::Ko);
        assert_eq!(failure.message, RECORD_NOT_FOUND);
    }

    #[test]
    fn unparsable_line_is_fatal() {
        let input = "not json\n".to_string();
        let failure = locate(Cursor::new(input), MetadataType::Unit, "u1").unwrap_err();
        assert_eq!(failure.status, EvidenceStatus::Fatal);
    }

    #[test]
    fn scan_stops_at_the_match() {
        let input = format!("{}\nnot json\n", record_line("u1", "UNIT"));
        assert!(locate(Cursor::new(input), MetadataType::Unit, "u1").is_ok());
    }
}
