// ============================================================
// Layer 4 — JSONL Dataset I/O
// ============================================================
// The dataset file is newline-delimited JSON, one
// {"instruction": ..., "response": ...} object per line.
//
//   read_dataset  → strict: the first bad line aborts with its number
//   scan          → lenient: checks every line, returns a report
//   write_dataset → one compact object per line, trailing newline
//
// Blank lines are ignored everywhere (editors like to leave one
// at the end of the file). Lines are read as bytes, so a line that
// is not UTF-8 is reported on its own instead of failing the read.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    io::{BufRead, BufReader, BufWriter, Write},
    str,
    path::Path,
};

use crate::domain::record::{DatasetRecord, RecordError};

/// Result of checking every line of a dataset file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationReport {
    /// Non-blank lines seen
    pub total: usize,
    pub valid: usize,
    /// (1-based line number, reason)
    pub issues: Vec<(usize, RecordError)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty() && self.valid > 0
    }
}

/// Parse one dataset line. Blank lines are the caller's concern.
pub fn parse_line(line: &str) -> Result<DatasetRecord, RecordError> {
    DatasetRecord::from_json_line(line)
}

/// Call `f` with the 1-based number and content of every non-blank line.
fn for_each_line(
    path:  &Path,
    mut f: impl FnMut(usize, Result<&str, RecordError>) -> Result<()>,
) -> Result<()> {
    let file = fs::File::open(path)
        .with_context(|| format!("Cannot open dataset '{}'", path.display()))?;

    for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
        let raw = raw.with_context(|| format!("Cannot read '{}'", path.display()))?;
        let bytes = raw.strip_suffix(b"\r").unwrap_or(&raw);
        match str::from_utf8(bytes) {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => f(idx + 1, Ok(line))?,
            Err(e) => f(idx + 1, Err(RecordError::InvalidUtf8(e.to_string())))?,
        }
    }
    Ok(())
}

pub fn read_dataset(path: &Path) -> Result<Vec<DatasetRecord>> {
    let mut records = Vec::new();
    for_each_line(path, |line_no, line| {
        match line.and_then(parse_line) {
            Ok(record) => records.push(record),
            Err(e) => bail!("{}:{}: {}", path.display(), line_no, e),
        }
        Ok(())
    })?;

    tracing::debug!("Read {} records from '{}'", records.len(), path.display());
    Ok(records)
}

pub fn scan(path: &Path) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    for_each_line(path, |line_no, line| {
        report.total += 1;
        match line.and_then(parse_line) {
            Ok(_) => report.valid += 1,
            Err(e) => report.issues.push((line_no, e)),
        }
        Ok(())
    })?;
    Ok(report)
}

pub fn write_dataset(path: &Path, records: &[DatasetRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }

    let file = fs::File::create(path)
        .with_context(|| format!("Cannot create dataset '{}'", path.display()))?;
    let mut out = BufWriter::new(file);
    for record in records {
        writeln!(out, "{}", record.to_json_line())?;
    }
    out.flush()?;

    tracing::debug!("Wrote {} records to '{}'", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("dataset.jsonl");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dataset.jsonl");
        let records = vec![
            DatasetRecord::new("What is LoRA?", "Low-rank adaptation."),
            DatasetRecord::new("Quote \"this\"", "line one\nline two"),
        ];

        write_dataset(&path, &records).unwrap();
        let body = fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().count(), 2);
        assert!(body.ends_with('\n'));
        assert_eq!(read_dataset(&path).unwrap(), records);
    }

    #[test]
    fn test_parse_line_keeps_only_the_two_fields() {
        let record = parse_line(r#"{"instruction":"a","response":"b","source":"x.pdf"}"#).unwrap();
        assert_eq!(record, DatasetRecord::new("a", "b"));
        assert_eq!(record.to_json_line(), r#"{"instruction":"a","response":"b"}"#);
        assert_eq!(parse_line(r#"{"instruction":1,"response":"b"}"#), Err(RecordError::NotAString("instruction")));
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "\n{\"instruction\":\"a\",\"response\":\"b\"}\n\n");
        assert_eq!(read_dataset(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_read_reports_bad_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "{\"instruction\":\"a\",\"response\":\"b\"}\n{\"instruction\":\"a\"}\n",
        );
        let err = read_dataset(&path).unwrap_err().to_string();
        assert!(err.contains(":2:"), "{err}");
        assert!(err.contains("missing field 'response'"), "{err}");
    }

    #[test]
    fn test_scan_collects_every_issue() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "{\"instruction\":\"a\",\"response\":\"b\"}\nnot json\n\n[1]\n{\"instruction\":\"\",\"response\":\"b\"}\n",
        );
        let report = scan(&path).unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.valid, 1);
        let lines: Vec<usize> = report.issues.iter().map(|(n, _)| *n).collect();
        assert_eq!(lines, vec![2, 4, 5]);
        assert_eq!(report.issues[1].1, RecordError::NotAnObject);
        assert!(!report.is_ok());
    }

    #[test]
    fn test_empty_file_is_not_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "");
        let report = scan(&path).unwrap();
        assert_eq!(report.total, 0);
        assert!(!report.is_ok());
    }

    #[test]
    fn test_scan_reports_non_utf8_line_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.jsonl");
        let mut body = br#"{"instruction": "a", "response": "b"}"#.to_vec();
        body.extend_from_slice(b"\n{\"instruction\": \"caf\xff\", \"response\": \"x\"}\r\n");
        body.extend_from_slice(br#"{"instruction": "c", "response": "d"}"#);
        fs::write(&path, body).unwrap();

        let report = scan(&path).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.valid, 2);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].0, 2);
        assert!(matches!(report.issues[0].1, RecordError::InvalidUtf8(_)));

        let err = read_dataset(&path).unwrap_err().to_string();
        assert!(err.contains(":2:"), "{err}");
    }

    #[test]
    fn test_crlf_lines_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "{\"instruction\": \"a\", \"response\": \"b\"}\r\n\r\n");
        assert_eq!(read_dataset(&path).unwrap(), vec![DatasetRecord::new("a", "b")]);
    }
}
