// ============================================================
// Layer 3 — DatasetRecord Domain Type
// ============================================================
// One supervised fine-tuning example:
//
//   {"instruction": "What is LoRA?", "response": "A low-rank ..."}
//
// The dataset file holds one of these JSON objects per line.
// Extra keys are tolerated when reading (hand-curated files often
// carry notes or ids) but never written back out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const INSTRUCTION: &str = "instruction";
pub const RESPONSE: &str = "response";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub instruction: String,
    pub response:    String,
}

/// Why a single JSONL line is not a usable record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("line is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{0}' is not a string")]
    NotAString(&'static str),

    #[error("field '{0}' is empty")]
    EmptyField(&'static str),
}

impl DatasetRecord {
    pub fn new(instruction: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            response:    response.into(),
        }
    }

    /// Parse and validate one line of a dataset file.
    pub fn from_json_line(line: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| RecordError::InvalidJson(e.to_string()))?;

        let object = value.as_object().ok_or(RecordError::NotAnObject)?;

        let field = |name: &'static str| -> Result<String, RecordError> {
            let text = object
                .get(name)
                .ok_or(RecordError::MissingField(name))?
                .as_str()
                .ok_or(RecordError::NotAString(name))?;
            if text.trim().is_empty() {
                return Err(RecordError::EmptyField(name));
            }
            Ok(text.to_string())
        };

        Ok(Self {
            instruction: field(INSTRUCTION)?,
            response:    field(RESPONSE)?,
        })
    }

    /// Compact single-line JSON, the on-disk form.
    pub fn to_json_line(&self) -> String {
        // Two String fields cannot fail to serialise.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn is_valid(&self) -> bool {
        !self.instruction.trim().is_empty() && !self.response.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_valid_line() {
        let r = DatasetRecord::from_json_line(
            r#"{"instruction": "What is LoRA?", "response": "Low-rank adaptation."}"#,
        )
        .unwrap();
        assert_eq!(r.instruction, "What is LoRA?");
        assert_eq!(r.response, "Low-rank adaptation.");
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let r = DatasetRecord::from_json_line(
            r#"{"instruction": "a", "response": "b", "source": "p.pdf"}"#,
        )
        .unwrap();
        assert_eq!(r, DatasetRecord::new("a", "b"));
        assert!(!r.to_json_line().contains("source"));
    }

    #[test]
    fn test_rejects_broken_json() {
        assert!(matches!(
            DatasetRecord::from_json_line(r#"{"instruction": "a""#),
            Err(RecordError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_rejects_non_object() {
        assert_eq!(
            DatasetRecord::from_json_line(r#"["a", "b"]"#),
            Err(RecordError::NotAnObject)
        );
    }

    #[test]
    fn test_reports_missing_and_mistyped_fields() {
        assert_eq!(
            DatasetRecord::from_json_line(r#"{"instruction": "a"}"#),
            Err(RecordError::MissingField(RESPONSE))
        );
        assert_eq!(
            DatasetRecord::from_json_line(r#"{"instruction": 3, "response": "b"}"#),
            Err(RecordError::NotAString(INSTRUCTION))
        );
        assert_eq!(
            DatasetRecord::from_json_line(r#"{"instruction": "a", "response": "   "}"#),
            Err(RecordError::EmptyField(RESPONSE))
        );
    }

    #[test]
    fn test_json_line_has_no_newline() {
        let line = DatasetRecord::new("multi\nline", "x").to_json_line();
        assert!(!line.contains('\n'));
        assert_eq!(
            DatasetRecord::from_json_line(&line).unwrap().instruction,
            "multi\nline"
        );
    }
}
