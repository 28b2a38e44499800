// ============================================================
// Layer 4 — Dataset Curator
// ============================================================
// Turns cleaned document text into instruction/response records.
// This is the scripted half of curation; the resulting JSONL is
// meant to be reviewed and edited by hand before training.
//
// Two strategies:
//
//   Headings — section headings become questions, the section
//              body becomes the answer:
//                "Adapter Weights\nThe trained matrices are ..."
//                → {"instruction": "Explain Adapter Weights.",
//                   "response": "The trained matrices are ..."}
//
//   Passages — text is cut into word windows; the first sentence
//              of a window is the prompt and the rest of the window
//              is the continuation to learn.
//
// Records whose response is shorter than `min_words` are dropped,
// responses are cut at `max_words`, and a repeated instruction
// keeps only its first record.

use std::collections::HashSet;

use crate::data::chunker::Chunker;
use crate::domain::document::Document;
use crate::domain::record::DatasetRecord;

const MAX_HEADING_WORDS: usize = 8;
const MAX_HEADING_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Headings,
    Passages,
}

pub struct Curator {
    strategy:  Strategy,
    min_words: usize,
    max_words: usize,
}

impl Curator {
    pub fn new(strategy: Strategy, min_words: usize, max_words: usize) -> Self {
        Self {
            strategy,
            min_words,
            max_words: max_words.max(min_words).max(2),
        }
    }

    /// Curate one cleaned document. Order follows the text.
    pub fn curate(&self, doc: &Document) -> Vec<DatasetRecord> {
        let candidates = match self.strategy {
            Strategy::Headings => self.from_headings(&doc.text),
            Strategy::Passages => self.from_passages(doc),
        };

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(DatasetRecord::is_valid)
            .filter(|r| r.response.split_whitespace().count() >= self.min_words)
            .filter(|r| seen.insert(r.instruction.clone()))
            .collect()
    }

    fn from_headings(&self, text: &str) -> Vec<DatasetRecord> {
        let mut records = Vec::new();
        let mut section: Option<(String, Vec<String>)> = None;
        let text = text.replace("\r\n", "\n");

        for paragraph in text.split("\n\n") {
            let lines: Vec<&str> = paragraph.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
            let Some(first) = lines.first() else { continue };

            let continues = lines.get(1).map_or(false, |next| starts_lowercase(next));
            if is_heading(first) && !continues {
                if let Some((heading, body)) = section.take() {
                    records.extend(self.section_record(&heading, &body));
                }
                section = Some((first.to_string(), lines[1..].iter().map(|l| l.to_string()).collect()));
            } else if let Some((_, body)) = section.as_mut() {
                body.extend(lines.iter().map(|l| l.to_string()));
            }
            // Text before the first heading has nothing to be asked about.
        }

        if let Some((heading, body)) = section {
            records.extend(self.section_record(&heading, &body));
        }
        records
    }

    fn section_record(&self, heading: &str, body: &[String]) -> Option<DatasetRecord> {
        let response = self.truncate(&body.join(" "));
        if response.is_empty() {
            return None;
        }
        let topic = heading.trim_end_matches(':').trim();
        Some(DatasetRecord::new(format!("Explain {topic}."), response))
    }

    fn from_passages(&self, doc: &Document) -> Vec<DatasetRecord> {
        let overlap = self.max_words / 4;
        let chunker = Chunker::new(self.max_words, overlap);

        chunker
            .chunk(&doc.text)
            .iter()
            .filter_map(|window| {
                let (first, rest) = split_first_sentence(window)?;
                Some(DatasetRecord::new(
                    format!("Continue the passage from {}: {}", doc.stem(), first),
                    rest,
                ))
            })
            .collect()
    }

    fn truncate(&self, text: &str) -> String {
        text.split_whitespace()
            .take(self.max_words)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn starts_lowercase(s: &str) -> bool {
    s.chars().next().map_or(false, char::is_lowercase)
}

/// Short, capitalised, has letters, and does not end like a sentence.
fn is_heading(line: &str) -> bool {
    let words = line.split_whitespace().count();
    let starts_ok = line
        .chars()
        .next()
        .map_or(false, |c| c.is_uppercase() || c.is_ascii_digit());
    let ends_ok = line
        .chars()
        .last()
        .map_or(false, |c| !matches!(c, '.' | ',' | ';' | '!' | '?' | '-'));

    (1..=MAX_HEADING_WORDS).contains(&words)
        && line.chars().count() <= MAX_HEADING_CHARS
        && starts_ok
        && ends_ok
        && line.chars().any(char::is_alphabetic)
}

/// Split a window after its first sentence terminator that is followed
/// by whitespace. Both halves must be non-empty.
fn split_first_sentence(text: &str) -> Option<(String, String)> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        let terminator = matches!(b, b'.' | b'?' | b'!');
        let followed_by_space = bytes.get(i + 1).map_or(false, |n| n.is_ascii_whitespace());
        if terminator && followed_by_space {
            let first = text[..=i].trim();
            let rest = text[i + 1..].trim();
            if first.is_empty() || rest.is_empty() {
                return None;
            }
            return Some((first.to_string(), rest.to_string()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANDBOOK: &str = "Preface text without a heading.\n\n\
        Adapter Weights\n\
        The trained low-rank matrices are saved separately\n\
        from the frozen base model.\n\n\
        They are small enough to share.\n\n\
        Serving:\n\
        A Modelfile names the base model and the adapter path.\n\n\
        12\n\n\
        Summary\n\
        Too short.";

    #[test]
    fn test_headings_become_questions() {
        let curator = Curator::new(Strategy::Headings, 3, 100);
        let records = curator.curate(&Document::new("handbook.pdf", HANDBOOK));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].instruction, "Explain Adapter Weights.");
        assert_eq!(
            records[0].response,
            "The trained low-rank matrices are saved separately from the frozen base model. They are small enough to share."
        );
        assert_eq!(records[1].instruction, "Explain Serving.");
        // A bare page number is body text, not a heading.
        assert!(records[1].response.ends_with("adapter path. 12"));
        // "Summary" is dropped: its body is under min_words.
    }

    #[test]
    fn test_wrapped_sentence_is_not_a_heading() {
        let text = "Training Notes\nBody line one here.\n\nThe adapter is trained\nusing only the response tokens.";
        let curator = Curator::new(Strategy::Headings, 1, 100);
        let records = curator.curate(&Document::new("n.txt", text));
        assert_eq!(records.len(), 1);
        assert!(records[0].response.ends_with("using only the response tokens."));
    }

    #[test]
    fn test_headings_truncate_long_bodies() {
        let text = format!("Topic\n{}", vec!["Token"; 50].join(" "));
        let curator = Curator::new(Strategy::Headings, 1, 10);
        let records = curator.curate(&Document::new("t.txt", text));
        assert_eq!(records[0].response.split_whitespace().count(), 10);
    }

    #[test]
    fn test_passages_split_on_first_sentence() {
        let text = "LoRA freezes the base model. It trains two small matrices per layer. The product is added to the frozen weight.";
        let curator = Curator::new(Strategy::Passages, 3, 64);
        let records = curator.curate(&Document::new("lora.pdf", text));

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].instruction,
            "Continue the passage from lora: LoRA freezes the base model."
        );
        assert!(records[0].response.starts_with("It trains two small matrices"));
    }

    #[test]
    fn test_duplicate_instructions_are_dropped() {
        let text = "Setup\nInstall the serving tool first.\n\nSetup\nThen pull the base model.";
        let curator = Curator::new(Strategy::Headings, 1, 100);
        let records = curator.curate(&Document::new("d.txt", text));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].response, "Install the serving tool first.");
    }

    #[test]
    fn test_split_first_sentence_needs_both_halves() {
        assert_eq!(split_first_sentence("No terminator here"), None);
        assert_eq!(split_first_sentence("Only one sentence. "), None);
        assert_eq!(
            split_first_sentence("Version 3.2 works. Yes."),
            Some(("Version 3.2 works.".to_string(), "Yes.".to_string()))
        );
    }

    #[test]
    fn test_crlf_text_curates_like_lf_text() {
        let lf = "Training Notes\nBody line one here.\n\nThe adapter is trained\nusing only the response tokens.";
        let crlf = lf.replace('\n', "\r\n");
        let curator = Curator::new(Strategy::Headings, 1, 100);

        let from_lf = curator.curate(&Document::new("n.txt", lf));
        let from_crlf = curator.curate(&Document::new("n.txt", crlf));
        assert_eq!(from_crlf, from_lf);
        assert_eq!(from_crlf.len(), 1);

        // Through the cleaner as well, the way `curate` reads text files.
        let cleaned = crate::data::preprocessor::Preprocessor::new().clean(&lf.replace('\n', "\r\n"));
        assert_eq!(curator.curate(&Document::new("n.txt", cleaned)), from_lf);
    }
}
