// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Cleans raw text pulled out of PDFs before it is curated into
// dataset records.
//
// PDF text extraction typically leaves:
//   - Form feeds (page breaks) between pages
//   - Words hyphenated across line ends ("adapt-\nation")
//   - Non-breaking / zero-width spaces and stray control chars
//   - Runs of spaces from column layout
//   - Many consecutive blank lines
//
// Cleaning steps (applied in order):
//   1. Fold \r\n to \n, then map whitespace variants to space and
//      a lone \r or form feed to \n
//   2. Re-join words split by a hyphen at the end of a line
//   3. Collapse multiple spaces and trim each line
//   4. Collapse blank-line runs to a single blank line
//
// Reference: Rust Book §8 (Strings in Rust)

use crate::data::loader::PAGE_BREAK;

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, text: &str) -> String {
        // ── Step 1: Normalise individual characters ───────────────────────────
        let step1: String = text
            .replace("\r\n", "\n")
            .chars()
            .map(|c| match c {
                '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                '\r' => '\n',
                c if c == PAGE_BREAK => '\n',
                c if c.is_control() && c != '\n' => ' ',
                c => c,
            })
            .collect();

        // ── Step 2: Undo end-of-line hyphenation ─────────────────────────────
        let step2 = join_hyphenated(&step1);

        // ── Step 3: Clean each line individually ─────────────────────────────
        let step3: String = step2
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n");

        // ── Step 4: Collapse excessive blank lines ────────────────────────────
        // At most 2 consecutive newlines (one blank line) survive.
        let mut result = String::with_capacity(step3.len());
        let mut newline_count = 0usize;
        for c in step3.chars() {
            if c == '\n' {
                newline_count += 1;
                if newline_count <= 2 {
                    result.push(c);
                }
            } else {
                newline_count = 0;
                result.push(c);
            }
        }

        result.trim().to_string()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Glue a word split across a line break back together:
/// "small adap-\ntation" → "small\nadaptation". Only applies when a
/// letter precedes the hyphen and the next line starts lowercase.
fn join_hyphenated(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut carry = String::new();

    for (i, raw) in lines.iter().enumerate() {
        let current = if carry.is_empty() {
            raw.to_string()
        } else {
            format!("{carry}{}", raw.trim_start())
        };
        carry.clear();

        let trimmed = current.trim_end();
        let next_starts_lower = lines
            .get(i + 1)
            .and_then(|n| n.trim_start().chars().next())
            .map_or(false, |c| c.is_lowercase());
        let hyphen_after_letter = trimmed
            .strip_suffix('-')
            .and_then(|head| head.chars().last())
            .map_or(false, |c| c.is_alphabetic());

        if hyphen_after_letter && next_starts_lower {
            let head = &trimmed[..trimmed.len() - 1];
            let split_at = head.rfind(' ').map_or(0, |p| p + 1);
            carry = head[split_at..].to_string();
            let rest = head[..split_at].trim_end();
            if !rest.is_empty() {
                out.push(rest.to_string());
            }
        } else {
            out.push(current);
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hello world  "), "hello world");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_page_break_becomes_paragraph_break() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("end of page\n\u{000C}\nnext page"), "end of page\n\nnext page");
    }

    #[test]
    fn test_rejoins_hyphenated_words() {
        let p = Preprocessor::new();
        assert_eq!(
            p.clean("trains small adap-\ntation matrices"),
            "trains small\nadaptation matrices"
        );
    }

    #[test]
    fn test_keeps_real_hyphens() {
        let p = Preprocessor::new();
        // Next line starts uppercase: a list or heading, not a split word.
        assert_eq!(p.clean("Step-\nTwo"), "Step-\nTwo");
        assert_eq!(p.clean("low-rank update"), "low-rank update");
    }

    #[test]
    fn test_collapses_blank_lines() {
        let p = Preprocessor::new();
        let output = p.clean("line1\n\n\n\n\nline2");
        assert_eq!(output, "line1\n\nline2");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }

    #[test]
    fn test_crlf_is_a_single_line_break() {
        let p = Preprocessor::new();
        assert_eq!(
            p.clean("Adapter Weights\r\nThe trained matrices.\r\n\r\nNext"),
            "Adapter Weights\nThe trained matrices.\n\nNext"
        );
        // A lone carriage return still ends a line.
        assert_eq!(p.clean("old mac\rline"), "old mac\nline");
    }
}
