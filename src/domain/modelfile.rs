// ============================================================
// Layer 3 — Modelfile
// ============================================================
// The serving tool's declarative model configuration. One
// directive per line, keyword first:
//
//   # comments start with a hash
//   FROM llama3.2:3b
//   ADAPTER ./adapter_model
//   PARAMETER temperature 0.7
//   PARAMETER top_p 0.9
//   SYSTEM """You answer questions about the handbook.
//   Be brief."""
//
// Values are the rest of the line, a "double-quoted" string, or a
// """triple-quoted""" block that may span several lines.
// Keywords are case-insensitive. Exactly one FROM is required.
//
// Rendering with Display produces text that parses back to the
// same directives. The format has no escapes, so a value that no
// quoting form can carry (a multi-line value containing """ or
// ending in a quote, or one with a carriage return) fails validate.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    From(String),
    Adapter(String),
    Parameter { name: String, value: String },
    System(String),
    Template(String),
    License(String),
    Message { role: String, content: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelfileError {
    #[error("line {line}: unknown directive '{keyword}'")]
    UnknownDirective { line: usize, keyword: String },

    #[error("line {line}: {keyword} needs {expected}")]
    MissingArgument { line: usize, keyword: String, expected: &'static str },

    #[error("line {line}: unterminated triple-quoted value")]
    UnterminatedQuote { line: usize },

    #[error("Modelfile has no FROM directive")]
    MissingFrom,

    #[error("Modelfile has more than one FROM directive")]
    DuplicateFrom,

    #[error("{keyword} value cannot be written to a Modelfile: {value:?}")]
    Unrenderable { keyword: &'static str, value: String },

    #[error("parameter '{name}' has invalid value '{value}': {reason}")]
    InvalidParameter { name: String, value: String, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modelfile {
    directives: Vec<Directive>,
}

impl Modelfile {
    /// Start a Modelfile on top of the given base model.
    pub fn new(base: impl Into<String>) -> Self {
        Self { directives: vec![Directive::From(base.into())] }
    }

    pub fn with_adapter(mut self, path: impl Into<String>) -> Self {
        self.directives.push(Directive::Adapter(path.into()));
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.directives.push(Directive::Parameter {
            name:  name.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.directives.push(Directive::System(prompt.into()));
        self
    }

    pub fn base(&self) -> &str {
        self.directives
            .iter()
            .find_map(|d| match d {
                Directive::From(base) => Some(base.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn adapter(&self) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            Directive::Adapter(path) => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn system(&self) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            Directive::System(prompt) => Some(prompt.as_str()),
            _ => None,
        })
    }

    /// Last value wins when a parameter is repeated, except for
    /// multi-valued ones like `stop`, which callers read with
    /// `parameters`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters(name).last().copied()
    }

    pub fn parameters(&self, name: &str) -> Vec<&str> {
        self.directives
            .iter()
            .filter_map(|d| match d {
                Directive::Parameter { name: n, value } if n == name => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn temperature(&self) -> Result<Option<f32>, ModelfileError> {
        self.float_parameter("temperature")
    }

    pub fn top_p(&self) -> Result<Option<f32>, ModelfileError> {
        self.float_parameter("top_p")
    }

    /// Range-check the generation parameters this crate relies on and
    /// make sure every value survives a render/parse round trip.
    pub fn validate(&self) -> Result<(), ModelfileError> {
        for directive in &self.directives {
            let (keyword, value) = directive.value();
            if quote(value).is_none() {
                return Err(ModelfileError::Unrenderable { keyword, value: value.to_string() });
            }
        }
        if let Some(t) = self.temperature()? {
            if t < 0.0 {
                return Err(invalid("temperature", t, "must be >= 0"));
            }
        }
        if let Some(p) = self.top_p()? {
            if p <= 0.0 || p > 1.0 {
                return Err(invalid("top_p", p, "must be in (0, 1]"));
            }
        }
        Ok(())
    }

    fn float_parameter(&self, name: &str) -> Result<Option<f32>, ModelfileError> {
        match self.parameter(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| invalid(name, raw, "not a number")),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ModelfileError> {
        let lines: Vec<&str> = text.lines().collect();
        let mut directives = Vec::new();
        let mut i = 0usize;

        while i < lines.len() {
            let line_no = i + 1;
            let line = lines[i].trim_start();
            i += 1;

            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let (keyword, rest) = split_word(line);
            let upper = keyword.to_ascii_uppercase();

            // MESSAGE and PARAMETER take a leading word before the value.
            let (arg, rest) = match upper.as_str() {
                "PARAMETER" | "MESSAGE" => {
                    let (arg, rest) = split_word(rest);
                    (Some(arg), rest)
                }
                _ => (None, rest),
            };

            let value = read_value(rest, &lines, &mut i, line_no)?;

            let missing = |expected| ModelfileError::MissingArgument {
                line: line_no,
                keyword: upper.clone(),
                expected,
            };

            let directive = match upper.as_str() {
                "FROM" | "ADAPTER" if value.is_empty() => return Err(missing("a value")),
                "FROM"     => Directive::From(value),
                "ADAPTER"  => Directive::Adapter(value),
                "SYSTEM"   => Directive::System(value),
                "TEMPLATE" => Directive::Template(value),
                "LICENSE"  => Directive::License(value),
                "PARAMETER" => match arg {
                    Some(name) if !name.is_empty() && !value.is_empty() => Directive::Parameter {
                        name: name.to_string(),
                        value,
                    },
                    _ => return Err(missing("a name and a value")),
                },
                "MESSAGE" => match arg {
                    Some(role) if !role.is_empty() => Directive::Message {
                        role: role.to_ascii_lowercase(),
                        content: value,
                    },
                    _ => return Err(missing("a role and a message")),
                },
                _ => {
                    return Err(ModelfileError::UnknownDirective {
                        line:    line_no,
                        keyword: keyword.to_string(),
                    })
                }
            };
            directives.push(directive);
        }

        match directives.iter().filter(|d| matches!(d, Directive::From(_))).count() {
            0 => Err(ModelfileError::MissingFrom),
            1 => Ok(Self { directives }),
            _ => Err(ModelfileError::DuplicateFrom),
        }
    }
}

fn invalid(name: &str, value: impl fmt::Display, reason: &'static str) -> ModelfileError {
    ModelfileError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason,
    }
}

/// Split off the first whitespace-delimited word. Trailing whitespace of
/// the remainder is kept so triple-quoted blocks stay byte-exact.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(at) => (&s[..at], s[at..].trim_start()),
        None => (s, ""),
    }
}

/// Read a directive value starting at `rest`, consuming further lines
/// from `lines` when a triple-quoted block spans them.
fn read_value(
    rest:    &str,
    lines:   &[&str],
    next:    &mut usize,
    line_no: usize,
) -> Result<String, ModelfileError> {
    if let Some(after) = rest.strip_prefix("\"\"\"") {
        if let Some(end) = after.find("\"\"\"") {
            return Ok(after[..end].to_string());
        }
        let mut block = after.to_string();
        while *next < lines.len() {
            let line = lines[*next];
            *next += 1;
            block.push('\n');
            if let Some(end) = line.find("\"\"\"") {
                block.push_str(&line[..end]);
                return Ok(block);
            }
            block.push_str(line);
        }
        return Err(ModelfileError::UnterminatedQuote { line: line_no });
    }

    let rest = rest.trim_end();
    if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
        return Ok(rest[1..rest.len() - 1].to_string());
    }

    Ok(rest.to_string())
}

/// The first form `read_value` gives back unchanged:
///   bare          single line, already trimmed, no leading quote
///   "quoted"      single line, not starting with two quotes
///   """block"""   no """ inside and no trailing quote
/// None when no form fits.
fn quote(value: &str) -> Option<String> {
    if value.contains('\r') {
        return None;
    }
    let single_line = !value.contains('\n');
    if single_line && !value.is_empty() && value == value.trim() && !value.starts_with('"') {
        return Some(value.to_string());
    }
    if single_line && !value.starts_with("\"\"") {
        return Some(format!("\"{value}\""));
    }
    if !value.contains("\"\"\"") && !value.ends_with('"') {
        return Some(format!("\"\"\"{value}\"\"\""));
    }
    None
}

impl Directive {
    fn value(&self) -> (&'static str, &str) {
        match self {
            Directive::From(v)                  => ("FROM", v),
            Directive::Adapter(v)               => ("ADAPTER", v),
            Directive::Parameter { value, .. }  => ("PARAMETER", value),
            Directive::System(v)                => ("SYSTEM", v),
            Directive::Template(v)              => ("TEMPLATE", v),
            Directive::License(v)               => ("LICENSE", v),
            Directive::Message { content, .. }  => ("MESSAGE", content),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, raw) = self.value();
        // validate() rejects values without a form; render those as a block.
        let value = quote(raw).unwrap_or_else(|| format!("\"\"\"{raw}\"\"\""));
        match self {
            Directive::From(_)     => write!(f, "FROM {value}"),
            Directive::Adapter(_)  => write!(f, "ADAPTER {value}"),
            Directive::Parameter { name, .. } => write!(f, "PARAMETER {name} {value}"),
            Directive::System(_)   => write!(f, "SYSTEM {value}"),
            Directive::Template(_) => write!(f, "TEMPLATE {value}"),
            Directive::License(_)  => write!(f, "LICENSE {value}"),
            Directive::Message { role, .. } => write!(f, "MESSAGE {role} {value}"),
        }
    }
}

impl fmt::Display for Modelfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for directive in &self.directives {
            writeln!(f, "{directive}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_renders_expected_file() {
        let mf = Modelfile::new("llama3.2:3b")
            .with_adapter("./adapter_model")
            .with_parameter("temperature", 0.7)
            .with_parameter("top_p", 0.9);
        assert_eq!(
            mf.to_string(),
            "FROM llama3.2:3b\nADAPTER ./adapter_model\nPARAMETER temperature 0.7\nPARAMETER top_p 0.9\n"
        );
    }

    #[test]
    fn test_parse_reads_directives_and_comments() {
        let text = "# custom model\nfrom llama3.2:3b\n\nADAPTER ./adapter_model\nPARAMETER temperature 0.2\nPARAMETER top_p 0.95\n";
        let mf = Modelfile::parse(text).unwrap();
        assert_eq!(mf.base(), "llama3.2:3b");
        assert_eq!(mf.adapter(), Some("./adapter_model"));
        assert_eq!(mf.temperature().unwrap(), Some(0.2));
        assert_eq!(mf.top_p().unwrap(), Some(0.95));
        assert!(mf.validate().is_ok());
    }

    #[test]
    fn test_parse_multiline_system_prompt() {
        let text = "FROM base\nSYSTEM \"\"\"You answer questions.\nBe brief.\"\"\"\nPARAMETER stop \"<|eot|>\"\n";
        let mf = Modelfile::parse(text).unwrap();
        assert_eq!(mf.system(), Some("You answer questions.\nBe brief."));
        assert_eq!(mf.parameter("stop"), Some("<|eot|>"));
    }

    #[test]
    fn test_render_then_parse_keeps_directives() {
        let mf = Modelfile::new("llama3.2:3b")
            .with_adapter("/tmp/my adapter")
            .with_parameter("temperature", 0.5)
            .with_system("  Line one\nLine two ");
        let reparsed = Modelfile::parse(&mf.to_string()).unwrap();
        assert_eq!(reparsed, mf);
    }

    #[test]
    fn test_repeated_parameter_last_wins() {
        let mf = Modelfile::parse("FROM b\nPARAMETER stop a\nPARAMETER stop b\n").unwrap();
        assert_eq!(mf.parameter("stop"), Some("b"));
        assert_eq!(mf.parameters("stop"), vec!["a", "b"]);
    }

    #[test]
    fn test_from_is_required_and_unique() {
        assert_eq!(Modelfile::parse("ADAPTER x\n"), Err(ModelfileError::MissingFrom));
        assert_eq!(Modelfile::parse("FROM a\nFROM b\n"), Err(ModelfileError::DuplicateFrom));
    }

    #[test]
    fn test_rejects_unknown_and_incomplete_directives() {
        assert!(matches!(
            Modelfile::parse("FROM a\nQUANTIZE q4\n"),
            Err(ModelfileError::UnknownDirective { line: 2, .. })
        ));
        assert!(matches!(
            Modelfile::parse("FROM a\nPARAMETER temperature\n"),
            Err(ModelfileError::MissingArgument { line: 2, .. })
        ));
        assert!(matches!(
            Modelfile::parse("FROM\n"),
            Err(ModelfileError::MissingArgument { line: 1, .. })
        ));
    }

    #[test]
    fn test_unterminated_triple_quote() {
        assert_eq!(
            Modelfile::parse("FROM a\nSYSTEM \"\"\"never closed\nstill open\n"),
            Err(ModelfileError::UnterminatedQuote { line: 2 })
        );
    }

    #[test]
    fn test_validate_checks_ranges() {
        let hot = Modelfile::new("a").with_parameter("temperature", -1.0);
        assert!(matches!(hot.validate(), Err(ModelfileError::InvalidParameter { .. })));

        let wide = Modelfile::new("a").with_parameter("top_p", 1.5);
        assert!(wide.validate().is_err());

        let junk = Modelfile::new("a").with_parameter("top_p", "high");
        assert!(junk.top_p().is_err());
    }

    #[test]
    fn test_quoted_values_survive_render_and_parse() {
        let mf = Modelfile::new("\"llama3.2:3b\"")
            .with_adapter(" ./my adapter ")
            .with_parameter("stop", "\"<|eot|>\"")
            .with_system("\"yes\" or \"no\"")
            .with_system("Say \"\"\"hi\"\"\" once.")
            .with_system("Quote me:\n\"done\" he said")
            .with_system("\"\"two leading quotes\nand more");
        assert!(mf.validate().is_ok());

        let reparsed = Modelfile::parse(&mf.to_string()).unwrap();
        assert_eq!(reparsed, mf);
        assert_eq!(reparsed.base(), "\"llama3.2:3b\"");
        assert_eq!(reparsed.system(), Some("\"yes\" or \"no\""));
    }

    #[test]
    fn test_values_without_a_quoting_form_fail_validation() {
        let closing = Modelfile::new("a").with_system("line one\nends with \"quote\"");
        assert!(matches!(
            closing.validate(),
            Err(ModelfileError::Unrenderable { keyword: "SYSTEM", .. })
        ));

        let carriage = Modelfile::new("a").with_adapter("./adapter\r");
        assert!(carriage.validate().is_err());
    }
}
