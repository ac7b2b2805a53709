// File: src/template.rs

use std::collections::{HashMap, HashSet};

use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("format contains no `$field` placeholders")]
    NoFields,
    #[error("placeholder `${0}` appears more than once")]
    DuplicateField(String),
    #[error("format did not compile to a valid matcher")]
    Pattern(#[from] regex::Error),
}

/// A compiled log-format template.
///
/// A format string is literal text interleaved with `$name` placeholders,
/// e.g. `$remote_addr - [$time_local] "$request"`. The literal segments
/// anchor the match; each placeholder captures the run of characters up to
/// the first character of the literal that follows it (or the rest of the
/// line for a trailing placeholder). That rule is what lets placeholders
/// sit flush against brackets and quotes.
///
/// Immutable once compiled. Duplicate placeholder names are rejected here
/// rather than resolved by precedence.
#[derive(Debug, Clone)]
pub struct Template {
    pattern: Regex,
    fields: Vec<String>,
}

#[derive(Debug, PartialEq)]
enum Segment {
    Literal(String),
    Field(String),
}

impl Template {
    pub fn compile(format: &str) -> Result<Self, TemplateError> {
        let segments = scan(format);

        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        for segment in &segments {
            if let Segment::Field(name) = segment {
                if !seen.insert(name.clone()) {
                    return Err(TemplateError::DuplicateField(name.clone()));
                }
                fields.push(name.clone());
            }
        }
        if fields.is_empty() {
            return Err(TemplateError::NoFields);
        }

        let mut pattern = String::from("^");
        for (i, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Field(name) => {
                    // The first char of the next literal is the stop char.
                    let stop = segments[i + 1..].iter().find_map(|s| match s {
                        Segment::Literal(text) => text.chars().next(),
                        Segment::Field(_) => None,
                    });
                    match stop {
                        Some(c) => {
                            pattern.push_str("(?P<");
                            pattern.push_str(name);
                            pattern.push_str(">[^");
                            pattern.push_str(&regex::escape(&c.to_string()));
                            pattern.push_str("]*)");
                        }
                        None => {
                            pattern.push_str("(?P<");
                            pattern.push_str(name);
                            pattern.push_str(">.*)");
                        }
                    }
                }
            }
        }
        pattern.push('$');

        Ok(Self {
            pattern: Regex::new(&pattern)?,
            fields,
        })
    }

    /// Field names in the order they appear in the format.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Matches `line` against the template, returning the substring each
    /// placeholder captured. `None` when the line's literal structure does
    /// not align with the format.
    pub fn captures<'a>(&self, line: &'a str) -> Option<HashMap<&str, &'a str>> {
        let caps = self.pattern.captures(line)?;
        let mut map = HashMap::with_capacity(self.fields.len());
        for name in &self.fields {
            if let Some(m) = caps.name(name) {
                map.insert(name.as_str(), m.as_str());
            }
        }
        Some(map)
    }
}

/// Splits a format string into literal and `$name` segments. A name is a
/// run of `[A-Za-z0-9_]`; a `$` not followed by one is literal text.
fn scan(format: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            literal.push(c);
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            literal.push('$');
        } else {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Field(name));
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}
