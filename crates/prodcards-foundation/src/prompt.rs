//! Card prompt template
//!
//! The template is opaque text with exactly two named holes, `{user_input}`
//! and `{product_data}`. `{{` and `}}` render as literal braces.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;

/// Slot holding the user's free-text query
pub const USER_INPUT: &str = "user_input";
/// Slot holding the rendered product fields
pub const PRODUCT_DATA: &str = "product_data";

/// Name of the template file inside the prompts directory
pub const TEMPLATE_FILE: &str = "system_prompt.txt";

/// Prompt template errors
#[derive(Debug, Error)]
pub enum PromptError {
    /// A required slot is absent from the template or the render call
    #[error("Required variable not provided: {0}")]
    MissingVariable(String),
    /// A slot other than the two known ones
    #[error("Unknown template variable: {0}")]
    UnknownVariable(String),
    /// Unbalanced or empty braces
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type PromptResult<T> = Result<T, PromptError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(String),
}

/// A parsed card prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    content: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template, requiring both slots and nothing else
    pub fn new(content: impl Into<String>) -> PromptResult<Self> {
        let content = content.into();
        let segments = parse_segments(&content)?;

        for segment in &segments {
            if let Segment::Slot(name) = segment
                && name != USER_INPUT
                && name != PRODUCT_DATA
            {
                return Err(PromptError::UnknownVariable(name.clone()));
            }
        }
        for required in [USER_INPUT, PRODUCT_DATA] {
            if !segments
                .iter()
                .any(|s| matches!(s, Segment::Slot(n) if n == required))
            {
                return Err(PromptError::MissingVariable(required.to_string()));
            }
        }

        Ok(Self { content, segments })
    }

    /// Load a template file
    pub fn from_file(path: impl AsRef<Path>) -> PromptResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::new(content)
    }

    /// Load `system_prompt.txt` from a prompts directory
    pub fn from_dir(dir: impl AsRef<Path>) -> PromptResult<Self> {
        Self::from_file(dir.as_ref().join(TEMPLATE_FILE))
    }

    /// Raw template text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Substitute both slots
    pub fn render(&self, user_input: &str, product_data: &str) -> String {
        let mut out = String::with_capacity(
            self.content.len() + user_input.len() + product_data.len(),
        );
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Slot(n) if n == USER_INPUT => out.push_str(user_input),
                Segment::Slot(_) => out.push_str(product_data),
            }
        }
        out
    }
}

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").expect("template token pattern is valid")
});

/// Plain text between tokens may not hold a lone brace
fn check_text(text: &str, offset: usize) -> PromptResult<()> {
    match text.find(['{', '}']) {
        Some(i) if text[i..].starts_with('{') => Err(PromptError::ParseError(format!(
            "unclosed '{{' at byte {}",
            offset + i
        ))),
        Some(i) => Err(PromptError::ParseError(format!(
            "single '}}' at byte {}",
            offset + i
        ))),
        None => Ok(()),
    }
}

fn parse_segments(content: &str) -> PromptResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut last = 0;

    for caps in TOKEN.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        let between = &content[last..whole.start()];
        check_text(between, last)?;
        text.push_str(between);
        last = whole.end();

        match caps.get(1) {
            Some(name) => {
                let name = name.as_str().trim();
                if name.is_empty() {
                    return Err(PromptError::ParseError(format!(
                        "empty placeholder at byte {}",
                        whole.start()
                    )));
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Slot(name.to_string()));
            }
            None => text.push_str(&whole.as_str()[..1]),
        }
    }

    let rest = &content[last..];
    check_text(rest, last)?;
    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "Запрос: {user_input}\nТовар:\n{product_data}\nОтвет в JSON {{\"title\": ...}}";

    #[test]
    fn renders_both_slots_and_literal_braces() {
        let template = PromptTemplate::new(TEMPLATE).unwrap();
        let out = template.render("колонка", "name: Sony Speaker\nprice: 100");
        assert_eq!(
            out,
            "Запрос: колонка\nТовар:\nname: Sony Speaker\nprice: 100\nОтвет в JSON {\"title\": ...}"
        );
        let slots: Vec<&Segment> = template
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Slot(_)))
            .collect();
        assert_eq!(
            slots,
            vec![
                &Segment::Slot(USER_INPUT.into()),
                &Segment::Slot(PRODUCT_DATA.into())
            ]
        );
    }

    #[test]
    fn substituted_values_are_not_reparsed() {
        let template = PromptTemplate::new("{user_input}|{product_data}").unwrap();
        assert_eq!(
            template.render("{product_data}", "a {b}"),
            "{product_data}|a {b}"
        );
    }

    #[test]
    fn missing_slot_is_rejected() {
        let err = PromptTemplate::new("only {user_input}").unwrap_err();
        assert!(matches!(err, PromptError::MissingVariable(ref n) if n == PRODUCT_DATA));
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let err = PromptTemplate::new("{user_input} {product_data} {lang}").unwrap_err();
        assert!(matches!(err, PromptError::UnknownVariable(ref n) if n == "lang"));
    }

    #[test]
    fn unbalanced_braces_are_parse_errors() {
        assert!(matches!(
            PromptTemplate::new("{user_input} {product_data"),
            Err(PromptError::ParseError(_))
        ));
        assert!(matches!(
            PromptTemplate::new("{user_input} } {product_data}"),
            Err(PromptError::ParseError(_))
        ));
        assert!(matches!(
            PromptTemplate::new("{user_input} {} {product_data}"),
            Err(PromptError::ParseError(_))
        ));
    }

    #[test]
    fn doubled_braces_around_a_slot_stay_literal() {
        let template = PromptTemplate::new("{{user_input}} {user_input} {product_data}").unwrap();
        assert_eq!(template.render("u", "p"), "{user_input} u p");
    }

    #[test]
    fn brace_inside_a_slot_is_unclosed() {
        let err = PromptTemplate::new("{user_{input} {user_input} {product_data}").unwrap_err();
        assert!(matches!(err, PromptError::ParseError(ref m) if m.contains("unclosed")));
    }

    #[test]
    fn loads_from_prompts_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TEMPLATE_FILE), TEMPLATE).unwrap();
        let template = PromptTemplate::from_dir(dir.path()).unwrap();
        assert_eq!(template.content(), TEMPLATE);

        let missing = PromptTemplate::from_dir(dir.path().join("nope"));
        assert!(matches!(missing, Err(PromptError::IoError(_))));
    }
}
