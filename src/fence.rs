//! Fenced code block parser
//!
//! Model responses are free text with zero or more fenced code blocks. The
//! pipeline only ever wants the first block, optionally restricted to a
//! language label, and the absence of a block is a normal outcome rather
//! than a parse error.

use regex::RegexBuilder;

/// Outcome of scanning a model response for a fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeBlock {
    Found(String),
    NotFound,
}

impl CodeBlock {
    pub fn into_option(self) -> Option<String> {
        match self {
            CodeBlock::Found(code) => Some(code),
            CodeBlock::NotFound => None,
        }
    }
}

/// Extract the first fenced block from `text`. With `language` set, only
/// blocks carrying that exact label match; otherwise any fence matches.
pub fn extract(text: &str, language: Option<&str>) -> CodeBlock {
    let pattern = match language {
        Some(lang) => format!(r"```{}[ \t]*\r?\n(.*?)```", regex::escape(lang)),
        None => r"```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```".to_string(),
    };
    let re = RegexBuilder::new(&pattern)
        .dot_matches_new_line(true)
        .build()
        .expect("static fence pattern");

    match re.captures(text) {
        Some(caps) => {
            let code = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            if code.is_empty() {
                CodeBlock::NotFound
            } else {
                CodeBlock::Found(code.to_string())
            }
        }
        None => CodeBlock::NotFound,
    }
}
