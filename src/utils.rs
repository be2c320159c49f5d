use std::ops::Range;

pub type EntityName = String;
pub type IntentTag = String;

/// A whitespace token together with its character range in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub char_range: Range<usize>,
}

/// Splits `text` on whitespace, keeping track of character offsets.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    for (ix, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(Token {
                    value: current.clone(),
                    char_range: start..ix,
                });
                current.clear();
            }
        } else {
            if current.is_empty() {
                start = ix;
            }
            current.push(c);
        }
    }
    if !current.is_empty() {
        let end = start + current.chars().count();
        tokens.push(Token {
            value: current,
            char_range: start..end,
        });
    }
    tokens
}

pub fn substring_with_char_range(text: &str, range: &Range<usize>) -> String {
    text.chars()
        .skip(range.start)
        .take(range.end - range.start)
        .collect()
}
