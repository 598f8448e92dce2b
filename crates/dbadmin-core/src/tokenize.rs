//! Quote-aware splitting of a command line.
//!
//! Whitespace separates tokens. A single- or double-quoted segment belongs to
//! the surrounding token and may contain whitespace; a backslash outside
//! single quotes takes the next character literally. This lets
//! `json '{"memory_size": 1}'` arrive as two tokens.

/// A token plus the byte range it occupies in the original line (quotes
/// included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

pub fn split_command_line(line: &str) -> Vec<String> {
    tokenize_spanned(line)
        .into_iter()
        .map(|token| token.text)
        .collect()
}

pub fn tokenize_spanned(line: &str) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::new();
    let mut current = String::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => {
                start.get_or_insert(i);
                if let Some((_, next)) = chars.next() {
                    current.push(next);
                }
            }
            (None, '"') | (None, '\'') => {
                start.get_or_insert(i);
                quote = Some(c);
            }
            (None, c) if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    out.push(Token {
                        text: std::mem::take(&mut current),
                        start: s,
                        end: i,
                    });
                }
            }
            (_, c) => {
                start.get_or_insert(i);
                current.push(c);
            }
        }
    }

    if let Some(s) = start {
        out.push(Token {
            text: current,
            start: s,
            end: line.len(),
        });
    }

    out
}
