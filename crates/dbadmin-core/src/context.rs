//! Reconstruct where the cursor sits inside a command.

use crate::grammar::{CommandGrammar, Walk};
use crate::registry::RegistrySnapshot;
use crate::tokenize::tokenize_spanned;
use tracing::debug;

/// The command state immediately left of the cursor.
///
/// Rebuilt from scratch for every keystroke; it holds no state across lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorContext {
    pub walk: Walk,
    /// The token being typed (possibly empty).
    pub partial: String,
    /// Byte offset in the line where `partial` starts.
    pub partial_start: usize,
    /// An earlier, complete token was not accepted by the grammar.
    pub rejected: bool,
}

impl CursorContext {
    pub fn resolve(
        grammar: &CommandGrammar,
        registry: &RegistrySnapshot,
        line: &str,
        cursor: usize,
    ) -> Self {
        let mut cursor = cursor.min(line.len());
        while !line.is_char_boundary(cursor) {
            cursor -= 1;
        }
        let head = &line[..cursor];
        let mut tokens = tokenize_spanned(head);

        // A token that runs up to the cursor is still being typed; unquoted
        // whitespace before the cursor would have closed it.
        let typing = matches!(tokens.last(), Some(last) if last.end == head.len());
        let (partial, partial_start) = match typing.then(|| tokens.pop()).flatten() {
            Some(last) => (last.text, last.start),
            None => (String::new(), cursor),
        };

        let mut walk = Walk::new();
        let mut rejected = false;
        for token in &tokens {
            if let Err(err) = walk.advance(grammar, registry, &token.text) {
                debug!(token = %token.text, %err, "completion context rejected");
                rejected = true;
                break;
            }
        }

        Self {
            walk,
            partial,
            partial_start,
            rejected,
        }
    }
}
