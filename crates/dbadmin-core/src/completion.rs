//! Tab completion.
//!
//! Candidates come from [`Walk::expected`](crate::grammar::Walk::expected),
//! the same table the payload builder walks, so anything offered here is
//! accepted by `create` / `change` and nothing accepted is left out.

use crate::context::CursorContext;
use crate::grammar::CommandGrammar;
use crate::registry::EntityRegistry;
use std::collections::HashSet;

/// Replacement candidates for the token that starts at `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub start: usize,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompletionEngine {
    grammar: CommandGrammar,
    registry: EntityRegistry,
}

impl CompletionEngine {
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            grammar: CommandGrammar::default(),
            registry,
        }
    }

    /// Never touches the network; reads whichever registry snapshot is
    /// current.
    pub fn complete(&self, line: &str, pos: usize) -> Completion {
        let snapshot = self.registry.snapshot();
        let ctx = CursorContext::resolve(&self.grammar, &snapshot, line, pos);
        if ctx.rejected {
            return Completion {
                start: ctx.partial_start,
                candidates: Vec::new(),
            };
        }

        // Values are accepted in any case, so `T` completes to `true`.
        let typed = ctx.partial.to_ascii_lowercase();
        let mut seen = HashSet::new();
        let candidates = ctx
            .walk
            .expected(&self.grammar, &snapshot)
            .into_iter()
            .filter(|c| c.to_ascii_lowercase().starts_with(&typed))
            .filter(|c| seen.insert(c.clone()))
            .collect();

        Completion {
            start: ctx.partial_start,
            candidates,
        }
    }
}
