use thiserror::Error;

/// Errors produced by the pattern engine.
///
/// Definition-time failures reject only the offending definition; the
/// builder they came from stays usable for sibling definitions. Context
/// failures (`OutOfMemory`) abandon only the current document; the compiled
/// instance stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Malformed regex or format string, unknown/duplicate symbol, or a
    /// builder call with insufficient stack.
    #[error("definition error: {0}")]
    Definition(String),

    /// A numeric namespace (term ids, expression/pattern arenas) exceeded
    /// its fixed ceiling.
    #[error("capacity exceeded: {0}")]
    Capacity(&'static str),

    /// `compile()` found pattern names referenced but never defined.
    /// The list is bounded; the total count is exact.
    #[error("unresolved pattern references ({count}): {}", names.join(", "))]
    UnresolvedReferences { names: Vec<String>, count: usize },

    /// A per-context budget (input buffer, formatted-value bytes) ran out.
    #[error("out of memory: {0}")]
    OutOfMemory(&'static str),
}

pub type Result<T> = std::result::Result<T, PatternError>;

impl PatternError {
    pub fn definition(msg: impl Into<String>) -> Self {
        PatternError::Definition(msg.into())
    }
}
