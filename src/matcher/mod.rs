//! Pattern matcher: compositional join expressions over lexeme streams.
//!
//! Patterns are constructed through a stack-discipline builder
//! ([`PatternMatcherBuilder`]) and frozen into an immutable
//! [`PatternMatcher`] by `compile()`. Per-document evaluation state lives
//! in a [`MatchContext`] created from the compiled matcher.

mod context;

use std::collections::HashMap;

pub use context::MatchContext;

use serde::Serialize;

use crate::error::{PatternError, Result};
use crate::format::{ResultFormat, VarId, VariableMap};
use crate::lexem::Address;

/// Ceiling for term ids referenced by `push_term`.
pub const MAX_TERM_ID: u32 = 1 << 20;
/// Ceiling for each construction arena (expressions, pattern refs, patterns).
pub const MAX_NODES: usize = 1 << 20;
/// How many unresolved names an [`PatternError::UnresolvedReferences`]
/// report lists before truncating.
const MAX_REPORTED_UNRESOLVED: usize = 10;

/// Reference to a pattern node. The three id namespaces of the builder are
/// kept as an explicit tagged variant, so one numeric range cannot silently
/// collide with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// An atomic lexeme id.
    Term(u32),
    /// Index into the pattern-reference arena (resolved by name at compile).
    Pattern(u32),
    /// Index into the expression arena.
    Expression(u32),
}

/// Composition rule for a multi-operand expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOperation {
    /// Operands in listed order, each starting strictly after the previous
    /// operand's end.
    Sequence,
    /// Sequence with no ordinal gap between adjacent operands.
    SequenceImm,
    /// Operand 1 is a boundary pattern; the rest match as Sequence, and an
    /// independent boundary match must not start inside the covered span.
    SequenceStruct,
    /// Operands in any order, all within the allowed span.
    Within,
    /// Within plus the boundary-exclusion rule.
    WithinStruct,
    /// All operands at the position; the shortest successful match wins.
    Any,
    /// Operand 1 must match; enough of the rest must match at the same
    /// start ordinal.
    And,
}

impl JoinOperation {
    pub fn name(&self) -> &'static str {
        match self {
            JoinOperation::Sequence => "sequence",
            JoinOperation::SequenceImm => "sequence_imm",
            JoinOperation::SequenceStruct => "sequence_struct",
            JoinOperation::Within => "within",
            JoinOperation::WithinStruct => "within_struct",
            JoinOperation::Any => "any",
            JoinOperation::And => "and",
        }
    }

    fn is_sequence(&self) -> bool {
        matches!(
            self,
            JoinOperation::Sequence | JoinOperation::SequenceImm | JoinOperation::SequenceStruct
        )
    }

    fn has_boundary(&self) -> bool {
        matches!(
            self,
            JoinOperation::SequenceStruct | JoinOperation::WithinStruct
        )
    }
}

/// One operand slot: a node plus its capture variable, if any. Variables
/// belong to the slot, so two uses of the same term can capture under
/// different names.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Operand {
    pub(crate) node: NodeRef,
    pub(crate) var: Option<VarId>,
}

impl Operand {
    fn new(node: NodeRef) -> Self {
        Self { node, var: None }
    }
}

/// A composite pattern node. Operands live in one flat arena, referenced
/// by `(offset, len)` and read back as a bounds-checked slice.
#[derive(Debug, Clone)]
pub(crate) struct Expression {
    pub(crate) op: JoinOperation,
    pub(crate) operands: (u32, u32),
    pub(crate) range: u32,
    pub(crate) cardinality: u32,
    min_span: u32,
}

/// A named, independently evaluated top-level rule.
#[derive(Debug)]
pub(crate) struct PatternDef {
    pub(crate) root: Operand,
    pub(crate) name: String,
    pub(crate) visible: bool,
    pub(crate) format: Option<ResultFormat>,
}

/// Construction side of the matcher: a single-pass stack machine.
/// Consumed by `compile()`, making post-freeze mutation unrepresentable.
#[derive(Debug, Default)]
pub struct PatternMatcherBuilder {
    patterns: Vec<PatternDef>,
    pattern_refs: Vec<String>,
    expressions: Vec<Expression>,
    operands: Vec<Operand>,
    stack: Vec<Operand>,
    variables: VariableMap,
}

impl PatternMatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an atomic lexeme reference.
    pub fn push_term(&mut self, id: u32) -> Result<()> {
        if id >= MAX_TERM_ID {
            return Err(PatternError::Capacity("term id above ceiling"));
        }
        self.stack.push(Operand::new(NodeRef::Term(id)));
        Ok(())
    }

    /// Push a (possibly forward) reference to another named pattern.
    pub fn push_pattern(&mut self, name: &str) -> Result<()> {
        if self.pattern_refs.len() >= MAX_NODES {
            return Err(PatternError::Capacity("too many pattern references"));
        }
        self.stack
            .push(Operand::new(NodeRef::Pattern(self.pattern_refs.len() as u32)));
        self.pattern_refs.push(name.to_string());
        Ok(())
    }

    /// Pop `argc` items as operands and push a new composite node.
    ///
    /// `range` is the maximum ordinal span covering all matched operands
    /// (0 = unbounded); `cardinality` the minimum number of non-leading
    /// operands that must match (0 = all). The supplied range is validated
    /// only against the minimal feasible span: an unnecessarily large value
    /// passes.
    pub fn push_expression(
        &mut self,
        op: JoinOperation,
        argc: usize,
        range: u32,
        cardinality: u32,
    ) -> Result<()> {
        if argc == 0 {
            return Err(PatternError::definition(
                "expression pushed without operands",
            ));
        }
        if self.stack.len() < argc {
            return Err(PatternError::definition(format!(
                "expression needs {argc} operands but the stack holds {}",
                self.stack.len()
            )));
        }
        if self.expressions.len() >= MAX_NODES {
            return Err(PatternError::Capacity("too many expressions"));
        }
        if op.has_boundary() && argc < 2 {
            return Err(PatternError::definition(format!(
                "{} needs a boundary and at least one operand",
                op.name()
            )));
        }
        if op.is_sequence() && cardinality != 0 {
            return Err(PatternError::definition(format!(
                "cardinality not supported for {}",
                op.name()
            )));
        }
        if cardinality as usize >= argc {
            return Err(PatternError::definition(
                "cardinality exceeds the number of non-leading operands",
            ));
        }
        let args = &self.stack[self.stack.len() - argc..];
        let min_span = self.minimal_span(op, args);
        if range != 0 && range < min_span {
            return Err(PatternError::definition(format!(
                "range {range} is below the minimal feasible span {min_span}"
            )));
        }

        let offset = self.operands.len() as u32;
        let at = self.stack.len() - argc;
        self.operands.extend(self.stack.drain(at..));
        let idx = self.expressions.len() as u32;
        self.expressions.push(Expression {
            op,
            operands: (offset, argc as u32),
            range,
            cardinality,
            min_span,
        });
        self.stack.push(Operand::new(NodeRef::Expression(idx)));
        Ok(())
    }

    /// Mark the top-of-stack slot for named capture.
    pub fn attach_variable(&mut self, name: &str) -> Result<()> {
        let var = self.variables.get_or_create(name)?;
        let Some(top) = self.stack.last_mut() else {
            return Err(PatternError::definition(
                "attach_variable called with an empty stack",
            ));
        };
        top.var = Some(var);
        Ok(())
    }

    /// Pop the top-of-stack node and register it as a named pattern,
    /// optionally with its own value formatter and output visibility.
    pub fn define_pattern(
        &mut self,
        name: &str,
        formatstring: Option<&str>,
        visible: bool,
    ) -> Result<()> {
        if self.patterns.len() >= MAX_NODES {
            return Err(PatternError::Capacity("too many patterns"));
        }
        let format = match formatstring {
            Some(src) => Some(ResultFormat::parse(src, &mut self.variables)?),
            None => None,
        };
        let Some(root) = self.stack.pop() else {
            return Err(PatternError::definition(
                "define_pattern called with an empty stack",
            ));
        };
        self.patterns.push(PatternDef {
            root,
            name: name.to_string(),
            visible,
            format,
        });
        Ok(())
    }

    /// Freeze the definitions. Fails when pattern names are referenced but
    /// never defined.
    pub fn compile(self) -> Result<PatternMatcher> {
        let mut by_name: HashMap<&str, Vec<u32>> = HashMap::new();
        for (idx, pattern) in self.patterns.iter().enumerate() {
            by_name.entry(&pattern.name).or_default().push(idx as u32);
        }
        let mut ref_targets = Vec::with_capacity(self.pattern_refs.len());
        let mut unresolved: Vec<String> = Vec::new();
        for name in &self.pattern_refs {
            match by_name.get(name.as_str()) {
                Some(targets) => ref_targets.push(targets.clone()),
                None => {
                    ref_targets.push(Vec::new());
                    if !unresolved.contains(name) {
                        unresolved.push(name.clone());
                    }
                }
            }
        }
        if !unresolved.is_empty() {
            let count = unresolved.len();
            unresolved.truncate(MAX_REPORTED_UNRESOLVED);
            return Err(PatternError::UnresolvedReferences {
                names: unresolved,
                count,
            });
        }
        Ok(PatternMatcher {
            patterns: self.patterns,
            expressions: self.expressions,
            operands: self.operands,
            ref_targets,
            variables: self.variables,
        })
    }

    /// Minimal ordinal span an expression over `args` can cover.
    fn minimal_span(&self, op: JoinOperation, args: &[Operand]) -> u32 {
        let body = if op.has_boundary() { &args[1..] } else { args };
        let spans = body.iter().map(|operand| self.node_min_span(operand.node));
        match op {
            JoinOperation::Sequence | JoinOperation::SequenceImm | JoinOperation::SequenceStruct => {
                spans.sum()
            }
            JoinOperation::Within | JoinOperation::WithinStruct | JoinOperation::And => {
                spans.max().unwrap_or(1)
            }
            JoinOperation::Any => spans.min().unwrap_or(1),
        }
    }

    fn node_min_span(&self, node: NodeRef) -> u32 {
        match node {
            NodeRef::Term(_) | NodeRef::Pattern(_) => 1,
            NodeRef::Expression(idx) => self.expressions[idx as usize].min_span,
        }
    }
}

/// Compiled, immutable pattern definitions. Safely shared read-only across
/// concurrently processed documents.
#[derive(Debug)]
pub struct PatternMatcher {
    pub(crate) patterns: Vec<PatternDef>,
    pub(crate) expressions: Vec<Expression>,
    operands: Vec<Operand>,
    pub(crate) ref_targets: Vec<Vec<u32>>,
    pub(crate) variables: VariableMap,
}

impl PatternMatcher {
    /// Fresh per-document evaluation state with default budgets.
    pub fn create_context(&self) -> MatchContext<'_> {
        MatchContext::new(self)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub(crate) fn operands_of(&self, expr: &Expression) -> &[Operand] {
        let (offset, len) = expr.operands;
        &self.operands[offset as usize..(offset + len) as usize]
    }
}

/// One pattern match, as delivered by `fetch_results`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    pub name: String,
    /// Formatted value when the pattern carries a format string.
    pub value: Option<String>,
    pub start_ordpos: u32,
    pub end_ordpos: u32,
    pub start: Address,
    pub end: Address,
    pub items: Vec<MatchItem>,
}

/// One captured variable of a match; same shape one level down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchItem {
    pub name: String,
    /// Formatted value, or `None` for a raw source-span reference.
    pub value: Option<String>,
    pub start_ordpos: u32,
    pub end_ordpos: u32,
    pub start: Address,
    pub end: Address,
}
