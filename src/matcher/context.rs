//! Per-document match evaluation.
//!
//! A context owns the input lexeme buffer and the formatted-value budget
//! for one unit of work. Evaluation is exhaustive and non-memoized: every
//! pattern is attempted at every input position, nested pattern references
//! recurse directly. This is the defining reference semantics, not a
//! throughput strategy.

use std::cmp::Ordering;

use crate::error::{PatternError, Result};
use crate::format::{CapturedItem, FormatContext, ResultFormat, VarId};
use crate::lexem::{Address, Lexem};

use super::{Expression, JoinOperation, MatchItem, NodeRef, Operand, PatternMatch, PatternMatcher};

/// Default byte budget for formatted values per document.
const DEFAULT_VALUE_BUDGET: usize = 64 << 20;
/// Default input-buffer ceiling per document.
const DEFAULT_INPUT_LIMIT: usize = 1 << 22;
/// Cap on nested pattern-reference recursion. Exceeding it fails only the
/// match attempt at hand.
const MAX_DEPTH: u32 = 128;

/// In-flight match state during evaluation.
#[derive(Debug, Clone)]
struct EvalMatch {
    ordpos: u32,
    ordlen: u32,
    start: Address,
    end: Address,
    items: Vec<EvalItem>,
}

impl EvalMatch {
    fn ordend(&self) -> u32 {
        self.ordpos + self.ordlen
    }
}

#[derive(Debug, Clone)]
struct EvalItem {
    var: VarId,
    value: Option<String>,
    ordpos: u32,
    ordlen: u32,
    start: Address,
    end: Address,
}

/// Union a sub-match into an accumulating result.
fn join(result: &mut EvalMatch, sub: EvalMatch) {
    if sub.ordend() > result.ordend() {
        result.ordlen = sub.ordend() - result.ordpos;
    }
    if sub.start < result.start {
        result.start = sub.start;
    }
    if sub.end > result.end {
        result.end = sub.end;
    }
    result.items.extend(sub.items);
}

/// Per-document evaluation state over a compiled matcher.
#[derive(Debug)]
pub struct MatchContext<'a> {
    matcher: &'a PatternMatcher,
    input: Vec<Lexem>,
    input_limit: usize,
    fmt: FormatContext,
}

impl<'a> MatchContext<'a> {
    pub(crate) fn new(matcher: &'a PatternMatcher) -> Self {
        Self::with_limits(matcher, DEFAULT_INPUT_LIMIT, DEFAULT_VALUE_BUDGET)
    }

    /// Context with explicit input-buffer and formatted-value budgets.
    pub fn with_limits(
        matcher: &'a PatternMatcher,
        input_limit: usize,
        value_budget: usize,
    ) -> Self {
        Self {
            matcher,
            input: Vec::new(),
            input_limit,
            fmt: FormatContext::new(value_budget),
        }
    }

    /// Feed one lexeme. Lexemes must arrive in non-decreasing ordinal
    /// position order.
    pub fn put_input(&mut self, lexem: Lexem) -> Result<()> {
        if self.input.len() >= self.input_limit {
            return Err(PatternError::OutOfMemory("lexeme buffer limit exceeded"));
        }
        debug_assert!(
            self.input.last().is_none_or(|last| last.ordpos <= lexem.ordpos),
            "input must be fed in non-decreasing ordinal position order"
        );
        self.input.push(lexem);
        Ok(())
    }

    /// Discard per-document state, keeping the context reusable.
    pub fn reset(&mut self) {
        self.input.clear();
        self.fmt.reset();
    }

    /// Evaluate every visible pattern at every input position and return
    /// the globally ordered results.
    pub fn fetch_results(&mut self) -> Result<Vec<PatternMatch>> {
        let matcher = self.matcher;
        let mut out = Vec::new();
        for (pidx, pattern) in matcher.patterns.iter().enumerate() {
            if !pattern.visible {
                continue;
            }
            for at in 0..self.input.len() {
                if let Some(m) = self.match_node(pattern.root, at, 0)? {
                    out.push(self.publish(pidx, m)?);
                }
            }
        }
        out.sort_by(compare_results);
        Ok(out)
    }

    /// Convert an internal match of pattern `pidx` into its public shape.
    /// A pattern-level format string replaces the item list with one
    /// formatted value.
    fn publish(&mut self, pidx: usize, m: EvalMatch) -> Result<PatternMatch> {
        let matcher = self.matcher;
        let pattern = &matcher.patterns[pidx];
        let (value, items) = match &pattern.format {
            Some(fmt) => (Some(self.format_value(fmt, &m.items)?), Vec::new()),
            None => {
                let items = m
                    .items
                    .iter()
                    .map(|item| MatchItem {
                        name: matcher.variables.name(item.var).to_string(),
                        value: item.value.clone(),
                        start_ordpos: item.ordpos,
                        end_ordpos: item.ordpos + item.ordlen,
                        start: item.start,
                        end: item.end,
                    })
                    .collect();
                (None, items)
            }
        };
        Ok(PatternMatch {
            name: pattern.name.clone(),
            value,
            start_ordpos: m.ordpos,
            end_ordpos: m.ordend(),
            start: m.start,
            end: m.end,
            items,
        })
    }

    fn format_value(&mut self, fmt: &ResultFormat, items: &[EvalItem]) -> Result<String> {
        let captured: Vec<CapturedItem<'_>> = items
            .iter()
            .map(|item| CapturedItem {
                var: item.var,
                value: item.value.as_deref(),
                start: item.start,
                end: item.end,
            })
            .collect();
        self.fmt.map(fmt, &captured)
    }

    /// Match one operand slot at input position `at`. A variable-tagged
    /// slot converts its own match into a single named item of the parent;
    /// untagged sub-matches splice their items through unchanged.
    fn match_node(&mut self, operand: Operand, at: usize, depth: u32) -> Result<Option<EvalMatch>> {
        if depth > MAX_DEPTH {
            return Ok(None);
        }
        let matcher = self.matcher;
        let (matched, matched_pattern) = match operand.node {
            NodeRef::Term(id) => (self.match_term(id, at), None),
            NodeRef::Pattern(ridx) => match self.match_pattern_ref(ridx, at, depth)? {
                Some((m, pidx)) => (Some(m), Some(pidx)),
                None => (None, None),
            },
            NodeRef::Expression(eidx) => (self.match_expression(eidx, at, depth)?, None),
        };
        let Some(mut m) = matched else {
            return Ok(None);
        };
        if let Some(var) = operand.var {
            // A tagged pattern reference with its own format supplies the
            // captured value; everything else stays a raw source span.
            let format = matched_pattern
                .and_then(|pidx| matcher.patterns[pidx as usize].format.as_ref());
            let value = match format {
                Some(fmt) => Some(self.format_value(fmt, &m.items)?),
                None => None,
            };
            m.items = vec![EvalItem {
                var,
                value,
                ordpos: m.ordpos,
                ordlen: m.ordlen,
                start: m.start,
                end: m.end,
            }];
        }
        Ok(Some(m))
    }

    fn match_term(&self, id: u32, at: usize) -> Option<EvalMatch> {
        let token = self.input.get(at)?;
        if token.id != id {
            return None;
        }
        Some(EvalMatch {
            ordpos: token.ordpos,
            ordlen: 1,
            start: token.start(),
            end: token.end(),
            items: Vec::new(),
        })
    }

    /// Evaluate all patterns sharing the referenced name; the shortest
    /// match wins. Returns the winning pattern index alongside the match.
    fn match_pattern_ref(
        &mut self,
        ridx: u32,
        at: usize,
        depth: u32,
    ) -> Result<Option<(EvalMatch, u32)>> {
        let matcher = self.matcher;
        let mut best: Option<(EvalMatch, u32)> = None;
        for &pidx in &matcher.ref_targets[ridx as usize] {
            let root = matcher.patterns[pidx as usize].root;
            if let Some(m) = self.match_node(root, at, depth + 1)? {
                let better = best
                    .as_ref()
                    .is_none_or(|(b, _)| m.ordlen < b.ordlen);
                if better {
                    best = Some((m, pidx));
                }
            }
        }
        Ok(best)
    }

    fn match_expression(&mut self, eidx: u32, at: usize, depth: u32) -> Result<Option<EvalMatch>> {
        let matcher = self.matcher;
        let expr = &matcher.expressions[eidx as usize];
        let operands = matcher.operands_of(expr);
        match expr.op {
            JoinOperation::Sequence => {
                self.match_combined(expr, None, operands, at, false, true, depth)
            }
            JoinOperation::SequenceImm => {
                self.match_combined(expr, None, operands, at, true, true, depth)
            }
            JoinOperation::SequenceStruct => {
                self.match_combined(expr, Some(operands[0]), &operands[1..], at, false, true, depth)
            }
            JoinOperation::Within => {
                self.match_combined(expr, None, operands, at, false, false, depth)
            }
            JoinOperation::WithinStruct => self.match_combined(
                expr,
                Some(operands[0]),
                &operands[1..],
                at,
                false,
                false,
                depth,
            ),
            JoinOperation::Any => self.match_shortest(operands, at, depth),
            JoinOperation::And => self.match_all(expr, operands, at, depth),
        }
    }

    /// Shared evaluation for the Sequence and Within families.
    #[allow(clippy::too_many_arguments)]
    fn match_combined(
        &mut self,
        expr: &Expression,
        boundary: Option<Operand>,
        operands: &[Operand],
        at: usize,
        imm: bool,
        seq: bool,
        depth: u32,
    ) -> Result<Option<EvalMatch>> {
        let Some(&first) = operands.first() else {
            return Ok(None);
        };
        let Some(mut result) = self.match_node(first, at, depth + 1)? else {
            return Ok(None);
        };
        let mut matched = 0usize;
        for &operand in &operands[1..] {
            let found = self.find_first_match(operand, at, &result, expr.range, imm, seq, depth)?;
            match found {
                Some(sub) => {
                    join(&mut result, sub);
                    matched += 1;
                }
                // A sequence needs every operand; Within counts toward
                // cardinality.
                None if seq => return Ok(None),
                None => {}
            }
        }
        if expr.range != 0 && result.ordlen > expr.range {
            return Ok(None);
        }
        if !seq {
            let need = if expr.cardinality == 0 {
                operands.len() - 1
            } else {
                expr.cardinality as usize
            };
            if matched < need {
                return Ok(None);
            }
        }
        if let Some(boundary) = boundary {
            if self.boundary_starts_inside(boundary, &result, depth)? {
                return Ok(None);
            }
        }
        Ok(Some(result))
    }

    /// Scan forward from `at` for the first match of `operand` compatible
    /// with the accumulated result: in sequence mode the candidate must
    /// start after (imm: exactly at) the current end ordinal; in within
    /// mode any position inside the window qualifies.
    #[allow(clippy::too_many_arguments)]
    fn find_first_match(
        &mut self,
        operand: Operand,
        at: usize,
        result: &EvalMatch,
        range: u32,
        imm: bool,
        seq: bool,
        depth: u32,
    ) -> Result<Option<EvalMatch>> {
        let result_end = result.ordend();
        for ii in at..self.input.len() {
            let token_ord = self.input[ii].ordpos;
            // Input is ordered by ordpos: past the window nothing can fit.
            if range != 0 && token_ord >= result.ordpos && token_ord - result.ordpos >= range {
                break;
            }
            let Some(sub) = self.match_node(operand, ii, depth + 1)? else {
                continue;
            };
            if seq {
                if imm {
                    if sub.ordpos != result_end {
                        continue;
                    }
                } else if sub.ordpos < result_end {
                    continue;
                }
            }
            return Ok(Some(sub));
        }
        Ok(None)
    }

    /// True when an independent boundary match starts strictly inside the
    /// covered ordinal span.
    fn boundary_starts_inside(
        &mut self,
        boundary: Operand,
        result: &EvalMatch,
        depth: u32,
    ) -> Result<bool> {
        for ii in 0..self.input.len() {
            let token_ord = self.input[ii].ordpos;
            if token_ord <= result.ordpos {
                continue;
            }
            if token_ord >= result.ordend() {
                break;
            }
            if self.match_node(boundary, ii, depth + 1)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Any: keep only the shortest successful operand match.
    fn match_shortest(
        &mut self,
        operands: &[Operand],
        at: usize,
        depth: u32,
    ) -> Result<Option<EvalMatch>> {
        let mut best: Option<EvalMatch> = None;
        for &operand in operands {
            if let Some(m) = self.match_node(operand, at, depth + 1)? {
                if best.as_ref().is_none_or(|b| m.ordlen < b.ordlen) {
                    best = Some(m);
                }
            }
        }
        Ok(best)
    }

    /// And: operand 1 must match at `at`; each remaining operand may match
    /// at any input index sharing operand 1's start ordinal (co-positioned
    /// lexemes arrive as distinct records), and at least `cardinality` of
    /// them (all, if 0) must succeed.
    fn match_all(
        &mut self,
        expr: &Expression,
        operands: &[Operand],
        at: usize,
        depth: u32,
    ) -> Result<Option<EvalMatch>> {
        let Some(&first) = operands.first() else {
            return Ok(None);
        };
        let Some(mut result) = self.match_node(first, at, depth + 1)? else {
            return Ok(None);
        };
        let run = self.ordpos_run(result.ordpos);
        let mut matched = 0usize;
        for &operand in &operands[1..] {
            for ii in run.clone() {
                let Some(sub) = self.match_node(operand, ii, depth + 1)? else {
                    continue;
                };
                if sub.ordpos != result.ordpos {
                    continue;
                }
                join(&mut result, sub);
                matched += 1;
                break;
            }
        }
        let need = if expr.cardinality == 0 {
            operands.len() - 1
        } else {
            expr.cardinality as usize
        };
        if matched >= need {
            Ok(Some(result))
        } else {
            Ok(None)
        }
    }

    /// Contiguous run of input indices carrying the given ordinal position.
    fn ordpos_run(&self, ordpos: u32) -> std::ops::Range<usize> {
        let start = self.input.partition_point(|lx| lx.ordpos < ordpos);
        let end = self.input.partition_point(|lx| lx.ordpos <= ordpos);
        start..end
    }
}

/// Final global order: start ordinal, then start address, then end ordinal
/// descending (longer matches first), then name.
fn compare_results(a: &PatternMatch, b: &PatternMatch) -> Ordering {
    a.start_ordpos
        .cmp(&b.start_ordpos)
        .then(a.start.cmp(&b.start))
        .then(b.end_ordpos.cmp(&a.end_ordpos))
        .then(a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::PatternMatcherBuilder;

    fn lexem(id: u32, ordpos: u32, offset: usize) -> Lexem {
        Lexem::new(id, ordpos, 0, offset, 1)
    }

    fn feed(ctx: &mut MatchContext<'_>, lexems: &[Lexem]) {
        for lx in lexems {
            ctx.put_input(*lx).unwrap();
        }
    }

    fn sequence_matcher(range: u32) -> PatternMatcher {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::Sequence, 2, range, 0)
            .unwrap();
        b.define_pattern("seq", None, true).unwrap();
        b.compile().unwrap()
    }

    #[test]
    fn sequence_within_range_matches() {
        let m = sequence_matcher(3);
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        let results = ctx.fetch_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].start_ordpos, 1);
        assert_eq!(results[0].end_ordpos, 3);
    }

    #[test]
    fn sequence_beyond_range_does_not_match() {
        let m = sequence_matcher(3);
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 5, 8)]);
        assert!(ctx.fetch_results().unwrap().is_empty());
    }

    #[test]
    fn sequence_requires_listed_order() {
        let m = sequence_matcher(0);
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(2, 1, 0), lexem(1, 2, 2)]);
        assert!(ctx.fetch_results().unwrap().is_empty());
    }

    #[test]
    fn sequence_imm_rejects_gaps() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::SequenceImm, 2, 0, 0)
            .unwrap();
        b.define_pattern("imm", None, true).unwrap();
        let m = b.compile().unwrap();

        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        assert_eq!(ctx.fetch_results().unwrap().len(), 1);

        ctx.reset();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 3, 2)]);
        assert!(ctx.fetch_results().unwrap().is_empty());
    }

    #[test]
    fn within_ignores_order_of_trailing_operands() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_term(3).unwrap();
        b.push_expression(JoinOperation::Within, 3, 3, 0).unwrap();
        b.define_pattern("win", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        // Operands 2 and 3 arrive swapped relative to the operand list; a
        // Sequence over the same operands would reject this input.
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(3, 2, 2), lexem(2, 3, 4)]);
        let results = ctx.fetch_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].start_ordpos, 1);
        assert_eq!(results[0].end_ordpos, 4);
    }

    #[test]
    fn within_cardinality_allows_partial() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_term(3).unwrap();
        b.push_expression(JoinOperation::Within, 3, 5, 1).unwrap();
        b.define_pattern("win1", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        // Operand 3 never appears; cardinality 1 needs only one of the
        // trailing operands.
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        assert_eq!(ctx.fetch_results().unwrap().len(), 1);
    }

    #[test]
    fn within_respects_range() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::Within, 2, 2, 0).unwrap();
        b.define_pattern("win", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 5, 8)]);
        assert!(ctx.fetch_results().unwrap().is_empty());
    }

    #[test]
    fn any_keeps_shortest() {
        let mut b = PatternMatcherBuilder::new();
        // Alternative 1: sequence of terms 1,2 (span 2); alternative 2:
        // bare term 1 (span 1).
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::Sequence, 2, 0, 0).unwrap();
        b.push_term(1).unwrap();
        b.push_expression(JoinOperation::Any, 2, 0, 0).unwrap();
        b.define_pattern("alt", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        let results = ctx.fetch_results().unwrap();
        assert_eq!(results[0].end_ordpos - results[0].start_ordpos, 1);
    }

    #[test]
    fn and_with_cardinality_two_of_three() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_term(3).unwrap();
        b.push_term(4).unwrap();
        b.push_expression(JoinOperation::And, 4, 0, 2).unwrap();
        b.define_pattern("and2", None, true).unwrap();
        let m = b.compile().unwrap();

        // Terms 1, 2 and 4 share ordpos 1 as distinct records; term 3 is
        // missing. Two of the three non-leading operands match.
        let mut ctx = m.create_context();
        feed(
            &mut ctx,
            &[lexem(1, 1, 0), lexem(2, 1, 0), lexem(4, 1, 0), lexem(9, 2, 4)],
        );
        let results = ctx.fetch_results().unwrap();
        assert_eq!(results.len(), 1);

        // Only one non-leading operand present: below cardinality.
        ctx.reset();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 1, 0)]);
        assert!(ctx.fetch_results().unwrap().is_empty());
    }

    #[test]
    fn and_requires_same_ordinal() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::And, 2, 0, 0).unwrap();
        b.define_pattern("and", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        assert!(ctx.fetch_results().unwrap().is_empty());
    }

    #[test]
    fn sequence_struct_boundary_inside_rejects() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(9).unwrap(); // boundary: sentence delimiter
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::SequenceStruct, 3, 0, 0)
            .unwrap();
        b.define_pattern("structseq", None, true).unwrap();
        let m = b.compile().unwrap();

        // Delimiter between the two operands: rejected.
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(9, 2, 2), lexem(2, 3, 4)]);
        assert!(ctx.fetch_results().unwrap().is_empty());

        // Delimiter outside the span: accepted.
        ctx.reset();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2), lexem(9, 4, 6)]);
        assert_eq!(ctx.fetch_results().unwrap().len(), 1);
    }

    #[test]
    fn boundary_at_match_start_does_not_reject() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(9).unwrap();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::SequenceStruct, 3, 0, 0)
            .unwrap();
        b.define_pattern("structseq", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        // Delimiter co-positioned with the match start.
        feed(&mut ctx, &[lexem(9, 1, 0), lexem(1, 1, 0), lexem(2, 2, 2)]);
        assert_eq!(ctx.fetch_results().unwrap().len(), 1);
    }

    #[test]
    fn variable_capture_produces_named_item() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.attach_variable("who").unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::Sequence, 2, 0, 0).unwrap();
        b.define_pattern("p", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        let results = ctx.fetch_results().unwrap();
        assert_eq!(results[0].items.len(), 1);
        let item = &results[0].items[0];
        assert_eq!(item.name, "who");
        assert_eq!(item.value, None);
        assert_eq!((item.start_ordpos, item.end_ordpos), (1, 2));
    }

    #[test]
    fn untagged_submatch_splices_items() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.attach_variable("a").unwrap();
        b.push_term(2).unwrap();
        b.attach_variable("b").unwrap();
        b.push_expression(JoinOperation::Sequence, 2, 0, 0).unwrap();
        b.push_term(3).unwrap();
        b.push_expression(JoinOperation::Sequence, 2, 0, 0).unwrap();
        b.define_pattern("p", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2), lexem(3, 3, 4)]);
        let results = ctx.fetch_results().unwrap();
        let names: Vec<&str> = results[0].items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn pattern_format_replaces_items_with_value() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.attach_variable("who").unwrap();
        b.define_pattern("p", Some("got:{who}"), true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 5)]);
        let results = ctx.fetch_results().unwrap();
        assert!(results[0].items.is_empty());
        let value = results[0].value.as_ref().unwrap();
        assert!(value.starts_with("got:"), "{value}");
    }

    #[test]
    fn invisible_pattern_not_emitted_but_referencable() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.define_pattern("hidden", None, false).unwrap();
        b.push_pattern("hidden").unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::Sequence, 2, 0, 0).unwrap();
        b.define_pattern("outer", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        let results = ctx.fetch_results().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "outer");
    }

    #[test]
    fn tagged_pattern_ref_with_format_yields_item_value() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.attach_variable("inner").unwrap();
        b.define_pattern("sub", Some("[{inner}]"), false).unwrap();
        b.push_pattern("sub").unwrap();
        b.attach_variable("part").unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::Sequence, 2, 0, 0).unwrap();
        b.define_pattern("outer", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        let results = ctx.fetch_results().unwrap();
        assert_eq!(results.len(), 1);
        let item = &results[0].items[0];
        assert_eq!(item.name, "part");
        let value = item.value.as_ref().unwrap();
        assert!(value.starts_with('[') && value.ends_with(']'), "{value}");
    }

    #[test]
    fn self_referential_pattern_terminates() {
        let mut b = PatternMatcherBuilder::new();
        b.push_pattern("loop").unwrap();
        b.define_pattern("loop", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0)]);
        assert!(ctx.fetch_results().unwrap().is_empty());
    }

    #[test]
    fn results_are_globally_ordered() {
        let mut b = PatternMatcherBuilder::new();
        b.push_term(1).unwrap();
        b.define_pattern("b_short", None, true).unwrap();
        b.push_term(1).unwrap();
        b.push_term(2).unwrap();
        b.push_expression(JoinOperation::Sequence, 2, 0, 0).unwrap();
        b.define_pattern("a_long", None, true).unwrap();
        let m = b.compile().unwrap();
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        let results = ctx.fetch_results().unwrap();
        // Same start: longer match first; then name.
        assert_eq!(results[0].name, "a_long");
        assert_eq!(results[1].name, "b_short");
    }

    #[test]
    fn input_limit_is_out_of_memory() {
        let m = sequence_matcher(0);
        let mut ctx = MatchContext::with_limits(&m, 1, usize::MAX);
        ctx.put_input(lexem(1, 1, 0)).unwrap();
        assert!(matches!(
            ctx.put_input(lexem(2, 2, 2)),
            Err(PatternError::OutOfMemory(_))
        ));
    }

    #[test]
    fn reset_clears_input() {
        let m = sequence_matcher(0);
        let mut ctx = m.create_context();
        feed(&mut ctx, &[lexem(1, 1, 0), lexem(2, 2, 2)]);
        assert_eq!(ctx.fetch_results().unwrap().len(), 1);
        ctx.reset();
        assert!(ctx.fetch_results().unwrap().is_empty());
    }
}
