//! Segment scanning: candidate collection, level elimination, ordinal
//! position assignment and symbol resolution.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::lexem::{Lexem, PositionBind};

use super::LexemRule;

/// One raw rule match before elimination.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    rule: usize,
    level: u32,
    pos: usize,
    len: usize,
}

impl Candidate {
    fn end(&self) -> usize {
        self.pos + self.len
    }
}

fn next_char_boundary(src: &str, mut at: usize) -> usize {
    while at < src.len() && !src.is_char_boundary(at) {
        at += 1;
    }
    at
}

/// Collect leftmost candidates for every rule. A candidate that does not
/// extend past the previous kept candidate of the same rule is covered and
/// skipped; scanning resumes one position past each kept candidate's start,
/// so overlapping later starts are still found.
fn collect_candidates(rules: &[LexemRule], src: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (ridx, rule) in rules.iter().enumerate() {
        let mut si = 0;
        let mut last_end: Option<usize> = None;
        while si <= src.len() {
            let Some((pos, len)) = rule.regex.find_group(src, si, rule.group) else {
                break;
            };
            if len == 0 || last_end.is_some_and(|le| le >= pos + len) {
                si = next_char_boundary(src, pos.max(si) + 1);
                continue;
            }
            candidates.push(Candidate {
                rule: ridx,
                level: rule.level,
                pos,
                len,
            });
            last_end = Some(pos + len);
            si = next_char_boundary(src, pos + 1);
        }
    }
    candidates
}

/// A higher-level candidate fully containing a lower-level one suppresses
/// it; overlap without containment never eliminates either side.
fn eliminate_covered(candidates: &[Candidate]) -> Vec<bool> {
    let mut eliminated = vec![false; candidates.len()];
    for b in 0..candidates.len() {
        for a in 0..b {
            let ca = &candidates[a];
            let cb = &candidates[b];
            if ca.pos <= cb.pos && cb.end() <= ca.end() && ca.level > cb.level {
                eliminated[b] = true;
                break;
            }
        }
    }
    eliminated
}

/// Ordinal anchors: each Content start offset gets a position; a run of
/// Unique items (ignoring successor/predecessor items in between) collapses
/// into the last Unique offset before the next Content anchor.
fn anchor_positions(rules: &[LexemRule], kept: &[&Candidate]) -> BTreeMap<usize, u32> {
    let mut positions = BTreeSet::new();
    let mut i = 0;
    while i < kept.len() {
        match rules[kept[i].rule].posbind {
            PositionBind::Content => {
                positions.insert(kept[i].pos);
                i += 1;
            }
            PositionBind::Successor | PositionBind::Predecessor => i += 1,
            PositionBind::Unique => {
                let mut lastpos = kept[i].pos;
                let mut j = i + 1;
                while j < kept.len() {
                    match rules[kept[j].rule].posbind {
                        PositionBind::Content => break,
                        PositionBind::Unique => {
                            lastpos = kept[j].pos;
                            j += 1;
                        }
                        _ => j += 1,
                    }
                }
                positions.insert(lastpos);
                i = j;
            }
        }
    }
    positions
        .into_iter()
        .enumerate()
        .map(|(idx, pos)| (pos, idx as u32 + 1))
        .collect()
}

pub(crate) fn scan_segment(
    rules: &[LexemRule],
    symbols: &HashMap<u32, HashMap<String, u32>>,
    segment: u32,
    src: &str,
) -> Vec<Lexem> {
    let mut candidates = collect_candidates(rules, src);
    candidates.sort_by(|a, b| {
        a.pos
            .cmp(&b.pos)
            .then(a.level.cmp(&b.level))
            .then(b.len.cmp(&a.len))
            .then(a.rule.cmp(&b.rule))
    });
    let eliminated = eliminate_covered(&candidates);
    let kept: Vec<&Candidate> = candidates
        .iter()
        .zip(&eliminated)
        .filter(|(_, gone)| !**gone)
        .map(|(c, _)| c)
        .collect();
    let ordposmap = anchor_positions(rules, &kept);

    let mut out = Vec::with_capacity(kept.len());
    for cand in kept {
        let rule = &rules[cand.rule];
        let ordpos = match rule.posbind {
            // Unresolvable successor/predecessor lexemes are dropped.
            PositionBind::Successor | PositionBind::Unique => {
                match ordposmap.range(cand.pos..).next() {
                    Some((_, &ord)) => ord,
                    None => continue,
                }
            }
            PositionBind::Predecessor => match ordposmap.range(..=cand.pos).next_back() {
                Some((_, &ord)) => ord,
                None => continue,
            },
            PositionBind::Content => ordposmap[&cand.pos],
        };
        if let Some(table) = symbols.get(&rule.id) {
            if let Some(&symid) = table.get(&src[cand.pos..cand.end()]) {
                out.push(Lexem::new(symid, ordpos, segment, cand.pos, cand.len));
            }
        }
        out.push(Lexem::new(rule.id, ordpos, segment, cand.pos, cand.len));
    }
    // Predecessor-bound lexemes can resolve to an earlier ordinal than
    // already-emitted neighbors; restore the feed-order invariant.
    out.sort_by_key(|lx| lx.ordpos);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::lexer::{PatternLexer, PatternLexerBuilder};
    use proptest::prelude::*;

    fn lexer(rules: &[(u32, &str, u32, PositionBind)]) -> Result<PatternLexer> {
        let mut b = PatternLexerBuilder::new();
        for (id, expr, level, posbind) in rules {
            b.define_lexem(*id, expr, 0, *level, *posbind)?;
        }
        Ok(b.compile())
    }

    #[test]
    fn single_rule_nonoverlapping_matches() {
        let lx = lexer(&[(1, "[Aa]+", 0, PositionBind::Content)]).unwrap();
        let out = lx.scan(0, "xAaabcdes");
        assert_eq!(out.len(), 1);
        let m = out[0];
        assert_eq!((m.id, m.ordpos, m.offset, m.size), (1, 1, 1, 3));
    }

    #[test]
    fn containment_with_higher_level_eliminates() {
        // Rule 2 (level 1) matches "abcd", fully containing rule 1's "bc".
        let lx = lexer(&[
            (1, "bc", 0, PositionBind::Content),
            (2, "abcd", 1, PositionBind::Content),
        ])
        .unwrap();
        let out = lx.scan(0, "xabcdx");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn containment_with_lower_level_does_not_eliminate() {
        let lx = lexer(&[
            (1, "bc", 1, PositionBind::Content),
            (2, "abcd", 0, PositionBind::Content),
        ])
        .unwrap();
        let out = lx.scan(0, "xabcdx");
        let ids: Vec<u32> = out.iter().map(|m| m.id).collect();
        assert!(ids.contains(&1) && ids.contains(&2));
    }

    #[test]
    fn overlap_without_containment_never_eliminates() {
        // "abc" (level 1) and "bcd" (level 0) overlap but neither contains
        // the other.
        let lx = lexer(&[
            (1, "abc", 1, PositionBind::Content),
            (2, "bcd", 0, PositionBind::Content),
        ])
        .unwrap();
        let out = lx.scan(0, "abcd");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn ordinal_positions_are_dense_and_increasing() {
        let lx = lexer(&[(1, "[a-z]+", 0, PositionBind::Content)]).unwrap();
        let out = lx.scan(0, "one two three four");
        let ords: Vec<u32> = out.iter().map(|m| m.ordpos).collect();
        assert_eq!(ords, vec![1, 2, 3, 4]);
    }

    #[test]
    fn ordinal_positions_independent_of_rule_order() {
        let fwd = lexer(&[
            (1, "[a-z]+", 0, PositionBind::Content),
            (2, "[0-9]+", 0, PositionBind::Content),
        ])
        .unwrap();
        let rev = lexer(&[
            (2, "[0-9]+", 0, PositionBind::Content),
            (1, "[a-z]+", 0, PositionBind::Content),
        ])
        .unwrap();
        let src = "a 1 b 2 c";
        let mut a = fwd.scan(0, src);
        let mut b = rev.scan(0, src);
        a.sort_by_key(|m| (m.ordpos, m.id));
        b.sort_by_key(|m| (m.ordpos, m.id));
        assert_eq!(a, b);
        assert_eq!(a.iter().map(|m| m.ordpos).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn successor_binds_to_following_anchor() {
        let lx = lexer(&[
            (1, "[a-z]+", 0, PositionBind::Content),
            (2, ">", 0, PositionBind::Successor),
        ])
        .unwrap();
        let out = lx.scan(0, "> abc");
        let succ = out.iter().find(|m| m.id == 2).unwrap();
        let word = out.iter().find(|m| m.id == 1).unwrap();
        assert_eq!(succ.ordpos, word.ordpos);
    }

    #[test]
    fn predecessor_binds_to_preceding_anchor() {
        let lx = lexer(&[
            (1, "[a-z]+", 0, PositionBind::Content),
            (2, "!", 0, PositionBind::Predecessor),
        ])
        .unwrap();
        let out = lx.scan(0, "abc! def");
        let bang = out.iter().find(|m| m.id == 2).unwrap();
        assert_eq!(bang.ordpos, 1);
    }

    #[test]
    fn unresolvable_successor_is_dropped() {
        let lx = lexer(&[
            (1, "[a-z]+", 0, PositionBind::Content),
            (2, ">", 0, PositionBind::Successor),
        ])
        .unwrap();
        // The '>' has no following content anchor.
        let out = lx.scan(0, "abc >");
        assert_eq!(out.iter().filter(|m| m.id == 2).count(), 0);
    }

    #[test]
    fn unresolvable_predecessor_is_dropped() {
        let lx = lexer(&[
            (1, "[a-z]+", 0, PositionBind::Content),
            (2, "!", 0, PositionBind::Predecessor),
        ])
        .unwrap();
        let out = lx.scan(0, "! abc");
        assert_eq!(out.iter().filter(|m| m.id == 2).count(), 0);
    }

    #[test]
    fn unique_run_collapses_to_last_before_content() {
        let lx = lexer(&[
            (1, "[a-z]+", 0, PositionBind::Content),
            (2, ";", 0, PositionBind::Unique),
        ])
        .unwrap();
        let out = lx.scan(0, "ab ; ; cd");
        let semis: Vec<&Lexem> = out.iter().filter(|m| m.id == 2).collect();
        assert_eq!(semis.len(), 2);
        // Both collapse onto one shared ordinal, between the two words.
        assert_eq!(semis[0].ordpos, semis[1].ordpos);
        let words: Vec<u32> = out.iter().filter(|m| m.id == 1).map(|m| m.ordpos).collect();
        assert_eq!(words, vec![1, 3]);
        assert_eq!(semis[0].ordpos, 2);
    }

    #[test]
    fn symbol_hit_emits_specialized_and_generic() {
        let mut b = PatternLexerBuilder::new();
        b.define_lexem(1, "[A-Za-z]+", 0, 0, PositionBind::Content)
            .unwrap();
        b.define_symbol(100, 1, "Mr").unwrap();
        let lx = b.compile();
        let out = lx.scan(0, "Mr Smith");
        let at_first: Vec<u32> = out.iter().filter(|m| m.ordpos == 1).map(|m| m.id).collect();
        assert_eq!(at_first, vec![100, 1]);
        let at_second: Vec<u32> = out.iter().filter(|m| m.ordpos == 2).map(|m| m.id).collect();
        assert_eq!(at_second, vec![1]);
    }

    #[test]
    fn segment_number_is_carried_through() {
        let lx = lexer(&[(1, "[a-z]+", 0, PositionBind::Content)]).unwrap();
        let out = lx.scan(7, "abc");
        assert_eq!(out[0].segment, 7);
    }

    #[test]
    fn output_is_ordered_by_ordinal_position() {
        let lx = lexer(&[
            (1, "[a-z]+", 0, PositionBind::Content),
            (2, ">", 0, PositionBind::Successor),
            (3, "!", 0, PositionBind::Predecessor),
        ])
        .unwrap();
        let out = lx.scan(0, "abc > def ! ghi");
        let ords: Vec<u32> = out.iter().map(|m| m.ordpos).collect();
        assert!(ords.windows(2).all(|w| w[0] <= w[1]), "{ords:?}");
    }

    proptest! {
        /// Scanning is reproducible: identical input yields identical output.
        #[test]
        fn scan_is_deterministic(src in "[a-z0-9 ;]{0,40}") {
            let lx = lexer(&[
                (1, "[a-z]+", 0, PositionBind::Content),
                (2, "[0-9]+", 1, PositionBind::Content),
                (3, ";", 0, PositionBind::Unique),
            ])
            .unwrap();
            let first = lx.scan(0, &src);
            let second = lx.scan(0, &src);
            prop_assert_eq!(first, second);
        }

        /// Content ordinals form a dense 1..=n sequence.
        #[test]
        fn content_ordinals_are_dense(src in "[a-z ]{0,40}") {
            let lx = lexer(&[(1, "[a-z]+", 0, PositionBind::Content)]).unwrap();
            let out = lx.scan(0, &src);
            for (idx, m) in out.iter().enumerate() {
                prop_assert_eq!(m.ordpos as usize, idx + 1);
            }
        }
    }
}
