//! Lowers every action of a validated grammar into a match closure over
//! precomputed data: literal tables, dispatch tables, resolved rule indices.
//! Rule roots are wrapped with the entry protocol (per-rule start tracking,
//! cut clearing) and, for declared left-recursive rules, the seed-and-grow
//! driver.

use std::collections::HashMap;

use cranelift_entity::EntityRef;
use descent_runtime::state::{Corner, Floor, ParseCtx, ParserState};
use descent_runtime::{LogFn, NO_INDEX};

use crate::action::{Action, ActionKind, ArcString};
use crate::grammar::{Grammar, Rule};
use crate::parser::{CompiledRule, Machine, MatchFn, Parser};

struct CompileCx {
    name_idx: HashMap<ArcString, usize>,
}

impl CompileCx {
    fn rule_index(&self, name: &ArcString) -> usize {
        *self
            .name_idx
            .get(name)
            .expect("call target missing after validation")
    }
}

pub(crate) fn compile<V>(grammar: Grammar<V>) -> Parser<V> {
    let cx = CompileCx {
        name_idx: grammar
            .name_idx
            .iter()
            .map(|(name, &handle)| (name.clone(), handle.index()))
            .collect(),
    };

    let mut rules = Vec::with_capacity(grammar.rules.len());
    for (handle, rule) in grammar.rules.iter() {
        rules.push(CompiledRule {
            name: rule.name.clone(),
            entry: compile_rule(&cx, rule, handle.index()),
        });
    }

    let machine = Machine {
        rules,
        name_idx: cx.name_idx,
        start: grammar.start.index(),
        tabstop: grammar.mode.tabstop(),
        log: grammar.log.unwrap_or_else(default_log),
    };
    Parser {
        machine,
        builders: grammar.builders,
    }
}

fn default_log() -> LogFn {
    Box::new(|message| log::debug!(target: "descent", "{message}"))
}

fn run_all(m: &Machine, ctx: &mut ParseCtx<'_>, s: &mut ParserState, fns: &[MatchFn]) -> bool {
    fns.iter().all(|f| f(m, ctx, s))
}

/// Wrap a compiled rule body with the entry protocol: record where the
/// activation began (the left-recursion machinery keys on it), clear the cut
/// flag for the body, and restore both on the way out.
fn compile_rule(cx: &CompileCx, rule: &Rule, index: usize) -> MatchFn {
    let body = compile_action(cx, rule, &rule.action);
    if rule.recursive.is_empty() {
        Box::new(move |m, ctx, s| {
            let saved_cut = ctx.set_cut(false);
            let saved_start = ctx.set_rule_start(index, s.offset);
            let mut attempt = *s;
            let ok = body(m, ctx, &mut attempt);
            ctx.set_rule_start(index, saved_start);
            ctx.set_cut(saved_cut);
            if ok {
                *s = attempt;
            } else {
                ctx.trim_nodes(s.num_nodes);
            }
            ok
        })
    } else {
        Box::new(move |m, ctx, s| {
            let saved_cut = ctx.set_cut(false);
            let saved_start = ctx.set_rule_start(index, s.offset);
            let saved_corner = ctx.set_corner(index, None);
            let ok = grow(m, ctx, s, index, &body);
            ctx.set_corner(index, saved_corner);
            ctx.set_rule_start(index, saved_start);
            ctx.set_cut(saved_cut);
            ok
        })
    }
}

/// Seed-and-grow for a left-recursive rule at the current offset.
///
/// The body first runs with no corner installed, which fails the
/// left-recursive alternatives (`Recur`/`Stump` at the activation offset find
/// nothing to apply) and lets a non-recursive alternative produce the seed.
/// The body is then re-run with the best candidate installed; each run that
/// strictly extends the parse becomes the new candidate, and growth stops at
/// the first run that does not.
fn grow(
    m: &Machine,
    ctx: &mut ParseCtx<'_>,
    s: &mut ParserState,
    index: usize,
    body: &MatchFn,
) -> bool {
    let mut base = *s;
    base.last_sibling = NO_INDEX;
    base.count_sibling = 0;

    let mut attempt = base;
    if !body(m, ctx, &mut attempt) {
        ctx.trim_nodes(base.num_nodes);
        return false;
    }
    let mut corner = Corner {
        precedence: attempt.precedence,
        siblings: ctx.collect_siblings(&attempt),
        state: attempt,
    };

    loop {
        let mut attempt = base;
        attempt.num_nodes = corner.state.num_nodes;
        ctx.set_corner(index, Some(corner));
        ctx.set_cut(false);
        let ok = body(m, ctx, &mut attempt);
        corner = ctx
            .set_corner(index, None)
            .expect("corner removed during growth");
        if ok && attempt.offset > corner.state.offset {
            corner = Corner {
                precedence: attempt.precedence,
                siblings: ctx.collect_siblings(&attempt),
                state: attempt,
            };
        } else {
            ctx.trim_nodes(corner.state.num_nodes);
            break;
        }
    }

    let end = corner.state;
    s.offset = end.offset;
    s.column = end.column;
    s.line_start = end.line_start;
    s.line_number = end.line_number;
    s.line_indent = end.line_indent;
    s.num_nodes = end.num_nodes;
    ctx.splice_siblings(s, &corner.siblings);
    true
}

fn compile_children(cx: &CompileCx, rule: &Rule, action: &Action) -> Vec<MatchFn> {
    action
        .children()
        .iter()
        .map(|child| compile_action(cx, rule, child))
        .collect()
}

fn compile_action(cx: &CompileCx, rule: &Rule, action: &Action) -> MatchFn {
    match action.kind() {
        // ------------------------------------------------------------------
        // terminals
        ActionKind::Rune => Box::new(|_m, ctx, s| ctx.advance_rune(s).is_some()),
        ActionKind::Byte => Box::new(|_m, ctx, s| ctx.advance_byte(s).is_some()),
        ActionKind::RuneRange { ranges, inverted } => {
            let ranges = ranges.clone();
            let inverted = *inverted;
            Box::new(move |_m, ctx, s| {
                let c = match ctx.peek_rune(s) {
                    Some(c) => c,
                    None => return false,
                };
                let inside = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
                if inside == inverted {
                    return false;
                }
                ctx.advance_rune(s);
                true
            })
        }
        ActionKind::ByteRange { ranges, inverted } => {
            let ranges = ranges.clone();
            let inverted = *inverted;
            Box::new(move |_m, ctx, s| {
                let b = match ctx.peek_byte(s) {
                    Some(b) => b,
                    None => return false,
                };
                let inside = ranges.iter().any(|&(lo, hi)| lo <= b && b <= hi);
                if inside == inverted {
                    return false;
                }
                ctx.advance_byte(s);
                true
            })
        }
        ActionKind::String { alternates } => {
            let alternates = alternates.clone();
            Box::new(move |_m, ctx, s| {
                alternates
                    .iter()
                    .any(|alternate| ctx.advance_str(s, alternate.as_bytes()))
            })
        }
        ActionKind::ByteString { alternates } => {
            let alternates = alternates.clone();
            Box::new(move |_m, ctx, s| {
                alternates
                    .iter()
                    .any(|alternate| ctx.advance_bytes(s, alternate.as_bytes()))
            })
        }
        ActionKind::Bytes { alternates } => {
            let alternates = alternates.clone();
            Box::new(move |_m, ctx, s| {
                alternates
                    .iter()
                    .any(|alternate| ctx.advance_bytes(s, alternate))
            })
        }
        ActionKind::Space => Box::new(|_m, ctx, s| ctx.match_space(s)),
        ActionKind::Tab => Box::new(|_m, ctx, s| ctx.match_tab(s)),
        ActionKind::Whitespace { min, max } => {
            let (min, max) = (*min, *max);
            Box::new(move |_m, ctx, s| ctx.match_whitespace(s, min, max))
        }
        ActionKind::Newline => Box::new(|_m, ctx, s| ctx.match_newline(s)),
        ActionKind::WhitespaceNewline => Box::new(|_m, ctx, s| ctx.match_whitespace_newline(s)),
        ActionKind::StartOfFile => Box::new(|_m, _ctx, s| s.offset == 0),
        ActionKind::EndOfFile => Box::new(|_m, ctx, s| ctx.at_end(s)),
        ActionKind::StartOfLine => Box::new(|_m, _ctx, s| s.offset == s.line_start),
        ActionKind::EndOfLine => Box::new(|_m, ctx, s| ctx.at_end(s) || ctx.match_newline(s)),
        ActionKind::Indent => Box::new(|_m, ctx, s| ctx.match_indent(s)),
        // declared but deliberately inert; see the design notes
        ActionKind::Dedent => Box::new(|_m, _ctx, _s| true),

        // ------------------------------------------------------------------
        // combinators
        ActionKind::Sequence => {
            let children = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let mut attempt = *s;
                if run_all(m, ctx, &mut attempt, &children) {
                    *s = attempt;
                    true
                } else {
                    ctx.trim_nodes(s.num_nodes);
                    false
                }
            })
        }
        ActionKind::Choice => {
            let cases = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let saved_cut = ctx.set_cut(false);
                for case in &cases {
                    ctx.set_cut(false);
                    let mut attempt = *s;
                    if case(m, ctx, &mut attempt) {
                        *s = attempt;
                        ctx.set_cut(saved_cut);
                        return true;
                    }
                    ctx.trim_nodes(s.num_nodes);
                    if ctx.cut() {
                        break;
                    }
                }
                ctx.set_cut(saved_cut);
                false
            })
        }
        ActionKind::Cut => Box::new(|_m, ctx, _s| {
            ctx.set_cut(true);
            true
        }),
        ActionKind::Optional => {
            let children = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let mut attempt = *s;
                if run_all(m, ctx, &mut attempt, &children) {
                    *s = attempt;
                } else {
                    ctx.trim_nodes(s.num_nodes);
                }
                true
            })
        }
        ActionKind::Repeat { min, max } => {
            let children = compile_children(cx, rule, action);
            let (min, max) = (*min, *max);
            Box::new(move |m, ctx, s| {
                let mut committed = *s;
                let mut cursor = *s;
                let mut count: u32 = 0;
                loop {
                    let mark = cursor;
                    if !run_all(m, ctx, &mut cursor, &children) {
                        ctx.trim_nodes(mark.num_nodes);
                        break;
                    }
                    if cursor.offset == mark.offset {
                        // a zero-width iteration would never stop
                        ctx.trim_nodes(mark.num_nodes);
                        break;
                    }
                    count += 1;
                    if count >= min {
                        committed = cursor;
                    }
                    if max != 0 && count >= max {
                        break;
                    }
                }
                if count >= min {
                    *s = committed;
                    true
                } else {
                    ctx.trim_nodes(s.num_nodes);
                    false
                }
            })
        }
        ActionKind::Lookahead => {
            let children = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let mut probe = *s;
                let ok = run_all(m, ctx, &mut probe, &children);
                ctx.trim_nodes(s.num_nodes);
                ok
            })
        }
        ActionKind::Reject => {
            let children = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let mut probe = *s;
                let ok = run_all(m, ctx, &mut probe, &children);
                ctx.trim_nodes(s.num_nodes);
                !ok
            })
        }

        // ------------------------------------------------------------------
        // capture
        ActionKind::Capture { name } => {
            let name = name.clone();
            let children = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let mut attempt = *s;
                attempt.last_sibling = NO_INDEX;
                attempt.count_sibling = 0;
                if run_all(m, ctx, &mut attempt, &children) {
                    ctx.commit_capture(&mut attempt, &name, s.offset, s.last_sibling, s.count_sibling);
                    *s = attempt;
                    true
                } else {
                    ctx.trim_nodes(s.num_nodes);
                    false
                }
            })
        }

        // ------------------------------------------------------------------
        // rule references
        ActionKind::Call { name } => {
            let index = cx.rule_index(name);
            Box::new(move |m, ctx, s| {
                let saved = ctx.set_floor(index, Floor::default());
                let ok = (m.rules[index].entry)(m, ctx, s);
                ctx.set_floor(index, saved);
                ok
            })
        }
        ActionKind::Recur { name } => compile_recur(cx.rule_index(name), false),
        ActionKind::Stump { name } => compile_recur(cx.rule_index(name), true),
        ActionKind::Corner { name, precedence } => {
            let index = cx.rule_index(name);
            let precedence = *precedence;
            Box::new(move |_m, ctx, s| {
                if !ctx.floor(index).admits(precedence) {
                    return false;
                }
                s.precedence = precedence;
                true
            })
        }
        ActionKind::NoCorner { name, precedence } => {
            let index = cx.rule_index(name);
            let precedence = *precedence;
            Box::new(move |_m, ctx, s| {
                if ctx.has_corner_at(index, s.offset) {
                    return false;
                }
                if !ctx.floor(index).admits(precedence) {
                    return false;
                }
                s.precedence = precedence;
                true
            })
        }

        // ------------------------------------------------------------------
        // dispatch
        ActionKind::MatchString { keys } => {
            let children = compile_children(cx, rule, action);
            let keys = keys.clone();
            // longest key first so dispatch does not depend on arm order
            let mut order: Vec<usize> = (0..keys.len()).collect();
            order.sort_by(|&a, &b| {
                keys[b]
                    .len()
                    .cmp(&keys[a].len())
                    .then_with(|| keys[a].cmp(&keys[b]))
            });
            Box::new(move |m, ctx, s| {
                for &i in &order {
                    if ctx.rest(s).starts_with(keys[i].as_bytes()) {
                        return children[i](m, ctx, s);
                    }
                }
                false
            })
        }
        ActionKind::MatchRune { keys } => {
            let children = compile_children(cx, rule, action);
            let mut table: Vec<(char, usize)> =
                keys.iter().enumerate().map(|(i, &key)| (key, i)).collect();
            table.sort_by_key(|&(key, _)| key);
            Box::new(move |m, ctx, s| {
                let c = match ctx.peek_rune(s) {
                    Some(c) => c,
                    None => return false,
                };
                match table.binary_search_by_key(&c, |&(key, _)| key) {
                    Ok(slot) => children[table[slot].1](m, ctx, s),
                    Err(_) => false,
                }
            })
        }
        ActionKind::MatchByte { keys } => {
            let children = compile_children(cx, rule, action);
            let mut table = [usize::MAX; 256];
            for (i, &key) in keys.iter().enumerate() {
                table[key as usize] = i;
            }
            Box::new(move |m, ctx, s| {
                let b = match ctx.peek_byte(s) {
                    Some(b) => b,
                    None => return false,
                };
                let slot = table[b as usize];
                if slot == usize::MAX {
                    return false;
                }
                children[slot](m, ctx, s)
            })
        }

        // ------------------------------------------------------------------
        // layout
        ActionKind::IndentedBlock => {
            let children = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let mut attempt = *s;
                if !ctx.push_indented_block(&mut attempt) {
                    return false;
                }
                if run_all(m, ctx, &mut attempt, &children) {
                    attempt.match_indent = s.match_indent;
                    *s = attempt;
                    true
                } else {
                    ctx.trim_nodes(s.num_nodes);
                    false
                }
            })
        }
        ActionKind::OffsideBlock => {
            let children = compile_children(cx, rule, action);
            Box::new(move |m, ctx, s| {
                let mut attempt = *s;
                ctx.push_offside_block(&mut attempt);
                if run_all(m, ctx, &mut attempt, &children) {
                    attempt.match_indent = s.match_indent;
                    *s = attempt;
                    true
                } else {
                    ctx.trim_nodes(s.num_nodes);
                    false
                }
            })
        }

        // ------------------------------------------------------------------
        // diagnostics
        ActionKind::Print { message } => {
            let message = message.clone();
            let rule_name = rule.name.clone();
            let site = action.site();
            Box::new(move |m, _ctx, s| {
                m.emit(&format!(
                    "{site}: print({message:?}) inside {rule_name:?} at offset {}",
                    s.offset
                ));
                true
            })
        }
        ActionKind::Trace => {
            let children = compile_children(cx, rule, action);
            let rule_name = rule.name.clone();
            let site = action.site();
            Box::new(move |m, ctx, s| {
                m.emit(&format!(
                    "{site}: trace enter inside {rule_name:?} at offset {}",
                    s.offset
                ));
                let mut attempt = *s;
                if run_all(m, ctx, &mut attempt, &children) {
                    *s = attempt;
                    m.emit(&format!(
                        "{site}: trace exit inside {rule_name:?} at offset {}",
                        s.offset
                    ));
                    true
                } else {
                    ctx.trim_nodes(s.num_nodes);
                    m.emit(&format!(
                        "{site}: trace fail inside {rule_name:?} at offset {}",
                        s.offset
                    ));
                    false
                }
            })
        }
    }
}

/// `Recur` and `Stump` at the offset their rule's activation began apply the
/// current corner (equal-or-higher precedence for `Recur`, strictly higher
/// for `Stump`); anywhere else they are ordinary calls entered under a
/// precedence floor.
fn compile_recur(index: usize, strict: bool) -> MatchFn {
    Box::new(move |m, ctx, s| {
        if ctx.rule_start(index) == s.offset {
            return ctx.apply_corner(s, index, strict);
        }
        let saved = ctx.set_floor(
            index,
            Floor {
                min: s.precedence,
                exclusive: strict,
            },
        );
        let ok = (m.rules[index].entry)(m, ctx, s);
        ctx.set_floor(index, saved);
        ok
    })
}
