//! Static checks that run once after the builder callback returns: start
//! inference, call closure and reachability, capture/builder pairing,
//! terminality, nullability, left-recursion analysis, and a final
//! mode-compatibility sweep over the finished IR.

use std::collections::HashMap;

use cranelift_entity::{EntitySet, PrimaryMap, SecondaryMap};
use descent_runtime::tree::BuilderMap;

use crate::action::{Action, ActionKind, ArcString};
use crate::error::{CallSite, ErrorAccumulator};
use crate::grammar::{Rule, RuleHandle};
use crate::mode::Mode;

pub(crate) struct ValidateCx<'a, V> {
    pub rules: &'a mut PrimaryMap<RuleHandle, Rule>,
    pub name_idx: &'a HashMap<ArcString, RuleHandle>,
    pub grammar_site: CallSite,
    pub start: Option<&'a (ArcString, CallSite)>,
    pub calls: &'a [(ArcString, CallSite, Option<ArcString>)],
    pub captures: &'a HashMap<ArcString, CallSite>,
    pub builder_sites: &'a [(ArcString, CallSite)],
    pub builder_names: &'a BuilderMap<V>,
    pub mode: Mode,
    pub err: &'a ErrorAccumulator,
}

pub(crate) fn run<V>(cx: ValidateCx<'_, V>) -> Option<RuleHandle> {
    if cx.err.is_fatal() {
        // builder operations already failed; everything below would only
        // report consequences of that failure
        return None;
    }

    let start = infer_start(&cx);
    check_closure(&cx);
    if let Some(start) = start {
        check_reachable(&cx, start);
    }
    check_builders(&cx);
    mark_terminal(cx.rules);
    let nullable = check_nullability(cx.rules, cx.name_idx, cx.err);
    check_left_recursion(cx.rules, cx.name_idx, &nullable, cx.err);
    check_modes(&cx);
    start
}

fn infer_start<V>(cx: &ValidateCx<'_, V>) -> Option<RuleHandle> {
    match cx.start {
        Some((name, site)) => match cx.name_idx.get(name) {
            Some(&handle) => Some(handle),
            None => {
                cx.err
                    .report(*site, None, format!("starting rule {name:?} is missing"));
                None
            }
        },
        None => {
            if cx.rules.len() == 1 {
                return cx.rules.iter().next().map(|(handle, _)| handle);
            }
            cx.err
                .report(cx.grammar_site, None, "starting rule undefined");
            None
        }
    }
}

fn check_closure<V>(cx: &ValidateCx<'_, V>) {
    for (name, site, rule) in cx.calls {
        if !cx.name_idx.contains_key(name) {
            cx.err
                .report(*site, rule.as_ref(), format!("missing rule {name:?}"));
        }
    }
}

fn check_reachable<V>(cx: &ValidateCx<'_, V>, start: RuleHandle) {
    let mut reachable = EntitySet::new();
    let mut stack = vec![start];
    reachable.insert(start);
    while let Some(handle) = stack.pop() {
        cx.rules[handle].action.visit(|action| {
            if let Some(target) = action.kind().call_target() {
                if let Some(&target) = cx.name_idx.get(target) {
                    if !reachable.contains(target) {
                        reachable.insert(target);
                        stack.push(target);
                    }
                }
            }
        });
    }
    for (handle, rule) in cx.rules.iter() {
        if handle != start && !reachable.contains(handle) {
            cx.err.report(
                rule.site,
                Some(&rule.name),
                format!("unused rule {:?}", &*rule.name),
            );
        }
    }
}

fn check_builders<V>(cx: &ValidateCx<'_, V>) {
    if cx.builder_names.is_empty() {
        return;
    }
    for (name, site) in cx.builder_sites {
        if !cx.captures.contains_key(name) {
            cx.err.report(
                *site,
                None,
                format!("builder {:?} has no matching capture", &**name),
            );
        }
    }
    for (name, &site) in cx.captures {
        if !cx.builder_names.contains(name) {
            cx.err.report(
                site,
                None,
                format!("capture {:?} has no builder", &**name),
            );
        }
    }
}

/// An action is terminal when it contains no cross-rule reference; a rule is
/// terminal when its root is.
fn mark_terminal(rules: &mut PrimaryMap<RuleHandle, Rule>) {
    for (_, rule) in rules.iter_mut() {
        let mut terminal = true;
        rule.action.visit(|action| {
            if matches!(
                action.kind(),
                ActionKind::Call { .. }
                    | ActionKind::Recur { .. }
                    | ActionKind::Stump { .. }
                    | ActionKind::Corner { .. }
                    | ActionKind::NoCorner { .. }
            ) {
                terminal = false;
            }
        });
        rule.terminal = terminal;
    }
}

/// Fixpoint over the action trees. A rule name ending in `?` must be
/// nullable; any other rule must not be.
fn check_nullability(
    rules: &mut PrimaryMap<RuleHandle, Rule>,
    name_idx: &HashMap<ArcString, RuleHandle>,
    err: &ErrorAccumulator,
) -> SecondaryMap<RuleHandle, bool> {
    let mut nullable: SecondaryMap<RuleHandle, bool> = SecondaryMap::new();
    loop {
        let mut changed = false;
        for (handle, rule) in rules.iter() {
            if !nullable[handle] && action_nullable(&rule.action, name_idx, &nullable) {
                nullable[handle] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    for (handle, rule) in rules.iter_mut() {
        rule.nullable = nullable[handle];
        let declared = rule.name.ends_with('?');
        if declared && !rule.nullable {
            err.report(
                rule.site,
                Some(&rule.name),
                "rule is declared nullable but cannot match empty input",
            );
        } else if !declared && rule.nullable {
            err.report(
                rule.site,
                Some(&rule.name),
                "rule can match empty input but is not declared nullable (append ? to its name)",
            );
        }
    }
    nullable
}

fn action_nullable(
    action: &Action,
    name_idx: &HashMap<ArcString, RuleHandle>,
    nullable: &SecondaryMap<RuleHandle, bool>,
) -> bool {
    let all = |action: &Action| {
        action
            .children()
            .iter()
            .all(|child| action_nullable(child, name_idx, nullable))
    };
    let any = |action: &Action| {
        action
            .children()
            .iter()
            .any(|child| action_nullable(child, name_idx, nullable))
    };
    match action.kind() {
        ActionKind::Sequence | ActionKind::Capture { .. } | ActionKind::Trace => all(action),
        ActionKind::Choice
        | ActionKind::MatchString { .. }
        | ActionKind::MatchRune { .. }
        | ActionKind::MatchByte { .. } => any(action),
        ActionKind::Optional
        | ActionKind::Lookahead
        | ActionKind::Reject
        | ActionKind::Cut
        | ActionKind::Print { .. }
        | ActionKind::StartOfFile
        | ActionKind::EndOfFile
        | ActionKind::StartOfLine
        | ActionKind::EndOfLine
        | ActionKind::Indent
        | ActionKind::Dedent
        | ActionKind::WhitespaceNewline
        | ActionKind::Corner { .. }
        | ActionKind::NoCorner { .. } => true,
        ActionKind::Repeat { min, .. } => *min == 0 || all(action),
        ActionKind::Whitespace { min, .. } => *min == 0,
        ActionKind::OffsideBlock => all(action),
        ActionKind::IndentedBlock => false,
        ActionKind::Rune
        | ActionKind::Byte
        | ActionKind::RuneRange { .. }
        | ActionKind::ByteRange { .. }
        | ActionKind::String { .. }
        | ActionKind::ByteString { .. }
        | ActionKind::Bytes { .. }
        | ActionKind::Space
        | ActionKind::Tab
        | ActionKind::Newline => false,
        ActionKind::Call { name } | ActionKind::Recur { name } | ActionKind::Stump { name } => {
            name_idx.get(name).map_or(false, |&handle| nullable[handle])
        }
    }
}

/// Build the direct left-call set of every rule (leftmost reachable targets
/// over zero-width prefixes), close it transitively, and verify the
/// declarations: a left-recursive rule must declare itself, the declared set
/// must match the recursion group, and only direct self-recursion is
/// supported.
fn check_left_recursion(
    rules: &PrimaryMap<RuleHandle, Rule>,
    name_idx: &HashMap<ArcString, RuleHandle>,
    nullable: &SecondaryMap<RuleHandle, bool>,
    err: &ErrorAccumulator,
) {
    let mut left: SecondaryMap<RuleHandle, HashMap<RuleHandle, CallSite>> = SecondaryMap::new();
    for (handle, rule) in rules.iter() {
        let mut set = HashMap::new();
        collect_left_targets(&rule.action, name_idx, nullable, &mut set);
        left[handle] = set;
    }

    let handles: Vec<RuleHandle> = rules.keys().collect();
    loop {
        let mut changed = false;
        for &handle in &handles {
            let direct: Vec<RuleHandle> = left[handle].keys().copied().collect();
            for target in direct {
                let additions: Vec<(RuleHandle, CallSite)> =
                    left[target].iter().map(|(&k, &v)| (k, v)).collect();
                let set = &mut left[handle];
                for (k, v) in additions {
                    if let std::collections::hash_map::Entry::Vacant(slot) = set.entry(k) {
                        slot.insert(v);
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    for (handle, rule) in rules.iter() {
        let self_left = left[handle].contains_key(&handle);
        let declared = !rule.recursive.is_empty();
        if !declared {
            if self_left {
                let site = left[handle][&handle];
                err.report(
                    site,
                    Some(&rule.name),
                    "left recursion must be declared with a recursive definition",
                );
            }
            continue;
        }
        if !self_left {
            err.report(
                rule.site,
                Some(&rule.name),
                "rule is declared recursive but has no left recursion",
            );
            continue;
        }
        let group: Vec<RuleHandle> = handles
            .iter()
            .copied()
            .filter(|&other| {
                other == handle
                    || (left[handle].contains_key(&other) && left[other].contains_key(&handle))
            })
            .collect();
        if group.len() > 1 {
            err.report(
                rule.site,
                Some(&rule.name),
                "mutual left recursion is not supported",
            );
            continue;
        }
        let matches_group = rule.recursive.len() == 1 && rule.recursive[0] == rule.name;
        if !matches_group {
            err.report(
                rule.site,
                Some(&rule.name),
                "recursive declaration must name exactly the rule's own left-recursion group",
            );
        }
    }
}

fn collect_left_targets(
    action: &Action,
    name_idx: &HashMap<ArcString, RuleHandle>,
    nullable: &SecondaryMap<RuleHandle, bool>,
    out: &mut HashMap<RuleHandle, CallSite>,
) {
    match action.kind() {
        ActionKind::Call { name } | ActionKind::Recur { name } | ActionKind::Stump { name } => {
            if let Some(&target) = name_idx.get(name) {
                out.entry(target).or_insert(action.site());
            }
        }
        ActionKind::Choice
        | ActionKind::MatchString { .. }
        | ActionKind::MatchRune { .. }
        | ActionKind::MatchByte { .. } => {
            for child in action.children() {
                collect_left_targets(child, name_idx, nullable, out);
            }
        }
        // entering an indented block always consumes input, so nothing inside
        // it is a leftmost call
        ActionKind::IndentedBlock => {}
        _ => {
            for child in action.children() {
                collect_left_targets(child, name_idx, nullable, out);
                if !action_nullable(child, name_idx, nullable) {
                    break;
                }
            }
        }
    }
}

fn check_modes<V>(cx: &ValidateCx<'_, V>) {
    for (_, rule) in cx.rules.iter() {
        rule.action.visit(|action| {
            if !cx.mode.allows(action.kind()) {
                cx.err.report(
                    action.site(),
                    Some(&rule.name),
                    format!(
                        "{} is not allowed in {} mode",
                        action.kind().name(),
                        cx.mode.name()
                    ),
                );
            }
        });
    }
}
