use std::collections::HashMap;
use std::sync::Arc;

use cranelift_entity::PrimaryMap;
use descent_runtime::tree::{BuilderFn, BuilderMap};
use descent_runtime::{BoxError, LogFn};

use crate::action::{Action, ActionKind, ArcString};
use crate::error::{CallSite, ErrorAccumulator, GrammarErrors};
use crate::grammar::{Grammar, Rule, RuleHandle};
use crate::mode::Mode;
use crate::validate;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Rule,
    /// One alternative of a `choice`; the only place `cut` may appear.
    Case,
    /// One arm of a dispatch operation.
    Arm,
    Group,
}

struct Frame {
    kind: FrameKind,
    children: Vec<Action>,
}

impl Frame {
    fn new(kind: FrameKind) -> Frame {
        Frame {
            kind,
            children: Vec::new(),
        }
    }
}

struct RuleCx {
    name: ArcString,
    recursive: Vec<ArcString>,
}

/// Records actions and rules during the grammar callback.
///
/// A stack of frames tracks the currently open combinator; every action
/// operation appends to the innermost frame, and nesting operations push a
/// frame around their body closure. Errors accumulate with the call site of
/// the offending operation; after the first error the remaining operations
/// become no-ops.
pub struct GrammarBuilder<V> {
    mode: Mode,
    /// Where `build_grammar` was invoked; grammar-level errors point here.
    site: CallSite,
    rules: PrimaryMap<RuleHandle, Rule>,
    name_idx: HashMap<ArcString, RuleHandle>,
    start: Option<(ArcString, CallSite)>,
    builders: BuilderMap<V>,
    builder_sites: Vec<(ArcString, CallSite)>,
    captures: HashMap<ArcString, CallSite>,
    calls: Vec<(ArcString, CallSite, Option<ArcString>)>,
    log: Option<LogFn>,
    frames: Vec<Frame>,
    rule_cx: Option<RuleCx>,
    err: ErrorAccumulator,
}

impl<V> GrammarBuilder<V> {
    pub(crate) fn new(mode: Mode, site: CallSite) -> GrammarBuilder<V> {
        GrammarBuilder {
            mode,
            site,
            rules: PrimaryMap::new(),
            name_idx: HashMap::new(),
            start: None,
            builders: BuilderMap::new(),
            builder_sites: Vec::new(),
            captures: HashMap::new(),
            calls: Vec::new(),
            log: None,
            frames: Vec::new(),
            rule_cx: None,
            err: ErrorAccumulator::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn rule_name(&self) -> Option<&ArcString> {
        self.rule_cx.as_ref().map(|cx| &cx.name)
    }

    fn error(&self, site: CallSite, message: impl Into<crate::error::Message>) {
        self.err.error(site, self.rule_name(), message);
    }

    fn should_exit(&self, site: CallSite) -> bool {
        if self.err.is_fatal() {
            return true;
        }
        if self.frames.is_empty() {
            self.error(site, "builder operations must be called inside define");
            return true;
        }
        false
    }

    fn push_action(&mut self, action: Action) {
        if !self.mode.allows(action.kind()) {
            let message = format!(
                "{} is not allowed in {} mode",
                action.kind().name(),
                self.mode.name()
            );
            self.error(action.site(), message);
            return;
        }
        self.frames
            .last_mut()
            .expect("no open frame")
            .children
            .push(action);
    }

    fn leaf(&mut self, site: CallSite, kind: ActionKind) {
        if self.should_exit(site) {
            return;
        }
        self.push_action(Action::new_leaf(kind, site));
    }

    fn group(
        &mut self,
        site: CallSite,
        kind: ActionKind,
        frame: FrameKind,
        body: impl FnOnce(&mut Self),
    ) {
        if self.should_exit(site) {
            return;
        }
        self.frames.push(Frame::new(frame));
        body(self);
        let frame = self.frames.pop().expect("unbalanced builder frame");
        if self.err.is_fatal() {
            return;
        }
        self.push_action(Action::new_group(kind, site, frame.children));
    }

    // ------------------------------------------------------------------
    // rule definition and grammar configuration

    #[track_caller]
    pub fn define(&mut self, name: &str, body: impl FnOnce(&mut Self)) {
        self.define_impl(CallSite::here(), name, &[], body)
    }

    /// Define a rule declared left-recursive on `recursive`. Only the
    /// declaring rule's own name is a supported declaration; the validator
    /// verifies the declaration against the actual left-call graph.
    #[track_caller]
    pub fn define_recursive(&mut self, name: &str, recursive: &[&str], body: impl FnOnce(&mut Self)) {
        self.define_impl(CallSite::here(), name, recursive, body)
    }

    fn define_impl(
        &mut self,
        site: CallSite,
        name: &str,
        recursive: &[&str],
        body: impl FnOnce(&mut Self),
    ) {
        if self.err.is_fatal() {
            return;
        }
        if !self.frames.is_empty() {
            self.error(site, "cannot call define inside define");
            return;
        }
        let name: ArcString = Arc::from(name);
        if let Some(&old) = self.name_idx.get(&name) {
            let old_site = self.rules[old].site;
            self.error(
                site,
                format!("cannot redefine {name:?}, already defined at {old_site}"),
            );
            return;
        }
        self.rule_cx = Some(RuleCx {
            name: name.clone(),
            recursive: recursive.iter().map(|&n| Arc::from(n)).collect(),
        });
        self.frames.push(Frame::new(FrameKind::Rule));
        body(self);
        let frame = self.frames.pop().expect("unbalanced builder frame");
        let rule_cx = self.rule_cx.take().expect("missing rule context");
        if self.err.is_fatal() {
            return;
        }
        let action = collapse_sequence(site, frame.children);
        let handle = self.rules.push(Rule {
            name: name.clone(),
            site,
            action,
            recursive: rule_cx.recursive,
            nullable: false,
            terminal: false,
        });
        self.name_idx.insert(name, handle);
    }

    #[track_caller]
    pub fn start(&mut self, name: &str) {
        let site = CallSite::here();
        if self.err.is_fatal() {
            return;
        }
        if self.start.is_some() {
            self.error(site, "starting rule already set");
            return;
        }
        self.start = Some((Arc::from(name), site));
    }

    /// Register the semantic-value constructor for a capture name.
    #[track_caller]
    pub fn builder(
        &mut self,
        name: &str,
        build: impl Fn(&str, Vec<V>) -> Result<V, BoxError> + Send + Sync + 'static,
    ) {
        let site = CallSite::here();
        if self.err.is_fatal() {
            return;
        }
        let name: ArcString = Arc::from(name);
        if !self.builders.insert(name.clone(), Box::new(build) as BuilderFn<V>) {
            self.error(site, format!("builder {name:?} already registered"));
            return;
        }
        self.builder_sites.push((name, site));
    }

    /// Route `Print`/`Trace` output somewhere other than the `log` crate.
    pub fn log_fn(&mut self, log: impl Fn(&str) + Send + Sync + 'static) {
        self.log = Some(Box::new(log));
    }

    // ------------------------------------------------------------------
    // terminals

    #[track_caller]
    pub fn rune(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Rune)
    }

    #[track_caller]
    pub fn byte(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Byte)
    }

    /// Match one rune inside any of the given ranges. A spec is either a
    /// single character (`"_"`) or an inclusive range (`"a-z"`).
    #[track_caller]
    pub fn rune_range<'s>(&mut self, specs: impl IntoIterator<Item = &'s str>) {
        self.rune_range_impl(CallSite::here(), specs, false)
    }

    /// Match one rune outside all of the given ranges.
    #[track_caller]
    pub fn rune_range_inverted<'s>(&mut self, specs: impl IntoIterator<Item = &'s str>) {
        self.rune_range_impl(CallSite::here(), specs, true)
    }

    fn rune_range_impl<'s>(
        &mut self,
        site: CallSite,
        specs: impl IntoIterator<Item = &'s str>,
        inverted: bool,
    ) {
        if self.should_exit(site) {
            return;
        }
        let mut ranges = Vec::new();
        for spec in specs {
            match parse_rune_range(spec) {
                Some(range) => ranges.push(range),
                None => {
                    self.error(site, format!("invalid range specification {spec:?}"));
                    return;
                }
            }
        }
        if ranges.is_empty() {
            self.error(site, "missing operand");
            return;
        }
        self.push_action(Action::new_leaf(
            ActionKind::RuneRange {
                ranges: ranges.into(),
                inverted,
            },
            site,
        ));
    }

    #[track_caller]
    pub fn byte_range(&mut self, ranges: &[(u8, u8)]) {
        self.byte_range_impl(CallSite::here(), ranges, false)
    }

    #[track_caller]
    pub fn byte_range_inverted(&mut self, ranges: &[(u8, u8)]) {
        self.byte_range_impl(CallSite::here(), ranges, true)
    }

    fn byte_range_impl(&mut self, site: CallSite, ranges: &[(u8, u8)], inverted: bool) {
        if self.should_exit(site) {
            return;
        }
        if ranges.is_empty() {
            self.error(site, "missing operand");
            return;
        }
        for &(lo, hi) in ranges {
            if lo > hi {
                self.error(site, format!("invalid range specification {lo:#04x}-{hi:#04x}"));
                return;
            }
        }
        self.push_action(Action::new_leaf(
            ActionKind::ByteRange {
                ranges: ranges.into(),
                inverted,
            },
            site,
        ));
    }

    /// Match the first of the given literal alternates, in order.
    #[track_caller]
    pub fn string<'s>(&mut self, alternates: impl IntoIterator<Item = &'s str>) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        let alternates = match self.string_alternates(site, alternates) {
            Some(alternates) => alternates,
            None => return,
        };
        self.push_action(Action::new_leaf(
            ActionKind::String {
                alternates: alternates.into(),
            },
            site,
        ));
    }

    /// Byte-level literal alternates for binary grammars.
    #[track_caller]
    pub fn byte_string<'s>(&mut self, alternates: impl IntoIterator<Item = &'s str>) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        let alternates: Vec<ArcString> = alternates.into_iter().map(Arc::from).collect();
        if let Some(message) = check_alternates(&alternates, &[]) {
            self.error(site, message);
            return;
        }
        self.push_action(Action::new_leaf(
            ActionKind::ByteString {
                alternates: alternates.into(),
            },
            site,
        ));
    }

    #[track_caller]
    pub fn bytes(&mut self, alternates: &[&[u8]]) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        if alternates.is_empty() {
            self.error(site, "missing operand");
            return;
        }
        if alternates.iter().any(|a| a.is_empty()) {
            self.error(site, "empty bytes alternate");
            return;
        }
        let alternates: Vec<crate::action::ArcBytes> =
            alternates.iter().map(|&a| Arc::from(a)).collect();
        self.push_action(Action::new_leaf(
            ActionKind::Bytes {
                alternates: alternates.into(),
            },
            site,
        ));
    }

    fn string_alternates<'s>(
        &self,
        site: CallSite,
        alternates: impl IntoIterator<Item = &'s str>,
    ) -> Option<Vec<ArcString>> {
        let alternates: Vec<ArcString> = alternates.into_iter().map(Arc::from).collect();
        if let Some(message) = check_alternates(&alternates, self.mode.reserved_strings()) {
            self.error(site, message);
            return None;
        }
        Some(alternates)
    }

    #[track_caller]
    pub fn space(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Space)
    }

    #[track_caller]
    pub fn tab(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Tab)
    }

    /// Any run of spaces and tabs, possibly empty.
    #[track_caller]
    pub fn whitespace(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Whitespace { min: 0, max: 0 })
    }

    /// Spaces and tabs totalling at least `min` and at most `max` columns
    /// (zero `max` means unbounded).
    #[track_caller]
    pub fn whitespace_columns(&mut self, min: u32, max: u32) {
        let site = CallSite::here();
        if max != 0 && min > max {
            if !self.should_exit(site) {
                self.error(site, "whitespace minimum exceeds maximum");
            }
            return;
        }
        self.leaf(site, ActionKind::Whitespace { min, max })
    }

    #[track_caller]
    pub fn newline(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Newline)
    }

    #[track_caller]
    pub fn whitespace_newline(&mut self) {
        self.leaf(CallSite::here(), ActionKind::WhitespaceNewline)
    }

    #[track_caller]
    pub fn start_of_line(&mut self) {
        self.leaf(CallSite::here(), ActionKind::StartOfLine)
    }

    #[track_caller]
    pub fn end_of_line(&mut self) {
        self.leaf(CallSite::here(), ActionKind::EndOfLine)
    }

    #[track_caller]
    pub fn start_of_file(&mut self) {
        self.leaf(CallSite::here(), ActionKind::StartOfFile)
    }

    #[track_caller]
    pub fn end_of_file(&mut self) {
        self.leaf(CallSite::here(), ActionKind::EndOfFile)
    }

    #[track_caller]
    pub fn indent(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Indent)
    }

    #[track_caller]
    pub fn dedent(&mut self) {
        self.leaf(CallSite::here(), ActionKind::Dedent)
    }

    // ------------------------------------------------------------------
    // rule references and left recursion

    #[track_caller]
    pub fn call(&mut self, name: &str) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        let name: ArcString = Arc::from(name);
        let rule = self.rule_name().cloned();
        self.calls.push((name.clone(), site, rule));
        self.push_action(Action::new_leaf(ActionKind::Call { name }, site));
    }

    /// Left-recursive reference accepting a candidate of equal or higher
    /// precedence.
    #[track_caller]
    pub fn recur(&mut self, name: &str) {
        let site = CallSite::here();
        if self.should_exit(site) || !self.require_recursive(site, name) {
            return;
        }
        let name: ArcString = Arc::from(name);
        let rule = self.rule_name().cloned();
        self.calls.push((name.clone(), site, rule));
        self.push_action(Action::new_leaf(ActionKind::Recur { name }, site));
    }

    /// Left-recursive reference requiring strictly higher precedence; used
    /// for the operand that must not re-associate.
    #[track_caller]
    pub fn stump(&mut self, name: &str) {
        let site = CallSite::here();
        if self.should_exit(site) || !self.require_recursive(site, name) {
            return;
        }
        let name: ArcString = Arc::from(name);
        let rule = self.rule_name().cloned();
        self.calls.push((name.clone(), site, rule));
        self.push_action(Action::new_leaf(ActionKind::Stump { name }, site));
    }

    /// Mark the current alternative as a left-recursive case with the given
    /// precedence.
    #[track_caller]
    pub fn corner(&mut self, name: &str, precedence: u32) {
        let site = CallSite::here();
        if self.should_exit(site) || !self.require_recursive(site, name) {
            return;
        }
        self.push_action(Action::new_leaf(
            ActionKind::Corner {
                name: Arc::from(name),
                precedence,
            },
            site,
        ));
    }

    /// Guard an alternative that must only be tried while no left-recursion
    /// candidate is active at the current offset.
    #[track_caller]
    pub fn no_corner(&mut self, name: &str, precedence: u32) {
        let site = CallSite::here();
        if self.should_exit(site) || !self.require_recursive(site, name) {
            return;
        }
        self.push_action(Action::new_leaf(
            ActionKind::NoCorner {
                name: Arc::from(name),
                precedence,
            },
            site,
        ));
    }

    fn require_recursive(&self, site: CallSite, name: &str) -> bool {
        let declared = self
            .rule_cx
            .as_ref()
            .map_or(false, |cx| cx.recursive.iter().any(|n| &**n == name));
        if !declared {
            self.error(
                site,
                format!("{name:?} is not declared recursive in this rule"),
            );
        }
        declared
    }

    // ------------------------------------------------------------------
    // combinators

    #[track_caller]
    pub fn sequence(&mut self, body: impl FnOnce(&mut Self)) {
        self.group(CallSite::here(), ActionKind::Sequence, FrameKind::Group, body)
    }

    #[track_caller]
    pub fn optional(&mut self, body: impl FnOnce(&mut Self)) {
        self.group(CallSite::here(), ActionKind::Optional, FrameKind::Group, body)
    }

    /// Repeat the body. `min == 0, max == 0` means any number of times;
    /// `max == 0` with a nonzero `min` means at least `min`.
    #[track_caller]
    pub fn repeat(&mut self, min: u32, max: u32, body: impl FnOnce(&mut Self)) {
        let site = CallSite::here();
        if max != 0 && min > max {
            if !self.should_exit(site) {
                self.error(site, "repeat minimum exceeds maximum");
            }
            return;
        }
        self.group(site, ActionKind::Repeat { min, max }, FrameKind::Group, body)
    }

    #[track_caller]
    pub fn lookahead(&mut self, body: impl FnOnce(&mut Self)) {
        self.group(CallSite::here(), ActionKind::Lookahead, FrameKind::Group, body)
    }

    #[track_caller]
    pub fn reject(&mut self, body: impl FnOnce(&mut Self)) {
        self.group(CallSite::here(), ActionKind::Reject, FrameKind::Group, body)
    }

    #[track_caller]
    pub fn trace(&mut self, body: impl FnOnce(&mut Self)) {
        self.group(CallSite::here(), ActionKind::Trace, FrameKind::Group, body)
    }

    #[track_caller]
    pub fn indented_block(&mut self, body: impl FnOnce(&mut Self)) {
        self.group(
            CallSite::here(),
            ActionKind::IndentedBlock,
            FrameKind::Group,
            body,
        )
    }

    #[track_caller]
    pub fn offside_block(&mut self, body: impl FnOnce(&mut Self)) {
        self.group(
            CallSite::here(),
            ActionKind::OffsideBlock,
            FrameKind::Group,
            body,
        )
    }

    /// Ordered alternatives; each one is introduced with
    /// [`case`](ChoiceCases::case).
    #[track_caller]
    pub fn choice(&mut self, body: impl FnOnce(&mut ChoiceCases<'_, V>)) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        self.frames.push(Frame::new(FrameKind::Group));
        body(&mut ChoiceCases { g: self });
        let frame = self.frames.pop().expect("unbalanced builder frame");
        if self.err.is_fatal() {
            return;
        }
        self.push_action(Action::new_group(ActionKind::Choice, site, frame.children));
    }

    /// Commit to the current choice case: once matching passes a `cut`, the
    /// remaining cases of the enclosing choice are not tried.
    #[track_caller]
    pub fn cut(&mut self) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        if self.frames.last().map(|f| f.kind) != Some(FrameKind::Case) {
            self.error(site, "Cut must appear directly inside a Choice case");
            return;
        }
        self.push_action(Action::new_leaf(ActionKind::Cut, site));
    }

    #[track_caller]
    pub fn capture(&mut self, name: &str, body: impl FnOnce(&mut Self)) {
        let site = CallSite::here();
        let name: ArcString = Arc::from(name);
        self.captures.entry(name.clone()).or_insert(site);
        self.group(site, ActionKind::Capture { name }, FrameKind::Group, body)
    }

    // ------------------------------------------------------------------
    // dispatch

    /// Dispatch on a peeked string prefix; arms are tried longest key first.
    #[track_caller]
    pub fn match_string(&mut self, body: impl FnOnce(&mut StringArms<'_, V>)) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        let mut arms = StringArms {
            g: self,
            keys: Vec::new(),
            children: Vec::new(),
        };
        body(&mut arms);
        let StringArms { keys, children, .. } = arms;
        if self.err.is_fatal() {
            return;
        }
        if keys.is_empty() {
            self.error(site, "match has no arms");
            return;
        }
        self.push_action(Action::new_group(
            ActionKind::MatchString { keys: keys.into() },
            site,
            children,
        ));
    }

    /// Dispatch on the next rune.
    #[track_caller]
    pub fn match_rune(&mut self, body: impl FnOnce(&mut RuneArms<'_, V>)) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        let mut arms = RuneArms {
            g: self,
            keys: Vec::new(),
            children: Vec::new(),
        };
        body(&mut arms);
        let RuneArms { keys, children, .. } = arms;
        if self.err.is_fatal() {
            return;
        }
        if keys.is_empty() {
            self.error(site, "match has no arms");
            return;
        }
        self.push_action(Action::new_group(
            ActionKind::MatchRune { keys: keys.into() },
            site,
            children,
        ));
    }

    /// Dispatch on the next byte.
    #[track_caller]
    pub fn match_byte(&mut self, body: impl FnOnce(&mut ByteArms<'_, V>)) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        let mut arms = ByteArms {
            g: self,
            keys: Vec::new(),
            children: Vec::new(),
        };
        body(&mut arms);
        let ByteArms { keys, children, .. } = arms;
        if self.err.is_fatal() {
            return;
        }
        if keys.is_empty() {
            self.error(site, "match has no arms");
            return;
        }
        self.push_action(Action::new_group(
            ActionKind::MatchByte { keys: keys.into() },
            site,
            children,
        ));
    }

    // ------------------------------------------------------------------
    // diagnostics

    /// Log a message through the grammar's sink whenever matching reaches
    /// this point. Never fails, never consumes.
    #[track_caller]
    pub fn print(&mut self, message: &str) {
        let site = CallSite::here();
        if self.should_exit(site) {
            return;
        }
        self.push_action(Action::new_leaf(
            ActionKind::Print {
                message: Arc::from(message),
            },
            site,
        ));
    }

    // ------------------------------------------------------------------
    // assembly

    fn collapse_arm(
        &mut self,
        site: CallSite,
        kind: FrameKind,
        body: impl FnOnce(&mut Self),
    ) -> Option<Action> {
        self.frames.push(Frame::new(kind));
        body(self);
        let frame = self.frames.pop().expect("unbalanced builder frame");
        if self.err.is_fatal() {
            return None;
        }
        Some(collapse_sequence(site, frame.children))
    }

    pub(crate) fn finish(mut self) -> Result<Grammar<V>, GrammarErrors> {
        let start = validate::run(validate::ValidateCx {
            rules: &mut self.rules,
            name_idx: &self.name_idx,
            grammar_site: self.site,
            start: self.start.as_ref(),
            calls: &self.calls,
            captures: &self.captures,
            builder_sites: &self.builder_sites,
            builder_names: &self.builders,
            mode: self.mode,
            err: &self.err,
        });
        let start = match start {
            Some(start) if self.err.is_empty() => start,
            _ => return Err(GrammarErrors::new(self.err.into_errors())),
        };
        Ok(Grammar {
            rules: self.rules,
            name_idx: self.name_idx,
            start,
            mode: self.mode,
            builders: self.builders,
            log: self.log,
        })
    }
}

/// Scope for the alternatives of a [`choice`](GrammarBuilder::choice).
pub struct ChoiceCases<'g, V> {
    g: &'g mut GrammarBuilder<V>,
}

impl<V> ChoiceCases<'_, V> {
    #[track_caller]
    pub fn case(&mut self, body: impl FnOnce(&mut GrammarBuilder<V>)) {
        let site = CallSite::here();
        if self.g.err.is_fatal() {
            return;
        }
        if let Some(case) = self.g.collapse_arm(site, FrameKind::Case, body) {
            self.g
                .frames
                .last_mut()
                .expect("no open frame")
                .children
                .push(case);
        }
    }
}

/// Scope for the arms of [`match_string`](GrammarBuilder::match_string).
pub struct StringArms<'g, V> {
    g: &'g mut GrammarBuilder<V>,
    keys: Vec<ArcString>,
    children: Vec<Action>,
}

impl<V> StringArms<'_, V> {
    #[track_caller]
    pub fn arm(&mut self, key: &str, body: impl FnOnce(&mut GrammarBuilder<V>)) {
        let site = CallSite::here();
        if self.g.err.is_fatal() {
            return;
        }
        if key.is_empty() {
            self.g.error(site, "empty match key");
            return;
        }
        if self.keys.iter().any(|k| &**k == key) {
            self.g.error(site, format!("duplicate match key {key:?}"));
            return;
        }
        if let Some(case) = self.g.collapse_arm(site, FrameKind::Arm, body) {
            self.keys.push(Arc::from(key));
            self.children.push(case);
        }
    }
}

/// Scope for the arms of [`match_rune`](GrammarBuilder::match_rune).
pub struct RuneArms<'g, V> {
    g: &'g mut GrammarBuilder<V>,
    keys: Vec<char>,
    children: Vec<Action>,
}

impl<V> RuneArms<'_, V> {
    #[track_caller]
    pub fn arm(&mut self, key: char, body: impl FnOnce(&mut GrammarBuilder<V>)) {
        let site = CallSite::here();
        if self.g.err.is_fatal() {
            return;
        }
        if self.keys.contains(&key) {
            self.g.error(site, format!("duplicate match key {key:?}"));
            return;
        }
        if let Some(case) = self.g.collapse_arm(site, FrameKind::Arm, body) {
            self.keys.push(key);
            self.children.push(case);
        }
    }
}

/// Scope for the arms of [`match_byte`](GrammarBuilder::match_byte).
pub struct ByteArms<'g, V> {
    g: &'g mut GrammarBuilder<V>,
    keys: Vec<u8>,
    children: Vec<Action>,
}

impl<V> ByteArms<'_, V> {
    #[track_caller]
    pub fn arm(&mut self, key: u8, body: impl FnOnce(&mut GrammarBuilder<V>)) {
        let site = CallSite::here();
        if self.g.err.is_fatal() {
            return;
        }
        if self.keys.contains(&key) {
            self.g.error(site, format!("duplicate match key {key:#04x}"));
            return;
        }
        if let Some(case) = self.g.collapse_arm(site, FrameKind::Arm, body) {
            self.keys.push(key);
            self.children.push(case);
        }
    }
}

fn collapse_sequence(site: CallSite, mut children: Vec<Action>) -> Action {
    if children.len() == 1 {
        return children.pop().unwrap();
    }
    Action::new_group(ActionKind::Sequence, site, children)
}

fn check_alternates(alternates: &[ArcString], reserved: &[&str]) -> Option<String> {
    if alternates.is_empty() {
        return Some("missing operand".to_string());
    }
    for alternate in alternates {
        if alternate.is_empty() {
            return Some("empty string alternate".to_string());
        }
        for r in reserved {
            if alternate.contains(r) {
                return Some(format!(
                    "string alternate {alternate:?} contains reserved {r:?}"
                ));
            }
        }
    }
    None
}

fn parse_rune_range(spec: &str) -> Option<(char, char)> {
    let mut chars = spec.chars();
    let lo = chars.next()?;
    match (chars.next(), chars.next(), chars.next()) {
        (None, ..) => Some((lo, lo)),
        (Some('-'), Some(hi), None) if lo <= hi => Some((lo, hi)),
        _ => None,
    }
}
