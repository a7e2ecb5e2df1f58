use std::collections::HashMap;

use cranelift_entity::{entity_impl, PrimaryMap};
use descent_runtime::tree::BuilderMap;
use descent_runtime::LogFn;

use crate::action::{Action, ArcString};
use crate::compile;
use crate::error::CallSite;
use crate::mode::Mode;
use crate::parser::Parser;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RuleHandle(u32);

entity_impl! { RuleHandle }

impl RuleHandle {
    pub fn name<V>(self, grammar: &Grammar<V>) -> &ArcString {
        &grammar.rules[self].name
    }
}

/// A named rule: the collapsed body action plus the flags the validator
/// computed for it.
pub struct Rule {
    pub name: ArcString,
    pub site: CallSite,
    pub action: Action,
    /// Names this rule declared itself left-recursive on; empty when the rule
    /// was defined without a recursive declaration.
    pub recursive: Vec<ArcString>,
    /// Whether the rule can match zero input. Rule names ending in `?`
    /// declare this; the validator verifies the declaration.
    pub nullable: bool,
    /// Whether the rule contains no cross-rule references.
    pub terminal: bool,
}

/// A validated grammar: rules in definition order, the start rule, the mode,
/// and the registered capture builders. Immutable once built.
pub struct Grammar<V> {
    pub(crate) rules: PrimaryMap<RuleHandle, Rule>,
    pub(crate) name_idx: HashMap<ArcString, RuleHandle>,
    pub(crate) start: RuleHandle,
    pub(crate) mode: Mode,
    pub(crate) builders: BuilderMap<V>,
    pub(crate) log: Option<LogFn>,
}

impl<V> Grammar<V> {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn start(&self) -> RuleHandle {
        self.start
    }

    pub fn lookup(&self, name: &str) -> Option<RuleHandle> {
        self.name_idx.get(name).copied()
    }

    pub fn get_rule(&self, handle: RuleHandle) -> Option<&Rule> {
        self.rules.get(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleHandle, &Rule)> {
        self.rules.iter()
    }

    /// Compile every rule into its match function and wrap the result in a
    /// parser. Validation already ran when the grammar was built, so this
    /// cannot fail.
    pub fn parser(self) -> Parser<V> {
        compile::compile(self)
    }

    pub fn display_into(&self, buf: &mut dyn std::fmt::Write) -> std::fmt::Result {
        for (_, rule) in self.rules.iter() {
            write!(buf, "\n{} =\n", rule.name)?;
            rule.action.display_into_indent(buf, 1)?;
        }
        Ok(())
    }
}
