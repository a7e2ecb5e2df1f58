use std::collections::HashMap;

use descent_runtime::state::{ParseCtx, ParserState};
use descent_runtime::tree::{BuilderMap, ParseTree};
use descent_runtime::{LogFn, ParseError};

use crate::action::ArcString;

/// The signature every action compiles down to.
pub(crate) type MatchFn =
    Box<dyn Fn(&Machine, &mut ParseCtx<'_>, &mut ParserState) -> bool + Send + Sync>;

pub(crate) struct CompiledRule {
    pub name: ArcString,
    pub entry: MatchFn,
}

/// The compiled, immutable half of a parser. Rule references resolve through
/// this table at run time, so rules may call each other in any order.
pub(crate) struct Machine {
    pub rules: Vec<CompiledRule>,
    pub name_idx: HashMap<ArcString, usize>,
    pub start: usize,
    pub tabstop: u32,
    pub log: LogFn,
}

impl Machine {
    pub fn emit(&self, message: &str) {
        (self.log)(message)
    }
}

/// A compiled grammar. Immutable and safe to share across threads; every
/// call to [`parse_tree`](Parser::parse_tree) owns its own state and arena.
pub struct Parser<V> {
    pub(crate) machine: Machine,
    pub(crate) builders: BuilderMap<V>,
}

impl<V> Parser<V> {
    /// Run the start rule over the whole input. Succeeds only when the rule
    /// matches and consumes every byte; there are no partial parses.
    pub fn parse_tree<'a>(&self, input: &'a str) -> Result<ParseTree<'a>, ParseError> {
        let machine = &self.machine;
        let mut ctx = ParseCtx::new(input, machine.tabstop, machine.rules.len());
        let mut state = ParserState::new();
        let rule = &machine.rules[machine.start];
        if !(rule.entry)(machine, &mut ctx, &mut state) || !ctx.at_end(&state) {
            return Err(ParseError::NoMatch);
        }
        let root = ctx.finish_root(&mut state, &rule.name);
        Ok(ParseTree::from_parts(input, ctx.into_nodes(), root))
    }

    /// Parse and fold the tree with the grammar's registered builders.
    pub fn parse(&self, input: &str) -> Result<V, ParseError> {
        if self.builders.is_empty() {
            return Err(ParseError::Build(
                "no builders registered; use parse_tree".into(),
            ));
        }
        self.parse_tree(input)?.build(&self.builders)
    }

    /// Check that the start rule completely matches every `accept` input and
    /// no `reject` input.
    pub fn test_matches(&self, accept: &[&str], reject: &[&str]) -> bool {
        self.test_rule_index(self.machine.start, accept, reject)
    }

    /// As [`test_matches`](Self::test_matches), against a single named rule.
    pub fn test_rule(&self, name: &str, accept: &[&str], reject: &[&str]) -> bool {
        match self.machine.name_idx.get(name) {
            Some(&index) => self.test_rule_index(index, accept, reject),
            None => false,
        }
    }

    fn test_rule_index(&self, index: usize, accept: &[&str], reject: &[&str]) -> bool {
        let complete = |input: &str| {
            let machine = &self.machine;
            let mut ctx = ParseCtx::new(input, machine.tabstop, machine.rules.len());
            let mut state = ParserState::new();
            (machine.rules[index].entry)(machine, &mut ctx, &mut state) && ctx.at_end(&state)
        };
        accept.iter().all(|input| complete(input)) && !reject.iter().any(|input| complete(input))
    }
}
