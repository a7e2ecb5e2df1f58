//! A parser-combinator engine with an embedded grammar-description DSL.
//!
//! Grammars are written as builder callbacks: operations record an
//! intermediate representation of typed action nodes, a validation pass
//! checks it (closure, nullability, left recursion, mode compatibility), and
//! each rule compiles into a match closure executed by a backtracking
//! recursive-descent runtime with cut/commit, indentation tracking, and
//! seed-grow left recursion. A successful parse yields a [`ParseTree`] or,
//! through registered capture builders, a user value.
//!
//! ```
//! use descent::{build_parser, Mode};
//!
//! let parser = build_parser::<()>(Mode::string(), |g| {
//!     g.start("expr");
//!     g.define("expr", |g| {
//!         g.capture("lit", |g| g.string(["true", "false"]));
//!     });
//! })
//! .unwrap();
//!
//! assert!(parser.test_matches(&["true", "false"], &["blue", ""]));
//! ```

pub mod action;
pub mod builder;
mod compile;
pub mod error;
pub mod grammar;
pub mod mode;
pub mod parser;
mod validate;

pub use builder::{ByteArms, ChoiceCases, GrammarBuilder, RuneArms, StringArms};
pub use error::{CallSite, GrammarError, GrammarErrors};
pub use grammar::{Grammar, Rule, RuleHandle};
pub use mode::{Mode, ModeKind};
pub use parser::Parser;

pub use descent_runtime::span::Span;
pub use descent_runtime::tree::{BuilderFn, BuilderMap, NodeRef, ParseTree};
pub use descent_runtime::{BoxError, ParseError};

/// Run the grammar callback, validate the recorded rules, and return the
/// grammar or every construction error with its call site.
#[track_caller]
pub fn build_grammar<V>(
    mode: Mode,
    body: impl FnOnce(&mut GrammarBuilder<V>),
) -> Result<Grammar<V>, GrammarErrors> {
    let mut g = GrammarBuilder::new(mode, CallSite::here());
    body(&mut g);
    g.finish()
}

/// [`build_grammar`] followed by compilation.
#[track_caller]
pub fn build_parser<V>(
    mode: Mode,
    body: impl FnOnce(&mut GrammarBuilder<V>),
) -> Result<Parser<V>, GrammarErrors> {
    let mut g = GrammarBuilder::new(mode, CallSite::here());
    body(&mut g);
    Ok(g.finish()?.parser())
}
