//! Example grammars built on the `descent` engine.
//!
//! Each module defines one complete parser through the builder DSL: `json`
//! and `yaml` produce `serde_json::Value`, `infix` folds left-recursive
//! expressions into parenthesized strings.

pub mod infix;
pub mod json;
pub mod yaml;
