pub mod span;
pub mod state;
pub mod tree;

use std::fmt::Display;

/// Sentinel index for the intrusive lists threaded through the node arena and
/// the indent-frame stack.
pub const NO_INDEX: u32 = u32::MAX;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sink for diagnostic output produced by `Print` and `Trace` actions.
pub type LogFn = Box<dyn Fn(&str) + Send + Sync>;

/// A parse either succeeds or fails as a whole. `NoMatch` carries no
/// position information; `Build` wraps an error returned by a user builder
/// function, propagated unchanged out of the tree fold.
#[derive(Debug)]
pub enum ParseError {
    NoMatch,
    Build(BoxError),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::NoMatch => f.write_str("input does not match the grammar"),
            ParseError::Build(err) => write!(f, "build error: {err}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::NoMatch => None,
            ParseError::Build(err) => Some(&**err),
        }
    }
}
