use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt::Display;

use crate::action::ArcString;

/// Where a builder operation was invoked, captured with `#[track_caller]`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CallSite {
    file: &'static str,
    line: u32,
}

impl CallSite {
    #[track_caller]
    pub fn here() -> CallSite {
        let location = std::panic::Location::caller();
        CallSite {
            file: location.file(),
            line: location.line(),
        }
    }

    pub fn file(self) -> &'static str {
        self.file
    }

    pub fn line(self) -> u32 {
        self.line
    }
}

impl Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

pub type Message = Cow<'static, str>;

#[derive(Clone, Debug)]
pub struct GrammarError {
    pub site: CallSite,
    /// The rule being defined when the error was recorded, if any.
    pub rule: Option<ArcString>,
    pub message: Message,
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.site, self.message)?;
        if let Some(rule) = &self.rule {
            write!(f, " (inside {rule:?})")?;
        }
        Ok(())
    }
}

/// Collects grammar errors during building and validation.
///
/// The fatal flag mirrors the construction protocol: once a builder operation
/// has failed, the operations that depend on it are skipped rather than
/// reported as further errors. Validation records everything it finds.
#[derive(Default)]
pub struct ErrorAccumulator {
    errors: RefCell<Vec<GrammarError>>,
    fatal: Cell<bool>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, site: CallSite, rule: Option<&ArcString>, message: impl Into<Message>) {
        self.fatal.set(true);
        self.errors.borrow_mut().push(GrammarError {
            site,
            rule: rule.cloned(),
            message: message.into(),
        });
    }

    /// Record a validation finding without tripping the fatal flag.
    pub fn report(&self, site: CallSite, rule: Option<&ArcString>, message: impl Into<Message>) {
        self.errors.borrow_mut().push(GrammarError {
            site,
            rule: rule.cloned(),
            message: message.into(),
        });
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.get()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }

    pub fn into_errors(self) -> Vec<GrammarError> {
        self.errors.into_inner()
    }
}

/// Summary returned when grammar construction fails.
#[derive(Debug)]
pub struct GrammarErrors {
    errors: Vec<GrammarError>,
}

impl GrammarErrors {
    pub(crate) fn new(errors: Vec<GrammarError>) -> GrammarErrors {
        GrammarErrors { errors }
    }

    pub fn errors(&self) -> &[GrammarError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Display for GrammarErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "grammar has {} error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GrammarErrors {}
