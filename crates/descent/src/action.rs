use std::sync::Arc;

use crate::error::CallSite;

pub type ArcString = Arc<str>;
pub type ArcBytes = Arc<[u8]>;

/// One grammar primitive. Payload fields hold compile-time data only;
/// combinator children live on the owning [`Action`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ActionKind {
    // terminals
    Rune,
    Byte,
    RuneRange {
        ranges: Arc<[(char, char)]>,
        inverted: bool,
    },
    ByteRange {
        ranges: Arc<[(u8, u8)]>,
        inverted: bool,
    },
    String {
        alternates: Arc<[ArcString]>,
    },
    ByteString {
        alternates: Arc<[ArcString]>,
    },
    Bytes {
        alternates: Arc<[ArcBytes]>,
    },
    Space,
    Tab,
    Whitespace {
        min: u32,
        max: u32,
    },
    Newline,
    WhitespaceNewline,
    StartOfFile,
    EndOfFile,
    StartOfLine,
    EndOfLine,
    Indent,
    Dedent,

    // combinators
    Sequence,
    Choice,
    Optional,
    Repeat {
        min: u32,
        max: u32,
    },
    Lookahead,
    Reject,
    Cut,

    // rule control
    Call {
        name: ArcString,
    },
    Recur {
        name: ArcString,
    },
    Stump {
        name: ArcString,
    },
    Corner {
        name: ArcString,
        precedence: u32,
    },
    NoCorner {
        name: ArcString,
        precedence: u32,
    },

    // capture
    Capture {
        name: ArcString,
    },

    // dispatch; children are parallel to the keys
    MatchString {
        keys: Arc<[ArcString]>,
    },
    MatchRune {
        keys: Arc<[char]>,
    },
    MatchByte {
        keys: Arc<[u8]>,
    },

    // layout
    IndentedBlock,
    OffsideBlock,

    // diagnostics
    Print {
        message: ArcString,
    },
    Trace,
}

impl ActionKind {
    /// Stable display name, used in grammar diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Rune => "Rune",
            ActionKind::Byte => "Byte",
            ActionKind::RuneRange { .. } => "RuneRange",
            ActionKind::ByteRange { .. } => "ByteRange",
            ActionKind::String { .. } => "String",
            ActionKind::ByteString { .. } => "ByteString",
            ActionKind::Bytes { .. } => "Bytes",
            ActionKind::Space => "Space",
            ActionKind::Tab => "Tab",
            ActionKind::Whitespace { .. } => "Whitespace",
            ActionKind::Newline => "Newline",
            ActionKind::WhitespaceNewline => "WhitespaceNewline",
            ActionKind::StartOfFile => "StartOfFile",
            ActionKind::EndOfFile => "EndOfFile",
            ActionKind::StartOfLine => "StartOfLine",
            ActionKind::EndOfLine => "EndOfLine",
            ActionKind::Indent => "Indent",
            ActionKind::Dedent => "Dedent",
            ActionKind::Sequence => "Sequence",
            ActionKind::Choice => "Choice",
            ActionKind::Optional => "Optional",
            ActionKind::Repeat { .. } => "Repeat",
            ActionKind::Lookahead => "Lookahead",
            ActionKind::Reject => "Reject",
            ActionKind::Cut => "Cut",
            ActionKind::Call { .. } => "Call",
            ActionKind::Recur { .. } => "Recur",
            ActionKind::Stump { .. } => "Stump",
            ActionKind::Corner { .. } => "Corner",
            ActionKind::NoCorner { .. } => "NoCorner",
            ActionKind::Capture { .. } => "Capture",
            ActionKind::MatchString { .. } => "MatchString",
            ActionKind::MatchRune { .. } => "MatchRune",
            ActionKind::MatchByte { .. } => "MatchByte",
            ActionKind::IndentedBlock => "IndentedBlock",
            ActionKind::OffsideBlock => "OffsideBlock",
            ActionKind::Print { .. } => "Print",
            ActionKind::Trace => "Trace",
        }
    }

    /// Kinds that carry child actions.
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            ActionKind::Sequence
                | ActionKind::Choice
                | ActionKind::Optional
                | ActionKind::Repeat { .. }
                | ActionKind::Lookahead
                | ActionKind::Reject
                | ActionKind::Capture { .. }
                | ActionKind::MatchString { .. }
                | ActionKind::MatchRune { .. }
                | ActionKind::MatchByte { .. }
                | ActionKind::IndentedBlock
                | ActionKind::OffsideBlock
                | ActionKind::Trace
        )
    }

    /// The rule a cross-rule reference targets, if this is one.
    pub fn call_target(&self) -> Option<&ArcString> {
        match self {
            ActionKind::Call { name } | ActionKind::Recur { name } | ActionKind::Stump { name } => {
                Some(name)
            }
            _ => None,
        }
    }
}

/// A node of the grammar IR, carrying the builder call site that created it.
#[derive(Clone, Debug)]
pub struct Action {
    kind: ActionKind,
    site: CallSite,
    children: Vec<Action>,
}

impl Action {
    pub fn new_leaf(kind: ActionKind, site: CallSite) -> Action {
        debug_assert!(!kind.is_group());
        Action {
            kind,
            site,
            children: Vec::new(),
        }
    }

    pub fn new_group(kind: ActionKind, site: CallSite, children: Vec<Action>) -> Action {
        debug_assert!(kind.is_group());
        Action {
            kind,
            site,
            children,
        }
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn site(&self) -> CallSite {
        self.site
    }

    pub fn children(&self) -> &[Action] {
        &self.children
    }

    fn visit_impl(&self, f: &mut dyn FnMut(&Action)) {
        for child in &self.children {
            child.visit_impl(f);
        }
        f(self)
    }

    /// Post-order visit over the whole subtree.
    pub fn visit(&self, mut f: impl FnMut(&Action)) {
        self.visit_impl(&mut f)
    }

    pub fn display_into(&self, buf: &mut dyn std::fmt::Write) -> std::fmt::Result {
        self.display_into_indent(buf, 0)
    }

    pub fn display_into_indent(&self, buf: &mut dyn std::fmt::Write, indent: u32) -> std::fmt::Result {
        for _ in 0..indent {
            write!(buf, "  ")?;
        }
        match &self.kind {
            ActionKind::String { alternates } => write!(buf, "String({alternates:?})")?,
            ActionKind::Call { name } => write!(buf, "Call({name})")?,
            ActionKind::Capture { name } => write!(buf, "Capture({name})")?,
            ActionKind::Repeat { min, max } => write!(buf, "Repeat({min}, {max})")?,
            kind => write!(buf, "{}", kind.name())?,
        }
        write!(buf, "\n")?;
        for child in &self.children {
            child.display_into_indent(buf, indent + 1)?;
        }
        Ok(())
    }
}
