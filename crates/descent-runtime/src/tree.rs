use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::span::Span;
use crate::{BoxError, ParseError, NO_INDEX};

/// One parse node. Children and siblings are linked through arena indices;
/// `sibling` points at the next sibling in source order once the owning
/// capture has committed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Node {
    pub(crate) name: Arc<str>,
    pub(crate) span: Span,
    pub(crate) child_head: u32,
    pub(crate) child_count: u32,
    pub(crate) sibling: u32,
    pub(crate) sibling_index: u32,
}

/// A semantic-value constructor for one capture name. Receives the input
/// slice the node spans and the already-built values of its children, in
/// source order.
pub type BuilderFn<V> = Box<dyn Fn(&str, Vec<V>) -> Result<V, BoxError> + Send + Sync>;

pub struct BuilderMap<V> {
    map: HashMap<Arc<str>, BuilderFn<V>>,
}

impl<V> BuilderMap<V> {
    pub fn new() -> BuilderMap<V> {
        BuilderMap {
            map: HashMap::new(),
        }
    }
    /// Returns false when a builder was already registered under `name`.
    pub fn insert(&mut self, name: Arc<str>, builder: BuilderFn<V>) -> bool {
        use std::collections::hash_map::Entry;
        match self.map.entry(name) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(builder);
                true
            }
        }
    }
    pub fn get(&self, name: &str) -> Option<&BuilderFn<V>> {
        self.map.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    pub fn names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.map.keys()
    }
}

impl<V> Default for BuilderMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The result of a successful parse: the input, the node arena, and the root
/// index. The tree is immutable; walk it or fold it into a value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseTree<'a> {
    input: &'a str,
    nodes: Vec<Node>,
    root: u32,
}

impl<'a> ParseTree<'a> {
    pub fn from_parts(input: &'a str, nodes: Vec<Node>, root: u32) -> ParseTree<'a> {
        debug_assert!((root as usize) < nodes.len());
        ParseTree { input, nodes, root }
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> NodeRef<'_, 'a> {
        self.node(self.root)
    }

    /// Nodes are addressable in arena order: children always precede the
    /// capture that produced them.
    pub fn node(&self, index: u32) -> NodeRef<'_, 'a> {
        debug_assert!((index as usize) < self.nodes.len());
        NodeRef { tree: self, index }
    }

    /// Post-order traversal of the tree below the root.
    pub fn walk(&self, mut visit: impl FnMut(NodeRef<'_, 'a>)) {
        self.walk_from(self.root, &mut visit);
    }

    fn walk_from(&self, index: u32, visit: &mut impl FnMut(NodeRef<'_, 'a>)) {
        let node = &self.nodes[index as usize];
        let mut child = node.child_head;
        while child != NO_INDEX {
            self.walk_from(child, visit);
            child = self.nodes[child as usize].sibling;
        }
        visit(NodeRef { tree: self, index });
    }

    /// Fold the tree into a value, post-order: children first, then the
    /// node's builder applied to `(input_slice, child_values)`. The root may
    /// have no builder when it wraps exactly one child; that child's value
    /// passes through.
    pub fn build<V>(&self, builders: &BuilderMap<V>) -> Result<V, ParseError> {
        self.build_from(self.root, builders, true)
    }

    fn build_from<V>(
        &self,
        index: u32,
        builders: &BuilderMap<V>,
        is_root: bool,
    ) -> Result<V, ParseError> {
        let node = &self.nodes[index as usize];
        let mut values = Vec::with_capacity(node.child_count as usize);
        let mut child = node.child_head;
        while child != NO_INDEX {
            values.push(self.build_from(child, builders, false)?);
            child = self.nodes[child as usize].sibling;
        }
        match builders.get(&node.name) {
            Some(builder) => {
                builder(node.span.as_str(self.input), values).map_err(ParseError::Build)
            }
            None if is_root && values.len() == 1 => Ok(values.pop().unwrap()),
            None => Err(ParseError::Build(
                format!("no builder registered for {:?}", &*node.name).into(),
            )),
        }
    }

    pub fn display_into(&self, buf: &mut dyn std::fmt::Write) -> std::fmt::Result {
        self.display_node(buf, self.root, 0)
    }

    fn display_node(
        &self,
        buf: &mut dyn std::fmt::Write,
        index: u32,
        indent: u32,
    ) -> std::fmt::Result {
        let node = &self.nodes[index as usize];
        for _ in 0..indent {
            write!(buf, "  ")?;
        }
        write!(buf, "{} {}", node.name, node.span)?;
        if node.child_count == 0 {
            write!(buf, " {:?}", node.span.as_str(self.input))?;
        }
        write!(buf, "\n")?;
        let mut child = node.child_head;
        while child != NO_INDEX {
            self.display_node(buf, child, indent + 1)?;
            child = self.nodes[child as usize].sibling;
        }
        Ok(())
    }
}

impl Display for ParseTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_into(f)
    }
}

/// A node plus the tree that owns it.
#[derive(Clone, Copy)]
pub struct NodeRef<'t, 'a> {
    tree: &'t ParseTree<'a>,
    index: u32,
}

impl<'t, 'a> NodeRef<'t, 'a> {
    pub fn index(self) -> u32 {
        self.index
    }
    fn node(self) -> &'t Node {
        &self.tree.nodes[self.index as usize]
    }
    pub fn name(self) -> &'t str {
        &self.node().name
    }
    pub fn span(self) -> Span {
        self.node().span
    }
    /// The input consumed by this node.
    pub fn text(self) -> &'a str {
        self.node().span.as_str(self.tree.input)
    }
    pub fn child_count(self) -> u32 {
        self.node().child_count
    }
    /// Position among this node's siblings, in source order.
    pub fn sibling_index(self) -> u32 {
        self.node().sibling_index
    }
    pub fn children(self) -> Children<'t, 'a> {
        Children {
            tree: self.tree,
            next: self.node().child_head,
        }
    }
}

impl std::fmt::Debug for NodeRef<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {:?}", self.name(), self.span(), self.text())
    }
}

pub struct Children<'t, 'a> {
    tree: &'t ParseTree<'a>,
    next: u32,
}

impl<'t, 'a> Iterator for Children<'t, 'a> {
    type Item = NodeRef<'t, 'a>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NO_INDEX {
            return None;
        }
        let index = self.next;
        self.next = self.tree.nodes[index as usize].sibling;
        Some(NodeRef {
            tree: self.tree,
            index,
        })
    }
}
