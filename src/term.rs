//! Expression tree for parsed RQL.
//!
//! Instead of a tree of boxed nodes with back pointers, every node of a
//!  request lives in a flat [Tree] and refers to its parent and children by
//!  [TermId] (an index into that arena). Detaching or replacing a node is an
//!  index swap in the parent's child list; detached nodes simply stay in the
//!  arena until the tree is dropped.
//!
//! ```text
//!   in(firstName,wells,joe)
//!
//!   id=0 firstName   id=1 wells   id=2 joe   id=3 in [0, 1, 2]
//! ```

use std::fmt;

use crate::lexer::is_structural;

/// Handle to a node in a [Tree]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    token: String,
    quote: Option<char>,
    children: Vec<TermId>,
    parent: Option<TermId>,
}

/// Arena holding every term of one query
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: TermId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: TermId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Add a literal or column reference
    pub fn leaf(&mut self, token: impl Into<String>, quote: Option<char>) -> TermId {
        let id = TermId(self.nodes.len());
        self.nodes.push(Node {
            token: token.into(),
            quote,
            children: Vec::new(),
            parent: None,
        });
        id
    }

    /// Add a function node adopting `children`, which must be detached
    pub fn call(&mut self, token: impl Into<String>, children: Vec<TermId>) -> TermId {
        let id = self.leaf(token, None);
        for child in children {
            self.push_child(id, child);
        }
        id
    }

    pub fn token(&self, id: TermId) -> &str {
        &self.node(id).token
    }

    pub fn set_token(&mut self, id: TermId, token: impl Into<String>) {
        self.node_mut(id).token = token.into();
    }

    pub fn quote(&self, id: TermId) -> Option<char> {
        self.node(id).quote
    }

    pub fn is_quoted(&self, id: TermId) -> bool {
        self.node(id).quote.is_some()
    }

    pub fn is_leaf(&self, id: TermId) -> bool {
        self.node(id).children.is_empty()
    }

    /// Case-insensitive token comparison. Quoted literals never match.
    pub fn has_token(&self, id: TermId, token: &str) -> bool {
        !self.is_quoted(id) && self.token(id).eq_ignore_ascii_case(token)
    }

    /// An unquoted `null` literal
    pub fn is_null(&self, id: TermId) -> bool {
        self.is_leaf(id) && self.has_token(id, "null")
    }

    pub fn children(&self, id: TermId) -> &[TermId] {
        &self.node(id).children
    }

    pub fn child(&self, id: TermId, index: usize) -> Option<TermId> {
        self.node(id).children.get(index).copied()
    }

    pub fn parent(&self, id: TermId) -> Option<TermId> {
        self.node(id).parent
    }

    pub fn is_ancestor(&self, ancestor: TermId, id: TermId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn push_child(&mut self, parent: TermId, child: TermId) {
        let at = self.children(parent).len();
        self.insert_child(parent, at, child);
    }

    pub fn insert_child(&mut self, parent: TermId, index: usize, child: TermId) {
        debug_assert!(self.parent(child).is_none(), "child is already attached");
        debug_assert!(!self.is_ancestor(child, parent), "term would become its own ancestor");
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Remove `id` from its parent's child list
    pub fn detach(&mut self, id: TermId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|c| *c != id);
        }
    }

    /// Put `replacement` where `id` sits in its parent and detach `id`.
    ///  Returns false when `id` is a root and there is nothing to splice into.
    pub fn replace(&mut self, id: TermId, replacement: TermId) -> bool {
        if id == replacement {
            return true;
        }
        self.detach(replacement);
        let Some(parent) = self.node_mut(id).parent.take() else {
            return false;
        };
        debug_assert!(!self.is_ancestor(replacement, parent));
        if let Some(slot) = self
            .node_mut(parent)
            .children
            .iter_mut()
            .find(|c| **c == id)
        {
            *slot = replacement;
        }
        self.node_mut(replacement).parent = Some(parent);
        true
    }

    /// Depth-first search for the first node (including `id`) whose token is
    ///  one of `tokens`
    pub fn find_first(&self, id: TermId, tokens: &[&str]) -> Option<TermId> {
        if tokens.iter().any(|t| self.has_token(id, t)) {
            return Some(id);
        }
        self.children(id)
            .iter()
            .find_map(|child| self.find_first(*child, tokens))
    }

    /// Every node (including `id`) with the given token, in depth-first order
    pub fn find_all(&self, id: TermId, token: &str) -> Vec<TermId> {
        let mut found = Vec::new();
        self.collect(id, token, &mut found);
        found
    }

    fn collect(&self, id: TermId, token: &str, found: &mut Vec<TermId>) {
        if self.has_token(id, token) {
            found.push(id);
        }
        for child in self.children(id) {
            self.collect(*child, token, found);
        }
    }

    /// Copy the subtree rooted at `id` (from this or another tree) into self
    pub fn import(&mut self, source: &Tree, id: TermId) -> TermId {
        let children: Vec<TermId> = source
            .children(id)
            .to_vec()
            .into_iter()
            .map(|child| self.import(source, child))
            .collect();
        let copy = self.leaf(source.token(id), source.quote(id));
        for child in children {
            self.push_child(copy, child);
        }
        copy
    }

    /// Deep copy within the same tree
    pub fn duplicate(&mut self, id: TermId) -> TermId {
        let children = self.children(id).to_vec();
        let copies: Vec<TermId> = children.into_iter().map(|c| self.duplicate(c)).collect();
        let copy = self.leaf(self.token(id).to_string(), self.quote(id));
        for child in copies {
            self.push_child(copy, child);
        }
        copy
    }

    /// Structural equality: same tokens, quoting and shape
    pub fn same_shape(&self, a: TermId, other: &Tree, b: TermId) -> bool {
        self.token(a) == other.token(b)
            && self.quote(a) == other.quote(b)
            && self.children(a).len() == other.children(b).len()
            && self
                .children(a)
                .iter()
                .zip(other.children(b))
                .all(|(x, y)| self.same_shape(*x, other, *y))
    }

    /// Display adapter producing the canonical call form
    pub fn display(&self, id: TermId) -> TermDisplay<'_> {
        TermDisplay { tree: self, id }
    }

    pub fn to_rql(&self, id: TermId) -> String {
        self.display(id).to_string()
    }
}

/// Writes a term as `token(child1,child2,...)`
pub struct TermDisplay<'a> {
    tree: &'a Tree,
    id: TermId,
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree;
        let token = tree.token(self.id);
        match tree.quote(self.id) {
            Some(q) => write_quoted(f, token, q)?,
            None => write_bare(f, token)?,
        }
        let children = tree.children(self.id);
        if children.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", tree.display(*child))?;
        }
        write!(f, ")")
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str, quote: char) -> fmt::Result {
    write!(f, "{quote}")?;
    for c in text.chars() {
        if c == quote {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    write!(f, "{quote}")
}

fn write_bare(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if text.is_empty() {
        // an unquoted empty literal cannot be written back; quote it
        return write!(f, "\"\"");
    }
    let last = text.chars().count() - 1;
    for (i, c) in text.chars().enumerate() {
        let edge = i == 0 || i == last;
        if is_structural(c) && (!c.is_whitespace() || edge) {
            write!(f, "\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}
