//! Document tree produced by the article text parser (`C11`). Arena-based
//! with index parent back-references rather than owned child pointers, so
//! a reference-resolution pass (`C12`) can walk up from a placeholder node
//! to find its enclosing formatting context without fighting the borrow
//! checker over a tree of `Rc<RefCell<_>>`.

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    /// Plain run of already-charset-decoded text.
    Plain(String),
    /// `\\` -- a hard line break.
    LineBreak,
    /// Bare newline/`\r\n` -- a soft break, collapsed away when rendered.
    SoftLineBreak,
    /// A table column stop inside a `\tab{...}` block.
    Tab,
    Bold,
    Italic,
    BoldItalic,
    Underline,
    Superscript,
    Subscript,
    /// `\F{ADD_}...\F{_ADD}` -- an addendum/remark aside.
    Addendum,
    /// `\F{RRGGBB_}...` -- foreground color run.
    Color(String),
    /// `\F{Left_}`/`Right_`/`Center_` alignment run.
    Alignment(Alignment),
    /// `\F{WebLink_}name\F{_WebLink}` -- an outbound link run.
    WebLink(String),
    /// `@C%ID=<digits>%` -- a numbered anchor point, unused by rendering but
    /// kept so later stages can resolve a forward reference against it.
    Id(i64),
    /// `\tab{...}` table block ("TableRun"); gains its derived `Table` shape
    /// once the table structure pass has walked its children.
    Table(Option<Table>),
    TableRow,
    TableCell,
    /// A table layout/border tag (`\tcn`, `\ter`, ...) attached either to the
    /// table itself (`\tcn`/`\tln`/column & border tags) or to the current
    /// last cell (`\ter`/`\ted` merge markers).
    TableTag { kind: TableTagKind, from: i64, to: i64 },
    /// `\S{...}` -- unresolved cross-reference placeholder; its children are
    /// the `;`-delimited `ReferenceSegment` runs, in order.
    ReferencePlaceholder { id: Option<ReferenceId>, range: Option<(i64, i64)> },
    /// One `;`-delimited child run of a `ReferencePlaceholder`/`InlineSound`.
    ReferenceSegment,
    /// `\w{...}` -- inline sound reference, split into per-`;` names once
    /// `C12` resolves it (empty until then).
    InlineSound { names: Vec<InlineSoundName> },
    /// Picture/table/web reference after `C12` resolves a `\S{...}` run
    /// against the `.ld` reference registry.
    ArticleReference { caption: NodeId, offset: i64, heading: Option<String> },
    PictureReference { offset: i64, file_name: String, caption: NodeId, description: Option<NodeId> },
    TableReference { offset: i64, file_name: String, caption: NodeId, content: Option<NodeId>, mt: Option<String> },
    WebReference { url: String, caption: NodeId },
    InlineImage { name: String, secondary: Option<String> },
    /// A sticky formatting marker (`@N`) before post-parse pairing rewrites
    /// it into `Bold`/`Italic`/`BoldItalic` containers.
    Sticky(u32),
}

/// `code`/`num`/`num2` id suffix of a `\S{...}` placeholder --
/// `.CODE:num[-num2]`. `num`/`num2` default to `-1` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceId {
    pub code: String,
    pub num: i64,
    pub num2: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSoundName {
    pub file: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableTagKind {
    ColumnCount,
    RowCount,
    Tau,
    Tcd,
    Tfl,
    Tcl,
    Tcr,
    Tld,
    Tfu,
    Tlt,
    Tcc,
    Ter,
    Tcm,
    Ted,
}

/// Structure derived from a `Table(...)` node's children by the table
/// structure pass: row/column counts, the row-major cell grid, and the
/// horizontal/vertical span and merge state of each cell.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: usize,
    pub columns: usize,
    pub cells: Vec<NodeId>,
    pub hspans: Vec<u32>,
    pub vspans: Vec<u32>,
    pub hmerged: Vec<bool>,
    pub vmerged: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// An arena of `Node`s. Node 0 is always the article's root.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        let mut t = Tree { nodes: Vec::new() };
        t.nodes.push(Node { kind: NodeKind::Root, parent: None, children: Vec::new() });
        t
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn push_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { kind, parent: Some(parent), children: Vec::new() });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Reparent `child` onto `new_parent`, removing it from its previous
    /// parent's child list. Used by the sticky-formatting rewrite to wrap
    /// a run of siblings in a freshly created `Bold`/`Italic` node.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) {
        if let Some(old_parent) = self.nodes[child].parent {
            self.nodes[old_parent].children.retain(|&c| c != child);
        }
        self.nodes[child].parent = Some(new_parent);
        self.nodes[new_parent].children.push(child);
    }

    pub fn new_detached(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { kind, parent: None, children: Vec::new() });
        id
    }

    /// Replace `parent`'s child list wholesale, fixing up each new child's
    /// parent pointer. Used by the sticky-formatting rewrite, which builds
    /// a node's new children out of a mix of kept siblings and freshly
    /// created wrapper containers.
    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        for &c in &children {
            self.nodes[c].parent = Some(parent);
        }
        self.nodes[parent].children = children;
    }

    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.nodes[id].parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self.nodes[p].parent;
        }
        out
    }

    /// Flatten the subtree rooted at `id` into its plain-text content,
    /// dropping formatting and unresolved references (used for heading-
    /// derived search keys, not final DSL rendering).
    pub fn plain_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].kind {
            NodeKind::Plain(s) => out.push_str(s),
            NodeKind::SoftLineBreak => out.push(' '),
            NodeKind::LineBreak => out.push('\n'),
            NodeKind::ArticleReference { heading: Some(h), .. } => out.push_str(h),
            _ => {}
        }
        for &child in &self.nodes[id].children {
            self.collect_text(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_flattens_simple_tree() {
        let mut t = Tree::new();
        let root = t.root();
        let bold = t.push_child(root, NodeKind::Bold);
        t.push_child(bold, NodeKind::Plain("hello".into()));
        t.push_child(root, NodeKind::Plain(" world".into()));
        assert_eq!(t.plain_text(root), "hello world");
    }

    #[test]
    fn ancestors_walk_to_root() {
        let mut t = Tree::new();
        let root = t.root();
        let a = t.push_child(root, NodeKind::Bold);
        let b = t.push_child(a, NodeKind::Italic);
        assert_eq!(t.ancestors(b), vec![a, root]);
    }

    #[test]
    fn reparent_moves_node_between_parents() {
        let mut t = Tree::new();
        let root = t.root();
        let a = t.push_child(root, NodeKind::Bold);
        let leaf = t.push_child(root, NodeKind::Plain("x".into()));
        t.reparent(leaf, a);
        assert_eq!(t.get(root).children, vec![a]);
        assert_eq!(t.get(a).children, vec![leaf]);
    }
}
