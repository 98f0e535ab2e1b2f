use core::cmp::Ordering;
use core::fmt;
use smallvec::SmallVec;

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Element,
    Attribute,
    Namespace,
    Text,
    SignificantWhitespace,
    Whitespace,
    ProcessingInstruction,
    Comment,
}

impl NodeKind {
    /// Kinds selected by the `text()` node test.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            NodeKind::Text | NodeKind::SignificantWhitespace | NodeKind::Whitespace
        )
    }

    /// Attributes and namespaces hang off an element but are not its children.
    pub fn is_attached(self) -> bool {
        matches!(self, NodeKind::Attribute | NodeKind::Namespace)
    }
}

/// Relative position of two navigators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrder {
    Before,
    After,
    Same,
    /// The nodes live in unrelated trees.
    Unknown,
}

/// Cursor-style access to a tree. A navigator is positioned on one node and
/// moves in place; `Clone` yields an independent cursor on the same node.
pub trait XPathNavigator: Clone + fmt::Debug + 'static {
    fn node_kind(&self) -> NodeKind;
    fn local_name(&self) -> &str;
    fn namespace_uri(&self) -> &str;
    fn prefix(&self) -> &str;

    fn qualified_name(&self) -> String {
        if self.prefix().is_empty() {
            self.local_name().to_string()
        } else {
            format!("{}:{}", self.prefix(), self.local_name())
        }
    }

    fn string_value(&self) -> String;

    fn base_uri(&self) -> String {
        String::new()
    }

    fn move_to_parent(&mut self) -> bool;
    fn move_to_first_child(&mut self) -> bool;
    fn move_to_next_sibling(&mut self) -> bool;
    fn move_to_first_attribute(&mut self) -> bool;
    fn move_to_next_attribute(&mut self) -> bool;
    /// Moves to the first in-scope namespace node of an element.
    fn move_to_first_namespace(&mut self) -> bool;
    fn move_to_next_namespace(&mut self) -> bool;

    fn move_to_root(&mut self) {
        while self.move_to_parent() {}
    }

    /// Moves to the element carrying the given ID, if the tree knows about IDs.
    fn move_to_id(&mut self, _id: &str) -> bool {
        false
    }

    fn is_same_position(&self, other: &Self) -> bool;

    fn compare_position(&self, other: &Self) -> NodeOrder {
        compare_by_ancestry(self, other)
    }

    fn select_children_by_name(&self, local: &str, namespace_uri: &str) -> SelectChildren<Self> {
        SelectChildren::new(
            self.clone(),
            ChildFilter::Name {
                local: local.to_string(),
                namespace_uri: namespace_uri.to_string(),
            },
        )
    }

    /// `None` selects every child.
    fn select_children_by_kind(&self, kind: Option<NodeKind>) -> SelectChildren<Self> {
        SelectChildren::new(self.clone(), ChildFilter::Kind(kind))
    }
}

#[derive(Debug, Clone)]
pub enum ChildFilter {
    Name { local: String, namespace_uri: String },
    Kind(Option<NodeKind>),
}

impl ChildFilter {
    fn accepts<N: XPathNavigator>(&self, node: &N) -> bool {
        match self {
            ChildFilter::Name {
                local,
                namespace_uri,
            } => {
                node.node_kind() == NodeKind::Element
                    && node.local_name() == local
                    && node.namespace_uri() == namespace_uri
            }
            ChildFilter::Kind(None) => true,
            ChildFilter::Kind(Some(k)) => kind_matches(*k, node.node_kind()),
        }
    }
}

/// Iterator over the children of a node that pass a [`ChildFilter`].
#[derive(Debug, Clone)]
pub struct SelectChildren<N> {
    cursor: N,
    started: bool,
    done: bool,
    filter: ChildFilter,
}

impl<N: XPathNavigator> SelectChildren<N> {
    pub fn new(parent: N, filter: ChildFilter) -> Self {
        Self {
            cursor: parent,
            started: false,
            done: false,
            filter,
        }
    }
}

impl<N: XPathNavigator> Iterator for SelectChildren<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        if self.done {
            return None;
        }
        loop {
            let moved = if self.started {
                self.cursor.move_to_next_sibling()
            } else {
                self.started = true;
                self.cursor.move_to_first_child()
            };
            if !moved {
                self.done = true;
                return None;
            }
            if self.filter.accepts(&self.cursor) {
                return Some(self.cursor.clone());
            }
        }
    }
}

/// Kind test semantics: `text()` covers every text-like kind.
pub fn kind_matches(test: NodeKind, actual: NodeKind) -> bool {
    if test == NodeKind::Text {
        actual.is_text()
    } else {
        test == actual
    }
}

fn path_to_root<N: XPathNavigator>(node: &N) -> SmallVec<[N; 16]> {
    let mut path: SmallVec<[N; 16]> = SmallVec::new();
    let mut cur = node.clone();
    path.push(cur.clone());
    while cur.move_to_parent() {
        path.push(cur.clone());
    }
    path.reverse();
    path
}

/// Document order derived from ancestry and sibling order under the first
/// diverging parent (namespaces, then attributes, then children).
pub fn compare_by_ancestry<N: XPathNavigator>(a: &N, b: &N) -> NodeOrder {
    if a.is_same_position(b) {
        return NodeOrder::Same;
    }
    let pa = path_to_root(a);
    let pb = path_to_root(b);
    let len = pa.len().min(pb.len());
    let mut i = 0usize;
    while i < len && pa[i].is_same_position(&pb[i]) {
        i += 1;
    }
    if i == 0 {
        return NodeOrder::Unknown;
    }
    // One path is a prefix of the other: the shorter one is the ancestor.
    if i == len {
        return if pa.len() < pb.len() { NodeOrder::Before } else { NodeOrder::After };
    }
    let (na, nb) = (&pa[i], &pb[i]);
    let parent = &pa[i - 1];
    let groups: [fn(&mut N) -> bool; 3] = [
        N::move_to_first_namespace,
        N::move_to_first_attribute,
        N::move_to_first_child,
    ];
    let nexts: [fn(&mut N) -> bool; 3] = [
        N::move_to_next_namespace,
        N::move_to_next_attribute,
        N::move_to_next_sibling,
    ];
    for (first, next) in groups.iter().zip(nexts.iter()) {
        let mut cur = parent.clone();
        if !first(&mut cur) {
            continue;
        }
        loop {
            if cur.is_same_position(na) {
                return NodeOrder::Before;
            }
            if cur.is_same_position(nb) {
                return NodeOrder::After;
            }
            if !next(&mut cur) {
                break;
            }
        }
    }
    NodeOrder::Unknown
}

/// Total order used by set-merge buffers. Nodes from unrelated trees are
/// ordered by base URI; when even that ties, encounter order is kept.
pub fn document_order<N: XPathNavigator>(a: &N, b: &N) -> Ordering {
    match a.compare_position(b) {
        NodeOrder::Before => Ordering::Less,
        NodeOrder::After => Ordering::Greater,
        NodeOrder::Same => Ordering::Equal,
        NodeOrder::Unknown => match a.base_uri().cmp(&b.base_uri()) {
            Ordering::Equal => Ordering::Less,
            other => other,
        },
    }
}

/// Whether `node` lies strictly below `ancestor`.
pub(crate) fn is_descendant_of<N: XPathNavigator>(node: &N, ancestor: &N) -> bool {
    let mut cur = node.clone();
    while cur.move_to_parent() {
        if cur.is_same_position(ancestor) {
            return true;
        }
    }
    false
}
