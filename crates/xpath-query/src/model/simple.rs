//! Simple in-memory tree with an [`XPathNavigator`] for tests and quick prototypes.
//!
//! Example:
//! ```
//! use xpath_query::model::simple::{attr, doc, elem, text};
//! use xpath_query::XPathNavigator;
//!
//! // <root id="r"><child>Hello</child><child world="yes"/></root>
//! let document = doc()
//!     .child(
//!         elem("root")
//!             .attr(attr("id", "r"))
//!             .child(elem("child").child(text("Hello")))
//!             .child(elem("child").attr(attr("world", "yes"))),
//!     )
//!     .build();
//!
//! let mut nav = document.navigator();
//! assert!(nav.move_to_first_child());
//! assert_eq!(nav.local_name(), "root");
//! assert_eq!(nav.string_value(), "Hello");
//! ```
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::model::{NodeKind, XPathNavigator};
use crate::runtime::XML_NAMESPACE;

#[derive(Debug)]
pub(crate) struct Inner {
    kind: NodeKind,
    local: String,
    prefix: String,
    ns_uri: String,
    value: String,
    base_uri: String,
    /// Owner plus index within the owner's attribute, namespace or child list.
    parent: OnceLock<(Weak<Inner>, usize)>,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

/// An Arc-backed immutable node.
#[derive(Clone)]
pub struct SimpleNode(pub(crate) Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for SimpleNode {}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.local)
            .field("value", &self.0.value)
            .finish()
    }
}

fn split_qname(qname: &str) -> (&str, &str) {
    qname.split_once(':').unwrap_or(("", qname))
}

impl SimpleNode {
    fn leaf(kind: NodeKind, prefix: &str, local: &str, ns_uri: &str, value: &str) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            local: local.to_string(),
            prefix: prefix.to_string(),
            ns_uri: ns_uri.to_string(),
            value: value.to_string(),
            base_uri: String::new(),
            parent: OnceLock::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }))
    }

    pub fn document() -> SimpleNodeBuilder {
        SimpleNodeBuilder::new(NodeKind::Root, "", "", "")
    }

    pub fn element(qname: &str) -> SimpleNodeBuilder {
        let (prefix, local) = split_qname(qname);
        SimpleNodeBuilder::new(NodeKind::Element, prefix, local, "")
    }

    pub fn element_ns(ns_uri: &str, qname: &str) -> SimpleNodeBuilder {
        let (prefix, local) = split_qname(qname);
        SimpleNodeBuilder::new(NodeKind::Element, prefix, local, ns_uri)
    }

    /// `xml:`-prefixed names land in the XML namespace.
    pub fn attribute(qname: &str, value: &str) -> SimpleNode {
        let (prefix, local) = split_qname(qname);
        let ns = if prefix == "xml" { XML_NAMESPACE } else { "" };
        SimpleNode::leaf(NodeKind::Attribute, prefix, local, ns, value)
    }

    pub fn attribute_ns(ns_uri: &str, qname: &str, value: &str) -> SimpleNode {
        let (prefix, local) = split_qname(qname);
        SimpleNode::leaf(NodeKind::Attribute, prefix, local, ns_uri, value)
    }

    pub fn text(value: &str) -> SimpleNode {
        SimpleNode::leaf(NodeKind::Text, "", "", "", value)
    }

    /// Whitespace-only text subject to the host's whitespace policy.
    pub fn whitespace(value: &str) -> SimpleNode {
        SimpleNode::leaf(NodeKind::Whitespace, "", "", "", value)
    }

    pub fn comment(value: &str) -> SimpleNode {
        SimpleNode::leaf(NodeKind::Comment, "", "", "", value)
    }

    pub fn pi(target: &str, data: &str) -> SimpleNode {
        SimpleNode::leaf(NodeKind::ProcessingInstruction, "", target, "", data)
    }

    /// Namespace declaration; an empty URI undeclares the prefix.
    pub fn namespace(prefix: &str, uri: &str) -> SimpleNode {
        SimpleNode::leaf(NodeKind::Namespace, "", prefix, "", uri)
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    pub fn parent(&self) -> Option<SimpleNode> {
        self.0
            .parent
            .get()
            .and_then(|(w, _)| w.upgrade())
            .map(SimpleNode)
    }

    pub fn children(&self) -> &[SimpleNode] {
        &self.0.children
    }

    pub fn attributes(&self) -> &[SimpleNode] {
        &self.0.attributes
    }

    /// Navigator positioned on this node, rooted at its topmost reachable ancestor.
    pub fn navigator(&self) -> SimpleNavigator {
        SimpleNavigator {
            node: self.clone(),
            ns: None,
        }
    }

    fn index(&self) -> Option<usize> {
        self.0.parent.get().map(|(_, i)| *i)
    }

    fn collect_text(&self, out: &mut String) {
        for c in &self.0.children {
            match c.0.kind {
                k if k.is_text() => out.push_str(&c.0.value),
                NodeKind::Element => c.collect_text(out),
                _ => {}
            }
        }
    }

    fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Root | NodeKind::Element => {
                let mut out = String::new();
                self.collect_text(&mut out);
                out
            }
            _ => self.0.value.clone(),
        }
    }

    fn root(&self) -> SimpleNode {
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            cur = p;
        }
        cur
    }

    fn find_id(&self, id: &str) -> Option<SimpleNode> {
        for c in &self.0.children {
            if c.0.kind != NodeKind::Element {
                continue;
            }
            let hit = c
                .0
                .attributes
                .iter()
                .any(|a| a.0.local == "id" && a.0.value == id);
            if hit {
                return Some(c.clone());
            }
            if let Some(found) = c.find_id(id) {
                return Some(found);
            }
        }
        None
    }
}

pub struct SimpleNodeBuilder {
    kind: NodeKind,
    prefix: String,
    local: String,
    ns_uri: String,
    base_uri: String,
    attributes: Vec<SimpleNode>,
    namespaces: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, prefix: &str, local: &str, ns_uri: &str) -> Self {
        Self {
            kind,
            prefix: prefix.to_string(),
            local: local.to_string(),
            ns_uri: ns_uri.to_string(),
            base_uri: String::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<SimpleNode>) -> Self {
        self.children.push(child.into());
        self
    }

    #[must_use]
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<SimpleNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn attr(mut self, attribute: SimpleNode) -> Self {
        debug_assert_eq!(attribute.0.kind, NodeKind::Attribute);
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn namespace(mut self, namespace: SimpleNode) -> Self {
        debug_assert_eq!(namespace.0.kind, NodeKind::Namespace);
        self.namespaces.push(namespace);
        self
    }

    #[must_use]
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = uri.into();
        self
    }

    pub fn build(self) -> SimpleNode {
        let node = SimpleNode(Arc::new(Inner {
            kind: self.kind,
            local: self.local,
            prefix: self.prefix,
            ns_uri: self.ns_uri,
            value: String::new(),
            base_uri: self.base_uri,
            parent: OnceLock::new(),
            attributes: self.attributes,
            namespaces: self.namespaces,
            children: self.children,
        }));
        let owner = Arc::downgrade(&node.0);
        for list in [&node.0.attributes, &node.0.namespaces, &node.0.children] {
            for (i, n) in list.iter().enumerate() {
                let fresh = n.0.parent.set((owner.clone(), i)).is_ok();
                debug_assert!(fresh, "node attached to two parents");
            }
        }
        node
    }
}

impl From<SimpleNodeBuilder> for SimpleNode {
    fn from(b: SimpleNodeBuilder) -> Self {
        b.build()
    }
}

pub fn doc() -> SimpleNodeBuilder {
    SimpleNode::document()
}
pub fn elem(qname: &str) -> SimpleNodeBuilder {
    SimpleNode::element(qname)
}
pub fn elem_ns(ns_uri: &str, qname: &str) -> SimpleNodeBuilder {
    SimpleNode::element_ns(ns_uri, qname)
}
pub fn text(v: &str) -> SimpleNode {
    SimpleNode::text(v)
}
pub fn ws(v: &str) -> SimpleNode {
    SimpleNode::whitespace(v)
}
pub fn comment(v: &str) -> SimpleNode {
    SimpleNode::comment(v)
}
pub fn pi(target: &str, data: &str) -> SimpleNode {
    SimpleNode::pi(target, data)
}
pub fn attr(qname: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute(qname, v)
}
pub fn attr_ns(ns_uri: &str, qname: &str, v: &str) -> SimpleNode {
    SimpleNode::attribute_ns(ns_uri, qname, v)
}
pub fn ns(prefix: &str, uri: &str) -> SimpleNode {
    SimpleNode::namespace(prefix, uri)
}

/// In-scope namespace nodes of one element, nearest declaration first.
#[derive(Clone)]
struct NamespaceScope {
    owner: SimpleNode,
    nodes: Arc<[SimpleNode]>,
    index: usize,
}

impl NamespaceScope {
    fn collect(owner: &SimpleNode) -> Option<Self> {
        let mut seen: Vec<&str> = Vec::new();
        let mut nodes = Vec::new();
        let mut cur = Some(owner.clone());
        let mut chain = Vec::new();
        while let Some(n) = cur {
            cur = n.parent();
            if n.0.kind == NodeKind::Element {
                chain.push(n);
            }
        }
        for el in &chain {
            for decl in &el.0.namespaces {
                if seen.contains(&decl.0.local.as_str()) {
                    continue;
                }
                seen.push(&decl.0.local);
                // Undeclarations shadow outer bindings but are not nodes themselves.
                if !decl.0.value.is_empty() {
                    nodes.push(decl.clone());
                }
            }
        }
        if nodes.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.clone(),
            nodes: nodes.into(),
            index: 0,
        })
    }
}

/// Navigator over a [`SimpleNode`] tree.
#[derive(Clone)]
pub struct SimpleNavigator {
    node: SimpleNode,
    /// Set while positioned on a namespace node; namespace nodes are shared
    /// between elements so the owning element is tracked separately.
    ns: Option<NamespaceScope>,
}

impl SimpleNavigator {
    pub fn node(&self) -> &SimpleNode {
        &self.node
    }
}

impl fmt::Debug for SimpleNavigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNavigator")
            .field("kind", &self.node.0.kind)
            .field("name", &self.node.0.local)
            .finish()
    }
}

impl XPathNavigator for SimpleNavigator {
    fn node_kind(&self) -> NodeKind {
        self.node.0.kind
    }

    fn local_name(&self) -> &str {
        &self.node.0.local
    }

    fn namespace_uri(&self) -> &str {
        &self.node.0.ns_uri
    }

    fn prefix(&self) -> &str {
        &self.node.0.prefix
    }

    fn string_value(&self) -> String {
        self.node.string_value()
    }

    fn base_uri(&self) -> String {
        self.node.root().0.base_uri.clone()
    }

    fn move_to_parent(&mut self) -> bool {
        if let Some(scope) = self.ns.take() {
            self.node = scope.owner;
            return true;
        }
        match self.node.parent() {
            Some(p) => {
                self.node = p;
                true
            }
            None => false,
        }
    }

    fn move_to_first_child(&mut self) -> bool {
        if self.ns.is_some() {
            return false;
        }
        match self.node.0.children.first() {
            Some(c) => {
                self.node = c.clone();
                true
            }
            None => false,
        }
    }

    fn move_to_next_sibling(&mut self) -> bool {
        if self.ns.is_some() || self.node.0.kind.is_attached() {
            return false;
        }
        let (Some(parent), Some(i)) = (self.node.parent(), self.node.index()) else {
            return false;
        };
        match parent.0.children.get(i + 1) {
            Some(n) => {
                self.node = n.clone();
                true
            }
            None => false,
        }
    }

    fn move_to_first_attribute(&mut self) -> bool {
        if self.ns.is_some() || self.node.0.kind != NodeKind::Element {
            return false;
        }
        match self.node.0.attributes.first() {
            Some(a) => {
                self.node = a.clone();
                true
            }
            None => false,
        }
    }

    fn move_to_next_attribute(&mut self) -> bool {
        if self.node.0.kind != NodeKind::Attribute {
            return false;
        }
        let (Some(parent), Some(i)) = (self.node.parent(), self.node.index()) else {
            return false;
        };
        match parent.0.attributes.get(i + 1) {
            Some(a) => {
                self.node = a.clone();
                true
            }
            None => false,
        }
    }

    fn move_to_first_namespace(&mut self) -> bool {
        if self.ns.is_some() || self.node.0.kind != NodeKind::Element {
            return false;
        }
        match NamespaceScope::collect(&self.node) {
            Some(scope) => {
                self.node = scope.nodes[0].clone();
                self.ns = Some(scope);
                true
            }
            None => false,
        }
    }

    fn move_to_next_namespace(&mut self) -> bool {
        let Some(scope) = self.ns.as_mut() else {
            return false;
        };
        match scope.nodes.get(scope.index + 1) {
            Some(n) => {
                scope.index += 1;
                self.node = n.clone();
                true
            }
            None => false,
        }
    }

    fn move_to_id(&mut self, id: &str) -> bool {
        match self.node.root().find_id(id) {
            Some(el) => {
                self.node = el;
                self.ns = None;
                true
            }
            None => false,
        }
    }

    fn is_same_position(&self, other: &Self) -> bool {
        if self.node != other.node {
            return false;
        }
        match (&self.ns, &other.ns) {
            (None, None) => true,
            (Some(a), Some(b)) => a.owner == b.owner,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeOrder, compare_by_ancestry};

    fn sample() -> SimpleNode {
        doc()
            .child(
                elem("root")
                    .namespace(ns("p", "urn:p"))
                    .attr(attr("a", "1"))
                    .child(elem("x").namespace(ns("q", "urn:q")).child(text("one")))
                    .child(elem("y").child(text("two"))),
            )
            .build()
    }

    #[test]
    fn walks_children_and_attributes() {
        let d = sample();
        let mut nav = d.navigator();
        assert!(nav.move_to_first_child());
        assert_eq!(nav.local_name(), "root");
        assert!(nav.move_to_first_attribute());
        assert_eq!(nav.string_value(), "1");
        assert!(!nav.move_to_next_attribute());
        assert!(!nav.move_to_next_sibling());
        assert!(nav.move_to_parent());
        assert_eq!(nav.string_value(), "onetwo");
    }

    #[test]
    fn namespace_scope_includes_ancestors() {
        let d = sample();
        let mut nav = d.navigator();
        assert!(nav.move_to_first_child() && nav.move_to_first_child());
        assert_eq!(nav.local_name(), "x");
        assert!(nav.move_to_first_namespace());
        let mut prefixes = vec![nav.local_name().to_string()];
        while nav.move_to_next_namespace() {
            prefixes.push(nav.local_name().to_string());
        }
        assert_eq!(prefixes, ["q", "p"]);
        assert!(nav.move_to_parent());
        assert_eq!(nav.local_name(), "x");
    }

    #[test]
    fn shared_namespace_nodes_differ_by_owner() {
        let d = sample();
        let mut root = d.navigator();
        assert!(root.move_to_first_child());
        let mut x = root.clone();
        assert!(x.move_to_first_child());
        let mut ns_root = root.clone();
        assert!(ns_root.move_to_first_namespace());
        let mut ns_x = x.clone();
        assert!(ns_x.move_to_first_namespace() && ns_x.move_to_next_namespace());
        assert_eq!(ns_root.local_name(), ns_x.local_name());
        assert!(!ns_root.is_same_position(&ns_x));
        assert_eq!(compare_by_ancestry(&ns_root, &ns_x), NodeOrder::Before);
    }

    #[test]
    fn attributes_precede_children() {
        let d = sample();
        let mut root = d.navigator();
        assert!(root.move_to_first_child());
        let mut a = root.clone();
        assert!(a.move_to_first_attribute());
        let mut x = root.clone();
        assert!(x.move_to_first_child());
        assert_eq!(compare_by_ancestry(&a, &x), NodeOrder::Before);
        assert_eq!(compare_by_ancestry(&x, &a), NodeOrder::After);
        assert_eq!(compare_by_ancestry(&root, &x), NodeOrder::Before);
    }

    #[test]
    fn unrelated_trees_are_unordered() {
        let a = sample().navigator();
        let b = sample().navigator();
        assert_eq!(compare_by_ancestry(&a, &b), NodeOrder::Unknown);
    }
}
