use smallvec::SmallVec;
use string_cache::DefaultAtom;

use crate::model::{NodeKind, SelectChildren, XPathNavigator, kind_matches};
use crate::parser::ast::{AxisKind, NodeTest};
use crate::query::{Eval, Query, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, Focus};
use crate::value::ResultType;

#[derive(Debug, Clone)]
enum TestKind {
    AnyNode,
    /// `*`
    Principal,
    Kind(NodeKind),
    ProcessingInstruction(Option<DefaultAtom>),
    /// `uri` stays unset until a prefixed test is bound.
    Name {
        prefix: String,
        local: DefaultAtom,
        uri: Option<DefaultAtom>,
    },
    Namespace {
        prefix: String,
        uri: Option<DefaultAtom>,
    },
}

/// Compiled node test for one axis.
#[derive(Debug, Clone)]
pub(crate) struct NodeMatcher {
    test: TestKind,
    principal: NodeKind,
}

impl NodeMatcher {
    pub(crate) fn new(axis: AxisKind, test: &NodeTest) -> Self {
        let principal = match axis {
            AxisKind::Attribute => NodeKind::Attribute,
            AxisKind::Namespace => NodeKind::Namespace,
            _ => NodeKind::Element,
        };
        let empty_uri = || Some(DefaultAtom::from(""));
        let test = match test {
            NodeTest::AnyNode => TestKind::AnyNode,
            NodeTest::Wildcard => TestKind::Principal,
            NodeTest::Text => TestKind::Kind(NodeKind::Text),
            NodeTest::Comment => TestKind::Kind(NodeKind::Comment),
            NodeTest::ProcessingInstruction(target) => {
                TestKind::ProcessingInstruction(target.as_deref().map(DefaultAtom::from))
            }
            NodeTest::Name { prefix, local } => TestKind::Name {
                prefix: prefix.clone(),
                local: DefaultAtom::from(local.as_str()),
                uri: if prefix.is_empty() { empty_uri() } else { None },
            },
            NodeTest::NamespaceWildcard { prefix } => TestKind::Namespace {
                prefix: prefix.clone(),
                uri: None,
            },
        };
        Self { test, principal }
    }

    pub(crate) fn matches<N: XPathNavigator>(&self, node: &N) -> bool {
        let kind = node.node_kind();
        match &self.test {
            TestKind::AnyNode => true,
            TestKind::Principal => kind == self.principal,
            TestKind::Kind(k) => kind_matches(*k, kind),
            TestKind::ProcessingInstruction(target) => {
                kind == NodeKind::ProcessingInstruction
                    && target.as_ref().is_none_or(|t| &**t == node.local_name())
            }
            TestKind::Name { local, uri, .. } => {
                kind == self.principal
                    && &**local == node.local_name()
                    && uri.as_ref().is_some_and(|u| &**u == node.namespace_uri())
            }
            TestKind::Namespace { uri, .. } => {
                kind == self.principal
                    && uri.as_ref().is_some_and(|u| &**u == node.namespace_uri())
            }
        }
    }

    pub(crate) fn bind<N: XPathNavigator>(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        match &mut self.test {
            TestKind::Name { prefix, uri, .. } | TestKind::Namespace { prefix, uri }
                if !prefix.is_empty() =>
            {
                *uri = Some(DefaultAtom::from(binding.resolve_namespace(prefix)?));
            }
            _ => {}
        }
        Ok(())
    }

    /// Child iteration narrowed through the navigator's selection hooks.
    fn select_children<N: XPathNavigator>(&self, parent: &N) -> SelectChildren<N> {
        match &self.test {
            TestKind::Name {
                local,
                uri: Some(uri),
                ..
            } => parent.select_children_by_name(local, uri),
            TestKind::Principal | TestKind::Name { .. } | TestKind::Namespace { .. } => {
                parent.select_children_by_kind(Some(NodeKind::Element))
            }
            TestKind::Kind(k) => parent.select_children_by_kind(Some(*k)),
            TestKind::ProcessingInstruction(_) => {
                parent.select_children_by_kind(Some(NodeKind::ProcessingInstruction))
            }
            TestKind::AnyNode => parent.select_children_by_kind(None),
        }
    }
}

/// Moves to the next node in document order that is not inside the current subtree.
pub(crate) fn skip_subtree<N: XPathNavigator>(cursor: &mut N) -> bool {
    loop {
        if cursor.move_to_next_sibling() {
            return true;
        }
        if !cursor.move_to_parent() {
            return false;
        }
    }
}

/// Per-context-node iteration state of one axis.
#[derive(Debug, Clone)]
enum Walker<N> {
    Children(SelectChildren<N>),
    Attributes { cursor: N, started: bool },
    Namespaces { cursor: N, started: bool },
    Descendants { cursor: N, depth: usize, pending_self: bool },
    Single(Option<N>),
    Ancestors { cursor: N, pending_self: bool },
    FollowingSiblings(N),
    /// `skip_current` steps over the cursor's subtree before continuing in preorder.
    Following { cursor: N, skip_current: bool, done: bool },
    /// Reverse axes without a backwards move are materialized in proximity order.
    Buffered(std::vec::IntoIter<N>),
}

impl<N: XPathNavigator> Walker<N> {
    fn start(axis: AxisKind, ctx: &N, matcher: &NodeMatcher) -> Self {
        match axis {
            AxisKind::Child => Walker::Children(matcher.select_children(ctx)),
            AxisKind::Attribute => Walker::Attributes {
                cursor: ctx.clone(),
                started: false,
            },
            AxisKind::Namespace => Walker::Namespaces {
                cursor: ctx.clone(),
                started: false,
            },
            AxisKind::Descendant | AxisKind::DescendantOrSelf => Walker::Descendants {
                cursor: ctx.clone(),
                depth: 0,
                pending_self: axis == AxisKind::DescendantOrSelf,
            },
            AxisKind::Parent => {
                let mut p = ctx.clone();
                Walker::Single(p.move_to_parent().then_some(p))
            }
            AxisKind::SelfAxis => Walker::Single(Some(ctx.clone())),
            AxisKind::Ancestor | AxisKind::AncestorOrSelf => Walker::Ancestors {
                cursor: ctx.clone(),
                pending_self: axis == AxisKind::AncestorOrSelf,
            },
            AxisKind::FollowingSibling => Walker::FollowingSiblings(ctx.clone()),
            AxisKind::Following => {
                let mut cursor = ctx.clone();
                // Following nodes of an attribute start inside its element.
                let inside = ctx.node_kind().is_attached() && cursor.move_to_parent();
                Walker::Following {
                    cursor,
                    skip_current: !inside,
                    done: false,
                }
            }
            AxisKind::PrecedingSibling => {
                Walker::Buffered(preceding_siblings(ctx, matcher).into_iter())
            }
            AxisKind::Preceding => Walker::Buffered(preceding(ctx, matcher).into_iter()),
        }
    }

    fn next(&mut self, m: &NodeMatcher) -> Option<N> {
        match self {
            Walker::Children(it) => it.find(|n| m.matches(n)),
            Walker::Attributes { cursor, started } => loop {
                let moved = if *started {
                    cursor.move_to_next_attribute()
                } else {
                    *started = true;
                    cursor.move_to_first_attribute()
                };
                if !moved {
                    return None;
                }
                if m.matches(cursor) {
                    return Some(cursor.clone());
                }
            },
            Walker::Namespaces { cursor, started } => loop {
                let moved = if *started {
                    cursor.move_to_next_namespace()
                } else {
                    *started = true;
                    cursor.move_to_first_namespace()
                };
                if !moved {
                    return None;
                }
                if m.matches(cursor) && !cursor.string_value().is_empty() {
                    return Some(cursor.clone());
                }
            },
            Walker::Descendants {
                cursor,
                depth,
                pending_self,
            } => {
                if std::mem::take(pending_self) && m.matches(cursor) {
                    return Some(cursor.clone());
                }
                loop {
                    if cursor.move_to_first_child() {
                        *depth += 1;
                    } else {
                        loop {
                            if *depth == 0 {
                                return None;
                            }
                            if cursor.move_to_next_sibling() {
                                break;
                            }
                            cursor.move_to_parent();
                            *depth -= 1;
                        }
                    }
                    if m.matches(cursor) {
                        return Some(cursor.clone());
                    }
                }
            }
            Walker::Single(node) => node.take().filter(|n| m.matches(n)),
            Walker::Ancestors {
                cursor,
                pending_self,
            } => {
                if std::mem::take(pending_self) && m.matches(cursor) {
                    return Some(cursor.clone());
                }
                while cursor.move_to_parent() {
                    if m.matches(cursor) {
                        return Some(cursor.clone());
                    }
                }
                None
            }
            Walker::FollowingSiblings(cursor) => {
                while cursor.move_to_next_sibling() {
                    if m.matches(cursor) {
                        return Some(cursor.clone());
                    }
                }
                None
            }
            Walker::Following {
                cursor,
                skip_current,
                done,
            } => {
                while !*done {
                    let moved = if std::mem::take(skip_current) {
                        skip_subtree(cursor)
                    } else {
                        cursor.move_to_first_child() || skip_subtree(cursor)
                    };
                    if !moved {
                        *done = true;
                        break;
                    }
                    if m.matches(cursor) {
                        return Some(cursor.clone());
                    }
                }
                None
            }
            Walker::Buffered(it) => it.next(),
        }
    }
}

fn preceding_siblings<N: XPathNavigator>(ctx: &N, m: &NodeMatcher) -> Vec<N> {
    let mut out = Vec::new();
    if ctx.node_kind().is_attached() {
        return out;
    }
    let mut p = ctx.clone();
    if !p.move_to_parent() || !p.move_to_first_child() {
        return out;
    }
    while !p.is_same_position(ctx) {
        if m.matches(&p) {
            out.push(p.clone());
        }
        if !p.move_to_next_sibling() {
            break;
        }
    }
    out.reverse();
    out
}

fn preceding<N: XPathNavigator>(ctx: &N, m: &NodeMatcher) -> Vec<N> {
    let mut target = ctx.clone();
    if target.node_kind().is_attached() {
        target.move_to_parent();
    }
    let mut ancestors: SmallVec<[N; 16]> = SmallVec::new();
    let mut up = target.clone();
    while up.move_to_parent() {
        ancestors.push(up.clone());
    }
    if ancestors.is_empty() {
        return Vec::new();
    }
    let mut cur = up;
    let mut out = Vec::new();
    loop {
        if !(cur.move_to_first_child() || skip_subtree(&mut cur)) || cur.is_same_position(&target) {
            break;
        }
        if m.matches(&cur) && !ancestors.iter().any(|a| a.is_same_position(&cur)) {
            out.push(cur.clone());
        }
    }
    out.reverse();
    out
}

/// Output properties of an axis step given its input's properties.
pub(crate) fn axis_props(axis: AxisKind, input: QueryProps) -> QueryProps {
    let single = input.contains(QueryProps::SINGLETON);
    let ordered_flat = input.contains(QueryProps::ORDERED) && !input.contains(QueryProps::NON_FLAT);
    match axis {
        AxisKind::SelfAxis => input.only(QueryProps::ORDERED | QueryProps::SINGLETON | QueryProps::NON_FLAT),
        AxisKind::Child | AxisKind::Attribute | AxisKind::Namespace => {
            if ordered_flat { QueryProps::ORDERED } else { QueryProps::NON_FLAT }
        }
        AxisKind::Parent => {
            if single { QueryProps::ORDERED | QueryProps::SINGLETON } else { QueryProps::NON_FLAT }
        }
        AxisKind::Descendant | AxisKind::DescendantOrSelf => {
            if ordered_flat { QueryProps::ORDERED | QueryProps::NON_FLAT } else { QueryProps::NON_FLAT }
        }
        AxisKind::FollowingSibling => {
            if single { QueryProps::ORDERED } else { QueryProps::NON_FLAT }
        }
        AxisKind::Following => {
            if single { QueryProps::ORDERED | QueryProps::NON_FLAT } else { QueryProps::NON_FLAT }
        }
        AxisKind::Ancestor
        | AxisKind::AncestorOrSelf
        | AxisKind::Preceding
        | AxisKind::PrecedingSibling => QueryProps::NON_FLAT,
    }
}

/// One location step evaluated independently for every upstream node.
#[derive(Debug, Clone)]
pub(crate) struct AxisQuery<N: XPathNavigator> {
    axis: AxisKind,
    input: Box<Query<N>>,
    matcher: NodeMatcher,
    walker: Option<Walker<N>>,
    context: Option<N>,
    position: usize,
    epoch: u64,
    size: Option<usize>,
}

impl<N: XPathNavigator> AxisQuery<N> {
    pub(crate) fn new(axis: AxisKind, input: Query<N>, matcher: NodeMatcher) -> Self {
        Self {
            axis,
            input: Box::new(input),
            matcher,
            walker: None,
            context: None,
            position: 0,
            epoch: 0,
            size: None,
        }
    }

    fn clear(&mut self) {
        self.walker = None;
        self.context = None;
        self.position = 0;
        self.size = None;
    }

    fn start_group(&mut self, ctx: N) {
        self.walker = Some(Walker::start(self.axis, &ctx, &self.matcher));
        self.context = Some(ctx);
        self.position = 0;
        self.epoch = self.epoch.wrapping_add(1);
        self.size = None;
    }

    /// 1-based index of `node` among the matching children or attributes of its parent.
    pub(crate) fn ordinal_of(&self, node: &N) -> Option<usize> {
        let mut cur = node.clone();
        if !cur.move_to_parent() {
            return None;
        }
        let (first, next): (fn(&mut N) -> bool, fn(&mut N) -> bool) = match self.axis {
            AxisKind::Child => (N::move_to_first_child, N::move_to_next_sibling),
            AxisKind::Attribute => (N::move_to_first_attribute, N::move_to_next_attribute),
            _ => return None,
        };
        if !first(&mut cur) {
            return None;
        }
        let mut i = 0;
        loop {
            if self.matcher.matches(&cur) {
                i += 1;
                if cur.is_same_position(node) {
                    return Some(i);
                }
            }
            if !next(&mut cur) {
                return None;
            }
        }
    }
}

impl<N: XPathNavigator> QueryOps<N> for AxisQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.input.evaluate_nodes(focus)?;
        self.clear();
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        loop {
            if let Some(walker) = self.walker.as_mut() {
                if let Some(n) = walker.next(&self.matcher) {
                    self.position += 1;
                    return Ok(Some(n));
                }
                self.walker = None;
            }
            let Some(ctx) = self.input.advance()? else {
                return Ok(None);
            };
            self.start_group(ctx);
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.clear();
    }

    fn current_position(&self) -> usize {
        self.position
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        if let Some(n) = self.size {
            return Ok(n);
        }
        let Some(ctx) = self.context.as_ref() else {
            return Ok(0);
        };
        let mut walker = Walker::start(self.axis, ctx, &self.matcher);
        let mut n = 0;
        while walker.next(&self.matcher).is_some() {
            n += 1;
        }
        self.size = Some(n);
        Ok(n)
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn next_in_group(&mut self) -> Result<Option<N>, Error> {
        let found = self.walker.as_mut().and_then(|w| w.next(&self.matcher));
        if found.is_some() {
            self.position += 1;
        }
        Ok(found)
    }

    fn restart_group(&mut self) {
        if let Some(ctx) = self.context.as_ref() {
            self.walker = Some(Walker::start(self.axis, ctx, &self.matcher));
        }
        self.position = 0;
    }

    fn skip_group(&mut self) {
        self.walker = None;
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        axis_props(self.axis, self.input.props())
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        if !self.matcher.matches(node) {
            return Ok(None);
        }
        match self.axis {
            AxisKind::Child | AxisKind::Attribute | AxisKind::Namespace => {
                let expected = match self.axis {
                    AxisKind::Attribute => node.node_kind() == NodeKind::Attribute,
                    AxisKind::Namespace => node.node_kind() == NodeKind::Namespace,
                    _ => !node.node_kind().is_attached(),
                };
                let mut parent = node.clone();
                if !expected || !parent.move_to_parent() {
                    return Ok(None);
                }
                self.input.match_node(&parent)
            }
            AxisKind::SelfAxis => self.input.match_node(node),
            AxisKind::Descendant | AxisKind::DescendantOrSelf => {
                let mut cur = node.clone();
                if self.axis == AxisKind::DescendantOrSelf {
                    if let Some(ctx) = self.input.match_node(&cur)? {
                        return Ok(Some(ctx));
                    }
                }
                while cur.move_to_parent() {
                    if let Some(ctx) = self.input.match_node(&cur)? {
                        return Ok(Some(ctx));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.matcher.bind(binding)?;
        self.input.bind(binding)
    }
}
