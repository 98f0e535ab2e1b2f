//! Child and descendant steps over inputs that may contain nested nodes.
//! Both keep their output in document order without buffering the whole
//! result.
use core::cmp::Ordering;
use smallvec::SmallVec;

use crate::model::{XPathNavigator, document_order, is_descendant_of};
use crate::query::axis::NodeMatcher;
use crate::query::{Eval, Query, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, Focus};
use crate::value::ResultType;

/// `child::x` over a document-ordered input where one input node may contain
/// another. A child iteration is suspended on a stack when the next input node
/// precedes its current child, and resumed once that input's children are done.
#[derive(Debug, Clone)]
pub(crate) struct CacheChildrenQuery<N: XPathNavigator> {
    input: Box<Query<N>>,
    matcher: NodeMatcher,
    current: Option<N>,
    next_input: Option<N>,
    stack: SmallVec<[(N, usize); 8]>,
    position: usize,
    need_input: bool,
}

impl<N: XPathNavigator> CacheChildrenQuery<N> {
    pub(crate) fn new(input: Query<N>, matcher: NodeMatcher) -> Self {
        Self {
            input: Box::new(input),
            matcher,
            current: None,
            next_input: None,
            stack: SmallVec::new(),
            position: 0,
            need_input: true,
        }
    }

    fn clear(&mut self) {
        self.current = None;
        self.next_input = None;
        self.stack.clear();
        self.position = 0;
        self.need_input = true;
    }

    fn pull_input(&mut self) -> Result<Option<N>, Error> {
        match self.next_input.take() {
            Some(n) => Ok(Some(n)),
            None => self.input.advance(),
        }
    }

    /// Peeks the next input node; if it precedes `cur`, suspends `cur` and
    /// switches to that node's children. Returns false when the switched-to
    /// node has no children.
    fn decide_next(&mut self, cur: &mut N) -> Result<bool, Error> {
        let Some(next) = self.pull_input()? else {
            return Ok(true);
        };
        if document_order(cur, &next) == Ordering::Greater {
            self.stack.push((cur.clone(), self.position));
            *cur = next;
            if !cur.move_to_first_child() {
                return Ok(false);
            }
            self.position = 0;
        } else {
            self.next_input = Some(next);
        }
        Ok(true)
    }
}

impl<N: XPathNavigator> QueryOps<N> for CacheChildrenQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.input.evaluate_nodes(focus)?;
        self.clear();
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        loop {
            let cur = if self.need_input {
                if let Some((suspended, position)) = self.stack.pop() {
                    let mut cur = suspended;
                    self.position = position;
                    if !self.decide_next(&mut cur)? {
                        continue;
                    }
                    cur
                } else {
                    let Some(mut cur) = self.pull_input()? else {
                        return Ok(None);
                    };
                    if !cur.move_to_first_child() {
                        continue;
                    }
                    self.position = 0;
                    cur
                }
            } else {
                let Some(mut cur) = self.current.take() else {
                    self.need_input = true;
                    continue;
                };
                if !cur.move_to_next_sibling() || !self.decide_next(&mut cur)? {
                    self.need_input = true;
                    continue;
                }
                cur
            };
            self.need_input = false;
            let hit = self.matcher.matches(&cur);
            self.current = Some(cur.clone());
            if hit {
                self.position += 1;
                return Ok(Some(cur));
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.clear();
    }

    fn current_position(&self) -> usize {
        self.position
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        QueryProps::ORDERED | QueryProps::NON_FLAT
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        let mut parent = node.clone();
        if !self.matcher.matches(node) || node.node_kind().is_attached() || !parent.move_to_parent() {
            return Ok(None);
        }
        self.input.match_node(&parent)
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.matcher.bind(binding)?;
        self.input.bind(binding)
    }
}

/// `descendant::x` over a document-ordered input where input nodes may be
/// nested. Input nodes inside the subtree already being walked are skipped.
#[derive(Debug, Clone)]
pub(crate) struct DescendantOverDescendantQuery<N: XPathNavigator> {
    input: Box<Query<N>>,
    matcher: NodeMatcher,
    include_self: bool,
    anchor: Option<N>,
    cursor: Option<N>,
    depth: usize,
    position: usize,
}

impl<N: XPathNavigator> DescendantOverDescendantQuery<N> {
    pub(crate) fn new(input: Query<N>, matcher: NodeMatcher, include_self: bool) -> Self {
        Self {
            input: Box::new(input),
            matcher,
            include_self,
            anchor: None,
            cursor: None,
            depth: 0,
            position: 0,
        }
    }

    fn clear(&mut self) {
        self.anchor = None;
        self.cursor = None;
        self.depth = 0;
        self.position = 0;
    }

    fn pull_anchor(&mut self) -> Result<Option<N>, Error> {
        loop {
            let Some(n) = self.input.advance()? else {
                return Ok(None);
            };
            match &self.anchor {
                Some(a) if n.is_same_position(a) || is_descendant_of(&n, a) => {}
                _ => return Ok(Some(n)),
            }
        }
    }
}

impl<N: XPathNavigator> QueryOps<N> for DescendantOverDescendantQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.input.evaluate_nodes(focus)?;
        self.clear();
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        loop {
            let Some(mut cur) = self.cursor.take() else {
                let Some(anchor) = self.pull_anchor()? else {
                    return Ok(None);
                };
                self.anchor = Some(anchor.clone());
                self.cursor = Some(anchor.clone());
                self.depth = 0;
                self.position = 0;
                if self.include_self && self.matcher.matches(&anchor) {
                    self.position = 1;
                    return Ok(Some(anchor));
                }
                continue;
            };
            if cur.move_to_first_child() {
                self.depth += 1;
            } else {
                let mut exhausted = false;
                loop {
                    if self.depth == 0 {
                        exhausted = true;
                        break;
                    }
                    if cur.move_to_next_sibling() {
                        break;
                    }
                    cur.move_to_parent();
                    self.depth -= 1;
                }
                if exhausted {
                    continue;
                }
            }
            let hit = self.matcher.matches(&cur);
            self.cursor = Some(cur.clone());
            if hit {
                self.position += 1;
                return Ok(Some(cur));
            }
        }
    }

    fn reset(&mut self) {
        self.input.reset();
        self.clear();
    }

    fn current_position(&self) -> usize {
        self.position
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        QueryProps::ORDERED | QueryProps::NON_FLAT
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        if !self.matcher.matches(node) {
            return Ok(None);
        }
        let mut cur = node.clone();
        if self.include_self {
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

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.matcher.bind(binding)?;
        self.input.bind(binding)
    }
}
