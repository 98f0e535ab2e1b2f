use core::cmp::Ordering;

use crate::model::{XPathNavigator, document_order};
use crate::query::{Eval, Query, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, Focus};
use crate::value::ResultType;

/// Nodes kept in document order without duplicates. Appending in order is the
/// common case and stays O(1).
#[derive(Debug, Clone)]
pub(crate) struct MergeBuffer<N> {
    nodes: Vec<N>,
    cursor: usize,
}

impl<N> Default for MergeBuffer<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            cursor: 0,
        }
    }
}

impl<N: XPathNavigator> MergeBuffer<N> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: N) {
        match self.nodes.last().map(|last| document_order(last, &node)) {
            None | Some(Ordering::Less) => self.nodes.push(node),
            Some(Ordering::Equal) => {}
            Some(Ordering::Greater) => {
                if let Err(at) = self.nodes.binary_search_by(|probe| document_order(probe, &node)) {
                    self.nodes.insert(at, node);
                }
            }
        }
    }

    pub(crate) fn next(&mut self) -> Option<N> {
        let n = self.nodes.get(self.cursor).cloned();
        if n.is_some() {
            self.cursor += 1;
        }
        n
    }

    pub(crate) fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.cursor = 0;
    }

    pub(crate) fn contains(&self, node: &N) -> bool {
        self.nodes.binary_search_by(|probe| document_order(probe, node)).is_ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn position(&self) -> usize {
        self.cursor
    }
}

/// Sorts its input into document order and drops duplicates. Filled on the
/// first pull.
#[derive(Debug, Clone)]
pub(crate) struct DocumentOrderQuery<N: XPathNavigator> {
    input: Box<Query<N>>,
    buffer: MergeBuffer<N>,
    filled: bool,
}

impl<N: XPathNavigator> DocumentOrderQuery<N> {
    pub(crate) fn new(input: Query<N>) -> Self {
        Self {
            input: Box::new(input),
            buffer: MergeBuffer::new(),
            filled: false,
        }
    }

    fn fill(&mut self) -> Result<(), Error> {
        if !self.filled {
            while let Some(n) = self.input.advance()? {
                self.buffer.insert(n);
            }
            self.filled = true;
        }
        Ok(())
    }
}

impl<N: XPathNavigator> QueryOps<N> for DocumentOrderQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.input.evaluate_nodes(focus)?;
        self.buffer.clear();
        self.filled = false;
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        self.fill()?;
        Ok(self.buffer.next())
    }

    fn reset(&mut self) {
        if self.filled {
            self.buffer.rewind();
        } else {
            self.input.reset();
        }
    }

    fn current_position(&self) -> usize {
        self.buffer.position()
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        self.fill()?;
        Ok(self.buffer.len())
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        QueryProps::ORDERED | QueryProps::NON_FLAT
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        self.input.match_node(node)
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.input.bind(binding)
    }
}

/// `left | right`: both sides merged into document order.
#[derive(Debug, Clone)]
pub(crate) struct UnionQuery<N: XPathNavigator> {
    left: Box<Query<N>>,
    right: Box<Query<N>>,
    buffer: MergeBuffer<N>,
    filled: bool,
}

impl<N: XPathNavigator> UnionQuery<N> {
    pub(crate) fn new(left: Query<N>, right: Query<N>) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            buffer: MergeBuffer::new(),
            filled: false,
        }
    }

    fn fill(&mut self) -> Result<(), Error> {
        if !self.filled {
            while let Some(n) = self.left.advance()? {
                self.buffer.insert(n);
            }
            while let Some(n) = self.right.advance()? {
                self.buffer.insert(n);
            }
            self.filled = true;
        }
        Ok(())
    }
}

impl<N: XPathNavigator> QueryOps<N> for UnionQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.left.evaluate_nodes(focus)?;
        self.right.evaluate_nodes(focus)?;
        self.buffer.clear();
        self.filled = false;
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        self.fill()?;
        Ok(self.buffer.next())
    }

    fn reset(&mut self) {
        if self.filled {
            self.buffer.rewind();
        } else {
            self.left.reset();
            self.right.reset();
        }
    }

    fn current_position(&self) -> usize {
        self.buffer.position()
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        self.fill()?;
        Ok(self.buffer.len())
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        QueryProps::ORDERED | QueryProps::NON_FLAT
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        match self.left.match_node(node)? {
            Some(ctx) => Ok(Some(ctx)),
            None => self.right.match_node(node),
        }
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.left.bind(binding)?;
        self.right.bind(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::{SimpleNavigator, doc, elem};
    use rstest::rstest;

    fn children() -> Vec<SimpleNavigator> {
        let root = doc().child(elem("r").child(elem("a")).child(elem("b")).child(elem("c"))).build();
        let mut nav = root.navigator();
        assert!(nav.move_to_first_child());
        assert!(nav.move_to_first_child());
        let mut out = vec![nav.clone()];
        while nav.move_to_next_sibling() {
            out.push(nav.clone());
        }
        out
    }

    #[rstest]
    #[case(&[0, 1, 2])]
    #[case(&[2, 1, 0])]
    #[case(&[1, 2, 0, 1, 2])]
    fn merge_buffer_orders_and_dedups(#[case] order: &[usize]) {
        let nodes = children();
        let mut buf = MergeBuffer::new();
        for &i in order {
            buf.insert(nodes[i].clone());
        }
        let mut names = Vec::new();
        while let Some(n) = buf.next() {
            names.push(n.local_name().to_string());
        }
        assert_eq!(names, ["a", "b", "c"]);
        assert!(buf.contains(&nodes[1]));
        buf.rewind();
        assert_eq!(buf.next().map(|n| n.local_name().to_string()), Some("a".to_string()));
    }
}
