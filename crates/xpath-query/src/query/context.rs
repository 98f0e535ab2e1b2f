use crate::model::{NodeKind, XPathNavigator};
use crate::query::{Eval, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, Focus};
use crate::value::ResultType;

/// Yields the focus node once.
#[derive(Debug, Clone)]
pub(crate) struct ContextQuery<N> {
    node: Option<N>,
    done: bool,
}

impl<N> ContextQuery<N> {
    pub(crate) fn new() -> Self {
        Self {
            node: None,
            done: false,
        }
    }
}

impl<N: XPathNavigator> QueryOps<N> for ContextQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.node = Some(focus.node.clone());
        self.done = false;
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(self.node.clone())
    }

    fn reset(&mut self) {
        self.done = false;
    }

    fn current_position(&self) -> usize {
        usize::from(self.done && self.node.is_some())
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        Ok(usize::from(self.node.is_some()))
    }

    fn skip_group(&mut self) {
        self.done = true;
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        QueryProps::ORDERED | QueryProps::SINGLETON
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        Ok(Some(node.clone()))
    }

    fn bind(&mut self, _binding: &Binding<N>) -> Result<(), Error> {
        Ok(())
    }
}

/// Yields the root of the focus node's tree once.
#[derive(Debug, Clone)]
pub(crate) struct RootQuery<N> {
    inner: ContextQuery<N>,
}

impl<N> RootQuery<N> {
    pub(crate) fn new() -> Self {
        Self {
            inner: ContextQuery::new(),
        }
    }
}

impl<N: XPathNavigator> QueryOps<N> for RootQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        let mut root = focus.node.clone();
        root.move_to_root();
        self.inner.evaluate(&Focus::new(root))
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        self.inner.advance()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn current_position(&self) -> usize {
        self.inner.current_position()
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        self.inner.context_size()
    }

    fn skip_group(&mut self) {
        self.inner.skip_group();
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        QueryProps::ORDERED | QueryProps::SINGLETON
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        Ok((node.node_kind() == NodeKind::Root).then(|| node.clone()))
    }

    fn bind(&mut self, _binding: &Binding<N>) -> Result<(), Error> {
        Ok(())
    }
}
