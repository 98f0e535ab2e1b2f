use crate::model::XPathNavigator;
use crate::query::{Eval, Query, QueryOps, QueryProps, predicate_holds};
use crate::runtime::{Binding, Error, Focus};
use crate::value::ResultType;

/// `input[cond]`. Positions restart whenever the input starts a new group.
#[derive(Debug, Clone)]
pub(crate) struct FilterQuery<N: XPathNavigator> {
    input: Box<Query<N>>,
    cond: Box<Query<N>>,
    position: usize,
    epoch: Option<u64>,
    size: Option<usize>,
}

impl<N: XPathNavigator> FilterQuery<N> {
    pub(crate) fn new(input: Query<N>, cond: Query<N>) -> Self {
        Self {
            input: Box::new(input),
            cond: Box::new(cond),
            position: 0,
            epoch: None,
            size: None,
        }
    }

    fn clear(&mut self) {
        self.position = 0;
        self.epoch = None;
        self.size = None;
    }

    fn sync_group(&mut self) {
        let epoch = self.input.epoch();
        if self.epoch != Some(epoch) {
            self.epoch = Some(epoch);
            self.position = 0;
            self.size = None;
        }
    }

    fn accepts(&mut self, node: &N) -> Result<bool, Error> {
        let position = self.input.current_position();
        let size = if self.cond.props().contains(QueryProps::HAS_LAST) {
            self.input.context_size()?
        } else {
            0
        };
        let focus = Focus {
            node: node.clone(),
            position,
            size,
        };
        let value = self.cond.evaluate(&focus)?;
        predicate_holds(&mut self.cond, value, position)
    }

    /// Predicates that never look at the focus position can be tested on the
    /// candidate alone.
    fn position_free(&self) -> bool {
        !self.cond.context_props().intersects(QueryProps::CONTEXT)
            && matches!(
                self.cond.static_type(),
                ResultType::Boolean | ResultType::String | ResultType::NodeSet
            )
    }
}

impl<N: XPathNavigator> QueryOps<N> for FilterQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.input.evaluate_nodes(focus)?;
        self.clear();
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        while let Some(n) = self.input.advance()? {
            self.sync_group();
            if self.accepts(&n)? {
                self.position += 1;
                return Ok(Some(n));
            }
        }
        Ok(None)
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
        let mut probe = self.clone();
        probe.restart_group();
        let mut n = 0;
        while probe.next_in_group()?.is_some() {
            n += 1;
        }
        self.size = Some(n);
        Ok(n)
    }

    fn epoch(&self) -> u64 {
        self.input.epoch()
    }

    fn next_in_group(&mut self) -> Result<Option<N>, Error> {
        while let Some(n) = self.input.next_in_group()? {
            if self.accepts(&n)? {
                self.position += 1;
                return Ok(Some(n));
            }
        }
        Ok(None)
    }

    fn restart_group(&mut self) {
        self.input.restart_group();
        self.position = 0;
    }

    fn skip_group(&mut self) {
        self.input.skip_group();
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        self.input.props().only(QueryProps::ORDERED | QueryProps::NON_FLAT | QueryProps::SINGLETON)
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        let Some(ctx) = self.input.match_node(node)? else {
            return Ok(None);
        };
        if self.position_free() {
            let value = self.cond.evaluate(&Focus::new(node.clone()))?;
            return Ok(predicate_holds(&mut self.cond, value, 1)?.then_some(ctx));
        }
        let mut probe = self.fresh_copy();
        probe.evaluate(&Focus::new(ctx.clone()))?;
        while let Some(n) = probe.advance()? {
            if n.is_same_position(node) {
                return Ok(Some(ctx));
            }
        }
        Ok(None)
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.input.bind(binding)?;
        self.cond.bind(binding)
    }
}

impl<N: XPathNavigator> FilterQuery<N> {
    fn fresh_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.reset();
        copy
    }
}

/// `input[k]` for a constant `k`: yields the k-th node of every group and
/// skips the rest of that group.
#[derive(Debug, Clone)]
pub(crate) struct PositionFilterQuery<N: XPathNavigator> {
    input: Box<Query<N>>,
    target: f64,
    seen: usize,
    epoch: Option<u64>,
    matched: bool,
}

impl<N: XPathNavigator> PositionFilterQuery<N> {
    pub(crate) fn new(input: Query<N>, target: f64) -> Self {
        Self {
            input: Box::new(input),
            target,
            seen: 0,
            epoch: None,
            matched: false,
        }
    }

    /// Only positive whole numbers can ever equal a position.
    fn reachable(&self) -> bool {
        self.target >= 1.0 && self.target.fract() == 0.0
    }

    #[allow(clippy::cast_precision_loss)]
    fn hits(&self) -> bool {
        self.seen as f64 == self.target
    }

    fn clear(&mut self) {
        self.seen = 0;
        self.epoch = None;
        self.matched = false;
    }
}

impl<N: XPathNavigator> QueryOps<N> for PositionFilterQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.input.evaluate_nodes(focus)?;
        self.clear();
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        if !self.reachable() {
            return Ok(None);
        }
        while let Some(n) = self.input.advance()? {
            let epoch = self.input.epoch();
            if self.epoch != Some(epoch) {
                self.epoch = Some(epoch);
                self.seen = 0;
            }
            self.seen += 1;
            if self.hits() {
                self.matched = true;
                self.input.skip_group();
                return Ok(Some(n));
            }
        }
        self.matched = false;
        Ok(None)
    }

    fn reset(&mut self) {
        self.input.reset();
        self.clear();
    }

    fn current_position(&self) -> usize {
        usize::from(self.matched)
    }

    fn epoch(&self) -> u64 {
        self.input.epoch()
    }

    fn next_in_group(&mut self) -> Result<Option<N>, Error> {
        if !self.reachable() {
            return Ok(None);
        }
        #[allow(clippy::cast_precision_loss)]
        while (self.seen as f64) < self.target {
            let Some(n) = self.input.next_in_group()? else {
                return Ok(None);
            };
            self.seen += 1;
            if self.hits() {
                self.matched = true;
                return Ok(Some(n));
            }
        }
        Ok(None)
    }

    fn restart_group(&mut self) {
        self.input.restart_group();
        self.seen = 0;
        self.matched = false;
    }

    fn skip_group(&mut self) {
        self.input.skip_group();
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        self.input.props().only(QueryProps::ORDERED | QueryProps::NON_FLAT | QueryProps::SINGLETON)
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        let Some(ctx) = self.input.match_node(node)? else {
            return Ok(None);
        };
        if let Query::Axis(step) = &*self.input {
            if let Some(ordinal) = step.ordinal_of(node) {
                #[allow(clippy::cast_precision_loss)]
                return Ok((ordinal as f64 == self.target).then_some(ctx));
            }
        }
        let mut probe = self.clone();
        probe.evaluate(&Focus::new(ctx.clone()))?;
        while let Some(n) = probe.advance()? {
            if n.is_same_position(node) {
                return Ok(Some(ctx));
            }
        }
        Ok(None)
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.input.bind(binding)
    }
}
