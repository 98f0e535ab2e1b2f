//! Pull-based query pipeline. Each compiled expression lowers to a tree of
//! [`Query`] values; node-set queries stream nodes through `advance`, scalar
//! queries compute a value in `evaluate`.
//!
//! Axis-driven queries expose the nodes produced for one upstream node as a
//! *group*: `epoch` changes whenever a new group starts and the
//! `next_in_group`/`restart_group`/`skip_group` calls stay inside it. Filters
//! use groups to number positions per context node. Queries without groups
//! treat their whole output as a single group.
use core::ops::BitOr;

use crate::model::XPathNavigator;
use crate::runtime::{Binding, Error, ErrorCode, Focus, ensure_stack};
use crate::value::{ResultType, boolean_to_number, boolean_to_string, number_to_boolean, number_to_string, string_to_number};

pub(crate) mod axis;
pub(crate) mod context;
pub(crate) mod filter;
pub(crate) mod interleave;
pub(crate) mod merge;
pub(crate) mod scalar;
pub(crate) mod sort;

pub(crate) use axis::{AxisQuery, NodeMatcher};
pub(crate) use context::{ContextQuery, RootQuery};
pub(crate) use filter::{FilterQuery, PositionFilterQuery};
pub(crate) use interleave::{CacheChildrenQuery, DescendantOverDescendantQuery};
pub(crate) use merge::{DocumentOrderQuery, MergeBuffer, UnionQuery};
pub(crate) use scalar::{OperandQuery, OperatorQuery, VariableQuery};
pub(crate) use sort::SortQuery;

use crate::functions::{ExtensionQuery, FunctionQuery};

/// Static properties of a query's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct QueryProps(u8);

impl QueryProps {
    pub const NONE: Self = Self(0);
    pub const DOC_ORDER: Self = Self(1);
    pub const NO_DUPS: Self = Self(1 << 1);
    /// Output may contain a node together with one of its descendants.
    pub const NON_FLAT: Self = Self(1 << 2);
    /// At most one node.
    pub const SINGLETON: Self = Self(1 << 3);
    /// The expression reads `position()`.
    pub const HAS_POSITION: Self = Self(1 << 4);
    /// The expression reads `last()`.
    pub const HAS_LAST: Self = Self(1 << 5);

    pub const ORDERED: Self = Self(Self::DOC_ORDER.0 | Self::NO_DUPS.0);
    pub const CONTEXT: Self = Self(Self::HAS_POSITION.0 | Self::HAS_LAST.0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn only(self, mask: Self) -> Self {
        Self(self.0 & mask.0)
    }
}

impl BitOr for QueryProps {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Result of `evaluate`. `NodeSet` means the nodes are pulled from the same
/// query through `advance`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Eval {
    NodeSet,
    String(String),
    Number(f64),
    Boolean(bool),
}

/// Protocol implemented by every query kind. Defaults fit scalar queries.
pub(crate) trait QueryOps<N: XPathNavigator>: Clone {
    /// Binds the focus and rewinds; scalar queries compute their value here.
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error>;

    fn advance(&mut self) -> Result<Option<N>, Error> {
        Ok(None)
    }

    /// Rewinds to the start of the sequence for the last bound focus.
    fn reset(&mut self) {}

    fn current_position(&self) -> usize {
        0
    }

    /// Number of nodes in the current group.
    fn context_size(&mut self) -> Result<usize, Error> {
        let mut probe = self.clone();
        probe.restart_group();
        let mut n = 0;
        while probe.next_in_group()?.is_some() {
            n += 1;
        }
        Ok(n)
    }

    fn epoch(&self) -> u64 {
        0
    }

    fn next_in_group(&mut self) -> Result<Option<N>, Error> {
        self.advance()
    }

    fn restart_group(&mut self) {
        self.reset();
    }

    fn skip_group(&mut self) {}

    fn static_type(&self) -> ResultType;

    fn props(&self) -> QueryProps {
        QueryProps::NONE
    }

    /// Pattern matching: returns the context node from which `node` would be
    /// selected, if any.
    fn match_node(&mut self, _node: &N) -> Result<Option<N>, Error> {
        Ok(None)
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error>;
}

#[derive(Debug)]
pub(crate) enum Query<N: XPathNavigator> {
    Context(ContextQuery<N>),
    Root(RootQuery<N>),
    Axis(AxisQuery<N>),
    CacheChildren(CacheChildrenQuery<N>),
    DescendantOverDescendant(DescendantOverDescendantQuery<N>),
    Filter(FilterQuery<N>),
    PositionFilter(PositionFilterQuery<N>),
    DocumentOrder(DocumentOrderQuery<N>),
    Union(UnionQuery<N>),
    Sort(SortQuery<N>),
    Operand(OperandQuery),
    Variable(VariableQuery<N>),
    Operator(OperatorQuery<N>),
    Function(FunctionQuery<N>),
    Extension(ExtensionQuery<N>),
}

macro_rules! dispatch {
    ($self:expr, $q:ident => $body:expr) => {
        match $self {
            Query::Context($q) => $body,
            Query::Root($q) => $body,
            Query::Axis($q) => $body,
            Query::CacheChildren($q) => $body,
            Query::DescendantOverDescendant($q) => $body,
            Query::Filter($q) => $body,
            Query::PositionFilter($q) => $body,
            Query::DocumentOrder($q) => $body,
            Query::Union($q) => $body,
            Query::Sort($q) => $body,
            Query::Operand($q) => $body,
            Query::Variable($q) => $body,
            Query::Operator($q) => $body,
            Query::Function($q) => $body,
            Query::Extension($q) => $body,
        }
    };
}

// Counting and matching clone nested pipelines mid-evaluation.
impl<N: XPathNavigator> Clone for Query<N> {
    fn clone(&self) -> Self {
        ensure_stack(|| match self {
            Query::Context(q) => Query::Context(q.clone()),
            Query::Root(q) => Query::Root(q.clone()),
            Query::Axis(q) => Query::Axis(q.clone()),
            Query::CacheChildren(q) => Query::CacheChildren(q.clone()),
            Query::DescendantOverDescendant(q) => Query::DescendantOverDescendant(q.clone()),
            Query::Filter(q) => Query::Filter(q.clone()),
            Query::PositionFilter(q) => Query::PositionFilter(q.clone()),
            Query::DocumentOrder(q) => Query::DocumentOrder(q.clone()),
            Query::Union(q) => Query::Union(q.clone()),
            Query::Sort(q) => Query::Sort(q.clone()),
            Query::Operand(q) => Query::Operand(q.clone()),
            Query::Variable(q) => Query::Variable(q.clone()),
            Query::Operator(q) => Query::Operator(q.clone()),
            Query::Function(q) => Query::Function(q.clone()),
            Query::Extension(q) => Query::Extension(q.clone()),
        })
    }
}

impl<N: XPathNavigator> Query<N> {
    pub(crate) fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        ensure_stack(|| dispatch!(self, q => QueryOps::<N>::evaluate(q, focus)))
    }

    pub(crate) fn advance(&mut self) -> Result<Option<N>, Error> {
        ensure_stack(|| dispatch!(self, q => QueryOps::<N>::advance(q)))
    }

    pub(crate) fn reset(&mut self) {
        dispatch!(self, q => QueryOps::<N>::reset(q));
    }

    pub(crate) fn current_position(&self) -> usize {
        dispatch!(self, q => QueryOps::<N>::current_position(q))
    }

    pub(crate) fn context_size(&mut self) -> Result<usize, Error> {
        ensure_stack(|| dispatch!(self, q => QueryOps::<N>::context_size(q)))
    }

    pub(crate) fn epoch(&self) -> u64 {
        dispatch!(self, q => QueryOps::<N>::epoch(q))
    }

    pub(crate) fn next_in_group(&mut self) -> Result<Option<N>, Error> {
        ensure_stack(|| dispatch!(self, q => QueryOps::<N>::next_in_group(q)))
    }

    pub(crate) fn restart_group(&mut self) {
        dispatch!(self, q => QueryOps::<N>::restart_group(q));
    }

    pub(crate) fn skip_group(&mut self) {
        dispatch!(self, q => QueryOps::<N>::skip_group(q));
    }

    pub(crate) fn static_type(&self) -> ResultType {
        dispatch!(self, q => QueryOps::<N>::static_type(q))
    }

    pub(crate) fn props(&self) -> QueryProps {
        dispatch!(self, q => QueryOps::<N>::props(q))
    }

    pub(crate) fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        ensure_stack(|| dispatch!(self, q => QueryOps::<N>::match_node(q, node)))
    }

    pub(crate) fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        ensure_stack(|| dispatch!(self, q => QueryOps::<N>::bind(q, binding)))
    }

    /// An independent copy rewound to the start of its sequence.
    pub(crate) fn fresh(&self) -> Self {
        let mut copy = self.clone();
        copy.reset();
        copy
    }

    /// Only `position()`/`last()` usage that refers to the enclosing focus.
    pub(crate) fn context_props(&self) -> QueryProps {
        self.props().only(QueryProps::CONTEXT)
    }

    /// Evaluates a query that must yield nodes.
    pub(crate) fn evaluate_nodes(&mut self, focus: &Focus<N>) -> Result<(), Error> {
        match self.evaluate(focus)? {
            Eval::NodeSet => Ok(()),
            other => Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("expression must evaluate to a node-set, got {}", eval_type_name(&other)),
            )),
        }
    }

    pub(crate) fn evaluate_string(&mut self, focus: &Focus<N>) -> Result<String, Error> {
        let value = self.evaluate(focus)?;
        self.to_string_value(value)
    }

    pub(crate) fn evaluate_number(&mut self, focus: &Focus<N>) -> Result<f64, Error> {
        Ok(match self.evaluate(focus)? {
            Eval::Number(n) => n,
            Eval::Boolean(b) => boolean_to_number(b),
            Eval::String(s) => string_to_number(&s),
            Eval::NodeSet => string_to_number(&self.first_string()?),
        })
    }

    pub(crate) fn evaluate_boolean(&mut self, focus: &Focus<N>) -> Result<bool, Error> {
        Ok(match self.evaluate(focus)? {
            Eval::Boolean(b) => b,
            Eval::Number(n) => number_to_boolean(n),
            Eval::String(s) => !s.is_empty(),
            Eval::NodeSet => self.advance()?.is_some(),
        })
    }

    /// String conversion of a value this query just produced.
    pub(crate) fn to_string_value(&mut self, value: Eval) -> Result<String, Error> {
        Ok(match value {
            Eval::String(s) => s,
            Eval::Number(n) => number_to_string(n),
            Eval::Boolean(b) => boolean_to_string(b).to_string(),
            Eval::NodeSet => self.first_string()?,
        })
    }

    fn first_string(&mut self) -> Result<String, Error> {
        Ok(self.advance()?.map(|n| n.string_value()).unwrap_or_default())
    }

    /// Drains the remaining nodes.
    pub(crate) fn collect_nodes(&mut self) -> Result<Vec<N>, Error> {
        let mut out = Vec::new();
        while let Some(n) = self.advance()? {
            out.push(n);
        }
        Ok(out)
    }
}

pub(crate) fn eval_type_name(value: &Eval) -> &'static str {
    match value {
        Eval::NodeSet => "node-set",
        Eval::String(_) => "string",
        Eval::Number(_) => "number",
        Eval::Boolean(_) => "boolean",
    }
}

/// Whether a predicate value selects the node at `position`.
pub(crate) fn predicate_holds<N: XPathNavigator>(
    cond: &mut Query<N>,
    value: Eval,
    position: usize,
) -> Result<bool, Error> {
    #[allow(clippy::cast_precision_loss)]
    let position = position as f64;
    Ok(match value {
        Eval::NodeSet => cond.advance()?.is_some(),
        Eval::Boolean(b) => b,
        Eval::Number(n) => n == position,
        Eval::String(s) => !s.is_empty(),
    })
}
