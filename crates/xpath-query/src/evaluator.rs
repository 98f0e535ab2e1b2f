//! Compiled expressions and patterns, and the results they produce.
use std::fmt;
use std::sync::Arc;

use crate::compiler::{compile_expression, compile_key};
use crate::model::XPathNavigator;
use crate::query::sort::{CaseOrder, KeyComparer, NumberComparer, SortDataType, SortOrder, TextComparer};
use crate::query::{Eval, Query, SortQuery};
use crate::runtime::{Binding, DynamicContext, Error, ErrorCode, ResolutionContext};
use crate::value::{ResultType, Value};

/// A compiled XPath expression. Evaluation never mutates the expression, so
/// one instance can serve concurrent callers.
#[derive(Clone)]
pub struct Expression<N: XPathNavigator> {
    source: String,
    query: Query<N>,
}

impl<N: XPathNavigator> fmt::Debug for Expression<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("static_type", &self.static_type())
            .finish_non_exhaustive()
    }
}

impl<N: XPathNavigator> Expression<N> {
    pub(crate) fn new(source: &str, query: Query<N>) -> Self {
        Self {
            source: source.to_string(),
            query,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn static_type(&self) -> ResultType {
        self.query.static_type()
    }

    /// Runs the expression against a fresh copy of the pipeline.
    pub fn evaluate(&self, ctx: &DynamicContext<N>) -> Result<Evaluation<N>, Error> {
        let mut query = self.query.fresh();
        query.bind(&ctx.binding())?;
        Ok(match query.evaluate(&ctx.focus)? {
            Eval::NodeSet => Evaluation::NodeSet(NodeSequence { query }),
            Eval::String(s) => Evaluation::String(s),
            Eval::Number(n) => Evaluation::Number(n),
            Eval::Boolean(b) => Evaluation::Boolean(b),
        })
    }

    /// Evaluates and materializes the result.
    pub fn evaluate_value(&self, ctx: &DynamicContext<N>) -> Result<Value<N>, Error> {
        self.evaluate(ctx)?.into_value()
    }

    /// Evaluates an expression that must produce nodes.
    pub fn select(&self, ctx: &DynamicContext<N>) -> Result<NodeSequence<N>, Error> {
        match self.evaluate(ctx)? {
            Evaluation::NodeSet(nodes) => Ok(nodes),
            other => Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("'{}' evaluates to a {}, not a node-set", self.source, other.type_name()),
            )),
        }
    }

    /// First selected node, without pulling the rest.
    pub fn evaluate_first(&self, ctx: &DynamicContext<N>) -> Result<Option<N>, Error> {
        self.select(ctx)?.next().transpose()
    }

    /// Adds a sort key; keys apply in the order they are added, document
    /// order breaks remaining ties.
    pub fn add_sort(&mut self, key: &str, comparer: Arc<dyn KeyComparer>) -> Result<(), Error> {
        if self.static_type() != ResultType::NodeSet {
            return Err(Error::new(
                ErrorCode::InvalidOperation,
                format!("only node-set expressions can be sorted, '{}' is not one", self.source),
            ));
        }
        let key = compile_key(key)?;
        let mut sort = match &self.query {
            Query::Sort(sort) => sort.clone(),
            other => SortQuery::new(other.clone()),
        };
        sort.push_key(key, comparer);
        self.query = Query::Sort(sort);
        Ok(())
    }

    /// [`add_sort`](Self::add_sort) with one of the stock comparers.
    pub fn add_sort_by(
        &mut self,
        key: &str,
        order: SortOrder,
        case_order: CaseOrder,
        data_type: SortDataType,
    ) -> Result<(), Error> {
        let comparer: Arc<dyn KeyComparer> = match data_type {
            SortDataType::Text => Arc::new(TextComparer::new(order, case_order)),
            SortDataType::Number => Arc::new(NumberComparer::new(order)),
        };
        self.add_sort(key, comparer)
    }
}

/// Result of one evaluation.
#[derive(Debug)]
pub enum Evaluation<N: XPathNavigator> {
    NodeSet(NodeSequence<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<N: XPathNavigator> Evaluation<N> {
    fn type_name(&self) -> &'static str {
        match self {
            Evaluation::NodeSet(_) => "node-set",
            Evaluation::String(_) => "string",
            Evaluation::Number(_) => "number",
            Evaluation::Boolean(_) => "boolean",
        }
    }

    /// Drains node-sets into an owned value.
    pub fn into_value(self) -> Result<Value<N>, Error> {
        Ok(match self {
            Evaluation::NodeSet(nodes) => Value::NodeSet(nodes.collect::<Result<_, _>>()?),
            Evaluation::String(s) => Value::String(s),
            Evaluation::Number(n) => Value::Number(n),
            Evaluation::Boolean(b) => Value::Boolean(b),
        })
    }
}

/// Lazily produced nodes of a node-set result.
#[derive(Debug, Clone)]
pub struct NodeSequence<N: XPathNavigator> {
    query: Query<N>,
}

impl<N: XPathNavigator> NodeSequence<N> {
    /// Rewinds to the first node.
    pub fn reset(&mut self) {
        self.query.reset();
    }

    /// 1-based position of the node returned last; 0 before the first.
    pub fn current_position(&self) -> usize {
        self.query.current_position()
    }

    /// Total number of nodes, independent of how far iteration has gone.
    pub fn size(&self) -> Result<usize, Error> {
        let mut probe = self.query.fresh();
        let mut n = 0;
        while probe.advance()?.is_some() {
            n += 1;
        }
        Ok(n)
    }
}

impl<N: XPathNavigator> Iterator for NodeSequence<N> {
    type Item = Result<N, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.query.advance().transpose()
    }
}

/// A compiled match pattern.
#[derive(Clone)]
pub struct Pattern<N: XPathNavigator> {
    source: String,
    query: Query<N>,
}

impl<N: XPathNavigator> fmt::Debug for Pattern<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pattern").field("source", &self.source).finish_non_exhaustive()
    }
}

impl<N: XPathNavigator> Pattern<N> {
    pub(crate) fn new(source: &str, query: Query<N>) -> Self {
        Self {
            source: source.to_string(),
            query,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `node` is matched, without a resolution context.
    pub fn matches(&self, node: &N) -> Result<bool, Error> {
        self.matches_with(node, None)
    }

    pub fn matches_with(
        &self,
        node: &N,
        resolver: Option<Arc<dyn ResolutionContext<N>>>,
    ) -> Result<bool, Error> {
        let mut query = self.query.fresh();
        query.bind(&Binding(resolver))?;
        Ok(query.match_node(node)?.is_some())
    }
}

/// Compiles and evaluates `text` in one go.
pub fn evaluate_expr<N: XPathNavigator>(text: &str, ctx: &DynamicContext<N>) -> Result<Value<N>, Error> {
    compile_expression::<N>(text)?.evaluate_value(ctx)
}
