//! Lowers parsed expressions and patterns into query pipelines.
use crate::evaluator::{Expression, Pattern};
use crate::functions::{ExtensionQuery, FunctionQuery};
use crate::model::XPathNavigator;
use crate::parser::ast::{AstNode, AxisKind, AxisStep, FunctionKind, Literal, NodeTest};
use crate::parser::{self, ast::Op};
use crate::query::{
    AxisQuery, CacheChildrenQuery, ContextQuery, DescendantOverDescendantQuery, DocumentOrderQuery, FilterQuery,
    NodeMatcher, OperandQuery, OperatorQuery, PositionFilterQuery, Query, QueryProps, RootQuery, UnionQuery,
    VariableQuery,
};
use crate::runtime::{CompileOptions, Error, ensure_stack};
use crate::value::ResultType;

/// Compile an expression with default options.
pub fn compile_expression<N: XPathNavigator>(text: &str) -> Result<Expression<N>, Error> {
    compile_expression_with(text, &CompileOptions::default())
}

pub fn compile_expression_with<N: XPathNavigator>(text: &str, options: &CompileOptions) -> Result<Expression<N>, Error> {
    let ast = parser::parse_expression_with(text, options)?;
    let query = ensure_order(QueryBuilder.build(&ast)?);
    let expr = Expression::new(text, query);
    tracing::debug!(source = text, static_type = ?expr.static_type(), "compiled expression");
    Ok(expr)
}

/// Compile a match pattern with default options.
pub fn compile_pattern<N: XPathNavigator>(text: &str) -> Result<Pattern<N>, Error> {
    compile_pattern_with(text, &CompileOptions::default())
}

pub fn compile_pattern_with<N: XPathNavigator>(text: &str, options: &CompileOptions) -> Result<Pattern<N>, Error> {
    let ast = parser::parse_pattern_with(text, options)?;
    let query = QueryBuilder.build(&ast)?;
    tracing::debug!(source = text, "compiled pattern");
    Ok(Pattern::new(text, query))
}

/// Lowers a sort key; node-set keys are read in document order.
pub(crate) fn compile_key<N: XPathNavigator>(text: &str) -> Result<Query<N>, Error> {
    let ast = parser::parse_expression(text)?;
    Ok(ensure_order(QueryBuilder.build(&ast)?))
}

/// Wraps node-set queries that may be out of document order or hold duplicates.
pub(crate) fn ensure_order<N: XPathNavigator>(query: Query<N>) -> Query<N> {
    if query.static_type() == ResultType::NodeSet && !query.props().contains(QueryProps::ORDERED) {
        Query::DocumentOrder(DocumentOrderQuery::new(query))
    } else {
        query
    }
}

/// Queries that already present their whole output as one context.
fn is_single_context<N: XPathNavigator>(query: &Query<N>) -> bool {
    matches!(
        query,
        Query::DocumentOrder(_) | Query::Union(_) | Query::Variable(_) | Query::Function(_) | Query::Extension(_)
    )
}

struct QueryBuilder;

impl QueryBuilder {
    fn build<N: XPathNavigator>(&self, node: &AstNode) -> Result<Query<N>, Error> {
        ensure_stack(|| self.build_node(node))
    }

    fn build_node<N: XPathNavigator>(&self, node: &AstNode) -> Result<Query<N>, Error> {
        Ok(match node {
            AstNode::Root => Query::Root(RootQuery::new()),
            AstNode::Axis(step) => self.build_step(step, false)?,
            AstNode::Filter { .. } => self.build_filter(node)?,
            AstNode::Operator { op: Op::Union, left, right } => {
                Query::Union(UnionQuery::new(self.build(left)?, self.build(right)?))
            }
            AstNode::Operator { op, left, right } => {
                let (mut l, mut r) = (self.build(left)?, self.build(right)?);
                if op.result_type() == ResultType::Number {
                    l = ensure_order(l);
                    r = ensure_order(r);
                }
                Query::Operator(OperatorQuery::new(*op, l, r))
            }
            AstNode::Operand(Literal::String(s)) => Query::Operand(OperandQuery::string(s.as_str())),
            AstNode::Operand(Literal::Number(n)) => Query::Operand(OperandQuery::number(*n)),
            AstNode::Variable(name) => Query::Variable(VariableQuery::new(name.prefix.as_str(), name.local.as_str())),
            AstNode::Group(inner) => self.build(inner)?,
            AstNode::Function(call) => {
                let args = call
                    .args
                    .iter()
                    .map(|a| self.build(a).map(ensure_order))
                    .collect::<Result<Vec<_>, _>>()?;
                match call.kind {
                    FunctionKind::Builtin(f) => Query::Function(FunctionQuery::new(f, args)),
                    FunctionKind::Extension => Query::Extension(ExtensionQuery::new(
                        call.name.prefix.as_str(),
                        call.name.local.as_str(),
                        args,
                    )),
                }
            }
        })
    }

    /// `filtered` is set when predicates apply to this step, which rules out
    /// the interleaving strategies and the `//x` collapse.
    fn build_step<N: XPathNavigator>(&self, step: &AxisStep, filtered: bool) -> Result<Query<N>, Error> {
        if let Some(collapsed) = collapse_descendant(step, filtered) {
            return self.build_step(&collapsed, false);
        }
        let input = match &step.input {
            Some(input) => self.build(input)?,
            None => Query::Context(ContextQuery::new()),
        };
        let matcher = NodeMatcher::new(step.axis, &step.test);
        let nested = input.props().contains(QueryProps::NON_FLAT);
        let query = match step.axis {
            AxisKind::Child if nested && !filtered => {
                tracing::trace!(axis = step.axis.name(), strategy = "cache-children", "lowered step");
                Query::CacheChildren(CacheChildrenQuery::new(ensure_order(input), matcher))
            }
            AxisKind::Descendant | AxisKind::DescendantOrSelf if nested && !filtered => {
                tracing::trace!(axis = step.axis.name(), strategy = "descendant-over-descendant", "lowered step");
                let include_self = step.axis == AxisKind::DescendantOrSelf;
                Query::DescendantOverDescendant(DescendantOverDescendantQuery::new(
                    ensure_order(input),
                    matcher,
                    include_self,
                ))
            }
            axis => {
                tracing::trace!(axis = axis.name(), strategy = "streaming", "lowered step");
                Query::Axis(AxisQuery::new(axis, input, matcher))
            }
        };
        Ok(query)
    }

    fn build_filter<N: XPathNavigator>(&self, node: &AstNode) -> Result<Query<N>, Error> {
        let AstNode::Filter { input, condition } = node else {
            return self.build(node);
        };
        let base = match input.as_ref() {
            AstNode::Axis(step) => self.build_step(step, true)?,
            AstNode::Filter { .. } => self.build_filter(input)?,
            other => {
                let base = self.build(other)?;
                if is_single_context(&base) {
                    base
                } else {
                    Query::DocumentOrder(DocumentOrderQuery::new(base))
                }
            }
        };
        let cond: Query<N> = self.build(condition)?;
        if let Query::Operand(operand) = &cond {
            if let Some(n) = operand.number_value() {
                return Ok(Query::PositionFilter(PositionFilterQuery::new(base, n)));
            }
        }
        Ok(Query::Filter(FilterQuery::new(base, cond)))
    }
}

/// `descendant-or-self::node()/child::x` as a single `descendant::x` step.
fn collapse_descendant(step: &AxisStep, filtered: bool) -> Option<AxisStep> {
    if filtered || step.axis != AxisKind::Child {
        return None;
    }
    let Some(AstNode::Axis(inner)) = step.input.as_deref() else {
        return None;
    };
    if inner.axis != AxisKind::DescendantOrSelf || inner.test != NodeTest::AnyNode {
        return None;
    }
    Some(AxisStep {
        axis: AxisKind::Descendant,
        test: step.test.clone(),
        input: inner.input.clone(),
        abbreviated: step.abbreviated,
    })
}
