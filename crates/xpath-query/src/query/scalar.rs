use crate::model::XPathNavigator;
use crate::parser::ast::Op;
use crate::query::{Eval, MergeBuffer, Query, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, ErrorCode, Focus, display_qname};
use crate::value::{ResultType, Value, boolean_to_number, number_to_boolean, string_to_number};

/// A literal string or number.
#[derive(Debug, Clone)]
pub(crate) struct OperandQuery {
    value: Eval,
}

impl OperandQuery {
    pub(crate) fn string(s: impl Into<String>) -> Self {
        Self {
            value: Eval::String(s.into()),
        }
    }

    pub(crate) fn number(n: f64) -> Self {
        Self { value: Eval::Number(n) }
    }

    pub(crate) fn number_value(&self) -> Option<f64> {
        match self.value {
            Eval::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl<N: XPathNavigator> QueryOps<N> for OperandQuery {
    fn evaluate(&mut self, _focus: &Focus<N>) -> Result<Eval, Error> {
        Ok(self.value.clone())
    }

    fn static_type(&self) -> ResultType {
        match self.value {
            Eval::Number(_) => ResultType::Number,
            Eval::Boolean(_) => ResultType::Boolean,
            _ => ResultType::String,
        }
    }

    fn bind(&mut self, _binding: &Binding<N>) -> Result<(), Error> {
        Ok(())
    }
}

/// Moves a host value into query form. Node-sets are streamed from `buffer`.
pub(crate) fn load_value<N: XPathNavigator>(value: Value<N>, buffer: &mut MergeBuffer<N>) -> Eval {
    buffer.clear();
    match value {
        Value::NodeSet(nodes) => {
            for n in nodes {
                buffer.insert(n);
            }
            Eval::NodeSet
        }
        Value::String(s) => Eval::String(s),
        Value::Number(n) => Eval::Number(n),
        Value::Boolean(b) => Eval::Boolean(b),
    }
}

/// `$name`, looked up through the bound resolver on every evaluation.
#[derive(Debug, Clone)]
pub(crate) struct VariableQuery<N: XPathNavigator> {
    prefix: String,
    local: String,
    binding: Binding<N>,
    nodes: MergeBuffer<N>,
}

impl<N: XPathNavigator> VariableQuery<N> {
    pub(crate) fn new(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            local: local.into(),
            binding: Binding::unbound(),
            nodes: MergeBuffer::new(),
        }
    }
}

impl<N: XPathNavigator> QueryOps<N> for VariableQuery<N> {
    fn evaluate(&mut self, _focus: &Focus<N>) -> Result<Eval, Error> {
        let name = display_qname(&self.prefix, &self.local);
        let resolver = self.binding.require(&format!("variable ${name}"))?;
        let value = resolver.resolve_variable(&self.prefix, &self.local)?;
        tracing::trace!(variable = %name, kind = ?value.result_type(), "resolved variable");
        Ok(load_value(value, &mut self.nodes))
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        Ok(self.nodes.next())
    }

    fn reset(&mut self) {
        self.nodes.rewind();
    }

    fn current_position(&self) -> usize {
        self.nodes.position()
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        Ok(self.nodes.len())
    }

    fn static_type(&self) -> ResultType {
        ResultType::Any
    }

    fn props(&self) -> QueryProps {
        QueryProps::ORDERED | QueryProps::NON_FLAT
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.binding = binding.clone();
        Ok(())
    }
}

/// A non-node-set operand of a comparison.
#[derive(Debug, Clone, PartialEq)]
enum Atom {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Atom {
    fn from_eval(value: Eval) -> Option<Self> {
        match value {
            Eval::NodeSet => None,
            Eval::String(s) => Some(Atom::String(s)),
            Eval::Number(n) => Some(Atom::Number(n)),
            Eval::Boolean(b) => Some(Atom::Boolean(b)),
        }
    }

    fn number(&self) -> f64 {
        match self {
            Atom::String(s) => string_to_number(s),
            Atom::Number(n) => *n,
            Atom::Boolean(b) => boolean_to_number(*b),
        }
    }

    fn boolean(&self) -> bool {
        match self {
            Atom::String(s) => !s.is_empty(),
            Atom::Number(n) => number_to_boolean(*n),
            Atom::Boolean(b) => *b,
        }
    }

    /// The atom a node's string value turns into when compared against `self`.
    fn like(&self, string_value: String) -> Atom {
        match self {
            Atom::Number(_) => Atom::Number(string_to_number(&string_value)),
            _ => Atom::String(string_value),
        }
    }
}

fn mirrored(op: Op) -> Op {
    match op {
        Op::Lt => Op::Gt,
        Op::Le => Op::Ge,
        Op::Gt => Op::Lt,
        Op::Ge => Op::Le,
        other => other,
    }
}

#[allow(clippy::float_cmp)]
fn compare_atoms(op: Op, l: &Atom, r: &Atom) -> bool {
    match op {
        Op::Eq | Op::Ne => {
            let equal = match (l, r) {
                (Atom::Boolean(_), _) | (_, Atom::Boolean(_)) => l.boolean() == r.boolean(),
                (Atom::Number(_), _) | (_, Atom::Number(_)) => l.number() == r.number(),
                (Atom::String(a), Atom::String(b)) => a == b,
            };
            if op == Op::Eq { equal } else { !equal }
        }
        Op::Lt => l.number() < r.number(),
        Op::Le => l.number() <= r.number(),
        Op::Gt => l.number() > r.number(),
        Op::Ge => l.number() >= r.number(),
        _ => false,
    }
}

/// Binary operators other than `|`.
#[derive(Debug, Clone)]
pub(crate) struct OperatorQuery<N: XPathNavigator> {
    op: Op,
    left: Box<Query<N>>,
    right: Box<Query<N>>,
}

impl<N: XPathNavigator> OperatorQuery<N> {
    pub(crate) fn new(op: Op, left: Query<N>, right: Query<N>) -> Self {
        Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn arithmetic(&mut self, focus: &Focus<N>) -> Result<f64, Error> {
        let l = self.left.evaluate_number(focus)?;
        let r = self.right.evaluate_number(focus)?;
        Ok(match self.op {
            Op::Plus => l + r,
            Op::Minus => l - r,
            Op::Multiply => l * r,
            Op::Divide => l / r,
            Op::Modulo => l % r,
            _ => f64::NAN,
        })
    }

    fn compare(&mut self, focus: &Focus<N>) -> Result<bool, Error> {
        let l = self.left.evaluate(focus)?;
        let r = self.right.evaluate(focus)?;
        match (Atom::from_eval(l), Atom::from_eval(r)) {
            (Some(l), Some(r)) => Ok(compare_atoms(self.op, &l, &r)),
            (None, Some(r)) => nodes_against_atom(&mut self.left, self.op, &r),
            (Some(l), None) => nodes_against_atom(&mut self.right, mirrored(self.op), &l),
            (None, None) => {
                let mut right = Vec::new();
                while let Some(n) = self.right.advance()? {
                    right.push(Atom::String(n.string_value()));
                }
                if right.is_empty() {
                    return Ok(false);
                }
                while let Some(n) = self.left.advance()? {
                    let l = Atom::String(n.string_value());
                    if right.iter().any(|r| compare_atoms(self.op, &l, r)) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// Existential comparison of every node in `nodes` against `atom`.
fn nodes_against_atom<N: XPathNavigator>(nodes: &mut Query<N>, op: Op, atom: &Atom) -> Result<bool, Error> {
    if let Atom::Boolean(_) = atom {
        let l = Atom::Boolean(nodes.advance()?.is_some());
        return Ok(compare_atoms(op, &l, atom));
    }
    while let Some(n) = nodes.advance()? {
        if compare_atoms(op, &atom.like(n.string_value()), atom) {
            return Ok(true);
        }
    }
    Ok(false)
}

impl<N: XPathNavigator> QueryOps<N> for OperatorQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        match self.op {
            Op::Or => Ok(Eval::Boolean(
                self.left.evaluate_boolean(focus)? || self.right.evaluate_boolean(focus)?,
            )),
            Op::And => Ok(Eval::Boolean(
                self.left.evaluate_boolean(focus)? && self.right.evaluate_boolean(focus)?,
            )),
            Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => Ok(Eval::Boolean(self.compare(focus)?)),
            Op::Plus | Op::Minus | Op::Multiply | Op::Divide | Op::Modulo => {
                Ok(Eval::Number(self.arithmetic(focus)?))
            }
            Op::Union => Err(Error::new(
                ErrorCode::InvalidOperation,
                "union is not a scalar operator",
            )),
        }
    }

    fn static_type(&self) -> ResultType {
        self.op.result_type()
    }

    fn props(&self) -> QueryProps {
        self.left.context_props() | self.right.context_props()
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.left.bind(binding)?;
        self.right.bind(binding)
    }
}
