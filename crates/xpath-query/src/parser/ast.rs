//! Tree produced by the parser for both expressions and patterns.
use crate::functions::BuiltinFunction;
use crate::value::ResultType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisKind {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Namespace,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl AxisKind {
    pub fn from_name(name: &str) -> Option<Self> {
        use AxisKind::*;
        Some(match name {
            "ancestor" => Ancestor,
            "ancestor-or-self" => AncestorOrSelf,
            "attribute" => Attribute,
            "child" => Child,
            "descendant" => Descendant,
            "descendant-or-self" => DescendantOrSelf,
            "following" => Following,
            "following-sibling" => FollowingSibling,
            "namespace" => Namespace,
            "parent" => Parent,
            "preceding" => Preceding,
            "preceding-sibling" => PrecedingSibling,
            "self" => SelfAxis,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use AxisKind::*;
        match self {
            Ancestor => "ancestor",
            AncestorOrSelf => "ancestor-or-self",
            Attribute => "attribute",
            Child => "child",
            Descendant => "descendant",
            DescendantOrSelf => "descendant-or-self",
            Following => "following",
            FollowingSibling => "following-sibling",
            Namespace => "namespace",
            Parent => "parent",
            Preceding => "preceding",
            PrecedingSibling => "preceding-sibling",
            SelfAxis => "self",
        }
    }

    /// Reverse axes number their nodes in reverse document order.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            AxisKind::Ancestor
                | AxisKind::AncestorOrSelf
                | AxisKind::Preceding
                | AxisKind::PrecedingSibling
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `*`: any node of the axis' principal kind.
    Wildcard,
    /// `prefix:*`
    NamespaceWildcard { prefix: String },
    Name { prefix: String, local: String },
    /// `node()`
    AnyNode,
    /// `text()`
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisStep {
    pub axis: AxisKind,
    pub test: NodeTest,
    /// `None` means the step starts from the context node.
    pub input: Option<Box<AstNode>>,
    /// Came from `.`, `..`, `@` or `//` shorthand.
    pub abbreviated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Union,
}

impl Op {
    pub fn result_type(self) -> ResultType {
        match self {
            Op::Or | Op::And | Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                ResultType::Boolean
            }
            Op::Plus | Op::Minus | Op::Multiply | Op::Divide | Op::Modulo => ResultType::Number,
            Op::Union => ResultType::NodeSet,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QName {
    pub prefix: String,
    pub local: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Builtin(BuiltinFunction),
    /// Resolved through the host at evaluation time.
    Extension,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub kind: FunctionKind,
    pub name: QName,
    pub args: Vec<AstNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Root,
    Axis(AxisStep),
    Filter {
        input: Box<AstNode>,
        condition: Box<AstNode>,
    },
    Operator {
        op: Op,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    Operand(Literal),
    Variable(QName),
    Group(Box<AstNode>),
    Function(FunctionCall),
}

impl AstNode {
    pub fn result_type(&self) -> ResultType {
        match self {
            AstNode::Root | AstNode::Axis(_) => ResultType::NodeSet,
            AstNode::Filter { input, .. } => input.result_type(),
            AstNode::Operator { op, .. } => op.result_type(),
            AstNode::Operand(Literal::String(_)) => ResultType::String,
            AstNode::Operand(Literal::Number(_)) => ResultType::Number,
            AstNode::Variable(_) => ResultType::Any,
            AstNode::Group(inner) => inner.result_type(),
            AstNode::Function(call) => match call.kind {
                FunctionKind::Builtin(f) => f.spec().returns,
                FunctionKind::Extension => ResultType::Any,
            },
        }
    }

    /// Node-set or unknown until evaluation.
    pub fn may_be_node_set(&self) -> bool {
        matches!(self.result_type(), ResultType::NodeSet | ResultType::Any)
    }
}
