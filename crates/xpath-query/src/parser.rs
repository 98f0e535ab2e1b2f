//! Recursive-descent parser for XPath 1.0 expressions and XSLT match patterns.
//!
//! Precedence, loosest first: `or`, `and`, `= !=`, `< <= > >=`, `+ -`,
//! `* div mod`, unary `-`, `|`, path.
use crate::functions::{self, BuiltinFunction};
use crate::runtime::{CompileOptions, Error, ErrorCode, ensure_stack};
use crate::value::ResultType;

pub mod ast;
pub mod scanner;

use ast::{AstNode, AxisKind, AxisStep, FunctionCall, FunctionKind, Literal, NodeTest, Op, QName};
use scanner::{Scanner, TokenKind};

type PResult = Result<AstNode, Error>;

pub fn parse_expression(text: &str) -> PResult {
    parse_expression_with(text, &CompileOptions::default())
}

pub fn parse_expression_with(text: &str, options: &CompileOptions) -> PResult {
    let mut parser = Parser::new(text, options)?;
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    tracing::trace!(expr = text, "parsed expression");
    Ok(expr)
}

pub fn parse_pattern(text: &str) -> PResult {
    parse_pattern_with(text, &CompileOptions::default())
}

pub fn parse_pattern_with(text: &str, options: &CompileOptions) -> PResult {
    let mut parser = Parser::new(text, options)?;
    let pattern = parser.parse_pattern()?;
    parser.expect_eof()?;
    tracing::trace!(pattern = text, "parsed pattern");
    Ok(pattern)
}

fn is_node_type_name(name: &str) -> bool {
    matches!(name, "node" | "text" | "comment" | "processing-instruction")
}

fn descendant_or_self(input: Option<AstNode>) -> AstNode {
    AstNode::Axis(AxisStep {
        axis: AxisKind::DescendantOrSelf,
        test: NodeTest::AnyNode,
        input: input.map(Box::new),
        abbreviated: true,
    })
}

fn binary(op: Op, left: AstNode, right: AstNode) -> AstNode {
    AstNode::Operator {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Wraps `arg` in `string()`, `number()` or `boolean()`.
fn coerce(arg: AstNode, target: ResultType) -> AstNode {
    let function = match target {
        ResultType::String => BuiltinFunction::String,
        ResultType::Number => BuiltinFunction::Number,
        ResultType::Boolean => BuiltinFunction::Boolean,
        ResultType::NodeSet | ResultType::Any => return arg,
    };
    AstNode::Function(FunctionCall {
        kind: FunctionKind::Builtin(function),
        name: QName {
            prefix: String::new(),
            local: function.spec().name.to_string(),
        },
        args: vec![arg],
    })
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, options: &CompileOptions) -> Result<Self, Error> {
        Ok(Self {
            scanner: Scanner::new(text)?,
            depth: 0,
            max_depth: options.max_depth,
        })
    }

    fn kind(&self) -> TokenKind {
        self.scanner.kind()
    }

    fn next(&mut self) -> Result<(), Error> {
        self.scanner.next_token()
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        Error::syntax(msg, self.scanner.start())
    }

    fn unexpected(&self) -> Error {
        match self.kind() {
            TokenKind::Eof => self.error("unexpected end of expression"),
            _ => self.error(format!("unexpected token '{}'", self.scanner.lexeme())),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), Error> {
        if self.kind() != kind {
            return Err(self.unexpected());
        }
        self.next()
    }

    fn expect_eof(&self) -> Result<(), Error> {
        if self.kind() == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Every nesting construct counts against the depth limit, so both the
    /// parser and the recursive lowering stay within bounded stack.
    fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::at(
                ErrorCode::TooComplex,
                format!("expression nesting exceeds {} levels", self.max_depth),
                self.scanner.start(),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_expr(&mut self) -> PResult {
        self.enter()?;
        let expr = ensure_stack(|| self.parse_or())?;
        self.leave();
        Ok(expr)
    }

    fn binary_chain(
        &mut self,
        operand: fn(&mut Self) -> PResult,
        operator: fn(&Scanner<'a>) -> Option<Op>,
    ) -> PResult {
        let mut left = operand(self)?;
        let mut nested = 0;
        while let Some(op) = operator(&self.scanner) {
            self.enter()?;
            nested += 1;
            self.next()?;
            let right = operand(self)?;
            left = binary(op, left, right);
        }
        self.depth -= nested;
        Ok(left)
    }

    fn parse_or(&mut self) -> PResult {
        self.binary_chain(Self::parse_and, |s| s.is_keyword("or").then_some(Op::Or))
    }

    fn parse_and(&mut self) -> PResult {
        self.binary_chain(Self::parse_equality, |s| {
            s.is_keyword("and").then_some(Op::And)
        })
    }

    fn parse_equality(&mut self) -> PResult {
        self.binary_chain(Self::parse_relational, |s| match s.kind() {
            TokenKind::Eq => Some(Op::Eq),
            TokenKind::Ne => Some(Op::Ne),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> PResult {
        self.binary_chain(Self::parse_additive, |s| match s.kind() {
            TokenKind::Lt => Some(Op::Lt),
            TokenKind::Le => Some(Op::Le),
            TokenKind::Gt => Some(Op::Gt),
            TokenKind::Ge => Some(Op::Ge),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> PResult {
        self.binary_chain(Self::parse_multiplicative, |s| match s.kind() {
            TokenKind::Plus => Some(Op::Plus),
            TokenKind::Minus => Some(Op::Minus),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> PResult {
        self.binary_chain(Self::parse_unary, |s| match s.kind() {
            TokenKind::Star => Some(Op::Multiply),
            _ if s.is_keyword("div") => Some(Op::Divide),
            _ if s.is_keyword("mod") => Some(Op::Modulo),
            _ => None,
        })
    }

    /// Negation is kept as multiplication by -1.
    fn parse_unary(&mut self) -> PResult {
        let mut negations = 0;
        while self.kind() == TokenKind::Minus {
            self.enter()?;
            negations += 1;
            self.next()?;
        }
        let mut expr = self.parse_union()?;
        for _ in 0..negations {
            expr = binary(Op::Multiply, expr, AstNode::Operand(Literal::Number(-1.0)));
        }
        self.depth -= negations;
        Ok(expr)
    }

    fn parse_union(&mut self) -> PResult {
        let start = self.scanner.start();
        let mut left = self.parse_path()?;
        let mut nested = 0;
        while self.kind() == TokenKind::Pipe {
            self.enter()?;
            nested += 1;
            let at = self.scanner.start();
            self.next()?;
            let right = self.parse_path()?;
            if !left.may_be_node_set() {
                return Err(Error::syntax("union operands must be node-sets", start));
            }
            if !right.may_be_node_set() {
                return Err(Error::syntax("union operands must be node-sets", at));
            }
            left = binary(Op::Union, left, right);
        }
        self.depth -= nested;
        Ok(left)
    }

    fn is_primary_start(&self) -> bool {
        match self.kind() {
            TokenKind::String | TokenKind::Number | TokenKind::Dollar | TokenKind::LParen => true,
            TokenKind::Name => {
                self.scanner.can_be_function()
                    && !(self.scanner.prefix().is_empty() && is_node_type_name(self.scanner.name()))
            }
            _ => false,
        }
    }

    fn is_step_start(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Dot
                | TokenKind::DotDot
                | TokenKind::At
                | TokenKind::Axis
                | TokenKind::Star
                | TokenKind::Name
        )
    }

    fn parse_path(&mut self) -> PResult {
        if !self.is_primary_start() {
            return self.parse_location_path();
        }
        let start = self.scanner.start();
        let filter = self.parse_filter_expr()?;
        let continues = matches!(self.kind(), TokenKind::Slash | TokenKind::SlashSlash);
        if continues && !filter.may_be_node_set() {
            return Err(Error::syntax("path step applied to a non-node-set", start));
        }
        match self.kind() {
            TokenKind::Slash => {
                self.next()?;
                self.parse_relative_path(Some(filter))
            }
            TokenKind::SlashSlash => {
                self.next()?;
                self.parse_relative_path(Some(descendant_or_self(Some(filter))))
            }
            _ => Ok(filter),
        }
    }

    fn parse_location_path(&mut self) -> PResult {
        match self.kind() {
            TokenKind::Slash => {
                self.next()?;
                if self.is_step_start() {
                    self.parse_relative_path(Some(AstNode::Root))
                } else {
                    Ok(AstNode::Root)
                }
            }
            TokenKind::SlashSlash => {
                self.next()?;
                self.parse_relative_path(Some(descendant_or_self(Some(AstNode::Root))))
            }
            _ => self.parse_relative_path(None),
        }
    }

    fn parse_relative_path(&mut self, input: Option<AstNode>) -> PResult {
        let mut path = self.parse_step(input)?;
        let mut nested = 0;
        loop {
            let abbreviated = match self.kind() {
                TokenKind::Slash => false,
                TokenKind::SlashSlash => true,
                _ => break,
            };
            self.enter()?;
            nested += 1;
            self.next()?;
            let input = if abbreviated { descendant_or_self(Some(path)) } else { path };
            path = self.parse_step(Some(input))?;
        }
        self.depth -= nested;
        Ok(path)
    }

    fn parse_step(&mut self, input: Option<AstNode>) -> PResult {
        let input = input.map(Box::new);
        let shorthand = match self.kind() {
            TokenKind::Dot => Some(AxisKind::SelfAxis),
            TokenKind::DotDot => Some(AxisKind::Parent),
            _ => None,
        };
        if let Some(axis) = shorthand {
            self.next()?;
            return Ok(AstNode::Axis(AxisStep {
                axis,
                test: NodeTest::AnyNode,
                input,
                abbreviated: true,
            }));
        }
        let (axis, abbreviated) = match self.kind() {
            TokenKind::At => {
                self.next()?;
                (AxisKind::Attribute, true)
            }
            TokenKind::Axis => {
                let axis = AxisKind::from_name(self.scanner.name()).ok_or_else(|| {
                    self.error(format!("unknown axis '{}'", self.scanner.name()))
                })?;
                self.next()?;
                (axis, false)
            }
            TokenKind::Name | TokenKind::Star => (AxisKind::Child, true),
            _ => return Err(self.unexpected()),
        };
        let test = self.parse_node_test()?;
        let step = AstNode::Axis(AxisStep {
            axis,
            test,
            input,
            abbreviated,
        });
        self.parse_predicates(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, Error> {
        match self.kind() {
            TokenKind::Star => {
                self.next()?;
                Ok(NodeTest::Wildcard)
            }
            TokenKind::Name
                if self.scanner.can_be_function()
                    && self.scanner.prefix().is_empty()
                    && is_node_type_name(self.scanner.name()) =>
            {
                let kind = self.scanner.name().to_string();
                self.next()?;
                self.expect(TokenKind::LParen)?;
                let test = match kind.as_str() {
                    "node" => NodeTest::AnyNode,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => {
                        let target = if self.kind() == TokenKind::String {
                            let t = self.scanner.string_value().to_string();
                            self.next()?;
                            Some(t)
                        } else {
                            None
                        };
                        NodeTest::ProcessingInstruction(target)
                    }
                };
                self.expect(TokenKind::RParen)?;
                Ok(test)
            }
            TokenKind::Name => {
                let prefix = self.scanner.prefix().to_string();
                let test = if self.scanner.name() == "*" {
                    NodeTest::NamespaceWildcard { prefix }
                } else {
                    NodeTest::Name {
                        prefix,
                        local: self.scanner.name().to_string(),
                    }
                };
                self.next()?;
                Ok(test)
            }
            _ => Err(self.error("expected a node test")),
        }
    }

    fn parse_predicates(&mut self, mut expr: AstNode) -> PResult {
        let mut nested = 0;
        while self.kind() == TokenKind::LBracket {
            if !expr.may_be_node_set() {
                return Err(self.error("predicates apply only to node-sets"));
            }
            self.enter()?;
            nested += 1;
            self.next()?;
            let condition = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            expr = AstNode::Filter {
                input: Box::new(expr),
                condition: Box::new(condition),
            };
        }
        self.depth -= nested;
        Ok(expr)
    }

    fn parse_filter_expr(&mut self) -> PResult {
        let primary = self.parse_primary()?;
        self.parse_predicates(primary)
    }

    fn parse_primary(&mut self) -> PResult {
        match self.kind() {
            TokenKind::String => {
                let s = self.scanner.string_value().to_string();
                self.next()?;
                Ok(AstNode::Operand(Literal::String(s)))
            }
            TokenKind::Number => {
                let n = self.scanner.number_value();
                self.next()?;
                Ok(AstNode::Operand(Literal::Number(n)))
            }
            TokenKind::Dollar => {
                self.next()?;
                if self.kind() != TokenKind::Name || self.scanner.name() == "*" {
                    return Err(self.error("expected a variable name after '$'"));
                }
                let name = QName {
                    prefix: self.scanner.prefix().to_string(),
                    local: self.scanner.name().to_string(),
                };
                self.next()?;
                Ok(AstNode::Variable(name))
            }
            TokenKind::LParen => {
                self.next()?;
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(AstNode::Group(Box::new(inner)))
            }
            TokenKind::Name => self.parse_function_call(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_function_call(&mut self) -> PResult {
        let start = self.scanner.start();
        let name = QName {
            prefix: self.scanner.prefix().to_string(),
            local: self.scanner.name().to_string(),
        };
        self.next()?;
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.kind() != TokenKind::RParen {
            loop {
                args.push(self.parse_expr()?);
                if self.kind() != TokenKind::Comma {
                    break;
                }
                self.next()?;
            }
        }
        self.expect(TokenKind::RParen)?;
        build_function_call(name, args, start)
    }

    fn parse_pattern(&mut self) -> PResult {
        self.enter()?;
        let mut left = self.parse_location_path_pattern()?;
        while self.kind() == TokenKind::Pipe {
            self.next()?;
            let right = self.parse_location_path_pattern()?;
            left = binary(Op::Union, left, right);
        }
        self.leave();
        Ok(left)
    }

    fn pattern_error(&self, msg: impl Into<String>) -> Error {
        Error::at(ErrorCode::InvalidPattern, msg, self.scanner.start())
    }

    fn is_step_pattern_start(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::At | TokenKind::Axis | TokenKind::Star | TokenKind::Name
        )
    }

    fn parse_location_path_pattern(&mut self) -> PResult {
        match self.kind() {
            TokenKind::Slash => {
                self.next()?;
                if self.is_step_pattern_start() {
                    self.parse_relative_path_pattern(Some(AstNode::Root))
                } else {
                    Ok(AstNode::Root)
                }
            }
            TokenKind::SlashSlash => {
                self.next()?;
                self.parse_relative_path_pattern(Some(descendant_or_self(Some(AstNode::Root))))
            }
            TokenKind::Name
                if self.scanner.can_be_function()
                    && self.scanner.prefix().is_empty()
                    && matches!(self.scanner.name(), "id" | "key") =>
            {
                let root = self.parse_id_key_pattern()?;
                match self.kind() {
                    TokenKind::Slash => {
                        self.next()?;
                        self.parse_relative_path_pattern(Some(root))
                    }
                    TokenKind::SlashSlash => {
                        self.next()?;
                        self.parse_relative_path_pattern(Some(descendant_or_self(Some(root))))
                    }
                    _ => Ok(root),
                }
            }
            _ => self.parse_relative_path_pattern(None),
        }
    }

    fn string_literal(&mut self) -> Result<AstNode, Error> {
        if self.kind() != TokenKind::String {
            return Err(self.pattern_error("expected a string literal"));
        }
        let s = self.scanner.string_value().to_string();
        self.next()?;
        Ok(AstNode::Operand(Literal::String(s)))
    }

    fn parse_id_key_pattern(&mut self) -> PResult {
        let is_id = self.scanner.name() == "id";
        let name = QName {
            prefix: String::new(),
            local: self.scanner.name().to_string(),
        };
        self.next()?;
        self.expect(TokenKind::LParen)?;
        let mut args = vec![self.string_literal()?];
        if !is_id {
            self.expect(TokenKind::Comma)?;
            args.push(self.string_literal()?);
        }
        self.expect(TokenKind::RParen)?;
        let kind = if is_id {
            FunctionKind::Builtin(BuiltinFunction::Id)
        } else {
            FunctionKind::Extension
        };
        Ok(AstNode::Function(FunctionCall { kind, name, args }))
    }

    fn parse_relative_path_pattern(&mut self, input: Option<AstNode>) -> PResult {
        let mut path = self.parse_step_pattern(input)?;
        let mut nested = 0;
        loop {
            let abbreviated = match self.kind() {
                TokenKind::Slash => false,
                TokenKind::SlashSlash => true,
                _ => break,
            };
            self.enter()?;
            nested += 1;
            self.next()?;
            let input = if abbreviated { descendant_or_self(Some(path)) } else { path };
            path = self.parse_step_pattern(Some(input))?;
        }
        self.depth -= nested;
        Ok(path)
    }

    fn parse_step_pattern(&mut self, input: Option<AstNode>) -> PResult {
        let (axis, abbreviated) = match self.kind() {
            TokenKind::At => {
                self.next()?;
                (AxisKind::Attribute, true)
            }
            TokenKind::Axis => {
                let axis = match self.scanner.name() {
                    "child" => AxisKind::Child,
                    "attribute" => AxisKind::Attribute,
                    other => {
                        return Err(
                            self.pattern_error(format!("axis '{other}' is not allowed in a pattern"))
                        );
                    }
                };
                self.next()?;
                (axis, false)
            }
            TokenKind::Name | TokenKind::Star => (AxisKind::Child, true),
            TokenKind::Eof => return Err(self.pattern_error("unexpected end of pattern")),
            _ => {
                return Err(self.pattern_error(format!(
                    "unexpected token '{}' in pattern",
                    self.scanner.lexeme()
                )));
            }
        };
        let test = self.parse_node_test()?;
        let step = AstNode::Axis(AxisStep {
            axis,
            test,
            input: input.map(Box::new),
            abbreviated,
        });
        self.parse_predicates(step)
    }
}

fn build_function_call(name: QName, mut args: Vec<AstNode>, start: usize) -> PResult {
    let spec = if name.prefix.is_empty() { functions::lookup(&name.local) } else { None };
    let Some(spec) = spec else {
        return Ok(AstNode::Function(FunctionCall {
            kind: FunctionKind::Extension,
            name,
            args,
        }));
    };
    if args.len() < spec.min_args || spec.max_args.is_some_and(|max| args.len() > max) {
        return Err(Error::at(
            ErrorCode::ArgumentCount,
            format!(
                "function {}() expects {}, got {}",
                spec.name,
                spec.arity_description(),
                args.len()
            ),
            start,
        ));
    }
    args = args
        .into_iter()
        .enumerate()
        .map(|(i, arg)| match spec.param_type(i) {
            ResultType::NodeSet if !arg.may_be_node_set() => Err(Error::at(
                ErrorCode::ArgumentType,
                format!("argument {} of {}() must be a node-set", i + 1, spec.name),
                start,
            )),
            ResultType::NodeSet | ResultType::Any => Ok(arg),
            declared if arg.result_type() != declared => Ok(coerce(arg, declared)),
            _ => Ok(arg),
        })
        .collect::<Result<_, _>>()?;
    Ok(AstNode::Function(FunctionCall {
        kind: FunctionKind::Builtin(spec.function),
        name,
        args,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn name(local: &str) -> NodeTest {
        NodeTest::Name {
            prefix: String::new(),
            local: local.to_string(),
        }
    }

    #[test]
    fn operator_names_in_node_test_position() {
        let ast = parse_expression("div div div").expect("parse");
        let AstNode::Operator { op, left, right } = ast else {
            panic!("expected operator");
        };
        assert_eq!(op, Op::Divide);
        assert!(matches!(*left, AstNode::Axis(AxisStep { ref test, .. }) if *test == name("div")));
        assert!(matches!(*right, AstNode::Axis(AxisStep { ref test, .. }) if *test == name("div")));
    }

    #[test]
    fn star_is_multiply_after_operand() {
        let ast = parse_expression("* * *").expect("parse");
        assert!(matches!(ast, AstNode::Operator { op: Op::Multiply, .. }));
    }

    #[test]
    fn double_slash_expands_to_descendant_or_self() {
        let ast = parse_expression("//a").expect("parse");
        let AstNode::Axis(step) = ast else { panic!("expected axis") };
        assert_eq!(step.axis, AxisKind::Child);
        let Some(input) = step.input else { panic!("expected input") };
        assert!(matches!(
            *input,
            AstNode::Axis(AxisStep { axis: AxisKind::DescendantOrSelf, test: NodeTest::AnyNode, .. })
        ));
    }

    #[test]
    fn coerces_arguments() {
        let ast = parse_expression("string-length(1)").expect("parse");
        let AstNode::Function(call) = ast else { panic!("expected function") };
        assert!(matches!(
            &call.args[0],
            AstNode::Function(FunctionCall { kind: FunctionKind::Builtin(BuiltinFunction::String), .. })
        ));
    }

    #[test]
    fn unknown_names_are_extensions() {
        let ast = parse_expression("my-func(1)").expect("parse");
        assert!(matches!(ast, AstNode::Function(FunctionCall { kind: FunctionKind::Extension, .. })));
    }

    #[rstest]
    #[case::count_arity("count()", ErrorCode::ArgumentCount)]
    #[case::concat_arity("concat('a')", ErrorCode::ArgumentCount)]
    #[case::count_type("count(1)", ErrorCode::ArgumentType)]
    #[case::union_type("1 | a", ErrorCode::Syntax)]
    #[case::predicate_on_string("'a'[1]", ErrorCode::Syntax)]
    #[case::unknown_axis("foo::a", ErrorCode::Syntax)]
    #[case::trailing("a b", ErrorCode::Syntax)]
    #[case::unclosed("(1", ErrorCode::Syntax)]
    #[case::empty("", ErrorCode::Syntax)]
    fn rejects_invalid_expressions(#[case] text: &str, #[case] code: ErrorCode) {
        assert_eq!(parse_expression(text).expect_err("should fail").code, code);
    }

    #[test]
    fn depth_limit() {
        let deep = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        let err = parse_expression(&deep).expect_err("too deep");
        assert_eq!(err.code, ErrorCode::TooComplex);
        let opts = CompileOptions::default().with_max_depth(400);
        assert!(parse_expression_with(&deep, &opts).is_ok());
    }

    #[rstest]
    #[case::root("/")]
    #[case::child_chain("a/b")]
    #[case::anywhere("//b[@c]")]
    #[case::id_root("id('x')/a")]
    #[case::key_root("key('k', 'v')//a")]
    #[case::alternatives("a | @b | text()")]
    fn accepts_patterns(#[case] text: &str) {
        assert!(parse_pattern(text).is_ok(), "{text}");
    }

    #[rstest]
    #[case::parent_step("a/..")]
    #[case::self_step(".")]
    #[case::other_axis("ancestor::a")]
    #[case::id_variable("id($x)")]
    fn rejects_patterns(#[case] text: &str) {
        assert_eq!(parse_pattern(text).expect_err("should fail").code, ErrorCode::InvalidPattern);
    }
}
