//! The XPath 1.0 core function library.
//!
//! Conventions:
//! - The signature table is a static; the parser consults it for arity and
//!   argument coercion, so implementations can assume coerced arguments.
//! - Each family lives in its own module as `pub(super) fn <name>_fn`
//!   taking a [`CallCtx`].
//! - Optional arguments default to the context node.
use crate::model::XPathNavigator;
use crate::query::{Eval, MergeBuffer, Query, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, Focus};
use crate::value::ResultType;

mod boolean;
mod extension;
mod nodes;
mod numbers;
mod strings;

pub(crate) use extension::ExtensionQuery;

/// Every function of the core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    Last,
    Position,
    Count,
    Id,
    LocalName,
    NamespaceUri,
    Name,
    String,
    Concat,
    StartsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Boolean,
    Not,
    True,
    False,
    Lang,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

/// Signature of a core function.
#[derive(Debug)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub function: BuiltinFunction,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    /// Declared parameter types; the last one repeats for variadic tails.
    pub params: &'static [ResultType],
    pub returns: ResultType,
}

impl FunctionSpec {
    pub fn param_type(&self, index: usize) -> ResultType {
        self.params
            .get(index)
            .or_else(|| self.params.last())
            .copied()
            .unwrap_or(ResultType::Any)
    }

    pub fn arity_description(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => plural(max),
            Some(max) => format!("{} to {max} arguments", self.min_args),
            None => format!("at least {}", plural(self.min_args)),
        }
    }
}

fn plural(n: usize) -> String {
    if n == 1 { "1 argument".to_string() } else { format!("{n} arguments") }
}

macro_rules! spec {
    ($name:literal, $f:ident, $min:expr, $max:expr, [$($p:ident),*], $ret:ident) => {
        FunctionSpec {
            name: $name,
            function: BuiltinFunction::$f,
            min_args: $min,
            max_args: $max,
            params: &[$(ResultType::$p),*],
            returns: ResultType::$ret,
        }
    };
}

static FUNCTIONS: [FunctionSpec; 27] = [
    spec!("last", Last, 0, Some(0), [], Number),
    spec!("position", Position, 0, Some(0), [], Number),
    spec!("count", Count, 1, Some(1), [NodeSet], Number),
    spec!("id", Id, 1, Some(1), [Any], NodeSet),
    spec!("local-name", LocalName, 0, Some(1), [NodeSet], String),
    spec!("namespace-uri", NamespaceUri, 0, Some(1), [NodeSet], String),
    spec!("name", Name, 0, Some(1), [NodeSet], String),
    spec!("string", String, 0, Some(1), [Any], String),
    spec!("concat", Concat, 2, None, [String], String),
    spec!("starts-with", StartsWith, 2, Some(2), [String, String], Boolean),
    spec!("contains", Contains, 2, Some(2), [String, String], Boolean),
    spec!("substring-before", SubstringBefore, 2, Some(2), [String, String], String),
    spec!("substring-after", SubstringAfter, 2, Some(2), [String, String], String),
    spec!("substring", Substring, 2, Some(3), [String, Number, Number], String),
    spec!("string-length", StringLength, 0, Some(1), [String], Number),
    spec!("normalize-space", NormalizeSpace, 0, Some(1), [String], String),
    spec!("translate", Translate, 3, Some(3), [String, String, String], String),
    spec!("boolean", Boolean, 1, Some(1), [Any], Boolean),
    spec!("not", Not, 1, Some(1), [Boolean], Boolean),
    spec!("true", True, 0, Some(0), [], Boolean),
    spec!("false", False, 0, Some(0), [], Boolean),
    spec!("lang", Lang, 1, Some(1), [String], Boolean),
    spec!("number", Number, 0, Some(1), [Any], Number),
    spec!("sum", Sum, 1, Some(1), [NodeSet], Number),
    spec!("floor", Floor, 1, Some(1), [Number], Number),
    spec!("ceiling", Ceiling, 1, Some(1), [Number], Number),
    spec!("round", Round, 1, Some(1), [Number], Number),
];

/// Looks up a core function by its unprefixed name.
pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.iter().find(|spec| spec.name == name)
}

impl BuiltinFunction {
    pub fn spec(self) -> &'static FunctionSpec {
        // The table lists the variants in declaration order.
        &FUNCTIONS[self as usize]
    }

    fn props(self) -> QueryProps {
        match self {
            BuiltinFunction::Position => QueryProps::HAS_POSITION,
            BuiltinFunction::Last => QueryProps::HAS_LAST,
            _ => QueryProps::NONE,
        }
    }
}

/// Arguments and focus of one call.
pub(crate) struct CallCtx<'a, N: XPathNavigator> {
    pub(crate) focus: &'a Focus<N>,
    pub(crate) args: &'a mut [Query<N>],
    pub(crate) binding: &'a Binding<N>,
}

impl<N: XPathNavigator> CallCtx<'_, N> {
    fn has_arg(&self, i: usize) -> bool {
        i < self.args.len()
    }

    fn string(&mut self, i: usize) -> Result<String, Error> {
        self.args[i].evaluate_string(self.focus)
    }

    fn number(&mut self, i: usize) -> Result<f64, Error> {
        self.args[i].evaluate_number(self.focus)
    }

    fn boolean(&mut self, i: usize) -> Result<bool, Error> {
        self.args[i].evaluate_boolean(self.focus)
    }

    /// Argument `i` as a string, or the context node's string value.
    fn string_or_context(&mut self, i: usize) -> Result<String, Error> {
        if self.has_arg(i) { self.string(i) } else { Ok(self.focus.node.string_value()) }
    }

    /// Evaluates node-set argument `i` for streaming through `advance`.
    fn nodes(&mut self, i: usize) -> Result<&mut Query<N>, Error> {
        let q = &mut self.args[i];
        q.evaluate_nodes(self.focus)?;
        Ok(q)
    }

    /// First node of argument `i` in document order, or the context node.
    fn first_node_or_context(&mut self, i: usize) -> Result<Option<N>, Error> {
        if self.has_arg(i) { self.nodes(i)?.advance() } else { Ok(Some(self.focus.node.clone())) }
    }
}

/// A call to a core library function.
#[derive(Debug, Clone)]
pub(crate) struct FunctionQuery<N: XPathNavigator> {
    function: BuiltinFunction,
    args: Vec<Query<N>>,
    binding: Binding<N>,
    /// Result of `id()`.
    nodes: MergeBuffer<N>,
}

impl<N: XPathNavigator> FunctionQuery<N> {
    pub(crate) fn new(function: BuiltinFunction, args: Vec<Query<N>>) -> Self {
        Self {
            function,
            args,
            binding: Binding::unbound(),
            nodes: MergeBuffer::new(),
        }
    }
}

impl<N: XPathNavigator> QueryOps<N> for FunctionQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        use BuiltinFunction as F;
        let mut ctx = CallCtx {
            focus,
            args: &mut self.args,
            binding: &self.binding,
        };
        match self.function {
            F::Last => nodes::last_fn(&mut ctx),
            F::Position => nodes::position_fn(&mut ctx),
            F::Count => nodes::count_fn(&mut ctx),
            F::Id => nodes::id_fn(&mut ctx, &mut self.nodes),
            F::LocalName => nodes::local_name_fn(&mut ctx),
            F::NamespaceUri => nodes::namespace_uri_fn(&mut ctx),
            F::Name => nodes::name_fn(&mut ctx),
            F::String => strings::string_fn(&mut ctx),
            F::Concat => strings::concat_fn(&mut ctx),
            F::StartsWith => strings::starts_with_fn(&mut ctx),
            F::Contains => strings::contains_fn(&mut ctx),
            F::SubstringBefore => strings::substring_before_fn(&mut ctx),
            F::SubstringAfter => strings::substring_after_fn(&mut ctx),
            F::Substring => strings::substring_fn(&mut ctx),
            F::StringLength => strings::string_length_fn(&mut ctx),
            F::NormalizeSpace => strings::normalize_space_fn(&mut ctx),
            F::Translate => strings::translate_fn(&mut ctx),
            F::Boolean => boolean::boolean_fn(&mut ctx),
            F::Not => boolean::not_fn(&mut ctx),
            F::True => Ok(Eval::Boolean(true)),
            F::False => Ok(Eval::Boolean(false)),
            F::Lang => boolean::lang_fn(&mut ctx),
            F::Number => numbers::number_fn(&mut ctx),
            F::Sum => numbers::sum_fn(&mut ctx),
            F::Floor => numbers::floor_fn(&mut ctx),
            F::Ceiling => numbers::ceiling_fn(&mut ctx),
            F::Round => numbers::round_fn(&mut ctx),
        }
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
        self.function.spec().returns
    }

    fn props(&self) -> QueryProps {
        let own = match self.function {
            BuiltinFunction::Id => QueryProps::ORDERED | QueryProps::NON_FLAT,
            f => f.props(),
        };
        self.args.iter().fold(own, |acc, a| acc | a.context_props())
    }

    /// Only `id()` can root a pattern; a node matches when it is among the
    /// nodes selected from its own document.
    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        if self.function != BuiltinFunction::Id {
            return Ok(None);
        }
        self.evaluate(&Focus::new(node.clone()))?;
        Ok(self.nodes.contains(node).then(|| node.clone()))
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.binding = binding.clone();
        for arg in &mut self.args {
            arg.bind(binding)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn table_matches_declaration_order() {
        for spec in &FUNCTIONS {
            assert_eq!(spec.function.spec().name, spec.name);
        }
    }

    #[rstest]
    #[case("concat", "at least 2 arguments")]
    #[case("substring", "2 to 3 arguments")]
    #[case("count", "1 argument")]
    #[case("true", "0 arguments")]
    fn describes_arity(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(lookup(name).map(FunctionSpec::arity_description).as_deref(), Some(expected));
    }

    #[test]
    fn unknown_names_are_not_builtin() {
        assert!(lookup("key").is_none());
        assert!(lookup("Count").is_none());
    }
}
