use crate::model::XPathNavigator;
use crate::value::{ResultType, Value};
use core::fmt;
use std::sync::Arc;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Default nesting limit for the parser.
pub const DEFAULT_MAX_DEPTH: usize = 200;

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 1024 * 1024;

/// Runs `f` on a fresh stack segment when less than the red zone remains.
/// Parsing, lowering and evaluation recurse once per nesting level.
#[inline]
pub(crate) fn ensure_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed token in the expression text.
    Lexical,
    /// Well-formed tokens in an invalid arrangement.
    Syntax,
    /// Nesting exceeded the configured depth limit.
    TooComplex,
    UnknownFunction,
    ArgumentCount,
    ArgumentType,
    InvalidPattern,
    /// A variable or extension function was used without a resolution context.
    NoContext,
    UndefinedVariable,
    UndefinedPrefix,
    ExtensionFailed,
    InvalidOperation,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Lexical => "lexical",
            ErrorCode::Syntax => "syntax",
            ErrorCode::TooComplex => "too-complex",
            ErrorCode::UnknownFunction => "unknown-function",
            ErrorCode::ArgumentCount => "argument-count",
            ErrorCode::ArgumentType => "argument-type",
            ErrorCode::InvalidPattern => "invalid-pattern",
            ErrorCode::NoContext => "no-context",
            ErrorCode::UndefinedVariable => "undefined-variable",
            ErrorCode::UndefinedPrefix => "undefined-prefix",
            ErrorCode::ExtensionFailed => "extension-failed",
            ErrorCode::InvalidOperation => "invalid-operation",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        use ErrorCode::*;
        Some(match s {
            "lexical" => Lexical,
            "syntax" => Syntax,
            "too-complex" => TooComplex,
            "unknown-function" => UnknownFunction,
            "argument-count" => ArgumentCount,
            "argument-type" => ArgumentType,
            "invalid-pattern" => InvalidPattern,
            "no-context" => NoContext,
            "undefined-variable" => UndefinedVariable,
            "undefined-prefix" => UndefinedPrefix,
            "extension-failed" => ExtensionFailed,
            "invalid-operation" => InvalidOperation,
            _ => return None,
        })
    }

    /// Compile-time codes are raised while parsing or lowering; the rest surface during evaluation.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            ErrorCode::Lexical
                | ErrorCode::Syntax
                | ErrorCode::TooComplex
                | ErrorCode::UnknownFunction
                | ErrorCode::ArgumentCount
                | ErrorCode::ArgumentType
                | ErrorCode::InvalidPattern
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn position_suffix(position: &Option<usize>) -> String {
    match position {
        Some(p) => format!(" (at offset {p})"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}{}", position_suffix(.position))]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    /// Byte offset into the expression text for compile-time errors.
    pub position: Option<usize>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            position: None,
            source: None,
        }
    }

    pub fn at(code: ErrorCode, msg: impl Into<String>, position: usize) -> Self {
        Self {
            position: Some(position),
            ..Self::new(code, msg)
        }
    }

    pub fn lexical(msg: impl Into<String>, position: usize) -> Self {
        Self::at(ErrorCode::Lexical, msg, position)
    }

    pub fn syntax(msg: impl Into<String>, position: usize) -> Self {
        Self::at(ErrorCode::Syntax, msg, position)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Compose an error with a source cause.
    #[must_use]
    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }
}

/// Options honored while compiling expressions and patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Host-supplied resolution of variables, prefixes, extension functions and
/// whitespace policy. Every hook has a conservative default so hosts only
/// override what they need.
pub trait ResolutionContext<N: XPathNavigator>: Send + Sync {
    fn resolve_variable(&self, prefix: &str, local: &str) -> Result<Value<N>, Error> {
        Err(Error::new(
            ErrorCode::UndefinedVariable,
            format!("variable ${} is not defined", display_qname(prefix, local)),
        ))
    }

    fn resolve_namespace(&self, _prefix: &str) -> Option<String> {
        None
    }

    fn resolve_function(
        &self,
        _prefix: &str,
        _local: &str,
        _arity: usize,
    ) -> Option<Arc<dyn ExtensionFunction<N>>> {
        None
    }

    /// Whether a whitespace-only text node takes part in `count()`.
    fn preserve_whitespace(&self, _node: &N) -> bool {
        true
    }
}

/// A host function invoked for names outside the core library.
pub trait ExtensionFunction<N: XPathNavigator>: Send + Sync {
    fn invoke(&self, focus: &Focus<N>, args: Vec<Value<N>>) -> Result<Value<N>, Error>;

    fn return_type(&self) -> ResultType {
        ResultType::Any
    }
}

/// The dynamic focus an expression is evaluated against.
#[derive(Debug, Clone)]
pub struct Focus<N> {
    pub node: N,
    /// 1-based position of `node` in the current node list.
    pub position: usize,
    /// Size of the current node list; only meaningful when the expression uses `last()`.
    pub size: usize,
}

impl<N> Focus<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            position: 1,
            size: 1,
        }
    }
}

/// Resolver handle stored by queries after binding.
pub(crate) struct Binding<N: XPathNavigator>(pub(crate) Option<Arc<dyn ResolutionContext<N>>>);

impl<N: XPathNavigator> Binding<N> {
    pub(crate) fn unbound() -> Self {
        Self(None)
    }

    pub(crate) fn resolver(&self) -> Option<&Arc<dyn ResolutionContext<N>>> {
        self.0.as_ref()
    }

    pub(crate) fn require(&self, what: &str) -> Result<&Arc<dyn ResolutionContext<N>>, Error> {
        self.0.as_ref().ok_or_else(|| {
            Error::new(
                ErrorCode::NoContext,
                format!("{what} requires a resolution context"),
            )
        })
    }

    pub(crate) fn resolve_namespace(&self, prefix: &str) -> Result<String, Error> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE.to_string());
        }
        self.0
            .as_ref()
            .and_then(|r| r.resolve_namespace(prefix))
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::UndefinedPrefix,
                    format!("namespace prefix '{prefix}' is not defined"),
                )
            })
    }
}

impl<N: XPathNavigator> Clone for Binding<N> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<N: XPathNavigator> fmt::Debug for Binding<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "Binding(bound)" } else { "Binding(unbound)" })
    }
}

pub(crate) fn display_qname(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

/// Everything a single evaluation needs: the focus and an optional resolver.
pub struct DynamicContext<N: XPathNavigator> {
    pub focus: Focus<N>,
    pub resolver: Option<Arc<dyn ResolutionContext<N>>>,
}

impl<N: XPathNavigator> DynamicContext<N> {
    pub fn new(node: N) -> Self {
        Self {
            focus: Focus::new(node),
            resolver: None,
        }
    }

    pub(crate) fn binding(&self) -> Binding<N> {
        Binding(self.resolver.clone())
    }
}

impl<N: XPathNavigator> Clone for DynamicContext<N> {
    fn clone(&self) -> Self {
        Self {
            focus: self.focus.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<N: XPathNavigator> fmt::Debug for DynamicContext<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicContext")
            .field("focus", &self.focus)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

pub struct DynamicContextBuilder<N: XPathNavigator> {
    ctx: DynamicContext<N>,
}

impl<N: XPathNavigator> DynamicContextBuilder<N> {
    pub fn new(node: N) -> Self {
        Self {
            ctx: DynamicContext::new(node),
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: usize) -> Self {
        self.ctx.focus.position = position;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.ctx.focus.size = size;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ResolutionContext<N>>) -> Self {
        self.ctx.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        self.ctx
    }
}
