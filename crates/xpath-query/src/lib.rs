//! XPath 1.0 expressions and match patterns over any tree that implements
//! [`XPathNavigator`].
//!
//! ```
//! use xpath_query::model::simple::{doc, elem, text};
//! use xpath_query::{DynamicContext, Value, compile_expression};
//!
//! let document = doc()
//!     .child(elem("list").child(elem("item").child(text("a"))).child(elem("item").child(text("b"))))
//!     .build();
//! let expr = compile_expression("count(/list/item)").unwrap();
//! let value = expr.evaluate_value(&DynamicContext::new(document.navigator())).unwrap();
//! assert!(matches!(value, Value::Number(n) if n == 2.0));
//! ```
pub mod cache;
pub mod compiler;
pub mod evaluator;
pub mod functions;
pub mod model;
pub mod parser;
pub(crate) mod query;
pub mod runtime;
pub mod value;

pub use cache::ExpressionCache;
pub use compiler::{compile_expression, compile_expression_with, compile_pattern, compile_pattern_with};
pub use evaluator::{Evaluation, Expression, NodeSequence, Pattern, evaluate_expr};
pub use model::{NodeKind, NodeOrder, XPathNavigator};
pub use query::sort::{
    CaseOrder, KeyComparer, NumberComparer, SortDataType, SortOrder, SortValue, TextComparer,
};
pub use runtime::{
    CompileOptions, DynamicContext, DynamicContextBuilder, Error, ErrorCode, ExtensionFunction, Focus,
    ResolutionContext,
};
pub use value::{ResultType, Value};
