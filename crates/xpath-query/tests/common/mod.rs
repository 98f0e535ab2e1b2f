#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use rstest::fixture;
use xpath_query::model::simple::{SimpleNavigator, SimpleNode, attr, comment, doc, elem, elem_ns, ns, pi, text};
use xpath_query::{
    DynamicContext, DynamicContextBuilder, Error, ExtensionFunction, Focus, NodeKind, ResolutionContext, Value,
    XPathNavigator, compile_expression,
};

/// ```text
/// <library xmlns:bk="urn:books" xml:lang="en">
///   <!-- catalogue -->
///   <book id="b1" year="2001"><title>Alpha</title><bk:isbn>111</bk:isbn></book>
///   <book id="b2" year="1999" xml:lang="de"><title>Beta</title></book>
///   <?sort by-year?>
///   <shelf><book id="b3" year="2010"><title>Gamma</title></book></shelf>
/// </library>
/// ```
#[fixture]
pub fn library() -> SimpleNode {
    doc()
        .child(
            elem("library")
                .namespace(ns("bk", "urn:books"))
                .attr(attr("xml:lang", "en"))
                .child(comment(" catalogue "))
                .child(
                    elem("book")
                        .attr(attr("id", "b1"))
                        .attr(attr("year", "2001"))
                        .child(elem("title").child(text("Alpha")))
                        .child(elem_ns("urn:books", "bk:isbn").child(text("111"))),
                )
                .child(
                    elem("book")
                        .attr(attr("id", "b2"))
                        .attr(attr("year", "1999"))
                        .attr(attr("xml:lang", "de"))
                        .child(elem("title").child(text("Beta"))),
                )
                .child(pi("sort", "by-year"))
                .child(
                    elem("shelf").child(
                        elem("book")
                            .attr(attr("id", "b3"))
                            .attr(attr("year", "2010"))
                            .child(elem("title").child(text("Gamma"))),
                    ),
                ),
        )
        .build()
}

pub fn ctx(nav: SimpleNavigator) -> DynamicContext<SimpleNavigator> {
    DynamicContext::new(nav)
}

pub fn ctx_with(nav: SimpleNavigator, host: Host) -> DynamicContext<SimpleNavigator> {
    DynamicContextBuilder::new(nav).with_resolver(Arc::new(host)).build()
}

pub fn select_from(nav: SimpleNavigator, expr: &str) -> Vec<SimpleNavigator> {
    compile_expression::<SimpleNavigator>(expr)
        .unwrap()
        .select(&ctx(nav))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

pub fn select(document: &SimpleNode, expr: &str) -> Vec<SimpleNavigator> {
    select_from(document.navigator(), expr)
}

pub fn eval(document: &SimpleNode, expr: &str) -> Result<Value<SimpleNavigator>, Error> {
    compile_expression::<SimpleNavigator>(expr)?.evaluate_value(&ctx(document.navigator()))
}

pub fn string(document: &SimpleNode, expr: &str) -> String {
    eval(document, expr).unwrap().to_xpath_string()
}

pub fn number(document: &SimpleNode, expr: &str) -> f64 {
    eval(document, expr).unwrap().to_number()
}

pub fn boolean(document: &SimpleNode, expr: &str) -> bool {
    eval(document, expr).unwrap().to_boolean()
}

/// The single node selected by `expr`.
pub fn node(document: &SimpleNode, expr: &str) -> SimpleNavigator {
    let mut found = select(document, expr);
    assert_eq!(found.len(), 1, "{expr} should select exactly one node");
    found.remove(0)
}

fn id_of(nav: &SimpleNavigator) -> Option<String> {
    let mut a = nav.clone();
    if !a.move_to_first_attribute() {
        return None;
    }
    loop {
        if a.local_name() == "id" {
            return Some(a.string_value());
        }
        if !a.move_to_next_attribute() {
            return None;
        }
    }
}

/// Short readable form: `book#b1`, `@year`, `'Alpha'`, `comment()`, `/`.
pub fn label(nav: &SimpleNavigator) -> String {
    match nav.node_kind() {
        NodeKind::Root => "/".to_string(),
        NodeKind::Element => match id_of(nav) {
            Some(id) => format!("{}#{id}", nav.qualified_name()),
            None => nav.qualified_name(),
        },
        NodeKind::Attribute => format!("@{}", nav.qualified_name()),
        NodeKind::Namespace => format!("ns:{}", nav.local_name()),
        NodeKind::Text | NodeKind::Whitespace | NodeKind::SignificantWhitespace => {
            format!("'{}'", nav.string_value())
        }
        NodeKind::Comment => "comment()".to_string(),
        NodeKind::ProcessingInstruction => format!("pi({})", nav.local_name()),
    }
}

pub fn labels(nodes: &[SimpleNavigator]) -> Vec<String> {
    nodes.iter().map(label).collect()
}

/// Every node of the tree in document order: each node, then its attributes,
/// then its children. Namespace nodes are left out.
pub fn all_nodes(document: &SimpleNode) -> Vec<SimpleNavigator> {
    fn walk(nav: &SimpleNavigator, out: &mut Vec<SimpleNavigator>) {
        out.push(nav.clone());
        let mut a = nav.clone();
        if a.move_to_first_attribute() {
            loop {
                out.push(a.clone());
                if !a.move_to_next_attribute() {
                    break;
                }
            }
        }
        let mut c = nav.clone();
        if c.move_to_first_child() {
            loop {
                walk(&c, out);
                if !c.move_to_next_sibling() {
                    break;
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(&document.navigator(), &mut out);
    out
}

/// A resolver with variables, prefixes, two extension functions and an
/// optional whitespace-stripping policy.
#[derive(Default)]
pub struct Host {
    pub variables: HashMap<String, Value<SimpleNavigator>>,
    pub namespaces: HashMap<String, String>,
    pub strip_whitespace: bool,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(mut self, name: &str, value: impl Into<Value<SimpleNavigator>>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }

    pub fn prefix(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.insert(prefix.to_string(), uri.to_string());
        self
    }

    pub fn stripping(mut self) -> Self {
        self.strip_whitespace = true;
        self
    }
}

impl ResolutionContext<SimpleNavigator> for Host {
    fn resolve_variable(&self, prefix: &str, local: &str) -> Result<Value<SimpleNavigator>, Error> {
        let key = if prefix.is_empty() { local.to_string() } else { format!("{prefix}:{local}") };
        match self.variables.get(&key) {
            Some(v) => Ok(v.clone()),
            None => Err(Error::new(xpath_query::ErrorCode::UndefinedVariable, format!("no ${key}"))),
        }
    }

    fn resolve_namespace(&self, prefix: &str) -> Option<String> {
        self.namespaces.get(prefix).cloned()
    }

    fn resolve_function(
        &self,
        prefix: &str,
        local: &str,
        arity: usize,
    ) -> Option<Arc<dyn ExtensionFunction<SimpleNavigator>>> {
        match (prefix, local, arity) {
            ("ext", "upper", 1) => Some(Arc::new(Upper)),
            ("ext", "fail", 0) => Some(Arc::new(Fail)),
            ("", "key", 2) => Some(Arc::new(YearKey)),
            _ => None,
        }
    }

    fn preserve_whitespace(&self, _node: &SimpleNavigator) -> bool {
        !self.strip_whitespace
    }
}

struct Upper;

impl ExtensionFunction<SimpleNavigator> for Upper {
    fn invoke(
        &self,
        _focus: &Focus<SimpleNavigator>,
        args: Vec<Value<SimpleNavigator>>,
    ) -> Result<Value<SimpleNavigator>, Error> {
        Ok(Value::String(args[0].to_xpath_string().to_uppercase()))
    }
}

struct Fail;

impl ExtensionFunction<SimpleNavigator> for Fail {
    fn invoke(
        &self,
        _focus: &Focus<SimpleNavigator>,
        _args: Vec<Value<SimpleNavigator>>,
    ) -> Result<Value<SimpleNavigator>, Error> {
        Err(Error::new(xpath_query::ErrorCode::InvalidOperation, "boom"))
    }
}

/// `key('year', y)`: books whose `@year` equals `y`.
struct YearKey;

impl ExtensionFunction<SimpleNavigator> for YearKey {
    fn invoke(
        &self,
        focus: &Focus<SimpleNavigator>,
        args: Vec<Value<SimpleNavigator>>,
    ) -> Result<Value<SimpleNavigator>, Error> {
        let wanted = args[1].to_xpath_string();
        let mut root = focus.node.clone();
        root.move_to_root();
        let books = compile_expression::<SimpleNavigator>(&format!("//book[@year = '{wanted}']"))?
            .select(&DynamicContext::new(root))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::NodeSet(books))
    }
}
