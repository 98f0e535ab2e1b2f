mod common;

use std::error::Error as _;

use common::{Host, ctx, ctx_with, labels, library, select};
use rstest::rstest;
use xpath_query::model::simple::{SimpleNavigator, SimpleNode, doc, elem, text, ws};
use xpath_query::{ErrorCode, Value, compile_expression};

fn eval_with(document: &SimpleNode, host: Host, expr: &str) -> Result<Value<SimpleNavigator>, xpath_query::Error> {
    compile_expression(expr)?.evaluate_value(&ctx_with(document.navigator(), host))
}

#[rstest]
fn variables_need_a_resolver(library: SimpleNode) {
    let err = compile_expression::<SimpleNavigator>("$n + 1")
        .unwrap()
        .evaluate_value(&ctx(library.navigator()))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NoContext);
}

#[rstest]
fn scalar_variables(library: SimpleNode) {
    let host = || Host::new().var("n", 3.0).var("s", "abc").var("p:flag", true);
    assert_eq!(eval_with(&library, host(), "$n * 2").unwrap().to_number(), 6.0);
    assert_eq!(eval_with(&library, host(), "string-length($s)").unwrap().to_number(), 3.0);
    assert!(eval_with(&library, host(), "$p:flag").unwrap().to_boolean());
    let err = eval_with(&library, host(), "$missing").unwrap_err();
    assert_eq!(err.code, ErrorCode::UndefinedVariable);
}

#[rstest]
fn node_set_variables_filter_and_navigate(library: SimpleNode) {
    let books = select(&library, "//book");
    let host = || Host::new().var("books", books.clone());
    let pick = |expr: &str| match eval_with(&library, host(), expr).unwrap() {
        Value::NodeSet(nodes) => labels(&nodes),
        other => panic!("{expr} gave {other:?}"),
    };
    assert_eq!(pick("$books[@year > 2000]"), ["book#b1", "book#b3"]);
    assert_eq!(pick("$books[2]"), ["book#b2"]);
    assert_eq!(pick("$books[last()]"), ["book#b3"]);
    assert_eq!(pick("$books/title"), ["title", "title", "title"]);
    assert_eq!(pick("$books | //shelf"), ["book#b1", "book#b2", "shelf", "book#b3"]);
    assert_eq!(eval_with(&library, host(), "count($books)").unwrap().to_number(), 3.0);
}

#[rstest]
fn unrelated_trees_order_by_base_uri() {
    let a = doc().base_uri("a.xml").child(elem("x")).build();
    let b = doc().base_uri("b.xml").child(elem("y")).build();
    let host = Host::new().var("a", select(&a, "/x")).var("b", select(&b, "/y"));
    let Value::NodeSet(nodes) = eval_with(&a, host, "$b | $a").unwrap() else {
        panic!("expected nodes");
    };
    assert_eq!(labels(&nodes), ["x", "y"]);
}

#[rstest]
fn prefixes_resolve_through_host(library: SimpleNode) {
    let err = compile_expression::<SimpleNavigator>("string(//bk:isbn)")
        .unwrap()
        .evaluate_value(&ctx(library.navigator()))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UndefinedPrefix);

    let renamed = Host::new().prefix("b", "urn:books");
    assert_eq!(eval_with(&library, renamed, "string(//b:isbn)").unwrap().to_xpath_string(), "111");
    let wildcard = Host::new().prefix("bk", "urn:books");
    assert_eq!(eval_with(&library, wildcard, "count(//bk:*)").unwrap().to_number(), 1.0);
    let other = Host::new().prefix("bk", "urn:other");
    assert_eq!(eval_with(&library, other, "count(//bk:isbn)").unwrap().to_number(), 0.0);
}

#[rstest]
fn xml_prefix_is_always_bound(library: SimpleNode) {
    let found = compile_expression::<SimpleNavigator>("count(//@xml:lang)")
        .unwrap()
        .evaluate_value(&ctx(library.navigator()))
        .unwrap();
    assert_eq!(found.to_number(), 2.0);
}

#[rstest]
fn extension_functions(library: SimpleNode) {
    let upper = eval_with(&library, Host::new(), "ext:upper(//title)").unwrap();
    assert_eq!(upper.to_xpath_string(), "ALPHA");

    let err = eval_with(&library, Host::new(), "ext:missing()").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownFunction);

    let err = eval_with(&library, Host::new(), "ext:upper(1, 2)").unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownFunction);

    let err = eval_with(&library, Host::new(), "ext:fail()").unwrap_err();
    assert_eq!(err.code, ErrorCode::ExtensionFailed);
    assert!(err.source().is_some());
}

#[rstest]
fn extension_without_resolver(library: SimpleNode) {
    let err = compile_expression::<SimpleNavigator>("ext:upper('a')")
        .unwrap()
        .evaluate_value(&ctx(library.navigator()))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NoContext);
}

#[rstest]
fn extension_node_sets_feed_paths(library: SimpleNode) {
    let Value::NodeSet(nodes) = eval_with(&library, Host::new(), "key('year', '2010')/title").unwrap() else {
        panic!("expected nodes");
    };
    assert_eq!(labels(&nodes), ["title"]);
    let n = eval_with(&library, Host::new(), "count(key('year', 1999) | key('year', 2001))").unwrap();
    assert_eq!(n.to_number(), 2.0);
}

#[rstest]
#[case::preserved(false, 4.0)]
#[case::stripped(true, 2.0)]
fn whitespace_policy_applies_to_count(#[case] strip: bool, #[case] expected: f64) {
    let d = doc()
        .child(elem("list").child(ws("\n  ")).child(elem("a").child(text("1"))).child(ws("\n  ")).child(elem("b")))
        .build();
    let host = if strip { Host::new().stripping() } else { Host::new() };
    assert_eq!(eval_with(&d, host, "count(/list/node())").unwrap().to_number(), expected);
    assert_eq!(
        compile_expression::<SimpleNavigator>("count(/list/node())")
            .unwrap()
            .evaluate_value(&ctx(d.navigator()))
            .unwrap()
            .to_number(),
        4.0
    );
}
