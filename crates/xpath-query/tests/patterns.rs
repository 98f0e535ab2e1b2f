mod common;

use std::sync::Arc;

use common::{Host, all_nodes, label, library, node, select};
use rstest::rstest;
use xpath_query::model::simple::{SimpleNavigator, SimpleNode};
use xpath_query::{
    CompileOptions, ErrorCode, ResolutionContext, XPathNavigator, compile_pattern, compile_pattern_with,
};

/// A pattern matches exactly the nodes its `//` expression form selects.
#[rstest]
#[case("book", "//book")]
#[case("shelf/book", "//shelf/book")]
#[case("/library/book", "/library/book")]
#[case("@id", "//@id")]
#[case("book[1]", "//book[1]")]
#[case("book[last()]", "//book[last()]")]
#[case("book[@year > 2000]/title", "//book[@year > 2000]/title")]
#[case("library//title", "//library//title")]
#[case("text()", "//text()")]
#[case("node()", "//node()")]
#[case("*|@*", "//* | //@*")]
#[case("/", "/")]
#[case("id('b2')/title", "id('b2')/title")]
#[case("*[2]", "//*[2]")]
#[case("title[. = 'Gamma']", "//title[. = 'Gamma']")]
#[case("comment() | processing-instruction('sort')", "//comment() | //processing-instruction('sort')")]
#[case("//book/title", "//book/title")]
#[case("attribute::year", "//@year")]
#[case("book[position() = 2]", "//book[position() = 2]")]
#[case("book[title = 'Alpha']//text()", "//book[title = 'Alpha']//text()")]
fn patterns_match_what_expressions_select(library: SimpleNode, #[case] pattern: &str, #[case] expr: &str) {
    let compiled = compile_pattern::<SimpleNavigator>(pattern).unwrap();
    let selected = select(&library, expr);
    for n in all_nodes(&library) {
        let expected = selected.iter().any(|s| s.is_same_position(&n));
        assert_eq!(
            compiled.matches(&n).unwrap(),
            expected,
            "pattern {pattern} on {} (expression {expr})",
            label(&n)
        );
    }
}

#[rstest]
fn key_pattern_uses_host_function(library: SimpleNode) {
    let pattern = compile_pattern::<SimpleNavigator>("key('year', '1999')/title").unwrap();
    let host: Arc<dyn ResolutionContext<SimpleNavigator>> = Arc::new(Host::new());
    let beta = node(&library, "//title[. = 'Beta']");
    let alpha = node(&library, "//title[. = 'Alpha']");
    assert!(pattern.matches_with(&beta, Some(Arc::clone(&host))).unwrap());
    assert!(!pattern.matches_with(&alpha, Some(host)).unwrap());
    assert_eq!(pattern.matches(&beta).unwrap_err().code, ErrorCode::NoContext);
}

#[rstest]
fn prefixed_pattern_needs_namespace_binding(library: SimpleNode) {
    let pattern = compile_pattern::<SimpleNavigator>("bk:isbn").unwrap();
    let isbn = node(&library, "//*[local-name() = 'isbn']");
    assert_eq!(pattern.matches(&isbn).unwrap_err().code, ErrorCode::UndefinedPrefix);
    let host: Arc<dyn ResolutionContext<SimpleNavigator>> = Arc::new(Host::new().prefix("bk", "urn:books"));
    assert!(pattern.matches_with(&isbn, Some(host)).unwrap());
}

#[rstest]
#[case::parent_axis("a/..")]
#[case::descendant_axis("descendant::a")]
#[case::variable_root("$x/a")]
#[case::number("1")]
#[case::trailing_slash("a/")]
#[case::empty("")]
fn invalid_patterns(#[case] text: &str) {
    let err = compile_pattern::<SimpleNavigator>(text).unwrap_err();
    assert!(
        matches!(err.code, ErrorCode::InvalidPattern | ErrorCode::Syntax),
        "{text}: {err}"
    );
}

#[test]
fn pattern_depth_is_limited() {
    let deep = vec!["a"; 50].join("/");
    let opts = CompileOptions::default().with_max_depth(10);
    let err = compile_pattern_with::<SimpleNavigator>(&deep, &opts).unwrap_err();
    assert_eq!(err.code, ErrorCode::TooComplex);
    assert!(compile_pattern::<SimpleNavigator>(&deep).is_ok());
}

#[rstest]
fn flat_alternatives_do_not_nest(library: SimpleNode) {
    let mut alternatives = vec!["missing"; 299];
    alternatives.push("title");
    let wide = alternatives.join(" | ");
    let opts = CompileOptions::default().with_max_depth(10);
    let pattern = compile_pattern_with::<SimpleNavigator>(&wide, &opts).unwrap();
    assert!(pattern.matches(&node(&library, "//title")).unwrap());
    assert!(!pattern.matches(&node(&library, "//shelf")).unwrap());
}
