mod common;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use common::{ctx, label, labels, library};
use rstest::rstest;
use xpath_query::model::simple::{SimpleNavigator, SimpleNode};
use xpath_query::{ErrorCode, Evaluation, ExpressionCache, Value, XPathNavigator, compile_expression, evaluate_expr};

#[rstest]
fn sequences_pull_lazily_and_rewind(library: SimpleNode) {
    let expr = compile_expression("//title").unwrap();
    let mut seq = expr.select(&ctx(library.navigator())).unwrap();
    assert_eq!(seq.current_position(), 0);
    assert_eq!(seq.next().unwrap().unwrap().string_value(), "Alpha");
    assert_eq!(seq.current_position(), 1);
    assert_eq!(seq.size().unwrap(), 3);
    assert_eq!(seq.next().unwrap().unwrap().string_value(), "Beta");

    let mut copy = seq.clone();
    assert_eq!(seq.next().unwrap().unwrap().string_value(), "Gamma");
    assert!(seq.next().is_none());
    assert_eq!(copy.next().unwrap().unwrap().string_value(), "Gamma");

    seq.reset();
    assert_eq!(seq.current_position(), 0);
    assert_eq!(seq.next().unwrap().unwrap().string_value(), "Alpha");
    assert!(copy.next().is_none());
}

#[rstest]
#[case("//title")]
#[case("//*/*")]
#[case("//book//text()")]
#[case("(//book)[2]/following::node()")]
#[case("//book[@year > 2000] | //shelf")]
fn reset_replays_the_same_nodes(library: SimpleNode, #[case] expr: &str) {
    let compiled = compile_expression(expr).unwrap();
    let mut seq = compiled.select(&ctx(library.navigator())).unwrap();
    let first: Vec<String> = seq.by_ref().map(|n| label(&n.unwrap())).collect();
    seq.reset();
    let second: Vec<String> = seq.map(|n| label(&n.unwrap())).collect();
    assert!(!first.is_empty());
    assert_eq!(first, second, "{expr}");
}

#[rstest]
fn one_expression_many_evaluations(library: SimpleNode) {
    let expr = compile_expression("title").unwrap();
    let books = compile_expression("//book").unwrap();
    let mut seen = Vec::new();
    for book in books.select(&ctx(library.navigator())).unwrap() {
        let book = book.unwrap();
        seen.push(expr.evaluate_first(&ctx(book)).unwrap().map(|t| t.string_value()));
    }
    assert_eq!(seen, [Some("Alpha".to_string()), Some("Beta".to_string()), Some("Gamma".to_string())]);
}

#[rstest]
fn evaluation_kinds(library: SimpleNode) {
    let run = |e: &str| compile_expression(e).unwrap().evaluate(&ctx(library.navigator())).unwrap();
    assert!(matches!(run("count(//book)"), Evaluation::Number(n) if n == 3.0));
    assert!(matches!(run("string(//title)"), Evaluation::String(s) if s == "Alpha"));
    assert!(matches!(run("//book = 1"), Evaluation::Boolean(false)));
    assert!(matches!(run("//book"), Evaluation::NodeSet(_)));

    let err = compile_expression::<SimpleNavigator>("1 + 1")
        .unwrap()
        .select(&ctx(library.navigator()))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidOperation);
}

#[rstest]
fn one_shot_evaluation(library: SimpleNode) {
    let value = evaluate_expr("//book[2]/title", &ctx(library.navigator())).unwrap();
    let Value::NodeSet(nodes) = value else { panic!("expected nodes") };
    assert_eq!(labels(&nodes), ["title"]);
    assert!(evaluate_expr::<SimpleNavigator>("1 +", &ctx(library.navigator())).is_err());
}

#[rstest]
fn first_node_without_draining(library: SimpleNode) {
    let expr = compile_expression("//book/following::node()").unwrap();
    let first = expr.evaluate_first(&ctx(library.navigator())).unwrap().unwrap();
    assert_eq!(label(&first), "book#b2");
    let none = compile_expression("//nothing").unwrap().evaluate_first(&ctx(library.navigator())).unwrap();
    assert!(none.is_none());
}

#[rstest]
fn expressions_are_shared_across_threads(library: SimpleNode) {
    let expr = compile_expression::<SimpleNavigator>("count(//book[@year > $min])").unwrap();
    let results: Vec<f64> = thread::scope(|s| {
        let handles: Vec<_> = [1990.0, 2000.0, 2005.0]
            .into_iter()
            .map(|min| {
                let expr = &expr;
                let library = &library;
                s.spawn(move || {
                    let host = common::Host::new().var("min", min);
                    expr.evaluate_value(&common::ctx_with(library.navigator(), host))
                        .unwrap()
                        .to_number()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results, [3.0, 2.0, 1.0]);
}

#[rstest]
fn cache_serves_threads(library: SimpleNode) {
    let cache: Arc<ExpressionCache<SimpleNavigator>> = Arc::new(ExpressionCache::new(NonZeroUsize::new(4).unwrap()));
    thread::scope(|s| {
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let library = &library;
            s.spawn(move || {
                let expr = cache.get_or_compile("count(//title)").unwrap();
                assert_eq!(expr.evaluate_value(&ctx(library.navigator())).unwrap().to_number(), 3.0);
            });
        }
    });
    assert_eq!(cache.len(), 1);
}
