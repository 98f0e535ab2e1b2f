mod common;

use common::{all_nodes, label, labels, library, node, number, select, select_from};
use rstest::rstest;
use xpath_query::model::simple::{SimpleNavigator, SimpleNode};
use xpath_query::{NodeKind, XPathNavigator};

#[rstest]
#[case::ancestor("ancestor::node()", &["/", "library"])]
#[case::ancestor_or_self("ancestor-or-self::*", &["library", "book#b2"])]
#[case::parent("parent::*", &["library"])]
#[case::self_step("self::book", &["book#b2"])]
#[case::self_mismatch("self::title", &[])]
#[case::child("child::node()", &["title"])]
#[case::attributes("attribute::*", &["@id", "@year", "@xml:lang"])]
#[case::following_sibling("following-sibling::node()", &["pi(sort)", "shelf"])]
#[case::preceding_sibling("preceding-sibling::node()", &["comment()", "book#b1"])]
#[case::following("following::*", &["shelf", "book#b3", "title"])]
#[case::preceding("preceding::*", &["book#b1", "title", "bk:isbn"])]
#[case::namespace("namespace::*", &["ns:bk"])]
#[case::descendant("descendant::text()", &["'Beta'"])]
#[case::descendant_or_self("descendant-or-self::*", &["book#b2", "title"])]
fn axes_from_second_book(library: SimpleNode, #[case] expr: &str, #[case] expected: &[&str]) {
    let b2 = node(&library, "//book[@id = 'b2']");
    assert_eq!(labels(&select_from(b2, expr)), expected, "{expr}");
}

#[rstest]
#[case::nearest_preceding_sibling("preceding-sibling::node()[1]", &["book#b1"])]
#[case::farthest_preceding_sibling("preceding-sibling::node()[last()]", &["comment()"])]
#[case::nearest_ancestor("ancestor::*[1]", &["library"])]
#[case::self_first("ancestor-or-self::*[1]", &["book#b2"])]
#[case::outermost("ancestor-or-self::*[last()]", &["library"])]
#[case::nearest_preceding("preceding::*[1]", &["bk:isbn"])]
#[case::next_following("following::*[2]", &["book#b3"])]
fn reverse_axes_count_backwards(library: SimpleNode, #[case] expr: &str, #[case] expected: &[&str]) {
    let b2 = node(&library, "//book[@id = 'b2']");
    assert_eq!(labels(&select_from(b2, expr)), expected, "{expr}");
}

#[rstest]
fn attributes_and_namespaces_have_no_siblings(library: SimpleNode) {
    let year = node(&library, "//book[@id = 'b1']/@year");
    assert!(select_from(year.clone(), "following-sibling::node()").is_empty());
    assert!(select_from(year.clone(), "preceding-sibling::node()").is_empty());
    assert_eq!(labels(&select_from(year, "..")), ["book#b1"]);

    let namespace = node(&library, "/library/namespace::*");
    assert_eq!(labels(&select_from(namespace.clone(), "parent::node()")), ["library"]);
    assert!(select_from(namespace, "child::node()").is_empty());
}

#[rstest]
fn following_from_attribute_enters_owner(library: SimpleNode) {
    // From an attribute, following:: starts with the owner's children.
    let id = node(&library, "//book[@id = 'b1']/@id");
    assert_eq!(
        labels(&select_from(id, "following::*")),
        ["title", "bk:isbn", "book#b2", "title", "shelf", "book#b3", "title"]
    );
}

#[rstest]
fn every_node_reachable_once(library: SimpleNode) {
    assert_eq!(number(&library, "count(//node())"), 15.0);
    assert_eq!(number(&library, "count(//namespace::*)"), 9.0);
    assert_eq!(number(&library, "count(//*)"), 9.0);
    assert_eq!(number(&library, "count(//@*)"), 8.0);
}

#[rstest]
fn root_path_from_anywhere(library: SimpleNode) {
    let gamma = node(&library, "//title[. = 'Gamma']");
    assert_eq!(labels(&select_from(gamma.clone(), "/")), ["/"]);
    assert_eq!(labels(&select_from(gamma, "/library/book")), ["book#b1", "book#b2"]);
}

fn doc_index(order: &[SimpleNavigator], n: &SimpleNavigator) -> usize {
    order
        .iter()
        .position(|m| m.is_same_position(n))
        .unwrap_or_else(|| panic!("{} is not in the tree walk", label(n)))
}

#[rstest]
#[case("//*")]
#[case("//@* | //text()")]
#[case("//title/ancestor::*")]
#[case("//book/preceding::node()")]
#[case("//title/..")]
#[case("//book/following-sibling::node()")]
#[case("//*/*")]
#[case("//*//*")]
#[case("//*//node()")]
#[case("//shelf/../*")]
#[case("//text()/ancestor-or-self::node()")]
#[case("//book/@* | //title")]
#[case("(//title | //book)[position() > 1]")]
#[case("//title/preceding-sibling::node() | //title/following-sibling::node()")]
#[case("//book/descendant::node()/following::node()")]
fn results_are_in_document_order_without_duplicates(library: SimpleNode, #[case] expr: &str) {
    let order = all_nodes(&library);
    let indexes: Vec<usize> = select(&library, expr).iter().map(|n| doc_index(&order, n)).collect();
    assert!(!indexes.is_empty(), "{expr} selected nothing");
    assert!(indexes.windows(2).all(|w| w[0] < w[1]), "{expr} produced {indexes:?}");
}

#[rstest]
fn nested_child_steps_match_brute_force(library: SimpleNode) {
    // `//*/*` is every element that has an element parent.
    let expected: Vec<String> = select(&library, "//*")
        .iter()
        .filter(|n| {
            let mut p = (*n).clone();
            p.move_to_parent() && p.node_kind() == NodeKind::Element
        })
        .map(label)
        .collect();
    assert_eq!(labels(&select(&library, "//*/*")), expected);
    assert_eq!(
        expected,
        ["book#b1", "title", "bk:isbn", "book#b2", "title", "shelf", "book#b3", "title"]
    );
}
