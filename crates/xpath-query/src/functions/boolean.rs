use super::CallCtx;
use crate::model::{NodeKind, XPathNavigator};
use crate::query::Eval;
use crate::runtime::{Error, XML_NAMESPACE};

pub(super) fn boolean_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    ctx.boolean(0).map(Eval::Boolean)
}

pub(super) fn not_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    ctx.boolean(0).map(|b| Eval::Boolean(!b))
}

/// `lang(s)`: compares `s` with the nearest `xml:lang` in scope, ignoring case
/// and accepting a sublanguage suffix.
pub(super) fn lang_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let wanted = ctx.string(0)?;
    let found = xml_lang(&ctx.focus.node);
    Ok(Eval::Boolean(found.is_some_and(|lang| lang_matches(&lang, &wanted))))
}

fn xml_lang<N: XPathNavigator>(node: &N) -> Option<String> {
    let mut cur = node.clone();
    loop {
        if cur.node_kind() == NodeKind::Element {
            let mut attr = cur.clone();
            if attr.move_to_first_attribute() {
                loop {
                    if attr.local_name() == "lang" && attr.namespace_uri() == XML_NAMESPACE {
                        return Some(attr.string_value());
                    }
                    if !attr.move_to_next_attribute() {
                        break;
                    }
                }
            }
        }
        if !cur.move_to_parent() {
            return None;
        }
    }
}

pub(crate) fn lang_matches(lang: &str, wanted: &str) -> bool {
    match lang.get(..wanted.len()) {
        Some(head) if head.eq_ignore_ascii_case(wanted) => {
            lang.len() == wanted.len() || lang.as_bytes()[wanted.len()] == b'-'
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("en", "en", true)]
    #[case("EN-us", "en", true)]
    #[case("en-US", "en-us", true)]
    #[case("english", "en", false)]
    #[case("de", "en", false)]
    #[case("en", "en-us", false)]
    fn matches_languages(#[case] lang: &str, #[case] wanted: &str, #[case] expected: bool) {
        assert_eq!(lang_matches(lang, wanted), expected);
    }
}
