use super::CallCtx;
use crate::model::XPathNavigator;
use crate::query::Eval;
use crate::runtime::Error;
use crate::value::{is_xml_whitespace, round_half_up};

pub(super) fn string_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    ctx.string_or_context(0).map(Eval::String)
}

pub(super) fn concat_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let mut out = String::new();
    for i in 0..ctx.args.len() {
        out.push_str(&ctx.string(i)?);
    }
    Ok(Eval::String(out))
}

pub(super) fn starts_with_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string(0)?;
    let prefix = ctx.string(1)?;
    Ok(Eval::Boolean(s.starts_with(&prefix)))
}

pub(super) fn contains_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string(0)?;
    let needle = ctx.string(1)?;
    Ok(Eval::Boolean(s.contains(&needle)))
}

pub(super) fn substring_before_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string(0)?;
    let sep = ctx.string(1)?;
    let out = s.find(&sep).map(|i| &s[..i]).unwrap_or_default();
    Ok(Eval::String(out.to_string()))
}

pub(super) fn substring_after_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string(0)?;
    let sep = ctx.string(1)?;
    let out = s.find(&sep).map(|i| &s[i + sep.len()..]).unwrap_or_default();
    Ok(Eval::String(out.to_string()))
}

pub(super) fn substring_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string(0)?;
    let start = ctx.number(1)?;
    let length = if ctx.has_arg(2) { Some(ctx.number(2)?) } else { None };
    Ok(Eval::String(substring(&s, start, length)))
}

/// Characters whose 1-based position `p` satisfies
/// `round(start) <= p < round(start) + round(length)`.
pub(crate) fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = round_half_up(start);
    let end = length.map_or(f64::INFINITY, |len| first + round_half_up(len));
    if first.is_nan() || end.is_nan() {
        return String::new();
    }
    s.chars()
        .enumerate()
        .filter(|&(i, _)| {
            #[allow(clippy::cast_precision_loss)]
            let p = (i + 1) as f64;
            p >= first && p < end
        })
        .map(|(_, c)| c)
        .collect()
}

pub(super) fn string_length_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string_or_context(0)?;
    #[allow(clippy::cast_precision_loss)]
    Ok(Eval::Number(s.chars().count() as f64))
}

pub(super) fn normalize_space_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string_or_context(0)?;
    Ok(Eval::String(normalize_space(&s)))
}

pub(crate) fn normalize_space(s: &str) -> String {
    s.split(is_xml_whitespace)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(super) fn translate_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let s = ctx.string(0)?;
    let from = ctx.string(1)?;
    let to = ctx.string(2)?;
    Ok(Eval::String(translate(&s, &from, &to)))
}

/// Maps each character found in `from` to the character at the same index in
/// `to`, deleting it when `to` is shorter. Only the first occurrence in
/// `from` counts.
pub(crate) fn translate(s: &str, from: &str, to: &str) -> String {
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.chars().position(|f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("12345", 2.0, Some(3.0), "234")]
    #[case("12345", 1.5, Some(2.6), "234")]
    #[case("12345", 0.0, Some(3.0), "12")]
    #[case("12345", -2.0, Some(5.0), "12")]
    #[case("12345", f64::NAN, Some(3.0), "")]
    #[case("12345", 1.0, Some(f64::NAN), "")]
    #[case("12345", -42.0, Some(f64::INFINITY), "12345")]
    #[case("12345", f64::NEG_INFINITY, Some(f64::INFINITY), "")]
    #[case("12345", 2.0, None, "2345")]
    #[case("äöü", 2.0, Some(1.0), "ö")]
    fn substring_clamps(#[case] s: &str, #[case] start: f64, #[case] len: Option<f64>, #[case] expected: &str) {
        assert_eq!(substring(s, start, len), expected);
    }

    #[rstest]
    #[case("bar", "abc", "ABC", "BAr")]
    #[case("bar", "abc", "AB", "BAr")]
    #[case("--aaa--", "abc-", "ABC", "AAA")]
    #[case("aba", "aa", "xy", "xbx")]
    fn translates(#[case] s: &str, #[case] from: &str, #[case] to: &str, #[case] expected: &str) {
        assert_eq!(translate(s, from, to), expected);
    }

    #[test]
    fn normalizes_space() {
        assert_eq!(normalize_space("  a \t b\n\nc  "), "a b c");
        assert_eq!(normalize_space(" \r\n"), "");
    }
}
