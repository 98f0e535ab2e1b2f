//! Values exchanged with hosts plus the XPath 1.0 number/string conversions.
use crate::model::XPathNavigator;

/// Static result type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    Number,
    String,
    Boolean,
    NodeSet,
    /// Only known at evaluation time (variables, extension functions).
    Any,
}

/// An owned value: variable bindings, extension arguments and results.
#[derive(Debug, Clone)]
pub enum Value<N> {
    /// Nodes in document order without duplicates.
    NodeSet(Vec<N>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<N: XPathNavigator> Value<N> {
    pub fn result_type(&self) -> ResultType {
        match self {
            Value::NodeSet(_) => ResultType::NodeSet,
            Value::String(_) => ResultType::String,
            Value::Number(_) => ResultType::Number,
            Value::Boolean(_) => ResultType::Boolean,
        }
    }

    pub fn to_xpath_string(&self) -> String {
        match self {
            Value::NodeSet(nodes) => nodes.first().map(XPathNavigator::string_value).unwrap_or_default(),
            Value::String(s) => s.clone(),
            Value::Number(n) => number_to_string(*n),
            Value::Boolean(b) => boolean_to_string(*b).to_string(),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => boolean_to_number(*b),
            Value::String(s) => string_to_number(s),
            Value::NodeSet(_) => string_to_number(&self.to_xpath_string()),
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::NodeSet(nodes) => !nodes.is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => number_to_boolean(*n),
            Value::Boolean(b) => *b,
        }
    }
}

impl<N> From<&str> for Value<N> {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<N> From<String> for Value<N> {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<N> From<f64> for Value<N> {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<N> From<bool> for Value<N> {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<N> From<Vec<N>> for Value<N> {
    fn from(nodes: Vec<N>) -> Self {
        Value::NodeSet(nodes)
    }
}

pub(crate) fn boolean_to_string(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

pub(crate) fn boolean_to_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

pub(crate) fn number_to_boolean(n: f64) -> bool {
    !(n == 0.0 || n.is_nan())
}

/// XPath whitespace: space, tab, carriage return and line feed.
pub(crate) fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Formats a number the way `string()` does: integers without a fraction,
/// no exponent notation, `NaN` and signed `Infinity` spelled out.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        // f64 Display is shortest round-trip and never uses an exponent.
        format!("{n}")
    }
}

/// Parses `S? '-'? (Digits ('.' Digits?)? | '.' Digits) S?`; anything else is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(is_xml_whitespace);
    let body = t.strip_prefix('-').unwrap_or(t);
    let mut digits = 0usize;
    let mut dots = 0usize;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return f64::NAN,
        }
    }
    if digits == 0 || dots > 1 {
        return f64::NAN;
    }
    let normalized = if body.ends_with('.') {
        format!("{}0", t)
    } else if body.starts_with('.') {
        if t.starts_with('-') { format!("-0{body}") } else { format!("0{body}") }
    } else {
        t.to_string()
    };
    normalized.parse::<f64>().unwrap_or(f64::NAN)
}

/// `round()`: nearest integer, halves toward positive infinity, negative zero preserved.
pub(crate) fn round_half_up(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    if (-0.5..0.0).contains(&n) || (n == 0.0 && n.is_sign_negative()) {
        return -0.0;
    }
    (n + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::integer(3.0, "3")]
    #[case::negative_zero(-0.0, "0")]
    #[case::fraction(0.5, "0.5")]
    #[case::negative_fraction(-1.25, "-1.25")]
    #[case::large(1e21, "1000000000000000000000")]
    #[case::small(1e-7, "0.0000001")]
    #[case::nan(f64::NAN, "NaN")]
    #[case::pos_inf(f64::INFINITY, "Infinity")]
    #[case::neg_inf(f64::NEG_INFINITY, "-Infinity")]
    fn formats_numbers(#[case] n: f64, #[case] expected: &str) {
        assert_eq!(number_to_string(n), expected);
    }

    #[rstest]
    #[case::plain("12", 12.0)]
    #[case::padded(" \t-3.5\n", -3.5)]
    #[case::leading_dot(".5", 0.5)]
    #[case::trailing_dot("7.", 7.0)]
    #[case::negative_leading_dot("-.25", -0.25)]
    fn parses_numbers(#[case] s: &str, #[case] expected: f64) {
        assert_eq!(string_to_number(s), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::plus("+1")]
    #[case::exponent("1e3")]
    #[case::word("abc")]
    #[case::dot_only(".")]
    #[case::two_dots("1.2.3")]
    #[case::inner_space("1 2")]
    fn rejects_non_numbers(#[case] s: &str) {
        assert!(string_to_number(s).is_nan());
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(1.4), 1.0);
        assert!(round_half_up(-0.3).is_sign_negative());
        assert!(round_half_up(f64::NAN).is_nan());
    }
}
