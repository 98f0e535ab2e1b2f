//! Hand-written tokenizer. Operator names (`and`, `or`, `div`, `mod`) come out
//! as plain names; the parser decides by grammar position what they mean.
use crate::runtime::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comma,
    Slash,
    SlashSlash,
    At,
    Dot,
    DotDot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Star,
    Plus,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Pipe,
    Dollar,
    /// NCName or QName, possibly `prefix:*`.
    Name,
    /// Axis name followed by `::`.
    Axis,
    String,
    Number,
    Eof,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    kind: TokenKind,
    start: usize,
    prefix: String,
    name: String,
    string: String,
    number: f64,
    /// A `Name` directly followed (after whitespace) by `(`.
    can_be_function: bool,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner positioned on the first token.
    pub fn new(text: &'a str) -> Result<Self, Error> {
        let mut s = Self {
            text,
            pos: 0,
            kind: TokenKind::Eof,
            start: 0,
            prefix: String::new(),
            name: String::new(),
            string: String::new(),
            number: 0.0,
            can_be_function: false,
        };
        s.next_token()?;
        Ok(s)
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Byte offset where the current token starts.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Source text of the current token.
    pub fn lexeme(&self) -> &'a str {
        &self.text[self.start..self.pos]
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn string_value(&self) -> &str {
        &self.string
    }

    pub fn number_value(&self) -> f64 {
        self.number
    }

    pub fn can_be_function(&self) -> bool {
        self.can_be_function
    }

    /// True when the current token is the unprefixed name `word`.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Name && self.prefix.is_empty() && self.name == word
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_space(&mut self) {
        while let Some(c) = self.peek() {
            if !matches!(c, ' ' | '\t' | '\r' | '\n') {
                break;
            }
            self.pos += 1;
        }
    }

    fn scan_ncname(&mut self) -> String {
        let begin = self.pos;
        while let Some(c) = self.peek() {
            if !is_name_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.text[begin..self.pos].to_string()
    }

    fn scan_number(&mut self) -> Result<(), Error> {
        let begin = self.pos;
        while matches!(self.peek(), Some('0'..='9')) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while matches!(self.peek(), Some('0'..='9')) {
                self.pos += 1;
            }
        }
        let mut lexeme = self.text[begin..self.pos].to_string();
        if lexeme.starts_with('.') {
            lexeme.insert(0, '0');
        }
        if lexeme.ends_with('.') {
            lexeme.push('0');
        }
        self.number = lexeme
            .parse::<f64>()
            .map_err(|_| Error::lexical(format!("malformed number '{lexeme}'"), begin))?;
        self.kind = TokenKind::Number;
        Ok(())
    }

    fn scan_string(&mut self, quote: char) -> Result<(), Error> {
        let begin = self.pos;
        self.pos += 1;
        let body = self.pos;
        loop {
            match self.bump() {
                Some(c) if c == quote => break,
                Some(_) => {}
                None => return Err(Error::lexical("unterminated string literal", begin)),
            }
        }
        self.string = self.text[body..self.pos - 1].to_string();
        self.kind = TokenKind::String;
        Ok(())
    }

    fn scan_name(&mut self) -> Result<(), Error> {
        self.prefix.clear();
        self.name = self.scan_ncname();
        self.kind = TokenKind::Name;
        if self.peek() == Some(':') {
            match self.peek_at(1) {
                Some(':') => {
                    self.pos += 2;
                    self.kind = TokenKind::Axis;
                }
                Some('*') => {
                    self.pos += 2;
                    self.prefix = std::mem::replace(&mut self.name, "*".to_string());
                }
                Some(c) if is_name_start(c) => {
                    self.pos += 1;
                    self.prefix = std::mem::take(&mut self.name);
                    self.name = self.scan_ncname();
                }
                _ => {
                    return Err(Error::lexical(
                        format!("malformed qualified name '{}:'", self.name),
                        self.start,
                    ));
                }
            }
        }
        if self.kind == TokenKind::Name && self.name != "*" {
            let save = self.pos;
            self.skip_space();
            self.can_be_function = self.peek() == Some('(');
            self.pos = save;
        }
        Ok(())
    }

    pub fn next_token(&mut self) -> Result<(), Error> {
        self.skip_space();
        self.start = self.pos;
        self.can_be_function = false;
        let Some(c) = self.peek() else {
            self.kind = TokenKind::Eof;
            return Ok(());
        };
        let single = |k: TokenKind| (k, 1usize);
        let (kind, width) = match c {
            ',' => single(TokenKind::Comma),
            '@' => single(TokenKind::At),
            '(' => single(TokenKind::LParen),
            ')' => single(TokenKind::RParen),
            '[' => single(TokenKind::LBracket),
            ']' => single(TokenKind::RBracket),
            '*' => single(TokenKind::Star),
            '+' => single(TokenKind::Plus),
            '-' => single(TokenKind::Minus),
            '=' => single(TokenKind::Eq),
            '|' => single(TokenKind::Pipe),
            '$' => single(TokenKind::Dollar),
            '/' if self.peek_at(1) == Some('/') => (TokenKind::SlashSlash, 2),
            '/' => single(TokenKind::Slash),
            '!' if self.peek_at(1) == Some('=') => (TokenKind::Ne, 2),
            '<' if self.peek_at(1) == Some('=') => (TokenKind::Le, 2),
            '<' => single(TokenKind::Lt),
            '>' if self.peek_at(1) == Some('=') => (TokenKind::Ge, 2),
            '>' => single(TokenKind::Gt),
            '.' if self.peek_at(1) == Some('.') => (TokenKind::DotDot, 2),
            '.' if matches!(self.peek_at(1), Some('0'..='9')) => return self.scan_number(),
            '.' => single(TokenKind::Dot),
            '0'..='9' => return self.scan_number(),
            '"' | '\'' => return self.scan_string(c),
            c if is_name_start(c) => return self.scan_name(),
            other => {
                return Err(Error::lexical(
                    format!("unexpected character '{other}'"),
                    self.pos,
                ));
            }
        };
        self.pos += width;
        self.kind = kind;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ErrorCode;
    use rstest::rstest;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut s = Scanner::new(text).expect("scan");
        let mut out = Vec::new();
        while s.kind() != TokenKind::Eof {
            out.push(s.kind());
            s.next_token().expect("token");
        }
        out
    }

    #[test]
    fn scans_path_with_predicate() {
        use TokenKind::*;
        assert_eq!(
            kinds("//a[@b != 1.5]"),
            [SlashSlash, Name, LBracket, At, Name, Ne, Number, RBracket]
        );
    }

    #[test]
    fn distinguishes_axis_and_qualified_names() {
        let mut s = Scanner::new("child::p:x").expect("scan");
        assert_eq!(s.kind(), TokenKind::Axis);
        assert_eq!(s.name(), "child");
        s.next_token().expect("token");
        assert_eq!((s.prefix(), s.name()), ("p", "x"));
    }

    #[test]
    fn namespace_wildcard() {
        let s = Scanner::new("p:*").expect("scan");
        assert_eq!((s.kind(), s.prefix(), s.name()), (TokenKind::Name, "p", "*"));
    }

    #[test]
    fn function_lookahead_skips_space() {
        let s = Scanner::new("count  (a)").expect("scan");
        assert!(s.can_be_function());
        assert_eq!(s.start(), 0);
    }

    #[rstest]
    #[case::leading_dot(".5", 0.5)]
    #[case::trailing_dot("3.", 3.0)]
    #[case::plain("42", 42.0)]
    fn scans_numbers(#[case] text: &str, #[case] expected: f64) {
        let s = Scanner::new(text).expect("scan");
        assert_eq!(s.kind(), TokenKind::Number);
        assert_eq!(s.number_value(), expected);
    }

    #[rstest]
    #[case::unterminated("'abc", 0)]
    #[case::bang("a ! b", 2)]
    #[case::stray("a # b", 2)]
    #[case::dangling_colon("p: x", 0)]
    fn reports_lexical_errors(#[case] text: &str, #[case] offset: usize) {
        let mut scanner = Scanner::new(text);
        while let Ok(s) = scanner.as_mut() {
            if s.kind() == TokenKind::Eof {
                break;
            }
            if let Err(e) = s.next_token() {
                scanner = Err(e);
            }
        }
        let err = scanner.err().expect("lexical error");
        assert_eq!(err.code, ErrorCode::Lexical);
        assert_eq!(err.position, Some(offset));
    }
}
