//! Pull-based tokenizer for Python source.
//!
//! Produces the same token categories the Python `tokenize` module does
//! (names, numbers, strings, operators, comments, logical and physical
//! newlines, indentation changes) which is all the call scanner needs. It
//! does not build a syntax tree.

use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    String,
    Op,
    Comment,
    /// End of a logical line
    Newline,
    /// Physical line break that does not end a statement
    Nl,
    Indent,
    Dedent,
    /// Character that cannot start any token
    ErrorToken,
    EndMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line the token starts on
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    /// Tokens that carry no meaning for call matching
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Newline | TokenKind::Nl | TokenKind::Indent | TokenKind::Dedent
        )
    }
}

/// Lexical error, positioned at a 1-based line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

impl LexError {
    fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

const THREE_CHAR_OPS: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const TWO_CHAR_OPS: &[&str] = &[
    "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "->", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "@=", ":=",
];
const ONE_CHAR_OPS: &str = "()[]{},:;.+-*/%&|^~<>=@";

pub struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    queue: VecDeque<Token>,
    at_line_start: bool,
    line_has_tokens: bool,
    finished: bool,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            depth: 0,
            indents: vec![0],
            queue: VecDeque::new(),
            at_line_start: true,
            line_has_tokens: false,
            finished: false,
        }
    }

    /// Next token. After the end marker has been produced, keeps returning it.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Ok(token);
            }
            if self.finished {
                return Ok(Token::new(TokenKind::EndMarker, "", self.line));
            }
            self.lex()?;
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn text(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, line: usize) {
        if !matches!(
            kind,
            TokenKind::Comment | TokenKind::Nl | TokenKind::Indent | TokenKind::Dedent
        ) {
            self.line_has_tokens = true;
        }
        self.queue.push_back(Token::new(kind, text, line));
    }

    fn lex(&mut self) -> Result<(), LexError> {
        if self.at_line_start {
            self.at_line_start = false;
            if self.depth == 0 {
                let width = self.measure_indent();
                match self.peek_char() {
                    None | Some('#') | Some('\n') | Some('\r') => {}
                    Some(_) => self.indent_to(width)?,
                }
            }
        }

        while matches!(self.peek_char(), Some(' ' | '\t' | '\x0c')) {
            self.pos += 1;
        }

        let Some(c) = self.peek_char() else {
            return self.finish();
        };
        let line = self.line;
        match c {
            '#' => {
                let start = self.pos;
                while !matches!(self.peek_char(), None | Some('\n' | '\r')) {
                    self.pos += 1;
                }
                let text = self.text(start);
                self.push(TokenKind::Comment, text, line);
            }
            '\\' if matches!(self.peek_char_at(1), Some('\n' | '\r')) => {
                self.pos += 1;
                self.consume_newline();
                self.line += 1;
            }
            '\n' | '\r' => {
                self.consume_newline();
                let kind = if self.depth > 0 || !self.line_has_tokens {
                    TokenKind::Nl
                } else {
                    TokenKind::Newline
                };
                self.push(kind, "\n", line);
                self.line += 1;
                self.at_line_start = true;
                self.line_has_tokens = false;
            }
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                self.lex_number(line);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = self.pos;
                while self
                    .peek_char()
                    .is_some_and(|n| n.is_alphanumeric() || n == '_')
                {
                    self.pos += 1;
                }
                let word = self.text(start);
                if is_string_prefix(&word) && matches!(self.peek_char(), Some('"' | '\'')) {
                    self.lex_string(start, line)?;
                } else {
                    self.push(TokenKind::Name, word, line);
                }
            }
            '"' | '\'' => {
                let start = self.pos;
                self.lex_string(start, line)?;
            }
            _ => self.lex_operator(line),
        }
        Ok(())
    }

    fn consume_newline(&mut self) {
        if self.peek_char() == Some('\r') {
            self.pos += 1;
        }
        if self.peek_char() == Some('\n') {
            self.pos += 1;
        }
    }

    fn measure_indent(&mut self) -> usize {
        let mut width = 0;
        loop {
            match self.peek_char() {
                Some(' ') => width += 1,
                Some('\t') => width = (width / 8 + 1) * 8,
                Some('\x0c') => width = 0,
                _ => return width,
            }
            self.pos += 1;
        }
    }

    fn indent_to(&mut self, width: usize) -> Result<(), LexError> {
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, "", self.line);
            return Ok(());
        }
        while width < self.indents.last().copied().unwrap_or(0) {
            self.indents.pop();
            self.push(TokenKind::Dedent, "", self.line);
        }
        if self.indents.last().copied().unwrap_or(0) != width {
            return Err(LexError::new(
                "unindent does not match any outer indentation level",
                self.line,
            ));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), LexError> {
        if self.depth > 0 {
            return Err(LexError::new("EOF in multi-line statement", self.line));
        }
        if self.line_has_tokens {
            self.push(TokenKind::Newline, "", self.line);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, "", self.line);
        }
        self.push(TokenKind::EndMarker, "", self.line);
        self.finished = true;
        Ok(())
    }

    fn lex_number(&mut self, line: usize) {
        let start = self.pos;
        let hex = self.peek_char() == Some('0')
            && matches!(self.peek_char_at(1), Some('x' | 'X'));
        while let Some(c) = self.peek_char() {
            let previous = self.pos.checked_sub(1).and_then(|p| self.chars.get(p).copied());
            let exponent_sign =
                matches!(c, '+' | '-') && !hex && matches!(previous, Some('e' | 'E'));
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = self.text(start);
        self.push(TokenKind::Number, text, line);
    }

    fn lex_string(&mut self, start: usize, line: usize) -> Result<(), LexError> {
        let quote_pos = self.pos;
        let quote = self.chars[quote_pos];
        let triple = self.peek_char_at(1) == Some(quote) && self.peek_char_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };
        let mut newlines = 0;

        loop {
            match self.peek_char() {
                None if triple => {
                    return Err(LexError::new("EOF in multi-line string", line));
                }
                None => {
                    self.unterminated_string(quote_pos, start, line);
                    return Ok(());
                }
                Some('\n' | '\r') if !triple => {
                    self.unterminated_string(quote_pos, start, line);
                    return Ok(());
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek_char() {
                        Some('\r') => {
                            self.consume_newline();
                            newlines += 1;
                        }
                        Some('\n') => {
                            self.pos += 1;
                            newlines += 1;
                        }
                        Some(_) => self.pos += 1,
                        None => {}
                    }
                }
                Some('\n') => {
                    self.pos += 1;
                    newlines += 1;
                }
                Some(c) if c == quote => {
                    if !triple {
                        self.pos += 1;
                        break;
                    }
                    if self.peek_char_at(1) == Some(quote) && self.peek_char_at(2) == Some(quote)
                    {
                        self.pos += 3;
                        break;
                    }
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }

        let text = self.text(start);
        self.push(TokenKind::String, text, line);
        self.line += newlines;
        Ok(())
    }

    /// Flag the opening quote of a single-quoted string that runs into the
    /// end of its line, and resume right after it.
    fn unterminated_string(&mut self, quote_pos: usize, start: usize, line: usize) {
        self.pos = quote_pos + 1;
        let text = self.text(start);
        self.push(TokenKind::ErrorToken, text, line);
    }

    fn lex_operator(&mut self, line: usize) {
        for (ops, len) in [(THREE_CHAR_OPS, 3), (TWO_CHAR_OPS, 2)] {
            if self.pos + len <= self.chars.len() {
                let candidate: String = self.chars[self.pos..self.pos + len].iter().collect();
                if ops.contains(&candidate.as_str()) {
                    self.pos += len;
                    self.push(TokenKind::Op, candidate, line);
                    return;
                }
            }
        }

        let c = self.chars[self.pos];
        self.pos += 1;
        if !ONE_CHAR_OPS.contains(c) {
            self.push(TokenKind::ErrorToken, c.to_string(), line);
            return;
        }
        match c {
            '(' | '[' | '{' => self.depth += 1,
            ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.push(TokenKind::Op, c.to_string(), line);
    }
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

/// Tokenizer wrapper with a single slot of push-back.
pub struct TokenStream {
    tokenizer: Tokenizer,
    pushed: Option<Token>,
}

impl TokenStream {
    pub fn new(source: &str) -> Self {
        Self {
            tokenizer: Tokenizer::new(source),
            pushed: None,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        match self.pushed.take() {
            Some(token) => Ok(token),
            None => self.tokenizer.next_token(),
        }
    }

    /// Return a token to the stream. Only one token can be pending.
    pub fn push(&mut self, token: Token) {
        debug_assert!(self.pushed.is_none(), "push-back slot already in use");
        self.pushed = Some(token);
    }

    /// The next token that is not a line break or indentation change,
    /// without consuming it. Skipped trivia is dropped.
    pub fn peek_significant(&mut self) -> Result<&Token, LexError> {
        let token = loop {
            let token = self.next_token()?;
            if !token.is_trivia() {
                break token;
            }
        };
        Ok(self.pushed.insert(token))
    }
}

/// A decoded string literal. Byte strings and f-strings have no static
/// text value.
pub fn decode_string(raw: &str) -> Option<String> {
    let prefix_len = raw
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(raw.len());
    let prefix = raw[..prefix_len].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let body = &raw[prefix_len..];
    let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    if body.len() < quote_len * 2 {
        return None;
    }
    let inner = &body[quote_len..body.len() - quote_len];
    if prefix.contains('r') {
        return Some(inner.to_string());
    }
    Some(unescape(inner))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut digits = escape.to_string();
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let width = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                let decoded = (digits.len() == width && digits.chars().all(|d| d.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(escape);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(source);
        let mut out = Vec::new();
        loop {
            let token = tokenizer.next_token().unwrap();
            let end = token.kind == TokenKind::EndMarker;
            out.push(token);
            if end {
                return out;
            }
        }
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokens(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_call() {
        use TokenKind::*;
        assert_eq!(
            kinds("_('hello')\n"),
            vec![Name, Op, String, Op, Newline, EndMarker]
        );
    }

    #[test]
    fn test_newline_inside_parens_is_nl() {
        let toks = tokens("f(\n  'a')\n");
        assert_eq!(toks[2].kind, TokenKind::Nl);
        assert_eq!(toks[3].kind, TokenKind::String);
        assert_eq!(toks[3].line, 2);
    }

    #[test]
    fn test_indent_and_dedent() {
        use TokenKind::*;
        let source = "if x:\n    y\nz\n";
        assert_eq!(
            kinds(source),
            vec![Name, Name, Op, Newline, Indent, Name, Newline, Dedent, Name, Newline, EndMarker]
        );
    }

    #[test]
    fn test_bad_dedent() {
        let mut tokenizer = Tokenizer::new("if x:\n    y\n  z\n");
        let err = loop {
            match tokenizer.next_token() {
                Ok(token) if token.kind == TokenKind::EndMarker => panic!("expected error"),
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_triple_quoted_string_advances_lines() {
        let toks = tokens("x = '''a\nb'''\ny\n");
        let y = toks.iter().find(|t| t.text == "y").unwrap();
        assert_eq!(y.line, 3);
    }

    #[test]
    fn test_unterminated_triple_quote() {
        let mut tokenizer = Tokenizer::new("x = '''abc\n");
        let err = loop {
            match tokenizer.next_token() {
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        assert_eq!(err.message, "EOF in multi-line string");
    }

    #[test]
    fn test_unterminated_single_quote() {
        for source in ["x = 'abc\ny\n", "x = 'abc"] {
            let toks = tokens(source);
            let error = toks
                .iter()
                .position(|t| t.kind == TokenKind::ErrorToken)
                .unwrap();
            assert_eq!(toks[error].text, "'");
            assert_eq!(toks[error + 1].text, "abc");
        }
    }

    #[test]
    fn test_eof_in_statement() {
        let mut tokenizer = Tokenizer::new("_('a',\n");
        let err = loop {
            match tokenizer.next_token() {
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        assert_eq!(err.message, "EOF in multi-line statement");
    }

    #[test]
    fn test_comment_and_operators() {
        let toks = tokens("a **= b  # note\n");
        assert_eq!(toks[1].text, "**=");
        assert_eq!(toks[3].kind, TokenKind::Comment);
        assert_eq!(toks[3].text, "# note");
    }

    #[test]
    fn test_line_continuation() {
        let toks = tokens("x = 1 + \\\n    2\n");
        let two = toks.iter().find(|t| t.text == "2").unwrap();
        assert_eq!(two.line, 2);
        assert!(!toks.iter().any(|t| t.kind == TokenKind::Indent));
    }

    #[test]
    fn test_push_back_and_peek() {
        let mut stream = TokenStream::new("a\n\nb");
        assert_eq!(stream.next_token().unwrap().text, "a");
        assert_eq!(stream.peek_significant().unwrap().text, "b");
        assert_eq!(stream.next_token().unwrap().text, "b");
    }

    #[test]
    fn test_decode_string() {
        assert_eq!(decode_string("'hello'"), Some("hello".into()));
        assert_eq!(decode_string("\"a\\nb\""), Some("a\nb".into()));
        assert_eq!(decode_string("r'a\\nb'"), Some("a\\nb".into()));
        assert_eq!(decode_string("u'caf\\xe9'"), Some("café".into()));
        assert_eq!(decode_string("'''multi\nline'''"), Some("multi\nline".into()));
        assert_eq!(decode_string("'\\u00e9\\101'"), Some("éA".into()));
        assert_eq!(decode_string("f'{x}'"), None);
        assert_eq!(decode_string("b'raw'"), None);
    }
}
