//! Expression handling for page templates.
//!
//! Attribute values and text can embed TALES expressions. Only the parts
//! evaluated by the `python` engine can contain translation calls, so these
//! helpers split expressions into engine tagged parts, find `${...}`
//! interpolations and decide whether a candidate is well formed Python.

use regex::Regex;
use std::sync::OnceLock;

use crate::extractors::python::tokenize::{TokenKind, Tokenizer};

use super::Engine;

/// `engine: rest`
static ENGINE_PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();

/// `structure expr` / `text expr`
static STRUCTURE_PREFIX_REGEX: OnceLock<Regex> = OnceLock::new();

/// `[global|local] name expr` or `(a, b) expr`
static DEFINE_REGEX: OnceLock<Regex> = OnceLock::new();

/// A call to the `_` translation function somewhere in the code
static UNDERSCORE_CALL_REGEX: OnceLock<Regex> = OnceLock::new();

fn engine_prefix_regex() -> &'static Regex {
    ENGINE_PREFIX_REGEX.get_or_init(|| {
        Regex::new(r"^\s*([a-z\-_]+):\s*")
            .expect("ENGINE_PREFIX_REGEX pattern is invalid - this is a bug")
    })
}

fn structure_prefix_regex() -> &'static Regex {
    STRUCTURE_PREFIX_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^\s*(?:structure|text)\s+(.*)$")
            .expect("STRUCTURE_PREFIX_REGEX pattern is invalid - this is a bug")
    })
}

fn define_regex() -> &'static Regex {
    DEFINE_REGEX.get_or_init(|| {
        Regex::new(
            r"(?s)^\s*(?:(global|local))?\s*(?:([a-zA-Z_][-a-zA-Z0-9_]*)|\(([a-zA-Z_][-a-zA-Z0-9_,\s]*)\))\s+(.*)\z",
        )
        .expect("DEFINE_REGEX pattern is invalid - this is a bug")
    })
}

fn underscore_call_regex() -> &'static Regex {
    UNDERSCORE_CALL_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\b_\(.*\)")
            .expect("UNDERSCORE_CALL_REGEX pattern is invalid - this is a bug")
    })
}

/// Whether `code` calls `_(...)` and is worth handing to the Python scanner.
pub fn has_translation_call(code: &str) -> bool {
    underscore_call_regex().is_match(code)
}

/// Drop a leading `structure` or `text` keyword from a content expression.
pub fn strip_structure_prefix(value: &str) -> &str {
    match structure_prefix_regex().captures(value) {
        Some(caps) => caps.get(1).map_or(value, |m| m.as_str()),
        None => value,
    }
}

/// Split `a | b | c` into parts, each tagged with the engine that evaluates
/// it. `\|` escapes a literal pipe.
pub fn split_expression(source: &str, default_engine: Engine) -> Vec<(String, String)> {
    split_unescaped(source, '|')
        .into_iter()
        .map(|part| {
            let part = part.trim().replace("\\|", "|");
            match engine_prefix_regex().captures(&part) {
                Some(caps) => {
                    let end = caps.get(0).map_or(0, |m| m.end());
                    (caps[1].to_string(), part[end..].to_string())
                }
                None => (default_engine.as_str().to_string(), part),
            }
        })
        .collect()
}

/// Python code among the parts of an expression.
pub fn python_parts(source: &str, default_engine: Engine) -> Vec<String> {
    split_expression(source, default_engine)
        .into_iter()
        .filter(|(engine, _)| engine == Engine::Python.as_str())
        .map(|(_, code)| code)
        .collect()
}

fn split_unescaped(source: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut previous = None;
    for (idx, ch) in source.char_indices() {
        if ch == separator && previous != Some('\\') {
            parts.push(&source[start..idx]);
            start = idx + ch.len_utf8();
        }
        previous = Some(ch);
    }
    parts.push(&source[start..]);
    parts
}

/// One binding of a `tal:define` or `tal:repeat` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub scope: String,
    pub variables: Vec<String>,
    pub expression: String,
}

/// Parse `tal:define` syntax. Clauses are separated by `;`, with `;;`
/// standing for a literal semicolon. Returns the offending clause on error.
pub fn parse_defines(source: &str) -> Result<Vec<Define>, String> {
    let mut defines = Vec::new();
    for clause in split_define_clauses(source) {
        let clause = clause.replace(";;", ";");
        if clause.trim().is_empty() {
            continue;
        }
        let caps = define_regex().captures(&clause).ok_or_else(|| clause.clone())?;
        let variables = match (caps.get(2), caps.get(3)) {
            (Some(name), _) => vec![name.as_str().to_string()],
            (None, Some(names)) => names
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            (None, None) => return Err(clause.clone()),
        };
        defines.push(Define {
            scope: caps.get(1).map_or("local", |m| m.as_str()).to_string(),
            variables,
            expression: caps.get(4).map_or("", |m| m.as_str()).to_string(),
        });
    }
    Ok(defines)
}

fn split_define_clauses(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut idx = 0;
    while idx < chars.len() {
        if chars[idx] == ';' {
            if chars.get(idx + 1) == Some(&';') {
                current.push_str(";;");
                idx += 2;
                continue;
            }
            clauses.push(std::mem::take(&mut current));
        } else {
            current.push(chars[idx]);
        }
        idx += 1;
    }
    clauses.push(current);
    clauses
}

/// Python code found in `${...}` interpolations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolation {
    pub code: String,
    /// Byte offset of the `$` in the scanned text
    pub offset: usize,
}

/// Find `${...}` interpolations and return their Python parts.
///
/// The closing brace is ambiguous (`${a} and ${b}` vs `${ {'a': 1} }`), so
/// each candidate starts at the last `}` and shrinks to earlier ones until
/// every Python part parses. If none does, the text starting at the
/// interpolation is returned as the error.
pub fn find_interpolations(
    source: &str,
    default_engine: Engine,
) -> Result<Vec<Interpolation>, String> {
    let mut found = Vec::new();
    let mut search_from = 0;

    while let Some(start) = find_unescaped_interpolation(source, search_from) {
        let body_start = start + 2;
        let closers: Vec<usize> = source[body_start..]
            .match_indices('}')
            .map(|(idx, _)| body_start + idx)
            .collect();
        if closers.is_empty() {
            break;
        }

        let mut accepted = None;
        for &close in closers.iter().rev() {
            let parts = python_parts(&source[body_start..close], default_engine);
            if parts.iter().all(|code| is_valid_expression(code)) {
                accepted = Some((close, parts));
                break;
            }
        }
        let Some((close, parts)) = accepted else {
            return Err(source[start..].to_string());
        };
        found.extend(parts.into_iter().map(|code| Interpolation {
            code,
            offset: start,
        }));
        search_from = close + 1;
    }

    Ok(found)
}

fn find_unescaped_interpolation(source: &str, from: usize) -> Option<usize> {
    let mut search_from = from;
    while let Some(idx) = source[search_from..].find("${") {
        let start = search_from + idx;
        if start == 0 || source.as_bytes()[start - 1] != b'\\' {
            return Some(start);
        }
        search_from = start + 2;
    }
    None
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "def", "class", "import", "return", "pass", "del", "global", "nonlocal", "while", "with",
    "try", "except", "finally", "raise", "assert", "break", "continue", "elif", "yield",
];

const EXPRESSION_KEYWORDS: &[&str] = &[
    "if", "else", "for", "in", "not", "and", "or", "is", "lambda", "await", "from", "as", "async",
];

const LEADING_INVALID_OPS: &[&str] = &[
    ")", "]", "}", ",", "/", "//", "%", "=", "==", "!=", "<", ">", "<=", ">=", "|", "&", "^",
    "<<", ">>", ".", ":", ";", "+=", "-=", "*=", "/=", "->", ":=", "@",
];

const TRAILING_INVALID_OPS: &[&str] = &[
    "+", "-", "*", "/", "//", "%", "**", "=", "==", "!=", "<", ">", "<=", ">=", "|", "&", "^",
    "~", "<<", ">>", ".", "(", "[", "{", ":", ";", "@", "->", ":=",
];

/// Conservative check that `code` is a single well formed Python expression.
///
/// This is a token level approximation: it requires a clean tokenization,
/// balanced brackets, no statements, no assignment outside brackets and no
/// two operands next to each other.
pub fn is_valid_expression(code: &str) -> bool {
    let code = code.trim();
    if code.is_empty() {
        return false;
    }

    let mut tokenizer = Tokenizer::new(code);
    let mut brackets: Vec<char> = Vec::new();
    let mut significant = Vec::new();
    loop {
        let token = match tokenizer.next_token() {
            Ok(token) => token,
            Err(_) => return false,
        };
        match token.kind {
            TokenKind::EndMarker => break,
            TokenKind::ErrorToken => return false,
            TokenKind::Comment | TokenKind::Nl | TokenKind::Newline => continue,
            TokenKind::Indent | TokenKind::Dedent => return false,
            _ => {}
        }
        if token.kind == TokenKind::Op {
            match token.text.as_str() {
                "(" => brackets.push(')'),
                "[" => brackets.push(']'),
                "{" => brackets.push('}'),
                ")" | "]" | "}" => {
                    let closer = token.text.chars().next();
                    if brackets.pop() != closer {
                        return false;
                    }
                }
                "=" | ";" if brackets.is_empty() => return false,
                _ => {}
            }
        }
        if token.kind == TokenKind::Name
            && brackets.is_empty()
            && STATEMENT_KEYWORDS.contains(&token.text.as_str())
        {
            return false;
        }
        significant.push(token);
    }

    if !brackets.is_empty() {
        return false;
    }
    let (Some(first), Some(last)) = (significant.first(), significant.last()) else {
        return false;
    };
    if first.kind == TokenKind::Op && LEADING_INVALID_OPS.contains(&first.text.as_str()) {
        return false;
    }
    if last.kind == TokenKind::Op && TRAILING_INVALID_OPS.contains(&last.text.as_str()) {
        return false;
    }
    if last.kind == TokenKind::Name && EXPRESSION_KEYWORDS.contains(&last.text.as_str()) {
        return false;
    }

    let is_operand = |kind: TokenKind, text: &str| match kind {
        TokenKind::Name => {
            !EXPRESSION_KEYWORDS.contains(&text) && !STATEMENT_KEYWORDS.contains(&text)
        }
        TokenKind::Number | TokenKind::String => true,
        _ => false,
    };
    for pair in significant.windows(2) {
        let (left, right) = (&pair[0], &pair[1]);
        let left_operand = is_operand(left.kind, &left.text)
            || (left.kind == TokenKind::Op && matches!(left.text.as_str(), ")" | "]" | "}"));
        let adjacent_strings = left.kind == TokenKind::String && right.kind == TokenKind::String;
        if left_operand && is_operand(right.kind, &right.text) && !adjacent_strings {
            return false;
        }
    }
    true
}

/// Decode the character references and the predefined XML / common HTML
/// entities. Unknown entities are left untouched.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 12).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|number| {
                    let value = match number.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => number.parse().ok(),
                    };
                    value.and_then(char::from_u32)
                }),
            };
            ch.map(|ch| (ch, end))
        });
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_initialization() {
        let _ = engine_prefix_regex();
        let _ = structure_prefix_regex();
        let _ = define_regex();
        let _ = underscore_call_regex();
    }

    #[test]
    fn test_split_expression() {
        let parts = split_expression("python: a | string:b", Engine::Tales);
        assert_eq!(
            parts,
            vec![
                ("python".to_string(), "a".to_string()),
                ("string".to_string(), "b".to_string())
            ]
        );
        let parts = split_expression("a \\| b", Engine::Python);
        assert_eq!(parts, vec![("python".to_string(), "a | b".to_string())]);
    }

    #[test]
    fn test_default_engine_applies_without_prefix() {
        assert_eq!(python_parts("context/title", Engine::Tales), Vec::<String>::new());
        assert_eq!(python_parts("context.title", Engine::Python), vec!["context.title"]);
    }

    #[test]
    fn test_structure_prefix() {
        assert_eq!(strip_structure_prefix("structure view.body"), "view.body");
        assert_eq!(strip_structure_prefix("text _('x')"), "_('x')");
        assert_eq!(strip_structure_prefix("view.body"), "view.body");
    }

    #[test]
    fn test_parse_defines() {
        let defines = parse_defines("global a b; (c, d) e;; f").unwrap();
        assert_eq!(defines.len(), 2);
        assert_eq!(defines[0].scope, "global");
        assert_eq!(defines[0].variables, vec!["a"]);
        assert_eq!(defines[0].expression, "b");
        assert_eq!(defines[1].variables, vec!["c", "d"]);
        assert_eq!(defines[1].expression, "e; f");
        assert!(parse_defines("123 abc").is_err());
    }

    #[test]
    fn test_valid_expressions() {
        assert!(is_valid_expression("_('Hello')"));
        assert!(is_valid_expression("a if b else c"));
        assert!(is_valid_expression("{'a': [1, 2]}"));
        assert!(is_valid_expression("f(x=1)"));
        assert!(is_valid_expression("'a' 'b'"));
        assert!(is_valid_expression("[x for x in items]"));
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(!is_valid_expression(""));
        assert!(!is_valid_expression("a} and ${b"));
        assert!(!is_valid_expression("foo bar"));
        assert!(!is_valid_expression("a +"));
        assert!(!is_valid_expression("x = 1"));
        assert!(!is_valid_expression("_('unterminated)"));
        assert!(!is_valid_expression("(a]"));
        assert!(!is_valid_expression("return a"));
    }

    #[test]
    fn test_find_interpolations_shrinks_candidate() {
        let found = find_interpolations("${_('a')} and ${_('b')}", Engine::Python).unwrap();
        let codes: Vec<_> = found.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["_('a')", "_('b')"]);
        assert_eq!(found[1].offset, 14);
    }

    #[test]
    fn test_find_interpolations_nested_braces() {
        let found = find_interpolations("${ {'a': 1}['a'] }", Engine::Python).unwrap();
        assert_eq!(found[0].code, "{'a': 1}['a']");
    }

    #[test]
    fn test_find_interpolations_escaped_and_incomplete() {
        assert!(find_interpolations("\\${not code}", Engine::Python).unwrap().is_empty());
        assert!(find_interpolations("costs ${", Engine::Python).unwrap().is_empty());
    }

    #[test]
    fn test_find_interpolations_syntax_error() {
        let err = find_interpolations("${a b}", Engine::Python).unwrap_err();
        assert_eq!(err, "${a b}");
    }

    #[test]
    fn test_has_translation_call() {
        assert!(has_translation_call("_('x')"));
        assert!(has_translation_call("view.label(_(u'x'))"));
        assert!(!has_translation_call("context.title"));
        assert!(!has_translation_call("my_('x')"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp;&amp; b"), "a && b");
        assert_eq!(decode_entities("&quot;x&quot; &#65;&#x42;"), "\"x\" AB");
        assert_eq!(decode_entities("&unknown; & x"), "&unknown; & x");
    }
}
