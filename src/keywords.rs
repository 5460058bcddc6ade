//! Translation function ("keyword") descriptions.
//!
//! A keyword tells the Python scanner which positional arguments of a call
//! carry the domain, message id, plural id and context. Specs use an
//! xgettext-like syntax:
//!
//! ```text
//! gettext              msgid is the first argument
//! ngettext:1,2         msgid and plural id
//! pgettext:1c,2        context, then msgid
//! dngettext:1d,2,3     domain, msgid, plural id
//! tr:1,2t              msgid, and the call must have exactly two arguments
//! N_:1,"menu label"    every message gets the literal comment
//! ```

use std::collections::BTreeMap;

use crate::error::KeywordSpecError;

/// Argument layout for one translation function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub function: String,
    /// 1-based position of the message id
    pub msgid_param: Option<usize>,
    pub msgid_plural_param: Option<usize>,
    pub domain_param: Option<usize>,
    pub msgctxt_param: Option<usize>,
    /// Calls with a different positional argument count are ignored
    pub required_arguments: Option<usize>,
    pub comment: String,
}

impl Keyword {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            msgid_param: Some(1),
            msgid_plural_param: None,
            domain_param: None,
            msgctxt_param: None,
            required_arguments: None,
            comment: String::new(),
        }
    }

    pub fn plural(mut self, msgid: usize, plural: usize) -> Self {
        self.msgid_param = Some(msgid);
        self.msgid_plural_param = Some(plural);
        self
    }

    pub fn msgid(mut self, position: usize) -> Self {
        self.msgid_param = Some(position);
        self
    }

    pub fn domain(mut self, position: usize) -> Self {
        self.domain_param = Some(position);
        self
    }

    pub fn context(mut self, position: usize) -> Self {
        self.msgctxt_param = Some(position);
        self
    }

    /// Parse a keyword spec such as `dngettext:1d,2,3`.
    pub fn parse_spec(spec: &str) -> Result<Self, KeywordSpecError> {
        let (function, params) = match spec.split_once(':') {
            Some((function, params)) => (function.trim(), Some(params)),
            None => (spec.trim(), None),
        };
        if function.is_empty() {
            return Err(KeywordSpecError::EmptyName {
                spec: spec.to_string(),
            });
        }

        let mut keyword = Keyword::new(function);
        let Some(params) = params else {
            return Ok(keyword);
        };

        let mut message_positions = Vec::new();
        for param in split_params(params) {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            if param.len() >= 2 && param.starts_with('"') && param.ends_with('"') {
                keyword.comment = param[1..param.len() - 1].to_string();
                continue;
            }

            let (digits, suffix) = match param.chars().last() {
                Some(c) if c.is_ascii_alphabetic() => (&param[..param.len() - 1], Some(c)),
                _ => (param, None),
            };
            let value: usize = digits
                .trim()
                .parse()
                .map_err(|_| KeywordSpecError::InvalidNumber {
                    spec: spec.to_string(),
                    param: param.to_string(),
                })?;

            match suffix {
                Some('t') => {
                    keyword.required_arguments = Some(value);
                    continue;
                }
                Some('c') | Some('d') | None => {}
                Some(other) => {
                    return Err(KeywordSpecError::UnknownSuffix {
                        spec: spec.to_string(),
                        param: param.to_string(),
                        suffix: other,
                    })
                }
            }

            if value == 0 {
                return Err(KeywordSpecError::ZeroPosition {
                    spec: spec.to_string(),
                });
            }
            match suffix {
                Some('c') => keyword.msgctxt_param = Some(value),
                Some('d') => keyword.domain_param = Some(value),
                _ => message_positions.push(value),
            }
        }

        match message_positions.as_slice() {
            [] => {}
            [msgid] => keyword.msgid_param = Some(*msgid),
            [msgid, plural] => {
                keyword.msgid_param = Some(*msgid);
                keyword.msgid_plural_param = Some(*plural);
            }
            _ => {
                return Err(KeywordSpecError::TooManyMessageArguments {
                    spec: spec.to_string(),
                })
            }
        }

        Ok(keyword)
    }
}

/// Split on commas that are not inside a quoted comment.
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (idx, ch) in params.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            ',' if !in_quote => {
                parts.push(&params[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&params[start..]);
    parts
}

/// The set of active keywords, keyed by function name.
///
/// Built once before scanning starts and shared read-only by all scanners.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordRegistry {
    keywords: BTreeMap<String, Keyword>,
}

impl KeywordRegistry {
    /// Registry without any keywords
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in gettext family
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for keyword in [
            Keyword::new("gettext"),
            Keyword::new("ugettext"),
            Keyword::new("dgettext").msgid(2).domain(1),
            Keyword::new("ldgettext").msgid(2).domain(1),
            Keyword::new("ngettext").plural(1, 2),
            Keyword::new("lngettext").plural(1, 2),
            Keyword::new("ungettext").plural(1, 2),
            Keyword::new("dngettext").plural(2, 3).domain(1),
            Keyword::new("ldngettext").plural(2, 3).domain(1),
            Keyword::new("pgettext").msgid(2).context(1),
            Keyword::new("npgettext").plural(2, 3).context(1),
        ] {
            registry.insert(keyword);
        }
        registry
    }

    pub fn insert(&mut self, keyword: Keyword) {
        self.keywords.insert(keyword.function.clone(), keyword);
    }

    pub fn clear(&mut self) {
        self.keywords.clear();
    }

    /// Apply user supplied specs in order. An empty spec clears everything
    /// registered so far, so `["", "tr"]` replaces the defaults instead of
    /// extending them.
    pub fn register<S: AsRef<str>>(&mut self, specs: &[S]) -> Result<(), KeywordSpecError> {
        for spec in specs {
            let spec = spec.as_ref();
            if spec.trim().is_empty() {
                self.clear();
                continue;
            }
            self.insert(Keyword::parse_spec(spec)?);
        }
        Ok(())
    }

    pub fn get(&self, function: &str) -> Option<&Keyword> {
        self.keywords.get(function)
    }

    pub fn contains(&self, function: &str) -> bool {
        self.keywords.contains_key(function)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
