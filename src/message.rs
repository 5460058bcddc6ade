use std::fmt;

/// Source position of a translatable construct (1-based line)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One translatable occurrence found by a scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Text domain the call or element belongs to, if known
    pub domain: Option<String>,
    /// Disambiguation context (msgctxt)
    pub context: Option<String>,
    /// Canonical singular source text
    pub id: String,
    /// Plural source text for plural-form calls
    pub plural_id: Option<String>,
    /// Format hints such as `c-format` or `no-python-format`
    pub flags: Vec<String>,
    /// Developer annotation, newline separated
    pub comment: String,
    pub translator_comment: String,
    pub location: Location,
}

impl Message {
    pub fn new(id: impl Into<String>, location: Location) -> Self {
        Self {
            domain: None,
            context: None,
            id: id.into(),
            plural_id: None,
            flags: Vec::new(),
            comment: String::new(),
            translator_comment: String::new(),
            location,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Whether this message survives a domain restriction.
    /// Messages without a domain always pass.
    pub fn matches_domain(&self, target: Option<&str>) -> bool {
        match (target, self.domain.as_deref()) {
            (Some(target), Some(domain)) if !domain.is_empty() => target == domain,
            _ => true,
        }
    }
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join the non-empty parts with newlines.
pub fn join_comments<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .filter(|part| !part.as_ref().is_empty())
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append `flag` unless it is already present, keeping first-seen order.
pub fn add_flag(flags: &mut Vec<String>, flag: &str) {
    if !flags.iter().any(|f| f == flag) {
        flags.push(flag.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Dummy\n\n\n   text  "), "Dummy text");
        assert_eq!(normalize_whitespace("\t\n"), "");
    }

    #[test]
    fn test_domain_filter() {
        let msg = Message::new("word", Location::new("a.py", 1)).with_domain(Some("other".into()));
        assert!(msg.matches_domain(None));
        assert!(msg.matches_domain(Some("other")));
        assert!(!msg.matches_domain(Some("mydomain")));

        let no_domain = Message::new("word", Location::new("a.py", 1));
        assert!(no_domain.matches_domain(Some("mydomain")));
    }

    #[test]
    fn test_join_comments_skips_empty_parts() {
        assert_eq!(join_comments(["Default: x", "", "note"]), "Default: x\nnote");
        assert_eq!(join_comments(Vec::<String>::new()), "");
    }

    #[test]
    fn test_add_flag_keeps_order() {
        let mut flags = vec!["python-format".to_string()];
        add_flag(&mut flags, "c-format");
        add_flag(&mut flags, "python-format");
        assert_eq!(flags, vec!["python-format", "c-format"]);
    }
}
