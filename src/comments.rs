//! Developer comments attached to translatable calls.

use regex::Regex;
use std::sync::OnceLock;

use crate::message::add_flag;

/// Leading `[flag, flag] rest of comment`
static COMMENT_FLAGS_REGEX: OnceLock<Regex> = OnceLock::new();

fn comment_flags_regex() -> &'static Regex {
    COMMENT_FLAGS_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^\s*\[\s*([\w-]+(?:\s*,\s*[\w-]+)*)\s*\]\s*(.*)$")
            .expect("COMMENT_FLAGS_REGEX pattern is invalid - this is a bug")
    })
}

/// Which source comments end up in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommentPolicy {
    /// Ignore all comments
    #[default]
    None,
    /// Keep every comment next to a call
    All,
    /// Keep comments starting with the marker, with the marker removed
    Tagged(String),
}

impl CommentPolicy {
    /// Map the `--add-comments` value: absent, present without a tag, or a tag.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None => CommentPolicy::None,
            Some(tag) if tag.trim().is_empty() => CommentPolicy::All,
            Some(tag) => CommentPolicy::Tagged(tag.trim().to_string()),
        }
    }

    /// Return the comment body if the policy keeps it. `body` has the comment
    /// leader (`#`) already removed.
    pub fn accept(&self, body: &str) -> Option<String> {
        let body = body.trim();
        match self {
            CommentPolicy::None => None,
            CommentPolicy::All => Some(body.to_string()),
            CommentPolicy::Tagged(marker) => body
                .strip_prefix(marker.as_str())
                .map(|rest| rest.trim().to_string()),
        }
    }
}

/// Split an optional leading flag list off a comment.
pub fn check_comment_flags(comment: &str) -> (Vec<String>, String) {
    match comment_flags_regex().captures(comment) {
        Some(caps) => {
            let flags = caps[1]
                .split(',')
                .map(|flag| flag.trim().to_string())
                .filter(|flag| !flag.is_empty())
                .collect();
            (flags, caps[2].trim().to_string())
        }
        None => (Vec::new(), comment.to_string()),
    }
}

/// A comment waiting for the next translatable call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectedComment {
    /// Last source line the comment occupies
    pub line: usize,
    pub text: String,
    pub flags: Vec<String>,
}

/// Where an accepted comment should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentTarget {
    /// Same line as the previous message: append to that message
    Previous(CollectedComment),
    /// Held back for the call on the following line
    Pending,
}

/// Tracks comments for one scan. Consecutive comment lines are joined with a
/// space into one logical comment.
#[derive(Debug, Default)]
pub struct CommentCollector {
    policy: CommentPolicy,
    pending: Option<CollectedComment>,
}

impl CommentCollector {
    pub fn new(policy: CommentPolicy) -> Self {
        Self {
            policy,
            pending: None,
        }
    }

    /// Feed a raw comment token (including its leader) found on `line`.
    /// `previous_message_line` is the line of the last message emitted by the
    /// scanner, if any.
    pub fn collect(
        &mut self,
        raw: &str,
        line: usize,
        previous_message_line: Option<usize>,
    ) -> Option<CommentTarget> {
        let body = raw.strip_prefix('#').unwrap_or(raw);
        let text = self.policy.accept(body)?;
        let (flags, text) = check_comment_flags(&text);

        if previous_message_line == Some(line) {
            return Some(CommentTarget::Previous(CollectedComment { line, text, flags }));
        }

        let comment = match self.pending.take() {
            Some(mut pending) if pending.line + 1 == line => {
                if !text.is_empty() {
                    if !pending.text.is_empty() {
                        pending.text.push(' ');
                    }
                    pending.text.push_str(&text);
                }
                for flag in &flags {
                    add_flag(&mut pending.flags, flag);
                }
                pending.line = line;
                pending
            }
            _ => CollectedComment { line, text, flags },
        };
        self.pending = Some(comment);
        Some(CommentTarget::Pending)
    }

    /// The comment that belongs to a call starting on `call_line`: one that
    /// ends on the line directly above it.
    pub fn for_call(&self, call_line: usize) -> Option<&CollectedComment> {
        self.pending
            .as_ref()
            .filter(|pending| pending.line + 1 == call_line)
    }
}
