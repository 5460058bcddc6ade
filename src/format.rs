//! Heuristic format-string detection for message flags.

use regex::Regex;
use std::sync::OnceLock;

use crate::message::add_flag;

/// `%[argnum$][flags][width][.precision][length]<specifier>`, anchored at a `%`.
static C_CONVERSION_REGEX: OnceLock<Regex> = OnceLock::new();

/// `{field[.attr|[index]]...[!conv][:spec]}`
static PYTHON_FORMAT_REGEX: OnceLock<Regex> = OnceLock::new();

fn c_conversion_regex() -> &'static Regex {
    C_CONVERSION_REGEX.get_or_init(|| {
        Regex::new(r"^%(?:\d+\$)?[-+ 0#']*(?:\d+|\*)?(?:\.(?:\d+|\*))?(?:hh|h|ll|l|L|q|j|z|t)?[diuoxXfFeEgGaAcspn%]")
            .expect("C_CONVERSION_REGEX pattern is invalid - this is a bug")
    })
}

fn python_format_regex() -> &'static Regex {
    PYTHON_FORMAT_REGEX.get_or_init(|| {
        Regex::new(r"\{(?:[A-Za-z_][A-Za-z0-9_]*|\d+)?(?:\.[A-Za-z_][A-Za-z0-9_]*|\[[^\]{}]*\])*(?:![rsa])?(?::[^{}]*)?\}")
            .expect("PYTHON_FORMAT_REGEX pattern is invalid - this is a bug")
    })
}

/// Add `c-format` when every `%` escape in `text` is a valid printf conversion
/// and at least one of them is not `%%`.
pub fn check_c_format(text: &str, flags: &mut Vec<String>) {
    if flags.iter().any(|f| f == "c-format" || f == "no-c-format") {
        return;
    }

    let regex = c_conversion_regex();
    let mut conversions = 0;
    let mut rest = text;
    while let Some(pos) = rest.find('%') {
        let candidate = &rest[pos..];
        let Some(m) = regex.find(candidate) else {
            return;
        };
        if m.as_str() != "%%" {
            conversions += 1;
        }
        rest = &candidate[m.end()..];
    }

    if conversions > 0 {
        add_flag(flags, "c-format");
    }
}

/// Add `python-format` when `text` holds at least one `str.format` placeholder.
pub fn check_python_format(text: &str, flags: &mut Vec<String>) {
    if flags
        .iter()
        .any(|f| f == "python-format" || f == "no-python-format")
    {
        return;
    }
    if python_format_regex().is_match(text) {
        add_flag(flags, "python-format");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_flags(text: &str) -> Vec<String> {
        let mut flags = Vec::new();
        check_c_format(text, &mut flags);
        flags
    }

    #[test]
    fn test_regex_initialization() {
        let _ = c_conversion_regex();
        let _ = python_format_regex();
    }

    #[test]
    fn test_basic_c_format() {
        assert_eq!(c_flags("Hello, %s"), vec!["c-format"]);
        assert_eq!(c_flags("%d cows"), vec!["c-format"]);
        assert_eq!(c_flags("%-10.3lf and %1$s"), vec!["c-format"]);
    }

    #[test]
    fn test_accept_no_format_hint() {
        let mut flags = vec!["no-c-format".to_string()];
        check_c_format("Hello, %s", &mut flags);
        assert_eq!(flags, vec!["no-c-format"]);
    }

    #[test]
    fn test_escaped_percent_sign() {
        assert!(c_flags("100%%").is_empty());
        assert!(c_flags("100%").is_empty());
    }

    #[test]
    fn test_strftime_is_not_c_format() {
        assert!(c_flags("%Y-%m-%d").is_empty());
    }

    #[test]
    fn test_python_format() {
        let mut flags = Vec::new();
        check_python_format("Hello {name}, you have {0:d} items", &mut flags);
        assert_eq!(flags, vec!["python-format"]);

        let mut flags = Vec::new();
        check_python_format("{user.name!r}", &mut flags);
        assert_eq!(flags, vec!["python-format"]);

        let mut flags = Vec::new();
        check_python_format("no placeholders { here", &mut flags);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_python_format_override() {
        let mut flags = vec!["no-python-format".to_string()];
        check_python_format("{name}", &mut flags);
        assert_eq!(flags, vec!["no-python-format"]);
    }
}
