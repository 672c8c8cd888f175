//! Criteria matching for COUNTIF, SUMIF and AVERAGEIF
//!
//! A criterion can be:
//! - A number: exact numeric match (e.g., 5)
//! - Text: case-insensitive match, `*` and `?` wildcards, `~` escapes
//! - A comparison: ">5", ">=10", "<100", "<=50", "<>0", "=5", ">m", "<>apple"
//! - Empty text: matches blank cells; "<>" matches anything non-blank

use crate::evaluator::FormulaValue;
use regex::{Regex, RegexBuilder};

/// Criteria matcher for the conditional aggregates
#[derive(Debug)]
pub struct CriteriaMatcher {
    kind: CriteriaKind,
}

#[derive(Debug)]
enum CriteriaKind {
    /// Comparison against a number
    Number(ComparisonOp, f64),
    /// Comparison against text
    Text(ComparisonOp, TextPattern),
    /// Comparison against a boolean
    Boolean(ComparisonOp, bool),
    /// Blank cells
    Blank,
    /// Anything but blank
    NotBlank,
    /// Criteria that can never match (error values, arrays)
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn test(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            ComparisonOp::Equal => ordering == Equal,
            ComparisonOp::NotEqual => ordering != Equal,
            ComparisonOp::LessThan => ordering == Less,
            ComparisonOp::LessEqual => ordering != Greater,
            ComparisonOp::GreaterThan => ordering == Greater,
            ComparisonOp::GreaterEqual => ordering != Less,
        }
    }
}

#[derive(Debug)]
enum TextPattern {
    /// Lower-cased literal
    Exact(String),
    /// Case-insensitive anchored regex built from a wildcard pattern
    Wildcard(Regex),
}

impl TextPattern {
    fn new(pattern: &str) -> Self {
        if has_wildcards(pattern) {
            if let Some(regex) = wildcard_regex(pattern) {
                return TextPattern::Wildcard(regex);
            }
        }
        TextPattern::Exact(unescape(pattern).to_lowercase())
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            TextPattern::Exact(expected) => text.to_lowercase() == *expected,
            TextPattern::Wildcard(regex) => regex.is_match(text),
        }
    }
}

impl CriteriaMatcher {
    /// Create a matcher from a criteria argument
    pub fn new(criteria: &FormulaValue) -> Self {
        let kind = match criteria {
            FormulaValue::Number(n) => CriteriaKind::Number(ComparisonOp::Equal, *n),
            FormulaValue::Boolean(b) => CriteriaKind::Boolean(ComparisonOp::Equal, *b),
            FormulaValue::String(s) => Self::parse_text_criteria(s),
            FormulaValue::Empty => CriteriaKind::Blank,
            FormulaValue::Array(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => return Self::new(&row[0]),
                _ => CriteriaKind::Never,
            },
            FormulaValue::Error(_) => CriteriaKind::Never,
        };

        Self { kind }
    }

    fn parse_text_criteria(s: &str) -> CriteriaKind {
        let (op, operand) = split_operator(s);

        if operand.is_empty() {
            return match op {
                ComparisonOp::Equal => CriteriaKind::Blank,
                ComparisonOp::NotEqual => CriteriaKind::NotBlank,
                _ => CriteriaKind::Never,
            };
        }

        if let Ok(n) = operand.trim().parse::<f64>() {
            return CriteriaKind::Number(op, n);
        }
        if operand.eq_ignore_ascii_case("TRUE") {
            return CriteriaKind::Boolean(op, true);
        }
        if operand.eq_ignore_ascii_case("FALSE") {
            return CriteriaKind::Boolean(op, false);
        }

        match op {
            ComparisonOp::Equal | ComparisonOp::NotEqual => {
                CriteriaKind::Text(op, TextPattern::new(operand))
            }
            // Ordered text comparisons ignore wildcards
            _ => CriteriaKind::Text(op, TextPattern::Exact(operand.to_lowercase())),
        }
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match &self.kind {
            CriteriaKind::Number(op, target) => match value {
                FormulaValue::Number(n) => op.test(approx_cmp(*n, *target)),
                FormulaValue::String(s) if *op == ComparisonOp::Equal => s
                    .trim()
                    .parse::<f64>()
                    .map_or(false, |n| approx_cmp(n, *target).is_eq()),
                // Non-numeric cells only satisfy "<>"
                FormulaValue::Error(_) => false,
                _ => *op == ComparisonOp::NotEqual,
            },

            CriteriaKind::Boolean(op, target) => match value {
                FormulaValue::Boolean(b) => op.test(b.cmp(target)),
                FormulaValue::Error(_) => false,
                _ => *op == ComparisonOp::NotEqual,
            },

            CriteriaKind::Text(op, pattern) => match value {
                FormulaValue::String(s) => match (op, pattern) {
                    (ComparisonOp::Equal, p) => p.is_match(s),
                    (ComparisonOp::NotEqual, p) => !p.is_match(s),
                    (op, TextPattern::Exact(expected)) => {
                        op.test(s.to_lowercase().as_str().cmp(expected.as_str()))
                    }
                    (_, TextPattern::Wildcard(_)) => false,
                },
                FormulaValue::Error(_) => false,
                _ => *op == ComparisonOp::NotEqual,
            },

            CriteriaKind::Blank => match value {
                FormulaValue::Empty => true,
                FormulaValue::String(s) => s.is_empty(),
                _ => false,
            },

            CriteriaKind::NotBlank => !value.is_empty(),

            CriteriaKind::Never => false,
        }
    }
}

fn split_operator(s: &str) -> (ComparisonOp, &str) {
    const OPERATORS: [(&str, ComparisonOp); 6] = [
        (">=", ComparisonOp::GreaterEqual),
        ("<=", ComparisonOp::LessEqual),
        ("<>", ComparisonOp::NotEqual),
        (">", ComparisonOp::GreaterThan),
        ("<", ComparisonOp::LessThan),
        ("=", ComparisonOp::Equal),
    ];

    for (prefix, op) in OPERATORS {
        if let Some(rest) = s.strip_prefix(prefix) {
            return (op, rest);
        }
    }
    (ComparisonOp::Equal, s)
}

fn approx_cmp(a: f64, b: f64) -> std::cmp::Ordering {
    if (a - b).abs() < 1e-10 {
        std::cmp::Ordering::Equal
    } else {
        a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Whether a pattern holds an unescaped `*` or `?`
pub(crate) fn has_wildcards(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '~' => {
                chars.next();
            }
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

/// Translate a wildcard pattern into a case-insensitive regex matching the whole text
pub(crate) fn wildcard_regex(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(&format!("^{}$", wildcard_to_regex(pattern)))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Unanchored regex source for a wildcard pattern
pub(crate) fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("(?s:.*)"),
            '?' => out.push_str("(?s:.)"),
            '~' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(&regex::escape("~")),
            },
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out
}

fn unescape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            out.push(chars.next().unwrap_or('~'));
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FormulaValue {
        FormulaValue::String(s.into())
    }

    #[test]
    fn test_number_criteria() {
        let matcher = CriteriaMatcher::new(&FormulaValue::Number(5.0));
        assert!(matcher.matches(&FormulaValue::Number(5.0)));
        assert!(!matcher.matches(&FormulaValue::Number(4.0)));
        assert!(matcher.matches(&text("5")));
        assert!(!matcher.matches(&FormulaValue::Empty));
    }

    #[test]
    fn test_comparison_criteria() {
        let gt = CriteriaMatcher::new(&text(">5"));
        assert!(gt.matches(&FormulaValue::Number(6.0)));
        assert!(!gt.matches(&FormulaValue::Number(5.0)));
        assert!(!gt.matches(&text("apple")));

        let ge = CriteriaMatcher::new(&text(">=5"));
        assert!(ge.matches(&FormulaValue::Number(5.0)));

        let lt = CriteriaMatcher::new(&text("<0"));
        assert!(lt.matches(&FormulaValue::Number(-1.0)));

        let ne = CriteriaMatcher::new(&text("<>0"));
        assert!(ne.matches(&FormulaValue::Number(3.0)));
        assert!(!ne.matches(&FormulaValue::Number(0.0)));
        assert!(ne.matches(&text("x")));

        let eq = CriteriaMatcher::new(&text("=10"));
        assert!(eq.matches(&FormulaValue::Number(10.0)));
    }

    #[test]
    fn test_text_criteria_case_insensitive() {
        let matcher = CriteriaMatcher::new(&text("Apple"));
        assert!(matcher.matches(&text("apple")));
        assert!(matcher.matches(&text("APPLE")));
        assert!(!matcher.matches(&text("apples")));
        assert!(!matcher.matches(&FormulaValue::Number(1.0)));
    }

    #[test]
    fn test_text_comparisons() {
        let ne = CriteriaMatcher::new(&text("<>apple"));
        assert!(ne.matches(&text("pear")));
        assert!(!ne.matches(&text("Apple")));
        assert!(ne.matches(&FormulaValue::Empty));

        let gt = CriteriaMatcher::new(&text(">m"));
        assert!(gt.matches(&text("pear")));
        assert!(!gt.matches(&text("apple")));
    }

    #[test]
    fn test_wildcards() {
        let star = CriteriaMatcher::new(&text("app*"));
        assert!(star.matches(&text("apple")));
        assert!(star.matches(&text("APP")));
        assert!(!star.matches(&text("pineapple")));

        let question = CriteriaMatcher::new(&text("b?t"));
        assert!(question.matches(&text("bat")));
        assert!(!question.matches(&text("boat")));

        let escaped = CriteriaMatcher::new(&text("what~?"));
        assert!(escaped.matches(&text("what?")));
        assert!(!escaped.matches(&text("whats")));

        // Regex metacharacters are literal
        let dotted = CriteriaMatcher::new(&text("a.c*"));
        assert!(dotted.matches(&text("a.cx")));
        assert!(!dotted.matches(&text("abcx")));
    }

    #[test]
    fn test_blank_criteria() {
        let blank = CriteriaMatcher::new(&text(""));
        assert!(blank.matches(&FormulaValue::Empty));
        assert!(blank.matches(&text("")));
        assert!(!blank.matches(&FormulaValue::Number(0.0)));

        let not_blank = CriteriaMatcher::new(&text("<>"));
        assert!(not_blank.matches(&FormulaValue::Number(0.0)));
        assert!(!not_blank.matches(&FormulaValue::Empty));
    }

    #[test]
    fn test_boolean_criteria() {
        let matcher = CriteriaMatcher::new(&text("TRUE"));
        assert!(matcher.matches(&FormulaValue::Boolean(true)));
        assert!(!matcher.matches(&FormulaValue::Number(1.0)));
    }

    #[test]
    fn test_wildcard_to_regex() {
        assert_eq!(wildcard_to_regex("a*b?"), "a(?s:.*)b(?s:.)");
        assert_eq!(wildcard_to_regex("1+1"), r"1\+1");
        assert!(has_wildcards("a*"));
        assert!(!has_wildcards("a~*"));
    }
}
