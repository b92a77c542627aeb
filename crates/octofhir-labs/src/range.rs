//! Textual reference range expressions such as `"<10"`, `">= 3.5"` or `"5"`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static RANGE_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([<>]=?|=)?\s*(-?[0-9]*\.?[0-9]+)").expect("Invalid range text regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
}

impl Comparator {
    fn from_operator(op: Option<&str>) -> Option<Self> {
        match op {
            None | Some("=") => Some(Comparator::Equal),
            Some("<") => Some(Comparator::Less),
            Some("<=") => Some(Comparator::LessOrEqual),
            Some(">") => Some(Comparator::Greater),
            Some(">=") => Some(Comparator::GreaterOrEqual),
            Some(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Less => "<",
            Comparator::LessOrEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::Equal => "=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `value <op> threshold` comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeExpression {
    pub comparator: Comparator,
    pub threshold: f64,
}

impl RangeExpression {
    /// Whether `value` satisfies the expression.
    pub fn matches(&self, value: f64) -> bool {
        match self.comparator {
            Comparator::Less => value < self.threshold,
            Comparator::LessOrEqual => value <= self.threshold,
            Comparator::Greater => value > self.threshold,
            Comparator::GreaterOrEqual => value >= self.threshold,
            Comparator::Equal => value == self.threshold,
        }
    }
}

/// Parses the first comparison in a range text.
///
/// A missing operator means equality. Returns `None` when the text holds no
/// numeric token.
pub fn parse_range_text(text: &str) -> Option<RangeExpression> {
    let captures = RANGE_TEXT.captures(text)?;
    let comparator = Comparator::from_operator(captures.get(1).map(|m| m.as_str()))?;
    let threshold = captures.get(2)?.as_str().parse::<f64>().ok()?;
    Some(RangeExpression {
        comparator,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(text: &str) -> (Comparator, f64) {
        let expr = parse_range_text(text).unwrap();
        (expr.comparator, expr.threshold)
    }

    #[test]
    fn test_operators() {
        assert_eq!(parsed("<10"), (Comparator::Less, 10.0));
        assert_eq!(parsed("<=10"), (Comparator::LessOrEqual, 10.0));
        assert_eq!(parsed(">3.5"), (Comparator::Greater, 3.5));
        assert_eq!(parsed(">= 3.5"), (Comparator::GreaterOrEqual, 3.5));
        assert_eq!(parsed("=7"), (Comparator::Equal, 7.0));
    }

    #[test]
    fn test_implicit_equality() {
        assert_eq!(parsed("5"), (Comparator::Equal, 5.0));
    }

    #[test]
    fn test_embedded_in_prose() {
        assert_eq!(parsed("Normal: < 200 mg/dL"), (Comparator::Less, 200.0));
        assert_eq!(parsed("negative -1.5"), (Comparator::Equal, -1.5));
        assert_eq!(parsed(".5 or less"), (Comparator::Equal, 0.5));
    }

    #[test]
    fn test_first_match_wins() {
        // A band like "3.9-6.1" yields only its first number.
        assert_eq!(parsed("3.9-6.1"), (Comparator::Equal, 3.9));
    }

    #[test]
    fn test_only_ascii_digits_count() {
        assert_eq!(parsed("\u{0663} or <10"), (Comparator::Less, 10.0));
        assert!(parse_range_text("\u{0663}\u{0664}").is_none());
    }

    #[test]
    fn test_no_numeric_token() {
        assert!(parse_range_text("negative").is_none());
        assert!(parse_range_text("").is_none());
    }

    #[test]
    fn test_matches() {
        let lt = parse_range_text("<10").unwrap();
        assert!(lt.matches(9.9));
        assert!(!lt.matches(10.0));

        let ge = parse_range_text(">=10").unwrap();
        assert!(ge.matches(10.0));
        assert!(!ge.matches(9.0));

        let eq = parse_range_text("5").unwrap();
        assert!(eq.matches(5.0));
        assert!(!eq.matches(5.1));
    }
}
