//! Source location tracking

use serde::{Deserialize, Serialize};

/// Byte range of a node in the original source text.
///
/// The parser lives outside this crate, so spans are whatever the producer of
/// the AST recorded. Hand-built trees use [`Span::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A node paired with its location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    #[serde(default)]
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    /// Wrap a node that has no recorded location
    pub fn bare(node: T) -> Self {
        Self {
            node,
            span: Span::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_default() {
        assert!(Span::default().is_empty());
        assert!(!Span::new(3, 4).is_empty());
    }

    #[test]
    fn test_range_conversion() {
        let range: std::ops::Range<usize> = Span::new(2, 9).into();
        assert_eq!(range, 2..9);
        assert_eq!(Span::from(4..5), Span::new(4, 5));
    }

    #[test]
    fn test_spanned_missing_span_deserializes() {
        let node: Spanned<String> = serde_json::from_str(r#"{"node":"x"}"#).unwrap();
        assert_eq!(node.node, "x");
        assert_eq!(node.span, Span::default());
    }
}
