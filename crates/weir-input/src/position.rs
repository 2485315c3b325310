use core::fmt;

/// A position in the source text.
///
/// Both components are zero-based and count Unicode scalar values, not
/// bytes. The `Display` form is one-based (`line:column`) to match how
/// editors report positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextPosition {
    /// Zero-based line number.
    pub line: usize,
    /// Zero-based column within the line.
    pub column: usize,
}

impl TextPosition {
    /// The start of the document.
    pub const START: Self = Self { line: 0, column: 0 };

    /// A position that lies outside any source text, used for scripts the
    /// parser did not create.
    pub const BELOW_RANGE: Self = Self {
        line: usize::MAX,
        column: usize::MAX,
    };

    /// Create a position from zero-based components.
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Whether this is [`TextPosition::BELOW_RANGE`].
    #[must_use]
    pub const fn is_below_range(&self) -> bool {
        self.line == usize::MAX && self.column == usize::MAX
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_below_range() {
            write!(f, "-:-")
        } else {
            write!(f, "{}:{}", self.line + 1, self.column + 1)
        }
    }
}
