//! [§ 13.2.3.5 Preprocessing the input stream](https://html.spec.whatwg.org/multipage/parsing.html#preprocessing-the-input-stream)
//!
//! "The input stream consists of the characters pushed into it as the input
//! byte stream is decoded or from the various APIs that directly manipulate
//! the input stream."
//!
//! Input arrives in pieces: one network chunk, one `document.write()` call,
//! one character pushed back by the tokenizer. A [`SegmentedBuffer`] keeps
//! those pieces as separate segments and consumes them head-first, so
//! appending never copies already-queued text and advancing past a segment
//! is O(1).

use std::collections::VecDeque;

use strum_macros::Display;

use crate::position::TextPosition;

/// Outcome of [`SegmentedBuffer::look_ahead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LookAheadResult {
    /// The upcoming characters start with the needle.
    Match,
    /// The upcoming characters cannot start with the needle.
    NoMatch,
    /// Every available character matches a prefix of the needle but more
    /// input is needed to decide. Never returned by a closed buffer, whose
    /// missing characters can no longer arrive.
    InsufficientInput,
}

/// How [`SegmentedBuffer::look_ahead`] compares characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CaseSensitivity {
    /// Exact comparison.
    Sensitive,
    /// [ASCII case-insensitive](https://infra.spec.whatwg.org/#ascii-case-insensitive) comparison.
    AsciiInsensitive,
}

impl CaseSensitivity {
    fn chars_match(self, a: char, b: char) -> bool {
        match self {
            Self::Sensitive => a == b,
            Self::AsciiInsensitive => a.eq_ignore_ascii_case(&b),
        }
    }
}

/// Whether prepended text is new input or text handed back after being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrependKind {
    /// Characters that were consumed and are being returned; the consumed
    /// character count is rewound by their length.
    Unconsume,
    /// Characters that have never been consumed.
    NewInput,
}

/// One contiguous run of input text and its cursor.
#[derive(Debug, Clone, Default)]
struct Segment {
    text: String,
    /// Byte offset of the next unconsumed character.
    cursor: usize,
    /// Pushback may not rewind the cursor below this byte offset.
    floor: usize,
    /// Characters not yet consumed.
    remaining: usize,
    /// When true, byte offsets and character offsets coincide.
    ascii: bool,
    exclude_line_numbers: bool,
}

impl Segment {
    fn new(text: String, exclude_line_numbers: bool) -> Self {
        let ascii = text.is_ascii();
        let remaining = if ascii {
            text.len()
        } else {
            text.chars().count()
        };
        Self {
            text,
            cursor: 0,
            floor: 0,
            remaining,
            ascii,
            exclude_line_numbers,
        }
    }

    fn current_char(&self) -> Option<char> {
        if self.ascii {
            self.text.as_bytes().get(self.cursor).map(|&b| char::from(b))
        } else {
            self.text[self.cursor..].chars().next()
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current_char()?;
        self.cursor += c.len_utf8();
        self.remaining -= 1;
        Some(c)
    }

    fn push_back_if_possible(&mut self, c: char) -> bool {
        if self.cursor <= self.floor {
            return false;
        }
        let previous = if self.ascii {
            char::from(self.text.as_bytes()[self.cursor - 1])
        } else {
            match self.text[..self.cursor].chars().next_back() {
                Some(previous) => previous,
                None => return false,
            }
        };
        if previous != c {
            return false;
        }
        self.cursor -= c.len_utf8();
        self.remaining += 1;
        true
    }

    fn unconsumed(&self) -> &str {
        &self.text[self.cursor..]
    }

    /// Park the segment in the pending queue: whatever it consumed so far
    /// belongs to an earlier position and must not be pushed back into.
    fn park(mut self) -> Self {
        self.floor = self.cursor;
        self
    }
}

/// The not-yet-consumed input, as a queue of segments.
///
/// The head segment (`current`) is being consumed; the rest are queued
/// behind it. Appends go to the tail, consumption proceeds from the head.
///
/// Line and column are derived from two running counters owned by the
/// buffer: the total number of characters consumed, and the number consumed
/// before the start of the current line. Consuming a `'\n'` from a segment
/// that does not exclude line numbers starts a new line.
///
/// A buffer that is empty but open is waiting for more input; a buffer that
/// is empty and closed has reached end-of-file.
#[derive(Debug, Clone, Default)]
pub struct SegmentedBuffer {
    current: Segment,
    pending: VecDeque<Segment>,
    /// Characters left across `current` and `pending`.
    length: usize,
    closed: bool,
    consumed: i64,
    consumed_before_line: i64,
    line: usize,
}

impl SegmentedBuffer {
    /// Create an empty, open buffer positioned at the start of the document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an open buffer holding `text`.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut buffer = Self::new();
        buffer.append(text, false);
        buffer
    }

    /// Number of characters not yet consumed, across all segments.
    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Whether every queued character has been consumed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closed and fully consumed: no character will ever be available again.
    #[must_use]
    pub const fn at_end_of_file(&self) -> bool {
        self.closed && self.length == 0
    }

    /// Append `text` as a new segment at the tail.
    ///
    /// Segments appended with `exclude_line_numbers` advance the column but
    /// never the line, which keeps machine-generated text from shifting the
    /// line numbers of the document around it.
    ///
    /// # Panics
    ///
    /// Panics if the buffer has been closed.
    pub fn append(&mut self, text: &str, exclude_line_numbers: bool) {
        assert!(!self.closed, "append to a closed SegmentedBuffer");
        if text.is_empty() {
            return;
        }
        self.push_segment(Segment::new(text.to_owned(), exclude_line_numbers));
    }

    /// Move every unconsumed segment of `other` to the tail of this buffer.
    ///
    /// Only the text moves; `other`'s position counters and closed flag are
    /// discarded.
    ///
    /// # Panics
    ///
    /// Panics if this buffer has been closed.
    pub fn append_buffer(&mut self, other: Self) {
        assert!(!self.closed, "append to a closed SegmentedBuffer");
        let Self {
            current, pending, ..
        } = other;
        for segment in std::iter::once(current).chain(pending) {
            if segment.remaining > 0 {
                self.push_segment(segment.park());
            }
        }
    }

    fn push_segment(&mut self, segment: Segment) {
        self.length += segment.remaining;
        if self.current.remaining == 0 {
            self.current = segment;
        } else {
            self.pending.push_back(segment);
        }
    }

    /// Put `text` in front of everything queued.
    ///
    /// With [`PrependKind::Unconsume`] the consumed-character count is
    /// rewound by the length of `text`, so the column of the re-consumed
    /// characters comes out the same as the first time. The line is not
    /// rewound; callers unconsuming across a newline must restore the
    /// position themselves.
    pub fn prepend(&mut self, text: &str, kind: PrependKind) {
        if text.is_empty() {
            return;
        }
        self.prepend_segment(Segment::new(text.to_owned(), false), kind);
    }

    fn prepend_segment(&mut self, segment: Segment, kind: PrependKind) {
        if kind == PrependKind::Unconsume {
            self.consumed -= to_i64(segment.remaining);
        }
        self.length += segment.remaining;
        let displaced = std::mem::replace(&mut self.current, segment);
        if displaced.remaining > 0 {
            self.pending.push_front(displaced.park());
        }
    }

    /// Mark that no further input will be appended.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already closed.
    pub fn close(&mut self) {
        assert!(!self.closed, "SegmentedBuffer closed twice");
        self.closed = true;
    }

    /// Flag every queued segment as excluded from line numbering.
    pub fn set_exclude_line_numbers(&mut self) {
        self.current.exclude_line_numbers = true;
        for segment in &mut self.pending {
            segment.exclude_line_numbers = true;
        }
    }

    /// The character at the cursor, without consuming it.
    ///
    /// Returns `None` when the buffer is empty.
    #[must_use]
    pub fn current_char(&self) -> Option<char> {
        self.current.current_char()
    }

    /// Consume the character at the cursor.
    ///
    /// When the head segment runs out, the next queued segment becomes the
    /// head. An exhausted head with nothing queued behind it is kept, so a
    /// following [`push_back`](Self::push_back) can still rewind into it.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty.
    pub fn advance(&mut self) {
        let Some(c) = self.current.advance() else {
            panic!("advance() on an empty SegmentedBuffer");
        };
        self.length -= 1;
        self.consumed += 1;
        if c == '\n' && !self.current.exclude_line_numbers {
            self.line += 1;
            self.consumed_before_line = self.consumed;
        }
        if self.current.remaining == 0
            && let Some(next) = self.pending.pop_front()
        {
            self.current = next;
        }
    }

    /// Consume `count` characters, returning them.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `count` characters are available.
    pub fn advance_by(&mut self, count: usize) -> String {
        let mut consumed = String::with_capacity(count);
        for _ in 0..count {
            let Some(c) = self.current_char() else {
                panic!(
                    "advance_by({count}) with only {} characters available",
                    consumed.chars().count()
                );
            };
            consumed.push(c);
            self.advance();
        }
        consumed
    }

    /// Try to un-consume `c` by rewinding the cursor inside the head segment.
    ///
    /// Succeeds only when the character just before the cursor is `c` and
    /// the cursor is not at the start of the head segment's own text.
    /// Returns `false` otherwise; see [`push`](Self::push) for the fallback.
    ///
    /// A newline is never answered with `false`; pushing one back is a
    /// caller bug, since a [`push`](Self::push) fallback would leave the line
    /// count one too high.
    ///
    /// # Panics
    ///
    /// Panics if `c` is `'\n'`: the start of the previous line is not kept,
    /// so a newline cannot be un-consumed without corrupting line numbers.
    pub fn push_back(&mut self, c: char) -> bool {
        assert!(c != '\n', "cannot push back a newline");
        if !self.current.push_back_if_possible(c) {
            return false;
        }
        self.length += 1;
        self.consumed -= 1;
        true
    }

    /// Un-consume `c`: rewind the cursor if possible, otherwise prepend a
    /// one-character segment holding `c`.
    ///
    /// # Panics
    ///
    /// Panics if `c` is `'\n'`.
    pub fn push(&mut self, c: char) {
        if !self.push_back(c) {
            self.prepend(c.encode_utf8(&mut [0; 4]), PrependKind::Unconsume);
        }
    }

    /// Compare the upcoming characters against `needle` without consuming them.
    ///
    /// When the head segment holds enough characters this is a direct
    /// comparison. Otherwise the needed characters are consumed across
    /// segments, compared, and handed back with their line-number flags
    /// intact, and the position counters are restored to their exact prior
    /// values. Either way the buffer is observably unchanged afterwards.
    pub fn look_ahead(&mut self, needle: &str, case: CaseSensitivity) -> LookAheadResult {
        let needed = needle.chars().count();
        if needed <= self.current.remaining {
            let matches = self
                .current
                .unconsumed()
                .chars()
                .zip(needle.chars())
                .all(|(a, b)| case.chars_match(a, b));
            return if matches {
                LookAheadResult::Match
            } else {
                LookAheadResult::NoMatch
            };
        }
        self.look_ahead_slow_case(needle, needed, case)
    }

    /// [`look_ahead`](Self::look_ahead) with ASCII case-insensitive comparison.
    pub fn look_ahead_ignoring_case(&mut self, needle: &str) -> LookAheadResult {
        self.look_ahead(needle, CaseSensitivity::AsciiInsensitive)
    }

    fn look_ahead_slow_case(
        &mut self,
        needle: &str,
        needed: usize,
        case: CaseSensitivity,
    ) -> LookAheadResult {
        let available = needed.min(self.length);
        let saved = (self.consumed, self.consumed_before_line, self.line);

        // Runs of consumed text, split wherever the line-number flag changes.
        let mut runs: Vec<(String, bool)> = Vec::new();
        let mut matched = true;
        for expected in needle.chars().take(available) {
            let exclude = self.current.exclude_line_numbers;
            let Some(c) = self.current_char() else {
                break;
            };
            matched &= case.chars_match(c, expected);
            match runs.last_mut() {
                Some((text, run_exclude)) if *run_exclude == exclude => text.push(c),
                _ => runs.push((c.to_string(), exclude)),
            }
            self.advance();
        }

        for (text, exclude) in runs.into_iter().rev() {
            self.prepend_segment(Segment::new(text, exclude), PrependKind::Unconsume);
        }
        (self.consumed, self.consumed_before_line, self.line) = saved;

        if !matched {
            LookAheadResult::NoMatch
        } else if available < needed && self.closed {
            LookAheadResult::NoMatch
        } else if available < needed {
            LookAheadResult::InsufficientInput
        } else {
            LookAheadResult::Match
        }
    }

    /// Total characters consumed since the buffer was created, adjusted for
    /// characters handed back.
    #[must_use]
    pub fn number_of_characters_consumed(&self) -> usize {
        usize::try_from(self.consumed).unwrap_or(0)
    }

    /// Zero-based line of the next character.
    #[must_use]
    pub const fn current_line(&self) -> usize {
        self.line
    }

    /// Zero-based column of the next character.
    #[must_use]
    pub fn current_column(&self) -> usize {
        usize::try_from(self.consumed - self.consumed_before_line).unwrap_or(0)
    }

    /// Line and column of the next character.
    #[must_use]
    pub fn current_position(&self) -> TextPosition {
        TextPosition::new(self.current_line(), self.current_column())
    }

    /// Recalibrate line/column so that the character `prolog_length`
    /// characters ahead of the cursor is reported at
    /// (`line`, `column_after_prolog`).
    pub fn set_current_position(
        &mut self,
        line: usize,
        column_after_prolog: usize,
        prolog_length: usize,
    ) {
        self.line = line;
        self.consumed_before_line =
            self.consumed + to_i64(prolog_length) - to_i64(column_after_prolog);
    }

    /// Materialise the unconsumed text, head first.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.length);
        text.push_str(self.current.unconsumed());
        for segment in &self.pending {
            text.push_str(segment.unconsumed());
        }
        text
    }

    /// Number of segments currently queued, including the head.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        usize::from(self.current.remaining > 0) + self.pending.len()
    }
}

fn to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_head_is_kept_for_pushback() {
        let mut buffer = SegmentedBuffer::from_text("ab");
        buffer.advance();
        buffer.advance();
        assert!(buffer.is_empty());
        assert!(buffer.push_back('b'));
        assert_eq!(buffer.current_char(), Some('b'));
    }

    #[test]
    fn test_parked_segment_cannot_be_rewound_past_its_floor() {
        let mut buffer = SegmentedBuffer::from_text("xy");
        buffer.advance();
        buffer.prepend("q", PrependKind::NewInput);
        buffer.advance();
        // Head is now the parked "xy" segment with its cursor on 'y'.
        assert_eq!(buffer.current_char(), Some('y'));
        assert!(!buffer.push_back('x'));
    }

    #[test]
    fn test_segment_count_ignores_exhausted_head() {
        let mut buffer = SegmentedBuffer::from_text("a");
        buffer.append("b", false);
        assert_eq!(buffer.segment_count(), 2);
        buffer.advance();
        buffer.advance();
        assert_eq!(buffer.segment_count(), 0);
    }
}
