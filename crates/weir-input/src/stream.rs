//! [§ 13.2.1 Overview of the parsing model](https://html.spec.whatwg.org/multipage/parsing.html#overview-of-the-parsing-model)
//!
//! "The insertion point is the position (just before a character or just
//! before the end of the input stream) where content inserted using
//! document.write() is actually inserted."
//!
//! [`InputStream`] keeps the buffer the tokenizer consumes from (`first`)
//! separate from the tail that network input is appended to. While no
//! insertion point is open they are the same buffer. Opening an insertion
//! point splits the unconsumed remainder of `first` off, so text written by
//! a script lands in front of everything that was already queued; closing
//! it merges the remainder back behind whatever the script left unparsed.

use std::ops::{Deref, DerefMut};

use crate::position::TextPosition;
use crate::segmented::SegmentedBuffer;

/// The parser's input: a consumption buffer plus the buffers split off by
/// open insertion points.
#[derive(Debug, Default)]
pub struct InputStream {
    first: SegmentedBuffer,
    /// Remainders split off by open insertion points, outermost first.
    /// When non-empty, `split[0]` is the tail network input is appended to.
    split: Vec<SegmentedBuffer>,
}

impl InputStream {
    /// Create an empty stream with no insertion point.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer the tokenizer consumes from.
    #[must_use]
    pub const fn current(&self) -> &SegmentedBuffer {
        &self.first
    }

    /// Mutable access to the buffer the tokenizer consumes from.
    pub const fn current_mut(&mut self) -> &mut SegmentedBuffer {
        &mut self.first
    }

    fn last(&self) -> &SegmentedBuffer {
        self.split.first().unwrap_or(&self.first)
    }

    fn last_mut(&mut self) -> &mut SegmentedBuffer {
        match self.split.first_mut() {
            Some(tail) => tail,
            None => &mut self.first,
        }
    }

    /// Append network-sourced text behind everything queued.
    ///
    /// # Panics
    ///
    /// Panics after [`mark_end_of_file`](Self::mark_end_of_file).
    pub fn append_to_end(&mut self, text: &str) {
        self.last_mut().append(text, false);
    }

    /// Append script-produced text at the insertion point, in front of any
    /// input that was queued when the insertion point was opened.
    ///
    /// Inserted text never advances the line number.
    ///
    /// # Panics
    ///
    /// Panics if the consumption buffer is closed, which can only happen
    /// after end-of-file with no insertion point open.
    pub fn insert_at_insertion_point(&mut self, text: &str) {
        self.first.append(text, true);
    }

    /// Whether an insertion point is open.
    #[must_use]
    pub fn has_insertion_point(&self) -> bool {
        !self.split.is_empty()
    }

    /// Number of insertion points currently open.
    #[must_use]
    pub fn insertion_depth(&self) -> usize {
        self.split.len()
    }

    /// Mark that the network will deliver no more input.
    ///
    /// The end-of-file marker is the closed flag of the tail buffer: once
    /// every insertion point has merged back, the consumption buffer is
    /// closed and reaches end-of-file when it runs empty.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn mark_end_of_file(&mut self) {
        self.last_mut().close();
    }

    /// Whether [`mark_end_of_file`](Self::mark_end_of_file) has been called.
    #[must_use]
    pub fn have_seen_end_of_file(&self) -> bool {
        self.last().is_closed()
    }

    /// Open an insertion point at the current consumption position.
    ///
    /// The unconsumed remainder of the consumption buffer is split off and
    /// consumption continues on an empty buffer, positioned where the
    /// remainder started. The returned record must be handed back to
    /// [`close_insertion_point`](Self::close_insertion_point); prefer
    /// [`insertion_point`](Self::insertion_point), which does so on drop.
    pub fn open_insertion_point(&mut self) -> InsertionPointRecord {
        let position = self.first.current_position();
        let remainder = std::mem::take(&mut self.first);
        self.split.push(remainder);
        // The written text has no position of its own in the document; it
        // inherits the position it was written at.
        self.first
            .set_current_position(position.line, position.column, 0);
        InsertionPointRecord {
            position,
            depth: self.split.len(),
        }
    }

    /// Close the innermost insertion point.
    ///
    /// Whatever the written text left unconsumed (an unterminated tag, a
    /// dangling `&amp`) stays at the front, followed by the remainder that
    /// was split off. The position is restored so that the first character
    /// of that remainder is reported where it was before the split.
    ///
    /// # Panics
    ///
    /// Panics if `record` is not the innermost open insertion point.
    pub fn close_insertion_point(&mut self, record: InsertionPointRecord) {
        assert_eq!(
            record.depth,
            self.split.len(),
            "insertion points must be closed innermost first"
        );
        let Some(remainder) = self.split.pop() else {
            panic!("close_insertion_point with no insertion point open");
        };
        let unparsed_remainder_length = self.first.length();
        let remainder_closed = remainder.is_closed();
        self.first.append_buffer(remainder);
        if remainder_closed {
            // The merged remainder was the tail; its end-of-file moves with it.
            self.first.close();
        }
        self.first.set_current_position(
            record.position.line,
            record.position.column,
            unparsed_remainder_length,
        );
    }

    /// Open an insertion point that closes when the guard is dropped.
    pub fn insertion_point(&mut self) -> InsertionPoint<'_> {
        let record = self.open_insertion_point();
        InsertionPoint {
            stream: self,
            record: Some(record),
        }
    }
}

/// The state captured when an insertion point opens.
///
/// Records are neither `Clone` nor `Copy`, so each can be closed exactly once.
#[derive(Debug)]
#[must_use = "an insertion point must be closed with InputStream::close_insertion_point"]
pub struct InsertionPointRecord {
    position: TextPosition,
    depth: usize,
}

impl InsertionPointRecord {
    /// The consumption position at the moment the insertion point opened.
    pub const fn position(&self) -> TextPosition {
        self.position
    }

    /// Nesting depth of this insertion point; the outermost is 1.
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

/// Scoped insertion point: dereferences to the stream and closes the
/// insertion point when dropped, including during unwinding.
#[derive(Debug)]
pub struct InsertionPoint<'a> {
    stream: &'a mut InputStream,
    record: Option<InsertionPointRecord>,
}

impl Deref for InsertionPoint<'_> {
    type Target = InputStream;

    fn deref(&self) -> &InputStream {
        self.stream
    }
}

impl DerefMut for InsertionPoint<'_> {
    fn deref_mut(&mut self) -> &mut InputStream {
        self.stream
    }
}

impl Drop for InsertionPoint<'_> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.stream.close_insertion_point(record);
        }
    }
}
