//! Streaming input for the Weir HTML parser.
//!
//! # Scope
//!
//! This crate implements the input side of
//! [§ 13.2.3 The input byte stream](https://html.spec.whatwg.org/multipage/parsing.html#the-input-byte-stream)
//! and the insertion point of
//! [§ 13.2.1 Overview of the parsing model](https://html.spec.whatwg.org/multipage/parsing.html#insertion-point):
//!
//! - **Segmented buffers** ([`SegmentedBuffer`]) - all not-yet-consumed input
//!   as a queue of segments, with line/column bookkeeping, one-character
//!   pushback and non-destructive lookahead
//! - **Input stream** ([`InputStream`]) - the head buffer the tokenizer
//!   consumes from, plus the tail that network input is appended to while
//!   `document.write()` insertion points are open
//! - **Decoding** ([`Utf8Decoder`]) - turning network bytes into text,
//!   carrying split multi-byte sequences across chunk boundaries
//!
//! All errors in this crate are contract violations and panic.

/// Byte-to-text decoding.
pub mod decoder;
/// Text positions (line/column).
pub mod position;
/// The segmented buffer.
pub mod segmented;
/// The input stream and insertion points.
pub mod stream;

pub use decoder::{TextDecoder, Utf8Decoder};
pub use position::TextPosition;
pub use segmented::{CaseSensitivity, LookAheadResult, PrependKind, SegmentedBuffer};
pub use stream::{InputStream, InsertionPoint, InsertionPointRecord};
