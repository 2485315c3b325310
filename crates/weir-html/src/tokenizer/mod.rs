//! HTML tokenizer module.
//!
//! Implements the subset of [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
//! the parser driver needs, over a [`SegmentedBuffer`](weir_input::SegmentedBuffer)
//! that may run dry in the middle of any token.

/// Streaming tokenizer state machine.
pub mod machine;
/// Token types produced by the tokenizer.
pub mod token;

pub use machine::{HtmlTokenizer, TokenizerState};
pub use token::{Attribute, Token};
