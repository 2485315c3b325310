//! The parser driver.
//!
//! With the `parser-trace` feature enabled, pump sessions (with their
//! nesting depth), lifecycle transitions and script hand-overs are printed
//! to stderr with a `[PARSER]` prefix.

mod driver;
mod fragment;
mod session;
mod state;

pub use driver::{Collaborators, HtmlDocumentParser};
pub use fragment::tokenizer_mode_for_context;
pub use state::{ParserState, ResumeReason};
