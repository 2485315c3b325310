//! Streaming HTML parser driver for Weir.
//!
//! # Scope
//!
//! This crate implements the scheduling core of
//! [§ 13.2 Parsing HTML documents](https://html.spec.whatwg.org/multipage/parsing.html#parsing):
//!
//! - **Parser driver** ([`HtmlDocumentParser`]) - the pump that pulls tokens
//!   out of the input stream, hands them to the tree builder, pauses for
//!   parser-blocking scripts and body stylesheets, yields cooperatively and
//!   resumes exactly where it stopped
//! - **Collaborator contracts** ([`collaborators`]) - the narrow interfaces the
//!   driver needs from a tokenizer, tree builder, script runner, preload
//!   scanner, resource preloader and scheduler
//! - **Reference collaborators** - a streaming tokenizer ([`HtmlTokenizer`]),
//!   an arena tree builder ([`DocumentBuilder`]), a token preload scanner, a
//!   queueing script runner whose engine understands `document.write()`, and
//!   token-budget / manual schedulers
//!
//! # Not Yet Implemented
//!
//! - Insertion modes of tree construction (the reference builder nests
//!   elements by tag name only)
//! - Character reference decoding
//! - Script data escape states
//! - A JavaScript engine

/// Interfaces between the driver and its collaborators.
pub mod collaborators;
/// Parser configuration.
pub mod options;
/// The parser driver.
pub mod parser;
/// Preload scanning and resource preloading.
pub mod preload;
/// Cooperative scheduling.
pub mod scheduler;
/// Script running and the `document.write()` engine.
pub mod script;
/// Streaming HTML tokenizer.
pub mod tokenizer;
/// Reference tree builder and its DOM.
pub mod tree_builder;

pub use collaborators::{
    ContinuationId, PreloadRequest, PreloadScanner, ResourceKind, ResourcePreloader, Scheduler,
    ScriptHost, ScriptRunner, SpeculativeScanner, Tokenizer, TokenizerMode, TreeBuilder,
};
pub use options::ParserOptions;
pub use parser::{
    Collaborators, HtmlDocumentParser, ParserState, ResumeReason, tokenizer_mode_for_context,
};
pub use preload::{CollectingPreloader, HtmlPreloadScanner, TokenPreloadScanner};
pub use scheduler::{ManualScheduler, TokenBudgetScheduler};
pub use script::{
    LoadedScript, QueueingScriptRunner, ScriptContext, ScriptElement, ScriptEngine,
    ScriptExecution, ScriptFetch, ScriptId, WriteScriptEngine,
};
pub use tokenizer::{Attribute, HtmlTokenizer, Token, TokenizerState};
pub use tree_builder::{
    Document, DocumentBuilder, ElementData, Node, NodeId, NodeType, print_tree, render_tree,
};
