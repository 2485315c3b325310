//! The contracts between the parser driver and the components it drives.
//!
//! The driver owns the input stream and decides *when* work happens; the
//! collaborators decide *what* the work means. Everything the driver needs
//! from them is on these traits.

use core::fmt;

use serde::Serialize;
use strum_macros::Display;
use weir_input::{SegmentedBuffer, TextPosition};

use crate::script::{LoadedScript, ScriptElement, ScriptExecution};
use crate::tokenizer::Token;

/// [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
///
/// The content models a tokenizer can be switched into from outside: the
/// text states of § 13.2.5.1 through § 13.2.5.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum TokenizerMode {
    /// [§ 13.2.5.1 Data state](https://html.spec.whatwg.org/multipage/parsing.html#data-state)
    Data,
    /// [§ 13.2.5.2 RCDATA state](https://html.spec.whatwg.org/multipage/parsing.html#rcdata-state)
    Rcdata,
    /// [§ 13.2.5.3 RAWTEXT state](https://html.spec.whatwg.org/multipage/parsing.html#rawtext-state)
    Rawtext,
    /// [§ 13.2.5.4 Script data state](https://html.spec.whatwg.org/multipage/parsing.html#script-data-state)
    ScriptData,
    /// [§ 13.2.5.5 PLAINTEXT state](https://html.spec.whatwg.org/multipage/parsing.html#plaintext-state)
    Plaintext,
}

/// Turns characters into tokens, one token per call.
pub trait Tokenizer {
    /// Consume characters from `input` until a token is complete.
    ///
    /// Returns `None` when `input` runs out before a token is complete and
    /// the buffer is not at end-of-file. Any partial token stays inside the
    /// tokenizer and is continued by the next call. The tokenizer must not
    /// keep a reference to `input` past the call.
    fn next_token(&mut self, input: &mut SegmentedBuffer) -> Option<Token>;

    /// The content model the tokenizer returns to between tags.
    fn mode(&self) -> TokenizerMode;

    /// Switch the content model, e.g. PLAINTEXT for text documents.
    fn set_mode(&mut self, mode: TokenizerMode);
}

/// [§ 13.2.6 Tree construction](https://html.spec.whatwg.org/multipage/parsing.html#tree-construction)
///
/// Receives tokens and reports the scripts and stylesheets that block parsing.
pub trait TreeBuilder {
    /// Process one token. `position` is where the input stood after the
    /// token was consumed.
    fn construct_tree(&mut self, token: Token, position: TextPosition);

    /// Whether a script has finished parsing and waits to be handed over.
    fn has_parser_blocking_script(&self) -> bool;

    /// Hand over the waiting script with the position its text started at.
    fn take_script_to_process(&mut self) -> Option<(ScriptElement, TextPosition)>;

    /// Insert anything buffered, such as pending text.
    fn flush(&mut self);

    /// Whether a stylesheet was inserted into the body since the last call.
    fn take_pending_stylesheet_in_body(&mut self) -> bool {
        false
    }

    /// Whether this builder constructs a fragment rather than a document.
    fn is_parsing_fragment(&self) -> bool {
        false
    }

    /// [§ 13.2.7 The end](https://html.spec.whatwg.org/multipage/parsing.html#the-end)
    ///
    /// Parsing is over; no further tokens will arrive.
    fn finished(&mut self);

    /// The parser was detached from the document.
    fn detach(&mut self) {}
}

/// The parser, as seen by a script runner while it executes scripts.
pub trait ScriptHost {
    /// "Let the old insertion point have the same value as the current
    /// insertion point. Let the insertion point be just before the next
    /// input character." Also increments the script nesting level.
    fn begin_script_execution(&mut self) -> ScriptExecution;

    /// Decrement the script nesting level and restore the old insertion point.
    fn end_script_execution(&mut self, execution: ScriptExecution);

    /// [§ 8.4.3.1 The script nesting level](https://html.spec.whatwg.org/multipage/parsing.html#script-nesting-level)
    fn script_nesting_level(&self) -> usize;

    /// [§ 8.4.3 document.write()](https://html.spec.whatwg.org/multipage/dynamic-markup-insertion.html#document.write())
    fn document_write(&mut self, text: &str);

    /// Where the parser currently stands in the source.
    fn text_position(&self) -> TextPosition;
}

/// Prepares and executes the scripts the tree builder discovers.
///
/// Runners are shared with the embedder (which delivers load notifications)
/// and are re-entered while they run: executing a script may write markup
/// that contains another script. All methods therefore take `&self`.
pub trait ScriptRunner {
    /// [§ 13.2.6.4.8 The "text" insertion mode](https://html.spec.whatwg.org/multipage/parsing.html#parsing-main-incdata)
    ///
    /// The steps for "an end tag whose tag name is script": prepare the
    /// script and, unless nested, run any pending parsing-blocking script
    /// that is ready.
    fn process_script_element(
        &self,
        host: &mut dyn ScriptHost,
        script: ScriptElement,
        position: TextPosition,
    );

    /// Whether a parsing-blocking script is pending.
    fn has_parser_blocking_script(&self) -> bool;

    /// Record that an external script finished loading.
    fn script_loaded(&self, loaded: LoadedScript);

    /// Run the pending parsing-blocking script if its load completed.
    fn execute_scripts_waiting_for_load(&self, host: &mut dyn ScriptHost);

    /// Run the pending parsing-blocking script if it was only waiting for
    /// stylesheets.
    fn execute_scripts_waiting_for_resources(&self, host: &mut dyn ScriptHost);

    /// [§ 13.2.7 The end](https://html.spec.whatwg.org/multipage/parsing.html#the-end)
    ///
    /// Run the scripts that will execute when the document has finished
    /// parsing. Returns `false` while one of them is still loading.
    fn execute_scripts_waiting_for_parsing(&self, host: &mut dyn ScriptHost) -> bool;

    /// The parser was detached; drop everything pending.
    fn detach(&self);
}

/// The kind of resource a preload request fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize)]
pub enum ResourceKind {
    /// `<script src>`
    Script,
    /// `<link rel=stylesheet href>`
    Stylesheet,
    /// `<img src>`
    Image,
}

/// A resource worth fetching before the parser reaches it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PreloadRequest {
    /// What the resource is.
    pub kind: ResourceKind,
    /// The URL as written in the markup.
    pub url: String,
}

impl PreloadRequest {
    /// Create a request.
    #[must_use]
    pub fn new(kind: ResourceKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

/// Extracts preload requests from tokens as the parser produces them.
pub trait PreloadScanner {
    /// Inspect a token the parser is about to hand to the tree builder.
    fn scan(&mut self, token: &Token, input: &SegmentedBuffer) -> Vec<PreloadRequest>;

    /// Create a scanner that tokenizes text on its own, ahead of a paused
    /// parser or over text written by a script.
    fn speculative(&self) -> Box<dyn SpeculativeScanner>;
}

/// A preload scanner with its own input, run ahead of the parser.
pub trait SpeculativeScanner {
    /// Queue text for scanning.
    fn append_to_end(&mut self, text: &str);

    /// Tokenize everything queued and report what should be fetched.
    fn scan(&mut self) -> Vec<PreloadRequest>;
}

/// Starts the fetches preload scanners ask for.
pub trait ResourcePreloader {
    /// Start fetching every request. Must not block.
    fn take_and_preload(&mut self, requests: Vec<PreloadRequest>);
}

/// Identifies a scheduled continuation of the pump.
///
/// Only the most recently scheduled continuation is live; resuming with any
/// other id does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContinuationId(pub u64);

impl fmt::Display for ContinuationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The event loop the parser cooperates with.
pub trait Scheduler {
    /// Whether the pump should stop after the current token so that more
    /// important work can run.
    fn should_yield_for_higher_priority_work(&mut self) -> bool;

    /// Arrange for `ResumeReason::Continuation(id)` to be delivered later.
    fn post_continuation(&mut self, id: ContinuationId);

    /// Whether a navigation away from the document is pending.
    fn location_change_pending(&self) -> bool {
        false
    }
}
