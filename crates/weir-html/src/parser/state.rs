use serde::Serialize;
use strum_macros::Display;

use crate::collaborators::ContinuationId;
use crate::script::LoadedScript;

/// The externally visible lifecycle of an
/// [`HtmlDocumentParser`](super::HtmlDocumentParser).
///
/// ```text
/// Detached --append/finish--> Running <--> PausedForScript
///                               |   <--> PausedForStylesheet
///                               v
///                            Stopping --deferred scripts done--> Stopped
/// ```
///
/// `stop_parsing()` moves any state to `Stopped`; `detach()` moves any
/// state to `Detached`, after which the parser accepts nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum ParserState {
    /// Not yet started, or detached from its document.
    Detached,
    /// Consuming input whenever input is available.
    Running,
    /// Waiting for a parser-blocking script to load or run.
    PausedForScript,
    /// Waiting for stylesheets inserted into the body.
    PausedForStylesheet,
    /// All input consumed; waiting for deferred scripts.
    Stopping,
    /// Done. Every later call is a no-op.
    Stopped,
}

/// Why the embedder is calling back into a paused or yielded parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeReason {
    /// An external script finished loading.
    ScriptLoaded(LoadedScript),
    /// Every stylesheet the parser was waiting for has loaded.
    StylesheetsLoaded,
    /// A continuation the parser posted to its scheduler is due.
    Continuation(ContinuationId),
}
