use core::cell::Cell;
use std::rc::Rc;

use weir_common::warn_once;
use weir_input::{InputStream, TextDecoder, TextPosition, Utf8Decoder};

use super::session::PumpSession;
use super::state::{ParserState, ResumeReason};
use crate::collaborators::{
    ContinuationId, PreloadScanner, ResourcePreloader, Scheduler, ScriptHost, ScriptRunner,
    SpeculativeScanner, Tokenizer, TokenizerMode, TreeBuilder,
};
use crate::options::ParserOptions;
use crate::preload::{CollectingPreloader, TokenPreloadScanner};
use crate::scheduler::ManualScheduler;
use crate::script::{LoadedScript, ScriptExecution};
use crate::tokenizer::{HtmlTokenizer, Token};

/// The components an [`HtmlDocumentParser`] drives.
pub struct Collaborators {
    /// Turns the input stream into tokens.
    pub tokenizer: Box<dyn Tokenizer>,
    /// Consumes tokens.
    pub tree_builder: Box<dyn TreeBuilder>,
    /// Runs scripts. Without one, script elements are dropped.
    pub script_runner: Option<Rc<dyn ScriptRunner>>,
    /// Finds resources to fetch early.
    pub preload_scanner: Option<Box<dyn PreloadScanner>>,
    /// Starts the fetches the preload scanner asks for.
    pub preloader: Box<dyn ResourcePreloader>,
    /// Decides when the pump yields and delivers continuations.
    pub scheduler: Box<dyn Scheduler>,
    /// Turns bytes from [`HtmlDocumentParser::append_bytes`] into text.
    pub decoder: Box<dyn TextDecoder>,
}

impl Collaborators {
    /// The reference collaborators around `tree_builder`: an
    /// [`HtmlTokenizer`], a [`TokenPreloadScanner`] feeding a
    /// [`CollectingPreloader`], a [`ManualScheduler`] that never yields, a
    /// UTF-8 decoder, and no script runner.
    #[must_use]
    pub fn new(tree_builder: impl TreeBuilder + 'static) -> Self {
        Self {
            tokenizer: Box::new(HtmlTokenizer::new()),
            tree_builder: Box::new(tree_builder),
            script_runner: None,
            preload_scanner: Some(Box::new(TokenPreloadScanner::new())),
            preloader: Box::new(CollectingPreloader::new()),
            scheduler: Box::new(ManualScheduler::new()),
            decoder: Box::new(Utf8Decoder::new()),
        }
    }

    /// Replace the tokenizer.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    /// Attach a script runner.
    #[must_use]
    pub fn with_script_runner(mut self, runner: Rc<dyn ScriptRunner>) -> Self {
        self.script_runner = Some(runner);
        self
    }

    /// Replace the preload scanner.
    #[must_use]
    pub fn with_preload_scanner(mut self, scanner: impl PreloadScanner + 'static) -> Self {
        self.preload_scanner = Some(Box::new(scanner));
        self
    }

    /// Replace the resource preloader.
    #[must_use]
    pub fn with_preloader(mut self, preloader: impl ResourcePreloader + 'static) -> Self {
        self.preloader = Box::new(preloader);
        self
    }

    /// Replace the scheduler.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Box::new(scheduler);
        self
    }

    /// Replace the byte decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: impl TextDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }
}

/// [§ 13.2 Parsing HTML documents](https://html.spec.whatwg.org/multipage/parsing.html#parsing)
///
/// The streaming parser driver. Input arrives through [`append`](Self::append)
/// in whatever chunks the network delivers; the pump turns it into tokens
/// for the tree builder until the input runs dry, a parser-blocking script
/// or body stylesheet pauses it, or the scheduler asks it to yield. Scripts
/// write back into the input through [`ScriptHost::document_write`], which
/// this type implements.
///
/// All callbacks happen on one thread. Callbacks that arrive after
/// [`stop_parsing`](Self::stop_parsing) or [`detach`](Self::detach) are
/// ignored.
#[allow(clippy::struct_excessive_bools)]
pub struct HtmlDocumentParser {
    pub(super) options: ParserOptions,
    /// Detached, Running, Stopping or Stopped. The paused states are
    /// derived from the collaborators; see [`state`](Self::state).
    phase: ParserState,
    detached: bool,
    input: InputStream,
    pub(super) tokenizer: Box<dyn Tokenizer>,
    tree_builder: Box<dyn TreeBuilder>,
    script_runner: Option<Rc<dyn ScriptRunner>>,
    token_scanner: Option<Box<dyn PreloadScanner>>,
    /// Scans the unparsed remainder while the parser is paused.
    speculative_scanner: Option<Box<dyn SpeculativeScanner>>,
    /// Scans text written while the parser is paused.
    insertion_scanner: Option<Box<dyn SpeculativeScanner>>,
    preloader: Box<dyn ResourcePreloader>,
    scheduler: Box<dyn Scheduler>,
    decoder: Box<dyn TextDecoder>,
    pump_session_nesting: Rc<Cell<usize>>,
    /// [§ 8.4.3.1](https://html.spec.whatwg.org/multipage/parsing.html#script-nesting-level)
    script_nesting_level: usize,
    end_was_delayed: bool,
    added_pending_stylesheet_in_body: bool,
    is_waiting_for_stylesheets: bool,
    /// The only continuation that may still resume the pump.
    continuation: Option<ContinuationId>,
    next_continuation: u64,
}

impl HtmlDocumentParser {
    /// Create a parser in the [`Detached`](ParserState::Detached) state.
    /// It starts running on the first [`append`](Self::append) or
    /// [`finish`](Self::finish).
    #[must_use]
    pub fn new(options: ParserOptions, collaborators: Collaborators) -> Self {
        let Collaborators {
            mut tokenizer,
            tree_builder,
            script_runner,
            preload_scanner,
            preloader,
            scheduler,
            decoder,
        } = collaborators;
        if options.plaintext {
            // [§ 7.4.6 Page load processing model for text files]
            // "switch the tokenizer to the PLAINTEXT state"
            tokenizer.set_mode(TokenizerMode::Plaintext);
        }
        Self {
            options,
            phase: ParserState::Detached,
            detached: false,
            input: InputStream::new(),
            tokenizer,
            tree_builder,
            script_runner: script_runner.filter(|_| options.scripting_enabled),
            token_scanner: preload_scanner.filter(|_| options.preload_scanning),
            speculative_scanner: None,
            insertion_scanner: None,
            preloader,
            scheduler,
            decoder,
            pump_session_nesting: Rc::new(Cell::new(0)),
            script_nesting_level: 0,
            end_was_delayed: false,
            added_pending_stylesheet_in_body: false,
            is_waiting_for_stylesheets: false,
            continuation: None,
            next_continuation: 0,
        }
    }

    // ----- Observers -----

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ParserState {
        if self.detached {
            return ParserState::Detached;
        }
        match self.phase {
            ParserState::Running if self.is_waiting_for_scripts() => ParserState::PausedForScript,
            ParserState::Running if self.is_waiting_for_stylesheets => {
                ParserState::PausedForStylesheet
            }
            phase => phase,
        }
    }

    /// Waiting for a parser-blocking script or for body stylesheets.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.is_waiting_for_scripts() || self.is_waiting_for_stylesheets
    }

    /// Either the tree builder or the script runner holds a
    /// parser-blocking script.
    #[must_use]
    pub fn is_waiting_for_scripts(&self) -> bool {
        self.tree_builder.has_parser_blocking_script()
            || self
                .script_runner
                .as_ref()
                .is_some_and(|runner| runner.has_parser_blocking_script())
    }

    /// Paused until body stylesheets load.
    #[must_use]
    pub const fn is_waiting_for_stylesheets(&self) -> bool {
        self.is_waiting_for_stylesheets
    }

    /// Stopped or detached: every operation is a no-op.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.detached || self.phase == ParserState::Stopped
    }

    /// All input consumed, deferred scripts pending.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        !self.detached && self.phase == ParserState::Stopping
    }

    /// Whether [`detach`](Self::detach) has been called.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.detached
    }

    /// A script is executing.
    #[must_use]
    pub const fn is_executing_script(&self) -> bool {
        self.script_nesting_level > 0
    }

    /// A script-execution insertion point is open.
    #[must_use]
    pub fn has_insertion_point(&self) -> bool {
        self.input.has_insertion_point()
    }

    /// How many pumps are active on the stack.
    #[must_use]
    pub fn pump_session_nesting_level(&self) -> usize {
        self.pump_session_nesting.get()
    }

    /// Whether the pump is active somewhere on the stack.
    #[must_use]
    pub fn in_pump_session(&self) -> bool {
        self.pump_session_nesting.get() > 0
    }

    /// [`finish`](Self::finish) was called but ending had to wait.
    #[must_use]
    pub const fn end_was_delayed(&self) -> bool {
        self.end_was_delayed
    }

    /// The continuation the parser is waiting for, if it yielded.
    #[must_use]
    pub const fn pending_continuation(&self) -> Option<ContinuationId> {
        self.continuation
    }

    /// The tokenizer's content model.
    #[must_use]
    pub fn tokenizer_mode(&self) -> TokenizerMode {
        self.tokenizer.mode()
    }

    /// Where the next character will be consumed.
    #[must_use]
    pub fn text_position(&self) -> TextPosition {
        self.input.current().current_position()
    }

    /// Zero-based line of [`text_position`](Self::text_position).
    #[must_use]
    pub const fn line_number(&self) -> usize {
        self.input.current().current_line()
    }

    // ----- Embedder entry points -----

    /// Queue network text behind everything already queued and pump.
    ///
    /// # Panics
    ///
    /// Panics if called after [`finish`](Self::finish) on a parser that has
    /// not stopped.
    pub fn append(&mut self, text: &str) {
        if self.is_stopped() {
            return;
        }
        self.start_if_needed();

        if self.speculative_scanner.is_some() {
            let paused = self.is_paused();
            if self.input.current().is_empty() && !paused {
                self.speculative_scanner = None;
            } else if let Some(scanner) = self.speculative_scanner.as_mut() {
                scanner.append_to_end(text);
                if paused {
                    let requests = scanner.scan();
                    self.preloader.take_and_preload(requests);
                }
            }
        }

        self.input.append_to_end(text);

        if self.in_pump_session() {
            // The active pump picks the text up.
            return;
        }
        self.pump_tokenizer_if_possible();
        self.end_if_delayed();
    }

    /// Decode network bytes and [`append`](Self::append) the text.
    ///
    /// # Panics
    ///
    /// As for [`append`](Self::append).
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() || self.is_stopped() {
            return;
        }
        let text = self.decoder.decode(bytes);
        if !text.is_empty() {
            self.append(&text);
        }
    }

    /// Insert text at the insertion point and pump it.
    ///
    /// # Panics
    ///
    /// Panics if no insertion point is open after
    /// [`finish`](Self::finish) marked the end of the input.
    pub fn insert(&mut self, text: &str) {
        if self.is_stopped() {
            return;
        }
        self.start_if_needed();
        self.input.insert_at_insertion_point(text);
        self.pump_tokenizer_if_possible();

        if self.is_paused() {
            self.scan_inserted_text(text);
        }
        self.end_if_delayed();
    }

    /// [§ 13.2.7 The end](https://html.spec.whatwg.org/multipage/parsing.html#the-end)
    ///
    /// No more network input will arrive. Parsing ends once everything
    /// queued is consumed and nothing holds the parser.
    pub fn finish(&mut self) {
        if self.detached {
            return;
        }
        let tail = self.decoder.flush();
        if !tail.is_empty() {
            self.append(&tail);
        }
        if self.is_stopped() {
            return;
        }
        self.start_if_needed();
        if !self.input.have_seen_end_of_file() {
            self.input.mark_end_of_file();
        }
        self.pump_tokenizer_if_possible();
        self.attempt_to_end();
    }

    /// The single re-entry point for everything the parser waits on.
    pub fn resume(&mut self, reason: ResumeReason) {
        if self.is_stopped() {
            if self.detached {
                warn_once("HTML parser", "callback after detach ignored");
            }
            return;
        }
        match reason {
            ResumeReason::ScriptLoaded(loaded) => self.notify_script_loaded(loaded),
            ResumeReason::StylesheetsLoaded => self.execute_scripts_waiting_for_resources(),
            ResumeReason::Continuation(id) => self.run_continuation(id),
        }
    }

    /// A stylesheet was inserted into the body and is loading.
    pub const fn did_add_pending_stylesheet_in_body(&mut self) {
        if self.options.block_on_body_stylesheets {
            self.added_pending_stylesheet_in_body = true;
        }
    }

    /// Every body stylesheet loaded before the parser noticed it.
    pub const fn did_load_all_body_stylesheets(&mut self) {
        self.added_pending_stylesheet_in_body = false;
    }

    /// [§ 13.2.8 Aborting a parser](https://html.spec.whatwg.org/multipage/parsing.html#abort-a-parser)
    ///
    /// Stop from any state. Later calls are no-ops.
    pub fn stop_parsing(&mut self) {
        self.set_phase(ParserState::Stopped);
        self.continuation = None;
    }

    /// Stop and release every collaborator and all buffered input.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.stop_parsing();
        self.detached = true;
        #[cfg(feature = "parser-trace")]
        eprintln!("[PARSER] detached");
        if let Some(runner) = self.script_runner.take() {
            runner.detach();
        }
        self.tree_builder.detach();
        self.token_scanner = None;
        self.speculative_scanner = None;
        self.insertion_scanner = None;
        self.input = InputStream::new();
    }

    // ----- Lifecycle -----

    fn set_phase(&mut self, phase: ParserState) {
        if self.phase == phase {
            return;
        }
        #[cfg(feature = "parser-trace")]
        eprintln!("[PARSER] {} -> {phase}", self.phase);
        self.phase = phase;
    }

    fn start_if_needed(&mut self) {
        if self.phase == ParserState::Detached && !self.detached {
            self.set_phase(ParserState::Running);
        }
    }

    /// Ending waits while a pump is active or scheduled, the parser is
    /// paused, or a script is executing.
    fn should_delay_end(&self) -> bool {
        self.in_pump_session()
            || self.is_paused()
            || self.is_executing_script()
            || self.continuation.is_some()
    }

    fn attempt_to_end(&mut self) {
        if self.should_delay_end() {
            self.end_was_delayed = true;
        } else {
            self.prepare_to_stop_parsing();
        }
    }

    fn end_if_delayed(&mut self) {
        if self.detached || !self.end_was_delayed || self.should_delay_end() {
            return;
        }
        self.end_was_delayed = false;
        self.prepare_to_stop_parsing();
    }

    /// [§ 13.2.7 The end](https://html.spec.whatwg.org/multipage/parsing.html#the-end)
    ///
    /// "Set the current document readiness to "interactive" and the
    /// insertion point to undefined."
    fn prepare_to_stop_parsing(&mut self) {
        assert!(
            !self.has_insertion_point(),
            "parsing cannot end while an insertion point is open"
        );
        // Flush whatever the tokenizer still holds now that end-of-file is known.
        self.pump_tokenizer_if_possible();
        if self.is_stopped() {
            return;
        }
        if self.is_paused() || self.continuation.is_some() {
            // The final pump paused for a script or yielded.
            self.end_was_delayed = true;
            return;
        }
        self.set_phase(ParserState::Stopping);
        self.attempt_to_run_deferred_scripts_and_end();
    }

    /// "Spin the event loop until the first script in the list of scripts
    /// that will execute when the document has finished parsing ... is
    /// ready to be parser-executed"
    fn attempt_to_run_deferred_scripts_and_end(&mut self) {
        debug_assert_eq!(self.phase, ParserState::Stopping);
        if let Some(runner) = self.script_runner.clone()
            && !runner.execute_scripts_waiting_for_parsing(self)
        {
            return;
        }
        self.end();
    }

    fn end(&mut self) {
        if self.is_stopped() {
            return;
        }
        self.tree_builder.finished();
        self.stop_parsing();
    }

    // ----- Resumption -----

    fn notify_script_loaded(&mut self, loaded: LoadedScript) {
        let Some(runner) = self.script_runner.clone() else {
            return;
        };
        debug_assert!(
            !self.is_executing_script(),
            "script load delivered while a script is executing"
        );
        runner.script_loaded(loaded);

        if self.is_stopping() {
            self.attempt_to_run_deferred_scripts_and_end();
            return;
        }

        runner.execute_scripts_waiting_for_load(self);
        if !self.is_paused() {
            self.resume_parsing_after_pause();
        }
    }

    fn execute_scripts_waiting_for_resources(&mut self) {
        self.is_waiting_for_stylesheets = false;
        if let Some(runner) = self.script_runner.clone() {
            runner.execute_scripts_waiting_for_resources(self);
        }
        if !self.is_paused() {
            self.resume_parsing_after_pause();
        }
    }

    fn resume_parsing_after_pause(&mut self) {
        self.check_if_body_stylesheet_added();
        if self.is_paused() {
            return;
        }
        self.insertion_scanner = None;
        self.pump_tokenizer_if_possible();
        self.end_if_delayed();
    }

    fn run_continuation(&mut self, id: ContinuationId) {
        if self.continuation != Some(id) {
            // Superseded by a pump started some other way.
            return;
        }
        self.continuation = None;
        self.pump_tokenizer_if_possible();
        self.end_if_delayed();
    }

    fn schedule_continuation(&mut self) {
        self.next_continuation += 1;
        let id = ContinuationId(self.next_continuation);
        self.continuation = Some(id);
        self.scheduler.post_continuation(id);
    }

    // ----- The pump -----

    /// A pending body stylesheet becomes a pause at the next token boundary.
    const fn check_if_body_stylesheet_added(&mut self) {
        if self.added_pending_stylesheet_in_body {
            self.added_pending_stylesheet_in_body = false;
            self.is_waiting_for_stylesheets = true;
        }
    }

    fn pump_tokenizer_if_possible(&mut self) {
        self.check_if_body_stylesheet_added();
        if self.is_stopped() || self.is_paused() {
            return;
        }
        // Any pump makes a scheduled continuation redundant.
        self.continuation = None;
        self.pump_tokenizer();
    }

    fn can_take_next_token(&mut self) -> bool {
        if self.is_stopped() {
            return false;
        }
        if self.tree_builder.has_parser_blocking_script() {
            self.run_scripts_for_paused_tree_builder();
        }
        if self.is_stopped() || self.is_paused() {
            return false;
        }
        // Navigating away makes further parsing pointless.
        if !self.tree_builder.is_parsing_fragment() && self.scheduler.location_change_pending() {
            return false;
        }
        true
    }

    fn run_scripts_for_paused_tree_builder(&mut self) {
        let Some((script, position)) = self.tree_builder.take_script_to_process() else {
            return;
        };
        #[cfg(feature = "parser-trace")]
        eprintln!("[PARSER] processing {} from {position}", script.id);
        if let Some(runner) = self.script_runner.clone() {
            runner.process_script_element(self, script, position);
        }
        self.check_if_body_stylesheet_added();
    }

    fn pump_tokenizer(&mut self) {
        assert!(!self.is_stopped(), "pumping a stopped parser");
        let _session = PumpSession::enter(&self.pump_session_nesting);

        let mut should_yield = false;
        while self.can_take_next_token() && !should_yield {
            let Some(token) = self.tokenizer.next_token(self.input.current_mut()) else {
                break;
            };
            if let Some(scanner) = self.token_scanner.as_mut() {
                let requests = scanner.scan(&token, self.input.current());
                self.preloader.take_and_preload(requests);
            }
            self.construct_tree_from_token(token);
            // Text written by a running script is pumped to completion, and
            // a script waiting to be handed over runs before any yield.
            should_yield = !self.is_executing_script()
                && !self.tree_builder.has_parser_blocking_script()
                && self.scheduler.should_yield_for_higher_priority_work();
        }

        if self.is_stopped() {
            return;
        }
        self.tree_builder.flush();

        if self.is_paused() {
            self.scan_ahead_of_paused_parser();
        } else if should_yield {
            self.schedule_continuation();
        }
    }

    fn construct_tree_from_token(&mut self, token: Token) {
        let position = self.text_position();
        self.tree_builder.construct_tree(token, position);
        if self.tree_builder.take_pending_stylesheet_in_body() {
            self.did_add_pending_stylesheet_in_body();
        }
        self.check_if_body_stylesheet_added();
    }

    // ----- Speculative scanning -----

    fn scan_ahead_of_paused_parser(&mut self) {
        if !self.options.speculative_preload {
            return;
        }
        if self.speculative_scanner.is_none() {
            let Some(token_scanner) = self.token_scanner.as_ref() else {
                return;
            };
            let mut scanner = token_scanner.speculative();
            scanner.append_to_end(&self.input.current().to_text());
            self.speculative_scanner = Some(scanner);
        }
        if let Some(scanner) = self.speculative_scanner.as_mut() {
            let requests = scanner.scan();
            self.preloader.take_and_preload(requests);
        }
    }

    fn scan_inserted_text(&mut self, text: &str) {
        let Some(token_scanner) = self.token_scanner.as_ref() else {
            return;
        };
        let scanner = self
            .insertion_scanner
            .get_or_insert_with(|| token_scanner.speculative());
        scanner.append_to_end(text);
        let requests = scanner.scan();
        self.preloader.take_and_preload(requests);
    }
}

impl ScriptHost for HtmlDocumentParser {
    fn begin_script_execution(&mut self) -> ScriptExecution {
        self.script_nesting_level += 1;
        ScriptExecution::new(self.input.open_insertion_point())
    }

    fn end_script_execution(&mut self, execution: ScriptExecution) {
        self.script_nesting_level -= 1;
        let record = execution.into_record();
        if !self.detached {
            self.input.close_insertion_point(record);
        }
    }

    fn script_nesting_level(&self) -> usize {
        self.script_nesting_level
    }

    /// [§ 8.4.3 document.write()](https://html.spec.whatwg.org/multipage/dynamic-markup-insertion.html#document-write-steps)
    ///
    /// "Insert input into the input stream just before the insertion
    /// point." With no insertion point open the text goes behind the
    /// queued network input; once the input has ended it is dropped.
    fn document_write(&mut self, text: &str) {
        if self.is_stopped() {
            warn_once("HTML parser", "write() on a stopped parser ignored");
            return;
        }
        if self.input.has_insertion_point() {
            self.insert(text);
        } else if self.input.have_seen_end_of_file() {
            warn_once("HTML parser", "write() after the end of input ignored");
        } else {
            self.append(text);
        }
    }

    fn text_position(&self) -> TextPosition {
        self.input.current().current_position()
    }
}
