//! [§ 4.12.1 The script element](https://html.spec.whatwg.org/multipage/scripting.html#the-script-element)
//!
//! Scripts as the driver sees them, and a reference [`ScriptRunner`] that
//! implements the parser-facing half of script processing: parser-blocking
//! scripts, deferred scripts that run when parsing finishes, and async
//! scripts that run whenever they load.
//!
//! The runner does not fetch anything. It queues [`ScriptFetch`] requests
//! for the embedder and is told about completed loads through
//! [`ScriptRunner::script_loaded`].

use core::cell::RefCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use weir_common::warn_once;
use weir_input::{InsertionPointRecord, TextPosition};

use crate::collaborators::{ScriptHost, ScriptRunner};

/// Identifies one script element for the lifetime of a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScriptId(pub u64);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script#{}", self.0)
    }
}

/// A script element the tree builder finished parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptElement {
    /// Identity used to match load notifications.
    pub id: ScriptId,
    /// The inline source text.
    pub text: String,
    /// The `src` attribute, if present.
    pub src: Option<String>,
    /// The `async` attribute is present.
    pub is_async: bool,
    /// The `defer` attribute is present.
    pub is_deferred: bool,
}

impl ScriptElement {
    /// An inline script.
    #[must_use]
    pub fn inline(id: ScriptId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            src: None,
            is_async: false,
            is_deferred: false,
        }
    }

    /// An external script with no `async` or `defer` attribute.
    #[must_use]
    pub fn external(id: ScriptId, src: impl Into<String>) -> Self {
        Self {
            id,
            text: String::new(),
            src: Some(src.into()),
            is_async: false,
            is_deferred: false,
        }
    }

    /// Set the `async` attribute.
    #[must_use]
    pub const fn with_async(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Set the `defer` attribute.
    #[must_use]
    pub const fn with_defer(mut self) -> Self {
        self.is_deferred = true;
        self
    }

    /// [§ 4.12.1.1 Processing model](https://html.spec.whatwg.org/multipage/scripting.html#prepare-the-script-element)
    ///
    /// "If el has a src content attribute, ... does not have an async
    /// attribute ... [and] does not have a defer attribute: Set el's
    /// parser-blocking ... the element is the pending parsing-blocking script"
    #[must_use]
    pub const fn is_parser_blocking(&self) -> bool {
        self.src.is_some() && !self.is_async && !self.is_deferred
    }

    /// "If el has a src content attribute and a defer attribute ... Append el
    /// to its parser document's list of scripts that will execute when the
    /// document has finished parsing."
    #[must_use]
    pub const fn runs_after_parsing(&self) -> bool {
        self.src.is_some() && self.is_deferred && !self.is_async
    }
}

/// The source of an external script whose fetch completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedScript {
    /// The script that loaded.
    pub id: ScriptId,
    /// Its source text. Empty when the fetch failed.
    pub source: String,
}

impl LoadedScript {
    /// Create a load notification.
    #[must_use]
    pub fn new(id: ScriptId, source: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
        }
    }
}

/// A fetch the runner wants the embedder to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptFetch {
    /// Deliver the result as `LoadedScript { id, .. }`.
    pub id: ScriptId,
    /// The `src` attribute.
    pub url: String,
}

/// Proof that a script execution began: the insertion point opened for it.
#[derive(Debug)]
#[must_use = "a script execution must be ended with ScriptHost::end_script_execution"]
pub struct ScriptExecution {
    record: InsertionPointRecord,
}

impl ScriptExecution {
    /// Wrap the insertion point opened for a script.
    pub const fn new(record: InsertionPointRecord) -> Self {
        Self { record }
    }

    /// The insertion point to close when the script finishes.
    #[must_use]
    pub fn into_record(self) -> InsertionPointRecord {
        self.record
    }
}

/// A script execution in progress: the host with an insertion point open
/// and the script nesting level raised. Both are restored on drop.
pub struct ScriptContext<'a> {
    host: &'a mut dyn ScriptHost,
    execution: Option<ScriptExecution>,
}

impl<'a> ScriptContext<'a> {
    /// [§ 13.2.6.4.8 The "text" insertion mode](https://html.spec.whatwg.org/multipage/parsing.html#scriptEndTag)
    ///
    /// "Let the old insertion point have the same value as the current
    /// insertion point. Let the insertion point be just before the next
    /// input character. Increment the parser's script nesting level by one."
    pub fn enter(host: &'a mut dyn ScriptHost) -> Self {
        let execution = host.begin_script_execution();
        Self {
            host,
            execution: Some(execution),
        }
    }
}

impl<'a> Deref for ScriptContext<'a> {
    type Target = dyn ScriptHost + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.host
    }
}

impl DerefMut for ScriptContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.host
    }
}

impl Drop for ScriptContext<'_> {
    /// "Decrement the parser's script nesting level by one. ... Let the
    /// insertion point have the value of the old insertion point."
    fn drop(&mut self) {
        if let Some(execution) = self.execution.take() {
            self.host.end_script_execution(execution);
        }
    }
}

/// Executes script source against a host.
pub trait ScriptEngine {
    /// Run `source`. Markup written by the script goes through
    /// [`ScriptHost::document_write`].
    fn execute(&self, source: &str, host: &mut dyn ScriptHost);
}

/// A script engine that understands exactly one thing: statements of the
/// form `document.write(...)` and `document.writeln(...)` whose arguments
/// are string literals, optionally joined with `+`.
///
/// Anything else is skipped with a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteScriptEngine;

/// One statement of a script, as far as [`WriteScriptEngine`] understands it.
#[derive(Debug, PartialEq, Eq)]
enum Statement {
    Write(String),
    Unsupported(String),
}

/// Splits script source into statements.
struct StatementParser {
    chars: Vec<char>,
    pos: usize,
}

impl StatementParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(offset, c)| self.chars.get(self.pos + offset) == Some(&c))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Skip whitespace, statement separators and comments.
    fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            if self.peek() == Some(';') {
                self.pos += 1;
            } else if self.starts_with("//") {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else if self.starts_with("/*") {
                self.pos += 2;
                while self.pos < self.chars.len() && !self.starts_with("*/") {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.chars.len());
            } else if self.starts_with("<!--") || self.starts_with("-->") {
                // HTML-like comments are single-line comments in classic scripts.
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else {
                return;
            }
        }
    }

    fn next_statement(&mut self) -> Option<Statement> {
        self.skip_trivia();
        let start = self.pos;
        if self.peek().is_none() {
            return None;
        }

        for (callee, newline) in [("document.writeln", true), ("document.write", false)] {
            if self.starts_with(callee) {
                self.pos += callee.chars().count();
                if let Some(mut text) = self.parse_call_arguments() {
                    if newline {
                        text.push('\n');
                    }
                    return Some(Statement::Write(text));
                }
                break;
            }
        }

        self.pos = start;
        self.skip_statement();
        let text: String = self.chars[start..self.pos].iter().collect();
        Some(Statement::Unsupported(text.trim().to_string()))
    }

    /// `( expr, expr, ... )` where each expr is string literals joined by `+`.
    fn parse_call_arguments(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.peek() != Some('(') {
            return None;
        }
        self.pos += 1;
        let mut text = String::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.pos += 1;
                break;
            }
            loop {
                self.skip_whitespace();
                text.push_str(&self.parse_string_literal()?);
                self.skip_whitespace();
                if self.peek() != Some('+') {
                    break;
                }
                self.pos += 1;
            }
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {}
                _ => return None,
            }
        }
        // Only a statement boundary may follow the call.
        let after_call = self.pos;
        self.skip_whitespace();
        let line_break = self.chars[after_call..self.pos].contains(&'\n');
        match self.peek() {
            None | Some(';') => Some(text),
            _ if line_break => Some(text),
            _ => None,
        }
    }

    fn parse_string_literal(&mut self) -> Option<String> {
        let quote = self.peek().filter(|c| matches!(c, '"' | '\'' | '`'))?;
        self.pos += 1;
        let mut text = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            match c {
                c if c == quote => return Some(text),
                '$' if quote == '`' && self.peek() == Some('{') => return None,
                '\n' if quote != '`' => return None,
                '\\' => {
                    if let Some(escaped) = self.parse_escape()? {
                        text.push(escaped);
                    }
                }
                _ => text.push(c),
            }
        }
    }

    /// The character after a backslash. `Some(None)` for a line continuation.
    fn parse_escape(&mut self) -> Option<Option<char>> {
        let c = self.peek()?;
        self.pos += 1;
        let escaped = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'v' => '\u{000B}',
            '0' => '\0',
            '\n' => return Some(None),
            'x' => self.parse_hex_digits(2)?,
            'u' if self.peek() == Some('{') => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != '}') {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                char::from_u32(u32::from_str_radix(&digits, 16).ok()?)?
            }
            'u' => self.parse_hex_digits(4)?,
            other => other,
        };
        Some(Some(escaped))
    }

    fn parse_hex_digits(&mut self, count: usize) -> Option<char> {
        let digits: String = self.chars.get(self.pos..self.pos + count)?.iter().collect();
        self.pos += count;
        char::from_u32(u32::from_str_radix(&digits, 16).ok()?)
    }

    /// Skip to the end of the statement, honouring string literals and
    /// bracket nesting.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' | '`' => {
                    if self.parse_string_literal().is_none() {
                        self.pos = (self.pos + 1).min(self.chars.len());
                    }
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ';' | '\n' if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }
}

impl ScriptEngine for WriteScriptEngine {
    fn execute(&self, source: &str, host: &mut dyn ScriptHost) {
        let mut parser = StatementParser::new(source);
        while let Some(statement) = parser.next_statement() {
            match statement {
                Statement::Write(text) => host.document_write(&text),
                Statement::Unsupported(text) => warn_once(
                    "Script engine",
                    &format!("skipped unsupported statement `{text}`"),
                ),
            }
        }
    }
}

/// A script the runner holds on to.
#[derive(Debug, Clone)]
struct PendingScript {
    element: ScriptElement,
    position: TextPosition,
}

#[derive(Debug, Default)]
struct RunnerState {
    /// [§ 13.2.6.4.8](https://html.spec.whatwg.org/multipage/parsing.html#pending-parsing-blocking-script)
    /// "the pending parsing-blocking script"
    parser_blocking: Option<PendingScript>,
    /// "the list of scripts that will execute when the document has
    /// finished parsing"
    deferred: VecDeque<PendingScript>,
    /// "the set of scripts that will execute as soon as possible"
    asynchronous: Vec<PendingScript>,
    /// Sources of external scripts that loaded but have not run.
    loaded: HashMap<ScriptId, String>,
    fetches: Vec<ScriptFetch>,
    /// Executed scripts with the position their element ended at.
    executed: Vec<(ScriptId, TextPosition)>,
    detached: bool,
}

/// A [`ScriptRunner`] that queues fetches for the embedder and runs scripts
/// with a [`ScriptEngine`].
///
/// Share it through an `Rc`: the embedder keeps one handle for delivering
/// loads while the parser owns another.
pub struct QueueingScriptRunner<E: ScriptEngine> {
    engine: E,
    state: RefCell<RunnerState>,
}

impl<E: ScriptEngine> QueueingScriptRunner<E> {
    /// A runner with nothing queued.
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: RefCell::new(RunnerState::default()),
        }
    }

    /// Fetches requested since the last call, in document order.
    #[must_use]
    pub fn take_fetch_requests(&self) -> Vec<ScriptFetch> {
        std::mem::take(&mut self.state.borrow_mut().fetches)
    }

    /// Every script executed so far, in execution order.
    #[must_use]
    pub fn executed(&self) -> Vec<ScriptId> {
        self.state.borrow().executed.iter().map(|(id, _)| *id).collect()
    }

    /// Every script executed so far with the source position the tree
    /// builder reported for it, in execution order.
    #[must_use]
    pub fn executed_at(&self) -> Vec<(ScriptId, TextPosition)> {
        self.state.borrow().executed.clone()
    }

    /// Number of deferred scripts that have not run yet.
    #[must_use]
    pub fn pending_deferred(&self) -> usize {
        self.state.borrow().deferred.len()
    }

    /// Record and run one script. No borrow of the queue is held while the
    /// engine runs, so the script may re-enter the runner.
    fn run(
        &self,
        host: &mut dyn ScriptHost,
        id: ScriptId,
        position: TextPosition,
        source: &str,
    ) {
        self.state.borrow_mut().executed.push((id, position));
        self.engine.execute(source, host);
    }

    /// [§ 4.12.1.1 Processing model](https://html.spec.whatwg.org/multipage/scripting.html#prepare-the-script-element)
    fn prepare_script(
        &self,
        host: &mut dyn ScriptHost,
        script: ScriptElement,
        position: TextPosition,
    ) {
        let Some(url) = script.src.clone() else {
            // "Otherwise: Immediately execute the script element el, even if
            // other scripts are already executing."
            self.run(host, script.id, position, &script.text);
            return;
        };

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.fetches.push(ScriptFetch {
            id: script.id,
            url,
        });
        let pending = PendingScript {
            element: script,
            position,
        };
        if pending.element.runs_after_parsing() {
            state.deferred.push_back(pending);
        } else if pending.element.is_async {
            state.asynchronous.push(pending);
        } else {
            if let Some(replaced) = &state.parser_blocking {
                warn_once(
                    "Script runner",
                    &format!(
                        "parser-blocking script at {}:{} replaced the pending one at {}:{}",
                        pending.position.line,
                        pending.position.column,
                        replaced.position.line,
                        replaced.position.column,
                    ),
                );
            }
            state.parser_blocking = Some(pending);
        }
    }

    /// Run the pending parsing-blocking script for as long as one is
    /// pending and loaded.
    fn execute_parsing_blocking_scripts(&self, host: &mut dyn ScriptHost) {
        loop {
            let (id, position, source) = {
                let mut guard = self.state.borrow_mut();
                let state = &mut *guard;
                let Some((id, position)) = state
                    .parser_blocking
                    .as_ref()
                    .map(|p| (p.element.id, p.position))
                else {
                    break;
                };
                let Some(source) = state.loaded.remove(&id) else {
                    break;
                };
                state.parser_blocking = None;
                (id, position, source)
            };
            // "Let the insertion point be just before the next input
            // character. Increment the parser's script nesting level by one
            // ... Execute the script element the pending parsing-blocking
            // script."
            let mut context = ScriptContext::enter(host);
            self.run(&mut *context, id, position, &source);
        }
    }

    /// Async scripts run as soon as they load, without an insertion point.
    fn execute_ready_async_scripts(&self, host: &mut dyn ScriptHost) {
        loop {
            let (id, position, source) = {
                let mut guard = self.state.borrow_mut();
                let state = &mut *guard;
                let Some(index) = state
                    .asynchronous
                    .iter()
                    .position(|p| state.loaded.contains_key(&p.element.id))
                else {
                    break;
                };
                let pending = state.asynchronous.remove(index);
                let source = state.loaded.remove(&pending.element.id).unwrap_or_default();
                (pending.element.id, pending.position, source)
            };
            self.run(host, id, position, &source);
        }
    }
}

impl<E: ScriptEngine> fmt::Debug for QueueingScriptRunner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueingScriptRunner")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<E: ScriptEngine> ScriptRunner for QueueingScriptRunner<E> {
    fn process_script_element(
        &self,
        host: &mut dyn ScriptHost,
        script: ScriptElement,
        position: TextPosition,
    ) {
        if self.state.borrow().detached {
            return;
        }
        {
            let mut context = ScriptContext::enter(host);
            self.prepare_script(&mut *context, script, position);
        }
        // "If there is a pending parsing-blocking script ... If the script
        // nesting level is not zero: Set the parser pause flag to true, and
        // abort the processing of any nested invocations of the tokenizer,
        // yielding control back to the caller."
        if self.has_parser_blocking_script() && host.script_nesting_level() == 0 {
            self.execute_parsing_blocking_scripts(host);
        }
    }

    fn has_parser_blocking_script(&self) -> bool {
        self.state.borrow().parser_blocking.is_some()
    }

    fn script_loaded(&self, loaded: LoadedScript) {
        let mut state = self.state.borrow_mut();
        if state.detached {
            return;
        }
        let _ = state.loaded.insert(loaded.id, loaded.source);
    }

    fn execute_scripts_waiting_for_load(&self, host: &mut dyn ScriptHost) {
        self.execute_ready_async_scripts(host);
        self.execute_parsing_blocking_scripts(host);
    }

    fn execute_scripts_waiting_for_resources(&self, host: &mut dyn ScriptHost) {
        self.execute_parsing_blocking_scripts(host);
    }

    /// [§ 13.2.7 The end](https://html.spec.whatwg.org/multipage/parsing.html#the-end)
    ///
    /// "While the list of scripts that will execute when the document has
    /// finished parsing is not empty: Spin the event loop until the first
    /// script in the list ... is ready to be parser-executed ... Execute the
    /// script element ... Remove the first script element from the list"
    fn execute_scripts_waiting_for_parsing(&self, host: &mut dyn ScriptHost) -> bool {
        self.execute_ready_async_scripts(host);
        loop {
            let (id, position, source) = {
                let mut guard = self.state.borrow_mut();
                let state = &mut *guard;
                if state.detached {
                    return false;
                }
                let Some((id, position)) =
                    state.deferred.front().map(|p| (p.element.id, p.position))
                else {
                    return true;
                };
                let Some(source) = state.loaded.remove(&id) else {
                    return false;
                };
                let _ = state.deferred.pop_front();
                (id, position, source)
            };
            self.run(host, id, position, &source);
        }
    }

    fn detach(&self) {
        let mut state = self.state.borrow_mut();
        state.parser_blocking = None;
        state.deferred.clear();
        state.asynchronous.clear();
        state.loaded.clear();
        state.detached = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(source: &str) -> Vec<Statement> {
        let mut parser = StatementParser::new(source);
        std::iter::from_fn(|| parser.next_statement()).collect()
    }

    #[test]
    fn test_write_statements() {
        assert_eq!(
            statements("document.write('<b>'); document.writeln(\"x\", 'y')"),
            vec![
                Statement::Write("<b>".to_string()),
                Statement::Write("xy\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_concatenation_and_escapes() {
        assert_eq!(
            statements(r"document.write('<scr' + 'ipt>a<\/script>\x41B')"),
            vec![Statement::Write("<script>a</script>AB".to_string())]
        );
    }

    #[test]
    fn test_unsupported_statements_are_skipped() {
        assert_eq!(
            statements("var x = f(1;2);\ndocument.write('ok')"),
            vec![
                Statement::Unsupported("var x = f(1;2)".to_string()),
                Statement::Write("ok".to_string()),
            ]
        );
    }

    #[test]
    fn test_write_with_non_literal_argument_is_unsupported() {
        assert_eq!(
            statements("document.write(x)"),
            vec![Statement::Unsupported("document.write(x)".to_string())]
        );
    }

    #[test]
    fn test_empty_and_trivia_only_sources_have_no_statements() {
        assert!(statements("").is_empty());
        assert!(statements(" ;\n// done\n").is_empty());
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            statements("<!--\n// hi\n/* a */ document.write('z')\n-->"),
            vec![Statement::Write("z".to_string())]
        );
    }
}
