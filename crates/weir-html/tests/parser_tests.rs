//! Tests for the parser driver: pumping, pausing for scripts and
//! stylesheets, `document.write()`, yielding and the end of parsing.

use std::cell::RefCell;
use std::rc::Rc;

use weir_html::{
    Collaborators, CollectingPreloader, Document, DocumentBuilder, HtmlDocumentParser,
    LoadedScript, ManualScheduler, NodeId, ParserOptions, ParserState, QueueingScriptRunner,
    ResumeReason, ScriptFetch, ScriptHost, ScriptId, TokenizerMode, WriteScriptEngine,
    render_tree,
};
use weir_input::TextPosition;

struct Harness {
    parser: HtmlDocumentParser,
    document: Rc<RefCell<Document>>,
    runner: Rc<QueueingScriptRunner<WriteScriptEngine>>,
    scheduler: ManualScheduler,
    preloader: CollectingPreloader,
}

impl Harness {
    fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    fn with_options(options: ParserOptions) -> Self {
        let builder = DocumentBuilder::new();
        let document = builder.document();
        let runner = Rc::new(QueueingScriptRunner::new(WriteScriptEngine));
        let scheduler = ManualScheduler::new();
        let preloader = CollectingPreloader::new();
        let collaborators = Collaborators::new(builder)
            .with_script_runner(runner.clone())
            .with_scheduler(scheduler.clone())
            .with_preloader(preloader.clone());
        Self {
            parser: HtmlDocumentParser::new(options, collaborators),
            document,
            runner,
            scheduler,
            preloader,
        }
    }

    /// Element tag names in tree order.
    fn tags(&self) -> Vec<String> {
        let document = self.document.borrow();
        let mut tags = Vec::new();
        collect_tags(&document, NodeId::ROOT, &mut tags);
        tags
    }

    /// Text content of the first element named `tag`.
    fn text_of(&self, tag: &str) -> Option<String> {
        let document = self.document.borrow();
        let id = *document.elements_by_tag_name(tag).first()?;
        Some(document.child_text_content(id))
    }

    fn node_count(&self) -> usize {
        self.document.borrow().len()
    }

    fn render(&self) -> String {
        render_tree(&self.document.borrow(), NodeId::ROOT)
    }

    fn load(&mut self, id: u64, source: &str) {
        self.parser
            .resume(ResumeReason::ScriptLoaded(LoadedScript::new(ScriptId(id), source)));
    }

    fn drain_continuations(&mut self) {
        while let Some(id) = self.scheduler.take_continuation() {
            self.parser.resume(ResumeReason::Continuation(id));
        }
    }
}

fn collect_tags(document: &Document, id: NodeId, tags: &mut Vec<String>) {
    if let Some(element) = document.element(id) {
        tags.push(element.tag_name.clone());
    }
    for child in document.children(id) {
        collect_tags(document, *child, tags);
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn test_starts_detached_and_runs_on_first_append() {
    let mut h = Harness::new();
    assert_eq!(h.parser.state(), ParserState::Detached);
    h.parser.append("<p>");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert!(!h.parser.in_pump_session());
}

#[test]
fn test_whole_document_parses_and_stops() {
    let mut h = Harness::new();
    h.parser.append("<!DOCTYPE html><html><body><p>hi</p></body></html>");
    h.parser.finish();
    assert_eq!(h.parser.state(), ParserState::Stopped);
    assert!(h.document.borrow().is_finished());
    assert_eq!(h.tags(), strings(&["html", "body", "p"]));
    assert_eq!(h.text_of("p").as_deref(), Some("hi"));
}

#[test]
fn test_render_tree_shape() {
    let mut h = Harness::new();
    h.parser.append("<div id=a>x y<!--c--><br></div>");
    h.parser.finish();
    assert_eq!(
        h.render(),
        "#document\n  <div id=\"a\">\n    \"x·y\"\n    <!-- c -->\n    <br>\n"
    );
}

#[test]
fn test_chunked_appends_build_the_same_tree() {
    let html = "<div class=a><p>one</p><script>document.write('<i>w</i>')</script><p>two</p></div>";
    let mut whole = Harness::new();
    whole.parser.append(html);
    whole.parser.finish();

    for split in 1..html.len() {
        let mut h = Harness::new();
        h.parser.append(&html[..split]);
        h.parser.append(&html[split..]);
        h.parser.finish();
        assert_eq!(h.render(), whole.render(), "split at {split}");
    }
}

#[test]
fn test_inline_write_is_parsed_before_following_input() {
    let mut h = Harness::new();
    h.parser
        .append("<div><script>document.write('<span>X</span>')</script>after</div>");
    h.parser.finish();
    assert_eq!(h.tags(), strings(&["div", "script", "span"]));
    assert_eq!(h.text_of("span").as_deref(), Some("X"));
    assert_eq!(h.text_of("div").as_deref(), Some("after"));
    assert_eq!(h.runner.executed(), vec![ScriptId(0)]);
}

#[test]
fn test_nested_writes_run_in_document_order() {
    let mut h = Harness::new();
    h.parser.append(
        r#"<script>document.write('<script>document.write("<i>in</i>")<\/script><u>mid</u>')</script><p>end</p>"#,
    );
    h.parser.finish();
    assert_eq!(h.tags(), strings(&["script", "script", "i", "u", "p"]));
    assert_eq!(h.runner.executed(), vec![ScriptId(0), ScriptId(1)]);
    assert_eq!(h.parser.pump_session_nesting_level(), 0);
    assert_eq!(h.parser.script_nesting_level(), 0);
    assert!(!h.parser.has_insertion_point());
}

#[test]
fn test_unterminated_written_tag_is_completed_by_network_input() {
    let mut h = Harness::new();
    h.parser
        .append("<script>document.write('<em')</script> id=a>t</em>");
    h.parser.finish();
    let document = h.document.borrow();
    let em = document.elements_by_tag_name("em");
    assert_eq!(em.len(), 1);
    assert_eq!(
        document.element(em[0]).and_then(|e| e.attribute("id")),
        Some("a")
    );
    assert_eq!(document.child_text_content(em[0]), "t");
}

#[test]
fn test_written_text_does_not_advance_line_numbers() {
    let mut h = Harness::new();
    h.parser
        .append("<script>document.write('<br>\\n<br>\\n')</script>\n<p>");
    assert_eq!(h.tags(), strings(&["script", "br", "br", "p"]));
    assert_eq!(h.parser.line_number(), 1);
}

#[test]
fn test_external_script_pauses_until_loaded() {
    let mut h = Harness::new();
    h.parser.append("<script src=a.js></script><p>after</p>");
    assert_eq!(h.parser.state(), ParserState::PausedForScript);
    assert!(h.parser.is_waiting_for_scripts());
    assert_eq!(
        h.runner.take_fetch_requests(),
        vec![ScriptFetch {
            id: ScriptId(0),
            url: "a.js".to_string()
        }]
    );
    assert_eq!(h.tags(), strings(&["script"]));

    // Input arriving while paused is queued, not parsed.
    h.parser.append("<p>more</p>");
    assert_eq!(h.tags(), strings(&["script"]));

    h.load(0, "document.write('<b>w</b>')");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["script", "b", "p", "p"]));
    h.parser.finish();
    assert_eq!(h.parser.state(), ParserState::Stopped);
}

#[test]
fn test_executed_scripts_keep_their_source_position() {
    let mut h = Harness::new();
    h.parser
        .append("<script defer src=d.js></script>\n<script src=a.js></script>");
    assert_eq!(h.parser.state(), ParserState::PausedForScript);
    h.load(0, "");
    h.load(1, "");
    h.parser.finish();
    assert_eq!(h.parser.state(), ParserState::Stopped);
    assert_eq!(
        h.runner.executed_at(),
        vec![
            (ScriptId(1), TextPosition::new(1, 17)),
            (ScriptId(0), TextPosition::new(0, 23)),
        ]
    );
}

#[test]
fn test_failed_script_load_resumes_parsing() {
    let mut h = Harness::new();
    h.parser.append("<script src=missing.js></script><p>x</p>");
    h.load(0, "");
    assert_eq!(h.tags(), strings(&["script", "p"]));
    assert_eq!(h.runner.executed(), vec![ScriptId(0)]);
}

#[test]
fn test_load_for_unknown_script_keeps_parser_paused() {
    let mut h = Harness::new();
    h.parser.append("<script src=a.js></script><p>x</p>");
    h.load(7, "document.write('<b>')");
    assert_eq!(h.parser.state(), ParserState::PausedForScript);
    assert!(h.runner.executed().is_empty());
}

#[test]
fn test_written_external_script_pauses_nested_pump() {
    let mut h = Harness::new();
    h.parser.append(
        r"<script>document.write('<script src=b.js><\/script><i>written</i>')</script><p>net</p>",
    );
    assert_eq!(h.parser.state(), ParserState::PausedForScript);
    assert_eq!(h.tags(), strings(&["script", "script"]));
    assert_eq!(h.parser.pump_session_nesting_level(), 0);
    assert_eq!(h.parser.script_nesting_level(), 0);

    h.load(1, "");
    h.parser.finish();
    assert_eq!(h.tags(), strings(&["script", "script", "i", "p"]));
    assert_eq!(h.parser.state(), ParserState::Stopped);
}

#[test]
fn test_finish_while_paused_delays_end() {
    let mut h = Harness::new();
    h.parser.append("<script src=a.js></script><p>x</p>");
    h.parser.finish();
    assert_eq!(h.parser.state(), ParserState::PausedForScript);
    assert!(h.parser.end_was_delayed());
    assert!(!h.document.borrow().is_finished());

    h.load(0, "");
    assert_eq!(h.parser.state(), ParserState::Stopped);
    assert!(h.document.borrow().is_finished());
    assert_eq!(h.tags(), strings(&["script", "p"]));
}

#[test]
fn test_script_at_end_of_input_delays_end() {
    let mut h = Harness::new();
    h.parser.append("<p>x</p><script src=last.js></script>");
    h.parser.finish();
    assert_eq!(h.parser.state(), ParserState::PausedForScript);
    h.load(0, "document.write('<b>tail</b>')");
    assert_eq!(h.parser.state(), ParserState::Stopped);
    assert_eq!(h.tags(), strings(&["p", "script", "b"]));
}

#[test]
fn test_deferred_scripts_run_after_parsing() {
    let mut h = Harness::new();
    h.parser
        .append("<script defer src=d.js></script><p>x</p>");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["script", "p"]));
    h.parser.finish();
    assert_eq!(h.parser.state(), ParserState::Stopping);
    assert!(h.parser.is_stopping());
    assert_eq!(h.runner.pending_deferred(), 1);
    assert!(!h.document.borrow().is_finished());

    // Writes from a deferred script have nowhere to go.
    h.load(0, "document.write('<i>late</i>')");
    assert_eq!(h.parser.state(), ParserState::Stopped);
    assert!(h.document.borrow().is_finished());
    assert_eq!(h.tags(), strings(&["script", "p"]));
    assert_eq!(h.runner.executed(), vec![ScriptId(0)]);
}

#[test]
fn test_async_script_does_not_block() {
    let mut h = Harness::new();
    h.parser.append("<script async src=a.js></script><p>x</p>");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["script", "p"]));

    // Without an insertion point, writes land behind the queued input.
    h.load(0, "document.write('<i>async</i>')");
    assert_eq!(h.tags(), strings(&["script", "p", "i"]));
}

#[test]
fn test_write_without_insertion_point() {
    let mut h = Harness::new();
    h.parser.append("<div>");
    h.parser.document_write("<p>x</p>");
    assert_eq!(h.tags(), strings(&["div", "p"]));
    h.parser.finish();
    let before = h.node_count();
    h.parser.document_write("<p>ignored</p>");
    assert_eq!(h.node_count(), before);
}

#[test]
fn test_text_position_follows_consumption() {
    let mut h = Harness::new();
    h.parser.append("<p>\nab");
    let position = h.parser.text_position();
    assert_eq!(position.line, 1);
    assert_eq!(position.column, 2);
}

#[test]
fn test_yield_posts_continuation() {
    let mut h = Harness::new();
    h.scheduler.set_should_yield(true);
    h.parser.append("<a></a><b></b>");
    assert_eq!(h.node_count(), 2);
    let id = h.parser.pending_continuation();
    assert!(id.is_some());
    assert_eq!(h.scheduler.take_continuation(), id);
    assert_eq!(h.parser.state(), ParserState::Running);

    h.parser.resume(ResumeReason::Continuation(id.unwrap()));
    assert_eq!(h.node_count(), 2);
    h.drain_continuations();
    assert_eq!(h.tags(), strings(&["a", "b"]));
    assert_eq!(h.parser.pending_continuation(), None);
}

#[test]
fn test_stale_continuation_is_ignored() {
    let mut h = Harness::new();
    h.scheduler.set_should_yield(true);
    h.parser.append("<a></a>");
    let stale = h.parser.pending_continuation().unwrap();

    // A pump started by new input supersedes the scheduled one.
    h.parser.append("<b></b>");
    let current = h.parser.pending_continuation().unwrap();
    assert_ne!(stale, current);
    assert_eq!(h.node_count(), 2);

    h.parser.resume(ResumeReason::Continuation(stale));
    assert_eq!(h.node_count(), 2);
    assert_eq!(h.parser.pending_continuation(), Some(current));

    h.parser.resume(ResumeReason::Continuation(current));
    assert_eq!(h.node_count(), 3);
}

#[test]
fn test_finish_waits_for_scheduled_pump() {
    let mut h = Harness::new();
    h.scheduler.set_should_yield(true);
    h.parser.append("<a></a><b></b><c></c>");
    h.parser.finish();
    assert!(h.parser.end_was_delayed());
    assert_eq!(h.parser.state(), ParserState::Running);

    h.drain_continuations();
    assert_eq!(h.parser.state(), ParserState::Stopped);
    assert_eq!(h.tags(), strings(&["a", "b", "c"]));
}

#[test]
fn test_location_change_stops_the_pump() {
    let mut h = Harness::new();
    h.scheduler.set_location_change_pending(true);
    h.parser.append("<a>");
    assert_eq!(h.node_count(), 1);
    h.scheduler.set_location_change_pending(false);
    h.parser.append("<b>");
    assert_eq!(h.tags(), strings(&["a", "b"]));
}

#[test]
fn test_body_stylesheet_pauses_until_loaded() {
    let mut h = Harness::new();
    h.parser
        .append("<body><link rel=stylesheet href=s.css><p>x</p>");
    assert_eq!(h.parser.state(), ParserState::PausedForStylesheet);
    assert!(h.parser.is_waiting_for_stylesheets());
    assert_eq!(h.tags(), strings(&["body", "link"]));

    h.parser.resume(ResumeReason::StylesheetsLoaded);
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["body", "link", "p"]));
}

#[test]
fn test_head_stylesheet_does_not_pause() {
    let mut h = Harness::new();
    h.parser
        .append("<head><link rel=stylesheet href=s.css></head><p>x</p>");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["head", "link", "p"]));
}

#[test]
fn test_body_stylesheet_blocking_can_be_disabled() {
    let mut h =
        Harness::with_options(ParserOptions::default().with_body_stylesheet_blocking(false));
    h.parser
        .append("<body><link rel=stylesheet href=s.css><p>x</p>");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["body", "link", "p"]));
}

#[test]
fn test_pending_stylesheet_pauses_at_next_token() {
    let mut h = Harness::new();
    h.parser.append("<a>");
    h.parser.did_add_pending_stylesheet_in_body();
    h.parser.append("<b>");
    assert_eq!(h.parser.state(), ParserState::PausedForStylesheet);
    assert_eq!(h.tags(), strings(&["a"]));
}

#[test]
fn test_stylesheet_loaded_before_noticed_does_not_pause() {
    let mut h = Harness::new();
    h.parser.append("<a>");
    h.parser.did_add_pending_stylesheet_in_body();
    h.parser.did_load_all_body_stylesheets();
    h.parser.append("<b>");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["a", "b"]));
}

#[test]
fn test_stop_parsing_ignores_later_calls() {
    let mut h = Harness::new();
    h.parser.append("<a>");
    h.parser.stop_parsing();
    assert_eq!(h.parser.state(), ParserState::Stopped);
    h.parser.append("<b>");
    h.parser.resume(ResumeReason::StylesheetsLoaded);
    h.parser.finish();
    assert_eq!(h.tags(), strings(&["a"]));
    assert!(!h.document.borrow().is_finished());
}

#[test]
fn test_detach_releases_and_ignores_callbacks() {
    let mut h = Harness::new();
    h.parser.append("<script src=a.js></script><p>x</p>");
    h.parser.detach();
    assert_eq!(h.parser.state(), ParserState::Detached);
    assert!(h.parser.is_detached());
    assert!(!h.parser.is_paused());

    h.load(0, "document.write('<b>')");
    h.parser.append("<i>");
    h.parser.finish();
    assert!(h.runner.executed().is_empty());
    assert_eq!(h.tags(), strings(&["script"]));
    assert!(!h.document.borrow().is_finished());
}

#[test]
fn test_detach_is_idempotent_and_drops_writes() {
    let mut h = Harness::new();
    h.parser.append("<script>document.write('<b>')</script><p>");
    h.parser.detach();
    h.parser.detach();
    h.parser.document_write("<i>");
    assert_eq!(h.tags(), strings(&["script", "b", "p"]));
    assert_eq!(h.parser.state(), ParserState::Detached);
}

#[test]
fn test_preloads_match_unpaused_parse() {
    let html = "<script src=a.js></script><img src=x.png><link rel=stylesheet href=s.css>";

    let mut paused = Harness::new();
    paused.parser.append(html);
    assert_eq!(paused.parser.state(), ParserState::PausedForScript);
    let mut while_paused = paused.preloader.fetched_urls();
    while_paused.sort();
    assert_eq!(while_paused, strings(&["a.js", "s.css", "x.png"]));

    paused.load(0, "");
    paused.parser.finish();
    let mut after = paused.preloader.fetched_urls();
    after.sort();

    let mut unpaused = Harness::with_options(ParserOptions::default().with_scripting(false));
    unpaused.parser.append(html);
    unpaused.parser.finish();
    let mut expected = unpaused.preloader.fetched_urls();
    expected.sort();

    assert_eq!(after, expected);
}

#[test]
fn test_speculative_preload_can_be_disabled() {
    let mut h = Harness::with_options(ParserOptions::default().with_speculative_preload(false));
    h.parser.append("<script src=a.js></script><img src=x.png>");
    assert_eq!(h.preloader.fetched_urls(), strings(&["a.js"]));
    h.load(0, "");
    assert_eq!(h.preloader.fetched_urls(), strings(&["a.js", "x.png"]));
}

#[test]
fn test_preloads_found_in_text_appended_while_paused() {
    let mut h = Harness::new();
    h.parser.append("<script src=a.js></script><img sr");
    h.parser.append("c=late.png>");
    assert_eq!(h.preloader.fetched_urls(), strings(&["a.js", "late.png"]));
}

#[test]
fn test_preload_scanning_can_be_disabled() {
    let mut h = Harness::with_options(ParserOptions::default().with_preload_scanning(false));
    h.parser.append("<img src=x.png>");
    h.parser.finish();
    assert!(h.preloader.fetched_urls().is_empty());
}

#[test]
fn test_scripting_disabled_drops_scripts() {
    let mut h = Harness::with_options(ParserOptions::default().with_scripting(false));
    h.parser
        .append("<script src=a.js></script><script>document.write('<b>')</script><p>x</p>");
    assert_eq!(h.parser.state(), ParserState::Running);
    assert_eq!(h.tags(), strings(&["script", "script", "p"]));
    assert!(h.runner.take_fetch_requests().is_empty());
}

#[test]
fn test_plaintext_document() {
    let mut h = Harness::with_options(ParserOptions::default().with_plaintext(true));
    assert_eq!(h.parser.tokenizer_mode(), TokenizerMode::Plaintext);
    h.parser.append("<p>x</p>");
    h.parser.finish();
    assert!(h.tags().is_empty());
    let document = h.document.borrow();
    assert_eq!(document.child_text_content(NodeId::ROOT), "<p>x</p>");
}

#[test]
fn test_append_bytes_decodes_split_utf8() {
    let mut h = Harness::new();
    let bytes = "<p>é€</p>".as_bytes();
    h.parser.append_bytes(&bytes[..4]);
    h.parser.append_bytes(&bytes[4..7]);
    h.parser.append_bytes(&bytes[7..]);
    h.parser.finish();
    assert_eq!(h.text_of("p").as_deref(), Some("é€"));
}

#[test]
fn test_truncated_utf8_at_end_becomes_replacement_character() {
    let mut h = Harness::new();
    h.parser.append_bytes(b"<p>a\xE2\x82");
    h.parser.finish();
    assert_eq!(h.text_of("p").as_deref(), Some("a\u{FFFD}"));
}
