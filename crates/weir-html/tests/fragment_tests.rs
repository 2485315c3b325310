//! Tests for fragment parsing.

use weir_html::{
    Collaborators, DocumentBuilder, HtmlDocumentParser, ManualScheduler, NodeId, ParserOptions,
    TokenizerMode, render_tree, tokenizer_mode_for_context,
};

fn parse(source: &str, context: Option<&str>) -> String {
    let builder = DocumentBuilder::fragment();
    let document = builder.document();
    HtmlDocumentParser::parse_fragment(
        source,
        context,
        ParserOptions::default(),
        Collaborators::new(builder),
    );
    let document = document.borrow();
    assert!(document.is_finished());
    render_tree(&document, NodeId::ROOT)
}

#[test]
fn test_fragment_without_context() {
    assert_eq!(
        parse("<b>x</b>", None),
        "#document-fragment\n  <b>\n    \"x\"\n"
    );
}

#[test]
fn test_fragment_in_raw_text_contexts() {
    let expected = "#document-fragment\n  \"<b>x</b>\"\n";
    assert_eq!(parse("<b>x</b>", Some("textarea")), expected);
    assert_eq!(parse("<b>x</b>", Some("STYLE")), expected);
    assert_eq!(parse("<b>x</b>", Some("script")), expected);
    assert_eq!(parse("<b>x</b>", Some("plaintext")), expected);
}

#[test]
fn test_fragment_in_ordinary_context() {
    assert_eq!(
        parse("<b>x</b>", Some("div")),
        "#document-fragment\n  <b>\n    \"x\"\n"
    );
}

#[test]
fn test_fragment_scripts_do_not_run() {
    let builder = DocumentBuilder::fragment();
    let document = builder.document();
    HtmlDocumentParser::parse_fragment(
        "<script>document.write('<i>')</script><p>",
        None,
        ParserOptions::default(),
        Collaborators::new(builder),
    );
    let document = document.borrow();
    assert!(document.elements_by_tag_name("i").is_empty());
    assert_eq!(document.elements_by_tag_name("p").len(), 1);
}

#[test]
fn test_fragment_ignores_pending_navigation() {
    let scheduler = ManualScheduler::new();
    scheduler.set_location_change_pending(true);
    let builder = DocumentBuilder::fragment();
    let document = builder.document();
    HtmlDocumentParser::parse_fragment(
        "<p>x</p>",
        None,
        ParserOptions::default(),
        Collaborators::new(builder).with_scheduler(scheduler),
    );
    assert_eq!(document.borrow().elements_by_tag_name("p").len(), 1);
}

#[test]
fn test_context_modes() {
    let scripting = ParserOptions::default();
    let no_scripting = scripting.with_scripting(false);
    assert_eq!(tokenizer_mode_for_context(None, &scripting), TokenizerMode::Data);
    assert_eq!(
        tokenizer_mode_for_context(Some("title"), &scripting),
        TokenizerMode::Rcdata
    );
    assert_eq!(
        tokenizer_mode_for_context(Some("xmp"), &scripting),
        TokenizerMode::Rawtext
    );
    assert_eq!(
        tokenizer_mode_for_context(Some("noscript"), &scripting),
        TokenizerMode::Rawtext
    );
    assert_eq!(
        tokenizer_mode_for_context(Some("noscript"), &no_scripting),
        TokenizerMode::Data
    );
    assert_eq!(
        tokenizer_mode_for_context(Some("script"), &scripting),
        TokenizerMode::ScriptData
    );
    assert_eq!(
        tokenizer_mode_for_context(Some("span"), &scripting),
        TokenizerMode::Data
    );
}
