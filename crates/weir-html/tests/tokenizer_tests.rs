//! Tests for the streaming HTML tokenizer.

use quickcheck_macros::quickcheck;
use weir_html::{Attribute, HtmlTokenizer, Token, Tokenizer, TokenizerMode};
use weir_input::SegmentedBuffer;

/// Join adjacent character tokens: how a run of text is split depends on
/// where the input ran out.
fn merge_text(tokens: Vec<Token>) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::new();
    for token in tokens {
        if let Token::Character { data } = &token
            && let Some(Token::Character { data: previous }) = merged.last_mut()
        {
            previous.push_str(data);
            continue;
        }
        merged.push(token);
    }
    merged
}

fn tokenize_chunks(chunks: &[&str]) -> Vec<Token> {
    let mut tokenizer = HtmlTokenizer::new();
    let mut input = SegmentedBuffer::new();
    let mut tokens = Vec::new();
    for chunk in chunks {
        input.append(chunk, false);
        while let Some(token) = tokenizer.next_token(&mut input) {
            tokens.push(token);
        }
    }
    input.close();
    while let Some(token) = tokenizer.next_token(&mut input) {
        tokens.push(token);
    }
    merge_text(tokens)
}

fn tokenize(html: &str) -> Vec<Token> {
    tokenize_chunks(&[html])
}

fn start(name: &str, attributes: &[(&str, &str)]) -> Token {
    Token::StartTag {
        name: name.to_string(),
        self_closing: false,
        attributes: attributes
            .iter()
            .map(|(name, value)| Attribute::new(*name, *value))
            .collect(),
    }
}

fn text(data: &str) -> Token {
    Token::character(data)
}

fn doctype(name: Option<&str>, force_quirks: bool) -> Token {
    Token::Doctype {
        name: name.map(str::to_string),
        public_identifier: None,
        system_identifier: None,
        force_quirks,
    }
}

#[test]
fn test_basic_document() {
    assert_eq!(
        tokenize("<!DOCTYPE html><p class=\"a\" id='b' hidden>Hi</p><!-- c -->"),
        vec![
            doctype(Some("html"), false),
            start("p", &[("class", "a"), ("id", "b"), ("hidden", "")]),
            text("Hi"),
            Token::end_tag("p"),
            Token::Comment {
                data: " c ".to_string()
            },
            Token::EndOfFile,
        ]
    );
}

#[test]
fn test_names_are_lowercased() {
    assert_eq!(
        tokenize("<DIV ID=X></DIV>"),
        vec![
            start("div", &[("id", "X")]),
            Token::end_tag("div"),
            Token::EndOfFile
        ]
    );
}

#[test]
fn test_duplicate_attribute_keeps_first() {
    assert_eq!(
        tokenize("<a href=1 href=2>"),
        vec![start("a", &[("href", "1")]), Token::EndOfFile]
    );
}

#[test]
fn test_self_closing_flag() {
    let tokens = tokenize("<br/>");
    assert!(matches!(
        &tokens[0],
        Token::StartTag { name, self_closing: true, .. } if name == "br"
    ));
}

#[test]
fn test_script_data_ends_only_at_script_end_tag() {
    assert_eq!(
        tokenize("<script>if (a<b) x='</scr';</script>"),
        vec![
            start("script", &[]),
            text("if (a<b) x='</scr';"),
            Token::end_tag("script"),
            Token::EndOfFile,
        ]
    );
}

#[test]
fn test_end_tag_split_across_chunks() {
    assert_eq!(
        tokenize_chunks(&["<script>x</scr", "ipt>y"]),
        vec![
            start("script", &[]),
            text("x"),
            Token::end_tag("script"),
            text("y"),
            Token::EndOfFile,
        ]
    );
}

#[test]
fn test_end_tag_name_complete_but_delimiter_pending() {
    assert_eq!(
        tokenize_chunks(&["<style>a</style", ">b"]),
        vec![
            start("style", &[]),
            text("a"),
            Token::end_tag("style"),
            text("b"),
            Token::EndOfFile,
        ]
    );
}

#[test]
fn test_longer_name_is_not_an_end_tag() {
    assert_eq!(
        tokenize("<title>a</titlex</title>"),
        vec![
            start("title", &[]),
            text("a</titlex"),
            Token::end_tag("title"),
            Token::EndOfFile,
        ]
    );
}

#[test]
fn test_rcdata_end_tag_is_case_insensitive() {
    assert_eq!(
        tokenize("<TEXTAREA><b>x</TextArea>"),
        vec![
            start("textarea", &[]),
            text("<b>x"),
            Token::end_tag("textarea"),
            Token::EndOfFile,
        ]
    );
}

#[test]
fn test_plaintext_never_ends() {
    assert_eq!(
        tokenize("<plaintext><b>x</plaintext>"),
        vec![
            start("plaintext", &[]),
            text("<b>x</plaintext>"),
            Token::EndOfFile
        ]
    );
}

#[test]
fn test_set_mode_switches_content_model() {
    let mut tokenizer = HtmlTokenizer::new();
    tokenizer.set_mode(TokenizerMode::Rawtext);
    let mut input = SegmentedBuffer::from_text("<b>x</b>");
    input.close();
    assert_eq!(tokenizer.next_token(&mut input), Some(text("<b>x</b>")));
    assert_eq!(tokenizer.next_token(&mut input), Some(Token::EndOfFile));
    assert_eq!(tokenizer.next_token(&mut input), None);
}

#[test]
fn test_eof_inside_markup() {
    assert_eq!(tokenize("a<"), vec![text("a<"), Token::EndOfFile]);
    assert_eq!(tokenize("</"), vec![text("</"), Token::EndOfFile]);
    assert_eq!(tokenize("x<div class="), vec![text("x"), Token::EndOfFile]);
    assert_eq!(
        tokenize("<!--x"),
        vec![
            Token::Comment {
                data: "x".to_string()
            },
            Token::EndOfFile
        ]
    );
    assert_eq!(
        tokenize("<!DOCTYPE"),
        vec![doctype(None, true), Token::EndOfFile]
    );
}

#[test]
fn test_empty_end_tag_is_dropped() {
    assert_eq!(tokenize("a</>b"), vec![text("ab"), Token::EndOfFile]);
}

#[test]
fn test_comment_variants() {
    let comment = |data: &str| Token::Comment {
        data: data.to_string(),
    };
    assert_eq!(tokenize("<!-->"), vec![comment(""), Token::EndOfFile]);
    assert_eq!(tokenize("<!---->"), vec![comment(""), Token::EndOfFile]);
    assert_eq!(tokenize("<!--a--b-->"), vec![comment("a--b"), Token::EndOfFile]);
    assert_eq!(tokenize("<?xml?>"), vec![comment("?xml?"), Token::EndOfFile]);
}

#[test]
fn test_doctype_identifiers_are_skipped() {
    assert_eq!(
        tokenize("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\">"),
        vec![doctype(Some("html"), false), Token::EndOfFile]
    );
}

#[test]
fn test_newlines_are_normalized() {
    assert_eq!(tokenize("a\r\nb\rc"), vec![text("a\nb\nc"), Token::EndOfFile]);
}

#[test]
fn test_markup_declaration_split_across_chunks() {
    assert_eq!(
        tokenize_chunks(&["<!", "-", "-x-->"]),
        vec![
            Token::Comment {
                data: "x".to_string()
            },
            Token::EndOfFile
        ]
    );
    assert_eq!(
        tokenize_chunks(&["<!DOC", "TYPE html>"]),
        vec![doctype(Some("html"), false), Token::EndOfFile]
    );
}

#[test]
fn test_text_before_partial_tag_is_delivered_early() {
    let mut tokenizer = HtmlTokenizer::new();
    let mut input = SegmentedBuffer::from_text("hello <sp");
    assert_eq!(tokenizer.next_token(&mut input), Some(text("hello ")));
    assert_eq!(tokenizer.next_token(&mut input), None);
}

const CORPUS: [&str; 4] = [
    "<!DOCTYPE html>\r\n<html><head><title>A &amp; B</title><style>p>a{}</style></head>",
    "<body class=\"x y\"><p id=one>Hello<br/>world</p><!-- note --><script>var a = 1 < 2;</script>",
    "<textarea>\n<b>not bold</b></textarea><img src='i.png' alt=\"\"><a href=x>link</a>",
    "<div\nclass=wrapped>text</div><?pi?><plaintext>rest </plaintext>",
];

fn chunk(text: &str, sizes: &[u8]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut sizes = sizes.iter().cycle();
    while start < chars.len() {
        let size = sizes.next().map_or(chars.len(), |s| usize::from(*s % 9) + 1);
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }
    chunks
}

#[quickcheck]
fn chunking_does_not_change_tokens(document: u8, sizes: Vec<u8>) -> bool {
    let html = CORPUS[usize::from(document) % CORPUS.len()];
    let chunks = chunk(html, &sizes);
    let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
    tokenize_chunks(&chunk_refs) == tokenize(html)
}
