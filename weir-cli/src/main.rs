//! Weir CLI - stream a document through the parser driver
//!
//! The document is read in network-sized chunks and appended as bytes, so
//! tags, UTF-8 sequences and `</script>` end tags are split the way a slow
//! connection would split them. External scripts are fetched between
//! chunks and handed back to the parser; body stylesheets are treated as
//! loaded immediately.

use std::io::Read;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;
use weir_common::{DocumentSource, warn_once};
use weir_html::{
    Collaborators, CollectingPreloader, Document, DocumentBuilder, HtmlDocumentParser,
    HtmlTokenizer, LoadedScript, NodeId, ParserOptions, ParserState, PreloadRequest,
    QueueingScriptRunner, ResumeReason, ScriptId, TokenBudgetScheduler, Tokenizer,
    WriteScriptEngine, print_tree, tokenizer_mode_for_context,
};
use weir_input::SegmentedBuffer;

/// Weir - streaming HTML parser driver inspector
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
#[command(name = "weir")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Parse a file and print the tree
    weir ./index.html

    # Deliver the page three bytes at a time, yielding every 4 tokens
    weir --chunk-size 3 --yield-every 4 https://example.com

    # Show the token stream
    weir --tokens --html '<p class=a>Hi</p>'

    # Parse inline markup that writes into the document
    weir --html "<script>document.write('<b>hi</b>')</script>"

    # Parse a fragment as the contents of a <textarea>
    weir --fragment textarea --html '<b>raw</b>'
"#)]
struct Cli {
    /// Path to an HTML file, or an http(s) or data: URL
    #[arg(value_name = "FILE|URL")]
    path: Option<String>,

    /// Parse HTML string directly instead of file/URL
    #[arg(long, value_name = "HTML")]
    html: Option<String>,

    /// Bytes handed to the parser per append
    #[arg(long, default_value = "512", value_parser = clap::value_parser!(u16).range(1..))]
    chunk_size: u16,

    /// Yield to the embedder after this many tokens (0 never yields)
    #[arg(long, default_value = "0")]
    yield_every: usize,

    /// Disable scripting: script elements are inserted but never run
    #[arg(long)]
    no_scripts: bool,

    /// Disable preload scanning
    #[arg(long)]
    no_preload: bool,

    /// Treat the document as text/plain
    #[arg(long)]
    plaintext: bool,

    /// Parse as a fragment in the context of this element
    #[arg(long, value_name = "TAG")]
    fragment: Option<String>,

    /// Print the token stream instead of parsing
    #[arg(short = 't', long)]
    tokens: bool,

    /// Print the result as JSON
    #[arg(short = 'j', long)]
    json: bool,
}

impl Cli {
    fn source(&self) -> Result<DocumentSource> {
        if let Some(html) = &self.html {
            return Ok(DocumentSource::Inline(html.clone()));
        }
        let Some(path) = &self.path else {
            anyhow::bail!("no input: pass a file path, URL, or --html");
        };
        Ok(DocumentSource::from_location(path)?)
    }

    const fn options(&self) -> ParserOptions {
        ParserOptions {
            scripting_enabled: !self.no_scripts,
            preload_scanning: !self.no_preload,
            speculative_preload: !self.no_preload,
            plaintext: self.plaintext,
            block_on_body_stylesheets: true,
        }
    }
}

/// Everything printed after a parse.
#[derive(Serialize)]
struct Report<'a> {
    state: ParserState,
    document: &'a Document,
    preloads: Vec<PreloadRequest>,
    executed_scripts: Vec<ScriptId>,
    continuations: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let source = cli.source()?;
    let reader = source
        .open()
        .with_context(|| format!("opening {}", source.describe()))?;

    if cli.tokens {
        return print_tokens(reader, &cli);
    }
    if let Some(context) = &cli.fragment {
        return parse_fragment(reader, context, &cli);
    }
    parse_document(reader, &source, &cli)
}

/// Read the whole source as text, replacing malformed UTF-8.
fn read_text(mut reader: Box<dyn Read>) -> Result<String> {
    let mut bytes = Vec::new();
    let _ = reader.read_to_end(&mut bytes).context("reading input")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn print_tokens(reader: Box<dyn Read>, cli: &Cli) -> Result<()> {
    let text = read_text(reader)?;
    let mut tokenizer = HtmlTokenizer::new().with_scripting(!cli.no_scripts);
    if let Some(context) = &cli.fragment {
        tokenizer.set_mode(tokenizer_mode_for_context(Some(context), &cli.options()));
    }
    let mut input = SegmentedBuffer::from_text(&text);
    input.close();

    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token(&mut input) {
        tokens.push(token);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
        return Ok(());
    }
    println!("{}", format!("=== HTML Tokens ({}) ===", tokens.len()).bold());
    for (i, token) in tokens.iter().enumerate() {
        println!("  {i:3}: {token}");
    }
    Ok(())
}

fn parse_fragment(reader: Box<dyn Read>, context: &str, cli: &Cli) -> Result<()> {
    let text = read_text(reader)?;
    let builder = DocumentBuilder::fragment();
    let document = builder.document();
    HtmlDocumentParser::parse_fragment(
        &text,
        Some(context),
        cli.options(),
        Collaborators::new(builder),
    );

    let document = document.borrow();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&*document)?);
    } else {
        println!("{}", format!("=== Fragment (context <{context}>) ===").bold());
        print_tree(&document, NodeId::ROOT);
    }
    Ok(())
}

/// The embedder side of the parser: answers continuations, script fetches
/// and stylesheet pauses until the parser needs nothing more.
struct Embedder<'a> {
    base: &'a DocumentSource,
    runner: &'a QueueingScriptRunner<WriteScriptEngine>,
    scheduler: &'a TokenBudgetScheduler,
    continuations: usize,
}

impl Embedder<'_> {
    fn settle(&mut self, parser: &mut HtmlDocumentParser) {
        loop {
            if let Some(id) = self.scheduler.take_continuation() {
                self.continuations += 1;
                parser.resume(ResumeReason::Continuation(id));
                continue;
            }
            if parser.is_waiting_for_stylesheets() && !parser.is_stopped() {
                parser.resume(ResumeReason::StylesheetsLoaded);
                continue;
            }
            let fetches = self.runner.take_fetch_requests();
            if fetches.is_empty() {
                return;
            }
            for fetch in fetches {
                let source = self.fetch_script(&fetch.url);
                parser.resume(ResumeReason::ScriptLoaded(LoadedScript::new(fetch.id, source)));
            }
        }
    }

    /// Fetch a script's source. A failed fetch yields an empty script so
    /// the parser still resumes.
    fn fetch_script(&self, src: &str) -> String {
        let location = resolve(self.base, src);
        let result = DocumentSource::from_location(&location)
            .map_err(anyhow::Error::from)
            .and_then(|source| read_text(source.open()?));
        result.unwrap_or_else(|error| {
            warn_once("CLI", &format!("could not load script {location}: {error}"));
            String::new()
        })
    }
}

/// Resolve a script `src` against the document's location.
fn resolve(base: &DocumentSource, src: &str) -> String {
    if src.contains("://") || src.starts_with("data:") {
        return src.to_string();
    }
    match base {
        DocumentSource::File(path) => path
            .parent()
            .map_or_else(|| src.to_string(), |dir| dir.join(src).display().to_string()),
        DocumentSource::Url(url) => {
            let authority_start = url.find("://").map_or(0, |i| i + 3);
            let origin_end = url[authority_start..]
                .find('/')
                .map_or(url.len(), |i| authority_start + i);
            if src.starts_with('/') {
                format!("{}{src}", &url[..origin_end])
            } else {
                let directory_end = url.rfind('/').filter(|i| *i >= origin_end);
                match directory_end {
                    Some(end) => format!("{}{src}", &url[..=end]),
                    None => format!("{url}/{src}"),
                }
            }
        }
        DocumentSource::Data(_) | DocumentSource::Inline(_) => src.to_string(),
    }
}

fn parse_document(mut reader: Box<dyn Read>, source: &DocumentSource, cli: &Cli) -> Result<()> {
    let builder = DocumentBuilder::new();
    let document = builder.document();
    let runner = Rc::new(QueueingScriptRunner::new(WriteScriptEngine));
    let scheduler = TokenBudgetScheduler::new(cli.yield_every);
    let preloader = CollectingPreloader::new();
    let mut parser = HtmlDocumentParser::new(
        cli.options(),
        Collaborators::new(builder)
            .with_script_runner(runner.clone())
            .with_scheduler(scheduler.clone())
            .with_preloader(preloader.clone()),
    );
    let mut embedder = Embedder {
        base: source,
        runner: &runner,
        scheduler: &scheduler,
        continuations: 0,
    };

    let mut chunk = vec![0; usize::from(cli.chunk_size)];
    loop {
        let read = reader.read(&mut chunk).context("reading input")?;
        if read == 0 {
            break;
        }
        parser.append_bytes(&chunk[..read]);
        embedder.settle(&mut parser);
    }
    parser.finish();
    embedder.settle(&mut parser);

    let document = document.borrow();
    let report = Report {
        state: parser.state(),
        document: &document,
        preloads: preloader.fetched(),
        executed_scripts: runner.executed(),
        continuations: embedder.continuations,
    };
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, source);
    }
    Ok(())
}

fn print_report(report: &Report<'_>, source: &DocumentSource) {
    println!("{}", format!("=== DOM Tree ({}) ===", source.describe()).bold());
    print_tree(report.document, NodeId::ROOT);

    println!("\n{}", format!("=== Preloads ({}) ===", report.preloads.len()).bold());
    for request in &report.preloads {
        println!("  {} {}", request.kind.cyan(), request.url);
    }

    println!(
        "\n{}",
        format!("=== Scripts executed ({}) ===", report.executed_scripts.len()).bold()
    );
    for id in &report.executed_scripts {
        println!("  {id}");
    }

    println!("\n{}", "=== Parser ===".bold());
    let state = report.state.to_string();
    if report.state == ParserState::Stopped {
        println!("  state: {}", state.green());
    } else {
        println!("  state: {}", state.yellow());
    }
    println!("  continuations: {}", report.continuations);
}
