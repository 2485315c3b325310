use super::driver::{Collaborators, HtmlDocumentParser};
use crate::collaborators::TokenizerMode;
use crate::options::ParserOptions;

/// [§ 13.4 Parsing HTML fragments](https://html.spec.whatwg.org/multipage/parsing.html#parsing-html-fragments)
///
/// "Set the state of the HTML parser's tokenization stage as follows,
/// switching on the context element"
#[must_use]
pub fn tokenizer_mode_for_context(context_tag: Option<&str>, options: &ParserOptions) -> TokenizerMode {
    let Some(tag) = context_tag else {
        return TokenizerMode::Data;
    };
    match tag.to_ascii_lowercase().as_str() {
        // "title, textarea - Switch the tokenizer to the RCDATA state."
        "title" | "textarea" => TokenizerMode::Rcdata,
        // "style, xmp, iframe, noembed, noframes - Switch the tokenizer to
        // the RAWTEXT state."
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => TokenizerMode::Rawtext,
        // "script - Switch the tokenizer to the script data state."
        "script" => TokenizerMode::ScriptData,
        // "noscript - If the scripting flag is enabled, switch the tokenizer
        // to the RAWTEXT state. Otherwise, leave the tokenizer in the data
        // state."
        "noscript" if options.scripting_enabled => TokenizerMode::Rawtext,
        // "plaintext - Switch the tokenizer to the PLAINTEXT state."
        "plaintext" => TokenizerMode::Plaintext,
        // "Any other element - Leave the tokenizer in the data state."
        _ => TokenizerMode::Data,
    }
}

impl HtmlDocumentParser {
    /// [§ 13.4 Parsing HTML fragments](https://html.spec.whatwg.org/multipage/parsing.html#parsing-html-fragments)
    ///
    /// Parse `source` as the content of an element named `context_tag`
    /// (or of nothing), all at once. Fragments never run scripts or
    /// preload, so the script runner and preload scanner are dropped.
    pub fn parse_fragment(
        source: &str,
        context_tag: Option<&str>,
        options: ParserOptions,
        collaborators: Collaborators,
    ) {
        let collaborators = Collaborators {
            script_runner: None,
            preload_scanner: None,
            ..collaborators
        };
        let options = options.with_plaintext(false);
        let mut parser = Self::new(options, collaborators);
        let mode = tokenizer_mode_for_context(context_tag, &parser.options);
        parser.tokenizer.set_mode(mode);
        parser.append(source);
        parser.finish();
        parser.detach();
    }
}
