//! Parser configuration.

/// Switches that change how [`HtmlDocumentParser`](crate::HtmlDocumentParser)
/// treats its input and collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ParserOptions {
    /// [§ 8.1.3 Enabling and disabling scripting](https://html.spec.whatwg.org/multipage/webappapis.html#concept-n-script)
    ///
    /// When off, no script runner is attached and script elements are
    /// dropped as the tree builder hands them over.
    pub scripting_enabled: bool,
    /// Scan tokens for resources to fetch early.
    pub preload_scanning: bool,
    /// While paused, tokenize the unparsed remainder with a separate scanner.
    pub speculative_preload: bool,
    /// Tokenize the whole document as PLAINTEXT, as for `text/plain`.
    pub plaintext: bool,
    /// Pause for stylesheets inserted into the body.
    pub block_on_body_stylesheets: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            scripting_enabled: true,
            preload_scanning: true,
            speculative_preload: true,
            plaintext: false,
            block_on_body_stylesheets: true,
        }
    }
}

impl ParserOptions {
    /// Enable or disable scripting.
    #[must_use]
    pub const fn with_scripting(mut self, enabled: bool) -> Self {
        self.scripting_enabled = enabled;
        self
    }

    /// Enable or disable preload scanning altogether.
    #[must_use]
    pub const fn with_preload_scanning(mut self, enabled: bool) -> Self {
        self.preload_scanning = enabled;
        self
    }

    /// Enable or disable scanning ahead of a paused parser.
    #[must_use]
    pub const fn with_speculative_preload(mut self, enabled: bool) -> Self {
        self.speculative_preload = enabled;
        self
    }

    /// Treat the document as plain text.
    #[must_use]
    pub const fn with_plaintext(mut self, plaintext: bool) -> Self {
        self.plaintext = plaintext;
        self
    }

    /// Pause (or not) for stylesheets inserted into the body.
    #[must_use]
    pub const fn with_body_stylesheet_blocking(mut self, blocking: bool) -> Self {
        self.block_on_body_stylesheets = blocking;
        self
    }
}
