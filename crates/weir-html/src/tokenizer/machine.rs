//! [§ 13.2.5 Tokenization](https://html.spec.whatwg.org/multipage/parsing.html#tokenization)
//!
//! A resumable tokenizer: each call to [`HtmlTokenizer::next_token`]
//! consumes input until one token is complete or the input runs dry. A
//! partially consumed tag, comment or DOCTYPE stays inside the tokenizer
//! until more input arrives. Text is buffered and delivered as one
//! `Character` token per run, or as whatever part of the run is available
//! when the input runs out.

use strum_macros::Display;
use weir_common::warn_once;
use weir_input::{CaseSensitivity, LookAheadResult, PrependKind, SegmentedBuffer};

use super::token::Token;
use crate::collaborators::{Tokenizer, TokenizerMode};

/// The tokenizer states implemented here.
///
/// Character reference, script data escape and comment `<!` states are not
/// modelled; their input is treated as ordinary text of the enclosing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenizerState {
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
    /// [§ 13.2.5.6 Tag open state](https://html.spec.whatwg.org/multipage/parsing.html#tag-open-state)
    TagOpen,
    /// [§ 13.2.5.7 End tag open state](https://html.spec.whatwg.org/multipage/parsing.html#end-tag-open-state)
    EndTagOpen,
    /// [§ 13.2.5.8 Tag name state](https://html.spec.whatwg.org/multipage/parsing.html#tag-name-state)
    TagName,
    /// [§ 13.2.5.32 Before attribute name state](https://html.spec.whatwg.org/multipage/parsing.html#before-attribute-name-state)
    BeforeAttributeName,
    /// [§ 13.2.5.33 Attribute name state](https://html.spec.whatwg.org/multipage/parsing.html#attribute-name-state)
    AttributeName,
    /// [§ 13.2.5.34 After attribute name state](https://html.spec.whatwg.org/multipage/parsing.html#after-attribute-name-state)
    AfterAttributeName,
    /// [§ 13.2.5.35 Before attribute value state](https://html.spec.whatwg.org/multipage/parsing.html#before-attribute-value-state)
    BeforeAttributeValue,
    /// [§ 13.2.5.36 Attribute value (double-quoted) state](https://html.spec.whatwg.org/multipage/parsing.html#attribute-value-(double-quoted)-state)
    AttributeValueDoubleQuoted,
    /// [§ 13.2.5.37 Attribute value (single-quoted) state](https://html.spec.whatwg.org/multipage/parsing.html#attribute-value-(single-quoted)-state)
    AttributeValueSingleQuoted,
    /// [§ 13.2.5.38 Attribute value (unquoted) state](https://html.spec.whatwg.org/multipage/parsing.html#attribute-value-(unquoted)-state)
    AttributeValueUnquoted,
    /// [§ 13.2.5.39 After attribute value (quoted) state](https://html.spec.whatwg.org/multipage/parsing.html#after-attribute-value-(quoted)-state)
    AfterAttributeValueQuoted,
    /// [§ 13.2.5.40 Self-closing start tag state](https://html.spec.whatwg.org/multipage/parsing.html#self-closing-start-tag-state)
    SelfClosingStartTag,
    /// [§ 13.2.5.41 Bogus comment state](https://html.spec.whatwg.org/multipage/parsing.html#bogus-comment-state)
    BogusComment,
    /// [§ 13.2.5.42 Markup declaration open state](https://html.spec.whatwg.org/multipage/parsing.html#markup-declaration-open-state)
    MarkupDeclarationOpen,
    /// [§ 13.2.5.43 Comment start state](https://html.spec.whatwg.org/multipage/parsing.html#comment-start-state)
    CommentStart,
    /// [§ 13.2.5.44 Comment start dash state](https://html.spec.whatwg.org/multipage/parsing.html#comment-start-dash-state)
    CommentStartDash,
    /// [§ 13.2.5.45 Comment state](https://html.spec.whatwg.org/multipage/parsing.html#comment-state)
    Comment,
    /// [§ 13.2.5.50 Comment end dash state](https://html.spec.whatwg.org/multipage/parsing.html#comment-end-dash-state)
    CommentEndDash,
    /// [§ 13.2.5.51 Comment end state](https://html.spec.whatwg.org/multipage/parsing.html#comment-end-state)
    CommentEnd,
    /// [§ 13.2.5.53 DOCTYPE state](https://html.spec.whatwg.org/multipage/parsing.html#doctype-state)
    Doctype,
    /// [§ 13.2.5.54 Before DOCTYPE name state](https://html.spec.whatwg.org/multipage/parsing.html#before-doctype-name-state)
    BeforeDoctypeName,
    /// [§ 13.2.5.55 DOCTYPE name state](https://html.spec.whatwg.org/multipage/parsing.html#doctype-name-state)
    DoctypeName,
    /// [§ 13.2.5.56 After DOCTYPE name state](https://html.spec.whatwg.org/multipage/parsing.html#after-doctype-name-state)
    AfterDoctypeName,
    /// [§ 13.2.5.67 Bogus DOCTYPE state](https://html.spec.whatwg.org/multipage/parsing.html#bogus-doctype-state)
    BogusDoctype,
}

/// What one step of the state machine produced.
enum Step {
    /// Keep going.
    Continue,
    /// A token is complete.
    Emit(Token),
    /// Input ran dry in the middle of something.
    Suspend,
}

/// "U+0009 CHARACTER TABULATION, U+000A LINE FEED, U+000C FORM FEED, U+0020 SPACE"
const fn is_html_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\u{000C}' | ' ')
}

const fn text_state(mode: TokenizerMode) -> TokenizerState {
    match mode {
        TokenizerMode::Data => TokenizerState::Data,
        TokenizerMode::Rcdata => TokenizerState::Rcdata,
        TokenizerMode::Rawtext => TokenizerState::Rawtext,
        TokenizerMode::ScriptData => TokenizerState::ScriptData,
        TokenizerMode::Plaintext => TokenizerState::Plaintext,
    }
}

/// [§ 13.2.6.4.7 The "in body" insertion mode](https://html.spec.whatwg.org/multipage/parsing.html#parsing-main-inbody)
///
/// The content model a start tag switches the tokenizer to. Tree
/// construction normally makes this switch; the tokenizer makes it itself
/// so that it can run ahead of any tree builder.
fn mode_after_start_tag(name: &str, scripting: bool) -> TokenizerMode {
    match name {
        "title" | "textarea" => TokenizerMode::Rcdata,
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => TokenizerMode::Rawtext,
        "noscript" if scripting => TokenizerMode::Rawtext,
        "script" => TokenizerMode::ScriptData,
        "plaintext" => TokenizerMode::Plaintext,
        _ => TokenizerMode::Data,
    }
}

fn warn_character_reference() {
    warn_once(
        "HTML tokenizer",
        "character references are passed through undecoded",
    );
}

/// Streaming HTML tokenizer.
#[derive(Debug, Clone)]
pub struct HtmlTokenizer {
    /// "The state machine must start in the data state."
    state: TokenizerState,
    /// The content model to return to after each token.
    mode: TokenizerMode,
    /// The tag, comment or DOCTYPE being built.
    current_token: Option<Token>,
    /// Text not yet emitted.
    pending_text: String,
    /// "An appropriate end tag token is an end tag token whose tag name
    /// matches the tag name of the last start tag to have been emitted from
    /// this tokenizer"
    last_start_tag_name: Option<String>,
    /// A U+000D CARRIAGE RETURN was consumed; a directly following
    /// U+000A LINE FEED is dropped.
    skip_next_line_feed: bool,
    /// [§ 8.1.3 Enabling and disabling scripting](https://html.spec.whatwg.org/multipage/webappapis.html#concept-n-script)
    scripting: bool,
    emitted_eof: bool,
}

impl Default for HtmlTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlTokenizer {
    /// A tokenizer in the data state with scripting enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: TokenizerState::Data,
            mode: TokenizerMode::Data,
            current_token: None,
            pending_text: String::new(),
            last_start_tag_name: None,
            skip_next_line_feed: false,
            scripting: true,
            emitted_eof: false,
        }
    }

    /// Whether `<noscript>` content is raw text.
    #[must_use]
    pub const fn with_scripting(mut self, scripting: bool) -> Self {
        self.scripting = scripting;
        self
    }

    /// The state the machine is in.
    #[must_use]
    pub const fn state(&self) -> TokenizerState {
        self.state
    }

    fn switch_to(&mut self, state: TokenizerState) -> Step {
        self.state = state;
        Step::Continue
    }

    /// [§ 13.2.3.5 Preprocessing the input stream](https://html.spec.whatwg.org/multipage/parsing.html#preprocessing-the-input-stream)
    ///
    /// "normalize newlines": the next input character, with U+000D reported
    /// as U+000A and the U+000A of a CR LF pair skipped. The pair may be
    /// split across appends, so the skip is remembered between calls.
    fn peek(&mut self, input: &mut SegmentedBuffer) -> Option<char> {
        if self.skip_next_line_feed {
            match input.current_char() {
                Some('\n') => {
                    input.advance();
                    self.skip_next_line_feed = false;
                }
                Some(_) => self.skip_next_line_feed = false,
                None => return None,
            }
        }
        input
            .current_char()
            .map(|c| if c == '\r' { '\n' } else { c })
    }

    /// Consume the character [`peek`](Self::peek) returned.
    fn consume(&mut self, input: &mut SegmentedBuffer) {
        self.skip_next_line_feed = input.current_char() == Some('\r');
        input.advance();
    }

    fn consume_and_switch(&mut self, input: &mut SegmentedBuffer, state: TokenizerState) -> Step {
        self.consume(input);
        self.switch_to(state)
    }

    fn consume_text(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        self.consume(input);
        self.pending_text.push(c);
        Step::Continue
    }

    fn take_text(&mut self) -> Option<Token> {
        if self.pending_text.is_empty() {
            None
        } else {
            Some(Token::character(std::mem::take(&mut self.pending_text)))
        }
    }

    fn current_token(&mut self) -> &mut Token {
        match &mut self.current_token {
            Some(token) => token,
            None => panic!(
                "no current token in {} state, indicating a tokenizer bug",
                self.state
            ),
        }
    }

    fn take_current_token(&mut self) -> Token {
        match self.current_token.take() {
            Some(token) => token,
            None => panic!(
                "no current token to emit in {} state, indicating a tokenizer bug",
                self.state
            ),
        }
    }

    /// Emit the current comment or DOCTYPE token.
    fn emit_current_token(&mut self) -> Step {
        let token = self.take_current_token();
        self.state = text_state(self.mode);
        Step::Emit(token)
    }

    /// Emit the current tag token and switch to the content model it opens.
    fn emit_current_tag(&mut self) -> Step {
        let mut token = self.take_current_token();
        token.remove_duplicate_attributes();
        if let Token::StartTag { name, .. } = &token {
            self.mode = mode_after_start_tag(name, self.scripting);
            self.last_start_tag_name = Some(name.clone());
        } else {
            self.mode = TokenizerMode::Data;
        }
        self.state = text_state(self.mode);
        Step::Emit(token)
    }

    fn step(&mut self, input: &mut SegmentedBuffer) -> Step {
        if self.state == TokenizerState::MarkupDeclarationOpen {
            return self.handle_markup_declaration_open_state(input);
        }
        let Some(c) = self.peek(input) else {
            if input.at_end_of_file() {
                return self.handle_eof();
            }
            return Step::Suspend;
        };
        match self.state {
            TokenizerState::Data => self.handle_data_state(input, c),
            TokenizerState::Rcdata | TokenizerState::Rawtext | TokenizerState::ScriptData => {
                self.handle_text_state(input, c)
            }
            TokenizerState::Plaintext => self.consume_text(input, c),
            TokenizerState::TagOpen => self.handle_tag_open_state(input, c),
            TokenizerState::EndTagOpen => self.handle_end_tag_open_state(input, c),
            TokenizerState::TagName => self.handle_tag_name_state(input, c),
            TokenizerState::BeforeAttributeName => {
                self.handle_before_attribute_name_state(input, c)
            }
            TokenizerState::AttributeName => self.handle_attribute_name_state(input, c),
            TokenizerState::AfterAttributeName => self.handle_after_attribute_name_state(input, c),
            TokenizerState::BeforeAttributeValue => {
                self.handle_before_attribute_value_state(input, c)
            }
            TokenizerState::AttributeValueDoubleQuoted => {
                self.handle_quoted_attribute_value_state(input, c, '"')
            }
            TokenizerState::AttributeValueSingleQuoted => {
                self.handle_quoted_attribute_value_state(input, c, '\'')
            }
            TokenizerState::AttributeValueUnquoted => {
                self.handle_attribute_value_unquoted_state(input, c)
            }
            TokenizerState::AfterAttributeValueQuoted => {
                self.handle_after_attribute_value_quoted_state(input, c)
            }
            TokenizerState::SelfClosingStartTag => {
                self.handle_self_closing_start_tag_state(input, c)
            }
            TokenizerState::BogusComment => self.handle_bogus_comment_state(input, c),
            TokenizerState::CommentStart => self.handle_comment_start_state(input, c),
            TokenizerState::CommentStartDash => self.handle_comment_start_dash_state(input, c),
            TokenizerState::Comment => self.handle_comment_state(input, c),
            TokenizerState::CommentEndDash => self.handle_comment_end_dash_state(input, c),
            TokenizerState::CommentEnd => self.handle_comment_end_state(input, c),
            TokenizerState::Doctype => self.handle_doctype_state(input, c),
            TokenizerState::BeforeDoctypeName => self.handle_before_doctype_name_state(input, c),
            TokenizerState::DoctypeName => self.handle_doctype_name_state(input, c),
            TokenizerState::AfterDoctypeName => self.handle_after_doctype_name_state(input, c),
            TokenizerState::BogusDoctype => self.handle_bogus_doctype_state(input, c),
            TokenizerState::MarkupDeclarationOpen => {
                unreachable!("markup declaration open is handled before peeking")
            }
        }
    }

    fn handle_data_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            // "U+003C LESS-THAN SIGN (<) - Switch to the tag open state."
            // Text seen so far is emitted first, so that a tag split across
            // appends never holds back the text in front of it.
            '<' => {
                if let Some(text) = self.take_text() {
                    return Step::Emit(text);
                }
                self.consume_and_switch(input, TokenizerState::TagOpen)
            }
            // "Anything else - Emit the current input character as a
            // character token."
            _ => {
                if c == '&' {
                    warn_character_reference();
                }
                self.consume_text(input, c)
            }
        }
    }

    /// RCDATA, RAWTEXT and script data: everything is text up to an
    /// appropriate end tag.
    fn handle_text_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        if c != '<' {
            if c == '&' && self.state == TokenizerState::Rcdata {
                warn_character_reference();
            }
            return self.consume_text(input, c);
        }
        let Some(name) = self.last_start_tag_name.clone() else {
            return self.consume_text(input, c);
        };
        let needle = format!("</{name}");
        match input.look_ahead_ignoring_case(&needle) {
            LookAheadResult::Match => {
                let length = needle.chars().count();
                self.handle_appropriate_end_tag(input, name, length)
            }
            LookAheadResult::InsufficientInput => Step::Suspend,
            LookAheadResult::NoMatch => self.consume_text(input, c),
        }
    }

    /// [§ 13.2.5.11 RCDATA end tag name state](https://html.spec.whatwg.org/multipage/parsing.html#rcdata-end-tag-name-state)
    ///
    /// `</name` is next in the input. It closes the element only if a
    /// delimiter follows.
    fn handle_appropriate_end_tag(
        &mut self,
        input: &mut SegmentedBuffer,
        name: String,
        length: usize,
    ) -> Step {
        if let Some(text) = self.take_text() {
            return Step::Emit(text);
        }
        let consumed = input.advance_by(length);
        match self.peek(input) {
            // "U+0009 CHARACTER TABULATION, U+000A LINE FEED, U+000C FORM
            // FEED, U+0020 SPACE, U+002F SOLIDUS (/), U+003E GREATER-THAN
            // SIGN (>) - If the current end tag token is an appropriate end
            // tag token ..."
            Some(c) if is_html_whitespace(c) || c == '/' || c == '>' => {
                self.current_token = Some(Token::end_tag(name));
                self.switch_to(TokenizerState::TagName)
            }
            None if !input.is_closed() => {
                input.prepend(&consumed, PrependKind::Unconsume);
                Step::Suspend
            }
            // "Anything else - Emit a U+003C LESS-THAN SIGN character token,
            // a U+002F SOLIDUS character token, and a character token for
            // each of the characters in the temporary buffer"
            _ => {
                self.pending_text.push_str(&consumed);
                Step::Continue
            }
        }
    }

    fn handle_tag_open_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            // "U+0021 EXCLAMATION MARK (!) - Switch to the markup declaration open state."
            '!' => self.consume_and_switch(input, TokenizerState::MarkupDeclarationOpen),
            // "U+002F SOLIDUS (/) - Switch to the end tag open state."
            '/' => self.consume_and_switch(input, TokenizerState::EndTagOpen),
            // "ASCII alpha - Create a new start tag token, set its tag name to
            // the empty string. Reconsume in the tag name state."
            c if c.is_ascii_alphabetic() => {
                self.current_token = Some(Token::new_start_tag());
                self.switch_to(TokenizerState::TagName)
            }
            // "U+003F QUESTION MARK (?) - Create a comment token whose data is
            // the empty string. Reconsume in the bogus comment state."
            '?' => {
                self.current_token = Some(Token::new_comment());
                self.switch_to(TokenizerState::BogusComment)
            }
            // "Anything else - Emit a U+003C LESS-THAN SIGN character token.
            // Reconsume in the data state."
            _ => {
                self.pending_text.push('<');
                self.switch_to(TokenizerState::Data)
            }
        }
    }

    fn handle_end_tag_open_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            // "ASCII alpha - Create a new end tag token ... Reconsume in the
            // tag name state."
            c if c.is_ascii_alphabetic() => {
                self.current_token = Some(Token::new_end_tag());
                self.switch_to(TokenizerState::TagName)
            }
            // "U+003E GREATER-THAN SIGN (>) - This is a missing-end-tag-name
            // parse error. Switch to the data state."
            '>' => self.consume_and_switch(input, TokenizerState::Data),
            // "Anything else - Create a comment token whose data is the empty
            // string. Reconsume in the bogus comment state."
            _ => {
                self.current_token = Some(Token::new_comment());
                self.switch_to(TokenizerState::BogusComment)
            }
        }
    }

    fn handle_tag_name_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            // "Switch to the before attribute name state."
            c if is_html_whitespace(c) => {
                self.consume_and_switch(input, TokenizerState::BeforeAttributeName)
            }
            // "U+002F SOLIDUS (/) - Switch to the self-closing start tag state."
            '/' => self.consume_and_switch(input, TokenizerState::SelfClosingStartTag),
            // "U+003E GREATER-THAN SIGN (>) - Switch to the data state. Emit the current tag token."
            '>' => {
                self.consume(input);
                self.emit_current_tag()
            }
            // "ASCII upper alpha - Append the lowercase version of the current
            // input character to the current tag token's tag name."
            _ => {
                self.consume(input);
                self.current_token()
                    .append_to_tag_name(c.to_ascii_lowercase());
                Step::Continue
            }
        }
    }

    fn handle_before_attribute_name_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            // "Ignore the character."
            c if is_html_whitespace(c) => {
                self.consume(input);
                Step::Continue
            }
            // "U+002F SOLIDUS (/), U+003E GREATER-THAN SIGN (>) - Reconsume in
            // the after attribute name state."
            '/' | '>' => self.switch_to(TokenizerState::AfterAttributeName),
            // "U+003D EQUALS SIGN (=) - Start a new attribute in the current tag
            // token. Set that attribute's name to the current input character"
            '=' => {
                self.consume(input);
                let token = self.current_token();
                token.start_new_attribute();
                token.append_to_current_attribute_name('=');
                self.switch_to(TokenizerState::AttributeName)
            }
            // "Anything else - Start a new attribute in the current tag token.
            // Reconsume in the attribute name state."
            _ => {
                self.current_token().start_new_attribute();
                self.switch_to(TokenizerState::AttributeName)
            }
        }
    }

    fn handle_attribute_name_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            // "Reconsume in the after attribute name state."
            c if is_html_whitespace(c) || c == '/' || c == '>' => {
                self.switch_to(TokenizerState::AfterAttributeName)
            }
            // "U+003D EQUALS SIGN (=) - Switch to the before attribute value state."
            '=' => self.consume_and_switch(input, TokenizerState::BeforeAttributeValue),
            // "Append the current input character to the current attribute's name."
            _ => {
                self.consume(input);
                self.current_token()
                    .append_to_current_attribute_name(c.to_ascii_lowercase());
                Step::Continue
            }
        }
    }

    fn handle_after_attribute_name_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            c if is_html_whitespace(c) => {
                self.consume(input);
                Step::Continue
            }
            '/' => self.consume_and_switch(input, TokenizerState::SelfClosingStartTag),
            '=' => self.consume_and_switch(input, TokenizerState::BeforeAttributeValue),
            '>' => {
                self.consume(input);
                self.emit_current_tag()
            }
            // "Anything else - Start a new attribute in the current tag token.
            // Reconsume in the attribute name state."
            _ => {
                self.current_token().start_new_attribute();
                self.switch_to(TokenizerState::AttributeName)
            }
        }
    }

    fn handle_before_attribute_value_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            c if is_html_whitespace(c) => {
                self.consume(input);
                Step::Continue
            }
            '"' => self.consume_and_switch(input, TokenizerState::AttributeValueDoubleQuoted),
            '\'' => self.consume_and_switch(input, TokenizerState::AttributeValueSingleQuoted),
            // "U+003E GREATER-THAN SIGN (>) - This is a missing-attribute-value
            // parse error. Switch to the data state. Emit the current tag token."
            '>' => {
                self.consume(input);
                self.emit_current_tag()
            }
            _ => self.switch_to(TokenizerState::AttributeValueUnquoted),
        }
    }

    fn handle_quoted_attribute_value_state(
        &mut self,
        input: &mut SegmentedBuffer,
        c: char,
        quote: char,
    ) -> Step {
        // "Switch to the after attribute value (quoted) state."
        if c == quote {
            return self.consume_and_switch(input, TokenizerState::AfterAttributeValueQuoted);
        }
        if c == '&' {
            warn_character_reference();
        }
        self.consume(input);
        self.current_token().append_to_current_attribute_value(c);
        Step::Continue
    }

    fn handle_attribute_value_unquoted_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            c if is_html_whitespace(c) => {
                self.consume_and_switch(input, TokenizerState::BeforeAttributeName)
            }
            '>' => {
                self.consume(input);
                self.emit_current_tag()
            }
            _ => {
                if c == '&' {
                    warn_character_reference();
                }
                self.consume(input);
                self.current_token().append_to_current_attribute_value(c);
                Step::Continue
            }
        }
    }

    fn handle_after_attribute_value_quoted_state(
        &mut self,
        input: &mut SegmentedBuffer,
        c: char,
    ) -> Step {
        match c {
            c if is_html_whitespace(c) => {
                self.consume_and_switch(input, TokenizerState::BeforeAttributeName)
            }
            '/' => self.consume_and_switch(input, TokenizerState::SelfClosingStartTag),
            '>' => {
                self.consume(input);
                self.emit_current_tag()
            }
            // "This is a missing-whitespace-between-attributes parse error.
            // Reconsume in the before attribute name state."
            _ => self.switch_to(TokenizerState::BeforeAttributeName),
        }
    }

    fn handle_self_closing_start_tag_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        if c == '>' {
            // "Set the self-closing flag of the current tag token. Switch to
            // the data state. Emit the current tag token."
            self.consume(input);
            self.current_token().set_self_closing();
            return self.emit_current_tag();
        }
        // "This is an unexpected-solidus-in-tag parse error. Reconsume in the
        // before attribute name state."
        self.switch_to(TokenizerState::BeforeAttributeName)
    }

    /// Decides between a comment, a DOCTYPE and a bogus comment. Needs up to
    /// seven characters of lookahead, so it suspends until they arrive.
    fn handle_markup_declaration_open_state(&mut self, input: &mut SegmentedBuffer) -> Step {
        // "If the next two characters are both U+002D HYPHEN-MINUS characters
        // (-), consume those two characters, create a comment token whose
        // data is the empty string, and switch to the comment start state."
        match input.look_ahead("--", CaseSensitivity::Sensitive) {
            LookAheadResult::Match => {
                let _ = input.advance_by(2);
                self.current_token = Some(Token::new_comment());
                return self.switch_to(TokenizerState::CommentStart);
            }
            LookAheadResult::InsufficientInput => return Step::Suspend,
            LookAheadResult::NoMatch => {}
        }
        // "Otherwise, if the next seven characters are an ASCII
        // case-insensitive match for the word "DOCTYPE", then consume those
        // characters and switch to the DOCTYPE state."
        match input.look_ahead_ignoring_case("DOCTYPE") {
            LookAheadResult::Match => {
                let _ = input.advance_by("DOCTYPE".len());
                self.current_token = Some(Token::new_doctype());
                self.switch_to(TokenizerState::Doctype)
            }
            LookAheadResult::InsufficientInput => Step::Suspend,
            // "Anything else - This is an incorrectly-opened-comment parse
            // error. Create a comment token whose data is the empty string.
            // Switch to the bogus comment state (don't consume anything in the
            // current state)."
            LookAheadResult::NoMatch => {
                self.current_token = Some(Token::new_comment());
                self.switch_to(TokenizerState::BogusComment)
            }
        }
    }

    fn handle_comment_start_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            '-' => self.consume_and_switch(input, TokenizerState::CommentStartDash),
            // "This is an abrupt-closing-of-empty-comment parse error."
            '>' => {
                self.consume(input);
                self.emit_current_token()
            }
            _ => self.switch_to(TokenizerState::Comment),
        }
    }

    fn handle_comment_start_dash_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            '-' => self.consume_and_switch(input, TokenizerState::CommentEnd),
            '>' => {
                self.consume(input);
                self.emit_current_token()
            }
            // "Append a U+002D HYPHEN-MINUS character (-) to the comment
            // token's data. Reconsume in the comment state."
            _ => {
                self.current_token().append_to_comment("-");
                self.switch_to(TokenizerState::Comment)
            }
        }
    }

    fn handle_comment_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        if c == '-' {
            return self.consume_and_switch(input, TokenizerState::CommentEndDash);
        }
        self.consume(input);
        self.current_token()
            .append_to_comment(c.encode_utf8(&mut [0; 4]));
        Step::Continue
    }

    fn handle_comment_end_dash_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        if c == '-' {
            return self.consume_and_switch(input, TokenizerState::CommentEnd);
        }
        self.current_token().append_to_comment("-");
        self.switch_to(TokenizerState::Comment)
    }

    fn handle_comment_end_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            // "Switch to the data state. Emit the current comment token."
            '>' => {
                self.consume(input);
                self.emit_current_token()
            }
            // "Append a U+002D HYPHEN-MINUS character (-) to the comment token's data."
            '-' => {
                self.consume(input);
                self.current_token().append_to_comment("-");
                Step::Continue
            }
            // "Append two U+002D HYPHEN-MINUS characters (-) to the comment
            // token's data. Reconsume in the comment state."
            _ => {
                self.current_token().append_to_comment("--");
                self.switch_to(TokenizerState::Comment)
            }
        }
    }

    fn handle_bogus_comment_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        self.consume(input);
        if c == '>' {
            return self.emit_current_token();
        }
        self.current_token()
            .append_to_comment(c.encode_utf8(&mut [0; 4]));
        Step::Continue
    }

    fn handle_doctype_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        if is_html_whitespace(c) {
            return self.consume_and_switch(input, TokenizerState::BeforeDoctypeName);
        }
        // "This is a missing-whitespace-before-doctype-name parse error.
        // Reconsume in the before DOCTYPE name state."
        self.switch_to(TokenizerState::BeforeDoctypeName)
    }

    fn handle_before_doctype_name_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            c if is_html_whitespace(c) => {
                self.consume(input);
                Step::Continue
            }
            // "This is a missing-doctype-name parse error. ... Set its
            // force-quirks flag to on. Switch to the data state. Emit the
            // current token."
            '>' => {
                self.consume(input);
                self.current_token().set_force_quirks();
                self.emit_current_token()
            }
            _ => {
                self.consume(input);
                self.current_token()
                    .append_to_doctype_name(c.to_ascii_lowercase());
                self.switch_to(TokenizerState::DoctypeName)
            }
        }
    }

    fn handle_doctype_name_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            c if is_html_whitespace(c) => {
                self.consume_and_switch(input, TokenizerState::AfterDoctypeName)
            }
            '>' => {
                self.consume(input);
                self.emit_current_token()
            }
            _ => {
                self.consume(input);
                self.current_token()
                    .append_to_doctype_name(c.to_ascii_lowercase());
                Step::Continue
            }
        }
    }

    fn handle_after_doctype_name_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        match c {
            c if is_html_whitespace(c) => {
                self.consume(input);
                Step::Continue
            }
            '>' => {
                self.consume(input);
                self.emit_current_token()
            }
            _ => {
                warn_once(
                    "HTML tokenizer",
                    "DOCTYPE public and system identifiers are skipped",
                );
                self.switch_to(TokenizerState::BogusDoctype)
            }
        }
    }

    fn handle_bogus_doctype_state(&mut self, input: &mut SegmentedBuffer, c: char) -> Step {
        self.consume(input);
        if c == '>' {
            return self.emit_current_token();
        }
        Step::Continue
    }

    /// The input is closed and fully consumed.
    fn handle_eof(&mut self) -> Step {
        match self.state {
            // "EOF - Emit an end-of-file token."
            TokenizerState::Data
            | TokenizerState::Rcdata
            | TokenizerState::Rawtext
            | TokenizerState::ScriptData
            | TokenizerState::Plaintext => {
                if let Some(text) = self.take_text() {
                    return Step::Emit(text);
                }
                self.emitted_eof = true;
                Step::Emit(Token::EndOfFile)
            }
            // "This is an eof-before-tag-name parse error. Emit a U+003C
            // LESS-THAN SIGN character token and an end-of-file token."
            TokenizerState::TagOpen => {
                self.pending_text.push('<');
                self.switch_to(TokenizerState::Data)
            }
            // "Emit a U+003C LESS-THAN SIGN character token, a U+002F SOLIDUS
            // character token and an end-of-file token."
            TokenizerState::EndTagOpen => {
                self.pending_text.push_str("</");
                self.switch_to(TokenizerState::Data)
            }
            // "This is an eof-in-tag parse error. Emit an end-of-file token."
            TokenizerState::TagName
            | TokenizerState::BeforeAttributeName
            | TokenizerState::AttributeName
            | TokenizerState::AfterAttributeName
            | TokenizerState::BeforeAttributeValue
            | TokenizerState::AttributeValueDoubleQuoted
            | TokenizerState::AttributeValueSingleQuoted
            | TokenizerState::AttributeValueUnquoted
            | TokenizerState::AfterAttributeValueQuoted
            | TokenizerState::SelfClosingStartTag => {
                self.current_token = None;
                let state = text_state(self.mode);
                self.switch_to(state)
            }
            TokenizerState::MarkupDeclarationOpen => {
                self.current_token = Some(Token::new_comment());
                self.emit_current_token()
            }
            // "Emit the comment. Emit an end-of-file token."
            TokenizerState::BogusComment
            | TokenizerState::CommentStart
            | TokenizerState::CommentStartDash
            | TokenizerState::Comment
            | TokenizerState::CommentEndDash
            | TokenizerState::CommentEnd
            | TokenizerState::BogusDoctype => self.emit_current_token(),
            // "This is an eof-in-doctype parse error. Set the current DOCTYPE
            // token's force-quirks flag to on. Emit the current DOCTYPE token."
            TokenizerState::Doctype
            | TokenizerState::BeforeDoctypeName
            | TokenizerState::DoctypeName
            | TokenizerState::AfterDoctypeName => {
                self.current_token().set_force_quirks();
                self.emit_current_token()
            }
        }
    }
}

impl Tokenizer for HtmlTokenizer {
    fn next_token(&mut self, input: &mut SegmentedBuffer) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        loop {
            match self.step(input) {
                Step::Continue => {}
                Step::Emit(token) => return Some(token),
                Step::Suspend => return self.take_text(),
            }
        }
    }

    fn mode(&self) -> TokenizerMode {
        self.mode
    }

    fn set_mode(&mut self, mode: TokenizerMode) {
        self.mode = mode;
        self.state = text_state(mode);
    }
}
