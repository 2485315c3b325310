//! A reference tree builder.
//!
//! [`DocumentBuilder`] nests elements by tag name with a stack of open
//! elements. It implements none of the insertion modes of
//! [§ 13.2.6 Tree construction](https://html.spec.whatwg.org/multipage/parsing.html#tree-construction);
//! it exists to give the driver the signals real tree construction
//! produces: finished script elements, stylesheets inserted into the body,
//! and the end of parsing.

/// The arena document.
pub mod dom;

use core::cell::RefCell;
use std::rc::Rc;

use weir_input::TextPosition;

pub use dom::{Document, ElementData, Node, NodeId, NodeType, print_tree, render_tree};

use crate::collaborators::TreeBuilder;
use crate::script::{ScriptElement, ScriptId};
use crate::tokenizer::Token;

/// [§ 13.1.2 Elements](https://html.spec.whatwg.org/multipage/syntax.html#void-elements)
///
/// "Void elements: area, base, br, col, embed, hr, img, input, link, meta,
/// source, track, wbr"
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_stylesheet_link(token: &Token) -> bool {
    token.is_start_tag("link")
        && token.attribute("href").is_some()
        && token.attribute("rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|keyword| keyword.eq_ignore_ascii_case("stylesheet"))
        })
}

/// Builds a [`Document`] from tokens.
///
/// The document is shared so that the embedder can inspect it while the
/// parser owns the builder.
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct DocumentBuilder {
    document: Rc<RefCell<Document>>,
    /// [§ 13.2.4.3 The stack of open elements](https://html.spec.whatwg.org/multipage/parsing.html#the-stack-of-open-elements)
    open_elements: Vec<NodeId>,
    /// Character tokens not yet inserted.
    pending_text: String,
    /// The open `<script>` element and where its text starts.
    open_script: Option<(NodeId, TextPosition)>,
    script_to_process: Option<(ScriptElement, TextPosition)>,
    next_script_id: u64,
    seen_body: bool,
    pending_stylesheet_in_body: bool,
    parsing_fragment: bool,
    detached: bool,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// A builder for a new document.
    #[must_use]
    pub fn new() -> Self {
        Self::with_document(Document::new(), false)
    }

    /// [§ 13.4 Parsing HTML fragments](https://html.spec.whatwg.org/multipage/parsing.html#parsing-html-fragments)
    ///
    /// A builder whose output is a `DocumentFragment`.
    #[must_use]
    pub fn fragment() -> Self {
        Self::with_document(Document::new_fragment(), true)
    }

    fn with_document(document: Document, parsing_fragment: bool) -> Self {
        Self {
            document: Rc::new(RefCell::new(document)),
            open_elements: Vec::new(),
            pending_text: String::new(),
            open_script: None,
            script_to_process: None,
            next_script_id: 0,
            seen_body: false,
            pending_stylesheet_in_body: false,
            parsing_fragment,
            detached: false,
        }
    }

    /// The document being built.
    #[must_use]
    pub fn document(&self) -> Rc<RefCell<Document>> {
        Rc::clone(&self.document)
    }

    /// [§ 13.2.6.1](https://html.spec.whatwg.org/multipage/parsing.html#current-node)
    /// "The current node is the bottommost node in this stack of open elements."
    fn current_node(&self) -> NodeId {
        self.open_elements.last().copied().unwrap_or(NodeId::ROOT)
    }

    fn insert_pending_text(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending_text);
        let parent = self.current_node();
        self.document.borrow_mut().append_text(parent, &text);
    }

    fn insert_start_tag(&mut self, token: Token, position: TextPosition) {
        if token.is_start_tag("body") {
            self.seen_body = true;
        }
        if self.seen_body && is_stylesheet_link(&token) {
            self.pending_stylesheet_in_body = true;
        }
        let Token::StartTag {
            name, attributes, ..
        } = token
        else {
            return;
        };
        let parent = self.current_node();
        let is_void = VOID_ELEMENTS.contains(&name.as_str());
        let is_script = name == "script";
        let id = self.document.borrow_mut().append(
            parent,
            NodeType::Element(ElementData {
                tag_name: name,
                attributes,
            }),
        );
        if is_script {
            self.open_script = Some((id, position));
        }
        if !is_void {
            self.open_elements.push(id);
        }
    }

    /// [§ 13.2.6.4.7](https://html.spec.whatwg.org/multipage/parsing.html#parsing-main-inbody)
    ///
    /// "Any other end tag": pop up to and including the matching element;
    /// ignore the tag if no such element is open.
    fn insert_end_tag(&mut self, name: &str) {
        let document = self.document.borrow();
        let Some(index) = self.open_elements.iter().rposition(|id| {
            document
                .element(*id)
                .is_some_and(|data| data.tag_name == name)
        }) else {
            return;
        };
        drop(document);
        let popped = self.open_elements.split_off(index);
        if let Some((script, position)) = self.open_script
            && popped.contains(&script)
        {
            self.open_script = None;
            self.prepare_script(script, position);
        }
    }

    /// "An end tag whose tag name is "script"": hand the finished element to
    /// the parser.
    fn prepare_script(&mut self, node: NodeId, position: TextPosition) {
        let document = self.document.borrow();
        let Some(data) = document.element(node) else {
            return;
        };
        let id = ScriptId(self.next_script_id);
        self.next_script_id += 1;
        let element = ScriptElement {
            id,
            text: document.child_text_content(node),
            src: data.attribute("src").map(str::to_string),
            is_async: data.has_attribute("async"),
            is_deferred: data.has_attribute("defer"),
        };
        drop(document);
        self.script_to_process = Some((element, position));
    }
}

impl TreeBuilder for DocumentBuilder {
    fn construct_tree(&mut self, token: Token, position: TextPosition) {
        if self.detached {
            return;
        }
        if let Token::Character { data } = &token {
            self.pending_text.push_str(data);
            return;
        }
        self.insert_pending_text();
        match token {
            Token::Doctype { name, .. } => {
                let _ = self
                    .document
                    .borrow_mut()
                    .append(NodeId::ROOT, NodeType::Doctype(name.unwrap_or_default()));
            }
            Token::StartTag { .. } => self.insert_start_tag(token, position),
            Token::EndTag { name, .. } => self.insert_end_tag(&name),
            Token::Comment { data } => {
                let parent = self.current_node();
                let _ = self
                    .document
                    .borrow_mut()
                    .append(parent, NodeType::Comment(data));
            }
            Token::Character { .. } | Token::EndOfFile => {}
        }
    }

    fn has_parser_blocking_script(&self) -> bool {
        self.script_to_process.is_some()
    }

    fn take_script_to_process(&mut self) -> Option<(ScriptElement, TextPosition)> {
        self.script_to_process.take()
    }

    fn flush(&mut self) {
        self.insert_pending_text();
    }

    fn take_pending_stylesheet_in_body(&mut self) -> bool {
        std::mem::take(&mut self.pending_stylesheet_in_body)
    }

    fn is_parsing_fragment(&self) -> bool {
        self.parsing_fragment
    }

    /// [§ 13.2.7 The end](https://html.spec.whatwg.org/multipage/parsing.html#the-end)
    ///
    /// "Pop all the nodes off the stack of open elements."
    fn finished(&mut self) {
        self.insert_pending_text();
        self.open_elements.clear();
        self.document.borrow_mut().mark_finished();
    }

    fn detach(&mut self) {
        self.pending_text.clear();
        self.open_elements.clear();
        self.open_script = None;
        self.script_to_process = None;
        self.detached = true;
    }
}
