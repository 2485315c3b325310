//! Preload scanning.
//!
//! [`TokenPreloadScanner`] looks at the tokens the parser produces and asks
//! for the resources they reference. When the parser pauses, an
//! [`HtmlPreloadScanner`] tokenizes the unparsed remainder on its own so
//! those fetches can start while the parser waits.
//! [`CollectingPreloader`] records the requests, dropping repeats, so a
//! resource found by both scanners is fetched once.

use core::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use weir_input::SegmentedBuffer;

use crate::collaborators::{
    PreloadRequest, PreloadScanner, ResourceKind, ResourcePreloader, SpeculativeScanner, Tokenizer,
};
use crate::tokenizer::{HtmlTokenizer, Token};

/// Finds fetchable resources in individual tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenPreloadScanner;

impl TokenPreloadScanner {
    /// Create a scanner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// The resource `token` references, if any: `<script src>`,
    /// `<link rel=stylesheet href>` and `<img src>`.
    #[must_use]
    pub fn request_for(token: &Token) -> Option<PreloadRequest> {
        let Token::StartTag { name, .. } = token else {
            return None;
        };
        let (kind, url) = match name.as_str() {
            "script" => (ResourceKind::Script, token.attribute("src")?),
            "img" => (ResourceKind::Image, token.attribute("src")?),
            "link" => {
                let rel = token.attribute("rel")?;
                if !rel
                    .split_ascii_whitespace()
                    .any(|keyword| keyword.eq_ignore_ascii_case("stylesheet"))
                {
                    return None;
                }
                (ResourceKind::Stylesheet, token.attribute("href")?)
            }
            _ => return None,
        };
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        Some(PreloadRequest::new(kind, url))
    }
}

impl PreloadScanner for TokenPreloadScanner {
    fn scan(&mut self, token: &Token, _input: &SegmentedBuffer) -> Vec<PreloadRequest> {
        Self::request_for(token).into_iter().collect()
    }

    fn speculative(&self) -> Box<dyn SpeculativeScanner> {
        Box::new(HtmlPreloadScanner::new())
    }
}

/// A preload scanner with its own input and tokenizer.
///
/// Text appended to it is never closed, so a tag cut off at the end of the
/// appended text is completed by the next append.
#[derive(Debug, Default)]
pub struct HtmlPreloadScanner {
    input: SegmentedBuffer,
    tokenizer: HtmlTokenizer,
}

impl HtmlPreloadScanner {
    /// A scanner with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpeculativeScanner for HtmlPreloadScanner {
    fn append_to_end(&mut self, text: &str) {
        self.input.append(text, false);
    }

    fn scan(&mut self) -> Vec<PreloadRequest> {
        let mut requests = Vec::new();
        while let Some(token) = self.tokenizer.next_token(&mut self.input) {
            requests.extend(TokenPreloadScanner::request_for(&token));
        }
        requests
    }
}

#[derive(Debug, Default)]
struct PreloadLog {
    seen: HashSet<String>,
    fetched: Vec<PreloadRequest>,
}

/// A [`ResourcePreloader`] that records each distinct URL once.
///
/// Clones share one log, so the embedder keeps a handle while the parser
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct CollectingPreloader {
    log: Rc<RefCell<PreloadLog>>,
}

impl CollectingPreloader {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every distinct request, in the order first seen.
    #[must_use]
    pub fn fetched(&self) -> Vec<PreloadRequest> {
        self.log.borrow().fetched.clone()
    }

    /// The URLs of [`fetched`](Self::fetched).
    #[must_use]
    pub fn fetched_urls(&self) -> Vec<String> {
        self.log
            .borrow()
            .fetched
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }
}

impl ResourcePreloader for CollectingPreloader {
    fn take_and_preload(&mut self, requests: Vec<PreloadRequest>) {
        let mut log = self.log.borrow_mut();
        for request in requests {
            if log.seen.insert(request.url.clone()) {
                log.fetched.push(request);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speculative_scan_skips_script_text() {
        let mut scanner = HtmlPreloadScanner::new();
        scanner.append_to_end("<script>var s = '<img src=no.png>';</script><img src=yes.png>");
        let urls: Vec<String> = scanner.scan().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["yes.png".to_string()]);
    }

    #[test]
    fn test_speculative_scan_completes_split_tags() {
        let mut scanner = HtmlPreloadScanner::new();
        scanner.append_to_end("<link rel=stylesheet hr");
        assert!(scanner.scan().is_empty());
        scanner.append_to_end("ef=a.css>");
        assert_eq!(
            scanner.scan(),
            vec![PreloadRequest::new(ResourceKind::Stylesheet, "a.css")]
        );
    }
}
