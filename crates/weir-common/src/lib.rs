//! Common utilities for the Weir parser.
//!
//! This crate provides shared infrastructure used by all parser components:
//! - **Warning System** - deduplicated, component-tagged terminal warnings
//! - **Document Sources** - opening files, `http(s)` URLs and `data:` URLs
//!   as byte streams that can be fed to the parser chunk by chunk

pub mod source;
pub mod warning;

pub use source::{DataUrl, DocumentSource, LoadError};
pub use warning::{clear_warnings, has_warned, warn_once};
