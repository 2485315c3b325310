//! Parser warnings with colored terminal output.
//!
//! Each warning is keyed by its component and message and printed at most
//! once, so a collaborator that keeps hitting the same unsupported construct
//! on every token does not flood stderr.

use std::collections::HashSet;
use std::sync::{LazyLock, Mutex, PoisonError};

use owo_colors::OwoColorize;

/// Every `[component] message` key printed so far.
static WARNED: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Warn about an unsupported or suspicious condition (prints once per unique message).
///
/// # Example
/// ```ignore
/// warn_once("tokenizer", "character references are passed through verbatim");
/// ```
pub fn warn_once(component: &str, message: &str) {
    let key = format!("[{component}] {message}");
    let first_time = WARNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key);

    if first_time {
        eprintln!("{}", format!("[Weir {component}] ⚠ {message}").yellow());
    }
}

/// Whether `warn_once` has already reported this component/message pair.
#[must_use]
pub fn has_warned(component: &str, message: &str) -> bool {
    let key = format!("[{component}] {message}");
    WARNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&key)
}

/// Forget every recorded warning (call when starting a new document).
pub fn clear_warnings() {
    WARNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}
