//! Integration tests for the warning system.

use weir_common::{has_warned, warn_once};

#[test]
fn test_warning_is_recorded_once() {
    assert!(!has_warned("test", "recorded once"));
    warn_once("test", "recorded once");
    warn_once("test", "recorded once");
    assert!(has_warned("test", "recorded once"));
}

#[test]
fn test_warnings_are_keyed_by_component() {
    warn_once("tokenizer", "keyed by component");
    assert!(has_warned("tokenizer", "keyed by component"));
    assert!(!has_warned("driver", "keyed by component"));
}
