use core::cell::Cell;
use std::rc::Rc;

/// One activation of the pump.
///
/// Pumps nest when a script run from inside the pump writes markup: the
/// write pumps the inserted text before returning. The shared counter
/// holds the current nesting level and is restored when the session is
/// dropped, including during unwinding.
pub(super) struct PumpSession {
    nesting: Rc<Cell<usize>>,
}

impl PumpSession {
    pub(super) fn enter(nesting: &Rc<Cell<usize>>) -> Self {
        let depth = nesting.get() + 1;
        nesting.set(depth);
        #[cfg(feature = "parser-trace")]
        eprintln!("[PARSER] {}pump enter depth={depth}", "  ".repeat(depth - 1));
        Self {
            nesting: Rc::clone(nesting),
        }
    }
}

impl Drop for PumpSession {
    fn drop(&mut self) {
        let depth = self.nesting.get();
        #[cfg(feature = "parser-trace")]
        eprintln!("[PARSER] {}pump exit depth={depth}", "  ".repeat(depth - 1));
        self.nesting.set(depth - 1);
    }
}
