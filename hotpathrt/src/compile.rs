//! The boundary between the trace anchors and the tracing compiler proper.

use crate::anchor::TreeAnchor;
use std::sync::Arc;
use thiserror::Error;

/// A failure to record or compile a trace.
#[derive(Debug, Error)]
pub enum CompilationError {
    /// Recording failed for reasons that may interest whoever is integrating
    /// the tracer, but not the end user.
    #[error("general error: {0}")]
    General(String),
    /// Something went wrong that is probably a bug in the tracer itself.
    #[error("internal error: {0}")]
    InternalError(String),
    /// The recorded trace exceeded the length we are willing to compile.
    #[error("trace too long: {0} operations")]
    TraceTooLong(usize),
}

/// A machine-code address execution can resume at. The zero address means
/// "continue in the interpreter"; compiled entry points are never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Address(usize);

impl Address {
    pub const ZERO: Address = Address(0);

    pub fn new(raw: usize) -> Self {
        Address(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// A compiled trace tree: the machine code grown from one hot loop header,
/// entered at a fixed address.
#[derive(Debug)]
pub struct TraceTree {
    entry: Address,
}

impl TraceTree {
    pub fn new(entry: Address) -> Self {
        assert!(!entry.is_zero(), "a compiled tree needs a non-zero entry");
        Self { entry }
    }

    pub fn entry(&self) -> Address {
        self.entry
    }
}

/// Implemented by the tracing compiler front end; invoked by
/// [TreeAnchor::visit] once a loop header becomes hot.
pub trait TraceRecorder {
    /// Record and compile a trace starting at `anchor`.
    fn record(&self, anchor: &TreeAnchor) -> Result<Arc<TraceTree>, CompilationError>;
}
