//! Per-loop-header counters that decide when the tracing compiler runs.

use crate::{
    compile::{Address, TraceRecorder, TraceTree},
    config::HotpathConfig,
    log::{Log, Verbosity},
    method::MethodActor,
};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub type HotThreshold = usize;

/// The counter and gate attached to one loop-header bytecode location.
///
/// An anchor is created lazily the first time its loop header is reached and
/// lives for the rest of the method's compiled lifetime. It moves through
/// three phases: counting (cold), hot but not yet traced, and traced; once
/// traced, [TreeAnchor::visit] short-circuits to the compiled entry.
pub struct TreeAnchor {
    method: Arc<MethodActor>,
    pc: usize,
    tracing_threshold: HotThreshold,
    trace_failure_threshold: usize,
    /// Visit counter. Increments are deliberately lossy: [TreeAnchor::visit]
    /// reads and writes this with relaxed ordering and no read-modify-write,
    /// so concurrent visits can lose updates. The value is a heuristic lower
    /// bound on the true visit count, never an exact figure; paying for
    /// atomic increments on this path would cost more than the lost counts.
    frequency: AtomicUsize,
    /// How many recording attempts have started at this anchor.
    number_of_tries: AtomicUsize,
    /// Entry address of the compiled tree; zero until a recording succeeds.
    entry: AtomicUsize,
    tree: Mutex<Option<Arc<TraceTree>>>,
    log: Arc<Log>,
}

impl TreeAnchor {
    pub fn new(method: Arc<MethodActor>, pc: usize, config: &HotpathConfig) -> Self {
        Self {
            method,
            pc,
            tracing_threshold: config.tracing_threshold(),
            trace_failure_threshold: config.trace_failure_threshold(),
            frequency: AtomicUsize::new(0),
            number_of_tries: AtomicUsize::new(0),
            entry: AtomicUsize::new(0),
            tree: Mutex::new(None),
            log: Arc::clone(config.log()),
        }
    }

    /// Called on every pass over the loop header. Returns the address to
    /// resume at: zero while the loop is cold (keep interpreting), the
    /// compiled tree's entry once one exists.
    ///
    /// Not thread-safe by design: see the `frequency` field docs.
    pub fn visit(&self, recorder: &dyn TraceRecorder) -> Address {
        let entry = self.entry.load(Ordering::Acquire);
        if entry != 0 {
            return Address::new(entry);
        }

        // The deliberately lossy increment.
        let frequency = self.frequency.load(Ordering::Relaxed) + 1;
        self.frequency.store(frequency, Ordering::Relaxed);
        if frequency <= self.tracing_threshold {
            return Address::ZERO;
        }

        if self.number_of_tries.load(Ordering::Relaxed) >= self.trace_failure_threshold {
            // Recording kept failing here; leave this loop to the
            // interpreter.
            return Address::ZERO;
        }
        self.number_of_tries.fetch_add(1, Ordering::Relaxed);
        self.log.log(
            Verbosity::AnchorTransition,
            &format!("start-recording: {}@{}", self.method.name(), self.pc),
        );
        match recorder.record(self) {
            Ok(tree) => {
                let entry = tree.entry();
                *self.tree.lock() = Some(tree);
                self.entry.store(entry.raw(), Ordering::Release);
                self.log.log(
                    Verbosity::JitEvent,
                    &format!("recorded: {}@{}", self.method.name(), self.pc),
                );
                entry
            }
            Err(e) => {
                self.log.log(
                    Verbosity::Warning,
                    &format!("recording failed: {}@{}: {e}", self.method.name(), self.pc),
                );
                Address::ZERO
            }
        }
    }

    pub fn method(&self) -> &Arc<MethodActor> {
        &self.method
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// A lower bound on how often this anchor has been visited.
    pub fn frequency(&self) -> usize {
        self.frequency.load(Ordering::Relaxed)
    }

    /// Reset the visit counter, e.g. to back off after deoptimization.
    pub fn reset_frequency(&self) {
        self.frequency.store(0, Ordering::Relaxed);
    }

    pub fn number_of_tries(&self) -> usize {
        self.number_of_tries.load(Ordering::Relaxed)
    }

    pub fn tracing_threshold(&self) -> HotThreshold {
        self.tracing_threshold
    }

    pub fn is_traced(&self) -> bool {
        self.entry.load(Ordering::Acquire) != 0
    }

    pub fn tree(&self) -> Option<Arc<TraceTree>> {
        self.tree.lock().clone()
    }
}
