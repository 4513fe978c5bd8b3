//! Runtime support for a tree-growing tracing JIT on AMD64.
//!
//! The crate has three layers:
//!
//! * [eir]: the target-level register model and the calling conventions the
//!   compiler's intermediate representation uses, including the synthetic
//!   convention that maps tree entry onto a baseline interpreter frame.
//! * [state]: the abstract machine state (operand stacks and frame chains)
//!   the trace recorder manipulates while it follows the interpreter.
//! * [anchor]: per-loop-header counters that decide when recording starts
//!   and publish the compiled tree's entry address.

#![allow(clippy::upper_case_acronyms)]

pub mod anchor;
pub mod bytecode;
pub mod compile;
pub mod config;
pub mod eir;
pub mod kind;
mod log;
pub mod method;
pub mod state;

pub use self::anchor::{HotThreshold, TreeAnchor};
pub use self::compile::{Address, CompilationError, TraceRecorder, TraceTree};
pub use self::config::HotpathConfig;
pub use self::kind::Kind;
pub use self::method::MethodActor;
pub use self::state::{Frame, SlotElement, State};
