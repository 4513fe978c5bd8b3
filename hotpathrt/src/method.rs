//! Method descriptors.
//!
//! This is the boundary to the class-file machinery: the evaluation stack and
//! the calling-convention layer only need a method's parameter kinds, local
//! count and result kind. Methods are compared by `Arc` pointer identity.

use crate::kind::Kind;
use std::sync::Arc;

/// What the compiler core knows about one method.
#[derive(Debug)]
pub struct MethodActor {
    name: String,
    parameter_kinds: Vec<Kind>,
    max_locals: usize,
    result_kind: Kind,
}

impl MethodActor {
    pub fn new(
        name: impl Into<String>,
        parameter_kinds: Vec<Kind>,
        max_locals: usize,
        result_kind: Kind,
    ) -> Arc<Self> {
        let m = Self {
            name: name.into(),
            parameter_kinds,
            max_locals,
            result_kind,
        };
        debug_assert!(
            m.parameter_slots() <= m.max_locals,
            "{}: {} parameter slots but only {} locals",
            m.name,
            m.parameter_slots(),
            m.max_locals
        );
        Arc::new(m)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_kinds(&self) -> &[Kind] {
        &self.parameter_kinds
    }

    /// The number of local slots the declared parameters occupy (category-2
    /// parameters count twice).
    pub fn parameter_slots(&self) -> usize {
        self.parameter_kinds.iter().map(|k| k.slot_count()).sum()
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn result_kind(&self) -> Kind {
        self.result_kind
    }
}
