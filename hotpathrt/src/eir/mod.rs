//! The EIR location model: where a value lives once the register allocator
//! and the calling conventions have had their say.

pub mod x64;

use crate::eir::x64::Reg;

/// Why a stack slot exists. The tag documents the slot's origin; it has no
/// effect on offset arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotPurpose {
    /// An outgoing or incoming parameter that overflowed the parameter
    /// registers.
    Parameter,
    /// A spilled local or temporary.
    Local,
    /// A slot belonging to template-generated code's explicit operand stack.
    Template,
}

/// Where an EIR value is stored: a specific register, or a stack slot at a
/// byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Register(Reg),
    StackSlot { purpose: SlotPurpose, offset: u32 },
}

impl Location {
    /// The register, if this is a register location.
    pub fn register(&self) -> Option<Reg> {
        match self {
            Location::Register(r) => Some(*r),
            Location::StackSlot { .. } => None,
        }
    }

    /// The byte offset, if this is a stack slot.
    pub fn stack_offset(&self) -> Option<u32> {
        match self {
            Location::Register(_) => None,
            Location::StackSlot { offset, .. } => Some(*offset),
        }
    }
}
