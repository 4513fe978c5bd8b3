//! The AMD64 calling-convention family.
//!
//! Every convention derives from one base Unix AMD64 Java convention and
//! differs from it in a narrow, explicit delta: which registers are
//! callee-saved, which are withheld from the register allocator, and how
//! incoming parameters are located. Conventions are constructed once, never
//! mutated afterwards, and shared read-only between compiler threads.

use super::{Reg, RegClass, RegSet, RegisterRoles};
use crate::{
    eir::{Location, SlotPurpose},
    kind::Kind,
};
use strum::IntoEnumIterator;

/// General purpose parameter registers in the order the Unix AMD64 ABI
/// consumes them.
pub const INTEGER_PARAMETER_REGISTERS: [Reg; 6] = [
    Reg::RDI,
    Reg::RSI,
    Reg::RDX,
    Reg::RCX,
    Reg::R8,
    Reg::R9,
];

/// Floating point parameter registers in the order the Unix AMD64 ABI
/// consumes them.
pub const FLOATING_POINT_PARAMETER_REGISTERS: [Reg; 8] = [
    Reg::XMM0,
    Reg::XMM1,
    Reg::XMM2,
    Reg::XMM3,
    Reg::XMM4,
    Reg::XMM5,
    Reg::XMM6,
    Reg::XMM7,
];

/// The SysV callee-saved registers a VM entry point must preserve for its
/// native caller. R14 is absent: it carries the safepoint latch and is
/// unallocatable to begin with.
const VM_ENTRY_CALLEE_SAVED: [Reg; 5] = [Reg::RBX, Reg::RBP, Reg::R12, Reg::R13, Reg::R15];

/// Overflow parameters advance the stack offset by one slot of this many
/// bytes. Kept as data on the convention rather than assumed by the
/// resolver, since the resolver logic itself is word-size independent.
pub const AMD64_STACK_SLOT_SIZE: u32 = 8;

/// The register reporting an OSR tree's result, whatever the result kind.
const TREE_RESULT_REGISTER: Reg = Reg::RAX;

/// Which of a method's entry points a call through this convention targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallEntryPoint {
    Optimized,
    Baseline,
    C,
}

/// Layout facts about a baseline-compiled frame, needed when transferring
/// control into a recompiled trace without an adapter frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaselineFrameLayout {
    /// Bytes occupied by the return address, the saved frame pointer and any
    /// alignment padding sitting below the frame's local slots.
    pub header_size: u32,
    /// Size in bytes of one local slot.
    pub slot_size: u32,
}

impl BaselineFrameLayout {
    /// Byte offset of local slot `index` within the baseline frame.
    pub fn local_offset(&self, index: usize) -> u32 {
        self.header_size + u32::try_from(index).unwrap() * self.slot_size
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiVariant {
    /// Ordinary Java-to-Java calls.
    Java,
    /// Calls crossing the native boundary.
    CFunction,
    /// Template-generated (baseline) code.
    Template,
    /// Dispatch trampolines, which must preserve every possible callee input.
    Trampoline,
    /// On-stack replacement into a compiled trace tree: parameters live at
    /// the baseline frame's local offsets, not in registers.
    Tree(BaselineFrameLayout),
}

/// One calling convention: the register pools and parameter/result location
/// rules shared by the register allocator and the code emitter.
#[derive(Clone, Debug)]
pub struct CallingConvention {
    variant: AbiVariant,
    entry_point: CallEntryPoint,
    integer_parameter_registers: Vec<Reg>,
    floating_point_parameter_registers: Vec<Reg>,
    unallocatable: RegSet,
    allocatable: RegSet,
    callee_saved: RegSet,
    result_registers: RegSet,
    stack_slot_size: u32,
}

impl CallingConvention {
    /// The base Unix AMD64 Java convention every variant is a delta of.
    fn unix_java(roles: &RegisterRoles) -> Self {
        let mut unallocatable = RegSet::empty();
        unallocatable.insert(roles.stack_pointer);
        unallocatable.insert(roles.frame_pointer);
        unallocatable.insert(roles.safepoint_latch);
        for kind in Kind::iter().filter(|k| *k != Kind::Void) {
            unallocatable.insert(roles.scratch_for(kind));
        }
        let allocatable = RegSet::all().difference(unallocatable);
        let mut cc = Self {
            variant: AbiVariant::Java,
            entry_point: CallEntryPoint::Optimized,
            integer_parameter_registers: INTEGER_PARAMETER_REGISTERS.to_vec(),
            floating_point_parameter_registers: FLOATING_POINT_PARAMETER_REGISTERS.to_vec(),
            unallocatable,
            allocatable,
            callee_saved: RegSet::empty(),
            result_registers: RegSet::empty(),
            stack_slot_size: AMD64_STACK_SLOT_SIZE,
        };
        // A caller can't know a callee's actual result kind at every call
        // site, so it must treat the result registers of both wide kinds as
        // clobbered by any call.
        for kind in [Kind::Long, Kind::Double] {
            if let Some(Location::Register(reg)) = cc.result_location(kind) {
                cc.result_registers.insert(reg);
            }
        }
        cc
    }

    /// Plain Java calls: all allocatable registers are caller-saved.
    pub fn java(roles: &RegisterRoles) -> Self {
        Self::unix_java(roles)
    }

    /// Native call boundaries. A convention acting as a VM entry point must
    /// preserve the native caller's SysV callee-saved registers and is
    /// entered through the C entry point; otherwise it behaves like the Java
    /// convention.
    pub fn c_function(roles: &RegisterRoles, vm_entry_point: bool) -> Self {
        let mut cc = Self::unix_java(roles);
        cc.variant = AbiVariant::CFunction;
        if vm_entry_point {
            cc.entry_point = CallEntryPoint::C;
            cc.callee_saved = VM_ENTRY_CALLEE_SAVED.into_iter().collect();
            debug_assert!(cc.callee_saved.difference(cc.allocatable).is_empty());
        }
        cc
    }

    /// Template-generated code keeps an explicit operand stack in the stack
    /// pointer, so it needs a distinct frame pointer, withheld from the
    /// allocator.
    pub fn template(roles: &RegisterRoles) -> Self {
        let mut cc = Self::unix_java(roles);
        cc.variant = AbiVariant::Template;
        cc.entry_point = CallEntryPoint::Baseline;
        cc.make_unallocatable(roles.baseline_frame_pointer);
        cc
    }

    /// A trampoline dispatches to a callee it cannot name in advance: every
    /// register that may carry one of the callee's parameters, plus the
    /// baseline frame pointer, must survive the dispatch.
    pub fn trampoline(roles: &RegisterRoles) -> Self {
        let mut cc = Self::unix_java(roles);
        cc.variant = AbiVariant::Trampoline;
        let mut saved: RegSet = cc
            .integer_parameter_registers
            .iter()
            .chain(cc.floating_point_parameter_registers.iter())
            .copied()
            .collect();
        saved.insert(roles.baseline_frame_pointer);
        debug_assert!(saved.difference(cc.allocatable).is_empty());
        cc.callee_saved = saved;
        cc
    }

    /// On-stack replacement into a trace tree recompiled from a baseline
    /// frame described by `layout`.
    pub fn tree(roles: &RegisterRoles, layout: BaselineFrameLayout) -> Self {
        let mut cc = Self::unix_java(roles);
        cc.variant = AbiVariant::Tree(layout);
        cc
    }

    /// Atomically move `reg` from the allocatable pool to the unallocatable
    /// set. This is the only way a variant may widen the unallocatable set.
    fn make_unallocatable(&mut self, reg: Reg) {
        assert!(self.allocatable.contains(reg), "{reg} is not allocatable");
        self.allocatable.remove(reg);
        self.callee_saved.remove(reg);
        self.unallocatable.insert(reg);
    }

    pub fn variant(&self) -> &AbiVariant {
        &self.variant
    }

    pub fn entry_point(&self) -> CallEntryPoint {
        self.entry_point
    }

    pub fn integer_parameter_registers(&self) -> &[Reg] {
        &self.integer_parameter_registers
    }

    pub fn floating_point_parameter_registers(&self) -> &[Reg] {
        &self.floating_point_parameter_registers
    }

    pub fn unallocatable_registers(&self) -> RegSet {
        self.unallocatable
    }

    pub fn allocatable_registers(&self) -> RegSet {
        self.allocatable
    }

    pub fn callee_saved_registers(&self) -> RegSet {
        self.callee_saved
    }

    pub fn caller_saved_registers(&self) -> RegSet {
        self.allocatable.difference(self.callee_saved)
    }

    /// The registers a caller must assume any call clobbers with its result,
    /// regardless of the callee's actual result kind.
    pub fn result_registers(&self) -> RegSet {
        self.result_registers
    }

    pub fn stack_slot_size(&self) -> u32 {
        self.stack_slot_size
    }

    /// Where a result of `kind` is reported. `None` for void.
    pub fn result_location(&self, kind: Kind) -> Option<Location> {
        if kind == Kind::Void {
            return None;
        }
        if let AbiVariant::Tree(_) = self.variant {
            return Some(Location::Register(TREE_RESULT_REGISTER));
        }
        let reg = match RegClass::of(kind) {
            RegClass::GeneralPurpose => Reg::RAX,
            RegClass::FloatingPoint => Reg::XMM0,
        };
        Some(Location::Register(reg))
    }

    /// Assign each parameter kind a location, in declaration order.
    pub fn parameter_locations(&self, purpose: SlotPurpose, kinds: &[Kind]) -> Vec<Location> {
        match &self.variant {
            AbiVariant::Tree(layout) => Self::baseline_frame_locations(layout, kinds),
            _ => self.register_parameter_locations(purpose, kinds),
        }
    }

    /// Register-based parameter resolution, as used for outgoing calls. Two
    /// passes: first hand out parameter registers, walking the integer and
    /// floating point sequences with independent cursors; then assign the
    /// overflow parameters strictly increasing stack offsets in declaration
    /// order.
    ///
    /// Tree conventions only describe OSR entry into an existing baseline
    /// frame; asking one for register-based resolution is a compiler bug.
    pub fn register_parameter_locations(&self, purpose: SlotPurpose, kinds: &[Kind]) -> Vec<Location> {
        if let AbiVariant::Tree(_) = self.variant {
            panic!("register-based parameter resolution on the tree calling convention");
        }
        let mut locations: Vec<Option<Location>> = vec![None; kinds.len()];
        let mut next_integer = 0;
        let mut next_fp = 0;
        for (i, kind) in kinds.iter().enumerate() {
            match RegClass::of(*kind) {
                RegClass::GeneralPurpose => {
                    if next_integer < self.integer_parameter_registers.len() {
                        locations[i] = Some(Location::Register(
                            self.integer_parameter_registers[next_integer],
                        ));
                        next_integer += 1;
                    }
                }
                RegClass::FloatingPoint => {
                    if next_fp < self.floating_point_parameter_registers.len() {
                        locations[i] = Some(Location::Register(
                            self.floating_point_parameter_registers[next_fp],
                        ));
                        next_fp += 1;
                    }
                }
            }
        }
        let mut offset = 0;
        locations
            .into_iter()
            .map(|loc| match loc {
                Some(l) => l,
                None => {
                    let l = Location::StackSlot { purpose, offset };
                    offset += self.stack_slot_size;
                    l
                }
            })
            .collect()
    }

    /// The tree (OSR) rule: parameter `i` lives exactly where the baseline
    /// frame keeps local slot `i`, with the baseline's return-address/frame
    /// -pointer/alignment header excluded, so no adapter frame is needed
    /// when resuming into the recompiled trace.
    fn baseline_frame_locations(layout: &BaselineFrameLayout, kinds: &[Kind]) -> Vec<Location> {
        let mut locations = Vec::with_capacity(kinds.len());
        let mut slot = 0;
        for kind in kinds {
            debug_assert_ne!(*kind, Kind::Void, "void parameter kind");
            locations.push(Location::StackSlot {
                purpose: SlotPurpose::Local,
                offset: layout.local_offset(slot) - layout.header_size,
            });
            slot += kind.slot_count();
        }
        locations
    }
}

/// The read-only registry of calling conventions, built once at startup and
/// consulted on every compilation. Shared freely between compiler threads;
/// nothing here is mutated after construction.
#[derive(Debug)]
pub struct EirAbis {
    roles: RegisterRoles,
    java: CallingConvention,
    c_function: CallingConvention,
    native_entry: CallingConvention,
    template: CallingConvention,
    trampoline: CallingConvention,
}

impl EirAbis {
    pub fn new(roles: RegisterRoles) -> Self {
        Self {
            roles,
            java: CallingConvention::java(&roles),
            c_function: CallingConvention::c_function(&roles, false),
            native_entry: CallingConvention::c_function(&roles, true),
            template: CallingConvention::template(&roles),
            trampoline: CallingConvention::trampoline(&roles),
        }
    }

    pub fn roles(&self) -> &RegisterRoles {
        &self.roles
    }

    pub fn java(&self) -> &CallingConvention {
        &self.java
    }

    pub fn c_function(&self) -> &CallingConvention {
        &self.c_function
    }

    /// The convention for native code calling into the VM.
    pub fn native_entry(&self) -> &CallingConvention {
        &self.native_entry
    }

    pub fn template(&self) -> &CallingConvention {
        &self.template
    }

    pub fn trampoline(&self) -> &CallingConvention {
        &self.trampoline
    }

    /// A tree (OSR) convention for one specific baseline frame. These are
    /// per-site, so they aren't cached here.
    pub fn tree(&self, layout: BaselineFrameLayout) -> CallingConvention {
        CallingConvention::tree(&self.roles, layout)
    }
}
