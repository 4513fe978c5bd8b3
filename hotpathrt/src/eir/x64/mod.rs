//! The AMD64 register catalog and register roles.

pub mod abi;

use crate::kind::Kind;
use static_assertions::const_assert;
use std::fmt;
use strum::{EnumCount, EnumIter, FromRepr};

/// One physical AMD64 register. General-purpose and floating-point registers
/// form two disjoint classes; a register never changes class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumCount, EnumIter, FromRepr)]
#[repr(u8)]
pub enum Reg {
    RAX = 0,
    RCX,
    RDX,
    RBX,
    RSP,
    RBP,
    RSI,
    RDI,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,

    XMM0,
    XMM1,
    XMM2,
    XMM3,
    XMM4,
    XMM5,
    XMM6,
    XMM7,
    XMM8,
    XMM9,
    XMM10,
    XMM11,
    XMM12,
    XMM13,
    XMM14,
    XMM15,
}

// [RegSet] packs one bit per register into a u64.
const_assert!(Reg::COUNT < 64);

impl Reg {
    /// Is this a floating point register?
    pub fn is_fp(self) -> bool {
        self as u8 >= Reg::XMM0 as u8
    }

    /// Is this a general purpose register?
    pub fn is_gp(self) -> bool {
        !self.is_fp()
    }

    pub fn class(self) -> RegClass {
        if self.is_fp() {
            RegClass::FloatingPoint
        } else {
            RegClass::GeneralPurpose
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reg::RAX => "rax",
            Reg::RCX => "rcx",
            Reg::RDX => "rdx",
            Reg::RBX => "rbx",
            Reg::RSP => "rsp",
            Reg::RBP => "rbp",
            Reg::RSI => "rsi",
            Reg::RDI => "rdi",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
            Reg::XMM0 => "xmm0",
            Reg::XMM1 => "xmm1",
            Reg::XMM2 => "xmm2",
            Reg::XMM3 => "xmm3",
            Reg::XMM4 => "xmm4",
            Reg::XMM5 => "xmm5",
            Reg::XMM6 => "xmm6",
            Reg::XMM7 => "xmm7",
            Reg::XMM8 => "xmm8",
            Reg::XMM9 => "xmm9",
            Reg::XMM10 => "xmm10",
            Reg::XMM11 => "xmm11",
            Reg::XMM12 => "xmm12",
            Reg::XMM13 => "xmm13",
            Reg::XMM14 => "xmm14",
            Reg::XMM15 => "xmm15",
        };
        write!(f, "{s}")
    }
}

/// The two register classes. Every value kind is carried in exactly one
/// class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegClass {
    GeneralPurpose,
    FloatingPoint,
}

impl RegClass {
    /// The register class that carries values of `kind`. `Void` values don't
    /// exist at runtime, so asking for their class is a compiler bug.
    pub fn of(kind: Kind) -> RegClass {
        match kind {
            Kind::Float | Kind::Double => RegClass::FloatingPoint,
            Kind::Boolean
            | Kind::Byte
            | Kind::Short
            | Kind::Char
            | Kind::Int
            | Kind::Long
            | Kind::Word
            | Kind::Reference => RegClass::GeneralPurpose,
            Kind::Void => panic!("no register class carries void values"),
        }
    }
}

/// A set of registers, one bit per [Reg].
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct RegSet(u64);

impl RegSet {
    pub const fn empty() -> Self {
        RegSet(0)
    }

    /// The set containing every register in the catalog.
    pub fn all() -> Self {
        RegSet((1u64 << Reg::COUNT) - 1)
    }

    fn bit(reg: Reg) -> u64 {
        1u64 << (reg as u8)
    }

    pub fn insert(&mut self, reg: Reg) {
        self.0 |= Self::bit(reg);
    }

    pub fn remove(&mut self, reg: Reg) {
        self.0 &= !Self::bit(reg);
    }

    pub fn contains(self, reg: Reg) -> bool {
        self.0 & Self::bit(reg) != 0
    }

    pub fn union(self, other: RegSet) -> RegSet {
        RegSet(self.0 | other.0)
    }

    pub fn intersection(self, other: RegSet) -> RegSet {
        RegSet(self.0 & other.0)
    }

    pub fn difference(self, other: RegSet) -> RegSet {
        RegSet(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Reg> {
        (0..Reg::COUNT as u8)
            .filter(move |i| self.0 & (1u64 << i) != 0)
            .map(|i| Reg::from_repr(i).unwrap())
    }
}

impl FromIterator<Reg> for RegSet {
    fn from_iter<I: IntoIterator<Item = Reg>>(iter: I) -> Self {
        let mut set = RegSet::empty();
        for reg in iter {
            set.insert(reg);
        }
        set
    }
}

impl fmt::Debug for RegSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// The fixed register roles on this platform. Constructed once at VM startup
/// and passed by reference to everything that needs it; there is no global
/// registry.
#[derive(Clone, Copy, Debug)]
pub struct RegisterRoles {
    pub stack_pointer: Reg,
    /// The register serving the frame-pointer role in optimized code. In the
    /// base convention this is the stack pointer itself.
    pub frame_pointer: Reg,
    /// The frame pointer used by baseline/template-compiled code, which needs
    /// the stack pointer free for its explicit operand stack.
    pub baseline_frame_pointer: Reg,
    /// Holds the safepoint latch; reads through it trigger safepoint traps.
    pub safepoint_latch: Reg,
    pub integer_scratch: Reg,
    pub floating_point_scratch: Reg,
}

impl RegisterRoles {
    pub fn unix_amd64() -> Self {
        Self {
            stack_pointer: Reg::RSP,
            frame_pointer: Reg::RSP,
            baseline_frame_pointer: Reg::RBP,
            safepoint_latch: Reg::R14,
            integer_scratch: Reg::R11,
            floating_point_scratch: Reg::XMM15,
        }
    }

    /// The scratch register for values of `kind`.
    pub fn scratch_for(&self, kind: Kind) -> Reg {
        match RegClass::of(kind) {
            RegClass::GeneralPurpose => self.integer_scratch,
            RegClass::FloatingPoint => self.floating_point_scratch,
        }
    }
}
