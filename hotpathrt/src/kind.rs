//! Value kinds as seen by the calling-convention layer and the symbolic
//! evaluation stack.

use strum::{EnumCount, EnumIter};

/// The kind of a value flowing through the compiler. This mirrors the JVM's
/// type taxonomy, with `Word` covering raw machine words the VM itself
/// manipulates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumCount, EnumIter)]
pub enum Kind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Word,
    Reference,
    Void,
}

impl Kind {
    /// Does a value of this kind occupy two consecutive operand-stack slots?
    pub fn is_category2(self) -> bool {
        matches!(self, Kind::Long | Kind::Double)
    }

    /// How many operand-stack slots a value of this kind occupies.
    pub fn slot_count(self) -> usize {
        match self {
            Kind::Void => 0,
            Kind::Long | Kind::Double => 2,
            _ => 1,
        }
    }

    /// The kind used for operand-stack verification: all sub-int kinds
    /// collapse to `Int`, every other kind verifies as itself.
    pub fn stack_kind(self) -> Kind {
        match self {
            Kind::Boolean | Kind::Byte | Kind::Short | Kind::Char => Kind::Int,
            k => k,
        }
    }
}
