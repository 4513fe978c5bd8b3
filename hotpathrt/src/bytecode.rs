//! The subset of JVM opcodes this crate dispatches on.
//!
//! Only the operand-stack shuffle opcodes are interpreted here (by
//! [State::execute](crate::state::State::execute)); the remaining variants
//! exist so that callers can hand us any opcode and hit the dispatcher's
//! fatal-error path for ones we don't model.

use std::fmt;
use strum::FromRepr;

/// A JVM bytecode opcode. The discriminants are the opcode byte values from
/// the JVM specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Pop = 87,
    Pop2 = 88,
    Dup = 89,
    DupX1 = 90,
    DupX2 = 91,
    Dup2 = 92,
    Dup2X1 = 93,
    Dup2X2 = 94,
    Swap = 95,
    Iadd = 96,
    Ladd = 97,
    Goto = 167,
    Ireturn = 172,
    Return = 177,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Opcode::Nop => "nop",
            Opcode::Pop => "pop",
            Opcode::Pop2 => "pop2",
            Opcode::Dup => "dup",
            Opcode::DupX1 => "dup_x1",
            Opcode::DupX2 => "dup_x2",
            Opcode::Dup2 => "dup2",
            Opcode::Dup2X1 => "dup2_x1",
            Opcode::Dup2X2 => "dup2_x2",
            Opcode::Swap => "swap",
            Opcode::Iadd => "iadd",
            Opcode::Ladd => "ladd",
            Opcode::Goto => "goto",
            Opcode::Ireturn => "ireturn",
            Opcode::Return => "return",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::Opcode;

    #[test]
    fn opcode_bytes() {
        assert_eq!(Opcode::from_repr(89), Some(Opcode::Dup));
        assert_eq!(Opcode::from_repr(95), Some(Opcode::Swap));
        assert_eq!(Opcode::from_repr(1), None);
    }
}
