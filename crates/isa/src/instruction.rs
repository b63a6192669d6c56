//! Opcode table and instruction encoding.

use std::fmt;

use crate::{MODE_BIT, OPCODE_SHIFT};

/// The fifteen operations of the machine, by opcode nibble.
///
/// Nibble `0` is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Opcode {
    /// Flags from `AC.lo - B`.
    Cmp = 1,
    /// Branch to `EA` if minus.
    Bmi = 2,
    /// Load the immediate operand into `AC.lo`.
    La = 3,
    /// Branch to `EA`.
    Jmp = 4,
    /// Branch to `EA` if zero.
    Beq = 5,
    /// `AC.lo |= B`
    Or = 6,
    /// `AC.lo &= B`
    And = 7,
    /// `AC.lo ^= B`
    Xor = 8,
    /// Set carry.
    Sec = 9,
    /// Clear carry.
    Clc = 10,
    /// `AC.lo + B + carry`, carry out into carry.
    Add = 11,
    /// Rotate `AC.lo` right through carry.
    Ror = 12,
    /// Rotate `AC.lo` left through carry.
    Rol = 13,
    /// `AC.lo = mem[EA].lo`
    Load = 14,
    /// `mem[EA] = AC`
    Store = 15,
}

/// How an instruction prints its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    None,
    Immediate,
    Address,
}

impl Opcode {
    /// Every opcode, in nibble order.
    pub const ALL: [Opcode; 15] = [
        Opcode::Cmp,
        Opcode::Bmi,
        Opcode::La,
        Opcode::Jmp,
        Opcode::Beq,
        Opcode::Or,
        Opcode::And,
        Opcode::Xor,
        Opcode::Sec,
        Opcode::Clc,
        Opcode::Add,
        Opcode::Ror,
        Opcode::Rol,
        Opcode::Load,
        Opcode::Store,
    ];

    /// Returns the opcode nibble.
    pub fn nibble(self) -> u8 {
        self as u8
    }

    /// Looks up the opcode for a nibble. Only the low four bits are used;
    /// `0` has no opcode.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble & 0xF {
            0 => None,
            n => Some(Self::ALL[usize::from(n) - 1]),
        }
    }

    /// Looks up an opcode by its assembler mnemonic.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == mnemonic)
    }

    /// Assembler mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Cmp => "cmp",
            Opcode::Bmi => "bmi",
            Opcode::La => "la",
            Opcode::Jmp => "jmp",
            Opcode::Beq => "beq",
            Opcode::Or => "or",
            Opcode::And => "and",
            Opcode::Xor => "xor",
            Opcode::Sec => "sec",
            Opcode::Clc => "clc",
            Opcode::Add => "add",
            Opcode::Ror => "ror",
            Opcode::Rol => "rol",
            Opcode::Load => "load",
            Opcode::Store => "store",
        }
    }

    fn operand_kind(self) -> OperandKind {
        match self {
            Opcode::Sec | Opcode::Clc | Opcode::Ror | Opcode::Rol => OperandKind::None,
            Opcode::Cmp | Opcode::La | Opcode::Or | Opcode::And | Opcode::Xor | Opcode::Add => {
                OperandKind::Immediate
            }
            Opcode::Bmi | Opcode::Jmp | Opcode::Beq | Opcode::Load | Opcode::Store => {
                OperandKind::Address
            }
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction word.
///
/// Layout, LSB = bit 0: operand in bits 0..8, opcode nibble in bits 8..12,
/// addressing mode in bit 12. Bits 13..16 are ignored.
///
/// In direct mode the effective address is the low address bits of the
/// operand and ALU operations use the operand as an immediate. In indirect
/// mode the effective address comes from the accumulator and ALU operations
/// use the low byte of the word stored there. `la` always loads the operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Opcode nibble, `0..16`.
    pub nibble: u8,
    /// Addressing mode: `false` = immediate/direct, `true` = via accumulator.
    pub indirect: bool,
    /// Operand byte.
    pub operand: u8,
}

impl Instruction {
    /// Direct-mode instruction.
    pub fn new(opcode: Opcode, operand: u8) -> Self {
        Self {
            nibble: opcode.nibble(),
            indirect: false,
            operand,
        }
    }

    /// Indirect-mode instruction addressing through the accumulator.
    pub fn indirect(opcode: Opcode) -> Self {
        Self {
            nibble: opcode.nibble(),
            indirect: true,
            operand: 0,
        }
    }

    /// Operand-less instruction.
    pub fn implied(opcode: Opcode) -> Self {
        Self::new(opcode, 0)
    }

    /// Splits a 16-bit word into its fields.
    pub fn decode(word: u16) -> Self {
        Self {
            nibble: ((word >> OPCODE_SHIFT) & 0xF) as u8,
            indirect: (word >> MODE_BIT) & 1 == 1,
            operand: (word & 0xFF) as u8,
        }
    }

    /// Packs the fields into a 16-bit word.
    pub fn encode(&self) -> u16 {
        (u16::from(self.indirect) << MODE_BIT)
            | (u16::from(self.nibble & 0xF) << OPCODE_SHIFT)
            | u16::from(self.operand)
    }

    /// Opcode, or `None` for the unassigned nibble.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_nibble(self.nibble)
    }
}

impl From<Instruction> for u16 {
    fn from(instruction: Instruction) -> Self {
        instruction.encode()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(opcode) = self.opcode() else {
            return write!(f, "illegal");
        };

        match opcode.operand_kind() {
            OperandKind::None => write!(f, "{opcode}"),
            OperandKind::Immediate if opcode == Opcode::La => {
                write!(f, "{opcode} #{}", self.operand)
            }
            _ if self.indirect => write!(f, "{opcode} [ac]"),
            OperandKind::Immediate => write!(f, "{opcode} #{}", self.operand),
            OperandKind::Address => write!(f, "{opcode} @{}", self.operand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_round_trip() {
        assert_eq!(Opcode::from_nibble(0), None);
        for (i, op) in Opcode::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(op.nibble()), i + 1);
            assert_eq!(Opcode::from_nibble(op.nibble()), Some(op));
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::Store.nibble(), 15);
        assert_eq!(Opcode::La.nibble(), 3);
    }

    #[test]
    fn test_encoding() {
        assert_eq!(Instruction::new(Opcode::La, 5).encode(), 0x0305);
        assert_eq!(Instruction::new(Opcode::Store, 10).encode(), 0x0F0A);
        assert_eq!(Instruction::indirect(Opcode::Load).encode(), 0x1E00);

        let decoded = Instruction::decode(0xFF42);
        assert_eq!(decoded.opcode(), Some(Opcode::Store));
        assert!(decoded.indirect);
        assert_eq!(decoded.operand, 0x42);
        // Bits 13..16 do not survive decoding.
        assert_eq!(decoded.encode(), 0x1F42);
    }

    #[test]
    fn test_disassembly() {
        assert_eq!(Instruction::new(Opcode::La, 5).to_string(), "la #5");
        assert_eq!(Instruction::new(Opcode::Store, 10).to_string(), "store @10");
        assert_eq!(Instruction::new(Opcode::Add, 3).to_string(), "add #3");
        assert_eq!(Instruction::indirect(Opcode::Add).to_string(), "add [ac]");
        assert_eq!(Instruction::implied(Opcode::Rol).to_string(), "rol");
        assert_eq!(Instruction::decode(0x0007).to_string(), "illegal");
    }
}
