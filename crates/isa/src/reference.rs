//! Plaintext reference interpreter.
//!
//! Executes the instruction set exactly as the encrypted machine's gate
//! network does, including the behaviour of the unassigned opcode and the
//! internal staging register, so the two can be compared word for word.

use std::fmt;

use crate::{FitError, Geometry, Instruction, Opcode, ProgramImage};

/// Plaintext register file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    /// Program counter; only the address bits are meaningful.
    pub pc: u16,
    /// Accumulator.
    pub ac: u16,
    /// Carry flag.
    pub carry: bool,
    /// Zero flag.
    pub zero: bool,
    /// Minus flag.
    pub minus: bool,
    /// Last word read by the memory stage.
    pub staging: u16,
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, name: char| if set { name } else { '-' };
        write!(
            f,
            "pc={:#04x} ac={:#06x} flags={}{}{} staging={:#06x}",
            self.pc,
            self.ac,
            flag(self.carry, 'C'),
            flag(self.zero, 'Z'),
            flag(self.minus, 'M'),
            self.staging
        )
    }
}

/// The machine in plaintext.
#[derive(Debug, Clone)]
pub struct ReferenceMachine {
    geometry: Geometry,
    memory: Vec<u16>,
    registers: Registers,
    cycles: u64,
}

impl ReferenceMachine {
    /// Loads `image` into a memory of shape `geometry`.
    pub fn new(geometry: Geometry, image: &ProgramImage) -> Result<Self, FitError> {
        let memory = image.memory(geometry)?;
        Ok(Self {
            geometry,
            memory,
            registers: Registers {
                pc: image.pc,
                ac: image.ac,
                ..Registers::default()
            },
            cycles: 0,
        })
    }

    /// Memory geometry.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Memory contents.
    pub fn memory(&self) -> &[u16] {
        &self.memory
    }

    /// Register file.
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Number of cycles executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs `cycles` cycles.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.step();
        }
    }

    /// Runs one fetch, decode, memory, execute, writeback cycle.
    pub fn step(&mut self) {
        let mask = self.geometry.address_mask();
        let regs = self.registers;

        // Fetch.
        let instruction = Instruction::decode(self.memory[usize::from(regs.pc & mask)]);
        let opcode = instruction.opcode();
        let is = |op: Opcode| opcode == Some(op);

        // Memory: a store writes the accumulator, everything else reads.
        let ea = if instruction.indirect {
            regs.ac & mask
        } else {
            u16::from(instruction.operand) & mask
        };
        let staging = if is(Opcode::Store) {
            self.memory[usize::from(ea)] = regs.ac;
            regs.staging
        } else {
            self.memory[usize::from(ea)]
        };
        let b = if instruction.indirect {
            low_byte(staging)
        } else {
            instruction.operand
        };

        // Execute.
        let ac = low_byte(regs.ac);
        let carry_in = u8::from(regs.carry);
        let sum = u16::from(ac) + u16::from(b) + u16::from(carry_in);
        let diff = ac.wrapping_add(!b).wrapping_add(1);

        let (result, carry) = match opcode {
            Some(Opcode::Load) => (low_byte(staging), regs.carry),
            Some(Opcode::La) => (instruction.operand, regs.carry),
            Some(Opcode::Rol) => ((ac << 1) | carry_in, ac & 0x80 != 0),
            Some(Opcode::Ror) => ((ac >> 1) | (carry_in << 7), ac & 1 != 0),
            Some(Opcode::Add) => (low_byte(sum), sum > 0xFF),
            Some(Opcode::Xor) => (ac ^ b, regs.carry),
            Some(Opcode::And) => (ac & b, regs.carry),
            Some(Opcode::Or) => (ac | b, regs.carry),
            Some(Opcode::Clc) => (ac, false),
            Some(Opcode::Sec) => (ac, true),
            Some(
                Opcode::Store | Opcode::Beq | Opcode::Jmp | Opcode::Bmi | Opcode::Cmp,
            ) => (ac, regs.carry),
            // No selector fires: the result mux yields zero.
            None => (0, regs.carry),
        };

        // Writeback.
        let (zero, minus) = if is(Opcode::Cmp) {
            (diff == 0, diff & 0x80 != 0)
        } else {
            let held = regs.zero && (is(Opcode::Beq) || is(Opcode::Bmi));
            (result == 0 || held, regs.minus)
        };

        let taken =
            is(Opcode::Jmp) || (is(Opcode::Bmi) && minus) || (is(Opcode::Beq) && zero);
        let pc = if taken {
            ea
        } else {
            regs.pc.wrapping_add(1) & mask
        };

        self.registers = Registers {
            pc,
            ac: (regs.ac & 0xFF00) | u16::from(result),
            carry,
            zero,
            minus,
            staging,
        };
        self.cycles += 1;
    }
}

fn low_byte(word: u16) -> u8 {
    (word & 0xFF) as u8
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::Opcode::*;

    fn program(instructions: &[Instruction]) -> ProgramImage {
        ProgramImage::from_words(instructions.iter().map(|i| i.encode()).collect::<Vec<_>>())
    }

    fn small() -> Geometry {
        Geometry::new(2, 2).unwrap()
    }

    #[test]
    fn test_la_store() {
        let image = program(&[Instruction::new(La, 5), Instruction::new(Store, 10)]);
        let mut machine = ReferenceMachine::new(Geometry::default(), &image).unwrap();
        machine.run(2);
        assert_eq!(machine.memory()[10], 5);
        assert_eq!(machine.registers().ac, 5);
        assert_eq!(machine.registers().pc, 2);
        assert_eq!(machine.cycles(), 2);
    }

    #[test]
    fn test_beq_taken_on_zero_accumulator() {
        let image = program(&[Instruction::new(Beq, 9)]);
        let mut machine = ReferenceMachine::new(small(), &image).unwrap();
        machine.step();
        assert_eq!(machine.registers().pc, 9);
        assert!(machine.registers().zero);
    }

    #[test]
    fn test_zero_cycles_keeps_image() {
        let image = program(&[Instruction::new(La, 1)]).with_pc(3).with_ac(0x1234);
        let mut machine = ReferenceMachine::new(small(), &image).unwrap();
        machine.run(0);
        assert_eq!(machine.registers().pc, 3);
        assert_eq!(machine.registers().ac, 0x1234);
        assert_eq!(machine.memory()[0], 0x0301);
    }

    #[test]
    fn test_add_with_carry() {
        let image = program(&[
            Instruction::new(La, 0xF0),
            Instruction::new(Add, 0x20),
            Instruction::new(Add, 0x00),
        ])
        .with_ac(0xAB00);
        let mut machine = ReferenceMachine::new(small(), &image).unwrap();

        machine.run(2);
        assert_eq!(machine.registers().ac, 0xAB10);
        assert!(machine.registers().carry);

        machine.step();
        assert_eq!(machine.registers().ac, 0xAB11);
        assert!(!machine.registers().carry);
    }

    #[test]
    fn test_rotates_through_carry() {
        let image = program(&[
            Instruction::new(La, 0x81),
            Instruction::implied(Rol),
            Instruction::implied(Rol),
            Instruction::implied(Ror),
        ]);
        let mut machine = ReferenceMachine::new(small(), &image).unwrap();

        machine.run(2);
        assert_eq!(machine.registers().ac, 0x02);
        assert!(machine.registers().carry);

        machine.step();
        assert_eq!(machine.registers().ac, 0x05);
        assert!(!machine.registers().carry);

        machine.step();
        assert_eq!(machine.registers().ac, 0x02);
        assert!(machine.registers().carry);
    }

    #[test]
    fn test_cmp_and_bmi() {
        let image = program(&[
            Instruction::new(La, 3),
            Instruction::new(Cmp, 7),
            Instruction::new(Bmi, 12),
        ]);
        let mut machine = ReferenceMachine::new(small(), &image).unwrap();
        machine.run(2);
        assert!(machine.registers().minus);
        assert!(!machine.registers().zero);
        assert_eq!(machine.registers().ac, 3);

        machine.step();
        assert_eq!(machine.registers().pc, 12);
    }

    #[test]
    fn test_indirect_load_and_store() {
        let mut words = vec![
            Instruction::new(La, 13).encode(),
            Instruction::indirect(Load).encode(),
            Instruction::indirect(Store).encode(),
        ];
        words.resize(16, 0);
        words[13] = 0xBE0D;
        let mut machine = ReferenceMachine::new(small(), &ProgramImage::from_words(words)).unwrap();

        machine.run(2);
        // Low byte 0x0D points back at cell 13.
        assert_eq!(machine.registers().ac, 0x000D);
        assert_eq!(machine.registers().staging, 0xBE0D);

        machine.step();
        assert_eq!(machine.memory()[13], 0x000D);
        assert_eq!(machine.registers().staging, 0xBE0D);
    }

    #[test]
    fn test_unassigned_opcode_clears_accumulator() {
        let image = ProgramImage::from_words([0x0000u16]).with_ac(0x12FF);
        let mut machine = ReferenceMachine::new(small(), &image).unwrap();
        machine.step();
        assert_eq!(machine.registers().ac, 0x1200);
        assert!(machine.registers().zero);
        assert_eq!(machine.registers().pc, 1);
    }

    #[test]
    fn test_pc_wraps() {
        let image = ProgramImage::default().with_pc(15);
        let mut machine = ReferenceMachine::new(small(), &image).unwrap();
        machine.step();
        assert_eq!(machine.registers().pc, 0);
    }

    #[test]
    fn test_random_programs_stay_in_bounds() {
        let mut rng = ChaCha20Rng::seed_from_u64(0xE7C);
        let geometry = small();
        for _ in 0..64 {
            let words: Vec<u16> = (0..geometry.capacity()).map(|_| rng.random()).collect();
            let image = ProgramImage::from_words(words).with_ac(rng.random());
            let mut machine = ReferenceMachine::new(geometry, &image).unwrap();
            machine.run(32);
            assert!(machine.registers().pc <= geometry.address_mask());
            assert_eq!(machine.memory().len(), geometry.capacity());
        }
    }
}
