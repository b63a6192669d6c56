//! Control unit: one fetch, decode, memory, execute, writeback cycle.
//!
//! Every phase evaluates every candidate and combines them with the decoded
//! selectors, so the gates evaluated in a cycle are the same for every
//! program and every state.

use encvm_gates::{CryptoContext, EncryptedBit, EncryptedWord, GateLibrary, GateStats, Word};
use encvm_isa::{DATA_BITS, MODE_BIT, OPCODE_BITS, OPCODE_SHIFT, Opcode};
use tracing::debug;

use crate::alu;
use crate::memory::ObliviousMemory;

/// Encrypted register file.
#[derive(Debug, Clone)]
pub struct Registers<T> {
    /// Program counter, one bit per address bit.
    pub pc: EncryptedWord<T>,
    /// Accumulator, a full memory word.
    pub ac: EncryptedWord<T>,
    /// Carry flag.
    pub carry: EncryptedBit<T>,
    /// Zero flag.
    pub zero: EncryptedBit<T>,
    /// Minus flag.
    pub minus: EncryptedBit<T>,
    /// Last word returned by the memory stage.
    pub staging: EncryptedWord<T>,
}

/// Encryptions of the constants the cycle needs, made once at load time.
#[derive(Debug, Clone)]
pub(crate) struct Constants<T> {
    pub(crate) one: EncryptedBit<T>,
}

/// Output of the decode phase.
#[derive(Debug)]
pub(crate) struct Decoded<T> {
    /// One selector per opcode, indexed by `nibble - 1`.
    selectors: Vec<EncryptedBit<T>>,
    indirect: EncryptedBit<T>,
    operand: EncryptedWord<T>,
}

impl<T> Decoded<T> {
    pub(crate) fn selector(&self, opcode: Opcode) -> &EncryptedBit<T> {
        &self.selectors[usize::from(opcode.nibble()) - 1]
    }
}

/// Everything one cycle reads and writes.
pub(crate) struct Cycle<'a, 'c, C: CryptoContext> {
    pub(crate) gates: &'a GateLibrary<'c, C>,
    pub(crate) constants: &'a Constants<C::Ciphertext>,
    pub(crate) parallel: bool,
    pub(crate) index: u64,
}

impl<C: CryptoContext> Cycle<'_, '_, C> {
    /// Runs one full cycle, replacing `registers` and updating `memory`.
    pub(crate) fn run(
        &self,
        registers: &mut Registers<C::Ciphertext>,
        memory: &mut ObliviousMemory<C::Ciphertext>,
    ) {
        let instruction = self.fetch(registers, memory);
        let decoded = self.decode(&instruction);
        let (ea, loaded) = self.memory_stage(&decoded, registers, memory);
        *registers = self.execute(&decoded, registers, ea, loaded);
    }

    fn fetch(
        &self,
        registers: &Registers<C::Ciphertext>,
        memory: &mut ObliviousMemory<C::Ciphertext>,
    ) -> Word<C> {
        let before = self.gates.stats();
        let instruction = memory.access(
            self.gates,
            &registers.pc,
            &registers.ac,
            &self.constants.one,
            &registers.staging,
            self.parallel,
        );
        self.trace_phase("fetch", before);
        instruction
    }

    /// Negates the opcode bits once, then ANDs one pattern per opcode.
    pub(crate) fn decode(&self, instruction: &Word<C>) -> Decoded<C::Ciphertext> {
        let before = self.gates.stats();
        let nibble = &instruction.bits()[OPCODE_SHIFT..OPCODE_SHIFT + OPCODE_BITS];
        let patterns: Vec<u64> = Opcode::ALL.iter().map(|op| u64::from(op.nibble())).collect();
        let selectors = self.gates.match_patterns(nibble, &patterns);
        self.trace_phase("decode", before);

        Decoded {
            selectors,
            indirect: instruction.bit(MODE_BIT).clone(),
            operand: instruction.slice(0..DATA_BITS),
        }
    }

    /// Computes the effective address, then stores the accumulator there for
    /// `store` or reads it for everything else. Returns the effective address
    /// and the memory stage result, which becomes the new staging word.
    fn memory_stage(
        &self,
        decoded: &Decoded<C::Ciphertext>,
        registers: &Registers<C::Ciphertext>,
        memory: &mut ObliviousMemory<C::Ciphertext>,
    ) -> (Word<C>, Word<C>) {
        let before = self.gates.stats();
        let address_bits = registers.pc.width();
        let ea = self.gates.select_word(
            &decoded.indirect,
            &registers.ac.slice(0..address_bits),
            &decoded.operand.slice(0..address_bits),
        );
        let read = self.gates.not(decoded.selector(Opcode::Store));
        let loaded = memory.access(
            self.gates,
            &ea,
            &registers.ac,
            &read,
            &registers.staging,
            self.parallel,
        );
        self.trace_phase("memory", before);
        (ea, loaded)
    }

    /// Evaluates every candidate result and writes back the selected one.
    fn execute(
        &self,
        decoded: &Decoded<C::Ciphertext>,
        registers: &Registers<C::Ciphertext>,
        ea: Word<C>,
        loaded: Word<C>,
    ) -> Registers<C::Ciphertext> {
        use Opcode::*;

        let gates = self.gates;
        let sel = |op: Opcode| decoded.selector(op);
        let before = gates.stats();

        let ac = registers.ac.slice(0..DATA_BITS);
        let loaded_lo = loaded.slice(0..DATA_BITS);
        let b = gates.select_word(&decoded.indirect, &loaded_lo, &decoded.operand);

        let (rol, rol_carry) = alu::rotate_left(&ac, &registers.carry);
        let (ror, ror_carry) = alu::rotate_right(&ac, &registers.carry);
        let (sum, sum_carry) = alu::add(gates, &ac, &b, &registers.carry);
        let xor = alu::xor_word(gates, &ac, &b);
        let and = alu::and_word(gates, &ac, &b);
        let or = alu::or_word(gates, &ac, &b);
        let (diff, _) = alu::add(gates, &ac, &alu::not_word(gates, &b), &self.constants.one);
        let next_pc = alu::increment(gates, &registers.pc);
        self.trace_phase("execute", before);

        let before = gates.stats();

        // Selectors are mutually exclusive, so XOR combines them like OR.
        let keep = gates.xor_all(&[
            sel(Store),
            sel(Clc),
            sel(Sec),
            sel(Beq),
            sel(Jmp),
            sel(Bmi),
            sel(Cmp),
        ]);
        let result = gates.mux(&[
            (sel(Load), &loaded_lo),
            (sel(La), &decoded.operand),
            (sel(Rol), &rol),
            (sel(Ror), &ror),
            (sel(Add), &sum),
            (sel(Xor), &xor),
            (sel(And), &and),
            (sel(Or), &or),
            (&keep, &ac),
        ]);

        let carry_writers = gates.xor_all(&[sel(Add), sel(Rol), sel(Ror), sel(Clc), sel(Sec)]);
        let carry = gates.xor_all(&[
            gates.and(sel(Add), &sum_carry),
            gates.and(sel(Rol), &rol_carry),
            gates.and(sel(Ror), &ror_carry),
            sel(Sec).clone(),
            gates.and(&gates.not(&carry_writers), &registers.carry),
        ]);

        let branch_test = gates.xor(sel(Beq), sel(Bmi));
        let held_zero = gates.and(&branch_test, &registers.zero);
        let zero = gates.select(
            sel(Cmp),
            &alu::is_zero(gates, &diff),
            &gates.or(&alu::is_zero(gates, &result), &held_zero),
        );
        let minus = gates.select(sel(Cmp), diff.bit(DATA_BITS - 1), &registers.minus);

        let taken = gates.xor_all(&[
            sel(Jmp).clone(),
            gates.and(sel(Bmi), &minus),
            gates.and(sel(Beq), &zero),
        ]);
        let pc = gates.select_word(&taken, &ea, &next_pc);
        self.trace_phase("writeback", before);

        Registers {
            pc,
            ac: registers.ac.with_low_bits(&result),
            carry,
            zero,
            minus,
            staging: loaded,
        }
    }

    fn trace_phase(&self, phase: &str, before: GateStats) {
        let used = self.gates.stats().since(&before);
        debug!(
            cycle = self.index,
            phase,
            and = used.and,
            xor = used.xor,
            not = used.not,
            refresh = used.refresh,
            "phase complete"
        );
    }
}

/// Runs only the decode phase, returning the selectors by `nibble - 1`.
#[cfg(test)]
pub(crate) fn decode_selectors<C: CryptoContext>(
    gates: &GateLibrary<'_, C>,
    instruction: &Word<C>,
) -> Vec<EncryptedBit<C::Ciphertext>> {
    let constants = Constants {
        one: gates.encrypt(true),
    };
    let cycle = Cycle {
        gates,
        constants: &constants,
        parallel: false,
        index: 0,
    };
    cycle.decode(instruction).selectors
}
