//! The machine: loading, the cycle loop and the final dump.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use encvm_gates::{CryptoContext, EncryptedWord, GateLibrary, GateStats};
use encvm_isa::{Geometry, MemoryListing, ProgramImage, WORD_BITS};
use tracing::{debug, info};

use crate::control::{Constants, Cycle, Registers};
use crate::error::LoadError;
use crate::memory::ObliviousMemory;

/// Machine configuration besides the cycle count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MachineConfig {
    /// Memory shape, which also fixes the program counter width.
    pub geometry: Geometry,
    /// Spread memory scans over the rayon pool.
    pub parallel: bool,
    /// Decrypt and log the registers after every cycle. Debugging only: this
    /// uses the secret key while running.
    pub trace_registers: bool,
}

impl MachineConfig {
    /// Sequential configuration for `geometry`.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }
}

/// Initial machine state, encrypted.
#[derive(Debug, Clone)]
pub struct EncryptedImage<T> {
    /// Memory words from address 0. Missing words are encryptions of zero.
    pub memory: Vec<EncryptedWord<T>>,
    /// Initial program counter, one bit per address bit.
    pub pc: EncryptedWord<T>,
    /// Initial accumulator.
    pub ac: EncryptedWord<T>,
}

impl<T> EncryptedImage<T> {
    /// Encrypts a plaintext image for a machine of shape `geometry`.
    pub fn encrypt<C>(
        context: &C,
        image: &ProgramImage,
        geometry: Geometry,
    ) -> Result<Self, LoadError>
    where
        C: CryptoContext<Ciphertext = T>,
    {
        image.check_fits(geometry)?;

        let gates = GateLibrary::new(context);
        Ok(Self {
            memory: image
                .words
                .iter()
                .map(|word| gates.encrypt_word(u64::from(*word), WORD_BITS))
                .collect(),
            pc: gates.encrypt_word(u64::from(image.pc), geometry.address_bits() as usize),
            ac: gates.encrypt_word(u64::from(image.ac), WORD_BITS),
        })
    }
}

/// Final memory and registers of a run, still encrypted.
#[derive(Debug, Clone)]
pub struct MachineDump<T> {
    /// Memory in address order.
    pub memory: Vec<EncryptedWord<T>>,
    /// Register file.
    pub registers: Registers<T>,
    /// Gates evaluated during the run.
    pub stats: GateStats,
    /// Cycles executed.
    pub cycles: u64,
}

impl<T> MachineDump<T> {
    /// Decrypts the dump for display.
    pub fn decrypt<C>(&self, context: &C) -> DecryptedDump
    where
        C: CryptoContext<Ciphertext = T>,
    {
        let gates = GateLibrary::new(context);
        DecryptedDump {
            memory: self.memory.iter().map(|word| decrypt_u16(&gates, word)).collect(),
            registers: decrypt_registers(&gates, &self.registers),
            stats: self.stats,
            cycles: self.cycles,
        }
    }
}

/// Plaintext view of a [`MachineDump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedDump {
    /// Memory in address order.
    pub memory: Vec<u16>,
    /// Register file.
    pub registers: encvm_isa::Registers,
    /// Gates evaluated during the run.
    pub stats: GateStats,
    /// Cycles executed.
    pub cycles: u64,
}

impl fmt::Display for DecryptedDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cycles: {}", self.cycles)?;
        writeln!(f, "gates: {}", self.stats)?;
        writeln!(f, "{}", self.registers)?;
        write!(f, "{}", MemoryListing(&self.memory))
    }
}

/// The encrypted stored-program computer.
///
/// Runs a fixed number of cycles and never decrypts while doing so, unless
/// [`MachineConfig::trace_registers`] is set.
pub struct Machine<'c, C: CryptoContext> {
    gates: GateLibrary<'c, C>,
    config: MachineConfig,
    memory: ObliviousMemory<C::Ciphertext>,
    registers: Registers<C::Ciphertext>,
    constants: Constants<C::Ciphertext>,
    cycles: u64,
}

impl<C: CryptoContext> fmt::Debug for Machine<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("config", &self.config)
            .field("cycles", &self.cycles)
            .field("stats", &self.gates.stats())
            .finish_non_exhaustive()
    }
}

impl<'c, C: CryptoContext> Machine<'c, C> {
    /// Loads `image`, padding memory with encryptions of zero.
    ///
    /// Fails without running anything if the image does not fit the
    /// configured geometry.
    pub fn new(
        context: &'c C,
        config: MachineConfig,
        image: EncryptedImage<C::Ciphertext>,
    ) -> Result<Self, LoadError> {
        let geometry = config.geometry;
        let capacity = geometry.capacity();
        let address_bits = geometry.address_bits() as usize;

        if image.memory.len() > capacity {
            return Err(LoadError::ImageTooLarge {
                words: image.memory.len(),
                capacity,
            });
        }
        if let Some((address, word)) = image
            .memory
            .iter()
            .enumerate()
            .find(|(_, word)| word.width() != WORD_BITS)
        {
            return Err(LoadError::WordWidth {
                address,
                width: word.width(),
                expected: WORD_BITS,
            });
        }
        if image.pc.width() != address_bits {
            return Err(LoadError::PcWidth {
                width: image.pc.width(),
                expected: address_bits,
            });
        }
        if image.ac.width() != WORD_BITS {
            return Err(LoadError::AcWidth {
                width: image.ac.width(),
                expected: WORD_BITS,
            });
        }

        let gates = GateLibrary::new(context);
        let mut cells = image.memory;
        cells.resize_with(capacity, || gates.encrypt_word(0, WORD_BITS));

        let registers = Registers {
            pc: image.pc,
            ac: image.ac,
            carry: gates.encrypt(false),
            zero: gates.encrypt(false),
            minus: gates.encrypt(false),
            staging: gates.encrypt_word(0, WORD_BITS),
        };
        let constants = Constants {
            one: gates.encrypt(true),
        };

        info!(
            rows = geometry.rows(),
            cols = geometry.cols(),
            parallel = config.parallel,
            "machine loaded"
        );

        Ok(Self {
            gates,
            config,
            memory: ObliviousMemory::new(geometry, cells),
            registers,
            constants,
            cycles: 0,
        })
    }

    /// Runs one full cycle.
    pub fn step(&mut self) {
        let before = self.gates.stats();
        let cycle = Cycle {
            gates: &self.gates,
            constants: &self.constants,
            parallel: self.config.parallel,
            index: self.cycles,
        };
        cycle.run(&mut self.registers, &mut self.memory);
        self.cycles += 1;

        let used = self.gates.stats().since(&before);
        debug!(cycle = self.cycles, gates = %used, "cycle complete");

        if self.config.trace_registers {
            self.trace_registers();
        }
    }

    /// Runs exactly `cycles` cycles.
    pub fn run(&mut self, cycles: u64) {
        self.run_until(cycles, &AtomicBool::new(false));
    }

    /// Runs up to `cycles` cycles, checking `stop` before each one.
    ///
    /// A stop request never interrupts a cycle. Returns the number of cycles
    /// completed by this call.
    pub fn run_until(&mut self, cycles: u64, stop: &AtomicBool) -> u64 {
        self.run_observed(cycles, stop, |_| {})
    }

    /// [`Machine::run_until`], calling `on_cycle` after every completed
    /// cycle. The observer may set `stop`.
    pub fn run_observed<F>(&mut self, cycles: u64, stop: &AtomicBool, mut on_cycle: F) -> u64
    where
        F: FnMut(&Self),
    {
        info!(cycles, "running");
        let mut completed = 0;
        while completed < cycles {
            if stop.load(Ordering::Relaxed) {
                info!(completed, "stop requested");
                break;
            }
            self.step();
            completed += 1;
            on_cycle(self);
        }
        info!(cycles = self.cycles, stats = %self.gates.stats(), "run finished");
        completed
    }

    /// Current register file.
    pub fn registers(&self) -> &Registers<C::Ciphertext> {
        &self.registers
    }

    /// Current memory, in address order.
    pub fn memory(&self) -> &[EncryptedWord<C::Ciphertext>] {
        self.memory.cells()
    }

    /// Gates evaluated so far.
    pub fn stats(&self) -> GateStats {
        self.gates.stats()
    }

    /// Cycles executed so far.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    /// Snapshot of memory and registers.
    pub fn dump(&self) -> MachineDump<C::Ciphertext> {
        MachineDump {
            memory: self.memory.cells().to_vec(),
            registers: self.registers.clone(),
            stats: self.gates.stats(),
            cycles: self.cycles,
        }
    }

    /// Consumes the machine, returning its final state.
    pub fn into_dump(self) -> MachineDump<C::Ciphertext> {
        let stats = self.gates.stats();
        MachineDump {
            memory: self.memory.into_cells(),
            registers: self.registers,
            stats,
            cycles: self.cycles,
        }
    }

    fn trace_registers(&self) {
        let registers = decrypt_registers(&self.gates, &self.registers);
        let ac_bits: String = self
            .gates
            .decrypt_bits(&self.registers.ac)
            .iter()
            .rev()
            .map(|bit| if *bit { '1' } else { '0' })
            .collect();
        debug!(
            cycle = self.cycles,
            %registers,
            ac_bits = %ac_bits,
            noise = self.registers.ac.max_noise(),
            "registers"
        );
    }
}

/// Loads `image` and runs it for exactly `cycles` cycles.
pub fn run<C: CryptoContext>(
    context: &C,
    config: MachineConfig,
    image: EncryptedImage<C::Ciphertext>,
    cycles: u64,
) -> Result<MachineDump<C::Ciphertext>, LoadError> {
    let mut machine = Machine::new(context, config, image)?;
    machine.run(cycles);
    Ok(machine.into_dump())
}

fn decrypt_u16<C: CryptoContext>(
    gates: &GateLibrary<'_, C>,
    word: &EncryptedWord<C::Ciphertext>,
) -> u16 {
    // Words are at most WORD_BITS wide.
    gates.decrypt_word(word) as u16
}

fn decrypt_registers<C: CryptoContext>(
    gates: &GateLibrary<'_, C>,
    registers: &Registers<C::Ciphertext>,
) -> encvm_isa::Registers {
    encvm_isa::Registers {
        pc: decrypt_u16(gates, &registers.pc),
        ac: decrypt_u16(gates, &registers.ac),
        carry: gates.decrypt(&registers.carry),
        zero: gates.decrypt(&registers.zero),
        minus: gates.decrypt(&registers.minus),
        staging: decrypt_u16(gates, &registers.staging),
    }
}
