//! Encrypted stored-program computer.
//!
//! Program counter, accumulator, flags and memory stay encrypted for the whole
//! run. Each cycle evaluates the complete fetch, decode, memory, execute and
//! writeback network over ciphertexts, choosing results with encrypted
//! selectors instead of branching, so nothing about the program's control flow
//! or data is revealed by what the machine computes.
//!
//! ```no_run
//! use encvm_gates::CleartextContext;
//! use encvm_isa::{Geometry, ProgramImage};
//! use encvm_machine::{EncryptedImage, MachineConfig};
//!
//! let ctx = CleartextContext::new();
//! let image = ProgramImage::from_words([0x0305u16, 0x0F0A]);
//! let geometry = Geometry::default();
//! let encrypted = EncryptedImage::encrypt(&ctx, &image, geometry).unwrap();
//! let dump = encvm_machine::run(&ctx, MachineConfig::new(geometry), encrypted, 2).unwrap();
//! assert_eq!(dump.decrypt(&ctx).memory[10], 5);
//! ```

pub mod alu;
pub mod control;
pub mod error;
pub mod machine;
pub mod memory;

pub use control::Registers;
pub use error::LoadError;
pub use machine::{DecryptedDump, EncryptedImage, Machine, MachineConfig, MachineDump, run};
pub use memory::ObliviousMemory;
