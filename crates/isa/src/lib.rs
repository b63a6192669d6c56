//! Plaintext side of the encrypted machine: instruction set, memory geometry,
//! program images and a reference interpreter.
//!
//! Nothing here touches ciphertexts. The encrypted machine evaluates exactly
//! the semantics of [`ReferenceMachine`], gate by gate.

pub mod geometry;
pub mod image;
pub mod instruction;
pub mod listing;
pub mod reference;

pub use geometry::{Geometry, GeometryError};
pub use image::{FitError, ImageError, ProgramImage};
pub use instruction::{Instruction, Opcode};
pub use listing::MemoryListing;
pub use reference::{ReferenceMachine, Registers};

/// Width of a memory word, an instruction and the accumulator.
pub const WORD_BITS: usize = 16;

/// Width of the ALU. Accumulator bits above this pass through unchanged.
pub const DATA_BITS: usize = 8;

/// Widest supported address; addresses live in the 8-bit operand field.
pub const MAX_ADDRESS_BITS: u32 = 8;

/// Bit position of the opcode nibble within an instruction.
pub const OPCODE_SHIFT: usize = 8;

/// Width of the opcode field.
pub const OPCODE_BITS: usize = 4;

/// Bit position of the addressing-mode flag within an instruction.
pub const MODE_BIT: usize = 12;
