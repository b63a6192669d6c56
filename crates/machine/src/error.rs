//! Load errors.

use encvm_isa::FitError;
use thiserror::Error;

/// An image that cannot be loaded into the machine. Raised before any cycle
/// runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The plaintext image does not fit the geometry.
    #[error(transparent)]
    Image(#[from] FitError),

    /// More memory words than cells.
    #[error("image has {words} words but memory holds {capacity}")]
    ImageTooLarge {
        /// Words in the image.
        words: usize,
        /// Memory capacity.
        capacity: usize,
    },

    /// A memory word of the wrong width.
    #[error("memory word {address} is {width} bits wide, expected {expected}")]
    WordWidth {
        /// Address of the offending word.
        address: usize,
        /// Its width.
        width: usize,
        /// The machine word width.
        expected: usize,
    },

    /// A program counter that is not an address.
    #[error("pc is {width} bits wide, expected {expected}")]
    PcWidth {
        /// Width of the supplied program counter.
        width: usize,
        /// The address width of the geometry.
        expected: usize,
    },

    /// An accumulator of the wrong width.
    #[error("accumulator is {width} bits wide, expected {expected}")]
    AcWidth {
        /// Width of the supplied accumulator.
        width: usize,
        /// The machine word width.
        expected: usize,
    },
}
