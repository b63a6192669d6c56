//! Memory geometry.

use thiserror::Error;

use crate::MAX_ADDRESS_BITS;

/// Shape of the machine memory: `2^row_bits` rows of `2^col_bits` words.
///
/// An address is `row << col_bits | col`, so the low `col_bits` bits select
/// the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    row_bits: u32,
    col_bits: u32,
}

/// Rejected geometry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// A dimension with no address bits.
    #[error("row and column bits must both be at least 1 (got {row_bits}x{col_bits})")]
    EmptyDimension {
        /// Requested row bits.
        row_bits: u32,
        /// Requested column bits.
        col_bits: u32,
    },

    /// Addresses would not fit the operand field.
    #[error("{address_bits} address bits exceed the maximum of {}", MAX_ADDRESS_BITS)]
    TooWide {
        /// Requested total address width.
        address_bits: u32,
    },
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            row_bits: 4,
            col_bits: 4,
        }
    }
}

impl Geometry {
    /// Creates a geometry, validating both dimensions.
    pub fn new(row_bits: u32, col_bits: u32) -> Result<Self, GeometryError> {
        if row_bits == 0 || col_bits == 0 {
            return Err(GeometryError::EmptyDimension { row_bits, col_bits });
        }

        let address_bits = row_bits + col_bits;
        if address_bits > MAX_ADDRESS_BITS {
            return Err(GeometryError::TooWide { address_bits });
        }

        Ok(Self { row_bits, col_bits })
    }

    /// Address bits selecting the row.
    pub fn row_bits(&self) -> u32 {
        self.row_bits
    }

    /// Address bits selecting the column.
    pub fn col_bits(&self) -> u32 {
        self.col_bits
    }

    /// Total address width, which is also the program counter width.
    pub fn address_bits(&self) -> u32 {
        self.row_bits + self.col_bits
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        1 << self.row_bits
    }

    /// Number of words per row.
    pub fn cols(&self) -> usize {
        1 << self.col_bits
    }

    /// Number of words in memory.
    pub fn capacity(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Mask keeping the address bits of a value.
    pub fn address_mask(&self) -> u16 {
        (1u16 << self.address_bits()) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let geometry = Geometry::default();
        assert_eq!(geometry.address_bits(), 8);
        assert_eq!(geometry.capacity(), 256);
        assert_eq!(geometry.address_mask(), 0xFF);
    }

    #[test]
    fn test_small_geometry() {
        let geometry = Geometry::new(2, 1).unwrap();
        assert_eq!(geometry.rows(), 4);
        assert_eq!(geometry.cols(), 2);
        assert_eq!(geometry.capacity(), 8);
        assert_eq!(geometry.address_mask(), 0b111);
    }

    #[test]
    fn test_invalid_geometry() {
        assert_eq!(
            Geometry::new(0, 3),
            Err(GeometryError::EmptyDimension {
                row_bits: 0,
                col_bits: 3
            })
        );
        assert_eq!(
            Geometry::new(5, 4),
            Err(GeometryError::TooWide { address_bits: 9 })
        );
    }
}
