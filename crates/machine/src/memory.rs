//! Oblivious random-access memory.
//!
//! Every access touches every cell: each cell's address predicate is
//! evaluated, each cell contributes to the read value and each cell is
//! rewritten, so the gates evaluated do not depend on the encrypted address
//! or on whether the access reads or writes.

use encvm_gates::{Bit, CryptoContext, EncryptedWord, GateLibrary, Word};
use encvm_isa::Geometry;
use rayon::prelude::*;

/// Memory of `rows × cols` encrypted words, addressed row-major.
#[derive(Debug, Clone)]
pub struct ObliviousMemory<T> {
    geometry: Geometry,
    cells: Vec<EncryptedWord<T>>,
}

impl<T: Clone + Send + Sync> ObliviousMemory<T> {
    /// Wraps `cells`, which must hold exactly `geometry.capacity()` words.
    pub(crate) fn new(geometry: Geometry, cells: Vec<EncryptedWord<T>>) -> Self {
        debug_assert_eq!(cells.len(), geometry.capacity());
        Self { geometry, cells }
    }

    /// Memory geometry.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Cells in address order.
    pub fn cells(&self) -> &[EncryptedWord<T>] {
        &self.cells
    }

    /// Consumes the memory, returning its cells.
    pub fn into_cells(self) -> Vec<EncryptedWord<T>> {
        self.cells
    }

    /// Reads or writes one cell without revealing which.
    ///
    /// If `read` decrypts to true, returns the word at `address` and leaves
    /// memory unchanged. Otherwise stores `data` at `address` and returns
    /// `fallback`. `address` has the geometry's address width; `data` and
    /// `fallback` have the cell width.
    ///
    /// With `parallel` the per-cell work is spread over the rayon pool; the
    /// same gates are evaluated either way.
    pub fn access<C>(
        &mut self,
        gates: &GateLibrary<'_, C>,
        address: &Word<C>,
        data: &Word<C>,
        read: &Bit<C>,
        fallback: &Word<C>,
        parallel: bool,
    ) -> Word<C>
    where
        C: CryptoContext<Ciphertext = T>,
    {
        let col_bits = self.geometry.col_bits() as usize;
        let address_bits = self.geometry.address_bits() as usize;
        assert_eq!(address.width(), address_bits, "address width mismatch");

        let cols = self.geometry.cols();
        let col_eq = gates.match_patterns(
            &address.bits()[..col_bits],
            &(0..cols as u64).collect::<Vec<_>>(),
        );
        let row_eq = gates.match_patterns(
            &address.bits()[col_bits..],
            &(0..self.geometry.rows() as u64).collect::<Vec<_>>(),
        );
        let write = gates.not(read);

        let visit = |index: usize, cell: &mut EncryptedWord<T>| -> Word<C> {
            let hit = gates.and(&row_eq[index / cols], &col_eq[index % cols]);
            let masked: Word<C> = cell.bits().iter().map(|bit| gates.and(&hit, bit)).collect();
            let store = gates.and(&hit, &write);
            *cell = gates.select_word(&store, data, cell);
            masked
        };

        let masked: Vec<Word<C>> = if parallel {
            self.cells
                .par_iter_mut()
                .enumerate()
                .map(|(index, cell)| visit(index, cell))
                .collect()
        } else {
            self.cells
                .iter_mut()
                .enumerate()
                .map(|(index, cell)| visit(index, cell))
                .collect()
        };

        // At most one cell is hit, so the XOR of the masked words is its value.
        let value: Word<C> = (0..fallback.width())
            .map(|i| {
                let column: Vec<&Bit<C>> = masked.iter().map(|word| word.bit(i)).collect();
                gates.xor_all(&column)
            })
            .collect();

        gates.select_word(read, &value, fallback)
    }
}
