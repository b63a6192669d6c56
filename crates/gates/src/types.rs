//! Encrypted bit and word types.
//!
//! These wrap a backend ciphertext together with the noise estimate the gate
//! library tracks for it, and provide a unified interface for the rest of the
//! workspace.

use std::ops::Range;

/// A single encrypted boolean.
///
/// Immutable once produced. New bits come only from fresh encryption, gate
/// evaluation or refresh, all of which go through the
/// [`GateLibrary`](crate::GateLibrary).
#[derive(Debug, Clone)]
pub struct EncryptedBit<T> {
    ciphertext: T,
    noise: u32,
}

impl<T> EncryptedBit<T> {
    pub(crate) fn new(ciphertext: T, noise: u32) -> Self {
        Self { ciphertext, noise }
    }

    /// Returns the backend ciphertext.
    pub fn ciphertext(&self) -> &T {
        &self.ciphertext
    }

    /// Returns the tracked noise estimate.
    pub fn noise(&self) -> u32 {
        self.noise
    }
}

/// A fixed-width sequence of encrypted bits.
///
/// Bit `i` of the represented value is stored at index `i`, so index 0 is the
/// least significant bit. There is no type tag: the same word may hold an
/// instruction, data or an address.
#[derive(Debug, Clone)]
pub struct EncryptedWord<T> {
    bits: Vec<EncryptedBit<T>>,
}

impl<T> EncryptedWord<T> {
    /// Number of bits in the word.
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Returns bit `i` (0 = least significant).
    ///
    /// Panics if `i` is out of range.
    pub fn bit(&self, i: usize) -> &EncryptedBit<T> {
        &self.bits[i]
    }

    /// Returns the bits, least significant first.
    pub fn bits(&self) -> &[EncryptedBit<T>] {
        &self.bits
    }

    /// Largest noise estimate among the bits.
    pub fn max_noise(&self) -> u32 {
        self.bits.iter().map(EncryptedBit::noise).max().unwrap_or(0)
    }
}

impl<T: Clone> EncryptedWord<T> {
    /// Copies out the bits in `range` as a new, narrower word.
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            bits: self.bits[range].to_vec(),
        }
    }

    /// Returns a copy whose lowest `low.width()` bits are replaced by `low`.
    ///
    /// Panics if `low` does not fit.
    pub fn with_low_bits(&self, low: &EncryptedWord<T>) -> Self {
        let mut bits = self.bits.clone();
        bits[..low.width()].clone_from_slice(&low.bits);
        Self { bits }
    }
}

impl<T> From<Vec<EncryptedBit<T>>> for EncryptedWord<T> {
    fn from(bits: Vec<EncryptedBit<T>>) -> Self {
        Self { bits }
    }
}

impl<T> FromIterator<EncryptedBit<T>> for EncryptedWord<T> {
    fn from_iter<I: IntoIterator<Item = EncryptedBit<T>>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}
