//! Traits for genericising the homomorphic backend behind the gate library.

use std::fmt::Debug;

/// The kind of a boolean gate, without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    /// Two-input AND. The only non-linear gate.
    And,
    /// Two-input XOR.
    Xor,
    /// Negation.
    Not,
}

/// A gate together with borrowed ciphertext operands.
#[derive(Debug, Clone, Copy)]
pub enum Gate<'a, C> {
    /// `lhs & rhs`
    And(&'a C, &'a C),
    /// `lhs ^ rhs`
    Xor(&'a C, &'a C),
    /// `!input`
    Not(&'a C),
}

impl<C> Gate<'_, C> {
    /// Returns the kind of this gate.
    pub fn kind(&self) -> GateKind {
        match self {
            Gate::And(..) => GateKind::And,
            Gate::Xor(..) => GateKind::Xor,
            Gate::Not(..) => GateKind::Not,
        }
    }
}

/// A homomorphic encryption backend able to evaluate boolean gates.
///
/// Implementations hold whatever key material they need. The machine only
/// ever calls [`CryptoContext::eval`] and [`CryptoContext::refresh`] while
/// running; [`CryptoContext::encrypt`] is used to build images and constants
/// and [`CryptoContext::decrypt`] is reserved for debug dumps and for the
/// external consumer of the final memory.
///
/// The context is shared read-only by every gate evaluation, possibly from
/// several threads at once.
pub trait CryptoContext: Send + Sync {
    /// Ciphertext of a single bit.
    type Ciphertext: Clone + Debug + Send + Sync;

    /// Encrypts one bit.
    fn encrypt(&self, bit: bool) -> Self::Ciphertext;

    /// Decrypts one bit.
    fn decrypt(&self, ciphertext: &Self::Ciphertext) -> bool;

    /// Evaluates a gate over encrypted operands.
    fn eval(&self, gate: Gate<'_, Self::Ciphertext>) -> Self::Ciphertext;

    /// Produces a ciphertext of the same bit with fresh noise, by
    /// bootstrapping or re-encryption.
    fn refresh(&self, ciphertext: &Self::Ciphertext) -> Self::Ciphertext;

    /// Noise estimate of a freshly encrypted or refreshed ciphertext.
    fn fresh_noise(&self) -> u32;

    /// Largest noise estimate that still decrypts correctly.
    fn noise_budget(&self) -> u32;

    /// Noise estimate of a gate output given the estimates of its operands.
    ///
    /// `rhs` is ignored for [`GateKind::Not`]. The default models a scheme
    /// where noise is measured in bits: products add, sums grow by one bit.
    fn gate_noise(&self, kind: GateKind, lhs: u32, rhs: u32) -> u32 {
        match kind {
            GateKind::And => lhs.saturating_add(rhs),
            GateKind::Xor => lhs.max(rhs).saturating_add(1),
            GateKind::Not => lhs.saturating_add(1),
        }
    }
}
