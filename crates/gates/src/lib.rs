//! Boolean gate evaluation over homomorphically encrypted bits.
//!
//! A [`CryptoContext`] evaluates the three primitive gates (AND, XOR, NOT) on
//! its own ciphertexts. The [`GateLibrary`] builds every other operation from
//! those gates, keeps per-bit noise estimates and refreshes ciphertexts before
//! they become undecryptable.
//!
//! Two backends ship with the crate: [`CleartextContext`], which evaluates on
//! plain bits, and [`IntegerContext`], a somewhat-homomorphic scheme over the
//! integers.

pub mod cleartext;
pub mod context;
pub mod integer;
pub mod library;
pub mod types;

pub use cleartext::CleartextContext;
pub use context::{CryptoContext, Gate, GateKind};
pub use integer::{IntegerCiphertext, IntegerContext, IntegerParams, IntegerParamsError};
pub use library::{Bit, GateLibrary, GateStats, Word};
pub use types::{EncryptedBit, EncryptedWord};
