//! Cleartext backend.

use crate::context::{CryptoContext, Gate};

/// Cleartext context for boolean gate evaluation.
///
/// The "ciphertext" is the plain bit, so this runs the machine without any
/// encryption. Useful for testing and for computing expected outputs; it has
/// no noise, so the gate library never refreshes its values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleartextContext;

impl CleartextContext {
    /// Creates a new cleartext context.
    pub fn new() -> Self {
        Self
    }
}

impl CryptoContext for CleartextContext {
    type Ciphertext = bool;

    fn encrypt(&self, bit: bool) -> bool {
        bit
    }

    fn decrypt(&self, ciphertext: &bool) -> bool {
        *ciphertext
    }

    fn eval(&self, gate: Gate<'_, bool>) -> bool {
        match gate {
            Gate::And(lhs, rhs) => *lhs & *rhs,
            Gate::Xor(lhs, rhs) => *lhs ^ *rhs,
            Gate::Not(input) => !*input,
        }
    }

    fn refresh(&self, ciphertext: &bool) -> bool {
        *ciphertext
    }

    fn fresh_noise(&self) -> u32 {
        0
    }

    fn noise_budget(&self) -> u32 {
        u32::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_tables() {
        let ctx = CleartextContext::new();
        for a in [false, true] {
            assert_eq!(ctx.eval(Gate::Not(&a)), !a);
            for b in [false, true] {
                assert_eq!(ctx.eval(Gate::And(&a, &b)), a & b);
                assert_eq!(ctx.eval(Gate::Xor(&a, &b)), a ^ b);
            }
        }
    }
}
