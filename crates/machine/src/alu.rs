//! Arithmetic and logic over encrypted words.
//!
//! Everything here is straight-line: each function evaluates the same gates
//! whatever its inputs decrypt to.

use encvm_gates::{Bit, CryptoContext, EncryptedBit, EncryptedWord, GateLibrary, Word};

/// Ripple-carry addition `lhs + rhs + carry_in`.
///
/// For each bit position i:
/// ```text
/// half_sum = a[i] XOR b[i]
/// sum[i] = half_sum XOR carry[i]
/// half_carry = a[i] AND b[i]
/// carry_prop = half_sum AND carry[i]
/// carry[i+1] = half_carry XOR carry_prop
/// ```
///
/// Returns the sum, as wide as the operands, and the carry out.
pub fn add<C: CryptoContext>(
    gates: &GateLibrary<'_, C>,
    lhs: &Word<C>,
    rhs: &Word<C>,
    carry_in: &Bit<C>,
) -> (Word<C>, Bit<C>) {
    assert_eq!(lhs.width(), rhs.width(), "adding words of different widths");

    let mut carry = carry_in.clone();
    let mut sum = Vec::with_capacity(lhs.width());
    for (a, b) in lhs.bits().iter().zip(rhs.bits()) {
        let half_sum = gates.xor(a, b);
        sum.push(gates.xor(&half_sum, &carry));

        let half_carry = gates.and(a, b);
        let carry_prop = gates.and(&half_sum, &carry);
        carry = gates.xor(&half_carry, &carry_prop);
    }

    (sum.into(), carry)
}

/// `word + 1`, wrapping at the word width.
///
/// A chain of half adders with the constant one folded into bit 0.
pub fn increment<C: CryptoContext>(gates: &GateLibrary<'_, C>, word: &Word<C>) -> Word<C> {
    let Some((first, rest)) = word.bits().split_first() else {
        return word.clone();
    };

    let mut bits = Vec::with_capacity(word.width());
    bits.push(gates.not(first));

    let mut carry = first.clone();
    for (i, bit) in rest.iter().enumerate() {
        bits.push(gates.xor(bit, &carry));
        // The carry out of the top bit is dropped.
        if i + 2 < word.width() {
            carry = gates.and(bit, &carry);
        }
    }

    bits.into()
}

/// True iff every bit of `word` is zero.
pub fn is_zero<C: CryptoContext>(gates: &GateLibrary<'_, C>, word: &Word<C>) -> Bit<C> {
    gates.not(&gates.or_all(word.bits()))
}

/// Bitwise NOT.
pub fn not_word<C: CryptoContext>(gates: &GateLibrary<'_, C>, word: &Word<C>) -> Word<C> {
    word.bits().iter().map(|bit| gates.not(bit)).collect()
}

/// Bitwise AND.
pub fn and_word<C: CryptoContext>(
    gates: &GateLibrary<'_, C>,
    lhs: &Word<C>,
    rhs: &Word<C>,
) -> Word<C> {
    zip_with(lhs, rhs, |a, b| gates.and(a, b))
}

/// Bitwise XOR.
pub fn xor_word<C: CryptoContext>(
    gates: &GateLibrary<'_, C>,
    lhs: &Word<C>,
    rhs: &Word<C>,
) -> Word<C> {
    zip_with(lhs, rhs, |a, b| gates.xor(a, b))
}

/// Bitwise OR.
pub fn or_word<C: CryptoContext>(
    gates: &GateLibrary<'_, C>,
    lhs: &Word<C>,
    rhs: &Word<C>,
) -> Word<C> {
    zip_with(lhs, rhs, |a, b| gates.or(a, b))
}

/// Rotates left through carry: `(word << 1) | carry`, carry out is the old
/// top bit. Pure rewiring, no gates.
pub fn rotate_left<T: Clone>(
    word: &EncryptedWord<T>,
    carry: &EncryptedBit<T>,
) -> (EncryptedWord<T>, EncryptedBit<T>) {
    let Some((top, rest)) = word.bits().split_last() else {
        return (word.clone(), carry.clone());
    };

    let rotated = std::iter::once(carry.clone())
        .chain(rest.iter().cloned())
        .collect();
    (rotated, top.clone())
}

/// Rotates right through carry: `(word >> 1) | carry << (width - 1)`, carry
/// out is the old bottom bit. Pure rewiring, no gates.
pub fn rotate_right<T: Clone>(
    word: &EncryptedWord<T>,
    carry: &EncryptedBit<T>,
) -> (EncryptedWord<T>, EncryptedBit<T>) {
    let Some((bottom, rest)) = word.bits().split_first() else {
        return (word.clone(), carry.clone());
    };

    let rotated = rest
        .iter()
        .cloned()
        .chain(std::iter::once(carry.clone()))
        .collect();
    (rotated, bottom.clone())
}

fn zip_with<T>(
    lhs: &EncryptedWord<T>,
    rhs: &EncryptedWord<T>,
    op: impl Fn(&EncryptedBit<T>, &EncryptedBit<T>) -> EncryptedBit<T>,
) -> EncryptedWord<T> {
    assert_eq!(lhs.width(), rhs.width(), "combining words of different widths");
    lhs.bits()
        .iter()
        .zip(rhs.bits())
        .map(|(a, b)| op(a, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use encvm_gates::CleartextContext;

    use super::*;

    #[test]
    fn test_add_exhaustive_4bit() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        for a in 0..16u64 {
            for b in 0..16u64 {
                for c in [false, true] {
                    let (sum, carry) = add(
                        &gates,
                        &gates.encrypt_word(a, 4),
                        &gates.encrypt_word(b, 4),
                        &gates.encrypt(c),
                    );
                    let expected = a + b + u64::from(c);
                    assert_eq!(gates.decrypt_word(&sum), expected & 0xF);
                    assert_eq!(gates.decrypt(&carry), expected > 0xF);
                }
            }
        }
    }

    #[test]
    fn test_add_gate_count() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        let zero = gates.encrypt(false);
        let word = gates.encrypt_word(0, 8);
        let _ = add(&gates, &word, &word, &zero);
        let stats = gates.stats();
        assert_eq!(stats.xor, 3 * 8);
        assert_eq!(stats.and, 2 * 8);
    }

    #[test]
    fn test_increment_wraps() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        for width in 1..=5usize {
            for value in 0..(1u64 << width) {
                let next = increment(&gates, &gates.encrypt_word(value, width));
                assert_eq!(next.width(), width);
                assert_eq!(gates.decrypt_word(&next), (value + 1) % (1 << width));
            }
        }
    }

    #[test]
    fn test_is_zero() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        for value in 0..256u64 {
            let word = gates.encrypt_word(value, 8);
            assert_eq!(gates.decrypt(&is_zero(&gates, &word)), value == 0);
        }
    }

    #[test]
    fn test_bitwise() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        let a = gates.encrypt_word(0b1100_1010, 8);
        let b = gates.encrypt_word(0b1010_0110, 8);
        assert_eq!(gates.decrypt_word(&and_word(&gates, &a, &b)), 0b1000_0010);
        assert_eq!(gates.decrypt_word(&or_word(&gates, &a, &b)), 0b1110_1110);
        assert_eq!(gates.decrypt_word(&xor_word(&gates, &a, &b)), 0b0110_1100);
        assert_eq!(gates.decrypt_word(&not_word(&gates, &a)), 0b0011_0101);
    }

    #[test]
    fn test_rotates() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        let word = gates.encrypt_word(0b1000_0001, 8);
        let set = gates.encrypt(true);
        let clear = gates.encrypt(false);

        let (left, out) = rotate_left(&word, &clear);
        assert_eq!(gates.decrypt_word(&left), 0b0000_0010);
        assert!(gates.decrypt(&out));

        let (right, out) = rotate_right(&word, &set);
        assert_eq!(gates.decrypt_word(&right), 0b1100_0000);
        assert!(gates.decrypt(&out));

        assert_eq!(gates.stats().total_gates(), 0);
    }
}
