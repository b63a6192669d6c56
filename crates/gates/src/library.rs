//! Gate library: compound boolean operations over encrypted bits.
//!
//! Every operation is composed from the three gates a [`CryptoContext`]
//! evaluates. The library tracks a noise estimate for each bit it hands out
//! and refreshes operands before a gate would push its output over the
//! context's budget. The estimates only depend on the shape of the circuit,
//! never on encrypted values, so refreshes happen at the same points whatever
//! the data.

use std::borrow::{Borrow, Cow};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bitvec::vec::BitVec;

use crate::context::{CryptoContext, Gate, GateKind};
use crate::types::{EncryptedBit, EncryptedWord};

/// Encrypted bit under context `C`.
pub type Bit<C> = EncryptedBit<<C as CryptoContext>::Ciphertext>;

/// Encrypted word under context `C`.
pub type Word<C> = EncryptedWord<<C as CryptoContext>::Ciphertext>;

/// Snapshot of the gate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    /// AND gates evaluated.
    pub and: u64,
    /// XOR gates evaluated.
    pub xor: u64,
    /// NOT gates evaluated.
    pub not: u64,
    /// Ciphertexts refreshed because of the noise budget.
    pub refresh: u64,
}

impl GateStats {
    /// Total number of gates evaluated.
    pub fn total_gates(&self) -> u64 {
        self.and + self.xor + self.not
    }

    /// Counts accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &GateStats) -> GateStats {
        GateStats {
            and: self.and - earlier.and,
            xor: self.xor - earlier.xor,
            not: self.not - earlier.not,
            refresh: self.refresh - earlier.refresh,
        }
    }
}

impl fmt::Display for GateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#[~: {}, &: {}, ^: {}, !: {}]",
            self.refresh, self.and, self.xor, self.not
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    and: AtomicU64,
    xor: AtomicU64,
    not: AtomicU64,
    refresh: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
enum Binary {
    And,
    Or,
    Xor,
}

/// Boolean operations over encrypted bits and words.
///
/// Shared by reference between all users, including worker threads; the
/// counters are atomics.
pub struct GateLibrary<'c, C: CryptoContext> {
    ctx: &'c C,
    counters: Counters,
}

impl<C: CryptoContext> fmt::Debug for GateLibrary<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateLibrary")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<'c, C: CryptoContext> GateLibrary<'c, C> {
    /// Creates a library evaluating gates under `ctx`.
    ///
    /// Panics if an AND of two fresh ciphertexts would exceed the context's
    /// noise budget: no refresh could make such a gate decrypt correctly.
    pub fn new(ctx: &'c C) -> Self {
        let fresh = ctx.fresh_noise();
        let and_noise = ctx.gate_noise(GateKind::And, fresh, fresh);
        assert!(
            and_noise <= ctx.noise_budget(),
            "noise budget {} cannot fit one AND of fresh ciphertexts ({and_noise})",
            ctx.noise_budget()
        );

        Self {
            ctx,
            counters: Counters::default(),
        }
    }

    /// Returns the current counter values.
    pub fn stats(&self) -> GateStats {
        GateStats {
            and: self.counters.and.load(Ordering::Relaxed),
            xor: self.counters.xor.load(Ordering::Relaxed),
            not: self.counters.not.load(Ordering::Relaxed),
            refresh: self.counters.refresh.load(Ordering::Relaxed),
        }
    }

    /// Encrypts one bit.
    pub fn encrypt(&self, bit: bool) -> Bit<C> {
        EncryptedBit::new(self.ctx.encrypt(bit), self.ctx.fresh_noise())
    }

    /// Encrypts the low `width` bits of `value`.
    pub fn encrypt_word(&self, value: u64, width: usize) -> Word<C> {
        assert!(width <= 64, "words are at most 64 bits wide");
        (0..width).map(|i| self.encrypt((value >> i) & 1 == 1)).collect()
    }

    /// Decrypts one bit.
    pub fn decrypt(&self, bit: &Bit<C>) -> bool {
        self.ctx.decrypt(bit.ciphertext())
    }

    /// Decrypts a word of at most 64 bits into an integer.
    pub fn decrypt_word(&self, word: &Word<C>) -> u64 {
        assert!(word.width() <= 64, "words are at most 64 bits wide");
        word.bits()
            .iter()
            .enumerate()
            .fold(0, |acc, (i, bit)| acc | (u64::from(self.decrypt(bit)) << i))
    }

    /// Decrypts a word into a bit string, least significant bit first.
    pub fn decrypt_bits(&self, word: &Word<C>) -> BitVec {
        word.bits().iter().map(|bit| self.decrypt(bit)).collect()
    }

    /// Re-encrypts `bit` with fresh noise.
    pub fn refresh(&self, bit: &Bit<C>) -> Bit<C> {
        self.counters.refresh.fetch_add(1, Ordering::Relaxed);
        EncryptedBit::new(
            self.ctx.refresh(bit.ciphertext()),
            self.ctx.fresh_noise(),
        )
    }

    /// `!input`
    pub fn not(&self, input: &Bit<C>) -> Bit<C> {
        let input = self.fit_unary(input);
        self.counters.not.fetch_add(1, Ordering::Relaxed);
        let noise = self.ctx.gate_noise(GateKind::Not, input.noise(), 0);
        EncryptedBit::new(self.ctx.eval(Gate::Not(input.ciphertext())), noise)
    }

    /// `lhs & rhs`
    pub fn and(&self, lhs: &Bit<C>, rhs: &Bit<C>) -> Bit<C> {
        let (lhs, rhs) = self.fit(GateKind::And, lhs, rhs);
        self.counters.and.fetch_add(1, Ordering::Relaxed);
        let noise = self.ctx.gate_noise(GateKind::And, lhs.noise(), rhs.noise());
        EncryptedBit::new(
            self.ctx.eval(Gate::And(lhs.ciphertext(), rhs.ciphertext())),
            noise,
        )
    }

    /// `lhs ^ rhs`
    pub fn xor(&self, lhs: &Bit<C>, rhs: &Bit<C>) -> Bit<C> {
        let (lhs, rhs) = self.fit(GateKind::Xor, lhs, rhs);
        self.counters.xor.fetch_add(1, Ordering::Relaxed);
        let noise = self.ctx.gate_noise(GateKind::Xor, lhs.noise(), rhs.noise());
        EncryptedBit::new(
            self.ctx.eval(Gate::Xor(lhs.ciphertext(), rhs.ciphertext())),
            noise,
        )
    }

    /// `lhs | rhs`, computed as `lhs ^ rhs ^ (lhs & rhs)`.
    pub fn or(&self, lhs: &Bit<C>, rhs: &Bit<C>) -> Bit<C> {
        let sum = self.xor(lhs, rhs);
        let carry = self.and(lhs, rhs);
        self.xor(&sum, &carry)
    }

    /// AND of all `bits`, paired up as a balanced tree.
    ///
    /// Panics if `bits` is empty.
    pub fn and_all<B: Borrow<Bit<C>>>(&self, bits: &[B]) -> Bit<C> {
        self.reduce(Binary::And, bits)
    }

    /// OR of all `bits`, paired up as a balanced tree.
    ///
    /// Panics if `bits` is empty.
    pub fn or_all<B: Borrow<Bit<C>>>(&self, bits: &[B]) -> Bit<C> {
        self.reduce(Binary::Or, bits)
    }

    /// XOR of all `bits`, paired up as a balanced tree.
    ///
    /// Panics if `bits` is empty.
    pub fn xor_all<B: Borrow<Bit<C>>>(&self, bits: &[B]) -> Bit<C> {
        self.reduce(Binary::Xor, bits)
    }

    /// Oblivious select: `sel ? then : otherwise`, as
    /// `otherwise ^ (sel & (then ^ otherwise))`.
    pub fn select(&self, sel: &Bit<C>, then: &Bit<C>, otherwise: &Bit<C>) -> Bit<C> {
        let diff = self.xor(then, otherwise);
        let masked = self.and(sel, &diff);
        self.xor(otherwise, &masked)
    }

    /// Bitwise [`GateLibrary::select`] over two words of equal width.
    pub fn select_word(&self, sel: &Bit<C>, then: &Word<C>, otherwise: &Word<C>) -> Word<C> {
        assert_eq!(then.width(), otherwise.width(), "select over mismatched widths");
        then.bits()
            .iter()
            .zip(otherwise.bits())
            .map(|(t, o)| self.select(sel, t, o))
            .collect()
    }

    /// Multiplexes candidates by mutually exclusive selectors:
    /// `⊕ (selector_i & candidate_i)`.
    ///
    /// With at most one selector set the XOR equals the OR of the terms.
    /// If none is set the result is all zeros.
    pub fn mux(&self, terms: &[(&Bit<C>, &Word<C>)]) -> Word<C> {
        assert!(!terms.is_empty(), "mux needs at least one candidate");
        let width = terms[0].1.width();
        assert!(
            terms.iter().all(|(_, word)| word.width() == width),
            "mux over mismatched widths"
        );

        (0..width)
            .map(|i| {
                let masked: Vec<Bit<C>> = terms
                    .iter()
                    .map(|(sel, word)| self.and(sel, word.bit(i)))
                    .collect();
                self.xor_all(&masked)
            })
            .collect()
    }

    /// Tests `bits` against a plaintext pattern: the AND over every bit, negated
    /// where the pattern has a zero. Bit `i` of `pattern` is matched against
    /// `bits[i]`.
    ///
    /// Panics if `bits` is empty.
    pub fn matches<B: Borrow<Bit<C>>>(&self, bits: &[B], pattern: u64) -> Bit<C> {
        self.match_patterns(bits, &[pattern]).swap_remove(0)
    }

    /// Tests `bits` against several patterns, negating each bit once and
    /// sharing the negations between all patterns.
    ///
    /// Returns one predicate per pattern, in order. With distinct patterns at
    /// most one of them is true.
    pub fn match_patterns<B: Borrow<Bit<C>>>(&self, bits: &[B], patterns: &[u64]) -> Vec<Bit<C>> {
        assert!(bits.len() <= 64, "patterns are at most 64 bits wide");
        let negated: Vec<Option<Bit<C>>> = (0..bits.len())
            .map(|i| {
                patterns
                    .iter()
                    .any(|pattern| (pattern >> i) & 1 == 0)
                    .then(|| self.not(bits[i].borrow()))
            })
            .collect();

        patterns
            .iter()
            .map(|pattern| {
                let literals: Vec<&Bit<C>> = bits
                    .iter()
                    .zip(&negated)
                    .enumerate()
                    .map(|(i, (bit, negated))| match negated {
                        Some(negated) if (pattern >> i) & 1 == 0 => negated,
                        _ => bit.borrow(),
                    })
                    .collect();
                self.and_all(&literals)
            })
            .collect()
    }

    fn binary(&self, op: Binary, lhs: &Bit<C>, rhs: &Bit<C>) -> Bit<C> {
        match op {
            Binary::And => self.and(lhs, rhs),
            Binary::Or => self.or(lhs, rhs),
            Binary::Xor => self.xor(lhs, rhs),
        }
    }

    fn reduce<B: Borrow<Bit<C>>>(&self, op: Binary, bits: &[B]) -> Bit<C> {
        assert!(!bits.is_empty(), "cannot reduce an empty set of bits");
        let mut layer = self.pairwise(op, bits);
        while layer.len() > 1 {
            layer = self.pairwise(op, &layer);
        }
        layer.swap_remove(0)
    }

    fn pairwise<B: Borrow<Bit<C>>>(&self, op: Binary, layer: &[B]) -> Vec<Bit<C>> {
        layer
            .chunks(2)
            .map(|pair| match pair {
                [lhs, rhs] => self.binary(op, lhs.borrow(), rhs.borrow()),
                [last] => last.borrow().clone(),
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect()
    }

    /// Refreshes the noisier operand until the gate output fits the budget.
    fn fit<'a>(
        &self,
        kind: GateKind,
        lhs: &'a Bit<C>,
        rhs: &'a Bit<C>,
    ) -> (Cow<'a, Bit<C>>, Cow<'a, Bit<C>>) {
        let budget = self.ctx.noise_budget();
        let fresh = self.ctx.fresh_noise();
        let mut lhs = Cow::Borrowed(lhs);
        let mut rhs = Cow::Borrowed(rhs);

        while self.ctx.gate_noise(kind, lhs.noise(), rhs.noise()) > budget {
            if lhs.noise() >= rhs.noise() && lhs.noise() > fresh {
                lhs = Cow::Owned(self.refresh(&lhs));
            } else if rhs.noise() > fresh {
                rhs = Cow::Owned(self.refresh(&rhs));
            } else {
                // Both operands are fresh, which `new` checked fits.
                break;
            }
        }

        (lhs, rhs)
    }

    fn fit_unary<'a>(&self, input: &'a Bit<C>) -> Cow<'a, Bit<C>> {
        let over = self.ctx.gate_noise(GateKind::Not, input.noise(), 0) > self.ctx.noise_budget();
        if over && input.noise() > self.ctx.fresh_noise() {
            Cow::Owned(self.refresh(input))
        } else {
            Cow::Borrowed(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CleartextContext, IntegerContext, IntegerParams};

    fn integer_ctx() -> IntegerContext {
        let params = IntegerParams {
            noise_bits: 8,
            secret_bits: 160,
            modulus_bits: 512,
        };
        IntegerContext::new(params, [42u8; 32]).unwrap()
    }

    fn tight_ctx() -> IntegerContext {
        // Budget of 15 bits against 5-bit fresh noise: at most a couple of
        // ANDs before a refresh is due.
        let params = IntegerParams {
            noise_bits: 4,
            secret_bits: 16,
            modulus_bits: 96,
        };
        IntegerContext::new(params, [11u8; 32]).unwrap()
    }

    fn check_truth_tables<C: CryptoContext>(ctx: &C) {
        let gates = GateLibrary::new(ctx);
        for a in [false, true] {
            let ea = gates.encrypt(a);
            assert_eq!(gates.decrypt(&gates.not(&ea)), !a);
            for b in [false, true] {
                let eb = gates.encrypt(b);
                assert_eq!(gates.decrypt(&gates.and(&ea, &eb)), a & b);
                assert_eq!(gates.decrypt(&gates.xor(&ea, &eb)), a ^ b);
                assert_eq!(gates.decrypt(&gates.or(&ea, &eb)), a | b);
                for s in [false, true] {
                    let es = gates.encrypt(s);
                    let expected = if s { a } else { b };
                    assert_eq!(gates.decrypt(&gates.select(&es, &ea, &eb)), expected);
                }
            }
        }
    }

    #[test]
    fn test_truth_tables_cleartext() {
        check_truth_tables(&CleartextContext::new());
    }

    #[test]
    fn test_truth_tables_integer() {
        check_truth_tables(&integer_ctx());
    }

    #[test]
    fn test_and4_pairing_orders_agree() {
        let ctx = integer_ctx();
        let gates = GateLibrary::new(&ctx);
        for value in 0..16u64 {
            let bits: Vec<_> = (0..4).map(|i| gates.encrypt((value >> i) & 1 == 1)).collect();
            let [a, b, c, d] = [&bits[0], &bits[1], &bits[2], &bits[3]];

            let balanced = gates.and(&gates.and(a, b), &gates.and(c, d));
            let right_leaning = gates.and(a, &gates.and(b, &gates.and(c, d)));
            let shuffled = gates.and(&gates.and(d, a), &gates.and(c, b));
            let library = gates.and_all(&[a, b, c, d]);

            let expected = value == 15;
            assert_eq!(gates.decrypt(&balanced), expected);
            assert_eq!(gates.decrypt(&right_leaning), expected);
            assert_eq!(gates.decrypt(&shuffled), expected);
            assert_eq!(gates.decrypt(&library), expected);
        }
    }

    #[test]
    fn test_nary_reductions() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        for width in 1..=8usize {
            for value in 0..(1u64 << width) {
                let word = gates.encrypt_word(value, width);
                let bits = word.bits();
                let ones = value.count_ones();
                assert_eq!(gates.decrypt(&gates.and_all(bits)), ones as usize == width);
                assert_eq!(gates.decrypt(&gates.or_all(bits)), ones > 0);
                assert_eq!(gates.decrypt(&gates.xor_all(bits)), ones % 2 == 1);
            }
        }
    }

    #[test]
    fn test_matches_pattern() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        for value in 0..16u64 {
            let word = gates.encrypt_word(value, 4);
            for pattern in 0..16u64 {
                let hit = gates.matches(word.bits(), pattern);
                assert_eq!(gates.decrypt(&hit), value == pattern);
            }
        }
    }

    #[test]
    fn test_match_patterns_shares_negations() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        let patterns: Vec<u64> = (1..8).collect();
        for value in 0..8u64 {
            let word = gates.encrypt_word(value, 3);
            let before = gates.stats();
            let hits = gates.match_patterns(word.bits(), &patterns);
            let used = gates.stats().since(&before);

            // Three negations shared, then a two-gate AND tree per pattern.
            assert_eq!(used.not, 3);
            assert_eq!(used.and, 2 * patterns.len() as u64);

            let decrypted: Vec<bool> = hits.iter().map(|hit| gates.decrypt(hit)).collect();
            let expected: Vec<bool> = patterns.iter().map(|p| *p == value).collect();
            assert_eq!(decrypted, expected);
        }
    }

    #[test]
    fn test_mux_one_hot() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        let candidates: Vec<_> = [0x12u64, 0x34, 0x56]
            .iter()
            .map(|v| gates.encrypt_word(*v, 8))
            .collect();

        for chosen in 0..3 {
            let selectors: Vec<_> = (0..3).map(|i| gates.encrypt(i == chosen)).collect();
            let terms: Vec<_> = selectors.iter().zip(&candidates).collect();
            let out = gates.mux(&terms);
            assert_eq!(gates.decrypt_word(&out), [0x12, 0x34, 0x56][chosen]);
        }

        let none: Vec<_> = (0..3).map(|_| gates.encrypt(false)).collect();
        let terms: Vec<_> = none.iter().zip(&candidates).collect();
        assert_eq!(gates.decrypt_word(&gates.mux(&terms)), 0);
    }

    #[test]
    fn test_word_round_trip_and_bits() {
        let ctx = integer_ctx();
        let gates = GateLibrary::new(&ctx);
        let word = gates.encrypt_word(0b1011_0010, 8);
        assert_eq!(word.width(), 8);
        assert_eq!(gates.decrypt_word(&word), 0b1011_0010);

        let bits = gates.decrypt_bits(&word);
        assert_eq!(bits.len(), 8);
        assert!(!bits[0]);
        assert!(bits[1]);
        assert!(bits[7]);
    }

    #[test]
    fn test_counters() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        let a = gates.encrypt(true);
        let b = gates.encrypt(false);

        let _ = gates.or(&a, &b);
        let _ = gates.not(&a);
        let stats = gates.stats();
        assert_eq!(stats.and, 1);
        assert_eq!(stats.xor, 2);
        assert_eq!(stats.not, 1);
        assert_eq!(stats.refresh, 0);
        assert_eq!(stats.total_gates(), 4);

        let before = gates.stats();
        let _ = gates.and_all(&[&a, &b, &a, &b, &a]);
        assert_eq!(gates.stats().since(&before).and, 4);
        assert_eq!(format!("{}", gates.stats()), "#[~: 0, &: 5, ^: 2, !: 1]");
    }

    #[test]
    fn test_refresh_keeps_deep_circuits_correct() {
        let ctx = tight_ctx();
        let gates = GateLibrary::new(&ctx);

        // A 12-deep AND chain and an alternating AND/XOR chain; each blows the
        // 15-bit budget many times over without refreshes.
        for value in [0xFFFu64, 0xFFE, 0x7FF, 0xAAA] {
            let word = gates.encrypt_word(value, 12);
            let mut chain = word.bit(0).clone();
            for bit in &word.bits()[1..] {
                chain = gates.and(&chain, bit);
                assert!(chain.noise() <= ctx.noise_budget());
            }
            assert_eq!(gates.decrypt(&chain), value == 0xFFF);

            let mut mixed = word.bit(0).clone();
            let mut expected = value & 1 == 1;
            for (i, bit) in word.bits().iter().enumerate().skip(1) {
                let plain = (value >> i) & 1 == 1;
                if i % 2 == 0 {
                    mixed = gates.and(&mixed, bit);
                    expected &= plain;
                } else {
                    mixed = gates.xor(&mixed, bit);
                    expected ^= plain;
                }
            }
            assert_eq!(gates.decrypt(&mixed), expected);
        }

        assert!(gates.stats().refresh > 0);
    }

    #[test]
    fn test_cleartext_never_refreshes() {
        let ctx = CleartextContext::new();
        let gates = GateLibrary::new(&ctx);
        let mut bit = gates.encrypt(true);
        for _ in 0..1000 {
            bit = gates.and(&bit, &bit);
            bit = gates.xor(&bit, &gates.encrypt(false));
        }
        assert!(gates.decrypt(&bit));
        assert_eq!(gates.stats().refresh, 0);
    }

    /// Cleartext gates under a budget too small for even one fresh AND.
    #[derive(Debug)]
    struct StarvedContext;

    impl CryptoContext for StarvedContext {
        type Ciphertext = bool;

        fn encrypt(&self, bit: bool) -> bool {
            bit
        }

        fn decrypt(&self, ciphertext: &bool) -> bool {
            *ciphertext
        }

        fn eval(&self, gate: Gate<'_, bool>) -> bool {
            CleartextContext::new().eval(gate)
        }

        fn refresh(&self, ciphertext: &bool) -> bool {
            *ciphertext
        }

        fn fresh_noise(&self) -> u32 {
            5
        }

        fn noise_budget(&self) -> u32 {
            9
        }
    }

    #[test]
    #[should_panic(expected = "cannot fit one AND of fresh ciphertexts")]
    fn test_rejects_budget_below_one_fresh_and() {
        let _ = GateLibrary::new(&StarvedContext);
    }
}
