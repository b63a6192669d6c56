//! Somewhat-homomorphic encryption over the integers.
//!
//! A bit `m` is encrypted under an odd secret `p` as `c = p·q + 2r + m` with
//! random `q` and small random `r`. Decryption is `(c mod p) mod 2`. Adding
//! ciphertexts XORs the plaintexts and multiplying them ANDs the plaintexts,
//! while the noise term `2r + m` grows. Ciphertexts are kept reduced modulo a
//! public multiple `x0 = p·q0` of the secret.
//!
//! Refreshing decrypts and re-encrypts with the secret key, so the context
//! must hold it. This is a demonstration scheme: parameters are far below
//! anything that would resist lattice or approximate-GCD attacks.

use std::fmt;

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use parking_lot::Mutex;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use thiserror::Error;

use crate::context::{CryptoContext, Gate};

/// Context string for deriving RNG seeds from passphrases.
const SEED_DERIVATION_CONTEXT: &str = "encvm 2026-10-19 integer context seed";

/// Parameters of the integer scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerParams {
    /// Bit length of the encryption randomness `r`.
    pub noise_bits: u32,
    /// Bit length of the secret `p`.
    pub secret_bits: u32,
    /// Bit length of the public modulus `x0`.
    pub modulus_bits: u32,
}

impl Default for IntegerParams {
    fn default() -> Self {
        Self {
            noise_bits: 16,
            secret_bits: 512,
            modulus_bits: 2048,
        }
    }
}

impl IntegerParams {
    /// Checks that one AND of two fresh ciphertexts fits the noise budget and
    /// that the modulus is larger than the secret.
    pub fn validate(&self) -> Result<(), IntegerParamsError> {
        if self.noise_bits == 0 {
            return Err(IntegerParamsError::NoNoise);
        }

        // Two fresh operands carry noise_bits + 1 bits each.
        let required = 2 * (self.noise_bits + 1) + 1;
        if self.secret_bits < required {
            return Err(IntegerParamsError::SecretTooSmall {
                secret_bits: self.secret_bits,
                required,
            });
        }

        if self.modulus_bits <= self.secret_bits {
            return Err(IntegerParamsError::ModulusTooSmall {
                modulus_bits: self.modulus_bits,
                secret_bits: self.secret_bits,
            });
        }

        Ok(())
    }
}

/// Invalid [`IntegerParams`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegerParamsError {
    /// Ciphertexts without randomness.
    #[error("noise_bits must be at least 1")]
    NoNoise,

    /// The secret cannot absorb even one AND of fresh ciphertexts.
    #[error("secret_bits is {secret_bits} but at least {required} are needed")]
    SecretTooSmall {
        /// Configured secret length.
        secret_bits: u32,
        /// Smallest workable secret length for the configured noise.
        required: u32,
    },

    /// The public modulus must be a proper multiple of the secret.
    #[error("modulus_bits ({modulus_bits}) must exceed secret_bits ({secret_bits})")]
    ModulusTooSmall {
        /// Configured modulus length.
        modulus_bits: u32,
        /// Configured secret length.
        secret_bits: u32,
    },
}

/// Ciphertext of one bit under the integer scheme.
#[derive(Clone, PartialEq, Eq)]
pub struct IntegerCiphertext(BigUint);

impl fmt::Debug for IntegerCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntegerCiphertext({} bits)", self.0.bits())
    }
}

/// Integer-scheme context holding the secret, the public modulus and the
/// encryption RNG.
pub struct IntegerContext {
    params: IntegerParams,
    secret: BigUint,
    quotient_bound: BigUint,
    modulus: BigUint,
    rng: Mutex<ChaCha20Rng>,
}

impl fmt::Debug for IntegerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegerContext")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl IntegerContext {
    /// Generates keys from a 32-byte seed.
    pub fn new(params: IntegerParams, seed: [u8; 32]) -> Result<Self, IntegerParamsError> {
        Self::from_rng(params, ChaCha20Rng::from_seed(seed))
    }

    /// Generates keys from a passphrase, hashing it into the RNG seed.
    pub fn from_passphrase(
        params: IntegerParams,
        passphrase: &str,
    ) -> Result<Self, IntegerParamsError> {
        let seed = blake3::derive_key(SEED_DERIVATION_CONTEXT, passphrase.as_bytes());
        Self::new(params, seed)
    }

    /// Generates keys, keeping `rng` for subsequent encryptions.
    pub fn from_rng(
        params: IntegerParams,
        mut rng: ChaCha20Rng,
    ) -> Result<Self, IntegerParamsError> {
        params.validate()?;

        let quotient_bits = params.modulus_bits - params.secret_bits;
        let secret =
            random_bits(&mut rng, params.secret_bits) | top_bit(params.secret_bits) | BigUint::one();
        let quotient_bound = random_bits(&mut rng, quotient_bits) | top_bit(quotient_bits);
        let modulus = &secret * &quotient_bound;

        Ok(Self {
            params,
            secret,
            quotient_bound,
            modulus,
            rng: Mutex::new(rng),
        })
    }

    /// Returns the scheme parameters.
    pub fn params(&self) -> &IntegerParams {
        &self.params
    }
}

impl CryptoContext for IntegerContext {
    type Ciphertext = IntegerCiphertext;

    fn encrypt(&self, bit: bool) -> IntegerCiphertext {
        let mut rng = self.rng.lock();
        let q = random_below(&mut rng, &self.quotient_bound);
        let r = random_bits(&mut rng, self.params.noise_bits);

        // p·q < x0 - p and the noise term stays below p, so c < x0.
        IntegerCiphertext(&self.secret * q + (r << 1usize) + u32::from(bit))
    }

    fn decrypt(&self, ciphertext: &IntegerCiphertext) -> bool {
        (&ciphertext.0 % &self.secret).is_odd()
    }

    fn eval(&self, gate: Gate<'_, IntegerCiphertext>) -> IntegerCiphertext {
        let value = match gate {
            Gate::And(lhs, rhs) => (&lhs.0 * &rhs.0) % &self.modulus,
            Gate::Xor(lhs, rhs) => (&lhs.0 + &rhs.0) % &self.modulus,
            Gate::Not(input) => (&input.0 + 1u32) % &self.modulus,
        };
        IntegerCiphertext(value)
    }

    fn refresh(&self, ciphertext: &IntegerCiphertext) -> IntegerCiphertext {
        self.encrypt(self.decrypt(ciphertext))
    }

    fn fresh_noise(&self) -> u32 {
        self.params.noise_bits + 1
    }

    fn noise_budget(&self) -> u32 {
        // The secret has its top bit set, so anything below 2^(secret_bits-1)
        // is below p.
        self.params.secret_bits - 1
    }
}

fn top_bit(bits: u32) -> BigUint {
    BigUint::one() << (bits as usize - 1)
}

/// Uniform integer in `[0, 2^bits)`.
fn random_bits(rng: &mut ChaCha20Rng, bits: u32) -> BigUint {
    let len = bits.div_ceil(8) as usize;
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);

    let excess = len as u32 * 8 - bits;
    if let Some(top) = bytes.last_mut() {
        *top >>= excess;
    }

    BigUint::from_bytes_le(&bytes)
}

/// Uniform integer in `[0, bound)` by rejection sampling.
fn random_below(rng: &mut ChaCha20Rng, bound: &BigUint) -> BigUint {
    let bits = bound.bits() as u32;
    loop {
        let candidate = random_bits(rng, bits);
        if &candidate < bound {
            return candidate;
        }
    }
}
