use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Signed, Zero};

/// Bit length of the default field modulus (the Mersenne prime 2^521 - 1)
pub const MERSENNE_EXPONENT: usize = 521;

/// Prime field used for polynomial arithmetic
///
/// The modulus is public. It only has to be larger than any secret that gets
/// shared, so a 32-byte chunk (at most 2^256 - 1) always fits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimeField {
    modulus: BigUint,
}

impl Default for PrimeField {
    fn default() -> Self {
        Self::new((BigUint::one() << MERSENNE_EXPONENT) - BigUint::one())
    }
}

impl PrimeField {
    /// Create a field over an explicit prime modulus
    pub fn new(modulus: BigUint) -> Self {
        Self { modulus }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Reduce `a` into `[0, p)`, also for negative `a`
    pub fn reduce(&self, a: &BigInt) -> BigUint {
        let m = BigInt::from_biguint(Sign::Plus, self.modulus.clone());
        let r = ((a % &m) + &m) % &m;
        // r is non-negative here
        r.magnitude().clone()
    }

    /// Multiplicative inverse of `a` modulo the field prime.
    ///
    /// Returns `None` when `a ≡ 0`, the only non-invertible value in a prime field.
    pub fn inverse(&self, a: &BigInt) -> Option<BigUint> {
        let m = BigInt::from_biguint(Sign::Plus, self.modulus.clone());
        let a = BigInt::from_biguint(Sign::Plus, self.reduce(a));

        // Extended Euclid on (a mod m, m)
        let (mut old_r, mut r) = (a, m.clone());
        let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());

        while !r.is_zero() {
            let q = &old_r / &r;
            let next_r = &old_r - &q * &r;
            old_r = std::mem::replace(&mut r, next_r);
            let next_s = &old_s - &q * &s;
            old_s = std::mem::replace(&mut s, next_s);
        }

        if !old_r.abs().is_one() {
            return None;
        }

        Some(self.reduce(&old_s))
    }
}
