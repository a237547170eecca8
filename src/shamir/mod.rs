mod field;

pub use field::PrimeField;

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShamirError {
    #[error("threshold must be at least 2 (got {0})")]
    InvalidThreshold(usize),
    #[error("too many shares: {0} exceeds the largest share identifier")]
    TooManyShares(usize),
    #[error("threshold {threshold} cannot exceed total shares {total_shares}")]
    SharesLessThanThreshold { threshold: usize, total_shares: usize },
    #[error("insufficient shares: need {needed}, got {actual}")]
    InsufficientShares { needed: usize, actual: usize },
    #[error("shares must contain unique identifiers (duplicate id {0})")]
    DuplicateShares(u32),
    #[error("invalid share identifier {0}")]
    InvalidShareIdentifier(u32),
    #[error("secret is not smaller than the field modulus")]
    SecretOutOfRange,
    #[error("interpolation denominator is not invertible")]
    NonInvertible,
}

/// Threshold parameters for one split operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecretSharingConfig {
    pub threshold: usize,
    pub total_shares: usize,
}

impl SecretSharingConfig {
    pub fn new(threshold: usize, total_shares: usize) -> Self {
        Self {
            threshold,
            total_shares,
        }
    }

    /// Check `2 <= threshold <= total_shares` and that every share id fits in a `u32`
    pub fn validate(&self) -> Result<(), ShamirError> {
        if self.threshold < 2 {
            return Err(ShamirError::InvalidThreshold(self.threshold));
        }
        if u32::try_from(self.total_shares).is_err() {
            return Err(ShamirError::TooManyShares(self.total_shares));
        }
        if self.threshold > self.total_shares {
            return Err(ShamirError::SharesLessThanThreshold {
                threshold: self.threshold,
                total_shares: self.total_shares,
            });
        }
        Ok(())
    }
}

/// Share represents a single point `(id, f(id))` of the sharing polynomial
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Share {
    pub id: u32,
    pub value: BigUint,
}

/// Split a secret into `total_shares` shares, any `threshold` of which recover it
pub fn split<R: Rng + CryptoRng>(
    secret: &BigUint,
    config: &SecretSharingConfig,
    field: &PrimeField,
    rng: &mut R,
) -> Result<Vec<Share>, ShamirError> {
    config.validate()?;
    if secret >= field.modulus() {
        return Err(ShamirError::SecretOutOfRange);
    }

    // f(x) = secret + c1*x + ... + c_{t-1}*x^{t-1}
    let mut coefficients = Vec::with_capacity(config.threshold);
    coefficients.push(secret.clone());
    for _ in 1..config.threshold {
        coefficients.push(rng.gen_biguint_below(field.modulus()));
    }

    let total = u32::try_from(config.total_shares)
        .map_err(|_| ShamirError::TooManyShares(config.total_shares))?;
    let shares = (1..=total)
        .map(|id| Share {
            id,
            value: evaluate(&coefficients, id, field),
        })
        .collect();

    // Wipe coefficients after use
    for c in coefficients.iter_mut() {
        c.set_zero();
    }

    Ok(shares)
}

/// Horner evaluation of the polynomial at `x`
fn evaluate(coefficients: &[BigUint], x: u32, field: &PrimeField) -> BigUint {
    let x = BigUint::from(x);
    coefficients
        .iter()
        .rev()
        .fold(BigUint::zero(), |acc, c| (acc * &x + c) % field.modulus())
}

/// Recover the secret `f(0)` from the first `threshold` shares
pub fn recover(
    shares: &[Share],
    threshold: usize,
    field: &PrimeField,
) -> Result<BigUint, ShamirError> {
    if shares.len() < threshold {
        return Err(ShamirError::InsufficientShares {
            needed: threshold,
            actual: shares.len(),
        });
    }

    let points = &shares[..threshold];

    // Ensure all share IDs are unique
    let mut seen = HashSet::new();
    for share in points {
        if share.id == 0 {
            return Err(ShamirError::InvalidShareIdentifier(share.id));
        }
        if !seen.insert(share.id) {
            return Err(ShamirError::DuplicateShares(share.id));
        }
    }

    // Lagrange interpolation at x = 0
    let mut secret = BigUint::zero();
    for (i, share_i) in points.iter().enumerate() {
        let x_i = BigInt::from(share_i.id);
        let mut numerator = BigInt::one();
        let mut denominator = BigInt::one();

        for (j, share_j) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            let x_j = BigInt::from(share_j.id);
            numerator = BigInt::from(field.reduce(&(numerator * -&x_j)));
            denominator = BigInt::from(field.reduce(&(denominator * (&x_i - &x_j))));
        }

        let inverse = field
            .inverse(&denominator)
            .ok_or(ShamirError::NonInvertible)?;
        let term = field.reduce(&numerator) * inverse % field.modulus();
        secret = (secret + term * &share_i.value) % field.modulus();
    }

    Ok(secret)
}
