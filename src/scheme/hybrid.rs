use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use super::{CommonMetadata, FileInput, RecoveryResult, SchemeError, ShareEngine};
use crate::chunk;
use crate::crypto::{self, SecretString};
use crate::shamir::{self, SecretSharingConfig, Share};

/// Hybrid metadata: the IV is stored in the clear
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HybridMetadata {
    pub common: CommonMetadata,
    pub iv: Vec<u8>,
}

/// Shares of the file key plus the encrypted file
#[derive(Debug)]
pub struct HybridSplit {
    pub shares: Vec<Share>,
    pub metadata: HybridMetadata,
    pub ciphertext: Vec<u8>,
}

pub(super) fn split<R: Rng + CryptoRng>(
    engine: &ShareEngine,
    file: &FileInput<'_>,
    config: &SecretSharingConfig,
    password: Option<&SecretString>,
    rng: &mut R,
) -> Result<HybridSplit, SchemeError> {
    config.validate()?;

    let original_sha256 = crypto::sha256_hex(file.data);
    let iv = crypto::generate_iv(rng);

    let (key, salt) = match password {
        Some(password) => {
            let salt = crypto::generate_salt(rng);
            (engine.kdf.derive_key(password, &salt)?, Some(salt.to_vec()))
        }
        None => (crypto::generate_key(rng), None),
    };

    let ciphertext = crypto::encrypt(&key[..], &iv, file.data)?;

    // The key is shared as a single little-endian integer
    let secret = chunk::bytes_to_int(&key[..]);
    let shares = shamir::split(&secret, config, &engine.field, rng)?;

    let metadata = HybridMetadata {
        common: CommonMetadata::new(file, config, salt, engine.kdf, original_sha256),
        iv: iv.to_vec(),
    };

    Ok(HybridSplit {
        shares,
        metadata,
        ciphertext,
    })
}

/// Decrypt a hybrid ciphertext.
///
/// With a password the key is re-derived from it directly and the shares
/// only have to meet the threshold count. Without one the key is
/// interpolated from the shares.
pub(super) fn recover(
    engine: &ShareEngine,
    shares: &[Share],
    metadata: &HybridMetadata,
    ciphertext: &[u8],
    password: Option<&SecretString>,
) -> Result<RecoveryResult, SchemeError> {
    let common = &metadata.common;
    if shares.len() < common.threshold {
        return Err(SchemeError::InsufficientShares {
            needed: common.threshold,
            actual: shares.len(),
        });
    }

    let key = match common.check_password(password)? {
        Some(password) => common
            .kdf
            .derive_key(password, common.salt()?)
            .map_err(|_| SchemeError::Decryption)?,
        None => {
            let secret = shamir::recover(shares, common.threshold, &engine.field)?;
            // A wrong share set interpolates to an arbitrary field element
            Zeroizing::new(chunk::int_to_bytes(&secret).ok_or(SchemeError::Decryption)?)
        }
    };

    let data = crypto::decrypt(&key[..], &metadata.iv, ciphertext)
        .map_err(|_| SchemeError::Decryption)?;

    Ok(RecoveryResult::new(data, &common.filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{SchemeKind, ShareSet, SplitOutput};
    use crate::shamir::ShamirError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::from_seed([11u8; 32])
    }

    fn split_file(
        engine: &ShareEngine,
        data: &[u8],
        config: SecretSharingConfig,
        password: Option<&SecretString>,
    ) -> HybridSplit {
        let file = FileInput {
            name: "report.pdf",
            data,
        };
        match engine
            .split(SchemeKind::Hybrid, &file, &config, password, &mut rng())
            .unwrap()
        {
            SplitOutput::Hybrid(split) => split,
            SplitOutput::PureShamir(_) => panic!("expected hybrid split"),
        }
    }

    fn pick(shares: &[Share], ids: &[u32]) -> Vec<Share> {
        ids.iter()
            .map(|id| shares.iter().find(|s| s.id == *id).unwrap().clone())
            .collect()
    }

    #[test]
    fn test_ten_kilobyte_file_three_of_five() {
        let engine = ShareEngine::default();
        let data: Vec<u8> = (0..10 * 1024).map(|i| (i * 31 % 256) as u8).collect();
        let split = split_file(&engine, &data, SecretSharingConfig::new(3, 5), None);

        assert_eq!(split.shares.len(), 5);
        assert_eq!(split.metadata.iv.len(), crypto::IV_LEN);
        assert!(!split.metadata.common.use_password);
        assert_eq!(split.metadata.common.original_size, data.len());
        assert_ne!(split.ciphertext[..64], data[..64]);

        let subset = pick(&split.shares, &[1, 2, 4]);
        let result = recover(&engine, &subset, &split.metadata, &split.ciphertext, None).unwrap();

        assert_eq!(result.data, data);
        assert_eq!(result.recovered_sha256, split.metadata.common.original_sha256);
        assert_eq!(result.filename, "report.pdf");
    }

    #[test]
    fn test_insufficient_shares() {
        let engine = ShareEngine::default();
        let split = split_file(&engine, b"hello", SecretSharingConfig::new(3, 5), None);

        let err = recover(&engine, &split.shares[..2], &split.metadata, &split.ciphertext, None)
            .unwrap_err();
        assert!(matches!(
            err,
            SchemeError::InsufficientShares { needed: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_password_flag_mismatch() {
        let engine = ShareEngine::default();
        let password = SecretString::from("s3cret");

        let plain = split_file(&engine, b"hello", SecretSharingConfig::new(2, 3), None);
        let err = recover(
            &engine,
            &plain.shares,
            &plain.metadata,
            &plain.ciphertext,
            Some(&password),
        )
        .unwrap_err();
        assert!(matches!(err, SchemeError::PasswordNotExpected));

        let locked = split_file(&engine, b"hello", SecretSharingConfig::new(2, 3), Some(&password));
        let err = recover(&engine, &locked.shares, &locked.metadata, &locked.ciphertext, None)
            .unwrap_err();
        assert!(matches!(err, SchemeError::PasswordRequired));
    }

    #[test]
    fn test_password_path_uses_derived_key() {
        let engine = ShareEngine::default();
        let password = SecretString::from("s3cret");
        let split = split_file(&engine, b"top secret", SecretSharingConfig::new(2, 3), Some(&password));

        assert!(split.metadata.common.use_password);
        assert_eq!(split.metadata.common.salt.as_ref().map(Vec::len), Some(crypto::SALT_LEN));

        let result = recover(
            &engine,
            &split.shares[1..],
            &split.metadata,
            &split.ciphertext,
            Some(&password),
        )
        .unwrap();
        assert_eq!(result.data, b"top secret");

        // The shares carry the derived key, so they also open the file without it
        let key = shamir::recover(&split.shares, 2, &engine.field).unwrap();
        let key = chunk::int_to_bytes(&key).unwrap();
        let opened = crypto::decrypt(&key, &split.metadata.iv, &split.ciphertext).unwrap();
        assert_eq!(opened, b"top secret");

        let wrong = SecretString::from("guess");
        let err = recover(&engine, &split.shares, &split.metadata, &split.ciphertext, Some(&wrong))
            .unwrap_err();
        assert!(matches!(err, SchemeError::Decryption));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let engine = ShareEngine::default();
        let mut split = split_file(&engine, b"integrity", SecretSharingConfig::new(2, 2), None);
        split.ciphertext[0] ^= 0x01;

        let err = recover(&engine, &split.shares, &split.metadata, &split.ciphertext, None)
            .unwrap_err();
        assert!(matches!(err, SchemeError::Decryption));
    }

    #[test]
    fn test_invalid_config() {
        let engine = ShareEngine::default();
        let file = FileInput {
            name: "x",
            data: b"x",
        };
        let err = engine
            .split(SchemeKind::Hybrid, &file, &SecretSharingConfig::new(1, 3), None, &mut rng())
            .unwrap_err();
        assert!(matches!(
            err,
            SchemeError::Shamir(ShamirError::InvalidThreshold(1))
        ));
    }

    #[test]
    fn test_missing_ciphertext() {
        let engine = ShareEngine::default();
        let split = split_file(&engine, b"abc", SecretSharingConfig::new(2, 3), None);
        let set = ShareSet::Hybrid {
            shares: split.shares.clone(),
            metadata: split.metadata.clone(),
        };
        assert!(matches!(
            engine.recover(&set, None, None),
            Err(SchemeError::MissingCiphertext)
        ));
    }
}
