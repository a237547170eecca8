use num_bigint::BigUint;
use rand::{CryptoRng, Rng};
use std::collections::{BTreeMap, HashSet};
use zeroize::Zeroizing;

use super::{CommonMetadata, FileInput, RecoveryResult, SchemeError, ShareEngine};
use crate::chunk::{self, CHUNK_SIZE};
use crate::crypto::{self, SecretString, IV_LEN};
use crate::shamir::{self, SecretSharingConfig, Share};

/// Pure-Shamir metadata. There is no `iv` field: with a password the IV is
/// the first 12 bytes of the shared stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PureMetadata {
    pub common: CommonMetadata,
    pub chunk_size: usize,
    pub total_chunks: usize,
    /// Length of the shared stream (IV + ciphertext when encrypted)
    pub processed_size: usize,
}

/// One share of one chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PureShamirShare {
    pub id: u32,
    pub value: BigUint,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl PureShamirShare {
    fn to_share(&self) -> Share {
        Share {
            id: self.id,
            value: self.value.clone(),
        }
    }
}

/// All chunk shares of one split, ordered by chunk then share id
#[derive(Debug)]
pub struct PureSplit {
    pub shares: Vec<PureShamirShare>,
    pub metadata: PureMetadata,
}

pub(super) fn split<R: Rng + CryptoRng>(
    engine: &ShareEngine,
    file: &FileInput<'_>,
    config: &SecretSharingConfig,
    password: Option<&SecretString>,
    rng: &mut R,
) -> Result<PureSplit, SchemeError> {
    config.validate()?;

    let original_sha256 = crypto::sha256_hex(file.data);

    let (stream, salt) = match password {
        Some(password) => {
            let salt = crypto::generate_salt(rng);
            let key = engine.kdf.derive_key(password, &salt)?;
            let iv = crypto::generate_iv(rng);
            let ciphertext = crypto::encrypt(&key[..], &iv, file.data)?;

            let mut stream = Vec::with_capacity(IV_LEN + ciphertext.len());
            stream.extend_from_slice(&iv);
            stream.extend_from_slice(&ciphertext);
            (Zeroizing::new(stream), Some(salt.to_vec()))
        }
        None => (Zeroizing::new(file.data.to_vec()), None),
    };
    // An encrypted empty file still carries its IV and tag
    if stream.is_empty() {
        return Err(SchemeError::EmptyFile);
    }

    let chunks = chunk::encode(&stream);
    let total_chunks = chunks.len();

    let mut shares = Vec::with_capacity(total_chunks * config.total_shares);
    for (chunk_index, secret) in chunks.iter().enumerate() {
        let chunk_shares = shamir::split(secret, config, &engine.field, rng)?;
        shares.extend(chunk_shares.into_iter().map(|share| PureShamirShare {
            id: share.id,
            value: share.value,
            chunk_index,
            total_chunks,
        }));
    }

    let metadata = PureMetadata {
        common: CommonMetadata::new(file, config, salt, engine.kdf, original_sha256),
        chunk_size: CHUNK_SIZE,
        total_chunks,
        processed_size: stream.len(),
    };

    Ok(PureSplit { shares, metadata })
}

pub(super) fn recover(
    engine: &ShareEngine,
    shares: &[PureShamirShare],
    metadata: &PureMetadata,
    password: Option<&SecretString>,
) -> Result<RecoveryResult, SchemeError> {
    let common = &metadata.common;
    let password = common.check_password(password)?;

    // Group by chunk, keeping the first share seen for each id
    let mut groups: BTreeMap<usize, Vec<Share>> = BTreeMap::new();
    for share in shares {
        if share.chunk_index >= metadata.total_chunks {
            return Err(SchemeError::ChunkOutOfRange {
                index: share.chunk_index,
                total: metadata.total_chunks,
            });
        }
        let group = groups.entry(share.chunk_index).or_default();
        if group.iter().all(|s| s.id != share.id) {
            group.push(share.to_share());
        }
    }

    if groups.len() < metadata.total_chunks {
        return Err(SchemeError::IncompleteShareData {
            expected: metadata.total_chunks,
            actual: groups.len(),
        });
    }

    let distinct_ids: HashSet<u32> = shares.iter().map(|s| s.id).collect();
    if distinct_ids.len() < common.threshold {
        return Err(SchemeError::InsufficientShares {
            needed: common.threshold,
            actual: distinct_ids.len(),
        });
    }

    // Enough ids overall does not mean every chunk has enough of its own
    let mut recovered = Vec::with_capacity(metadata.total_chunks);
    for (&index, group) in &groups {
        let secret = shamir::recover(group, common.threshold, &engine.field)
            .map_err(|source| SchemeError::ChunkRecovery { chunk: index, source })?;
        recovered.push(secret);
    }

    let data_size = if common.use_password {
        metadata.processed_size
    } else {
        common.original_size
    };
    let stream = Zeroizing::new(chunk::decode(&recovered, data_size)?);

    let data = match password {
        Some(password) => {
            if stream.len() < IV_LEN {
                return Err(SchemeError::Corrupted(format!(
                    "encrypted stream is {} bytes, shorter than its {}-byte IV",
                    stream.len(),
                    IV_LEN
                )));
            }
            let (iv, ciphertext) = stream.split_at(IV_LEN);
            let key = common
                .kdf
                .derive_key(password, common.salt()?)
                .map_err(|_| SchemeError::Decryption)?;
            crypto::decrypt(&key[..], iv, ciphertext).map_err(|_| SchemeError::Decryption)?
        }
        None => stream.to_vec(),
    };

    Ok(RecoveryResult::new(data, &common.filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{SchemeKind, SplitOutput};
    use crate::shamir::{PrimeField, ShamirError};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::from_seed([21u8; 32])
    }

    fn split_file(
        engine: &ShareEngine,
        data: &[u8],
        config: SecretSharingConfig,
        password: Option<&SecretString>,
    ) -> PureSplit {
        let file = FileInput {
            name: "photo.jpg",
            data,
        };
        match engine
            .split(SchemeKind::PureShamir, &file, &config, password, &mut rng())
            .unwrap()
        {
            SplitOutput::PureShamir(split) => split,
            SplitOutput::Hybrid(_) => panic!("expected pure-shamir split"),
        }
    }

    fn holders(shares: &[PureShamirShare], ids: &[u32]) -> Vec<PureShamirShare> {
        shares
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect()
    }

    #[test]
    fn test_split_layout() {
        let engine = ShareEngine::default();
        let data = vec![0xabu8; 70];
        let split = split_file(&engine, &data, SecretSharingConfig::new(2, 3), None);

        assert_eq!(split.metadata.total_chunks, 3);
        assert_eq!(split.metadata.chunk_size, 32);
        assert_eq!(split.metadata.processed_size, 70);
        assert_eq!(split.metadata.common.original_size, 70);
        assert_eq!(split.shares.len(), 9);

        for id in 1..=3u32 {
            let mut indices: Vec<usize> = split
                .shares
                .iter()
                .filter(|s| s.id == id)
                .map(|s| s.chunk_index)
                .collect();
            indices.sort_unstable();
            assert_eq!(indices, vec![0, 1, 2]);
        }
        assert!(split.shares.iter().all(|s| s.total_chunks == 3));
    }

    #[test]
    fn test_round_trip_without_password() {
        let engine = ShareEngine::default();
        for len in [1usize, 31, 32, 33, 64, 200] {
            let data: Vec<u8> = (0..len).map(|i| (255 - i % 256) as u8).collect();
            let split = split_file(&engine, &data, SecretSharingConfig::new(3, 4), None);

            let subset = holders(&split.shares, &[2, 3, 4]);
            let result = recover(&engine, &subset, &split.metadata, None).unwrap();
            assert_eq!(result.data, data, "length {}", len);
            assert_eq!(result.recovered_sha256, split.metadata.common.original_sha256);
        }
    }

    #[test]
    fn test_hundred_bytes_with_password() {
        let engine = ShareEngine::default();
        let data: Vec<u8> = (0..100u8).collect();
        let password = SecretString::from("correct-password");
        let split = split_file(&engine, &data, SecretSharingConfig::new(2, 3), Some(&password));

        // IV + ciphertext + GCM tag
        assert_eq!(split.metadata.processed_size, IV_LEN + 100 + 16);
        assert_eq!(split.metadata.total_chunks, 4);
        assert!(split.metadata.common.use_password);

        let wrong = SecretString::from("wrong-password");
        let err = recover(&engine, &split.shares, &split.metadata, Some(&wrong)).unwrap_err();
        assert!(matches!(err, SchemeError::Decryption));
        assert_eq!(
            err.to_string(),
            "decryption failed: wrong password or corrupted data"
        );

        for pair in [[1u32, 2], [1, 3], [2, 3]] {
            let subset = holders(&split.shares, &pair);
            let result = recover(&engine, &subset, &split.metadata, Some(&password)).unwrap();
            assert_eq!(result.data, data);
        }
    }

    #[test]
    fn test_password_flag_mismatch() {
        let engine = ShareEngine::default();
        let password = SecretString::from("pw");

        let plain = split_file(&engine, b"plain", SecretSharingConfig::new(2, 2), None);
        assert!(matches!(
            recover(&engine, &plain.shares, &plain.metadata, Some(&password)),
            Err(SchemeError::PasswordNotExpected)
        ));

        let locked = split_file(&engine, b"locked", SecretSharingConfig::new(2, 2), Some(&password));
        assert!(matches!(
            recover(&engine, &locked.shares, &locked.metadata, None),
            Err(SchemeError::PasswordRequired)
        ));
    }

    #[test]
    fn test_missing_chunk_group() {
        let engine = ShareEngine::default();
        let split = split_file(&engine, &[7u8; 64], SecretSharingConfig::new(2, 3), None);

        let partial: Vec<PureShamirShare> = split
            .shares
            .iter()
            .filter(|s| s.chunk_index == 0)
            .cloned()
            .collect();
        let err = recover(&engine, &partial, &split.metadata, None).unwrap_err();
        assert!(matches!(
            err,
            SchemeError::IncompleteShareData { expected: 2, actual: 1 }
        ));
    }

    #[test]
    fn test_too_few_distinct_ids() {
        let engine = ShareEngine::default();
        let split = split_file(&engine, &[7u8; 64], SecretSharingConfig::new(3, 5), None);

        let subset = holders(&split.shares, &[1, 4]);
        let err = recover(&engine, &subset, &split.metadata, None).unwrap_err();
        assert!(matches!(
            err,
            SchemeError::InsufficientShares { needed: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_per_chunk_insufficiency() {
        let engine = ShareEngine::default();
        let split = split_file(&engine, &[9u8; 40], SecretSharingConfig::new(2, 3), None);
        assert_eq!(split.metadata.total_chunks, 2);

        // Chunk 0 from ids 1, 2, 3; chunk 1 only from id 1
        let subset: Vec<PureShamirShare> = split
            .shares
            .iter()
            .filter(|s| s.chunk_index == 0 || s.id == 1)
            .cloned()
            .collect();

        let err = recover(&engine, &subset, &split.metadata, None).unwrap_err();
        match err {
            SchemeError::ChunkRecovery { chunk, source } => {
                assert_eq!(chunk, 1);
                assert_eq!(
                    source,
                    ShamirError::InsufficientShares {
                        needed: 2,
                        actual: 1
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_chunk_index_out_of_range() {
        let engine = ShareEngine::default();
        let mut split = split_file(&engine, &[1u8; 10], SecretSharingConfig::new(2, 2), None);
        split.shares[0].chunk_index = 5;

        assert!(matches!(
            recover(&engine, &split.shares, &split.metadata, None),
            Err(SchemeError::ChunkOutOfRange { index: 5, total: 1 })
        ));
    }

    #[test]
    fn test_truncated_encrypted_stream() {
        let engine = ShareEngine::default();
        let password = SecretString::from("pw");
        let split = split_file(&engine, b"0123456789", SecretSharingConfig::new(2, 2), Some(&password));

        let mut metadata = split.metadata.clone();
        metadata.processed_size = 8;
        let err = recover(&engine, &split.shares, &metadata, Some(&password)).unwrap_err();
        assert!(matches!(err, SchemeError::Corrupted(_)));
    }

    #[test]
    fn test_empty_file_rejected() {
        let engine = ShareEngine::default();
        let file = FileInput {
            name: "empty",
            data: &[],
        };
        let err = engine
            .split(SchemeKind::PureShamir, &file, &SecretSharingConfig::new(2, 2), None, &mut rng())
            .unwrap_err();
        assert!(matches!(err, SchemeError::EmptyFile));
    }

    #[test]
    fn test_empty_file_with_password() {
        let engine = ShareEngine::default();
        let password = SecretString::from("pw");
        let split = split_file(&engine, &[], SecretSharingConfig::new(2, 3), Some(&password));

        // IV + GCM tag only
        assert_eq!(split.metadata.processed_size, IV_LEN + 16);
        assert_eq!(split.metadata.total_chunks, 1);
        assert_eq!(split.metadata.common.original_size, 0);

        let subset = holders(&split.shares, &[1, 3]);
        let result = recover(&engine, &subset, &split.metadata, Some(&password)).unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.recovered_sha256, split.metadata.common.original_sha256);
    }

    #[test]
    fn test_alternate_prime_field() {
        // Any prime above 2^256 holds every chunk
        let prime = (BigUint::from(1u32) << 607) - 1u32;
        let engine = ShareEngine::new(PrimeField::new(prime));
        let data = vec![0xffu8; 96];
        let split = split_file(&engine, &data, SecretSharingConfig::new(2, 3), None);

        let result = recover(&engine, &holders(&split.shares, &[1, 3]), &split.metadata, None).unwrap();
        assert_eq!(result.data, data);
    }
}
