//! File splitting schemes built on the Shamir engine.
//!
//! Two schemes are supported:
//!
//! * **Hybrid** encrypts the file once with AES-256-GCM and shares only the
//!   256-bit key. The ciphertext is distributed alongside the shares and the
//!   IV travels in the clear inside the metadata.
//! * **Pure-Shamir** shares the (optionally password-encrypted) byte stream
//!   itself, one 32-byte chunk at a time. The IV is embedded in the shared
//!   stream, so it stays hidden until `threshold` fragments are combined.

mod hybrid;
mod pure;

pub use hybrid::{HybridMetadata, HybridSplit};
pub use pure::{PureMetadata, PureShamirShare, PureSplit};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::chunk::ChunkError;
use crate::crypto::{self, CryptoError, Kdf, SecretString};
use crate::serialization::ShareFile;
use crate::shamir::{PrimeField, SecretSharingConfig, ShamirError, Share};

#[derive(Debug, Error)]
pub enum SchemeError {
    #[error(transparent)]
    Shamir(#[from] ShamirError),
    #[error("insufficient shares: need {needed} distinct shares, got {actual}")]
    InsufficientShares { needed: usize, actual: usize },
    #[error("incomplete share data: expected {expected} chunks, got {actual}")]
    IncompleteShareData { expected: usize, actual: usize },
    #[error("chunk {chunk} could not be recovered: {source}")]
    ChunkRecovery {
        chunk: usize,
        #[source]
        source: ShamirError,
    },
    #[error("chunk index {index} is outside the expected range of {total} chunks")]
    ChunkOutOfRange { index: usize, total: usize },
    #[error("this file is password protected, a password is required")]
    PasswordRequired,
    #[error("this file is not password protected, no password expected")]
    PasswordNotExpected,
    #[error("decryption failed: wrong password or corrupted data")]
    Decryption,
    #[error("corrupted data: {0}")]
    Corrupted(String),
    #[error("password-protected metadata is missing its salt")]
    MissingSalt,
    #[error("the hybrid scheme needs the encrypted file to recover")]
    MissingCiphertext,
    #[error("cannot split an empty file with the pure-shamir scheme without a password")]
    EmptyFile,
    #[error("no share files supplied")]
    NoShareFiles,
    #[error("share files mix the hybrid and pure-shamir schemes")]
    MixedSchemes,
    #[error("share {0} belongs to a different split (metadata mismatch)")]
    MetadataMismatch(u32),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Scheme discriminator carried in every share file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemeKind {
    #[default]
    #[serde(rename = "hybrid")]
    Hybrid,
    #[serde(rename = "pure-shamir")]
    PureShamir,
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeKind::Hybrid => write!(f, "hybrid"),
            SchemeKind::PureShamir => write!(f, "pure-shamir"),
        }
    }
}

impl FromStr for SchemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hybrid" => Ok(SchemeKind::Hybrid),
            "pure-shamir" | "pure" | "pureshamir" => Ok(SchemeKind::PureShamir),
            other => Err(format!(
                "unknown scheme '{}' (expected hybrid or pure-shamir)",
                other
            )),
        }
    }
}

/// A file handed to the engine for splitting
#[derive(Clone, Copy, Debug)]
pub struct FileInput<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

/// Metadata shared by both schemes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommonMetadata {
    pub threshold: usize,
    pub total_shares: usize,
    pub filename: String,
    pub original_size: usize,
    pub use_password: bool,
    pub salt: Option<Vec<u8>>,
    pub kdf: Kdf,
    pub original_sha256: String,
    /// RFC 3339 creation time, informational only
    pub created_at: Option<String>,
}

impl CommonMetadata {
    fn new(
        file: &FileInput<'_>,
        config: &SecretSharingConfig,
        salt: Option<Vec<u8>>,
        kdf: Kdf,
        original_sha256: String,
    ) -> Self {
        let use_password = salt.is_some();
        Self {
            threshold: config.threshold,
            total_shares: config.total_shares,
            filename: file.name.to_string(),
            original_size: file.data.len(),
            use_password,
            salt,
            // Only meaningful for password-protected files
            kdf: if use_password { kdf } else { Kdf::default() },
            original_sha256,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Match the caller's password against the `use_password` flag
    fn check_password<'a>(
        &self,
        password: Option<&'a SecretString>,
    ) -> Result<Option<&'a SecretString>, SchemeError> {
        match (self.use_password, password) {
            (true, None) => Err(SchemeError::PasswordRequired),
            (false, Some(_)) => Err(SchemeError::PasswordNotExpected),
            (_, password) => Ok(password),
        }
    }

    fn salt(&self) -> Result<&[u8], SchemeError> {
        self.salt.as_deref().ok_or(SchemeError::MissingSalt)
    }
}

/// Scheme-specific metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileMetadata {
    Hybrid(HybridMetadata),
    PureShamir(PureMetadata),
}

impl FileMetadata {
    pub fn scheme(&self) -> SchemeKind {
        match self {
            FileMetadata::Hybrid(_) => SchemeKind::Hybrid,
            FileMetadata::PureShamir(_) => SchemeKind::PureShamir,
        }
    }

    pub fn common(&self) -> &CommonMetadata {
        match self {
            FileMetadata::Hybrid(m) => &m.common,
            FileMetadata::PureShamir(m) => &m.common,
        }
    }
}

/// Output of a recovery, never persisted by the engine
#[derive(Debug)]
pub struct RecoveryResult {
    pub data: Vec<u8>,
    pub recovered_sha256: String,
    pub filename: String,
}

impl RecoveryResult {
    fn new(data: Vec<u8>, filename: &str) -> Self {
        Self {
            recovered_sha256: crypto::sha256_hex(&data),
            data,
            filename: filename.to_string(),
        }
    }

    /// Compare the recovered digest with the one recorded at split time.
    ///
    /// Recovery itself never rejects a mismatch; callers decide.
    pub fn integrity_ok(&self, metadata: &CommonMetadata) -> bool {
        self.recovered_sha256
            .eq_ignore_ascii_case(&metadata.original_sha256)
    }
}

/// Result of splitting a file
#[derive(Debug)]
pub enum SplitOutput {
    Hybrid(HybridSplit),
    PureShamir(PureSplit),
}

impl SplitOutput {
    pub fn metadata(&self) -> FileMetadata {
        match self {
            SplitOutput::Hybrid(split) => FileMetadata::Hybrid(split.metadata.clone()),
            SplitOutput::PureShamir(split) => FileMetadata::PureShamir(split.metadata.clone()),
        }
    }

    /// Ciphertext to distribute next to the shares (hybrid only)
    pub fn ciphertext(&self) -> Option<&[u8]> {
        match self {
            SplitOutput::Hybrid(split) => Some(&split.ciphertext),
            SplitOutput::PureShamir(_) => None,
        }
    }

    /// One share file per holder, ordered by share id
    pub fn share_files(&self) -> Vec<ShareFile> {
        match self {
            SplitOutput::Hybrid(split) => split
                .shares
                .iter()
                .map(|share| ShareFile::Hybrid {
                    id: share.id,
                    share: share.value.clone(),
                    metadata: split.metadata.clone(),
                })
                .collect(),
            SplitOutput::PureShamir(split) => {
                let mut by_holder: BTreeMap<u32, Vec<PureShamirShare>> = BTreeMap::new();
                for share in &split.shares {
                    by_holder.entry(share.id).or_default().push(share.clone());
                }
                by_holder
                    .into_iter()
                    .map(|(share_id, shares)| ShareFile::PureShamir {
                        share_id,
                        shares,
                        metadata: split.metadata.clone(),
                    })
                    .collect()
            }
        }
    }
}

/// Fragments gathered for one recovery
#[derive(Clone, Debug)]
pub enum ShareSet {
    Hybrid {
        shares: Vec<Share>,
        metadata: HybridMetadata,
    },
    PureShamir {
        shares: Vec<PureShamirShare>,
        metadata: PureMetadata,
    },
}

impl ShareSet {
    /// Merge parsed share files into one recovery input.
    ///
    /// All files must come from the same split. A holder id that shows up
    /// twice is only counted once.
    pub fn from_files(files: Vec<ShareFile>) -> Result<Self, SchemeError> {
        let mut files = files.into_iter();
        match files.next().ok_or(SchemeError::NoShareFiles)? {
            ShareFile::Hybrid {
                id,
                share,
                metadata,
            } => {
                let mut shares = vec![Share { id, value: share }];
                for file in files {
                    let ShareFile::Hybrid {
                        id,
                        share,
                        metadata: other,
                    } = file
                    else {
                        return Err(SchemeError::MixedSchemes);
                    };
                    if other != metadata {
                        return Err(SchemeError::MetadataMismatch(id));
                    }
                    if shares.iter().all(|s| s.id != id) {
                        shares.push(Share { id, value: share });
                    }
                }
                Ok(ShareSet::Hybrid { shares, metadata })
            }
            ShareFile::PureShamir {
                share_id,
                shares: first,
                metadata,
            } => {
                let mut holders = vec![share_id];
                let mut shares = first;
                for file in files {
                    let ShareFile::PureShamir {
                        share_id,
                        shares: more,
                        metadata: other,
                    } = file
                    else {
                        return Err(SchemeError::MixedSchemes);
                    };
                    if other != metadata {
                        return Err(SchemeError::MetadataMismatch(share_id));
                    }
                    if !holders.contains(&share_id) {
                        holders.push(share_id);
                        shares.extend(more);
                    }
                }
                Ok(ShareSet::PureShamir { shares, metadata })
            }
        }
    }

    pub fn scheme(&self) -> SchemeKind {
        match self {
            ShareSet::Hybrid { .. } => SchemeKind::Hybrid,
            ShareSet::PureShamir { .. } => SchemeKind::PureShamir,
        }
    }

    pub fn common(&self) -> &CommonMetadata {
        match self {
            ShareSet::Hybrid { metadata, .. } => &metadata.common,
            ShareSet::PureShamir { metadata, .. } => &metadata.common,
        }
    }
}

/// Splits and recovers files over one fixed prime field
#[derive(Clone, Debug)]
pub struct ShareEngine {
    field: PrimeField,
    kdf: Kdf,
}

impl Default for ShareEngine {
    fn default() -> Self {
        Self::new(PrimeField::default())
    }
}

impl ShareEngine {
    pub fn new(field: PrimeField) -> Self {
        Self {
            field,
            kdf: Kdf::default(),
        }
    }

    /// Use `kdf` for password-protected splits
    pub fn with_kdf(mut self, kdf: Kdf) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn split<R: rand::Rng + rand::CryptoRng>(
        &self,
        scheme: SchemeKind,
        file: &FileInput<'_>,
        config: &SecretSharingConfig,
        password: Option<&SecretString>,
        rng: &mut R,
    ) -> Result<SplitOutput, SchemeError> {
        match scheme {
            SchemeKind::Hybrid => {
                hybrid::split(self, file, config, password, rng).map(SplitOutput::Hybrid)
            }
            SchemeKind::PureShamir => {
                pure::split(self, file, config, password, rng).map(SplitOutput::PureShamir)
            }
        }
    }

    /// Recover the original file. `ciphertext` is required for hybrid sets.
    pub fn recover(
        &self,
        set: &ShareSet,
        ciphertext: Option<&[u8]>,
        password: Option<&SecretString>,
    ) -> Result<RecoveryResult, SchemeError> {
        match set {
            ShareSet::Hybrid { shares, metadata } => {
                let ciphertext = ciphertext.ok_or(SchemeError::MissingCiphertext)?;
                hybrid::recover(self, shares, metadata, ciphertext, password)
            }
            ShareSet::PureShamir { shares, metadata } => {
                pure::recover(self, shares, metadata, password)
            }
        }
    }
}
