//! Portable JSON form of share files.
//!
//! Big integers are written as decimal strings and binary fields (`iv`,
//! `salt`) as standard base64, so any JSON reader can round-trip them.

use base64::{engine::general_purpose, Engine as _};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::chunk::CHUNK_SIZE;
use crate::crypto::Kdf;
use crate::scheme::{
    CommonMetadata, FileMetadata, HybridMetadata, PureMetadata, PureShamirShare, SchemeKind,
};

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("invalid share file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 in field '{field}': {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("metadata is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("unsupported chunk size {0}, expected 32")]
    UnsupportedChunkSize(usize),
    #[error("share {share_id} holds an entry for share {found}")]
    ForeignShare { share_id: u32, found: u32 },
}

/// What one share holder receives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareFile {
    /// One share of the file key
    Hybrid {
        id: u32,
        share: BigUint,
        metadata: HybridMetadata,
    },
    /// This holder's share of every chunk
    PureShamir {
        share_id: u32,
        shares: Vec<PureShamirShare>,
        metadata: PureMetadata,
    },
}

impl ShareFile {
    pub fn id(&self) -> u32 {
        match self {
            ShareFile::Hybrid { id, .. } => *id,
            ShareFile::PureShamir { share_id, .. } => *share_id,
        }
    }

    pub fn metadata(&self) -> FileMetadata {
        match self {
            ShareFile::Hybrid { metadata, .. } => FileMetadata::Hybrid(metadata.clone()),
            ShareFile::PureShamir { metadata, .. } => FileMetadata::PureShamir(metadata.clone()),
        }
    }
}

mod decimal {
    use num_bigint::BigUint;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let text = String::deserialize(deserializer)?;
        BigUint::parse_bytes(text.trim().as_bytes(), 10)
            .ok_or_else(|| D::Error::custom(format!("'{}' is not a decimal integer", text)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataWire {
    scheme: SchemeKind,
    threshold: usize,
    total_shares: usize,
    filename: String,
    original_size: usize,
    use_password: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kdf: Option<Kdf>,
    #[serde(rename = "originalSHA256")]
    original_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processed_size: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HybridFileWire {
    id: u32,
    #[serde(with = "decimal")]
    share: BigUint,
    metadata: MetadataWire,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkShareWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u32>,
    chunk_index: usize,
    total_chunks: usize,
    #[serde(with = "decimal")]
    value: BigUint,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PureFileWire {
    share_id: u32,
    shares: Vec<ChunkShareWire>,
    metadata: MetadataWire,
}

fn encode_b64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

fn decode_b64(field: &'static str, text: &str) -> Result<Vec<u8>, SerializationError> {
    general_purpose::STANDARD
        .decode(text)
        .map_err(|source| SerializationError::Base64 { field, source })
}

impl MetadataWire {
    fn from_common(scheme: SchemeKind, common: &CommonMetadata) -> Self {
        Self {
            scheme,
            threshold: common.threshold,
            total_shares: common.total_shares,
            filename: common.filename.clone(),
            original_size: common.original_size,
            use_password: common.use_password,
            salt: common.salt.as_deref().map(encode_b64),
            kdf: common.use_password.then_some(common.kdf),
            original_sha256: common.original_sha256.clone(),
            created_at: common.created_at.clone(),
            iv: None,
            chunk_size: None,
            total_chunks: None,
            processed_size: None,
        }
    }

    fn from_metadata(metadata: &FileMetadata) -> Self {
        match metadata {
            FileMetadata::Hybrid(m) => Self {
                iv: Some(encode_b64(&m.iv)),
                ..Self::from_common(SchemeKind::Hybrid, &m.common)
            },
            FileMetadata::PureShamir(m) => Self {
                chunk_size: Some(m.chunk_size),
                total_chunks: Some(m.total_chunks),
                processed_size: Some(m.processed_size),
                ..Self::from_common(SchemeKind::PureShamir, &m.common)
            },
        }
    }

    fn common(&self) -> Result<CommonMetadata, SerializationError> {
        let salt = self
            .salt
            .as_deref()
            .map(|s| decode_b64("salt", s))
            .transpose()?;
        if self.use_password && salt.is_none() {
            return Err(SerializationError::MissingField("salt"));
        }

        Ok(CommonMetadata {
            threshold: self.threshold,
            total_shares: self.total_shares,
            filename: self.filename.clone(),
            original_size: self.original_size,
            use_password: self.use_password,
            salt,
            kdf: self.kdf.unwrap_or_default(),
            original_sha256: self.original_sha256.clone(),
            created_at: self.created_at.clone(),
        })
    }

    fn into_hybrid(self) -> Result<HybridMetadata, SerializationError> {
        let iv = self.iv.as_deref().ok_or(SerializationError::MissingField("iv"))?;
        Ok(HybridMetadata {
            iv: decode_b64("iv", iv)?,
            common: self.common()?,
        })
    }

    fn into_pure(self) -> Result<PureMetadata, SerializationError> {
        let chunk_size = self.chunk_size.unwrap_or(CHUNK_SIZE);
        if chunk_size != CHUNK_SIZE {
            return Err(SerializationError::UnsupportedChunkSize(chunk_size));
        }
        let total_chunks = self
            .total_chunks
            .ok_or(SerializationError::MissingField("totalChunks"))?;
        let processed_size = self
            .processed_size
            .ok_or(SerializationError::MissingField("processedSize"))?;

        Ok(PureMetadata {
            common: self.common()?,
            chunk_size,
            total_chunks,
            processed_size,
        })
    }
}

/// Serialize a share file as pretty-printed JSON
pub fn to_json(file: &ShareFile) -> Result<String, SerializationError> {
    let text = match file {
        ShareFile::Hybrid {
            id,
            share,
            metadata,
        } => serde_json::to_string_pretty(&HybridFileWire {
            id: *id,
            share: share.clone(),
            metadata: MetadataWire::from_metadata(&FileMetadata::Hybrid(metadata.clone())),
        })?,
        ShareFile::PureShamir {
            share_id,
            shares,
            metadata,
        } => serde_json::to_string_pretty(&PureFileWire {
            share_id: *share_id,
            shares: shares
                .iter()
                .map(|s| ChunkShareWire {
                    id: None,
                    chunk_index: s.chunk_index,
                    total_chunks: s.total_chunks,
                    value: s.value.clone(),
                })
                .collect(),
            metadata: MetadataWire::from_metadata(&FileMetadata::PureShamir(metadata.clone())),
        })?,
    };
    Ok(text)
}

/// Parse a share file, reconstructing every integer exactly
pub fn from_json(text: &str) -> Result<ShareFile, SerializationError> {
    let value: Value = serde_json::from_str(text)?;

    match scheme_of(&value).unwrap_or_default() {
        SchemeKind::Hybrid => {
            let wire: HybridFileWire = serde_json::from_value(value)?;
            Ok(ShareFile::Hybrid {
                id: wire.id,
                share: wire.share,
                metadata: wire.metadata.into_hybrid()?,
            })
        }
        SchemeKind::PureShamir => {
            let wire: PureFileWire = serde_json::from_value(value)?;
            let share_id = wire.share_id;
            let shares = wire
                .shares
                .into_iter()
                .map(|s| match s.id {
                    Some(found) if found != share_id => {
                        Err(SerializationError::ForeignShare { share_id, found })
                    }
                    _ => Ok(PureShamirShare {
                        id: share_id,
                        value: s.value,
                        chunk_index: s.chunk_index,
                        total_chunks: s.total_chunks,
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ShareFile::PureShamir {
                share_id,
                shares,
                metadata: wire.metadata.into_pure()?,
            })
        }
    }
}

fn scheme_of(value: &Value) -> Option<SchemeKind> {
    if let Some(scheme) = value.pointer("/metadata/scheme").and_then(Value::as_str) {
        return scheme.parse().ok();
    }
    // Older files without a discriminator
    if value.get("shareId").is_some() || value.get("shares").is_some_and(Value::is_array) {
        return Some(SchemeKind::PureShamir);
    }
    None
}

/// Best-effort scheme detection. Never fails: anything unrecognised,
/// including malformed JSON, is reported as hybrid.
pub fn detect_scheme(text: &str) -> SchemeKind {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|value| scheme_of(&value))
        .unwrap_or(SchemeKind::Hybrid)
}
