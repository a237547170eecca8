use num_bigint::BigUint;
use thiserror::Error;

/// Bytes per chunk. Part of the fragment format, do not change.
pub const CHUNK_SIZE: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk {index} does not fit in 32 bytes")]
    Overflow { index: usize },
    #[error("{chunks} chunks cannot hold {length} bytes")]
    TooShort { chunks: usize, length: usize },
}

/// Interpret up to `CHUNK_SIZE` bytes as a little-endian integer.
/// Short input behaves as if zero-padded on the high end.
pub fn bytes_to_int(block: &[u8]) -> BigUint {
    BigUint::from_bytes_le(block)
}

/// Inverse of [`bytes_to_int`] for a full block
pub fn int_to_bytes(value: &BigUint) -> Option<[u8; CHUNK_SIZE]> {
    let bytes = value.to_bytes_le();
    if bytes.len() > CHUNK_SIZE {
        return None;
    }
    let mut block = [0u8; CHUNK_SIZE];
    block[..bytes.len()].copy_from_slice(&bytes);
    Some(block)
}

/// Split a byte buffer into 32-byte little-endian integers
pub fn encode(data: &[u8]) -> Vec<BigUint> {
    data.chunks(CHUNK_SIZE).map(bytes_to_int).collect()
}

/// Rebuild `length` bytes from chunk integers, dropping the final block's padding
pub fn decode(chunks: &[BigUint], length: usize) -> Result<Vec<u8>, ChunkError> {
    if chunks.len() * CHUNK_SIZE < length {
        return Err(ChunkError::TooShort {
            chunks: chunks.len(),
            length,
        });
    }

    let mut data = Vec::with_capacity(length);
    for (index, chunk) in chunks.iter().enumerate() {
        let remaining = length - data.len();
        if remaining == 0 {
            break;
        }
        let block = int_to_bytes(chunk).ok_or(ChunkError::Overflow { index })?;
        data.extend_from_slice(&block[..remaining.min(CHUNK_SIZE)]);
    }

    Ok(data)
}
