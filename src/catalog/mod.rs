//! Per-file info record (torrent-style): an opaque container that must at
//! least be decodable to recover `length` and the piece structure.
//!
//! The byte format is a minimal bencode dictionary shaped like BitTorrent's
//! single-file info dictionary (`length`, `piece length`, `pieces`), chosen
//! because the original implementation built this file with `libtorrent`'s
//! bencode support. No BEP-3 compliance beyond that shape is implied or
//! required.

mod bencode;

use std::fmt;

use bencode::BValue;

/// Total length in bytes and per-piece SHA-256 digests of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogInfo {
    pub length: u64,
    pub piece_length: u64,
    /// One SHA-256 digest (as raw 32 bytes) per chunk, in chunk order.
    pub pieces: Vec<[u8; 32]>,
}

#[derive(Debug)]
pub struct CatalogError(String);

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "catalog error: {}", self.0)
    }
}

impl std::error::Error for CatalogError {}

impl From<bencode::BencodeError> for CatalogError {
    fn from(value: bencode::BencodeError) -> Self {
        CatalogError(value.0)
    }
}

impl CatalogInfo {
    pub fn new(length: u64, piece_length: u64, pieces: Vec<[u8; 32]>) -> Self {
        Self {
            length,
            piece_length,
            pieces,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let pieces_concat: Vec<u8> = self.pieces.iter().flat_map(|p| p.iter().copied()).collect();

        let mut info = std::collections::BTreeMap::new();
        info.insert(b"length".to_vec(), BValue::Int(self.length as i64));
        info.insert(
            b"piece length".to_vec(),
            BValue::Int(self.piece_length as i64),
        );
        info.insert(b"pieces".to_vec(), BValue::Bytes(pieces_concat));

        let mut root = std::collections::BTreeMap::new();
        root.insert(b"info".to_vec(), BValue::Dict(info));

        bencode::encode(&BValue::Dict(root))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CatalogError> {
        let root = bencode::decode(bytes)?;
        let info = root
            .get("info")
            .ok_or_else(|| CatalogError("missing info dict".into()))?;

        let length = info
            .get("length")
            .and_then(BValue::as_int)
            .ok_or_else(|| CatalogError("missing or invalid length".into()))? as u64;

        let piece_length = info
            .get("piece length")
            .and_then(BValue::as_int)
            .unwrap_or(0) as u64;

        let pieces_concat = info
            .get("pieces")
            .and_then(BValue::as_bytes)
            .unwrap_or(&[]);

        if pieces_concat.len() % 32 != 0 {
            return Err(CatalogError("pieces length is not a multiple of 32".into()));
        }

        let pieces = pieces_concat
            .chunks_exact(32)
            .map(|chunk| {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(chunk);
                arr
            })
            .collect();

        Ok(Self {
            length,
            piece_length,
            pieces,
        })
    }

    /// Extracts just the length, the minimum any catalog record must be
    /// decodable enough to recover.
    pub fn length_only(bytes: &[u8]) -> Result<u64, CatalogError> {
        Self::from_bytes(bytes).map(|info| info.length)
    }
}

pub fn hex_digest_to_bytes(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_length_and_pieces() {
        let pieces = vec![[1u8; 32], [2u8; 32]];
        let info = CatalogInfo::new(13, 10, pieces.clone());

        let bytes = info.to_bytes();
        let decoded = CatalogInfo::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.length, 13);
        assert_eq!(decoded.piece_length, 10);
        assert_eq!(decoded.pieces, pieces);
    }

    #[test]
    fn length_only_avoids_full_decode_errors_on_extra_fields() {
        let info = CatalogInfo::new(99, 64, vec![]);
        let bytes = info.to_bytes();
        assert_eq!(CatalogInfo::length_only(&bytes).unwrap(), 99);
    }
}
