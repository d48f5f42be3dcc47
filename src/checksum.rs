//! Entry digest computation.
//!
//! Digests are rendered as `<algo>:<hex>` strings so the algorithm travels
//! with the value. TAR-family archives embed them as PAX records on create;
//! ZIP entries always carry the container's own CRC-32.

use std::io::{self, Read};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest algorithms the engine can embed and verify.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Blake3,
}

impl Default for ChecksumAlgorithm {
    fn default() -> Self {
        ChecksumAlgorithm::Sha256
    }
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Blake3 => "blake3",
        }
    }

    /// PAX extended-header key used to embed this digest in tar archives.
    pub fn pax_key(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "FULPACK.sha256",
            ChecksumAlgorithm::Blake3 => "FULPACK.blake3",
        }
    }
}

/// Hash a byte slice, returning the `<algo>:<hex>` form.
pub fn hash(bytes: &[u8], algorithm: ChecksumAlgorithm) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(bytes);
    hasher.finish()
}

/// Hash everything a reader yields without buffering it whole.
pub fn hash_reader<R: Read>(reader: &mut R, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let mut hasher = Hasher::new(algorithm);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish())
}

/// Incremental digest state, fed chunk-by-chunk during streaming extraction.
pub enum Hasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
    Crc32(crc32fast::Hasher),
}

impl Hasher {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// CRC-32 state matching the digest zip stores for every entry.
    pub fn crc32() -> Self {
        Hasher::Crc32(crc32fast::Hasher::new())
    }

    /// Pick the hasher that can reproduce an embedded `<algo>:<hex>` digest.
    pub fn for_digest(digest: &str) -> Option<Self> {
        match digest.split(':').next() {
            Some("sha256") => Some(Hasher::new(ChecksumAlgorithm::Sha256)),
            Some("blake3") => Some(Hasher::new(ChecksumAlgorithm::Blake3)),
            Some("crc32") => Some(Hasher::crc32()),
            _ => None,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(bytes),
            Hasher::Blake3(h) => {
                h.update(bytes);
            }
            Hasher::Crc32(h) => h.update(bytes),
        }
    }

    pub fn finish(self) -> String {
        match self {
            Hasher::Sha256(h) => {
                let digest = h.finalize();
                format!("sha256:{}", hex_encode(digest.as_slice()))
            }
            Hasher::Blake3(h) => format!("blake3:{}", h.finalize().to_hex()),
            Hasher::Crc32(h) => format!("crc32:{:08x}", h.finalize()),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
