//! Probabilistic set-membership filter
//!
//! Classic Bloom filter with double hashing derived from one SHA-256
//! digest, so persisted snapshots hash identically on every platform and
//! toolchain. Contract: `contains(x) == false` means definitely absent;
//! `true` means possibly present.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How confident a membership answer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloomConfidence {
    DefinitelyNot,
    Maybe,
}

#[derive(Debug)]
pub struct BloomFilter {
    bits: Vec<u8>,
    m_bits: u64,
    k_hashes: u32,
    inserted: u64,
}

impl BloomFilter {
    /// Size the filter for `expected_elements` at `error_rate` target
    /// false-positive probability.
    pub fn with_capacity(expected_elements: u64, error_rate: f64) -> Self {
        let n = expected_elements.max(1) as f64;
        let p = error_rate.clamp(1e-9, 0.5);

        let ln2 = std::f64::consts::LN_2;
        let m_bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(8.0) as u64;
        let k_hashes = (((m_bits as f64 / n) * ln2).round() as u32).max(1);

        Self {
            bits: vec![0u8; m_bits.div_ceil(8) as usize],
            m_bits,
            k_hashes,
            inserted: 0,
        }
    }

    /// Rebuild from a snapshot produced by [`Self::snapshot_bits`].
    pub fn from_snapshot(
        encoded_bits: &str,
        m_bits: u64,
        k_hashes: u32,
        inserted: u64,
    ) -> Option<Self> {
        let bits = BASE64.decode(encoded_bits).ok()?;
        if (bits.len() as u64) != m_bits.div_ceil(8) {
            return None;
        }
        Some(Self {
            bits,
            m_bits,
            k_hashes,
            inserted,
        })
    }

    /// Two independent 64-bit hashes from one digest; bit positions come
    /// from the standard `h1 + i*h2` double-hashing scheme.
    fn hash_pair(item: &str) -> (u64, u64) {
        let digest = Sha256::digest(item.as_bytes());
        let h1 = u64::from_be_bytes(digest[0..8].try_into().expect("digest slice"));
        let h2 = u64::from_be_bytes(digest[8..16].try_into().expect("digest slice"));
        (h1, h2 | 1)
    }

    fn set_bit(&mut self, index: u64) {
        self.bits[(index / 8) as usize] |= 1 << (index % 8);
    }

    fn get_bit(&self, index: u64) -> bool {
        self.bits[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    pub fn add(&mut self, item: &str) {
        let (h1, h2) = Self::hash_pair(item);
        for i in 0..u64::from(self.k_hashes) {
            self.set_bit(h1.wrapping_add(i.wrapping_mul(h2)) % self.m_bits);
        }
        self.inserted += 1;
    }

    pub fn add_bulk<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) {
        for item in items {
            self.add(item);
        }
    }

    pub fn contains(&self, item: &str) -> bool {
        let (h1, h2) = Self::hash_pair(item);
        (0..u64::from(self.k_hashes))
            .all(|i| self.get_bit(h1.wrapping_add(i.wrapping_mul(h2)) % self.m_bits))
    }

    pub fn check(&self, item: &str) -> BloomConfidence {
        if self.contains(item) {
            BloomConfidence::Maybe
        } else {
            BloomConfidence::DefinitelyNot
        }
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn m_bits(&self) -> u64 {
        self.m_bits
    }

    pub fn k_hashes(&self) -> u32 {
        self.k_hashes
    }

    /// Base64 of the raw bit array, the opaque snapshot payload.
    pub fn snapshot_bits(&self) -> String {
        BASE64.encode(&self.bits)
    }
}
