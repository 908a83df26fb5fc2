use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use xxhash_rust::xxh3::Xxh3;

use crate::error::DomainError;

/// Terminates every label name and value, so `{ab="c"}` and `{a="bc"}` differ.
const SEPARATOR: u8 = 0xff;

/// Fixed-width identity of a label set. Used as a map key, never as a secret.
///
/// Label fingerprints are xxh3 over the sorted name/value bytes and do not
/// change between builds, so they may be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        let mut hasher = Xxh3::new();
        for (k, v) in labels {
            hasher.update(k.as_bytes());
            hasher.update(&[SEPARATOR]);
            hasher.update(v.as_bytes());
            hasher.update(&[SEPARATOR]);
        }
        Self(hasher.digest())
    }

    /// Fingerprint of any hashable value. Only as stable as `T`'s `Hash` impl.
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = Xxh3::new();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Mixes two fingerprints into one. Order matters: `a.combine(b) != b.combine(a)`.
    pub fn combine(self, other: Fingerprint) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(&self.0.to_le_bytes());
        hasher.update(&other.0.to_le_bytes());
        Self(hasher.digest())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| DomainError::InvalidFingerprint(s.to_string()))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
