// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Stable unit partitioning
//!
//! Cooperating workers split one global unit list by hashing each `unit_id`
//! into one of `total` buckets. The hash is the first eight bytes of the MD5
//! digest of the identifier, so the assignment is identical across processes,
//! machines and releases; no random seeds or insertion order are involved.

use md5::{Digest, Md5};

use crate::config::ConfigError;

/// Stable 64-bit hash of a unit identifier.
pub fn stable_hash(unit_id: &str) -> u64 {
    let digest = Md5::digest(unit_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Bucket of `unit_id` among `total` partitions. `total` must be non-zero.
pub fn bucket(unit_id: &str, total: u32) -> u32 {
    (stable_hash(unit_id) % u64::from(total.max(1))) as u32
}

/// Whether `unit_id` belongs to partition `index` of `total`.
pub fn belongs(unit_id: &str, index: u32, total: u32) -> bool {
    bucket(unit_id, total) == index
}

/// A validated `(index, total)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionSpec {
    index: u32,
    total: u32,
}

impl PartitionSpec {
    pub fn new(index: u32, total: u32) -> Result<Self, ConfigError> {
        let spec = Self { index, total };
        spec.validate()?;
        Ok(spec)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.total == 0 {
            return Err(ConfigError::ZeroPartitions);
        }
        if self.index >= self.total {
            return Err(ConfigError::PartitionOutOfRange {
                index: self.index,
                total: self.total,
            });
        }
        Ok(())
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn contains(&self, unit_id: &str) -> bool {
        belongs(unit_id, self.index, self.total)
    }
}

impl std::fmt::Display for PartitionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.index, self.total)
    }
}
