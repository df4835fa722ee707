// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Result Cache - Fingerprint-Keyed Generation Results
//
// Maps a request fingerprint to a previously computed result. At most one
// entry per fingerprint; insertion overwrites. Entries are evicted lazily on
// TTL expiry or by explicit invalidation. Reads and writes are fine-grained
// per fingerprint (dashmap shards), so a miss on one fingerprint never
// blocks another.

use crate::domain::config::CacheConfig;
use crate::domain::llm::GenerationOptions;
use crate::domain::routing::{Fingerprint, RoutedResult};
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: RoutedResult,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

pub struct ResultCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// TTL class for a result produced under `options`: deterministic
    /// low-temperature generations keep the long TTL, everything else the
    /// short one.
    pub fn ttl_for(&self, options: &GenerationOptions) -> Duration {
        let deterministic = options
            .temperature
            .map(|t| t <= self.config.deterministic_temperature)
            .unwrap_or(false);
        if deterministic {
            Duration::from_secs(self.config.default_ttl_secs)
        } else {
            Duration::from_secs(self.config.volatile_ttl_secs)
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<RoutedResult> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(fingerprint) {
            if !entry.is_expired(now) {
                return Some(entry.result.clone());
            }
        }
        // Expired: drop the stale entry outside the read guard.
        self.entries
            .remove_if(fingerprint, |_, entry| entry.is_expired(now));
        None
    }

    pub fn insert(&self, fingerprint: Fingerprint, result: RoutedResult, ttl: Duration) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                result,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Sweep every expired entry; returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
