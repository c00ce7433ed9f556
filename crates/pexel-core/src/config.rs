// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PexelError, Result};

/// Prefix shared by every environment variable the service reads.
pub const ENV_PREFIX: &str = "PEXEL_";

/// Runtime settings for the store, scheduler and HTTP shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Lifetime of an artifact when the caller does not ask for one.
    pub default_ttl_secs: u64,
    /// How often the expiry scheduler wakes up.
    pub sweep_interval_secs: u64,
    /// Largest single upload accepted.
    pub max_upload_bytes: u64,
    /// Total bytes the artifact store may hold at once.
    pub store_capacity_bytes: u64,
    /// Directory holding artifact bytes.  Created on startup, purged on
    /// startup and shutdown.
    pub storage_dir: PathBuf,
    /// Deletion attempts deferred by active readers before the scheduler
    /// gives up on an artifact.
    pub max_deferrals: u32,
    /// Base delay of the deferred-deletion backoff.
    pub deferral_base_ms: u64,
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            sweep_interval_secs: 5,
            max_upload_bytes: 50 * 1024 * 1024,
            store_capacity_bytes: 2 * 1024 * 1024 * 1024,
            storage_dir: PathBuf::from("./outputs"),
            max_deferrals: 5,
            deferral_base_ms: 500,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServiceConfig {
    /// Build from `PEXEL_*` environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.  Keys are the full variable names,
    /// e.g. `PEXEL_PORT`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            default_ttl_secs: read(&lookup, "DEFAULT_TTL_SECS", defaults.default_ttl_secs)?,
            sweep_interval_secs: read(
                &lookup,
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            max_upload_bytes: read(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            store_capacity_bytes: read(
                &lookup,
                "STORE_CAPACITY_BYTES",
                defaults.store_capacity_bytes,
            )?,
            storage_dir: lookup(&format!("{ENV_PREFIX}STORAGE_DIR"))
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            max_deferrals: read(&lookup, "MAX_DEFERRALS", defaults.max_deferrals)?,
            deferral_base_ms: read(&lookup, "DEFERRAL_BASE_MS", defaults.deferral_base_ms)?,
            host: lookup(&format!("{ENV_PREFIX}HOST")).unwrap_or(defaults.host),
            port: read(&lookup, "PORT", defaults.port)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler or store cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_secs == 0 {
            return Err(PexelError::invalid(
                "default_ttl_secs",
                "must be at least 1 second",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(PexelError::invalid(
                "sweep_interval_secs",
                "must be at least 1 second",
            ));
        }
        if self.max_upload_bytes > self.store_capacity_bytes {
            return Err(PexelError::invalid(
                "max_upload_bytes",
                "cannot exceed store_capacity_bytes",
            ));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn deferral_base(&self) -> Duration {
        Duration::from_millis(self.deferral_base_ms)
    }

    /// Upper bound on how long an expired artifact can outlive its TTL once
    /// its last reader is gone: one sweep interval per deletion attempt plus
    /// every backoff delay (each at most `base * 2^n + base` with jitter).
    pub fn deletion_grace(&self) -> Duration {
        let base = self.deferral_base();
        let mut grace = self
            .sweep_interval()
            .saturating_mul(self.max_deferrals.saturating_add(1));
        let mut step = base;
        for _ in 0..self.max_deferrals {
            grace = grace.saturating_add(step).saturating_add(base);
            step = step.saturating_mul(2);
        }
        grace
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn read<T, F>(lookup: &F, suffix: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    match lookup(&key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PexelError::invalid(key, format!("cannot parse {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("PEXEL_DEFAULT_TTL_SECS", "60"),
            ("PEXEL_PORT", " 9000 "),
            ("PEXEL_STORAGE_DIR", "/tmp/pexel"),
        ]))
        .unwrap();
        assert_eq!(config.default_ttl_secs, 60);
        assert_eq!(config.port, 9000);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/pexel"));
    }

    #[test]
    fn garbage_value_is_rejected() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("PEXEL_PORT", "eighty")])).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETER");
        assert!(err.to_string().contains("PEXEL_PORT"));
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let result = ServiceConfig::from_lookup(lookup_from(&[("PEXEL_SWEEP_INTERVAL_SECS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn deletion_grace_sums_backoff_schedule() {
        let config = ServiceConfig {
            sweep_interval_secs: 5,
            deferral_base_ms: 500,
            max_deferrals: 3,
            ..ServiceConfig::default()
        };
        // 4 sweeps of 5s, then (0.5 + 0.5) + (1 + 0.5) + (2 + 0.5)
        assert_eq!(config.deletion_grace(), Duration::from_millis(25_000));
    }
}
