//! Config-bound instance cache contract.
//!
//! The cache itself (identity-key derivation, content-hash
//! reconciliation, LRU eviction) is generic and lives in
//! `orchestrator-cache`; this crate only defines the factory seam a
//! concrete resource type plugs into.

use orchestrator_common::error::Result;

/// Knows how to build, reconfigure in place, and tear down one kind of
/// long-lived instance (e.g. a running inference-service handle) from
/// its configuration.
pub trait InstanceFactory<Cfg, Instance>: Send + Sync {
    fn create(&self, cfg: &Cfg) -> Result<Instance>;

    /// Attempt to update `instance` in place to match `cfg`. Returns
    /// `Ok(true)` on success, `Ok(false)` if the instance must instead
    /// be disposed and rebuilt.
    fn reconfigure(&self, instance: &mut Instance, cfg: &Cfg) -> Result<bool>;

    /// Release `instance`. Errors are swallowed by the cache: log and
    /// move on rather than failing the caller.
    fn dispose(&self, instance: Instance);
}

/// Snapshot of cache occupancy, exposed for metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub len: usize,
    pub capacity: usize,
}
