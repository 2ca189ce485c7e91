//! Generic config-bound instance cache: given a list of configs,
//! reconciles a namespace's live instances against them (create,
//! reconfigure-in-place, rebuild, or dispose), preserving config-list
//! order and applying a global LRU cap across namespaces.

use blake2::{Blake2b512, Digest};
use orchestrator_core::cache::{CacheStats, InstanceFactory};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

const DEFAULT_NAMESPACE: &str = "__default__";

struct Entry<Instance> {
    instance: Instance,
    cfg_hash: String,
    last_used: f64,
}

/// Stable identity: `id` > `name` > `type + canonical(variables)`.
fn stable_key(cfg_json: &serde_json::Value) -> String {
    let obj = cfg_json.as_object();
    if let Some(id) = obj.and_then(|o| o.get("id")) {
        return format!("id:{id}");
    }
    if let Some(name) = obj.and_then(|o| o.get("name")) {
        return format!("name:{name}");
    }
    let ty = obj
        .and_then(|o| o.get("type").or_else(|| o.get("hook_name")))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown");
    let variables = obj.and_then(|o| o.get("variables")).cloned().unwrap_or_default();
    format!("{ty}|vars:{}", canonical_json(&variables))
}

/// Content hash over every field except `id`/`name`, so identity
/// renames don't force a rebuild.
fn config_hash(cfg_json: &serde_json::Value) -> String {
    let filtered = match cfg_json.as_object() {
        Some(obj) => {
            let mut filtered = serde_json::Map::new();
            for (k, v) in obj {
                if k != "id" && k != "name" {
                    filtered.insert(k.clone(), v.clone());
                }
            }
            serde_json::Value::Object(filtered)
        }
        None => cfg_json.clone(),
    };
    let mut hasher = Blake2b512::new();
    hasher.update(canonical_json(&filtered).as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Order-insensitive, stable JSON serialization used for hashing.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

pub struct ConfigBoundInstanceCache<Cfg, Instance, F>
where
    F: InstanceFactory<Cfg, Instance>,
    Instance: Clone,
{
    factory: F,
    capacity: Option<usize>,
    namespaces: Mutex<HashMap<String, HashMap<String, Entry<Instance>>>>,
    _cfg: std::marker::PhantomData<Cfg>,
}

impl<Cfg, Instance, F> ConfigBoundInstanceCache<Cfg, Instance, F>
where
    Cfg: Serialize,
    Instance: Clone,
    F: InstanceFactory<Cfg, Instance>,
{
    pub fn new(factory: F, capacity: Option<usize>) -> Self {
        Self {
            factory,
            capacity,
            namespaces: Mutex::new(HashMap::new()),
            _cfg: std::marker::PhantomData,
        }
    }

    /// Reconciles `namespace` (or the default namespace) against
    /// `cfg_list`, returning instances in the same order.
    pub fn sync_and_get(&self, cfg_list: &[Cfg], namespace: Option<&str>, now: f64) -> orchestrator_common::error::Result<Vec<Instance>> {
        let ns = namespace.unwrap_or(DEFAULT_NAMESPACE).to_string();
        let mut namespaces = self.namespaces.lock();
        let slot = namespaces.entry(ns).or_default();

        let desired: Vec<(String, String, &Cfg)> = cfg_list
            .iter()
            .map(|cfg| {
                let json = serde_json::to_value(cfg).unwrap_or(serde_json::Value::Null);
                (stable_key(&json), config_hash(&json), cfg)
            })
            .collect();
        let desired_keys: std::collections::HashSet<&str> = desired.iter().map(|(k, _, _)| k.as_str()).collect();

        let obsolete: Vec<String> = slot.keys().filter(|k| !desired_keys.contains(k.as_str())).cloned().collect();
        for key in obsolete {
            if let Some(entry) = slot.remove(&key) {
                self.factory.dispose(entry.instance);
            }
        }

        let mut ordered = Vec::with_capacity(desired.len());
        for (key, hash, cfg) in desired {
            let needs_rebuild = match slot.get_mut(&key) {
                None => true,
                Some(entry) if entry.cfg_hash == hash => {
                    entry.last_used = now;
                    ordered.push(entry.instance.clone());
                    false
                }
                Some(entry) => {
                    let reconfigured = self.factory.reconfigure(&mut entry.instance, cfg).unwrap_or(false);
                    if reconfigured {
                        entry.cfg_hash = hash.clone();
                        entry.last_used = now;
                        ordered.push(entry.instance.clone());
                        false
                    } else {
                        true
                    }
                }
            };

            if needs_rebuild {
                if let Some(old) = slot.remove(&key) {
                    self.factory.dispose(old.instance);
                }
                let instance = self.factory.create(cfg)?;
                ordered.push(instance.clone());
                slot.insert(key, Entry { instance, cfg_hash: hash, last_used: now });
            }
        }

        if let Some(capacity) = self.capacity {
            evict_lru(&mut namespaces, capacity, &self.factory);
        }

        Ok(ordered)
    }

    pub fn get_existing(&self, stable_key: &str, namespace: Option<&str>, now: f64) -> Option<Instance> {
        let ns = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let mut namespaces = self.namespaces.lock();
        let entry = namespaces.get_mut(ns)?.get_mut(stable_key)?;
        entry.last_used = now;
        Some(entry.instance.clone())
    }

    pub fn remove(&self, stable_key: &str, namespace: Option<&str>) {
        let ns = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let mut namespaces = self.namespaces.lock();
        if let Some(slot) = namespaces.get_mut(ns) {
            if let Some(entry) = slot.remove(stable_key) {
                self.factory.dispose(entry.instance);
            }
        }
    }

    pub fn clear_namespace(&self, namespace: Option<&str>) {
        let ns = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let mut namespaces = self.namespaces.lock();
        if let Some(slot) = namespaces.remove(ns) {
            for entry in slot.into_values() {
                self.factory.dispose(entry.instance);
            }
        }
    }

    /// Disposes every entry idle for at least `idle_seconds` as of
    /// `now`; returns how many were removed.
    pub fn prune_idle(&self, idle_seconds: f64, now: f64) -> usize {
        let cutoff = now - idle_seconds;
        let mut removed = 0;
        let mut namespaces = self.namespaces.lock();
        namespaces.retain(|_, slot| {
            let stale: Vec<String> = slot
                .iter()
                .filter(|(_, e)| e.last_used < cutoff)
                .map(|(k, _)| k.clone())
                .collect();
            for key in stale {
                if let Some(entry) = slot.remove(&key) {
                    self.factory.dispose(entry.instance);
                    removed += 1;
                }
            }
            !slot.is_empty()
        });
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let namespaces = self.namespaces.lock();
        CacheStats {
            len: namespaces.values().map(HashMap::len).sum(),
            capacity: self.capacity.unwrap_or(usize::MAX),
        }
    }
}

fn evict_lru<Cfg, Instance, F>(
    namespaces: &mut HashMap<String, HashMap<String, Entry<Instance>>>,
    capacity: usize,
    factory: &F,
) where
    Instance: Clone,
    F: InstanceFactory<Cfg, Instance>,
{
    let total: usize = namespaces.values().map(HashMap::len).sum();
    if total <= capacity {
        return;
    }

    let mut all: Vec<(String, String, f64)> = namespaces
        .iter()
        .flat_map(|(ns, slot)| slot.iter().map(move |(k, e)| (ns.clone(), k.clone(), e.last_used)))
        .collect();
    all.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    for (ns, key, _) in all.into_iter().take(total - capacity) {
        if let Some(slot) = namespaces.get_mut(&ns) {
            if let Some(entry) = slot.remove(&key) {
                factory.dispose(entry.instance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_common::error::Result;
    use serde::Serialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Serialize, Clone)]
    struct TestCfg {
        id: String,
        value: u32,
    }

    struct CountingFactory {
        builds: Arc<AtomicUsize>,
        disposes: Arc<AtomicUsize>,
    }

    impl InstanceFactory<TestCfg, u32> for CountingFactory {
        fn create(&self, cfg: &TestCfg) -> Result<u32> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(cfg.value)
        }

        fn reconfigure(&self, instance: &mut u32, cfg: &TestCfg) -> Result<bool> {
            *instance = cfg.value;
            Ok(true)
        }

        fn dispose(&self, _instance: u32) {
            self.disposes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cache(capacity: Option<usize>) -> (ConfigBoundInstanceCache<TestCfg, u32, CountingFactory>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let disposes = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory { builds: builds.clone(), disposes: disposes.clone() };
        (ConfigBoundInstanceCache::new(factory, capacity), builds, disposes)
    }

    #[test]
    fn creates_missing_and_preserves_order() {
        let (cache, builds, _) = cache(None);
        let cfgs = vec![
            TestCfg { id: "a".to_string(), value: 1 },
            TestCfg { id: "b".to_string(), value: 2 },
        ];
        let instances = cache.sync_and_get(&cfgs, None, 0.0).unwrap();
        assert_eq!(instances, vec![1, 2]);
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unchanged_config_reconfigures_instead_of_rebuilding() {
        let (cache, builds, disposes) = cache(None);
        let cfgs = vec![TestCfg { id: "a".to_string(), value: 1 }];
        cache.sync_and_get(&cfgs, None, 0.0).unwrap();

        let changed = vec![TestCfg { id: "a".to_string(), value: 9 }];
        let instances = cache.sync_and_get(&changed, None, 1.0).unwrap();

        assert_eq!(instances, vec![9]);
        assert_eq!(builds.load(Ordering::SeqCst), 1, "reconfigure should avoid a rebuild");
        assert_eq!(disposes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_config_disposes_its_instance() {
        let (cache, _, disposes) = cache(None);
        let cfgs = vec![TestCfg { id: "a".to_string(), value: 1 }];
        cache.sync_and_get(&cfgs, None, 0.0).unwrap();

        cache.sync_and_get(&[], None, 1.0).unwrap();
        assert_eq!(disposes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let (cache, _, disposes) = cache(Some(1));
        let cfgs = vec![
            TestCfg { id: "a".to_string(), value: 1 },
            TestCfg { id: "b".to_string(), value: 2 },
        ];
        cache.sync_and_get(&cfgs, None, 0.0).unwrap();
        assert_eq!(cache.stats().len, 1);
        assert_eq!(disposes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prune_idle_removes_stale_entries() {
        let (cache, _, disposes) = cache(None);
        let cfgs = vec![TestCfg { id: "a".to_string(), value: 1 }];
        cache.sync_and_get(&cfgs, None, 0.0).unwrap();

        let removed = cache.prune_idle(10.0, 5.0);
        assert_eq!(removed, 0);

        let removed = cache.prune_idle(10.0, 20.0);
        assert_eq!(removed, 1);
        assert_eq!(disposes.load(Ordering::SeqCst), 1);
    }
}
