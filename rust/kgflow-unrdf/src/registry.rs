//! Hook registry: phase-indexed storage, receipts, persistence.
//!
//! Registration runs the poka-yoke gates; any Shutdown, Control or
//! Validation violation refuses the hook and leaves the registry
//! unchanged, while Warnings are logged and the hook is accepted.

use crate::error::{UnrdfError, UnrdfResult};
use crate::model::{HookPhase, HookReceipt, KnowledgeHook};
use crate::poka_yoke;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

#[derive(Default)]
struct RegistryInner {
    hooks: HashMap<String, KnowledgeHook>,
    insertion_order: Vec<String>,
    receipts: Vec<HookReceipt>,
}

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStatistics {
    pub total_hooks: usize,
    pub enabled_hooks: usize,
    pub disabled_hooks: usize,
    pub hooks_by_phase: BTreeMap<String, usize>,
}

/// In-memory hook registry guarded by a single lock
#[derive(Default)]
pub struct HookRegistry {
    inner: Mutex<RegistryInner>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook after running every safety gate. Returns the hook id.
    pub fn register(&self, hook: KnowledgeHook) -> UnrdfResult<String> {
        hook.condition.validate()?;

        let mut inner = self.inner.lock();
        let violations = poka_yoke::check_hook(&hook, &inner.hooks);
        if let Some(blocking) = violations.iter().find(|v| v.blocks_registration()) {
            return Err(UnrdfError::PokaYoke(blocking.clone()));
        }
        poka_yoke::log_warnings(&violations);

        let hook_id = hook.hook_id.clone();
        if !inner.hooks.contains_key(&hook_id) {
            inner.insertion_order.push(hook_id.clone());
        }
        inner.hooks.insert(hook_id.clone(), hook);
        debug!(hook_id = %hook_id, "hook registered");
        Ok(hook_id)
    }

    /// Register from a raw JSON definition; unknown phase or action strings
    /// are refused here before a typed hook exists.
    pub fn register_definition(&self, definition: Value) -> UnrdfResult<String> {
        if let Some(phase) = definition.get("phase").and_then(Value::as_str) {
            HookPhase::parse(phase)?;
        }
        if let Some(action) = definition.get("action").and_then(Value::as_str) {
            crate::model::HookAction::parse(action)?;
        }
        let hook: KnowledgeHook = serde_json::from_value(definition)?;
        self.register(hook)
    }

    pub fn unregister(&self, hook_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.hooks.remove(hook_id).is_some();
        if removed {
            inner.insertion_order.retain(|id| id != hook_id);
        }
        removed
    }

    pub fn get(&self, hook_id: &str) -> Option<KnowledgeHook> {
        self.inner.lock().hooks.get(hook_id).cloned()
    }

    pub fn get_all(&self) -> Vec<KnowledgeHook> {
        let inner = self.inner.lock();
        inner
            .insertion_order
            .iter()
            .filter_map(|id| inner.hooks.get(id).cloned())
            .collect()
    }

    /// Enabled hooks in `phase`, descending priority, insertion order as
    /// the tiebreak
    pub fn get_by_phase(&self, phase: HookPhase) -> Vec<KnowledgeHook> {
        let inner = self.inner.lock();
        let mut hooks: Vec<(usize, KnowledgeHook)> = inner
            .insertion_order
            .iter()
            .enumerate()
            .filter_map(|(idx, id)| inner.hooks.get(id).map(|h| (idx, h.clone())))
            .filter(|(_, h)| h.enabled && h.phase == phase)
            .collect();
        hooks.sort_by_key(|(idx, h)| (std::cmp::Reverse(h.priority), *idx));
        hooks.into_iter().map(|(_, h)| h).collect()
    }

    pub fn enable(&self, hook_id: &str) -> bool {
        self.set_enabled(hook_id, true)
    }

    pub fn disable(&self, hook_id: &str) -> bool {
        self.set_enabled(hook_id, false)
    }

    fn set_enabled(&self, hook_id: &str, enabled: bool) -> bool {
        let mut inner = self.inner.lock();
        match inner.hooks.get_mut(hook_id) {
            Some(hook) => {
                hook.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn add_receipt(&self, receipt: HookReceipt) {
        self.inner.lock().receipts.push(receipt);
    }

    /// Receipts, newest first, optionally filtered by hook id
    pub fn get_receipts(&self, hook_id: Option<&str>) -> Vec<HookReceipt> {
        let inner = self.inner.lock();
        let mut receipts: Vec<HookReceipt> = inner
            .receipts
            .iter()
            .filter(|r| hook_id.map(|id| r.hook_id == id).unwrap_or(true))
            .cloned()
            .collect();
        receipts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        receipts
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let inner = self.inner.lock();
        let mut hooks_by_phase: BTreeMap<String, usize> = BTreeMap::new();
        let mut enabled = 0;
        for hook in inner.hooks.values() {
            *hooks_by_phase
                .entry(hook.phase.as_str().to_string())
                .or_insert(0) += 1;
            if hook.enabled {
                enabled += 1;
            }
        }
        RegistryStatistics {
            total_hooks: inner.hooks.len(),
            enabled_hooks: enabled,
            disabled_hooks: inner.hooks.len() - enabled,
            hooks_by_phase,
        }
    }

    /// Turtle export of every registered hook
    pub fn export_all_rdf(&self) -> String {
        self.get_all()
            .iter()
            .map(KnowledgeHook::to_rdf)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sled-backed registry persistence: hooks survive process lifetime and
/// reload on startup.
pub struct PersistentHookRegistry {
    db: sled::Db,
}

impl PersistentHookRegistry {
    pub fn open<P: AsRef<Path>>(path: P) -> UnrdfResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn save_hook(&self, hook: &KnowledgeHook) -> UnrdfResult<()> {
        let key = format!("hook:{}", hook.hook_id);
        let value = serde_json::to_vec(hook)?;
        self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn delete_hook(&self, hook_id: &str) -> UnrdfResult<()> {
        let key = format!("hook:{hook_id}");
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    pub fn load_all(&self) -> UnrdfResult<Vec<KnowledgeHook>> {
        let mut hooks = Vec::new();
        for item in self.db.scan_prefix(b"hook:") {
            let (_, value) = item?;
            let hook: KnowledgeHook = serde_json::from_slice(&value)?;
            hooks.push(hook);
        }
        Ok(hooks)
    }

    /// Reload persisted hooks into a fresh in-memory registry. Hooks that
    /// no longer pass the safety gates are skipped and logged.
    pub fn reload(&self) -> UnrdfResult<HookRegistry> {
        let registry = HookRegistry::new();
        for hook in self.load_all()? {
            if let Err(e) = registry.register(hook.clone()) {
                tracing::warn!(hook_id = %hook.hook_id, error = %e, "skipping persisted hook");
            }
        }
        Ok(registry)
    }
}
