//! Ferry in-memory object store: a `ObjectStore` that keeps objects in RAM and
//! journals every successful mutation. Used by tests and offline dry runs.

#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ferry_core::{ObjectKey, ResourceType};
use ferry_kubehub::{ObjectStore, StoreError};
use kube::core::DynamicObject;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    List,
    Create,
    MergePatch,
    Replace,
    Delete,
}

/// One successful mutation, in the order it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub op: Op,
    pub key: ObjectKey,
    /// Patch body for `MergePatch`, otherwise `Null`.
    pub patch: Json,
}

#[derive(Debug, Clone)]
struct Fault {
    op: Op,
    kind: String,
    name: Option<String>,
    error: StoreError,
}

type Slot = (String, Option<String>, String);

#[derive(Default)]
struct Inner {
    objects: FxHashMap<Slot, DynamicObject>,
    journal: Vec<JournalEntry>,
    faults: Vec<Fault>,
    seq: u64,
}

impl Inner {
    fn check_fault(&self, op: Op, rt: &ResourceType, name: Option<&str>) -> Result<(), StoreError> {
        let hit = self.faults.iter().find(|f| {
            f.op == op && f.kind == rt.kind && (f.name.is_none() || f.name.as_deref() == name)
        });
        match hit {
            Some(f) => Err(f.error.clone()),
            None => Ok(()),
        }
    }

    fn record(&mut self, op: Op, key: ObjectKey, patch: Json) {
        self.seq += 1;
        self.journal.push(JournalEntry { seq: self.seq, at: Utc::now(), op, key, patch });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

fn slot(rt: &ResourceType, namespace: Option<&str>, name: &str) -> Slot {
    let ns = if rt.namespaced { namespace.map(|s| s.to_string()) } else { None };
    (rt.gvk_key(), ns, name.to_string())
}

/// RFC 7386: objects merge recursively, `null` removes, anything else replaces.
pub fn apply_merge_patch(target: &mut Json, patch: &Json) {
    match patch {
        Json::Object(pm) => {
            if !target.is_object() { *target = Json::Object(serde_json::Map::new()); }
            if let Json::Object(tm) = target {
                for (k, pv) in pm {
                    if pv.is_null() {
                        tm.remove(k);
                    } else {
                        apply_merge_patch(tm.entry(k.clone()).or_insert(Json::Null), pv);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

fn matches_selector(obj: &DynamicObject, selector: Option<&str>) -> bool {
    let Some(sel) = selector else { return true };
    let labels = obj.metadata.labels.clone().unwrap_or_default();
    sel.split(',').map(str::trim).filter(|t| !t.is_empty()).all(|term| match term.split_once('=') {
        Some((k, v)) => labels.get(k).map(|lv| lv == v).unwrap_or(false),
        None => labels.contains_key(term),
    })
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Every call sleeps this long before touching state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn delay(&self) {
        if let Some(d) = self.latency { tokio::time::sleep(d).await; }
    }

    /// Seed an object without journaling it.
    pub fn insert<T: Serialize>(&self, rt: &ResourceType, obj: T) -> Result<(), StoreError> {
        let obj: DynamicObject = serde_json::to_value(obj)
            .and_then(serde_json::from_value)
            .map_err(|e| StoreError::Other(e.to_string()))?;
        let name = obj.metadata.name.clone().ok_or_else(|| StoreError::Other("missing metadata.name".into()))?;
        let key = slot(rt, obj.metadata.namespace.as_deref(), &name);
        self.lock().objects.insert(key, obj);
        Ok(())
    }

    /// Make every matching call fail with `error`. `name = None` matches any object of the kind.
    pub fn fail_on(&self, op: Op, rt: &ResourceType, name: Option<&str>, error: StoreError) {
        self.lock().faults.push(Fault { op, kind: rt.kind.to_string(), name: name.map(|s| s.to_string()), error });
    }

    pub fn clear_faults(&self) { self.lock().faults.clear(); }

    pub fn journal(&self) -> Vec<JournalEntry> { self.lock().journal.clone() }

    pub fn contains(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> bool {
        self.lock().objects.contains_key(&slot(rt, namespace, name))
    }

    /// Raw JSON of a stored object, for assertions.
    pub fn snapshot(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> Option<Json> {
        self.lock().objects.get(&slot(rt, namespace, name)).and_then(|o| serde_json::to_value(o).ok())
    }

    pub fn len(&self) -> usize { self.lock().objects.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> Result<DynamicObject, StoreError> {
        self.delay().await;
        let inner = self.lock();
        inner.check_fault(Op::Get, rt, Some(name))?;
        inner.objects.get(&slot(rt, namespace, name)).cloned().ok_or(StoreError::NotFound)
    }

    async fn list(&self, rt: &ResourceType, namespace: Option<&str>, label_selector: Option<&str>) -> Result<Vec<DynamicObject>, StoreError> {
        self.delay().await;
        let inner = self.lock();
        inner.check_fault(Op::List, rt, None)?;
        let gvk = rt.gvk_key();
        let mut out: Vec<(Slot, DynamicObject)> = inner
            .objects
            .iter()
            .filter(|((g, ns, _), _)| *g == gvk && (namespace.is_none() || ns.as_deref() == namespace))
            .filter(|(_, o)| matches_selector(o, label_selector))
            .map(|(k, o)| (k.clone(), o.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out.into_iter().map(|(_, o)| o).collect())
    }

    async fn create(&self, rt: &ResourceType, obj: &DynamicObject) -> Result<(), StoreError> {
        self.delay().await;
        let name = obj.metadata.name.clone().ok_or_else(|| StoreError::Other("missing metadata.name".into()))?;
        let ns = obj.metadata.namespace.clone();
        let mut inner = self.lock();
        inner.check_fault(Op::Create, rt, Some(&name))?;
        let key = slot(rt, ns.as_deref(), &name);
        if inner.objects.contains_key(&key) { return Err(StoreError::AlreadyExists); }
        inner.objects.insert(key, obj.clone());
        inner.record(Op::Create, rt.key(ns.as_deref(), &name), Json::Null);
        debug!(kind = rt.kind, ns = ?ns, name = %name, "created");
        Ok(())
    }

    async fn merge_patch(&self, rt: &ResourceType, namespace: Option<&str>, name: &str, patch: &Json) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.check_fault(Op::MergePatch, rt, Some(name))?;
        let key = slot(rt, namespace, name);
        let current = inner.objects.get(&key).ok_or(StoreError::NotFound)?;
        let mut raw = serde_json::to_value(current).map_err(|e| StoreError::Other(e.to_string()))?;
        apply_merge_patch(&mut raw, patch);
        let next: DynamicObject = serde_json::from_value(raw).map_err(|e| StoreError::Other(e.to_string()))?;
        inner.objects.insert(key, next);
        inner.record(Op::MergePatch, rt.key(namespace, name), patch.clone());
        Ok(())
    }

    async fn replace(&self, rt: &ResourceType, obj: &DynamicObject) -> Result<(), StoreError> {
        self.delay().await;
        let name = obj.metadata.name.clone().ok_or_else(|| StoreError::Other("missing metadata.name".into()))?;
        let ns = obj.metadata.namespace.clone();
        let mut inner = self.lock();
        inner.check_fault(Op::Replace, rt, Some(&name))?;
        let key = slot(rt, ns.as_deref(), &name);
        if !inner.objects.contains_key(&key) { return Err(StoreError::NotFound); }
        inner.objects.insert(key, obj.clone());
        inner.record(Op::Replace, rt.key(ns.as_deref(), &name), Json::Null);
        Ok(())
    }

    async fn delete(&self, rt: &ResourceType, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.check_fault(Op::Delete, rt, Some(name))?;
        inner.objects.remove(&slot(rt, namespace, name)).ok_or(StoreError::NotFound)?;
        inner.record(Op::Delete, rt.key(namespace, name), Json::Null);
        Ok(())
    }
}
