//! # navigator-registry: the sharded instance registry
//!
//! Owns every live [`Instance`], keyed by [`InstanceId`], write-through to
//! the durable [`navigator_storage::HybridStore`]. Write
//! concurrency is serialized per tenant-shard (`fnv1a(tenant_id) mod N`);
//! reads and the hot cache are free to run concurrently
//! across shards. Subscriber notification and `broadcast` fan-out reuse
//! [`navigator_kernel::handle_external`] as their delivery mechanism,
//! bounded by a worker-pool semaphore and a per-call deadline.

mod error;
mod shard;

pub use error::RegistryError;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use navigator_kernel::{ExternalSource, Instance, Kind, KindRegistry, NavigatorEffect};
use navigator_storage::{BlobStore, CacheKey, EventLog, HybridStore, PutOptions};
use navigator_telemetry::{TelemetryBus, TelemetryEvent};
use navigator_types::{
    BroadcastTarget, Effect, EventName, FsmData, InstanceId, KindName, LifecycleKind,
    LifecycleRecord, StateName, TenantId,
};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::spawn_blocking;

use shard::ShardLocks;

const DEFAULT_ESTIMATED_INSTANCE_BYTES: usize = 512;

#[derive(Debug, Clone)]
struct InstanceMeta {
    tenant_id: TenantId,
    kind: KindName,
}

/// A `{instance_id, kind, state, version}` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSummary {
    pub instance_id: InstanceId,
    pub kind: String,
    pub state: String,
    pub version: u64,
}

/// One `{instance_id, event, event_data}` request for [`InstanceRegistry::batch_send_events`].
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub instance_id: InstanceId,
    pub event: EventName,
    pub event_data: FsmData,
}

/// `stats()` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub instance_count_per_shard: Vec<usize>,
    pub total: usize,
    pub broadcasts_delivered: u64,
}

/// The outcome of a successful `send_event`/`create`-style transition: the
/// new instance plus the entry effect of the state just entered, if any.
/// The caller (the root `navigator` Manager) is responsible for executing
/// it through `navigator-effects` — this crate never depends on the
/// effects engine.
pub type TransitionOutcome = (Instance, Option<Effect>);

/// The sharded instance registry.
pub struct InstanceRegistry {
    blobs: BlobStore,
    store: Arc<HybridStore<Instance>>,
    events: Arc<EventLog>,
    kinds: Arc<KindRegistry>,
    telemetry: Arc<TelemetryBus>,
    shard_locks: ShardLocks,
    tenant_index: RwLock<HashMap<TenantId, HashSet<InstanceId>>>,
    instance_meta: RwLock<HashMap<InstanceId, InstanceMeta>>,
    worker_pool: Semaphore,
    subscriber_deadline: Duration,
    broadcasts_delivered: AtomicU64,
}

impl InstanceRegistry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data_root: impl Into<PathBuf>,
        shard_count: usize,
        cache_capacity_per_shard: usize,
        memory_threshold_bytes: usize,
        kinds: Arc<KindRegistry>,
        telemetry: Arc<TelemetryBus>,
        worker_pool_capacity: usize,
        subscriber_deadline_ms: u64,
    ) -> Self {
        let root = data_root.into();
        Self {
            blobs: BlobStore::new(root.clone()),
            store: Arc::new(HybridStore::new(
                root.clone(),
                shard_count,
                cache_capacity_per_shard,
                memory_threshold_bytes,
            )),
            events: Arc::new(EventLog::new(root)),
            kinds,
            telemetry,
            shard_locks: ShardLocks::new(shard_count),
            tenant_index: RwLock::new(HashMap::new()),
            instance_meta: RwLock::new(HashMap::new()),
            worker_pool: Semaphore::new(worker_pool_capacity.max(1)),
            subscriber_deadline: Duration::from_millis(subscriber_deadline_ms),
            broadcasts_delivered: AtomicU64::new(0),
        }
    }

    fn snapshot_key(instance_id: InstanceId) -> CacheKey {
        CacheKey::new("workflows", instance_id.to_string())
    }

    fn snapshot_path(&self, tenant_id: &TenantId, kind: &KindName, instance_id: InstanceId) -> PathBuf {
        self.blobs
            .workflow_snapshot_path(tenant_id.as_str(), kind.as_str(), &instance_id.to_string())
    }

    fn resolve_kind(&self, name: &KindName) -> Result<Arc<Kind>, RegistryError> {
        self.kinds
            .get(name)
            .ok_or_else(|| RegistryError::KindUnknown(name.as_str().to_string()))
    }

    async fn lookup_meta(&self, instance_id: InstanceId) -> Result<InstanceMeta, RegistryError> {
        self.instance_meta
            .read()
            .await
            .get(&instance_id)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    async fn load_instance(
        &self,
        tenant_id: &TenantId,
        kind: &KindName,
        instance_id: InstanceId,
    ) -> Result<Option<Instance>, RegistryError> {
        let path = self.snapshot_path(tenant_id, kind, instance_id);
        let key = Self::snapshot_key(instance_id);
        let store = self.store.clone();
        let now = Utc::now();
        spawn_blocking(move || store.get(&path, key, now, DEFAULT_ESTIMATED_INSTANCE_BYTES))
            .await
            .expect("blob read task panicked")
            .map_err(RegistryError::from)
    }

    async fn persist_instance(&self, instance: &Instance, persist_immediately: bool) -> Result<(), RegistryError> {
        let path = self.snapshot_path(&instance.tenant_id, &instance.kind_ref, instance.id);
        let key = Self::snapshot_key(instance.id);
        let estimated_bytes = serde_json::to_vec(instance)
            .map(|bytes| bytes.len())
            .unwrap_or(DEFAULT_ESTIMATED_INSTANCE_BYTES);
        let store = self.store.clone();
        let instance = instance.clone();
        let now = Utc::now();
        spawn_blocking(move || {
            store.put(
                &path,
                key,
                instance,
                PutOptions {
                    persist_immediately,
                    ..PutOptions::default()
                },
                now,
                estimated_bytes,
            )
        })
        .await
        .expect("blob write task panicked")
        .map_err(RegistryError::from)
    }

    async fn delete_instance(&self, instance: &Instance) -> Result<(), RegistryError> {
        let path = self.snapshot_path(&instance.tenant_id, &instance.kind_ref, instance.id);
        let key = Self::snapshot_key(instance.id);
        let store = self.store.clone();
        spawn_blocking(move || store.delete(&path, &key))
            .await
            .expect("blob delete task panicked")
            .map_err(RegistryError::from)?;
        let events = self.events.clone();
        let tenant_id = instance.tenant_id.as_str().to_string();
        let kind = instance.kind_ref.as_str().to_string();
        let instance_id = instance.id.to_string();
        spawn_blocking(move || events.remove(&tenant_id, &kind, &instance_id))
            .await
            .expect("event log remove task panicked")
            .map_err(RegistryError::from)
    }

    async fn append_lifecycle(
        &self,
        kind_tag: LifecycleKind,
        tenant_id: &TenantId,
        kind: &KindName,
        instance_id: InstanceId,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), RegistryError> {
        let record = LifecycleRecord {
            ts: Utc::now(),
            kind: kind_tag,
            instance_id,
            tenant_id: tenant_id.clone(),
            payload,
        };
        let bytes = serde_json::to_vec(&record).map(|b| b.len()).unwrap_or(0);
        let events = self.events.clone();
        let tenant_str = tenant_id.as_str().to_string();
        let kind_str = kind.as_str().to_string();
        let instance_str = instance_id.to_string();
        let record_for_write = record.clone();
        spawn_blocking(move || events.append(&tenant_str, &kind_str, &instance_str, &record_for_write, false))
            .await
            .expect("event log append task panicked")
            .map_err(RegistryError::from)?;

        self.telemetry.emit(TelemetryEvent::EventStoreAppend {
            ts: record.ts,
            bytes,
            record_type: record_type_name(kind_tag).to_string(),
            instance_id,
            tenant_id: tenant_id.clone(),
        });
        Ok(())
    }

    /// Creates a fresh instance of `kind`.
    pub async fn create(&self, kind: KindName, data: FsmData, tenant_id: TenantId) -> Result<InstanceId, RegistryError> {
        let kind_handle = self.resolve_kind(&kind)?;
        let instance = Instance::new(
            InstanceId::generate(),
            tenant_id.clone(),
            kind.clone(),
            kind_handle.initial_state().clone(),
            data,
        );
        let shard_idx = self.shard_locks.index_for(&tenant_id);
        let _guard = self.shard_locks.lock(shard_idx).await;

        self.persist_instance(&instance, true).await?;
        self.append_lifecycle(
            LifecycleKind::Created,
            &tenant_id,
            &kind,
            instance.id,
            serde_json::Map::new(),
        )
        .await?;
        self.instance_meta.write().await.insert(
            instance.id,
            InstanceMeta {
                tenant_id: tenant_id.clone(),
                kind,
            },
        );
        self.tenant_index
            .write()
            .await
            .entry(tenant_id)
            .or_default()
            .insert(instance.id);

        Ok(instance.id)
    }

    /// Looks up an instance by id.
    pub async fn get(&self, instance_id: InstanceId) -> Result<(KindName, Instance), RegistryError> {
        let meta = self.lookup_meta(instance_id).await?;
        let instance = self
            .load_instance(&meta.tenant_id, &meta.kind, instance_id)
            .await?
            .ok_or(RegistryError::NotFound)?;
        Ok((meta.kind, instance))
    }

    /// Replaces the stored instance, write-through.
    pub async fn update(&self, instance: Instance) -> Result<(), RegistryError> {
        let shard_idx = self.shard_locks.index_for(&instance.tenant_id);
        let _guard = self.shard_locks.lock(shard_idx).await;
        self.persist_instance(&instance, true).await
    }

    /// Appends an `effect_started`/`effect_completed`/`effect_failed` record
    /// to an instance's event log. Called by the effect-dispatching
    /// embedder, which owns the execution itself.
    pub async fn record_effect_lifecycle(
        &self,
        kind_tag: LifecycleKind,
        instance_id: InstanceId,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), RegistryError> {
        let meta = self.lookup_meta(instance_id).await?;
        self.append_lifecycle(kind_tag, &meta.tenant_id, &meta.kind, instance_id, payload).await
    }

    /// Summaries of every instance belonging to `tenant_id`.
    pub async fn list_by_tenant(&self, tenant_id: &TenantId) -> Vec<InstanceSummary> {
        let ids: Vec<InstanceId> = self
            .tenant_index
            .read()
            .await
            .get(tenant_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok((kind, instance)) = self.get(id).await {
                summaries.push(InstanceSummary {
                    instance_id: id,
                    kind: kind.as_str().to_string(),
                    state: instance.current_state.as_str().to_string(),
                    version: instance.metadata.version,
                });
            }
        }
        summaries
    }

    /// Deletes the snapshot and appends a `destroyed` record. Cancelling
    /// any running effect tree is the caller's responsibility, since it
    /// owns the cancellation tokens.
    pub async fn destroy(&self, instance_id: InstanceId) -> Result<(), RegistryError> {
        let meta = self.lookup_meta(instance_id).await?;
        let shard_idx = self.shard_locks.index_for(&meta.tenant_id);
        let _guard = self.shard_locks.lock(shard_idx).await;

        let instance = self
            .load_instance(&meta.tenant_id, &meta.kind, instance_id)
            .await?
            .ok_or(RegistryError::NotFound)?;

        self.delete_instance(&instance).await?;
        self.append_lifecycle(
            LifecycleKind::Destroyed,
            &meta.tenant_id,
            &meta.kind,
            instance_id,
            serde_json::Map::new(),
        )
        .await?;
        self.instance_meta.write().await.remove(&instance_id);
        if let Some(set) = self.tenant_index.write().await.get_mut(&meta.tenant_id) {
            set.remove(&instance_id);
        }
        Ok(())
    }

    /// Applies `(event, event_data)` to the instance under its shard's
    /// write lock.
    pub async fn send_event(
        self: &Arc<Self>,
        instance_id: InstanceId,
        event: EventName,
        event_data: FsmData,
    ) -> Result<TransitionOutcome, RegistryError> {
        let meta = self.lookup_meta(instance_id).await?;
        let kind_handle = self.resolve_kind(&meta.kind)?;
        let shard_idx = self.shard_locks.index_for(&meta.tenant_id);
        let _guard = self.shard_locks.lock(shard_idx).await;

        let instance = self
            .load_instance(&meta.tenant_id, &meta.kind, instance_id)
            .await?
            .ok_or(RegistryError::NotFound)?;

        match navigator_kernel::send(&kind_handle, instance, event, event_data) {
            Ok((new_instance, effects)) => {
                self.persist_instance(&new_instance, true).await?;

                let mut entry_effect = None;
                for effect in effects {
                    match effect {
                        NavigatorEffect::AppendTransition(record) => {
                            let mut payload = serde_json::Map::new();
                            payload.insert("from".into(), serde_json::json!(record.from.as_str()));
                            payload.insert("to".into(), serde_json::json!(record.to.as_str()));
                            payload.insert("event".into(), serde_json::json!(record.event.as_str()));
                            payload.insert("event_data".into(), serde_json::Value::Object(record.event_data.clone()));
                            payload.insert("duration_us".into(), serde_json::json!(record.duration_us));
                            payload.insert("version".into(), serde_json::json!(new_instance.metadata.version));
                            self.append_lifecycle(
                                LifecycleKind::Transition,
                                &meta.tenant_id,
                                &meta.kind,
                                instance_id,
                                payload,
                            )
                            .await?;
                            self.telemetry.emit(TelemetryEvent::Transition {
                                ts: record.ts,
                                duration_us: record.duration_us,
                                from: record.from,
                                to: record.to,
                                event: record.event,
                                instance_id,
                                tenant_id: meta.tenant_id.clone(),
                            });
                        }
                        NavigatorEffect::TriggerEntryEffect { effect,.. } => {
                            entry_effect = Some(effect);
                        }
                        NavigatorEffect::NotifySubscribers {
                            subscribers,
                            source,
                            event,
                            from,
                            to,
                            data,
                        } => {
                            self.spawn_subscriber_notifications(subscribers, source, event, from, to, data);
                        }
                    }
                }
                Ok((new_instance, entry_effect))
            }
            Err((transition_error, _original)) => Err(transition_error.into()),
        }
    }

    /// Groups requests by shard and processes each shard's requests
    /// sequentially, running shards concurrently.
    pub async fn batch_send_events(
        self: &Arc<Self>,
        requests: Vec<SendRequest>,
    ) -> Vec<Result<TransitionOutcome, RegistryError>> {
        let mut results: Vec<Option<Result<TransitionOutcome, RegistryError>>> =
            (0..requests.len()).map(|_| None).collect();
        let mut buckets: HashMap<usize, Vec<(usize, SendRequest)>> = HashMap::new();

        for (index, request) in requests.into_iter().enumerate() {
            match self.instance_meta.read().await.get(&request.instance_id).cloned() {
                Some(meta) => {
                    let shard_idx = self.shard_locks.index_for(&meta.tenant_id);
                    buckets.entry(shard_idx).or_default().push((index, request));
                }
                None => results[index] = Some(Err(RegistryError::NotFound)),
            }
        }

        let bucket_futures = buckets.into_values().map(|bucket| {
            let registry = self.clone();
            async move {
                let mut out = Vec::with_capacity(bucket.len());
                for (index, request) in bucket {
                    let outcome = registry
                        .send_event(request.instance_id, request.event, request.event_data)
                        .await;
                    out.push((index, outcome));
                }
                out
            }
        });

        for bucket_result in futures::future::join_all(bucket_futures).await {
            for (index, outcome) in bucket_result {
                results[index] = Some(outcome);
            }
        }

        results.into_iter().map(|r| r.expect("every index filled")).collect()
    }

    /// Aggregate registry counters.
    pub async fn stats(&self) -> RegistryStats {
        let meta = self.instance_meta.read().await;
        let mut instance_count_per_shard = vec![0usize; self.shard_locks.shard_count()];
        for entry in meta.values() {
            let idx = self.shard_locks.index_for(&entry.tenant_id);
            instance_count_per_shard[idx] += 1;
        }
        RegistryStats {
            total: meta.len(),
            instance_count_per_shard,
            broadcasts_delivered: self.broadcasts_delivered.load(Ordering::Relaxed),
        }
    }

    /// Delivers `event_type`/`payload` to every instance matched by
    /// `target`, bounded by the worker pool; isolated per-instance failures
    /// never abort the broadcast.
    pub async fn broadcast(self: &Arc<Self>, event_type: &str, payload: FsmData, target: BroadcastTarget) -> usize {
        let ids = self.broadcast_targets(&target).await;

        let deliveries = ids.into_iter().map(|instance_id| {
            let registry = self.clone();
            let event_type = event_type.to_string();
            let payload = payload.clone();
            async move {
                let _permit = registry.worker_pool.acquire().await.expect("worker pool closed");
                registry.deliver_broadcast(instance_id, &event_type, payload).await
            }
        });

        let delivered = futures::future::join_all(deliveries)
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();

        self.broadcasts_delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        self.telemetry.emit(TelemetryEvent::Broadcast {
            ts: Utc::now(),
            count: delivered,
            event_type: event_type.to_string(),
            tenant_id: match &target {
                BroadcastTarget::Tenant(tenant_id) => Some(tenant_id.clone()),
                BroadcastTarget::All => None,
            },
        });
        delivered
    }

    async fn broadcast_targets(&self, target: &BroadcastTarget) -> Vec<InstanceId> {
        match target {
            BroadcastTarget::Tenant(tenant_id) => self
                .tenant_index
                .read()
                .await
                .get(tenant_id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
            BroadcastTarget::All => self.instance_meta.read().await.keys().copied().collect(),
        }
    }

    async fn deliver_broadcast(&self, instance_id: InstanceId, event_type: &str, payload: FsmData) -> bool {
        let Ok(meta) = self.lookup_meta(instance_id).await else {
            return false;
        };
        let source = ExternalSource {
            kind: "$broadcast".to_string(),
            instance_id,
        };
        let delivered = self
            .deliver_external(instance_id, &meta.tenant_id, &meta.kind, &source, event_type, payload)
            .await;
        if let Err(error) = &delivered {
            tracing::warn!(instance_id = %instance_id, tenant_id = %meta.tenant_id, %error, "broadcast delivery failed");
        } else {
            let _ = self
                .append_lifecycle(
                    LifecycleKind::BroadcastDelivered,
                    &meta.tenant_id,
                    &meta.kind,
                    instance_id,
                    serde_json::Map::new(),
                )
                .await;
        }
        delivered.is_ok()
    }

    async fn deliver_external(
        &self,
        instance_id: InstanceId,
        tenant_id: &TenantId,
        kind: &KindName,
        source: &ExternalSource,
        event_type: &str,
        event_data: FsmData,
    ) -> Result<(), RegistryError> {
        let kind_handle = self.resolve_kind(kind)?;
        let instance = self
            .load_instance(tenant_id, kind, instance_id)
            .await?
            .ok_or(RegistryError::NotFound)?;
        let updated = navigator_kernel::handle_external(&kind_handle, instance, source, event_type, &event_data);
        self.persist_instance(&updated, true).await
    }

    /// Spawns one isolated, deadline-bounded task per subscriber. A
    /// subscriber that exceeds the deadline is cancelled and counted as
    /// delivered-with-timeout; failures never affect the transition that
    /// triggered them.
    fn spawn_subscriber_notifications(
        self: &Arc<Self>,
        subscribers: Vec<InstanceId>,
        source: ExternalSource,
        event: EventName,
        from: StateName,
        to: StateName,
        data: FsmData,
    ) {
        for subscriber_id in subscribers {
            let registry = self.clone();
            let source = source.clone();
            let event = event.clone();
            let from = from.clone();
            let to = to.clone();
            let data = data.clone();
            tokio::spawn(async move {
                let _permit = match registry.worker_pool.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                let mut event_data = serde_json::Map::new();
                event_data.insert("event".into(), serde_json::json!(event.as_str()));
                event_data.insert("from".into(), serde_json::json!(from.as_str()));
                event_data.insert("to".into(), serde_json::json!(to.as_str()));
                event_data.insert("data".into(), serde_json::Value::Object(data));

                let Ok(meta) = registry.lookup_meta(subscriber_id).await else {
                    return;
                };
                let deadline = registry.subscriber_deadline;
                let delivery = registry.deliver_external(
                    subscriber_id,
                    &meta.tenant_id,
                    &meta.kind,
                    &source,
                    "state_changed",
                    event_data,
                );
                match tokio::time::timeout(deadline, delivery).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::warn!(subscriber_id = %subscriber_id, %error, "subscriber notification failed");
                    }
                    Err(_) => {
                        tracing::warn!(subscriber_id = %subscriber_id, "subscriber notification timed out");
                    }
                }
            });
        }
    }

    /// Reloads every shard by scanning the blob store's tenant prefixes and
    /// replaying any event-log transitions newer than the snapshot's
    /// recorded version. Returns the number of instances
    /// recovered.
    pub async fn recover(&self) -> Result<usize, RegistryError> {
        let root = self.blobs.root().to_path_buf();
        let entries = spawn_blocking(move || scan_snapshots(&root))
            .await
            .expect("recovery scan task panicked")?;

        let mut recovered = 0;
        for entry in entries {
            if self.kinds.get(&entry.kind).is_none() {
                continue;
            }
            let Some(mut instance) = self.load_instance(&entry.tenant_id, &entry.kind, entry.instance_id).await? else {
                continue;
            };

            let events = self.events.clone();
            let tenant_str = entry.tenant_id.as_str().to_string();
            let kind_str = entry.kind.as_str().to_string();
            let instance_str = entry.instance_id.to_string();
            let records = spawn_blocking(move || {
                events.list(&tenant_str, &kind_str, &instance_str, &Default::default())
            })
            .await
            .expect("event log list task panicked")
            .map_err(RegistryError::from)?;

            for record in records {
                if record.kind != LifecycleKind::Transition {
                    continue;
                }
                let Some(version) = record.payload.get("version").and_then(|v| v.as_u64()) else {
                    continue;
                };
                if version <= instance.metadata.version {
                    continue;
                }
                if let Some(to) = record.payload.get("to").and_then(|v| v.as_str()) {
                    instance.current_state = StateName::new(to.to_string());
                }
                if let Some(event_data) = record.payload.get("event_data").and_then(|v| v.as_object()) {
                    instance.merge_data(event_data.clone());
                }
                instance.metadata.version = version;
                instance.metadata.updated_at = record.ts;
            }

            self.persist_instance(&instance, true).await?;
            self.instance_meta.write().await.insert(
                entry.instance_id,
                InstanceMeta {
                    tenant_id: entry.tenant_id.clone(),
                    kind: entry.kind.clone(),
                },
            );
            self.tenant_index
                .write()
                .await
                .entry(entry.tenant_id)
                .or_default()
                .insert(entry.instance_id);
            recovered += 1;
        }
        Ok(recovered)
    }
}

fn record_type_name(kind: LifecycleKind) -> &'static str {
    match kind {
        LifecycleKind::Created => "created",
        LifecycleKind::Transition => "transition",
        LifecycleKind::Destroyed => "destroyed",
        LifecycleKind::EffectStarted => "effect_started",
        LifecycleKind::EffectCompleted => "effect_completed",
        LifecycleKind::EffectFailed => "effect_failed",
        LifecycleKind::BroadcastDelivered => "broadcast_delivered",
    }
}

struct SnapshotEntry {
    tenant_id: TenantId,
    kind: KindName,
    instance_id: InstanceId,
}

/// Walks `<data_root>/tenants/*/workflows/*/*.json`, parsing each path into
/// its `(tenant, kind, instance_id)` triple. Missing directories are not an
/// error — a fresh data root simply recovers zero instances.
fn scan_snapshots(root: &std::path::Path) -> Result<Vec<SnapshotEntry>, RegistryError> {
    let tenants_dir = root.join("tenants");
    let mut out = Vec::new();

    let Ok(tenant_entries) = std::fs::read_dir(&tenants_dir) else {
        return Ok(out);
    };
    for tenant_entry in tenant_entries.flatten() {
        let tenant_name = tenant_entry.file_name().to_string_lossy().into_owned();
        let workflows_dir = tenant_entry.path().join("workflows");
        let Ok(kind_entries) = std::fs::read_dir(&workflows_dir) else {
            continue;
        };
        for kind_entry in kind_entries.flatten() {
            let kind_name = kind_entry.file_name().to_string_lossy().into_owned();
            let Ok(snapshot_entries) = std::fs::read_dir(kind_entry.path()) else {
                continue;
            };
            for snapshot_entry in snapshot_entries.flatten() {
                let path = snapshot_entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let Ok(instance_id) = stem.parse::<InstanceId>() else {
                    continue;
                };
                out.push(SnapshotEntry {
                    tenant_id: TenantId::from(tenant_name.clone()),
                    kind: KindName::new(kind_name.clone()),
                    instance_id,
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests;
