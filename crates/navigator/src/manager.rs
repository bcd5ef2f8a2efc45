//! The Manager facade: the single programmatic surface
//! embedders drive. Wires together the kind registry, the instance
//! registry and the effects engine, and owns the cancellation tokens
//! that let a caller cancel a running entry-effect tree.

use std::collections::HashMap;
use std::sync::Arc;

use navigator_effects::{Capabilities, ExecutionContext, ReferenceCapabilities};
use navigator_kernel::{Kind, KindRegistry, KindSummary};
use navigator_registry::{InstanceRegistry, InstanceSummary, RegistryStats, SendRequest};
use navigator_telemetry::TelemetryBus;
use navigator_types::{
    BroadcastTarget, Effect, EventName, FsmData, InstanceId, InstanceMetadata, KindName, LifecycleKind,
    PerformanceStats, StateName, TenantId,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::data_store::RegistryDataStore;
use crate::error::ManagerError;

/// Result of a successful `create_fsm`/`send_event`/batch item.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult {
    pub state: StateName,
    pub data: FsmData,
    pub version: u64,
}

/// Result of `get_fsm_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct FsmStateView {
    pub state: StateName,
    pub data: FsmData,
    pub metadata: InstanceMetadata,
}

/// Result of `get_fsm_metrics`.
pub type FsmMetrics = PerformanceStats;

/// One `{id, event, event_data}` request for `batch_send_events`.
#[derive(Debug, Clone)]
pub struct SendEventRequest {
    pub instance_id: InstanceId,
    pub event: EventName,
    pub event_data: FsmData,
}

/// Owns every dependency of the runtime and exposes the programmatic
/// surface embedders drive. Cheaply `Clone`-able; every field is
/// `Arc`-backed or interior-mutable.
#[derive(Clone)]
pub struct Manager {
    registry: Arc<InstanceRegistry>,
    kinds: Arc<KindRegistry>,
    telemetry: Arc<TelemetryBus>,
    pool: Arc<navigator_effects::EffectWorkerPool>,
    capabilities: Arc<dyn Capabilities>,
    cancellations: Arc<AsyncMutex<HashMap<InstanceId, CancellationToken>>>,
}

/// Construction knobs not already covered by [`navigator_config::NavigatorConfig`]:
/// the cache capacity held per shard, independent of the shard count itself.
const DEFAULT_CACHE_CAPACITY_PER_SHARD: usize = 1024;

impl Manager {
    /// Builds a Manager backed by `ReferenceCapabilities`, a deterministic
    /// stub for `call_llm`/`coordinate_agents`/`rag_pipeline`.
    pub fn new(config: navigator_config::NavigatorConfig, kinds: Arc<KindRegistry>) -> Self {
        Self::with_capabilities(config, kinds, Arc::new(ReferenceCapabilities))
    }

    pub fn with_capabilities(
        config: navigator_config::NavigatorConfig,
        kinds: Arc<KindRegistry>,
        capabilities: Arc<dyn Capabilities>,
    ) -> Self {
        let telemetry = Arc::new(TelemetryBus::new(1024));
        let registry = Arc::new(InstanceRegistry::new(
            config.data_root.clone(),
            config.shard_count,
            DEFAULT_CACHE_CAPACITY_PER_SHARD,
            config.cache_memory_threshold_bytes,
            kinds.clone(),
            telemetry.clone(),
            config.effect_worker_pool,
            config.subscriber_deadline_ms,
        ));
        let pool = Arc::new(navigator_effects::EffectWorkerPool::new(config.effect_worker_pool));
        Self {
            registry,
            kinds,
            telemetry,
            pool,
            capabilities,
            cancellations: Arc::new(AsyncMutex::new(HashMap::new())),
        }
    }

    pub fn telemetry(&self) -> Arc<TelemetryBus> {
        self.telemetry.clone()
    }

    pub fn registry(&self) -> Arc<InstanceRegistry> {
        self.registry.clone()
    }

    /// Reconstructs in-memory indices from durable snapshots and event
    /// logs on startup.
    pub async fn recover(&self) -> Result<usize, ManagerError> {
        Ok(self.registry.recover().await?)
    }

    fn resolve_kind(&self, name: &KindName) -> Result<Arc<Kind>, ManagerError> {
        self.kinds.get(name).ok_or_else(|| ManagerError::KindUnknown(name.as_str().to_string()))
    }

    pub async fn create_fsm(
        &self,
        kind: KindName,
        data: FsmData,
        tenant_id: TenantId,
    ) -> Result<InstanceId, ManagerError> {
        let kind_handle = self.resolve_kind(&kind)?;
        let instance_id = self.registry.create(kind, data, tenant_id.clone()).await?;
        if let Some(effect) = kind_handle.entry_effect(kind_handle.initial_state()) {
            self.dispatch_effect(instance_id, tenant_id, effect.clone());
        }
        Ok(instance_id)
    }

    pub async fn send_event(
        &self,
        instance_id: InstanceId,
        event: EventName,
        event_data: FsmData,
    ) -> Result<TransitionResult, ManagerError> {
        let (instance, entry_effect) = self.registry.send_event(instance_id, event, event_data).await?;
        if let Some(effect) = entry_effect {
            self.dispatch_effect(instance_id, instance.tenant_id.clone(), effect);
        }
        Ok(TransitionResult {
            state: instance.current_state,
            data: instance.data,
            version: instance.metadata.version,
        })
    }

    pub async fn get_fsm_state(&self, instance_id: InstanceId) -> Result<FsmStateView, ManagerError> {
        let (_, instance) = self.registry.get(instance_id).await?;
        Ok(FsmStateView {
            state: instance.current_state,
            data: instance.data,
            metadata: instance.metadata,
        })
    }

    pub async fn get_fsm_metrics(&self, instance_id: InstanceId) -> Result<FsmMetrics, ManagerError> {
        let (_, instance) = self.registry.get(instance_id).await?;
        Ok(instance.performance)
    }

    pub async fn destroy_fsm(&self, instance_id: InstanceId) -> Result<(), ManagerError> {
        self.cancel_effects(instance_id).await;
        self.registry.destroy(instance_id).await?;
        Ok(())
    }

    pub async fn list_by_tenant(&self, tenant_id: &TenantId) -> Vec<InstanceSummary> {
        self.registry.list_by_tenant(tenant_id).await
    }

    pub async fn batch_send_events(
        &self,
        requests: Vec<SendEventRequest>,
    ) -> Vec<Result<TransitionResult, ManagerError>> {
        let registry_requests = requests
            .iter()
            .map(|r| SendRequest {
                instance_id: r.instance_id,
                event: r.event.clone(),
                event_data: r.event_data.clone(),
            })
            .collect();

        let outcomes = self.registry.batch_send_events(registry_requests).await;
        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.map_err(ManagerError::from).map(|(instance, entry_effect)| {
                    if let Some(effect) = entry_effect {
                        self.dispatch_effect(instance.id, instance.tenant_id.clone(), effect);
                    }
                    TransitionResult {
                        state: instance.current_state,
                        data: instance.data,
                        version: instance.metadata.version,
                    }
                })
            })
            .collect()
    }

    pub async fn broadcast(&self, event_type: &str, payload: FsmData, target: BroadcastTarget) -> usize {
        self.registry.broadcast(event_type, payload, target).await
    }

    /// Cancels the running entry-effect tree for `instance_id`, if any.
    pub async fn cancel_effects(&self, instance_id: InstanceId) {
        if let Some(token) = self.cancellations.lock().await.remove(&instance_id) {
            token.cancel();
        }
    }

    pub fn available_kinds(&self) -> Vec<KindSummary> {
        self.kinds.available_kinds()
    }

    pub async fn stats(&self) -> RegistryStats {
        self.registry.stats().await
    }

    /// Dispatches an entry effect tree fire-and-forget, tracked by a
    /// cancellation token so `cancel_effects` can abort it mid-flight.
    /// `put_data`/`get_data` run against a buffer seeded from the
    /// instance's data at dispatch time and merged back via `update`
    /// once the tree finishes.
    fn dispatch_effect(&self, instance_id: InstanceId, tenant_id: TenantId, effect: Effect) {
        let registry = self.registry.clone();
        let capabilities = self.capabilities.clone();
        let pool = self.pool.clone();
        let telemetry = self.telemetry.clone();
        let cancellations = self.cancellations.clone();
        let cancel = CancellationToken::new();
        let cancel_for_task = cancel.clone();

        tokio::spawn(async move {
            cancellations.lock().await.insert(instance_id, cancel);

            let data = match registry.get(instance_id).await {
                Ok((_, instance)) => Arc::new(RegistryDataStore::seeded(instance.data)),
                Err(err) => {
                    tracing::warn!(?instance_id, %err, "entry effect dispatch: instance vanished before execution");
                    cancellations.lock().await.remove(&instance_id);
                    return;
                }
            };

            let ctx = ExecutionContext {
                instance_id,
                tenant_id,
                data: data.clone(),
                capabilities,
                pool,
                telemetry,
                cancel: cancel_for_task,
            };

            let result = navigator_effects::execute(&effect, &ctx).await;

            let (kind_tag, payload) = match &result {
                Ok(value) => (
                    LifecycleKind::EffectCompleted,
                    serde_json::json!({"result": value}).as_object().cloned().unwrap_or_default(),
                ),
                Err(err) => (
                    LifecycleKind::EffectFailed,
                    serde_json::json!({"reason": err.reason(), "error": err.to_string()})
                        .as_object()
                        .cloned()
                        .unwrap_or_default(),
                ),
            };
            if let Err(err) = registry.record_effect_lifecycle(kind_tag, instance_id, payload).await {
                tracing::warn!(?instance_id, %err, "failed to append effect lifecycle record");
            }

            if let Ok((_, mut instance)) = registry.get(instance_id).await {
                instance.merge_data(data.snapshot());
                if let Err(err) = registry.update(instance).await {
                    tracing::warn!(?instance_id, %err, "failed to persist effect-tree data writes");
                }
            }

            cancellations.lock().await.remove(&instance_id);
        });
    }
}
