//! The telemetry event families emitted across the runtime.

use chrono::{DateTime, Utc};
use navigator_types::{EventName, InstanceId, StateName, TenantId};
use serde::{Deserialize, Serialize};

/// One telemetry event. Each variant mirrors a `[:fsm,...]` event name
/// emitted at a specific point in the runtime's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// `[:fsm, :transition]`.
    Transition {
        ts: DateTime<Utc>,
        duration_us: u64,
        from: StateName,
        to: StateName,
        event: EventName,
        instance_id: InstanceId,
        tenant_id: TenantId,
    },
    /// `[:fsm, :event_store, :append]`.
    EventStoreAppend {
        ts: DateTime<Utc>,
        bytes: usize,
        record_type: String,
        instance_id: InstanceId,
        tenant_id: TenantId,
    },
    /// `[:fsm, :broadcast]`.
    Broadcast {
        ts: DateTime<Utc>,
        count: usize,
        event_type: String,
        tenant_id: Option<TenantId>,
    },
    /// `[:fsm, :effect, :started]`.
    EffectStarted {
        ts: DateTime<Utc>,
        execution_id: uuid::Uuid,
        effect_kind: &'static str,
        instance_id: InstanceId,
        tenant_id: TenantId,
    },
    /// `[:fsm, :effect, :completed]`.
    EffectCompleted {
        ts: DateTime<Utc>,
        execution_id: uuid::Uuid,
        effect_kind: &'static str,
        duration_us: u64,
        instance_id: InstanceId,
        tenant_id: TenantId,
    },
    /// `[:fsm, :effect, :failed]`.
    EffectFailed {
        ts: DateTime<Utc>,
        execution_id: uuid::Uuid,
        effect_kind: &'static str,
        duration_us: u64,
        reason: String,
        instance_id: InstanceId,
        tenant_id: TenantId,
    },
    /// `[:fsm, :effect, :cancelled]`.
    EffectCancelled {
        ts: DateTime<Utc>,
        execution_id: uuid::Uuid,
        effect_kind: &'static str,
        duration_us: u64,
        instance_id: InstanceId,
        tenant_id: TenantId,
    },
}

impl TelemetryEvent {
    /// The dotted event name, following `[:fsm,...]` notation, used as a
    /// `tracing` field and as aggregate-counter keys.
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::Transition {.. } => "fsm.transition",
            TelemetryEvent::EventStoreAppend {.. } => "fsm.event_store.append",
            TelemetryEvent::Broadcast {.. } => "fsm.broadcast",
            TelemetryEvent::EffectStarted {.. } => "fsm.effect.started",
            TelemetryEvent::EffectCompleted {.. } => "fsm.effect.completed",
            TelemetryEvent::EffectFailed {.. } => "fsm.effect.failed",
            TelemetryEvent::EffectCancelled {.. } => "fsm.effect.cancelled",
        }
    }
}
