//! The in-process telemetry bus.
//!
//! Every emitted [`TelemetryEvent`] is both logged via `tracing` (for
//! operators tailing logs) and broadcast over a `tokio::sync::broadcast`
//! channel (for in-process subscribers, e.g. a future Studio-style UI).
//! Lagging subscribers drop old events rather than blocking emitters.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::event::TelemetryEvent;

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Aggregate success/failure/cancel counters per effect kind, reachable via
/// `get_metrics()`.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EffectKindCounters {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

/// Fans telemetry events out to subscribers and keeps running aggregate
/// counters.
pub struct TelemetryBus {
    tx: broadcast::Sender<TelemetryEvent>,
    effect_counters: Mutex<HashMap<&'static str, EffectKindCounters>>,
}

impl TelemetryBus {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer_size);
        Self {
            tx,
            effect_counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Logs `event` via `tracing` at a level appropriate to its family,
    /// updates aggregate counters, and broadcasts it. Returns the number of
    /// active subscribers that received it.
    pub fn emit(&self, event: TelemetryEvent) -> usize {
        self.log(&event);
        self.update_counters(&event);
        self.tx.send(event).unwrap_or(0)
    }

    fn log(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Transition {
                duration_us,
                from,
                to,
                event: transition_event,
                instance_id,
                tenant_id,
                    ..
            } => {
                tracing::debug!(
                    event = "fsm.transition",
                    duration_us,
                    from = %from,
                    to = %to,
                    transition_event = %transition_event,
                    instance_id = %instance_id,
                    tenant_id = %tenant_id,
                    "transition applied"
                );
            }
            TelemetryEvent::EventStoreAppend {
                bytes,
                record_type,
                instance_id,
                tenant_id,
                    ..
            } => {
                tracing::debug!(
                    event = "fsm.event_store.append",
                    bytes,
                    record_type,
                    instance_id = %instance_id,
                    tenant_id = %tenant_id,
                    "event log append"
                );
            }
            TelemetryEvent::Broadcast {
                count,
                event_type,
                tenant_id,
                    ..
            } => {
                tracing::debug!(
                    event = "fsm.broadcast",
                    count,
                    event_type,
                    tenant_id = ?tenant_id,
                    "broadcast delivered"
                );
            }
            TelemetryEvent::EffectStarted {
                execution_id,
                effect_kind,
                instance_id,
                tenant_id,
                    ..
            } => {
                tracing::debug!(
                    event = "fsm.effect.started",
                    %execution_id,
                    effect_kind,
                    instance_id = %instance_id,
                    tenant_id = %tenant_id,
                    "effect started"
                );
            }
            TelemetryEvent::EffectCompleted {
                execution_id,
                effect_kind,
                duration_us,
                instance_id,
                tenant_id,
                    ..
            } => {
                tracing::debug!(
                    event = "fsm.effect.completed",
                    %execution_id,
                    effect_kind,
                    duration_us,
                    instance_id = %instance_id,
                    tenant_id = %tenant_id,
                    "effect completed"
                );
            }
            TelemetryEvent::EffectFailed {
                execution_id,
                effect_kind,
                duration_us,
                reason,
                instance_id,
                tenant_id,
                    ..
            } => {
                tracing::warn!(
                    event = "fsm.effect.failed",
                    %execution_id,
                    effect_kind,
                    duration_us,
                    reason,
                    instance_id = %instance_id,
                    tenant_id = %tenant_id,
                    "effect failed"
                );
            }
            TelemetryEvent::EffectCancelled {
                execution_id,
                effect_kind,
                duration_us,
                instance_id,
                tenant_id,
                    ..
            } => {
                tracing::warn!(
                    event = "fsm.effect.cancelled",
                    %execution_id,
                    effect_kind,
                    duration_us,
                    instance_id = %instance_id,
                    tenant_id = %tenant_id,
                    "effect cancelled"
                );
            }
        }
    }

    fn update_counters(&self, event: &TelemetryEvent) {
        let kind = match event {
            TelemetryEvent::EffectStarted { effect_kind,.. }
            | TelemetryEvent::EffectCompleted { effect_kind,.. }
            | TelemetryEvent::EffectFailed { effect_kind,.. }
            | TelemetryEvent::EffectCancelled { effect_kind,.. } => *effect_kind,
            _ => return,
        };
        let mut counters = self.effect_counters.lock().expect("counters lock poisoned");
        let entry = counters.entry(kind).or_default();
        match event {
            TelemetryEvent::EffectStarted {.. } => entry.started += 1,
            TelemetryEvent::EffectCompleted {.. } => entry.completed += 1,
            TelemetryEvent::EffectFailed {.. } => entry.failed += 1,
            TelemetryEvent::EffectCancelled {.. } => entry.cancelled += 1,
            _ => unreachable!("filtered to effect events above"),
        }
    }

    /// Snapshot of aggregate per-kind effect counters.
    pub fn effect_counters(&self) -> HashMap<&'static str, EffectKindCounters> {
        self.effect_counters.lock().expect("counters lock poisoned").clone()
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}
