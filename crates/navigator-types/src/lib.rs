//! # navigator-types: Core types for the Navigator FSM runtime
//!
//! Shared types used across the workspace:
//! - Identity ([`TenantId`], [`InstanceId`], [`KindName`], [`StateName`], [`EventName`])
//! - Instance data ([`FsmData`], [`InstanceMetadata`], [`PerformanceStats`])
//! - Durable records ([`TransitionRecord`], [`LifecycleRecord`], [`LifecycleKind`])
//! - Effect bookkeeping ([`EffectExecution`], [`EffectStatus`])
//! - The closed-set error taxonomy ([`FsmError`])

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod effect;
pub use effect::{
    AgentSpec, Backoff, CoordinateOpts, CoordinationType, Effect, LlmOpts, RagOpts, RetryPolicy,
};

// ============================================================================
// Identity
// ============================================================================

/// Identifies a tenant — the isolation boundary for instances, logs and
/// broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(Arc<str>);

impl TenantId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Unique identifier for a live FSM instance within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Generates a fresh random instance id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for InstanceId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for InstanceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Symbolic name of a registered FSM kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KindName(Arc<str>);

impl KindName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for KindName {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// Name of a declared state within a kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateName(Arc<str>);

impl StateName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateName {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// Name of an event accepted by a transition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventName(Arc<str>);

impl EventName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventName {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

// ============================================================================
// Instance data
// ============================================================================

/// An FSM instance's data bag: an ordered mapping of scalar/structured
/// values. Backed by `serde_json::Map`, which preserves
/// insertion order with the `preserve_order` feature enabled.
pub type FsmData = serde_json::Map<String, serde_json::Value>;

/// Shallow, last-writer-wins merge of `patch` into `base`. Keys present in `patch` overwrite
/// keys in `base`; keys only in `base` are preserved.
pub fn merge_data(base: &mut FsmData, patch: FsmData) {
    for (key, value) in patch {
        base.insert(key, value);
    }
}

/// Bookkeeping fields attached to every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl InstanceMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Bumps the version by exactly 1 and refreshes `updated_at` (invariant 5).
    pub fn record_transition(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Rolling transition-performance counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceStats {
    pub transition_count: u64,
    pub last_transition_at: Option<DateTime<Utc>>,
    pub avg_transition_us: f64,
}

impl PerformanceStats {
    /// Folds in a new transition duration using an incremental mean.
    pub fn record(&mut self, duration_us: f64, now: DateTime<Utc>) {
        self.transition_count += 1;
        self.avg_transition_us +=
            (duration_us - self.avg_transition_us) / self.transition_count as f64;
        self.last_transition_at = Some(now);
    }
}

// ============================================================================
// Durable records
// ============================================================================

/// A single applied transition, appended to the per-instance event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub ts: DateTime<Utc>,
    pub instance_id: InstanceId,
    pub tenant_id: TenantId,
    pub from: StateName,
    pub to: StateName,
    pub event: EventName,
    pub event_data: FsmData,
    pub duration_us: u64,
}

/// The kind of lifecycle event recorded for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Created,
    Transition,
    Destroyed,
    EffectStarted,
    EffectCompleted,
    EffectFailed,
    BroadcastDelivered,
}

/// A lifecycle record appended to the event log. `payload`
/// is flattened so the wire shape is `{"ts","type","instance_id","tenant_id",
///...payload}` rather than nesting payload under its own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LifecycleKind,
    pub instance_id: InstanceId,
    pub tenant_id: TenantId,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Effect bookkeeping
// ============================================================================

/// Terminal status of an effect execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectStatus {
    Ok,
    Error,
    Timeout,
    Cancelled,
}

/// Record of a single effect-tree node execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectExecution {
    pub execution_id: Uuid,
    pub instance_id: InstanceId,
    pub tenant_id: TenantId,
    pub effect_kind: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<EffectStatus>,
    pub result_or_error: Option<serde_json::Value>,
}

// ============================================================================
// Broadcast target
// ============================================================================

/// Target of a `broadcast` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastTarget {
    Tenant(TenantId),
    All,
}

// ============================================================================
// Closed-set error taxonomy
// ============================================================================

/// The closed set of error reasons the Manager facade can return.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum FsmError {
    #[error("instance not found")]
    NotFound,

    #[error("no transition for the current state and event")]
    InvalidTransition,

    #[error("guard denied: {name}")]
    GuardDenied { name: String },

    #[error("hook failed: {name}")]
    HookFailed { name: String },

    #[error("unknown fsm kind: {0}")]
    KindUnknown(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("timed out")]
    Timeout,

    #[error("max retries exceeded")]
    MaxRetriesExceeded,

    #[error("function not exported: {module}.{function}")]
    FunctionNotExported { module: String, function: String },

    #[error("raised: {info}")]
    Raised { info: String },

    #[error("store error: {0}")]
    StoreError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_data_is_last_writer_wins_shallow() {
        let mut base = FsmData::new();
        base.insert("a".into(), serde_json::json!(1));
        base.insert("b".into(), serde_json::json!(2));

        let mut patch = FsmData::new();
        patch.insert("b".into(), serde_json::json!(20));
        patch.insert("c".into(), serde_json::json!(3));

        merge_data(&mut base, patch);

        assert_eq!(base.get("a"), Some(&serde_json::json!(1)));
        assert_eq!(base.get("b"), Some(&serde_json::json!(20)));
        assert_eq!(base.get("c"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn metadata_bumps_version_by_exactly_one() {
        let now = Utc::now();
        let mut meta = InstanceMetadata::new(now);
        assert_eq!(meta.version, 0);
        meta.record_transition(now);
        assert_eq!(meta.version, 1);
        meta.record_transition(now);
        assert_eq!(meta.version, 2);
    }

    #[test]
    fn performance_stats_average_converges() {
        let now = Utc::now();
        let mut perf = PerformanceStats::default();
        perf.record(100.0, now);
        perf.record(200.0, now);
        assert_eq!(perf.transition_count, 2);
        assert!((perf.avg_transition_us - 150.0).abs() < 1e-9);
    }

    #[test]
    fn instance_id_round_trips_through_display_and_parse() {
        let id = InstanceId::generate();
        let text = id.to_string();
        let parsed: InstanceId = text.parse().expect("valid uuid text");
        assert_eq!(id, parsed);
    }
}
