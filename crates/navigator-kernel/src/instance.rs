//! A live FSM instance.

use std::collections::HashSet;

use chrono::Utc;
use navigator_types::{
    merge_data, FsmData, InstanceId, InstanceMetadata, KindName, PerformanceStats, StateName,
    TenantId,
};
use serde::{Deserialize, Serialize};

/// A live FSM instance: identity, tenant, current state, data and
/// bookkeeping. Serializable as the snapshot JSON shape persisted by
/// `navigator-storage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub tenant_id: TenantId,
    pub kind_ref: KindName,
    pub current_state: StateName,
    pub data: FsmData,
    pub metadata: InstanceMetadata,
    pub performance: PerformanceStats,
    pub subscribers: HashSet<InstanceId>,
}

impl Instance {
    /// Creates a fresh instance in `initial_state`.
    pub fn new(
        id: InstanceId,
        tenant_id: TenantId,
        kind_ref: KindName,
        initial_state: StateName,
        data: FsmData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            kind_ref,
            current_state: initial_state,
            data,
            metadata: InstanceMetadata::new(now),
            performance: PerformanceStats::default(),
            subscribers: HashSet::new(),
        }
    }

    /// Shallow, last-writer-wins merge of `patch` into `self.data`.
    pub fn merge_data(&mut self, patch: FsmData) {
        merge_data(&mut self.data, patch);
    }

    pub fn subscribe(&mut self, other: InstanceId) {
        self.subscribers.insert(other);
    }

    pub fn unsubscribe(&mut self, other: InstanceId) {
        self.subscribers.remove(&other);
    }
}
