//! # Navigator
//!
//! Navigator is a multi-tenant runtime for composable finite state
//! machines whose transitions are augmented by a declarative effects
//! language: model calls, agent coordination, retries, parallel/race
//! fan-out, compensations and timeouts.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Manager                                │
//! │  ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌───────────┐  │
//! │  │  Kernel  │ → │  Registry │ → │  Storage │   │  Effects  │  │
//! │  │(pure FSM)│   │ (sharded) │   │ (hybrid) │   │ (engine)  │  │
//! │  └──────────┘   └───────────┘   └──────────┘   └───────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```ignore
//! use navigator::Manager;
//! use navigator_config::NavigatorConfig;
//! use navigator_kernel::{KindBuilder, KindRegistry};
//! use navigator_types::{FsmData, KindName, TenantId};
//! use std::sync::Arc;
//!
//! let door = KindBuilder::new("door")
//!.state("open")
//!.state("closed")
//!.initial_state("closed")
//!.transition("closed", "open_door", "open", &[])
//!.transition("open", "close_door", "closed", &[])
//!.build()
//!.unwrap();
//!
//! let mut kinds = KindRegistry::new();
//! kinds.register(door);
//!
//! let manager = Manager::new(NavigatorConfig::default(), Arc::new(kinds));
//! let instance_id = manager
//!.create_fsm(KindName::new("door"), FsmData::new(), TenantId::new("acme"))
//!.await?;
//! ```
//!
//! # Modules
//!
//! - **SDK layer**: [`Manager`] — the sole public API surface.
//! - **Foundation**: kinds, instances and the effects grammar live in
//!   `navigator-kernel`, `navigator-types`, `navigator-storage`, and
//!   `navigator-effects`; this crate only wires them together.

mod data_store;
mod error;
mod manager;

pub use error::ManagerError;
pub use manager::{FsmMetrics, FsmStateView, Manager, SendEventRequest, TransitionResult};

// Re-export the building blocks an embedder needs to assemble kinds and
// submit requests, so a dependent only needs this one crate in the
// common case.
pub use navigator_kernel::{
    Component, ExternalSource, Kind, KindBuilder, KindRegistry, KindSummary, Plugin,
};
pub use navigator_registry::{InstanceSummary, RegistryStats};
pub use navigator_types::{
    BroadcastTarget, Effect, EventName, FsmData, InstanceId, InstanceMetadata, KindName,
    PerformanceStats, StateName, TenantId,
};

pub use navigator_config::NavigatorConfig;
pub use navigator_effects::{Capabilities, ReferenceCapabilities};
