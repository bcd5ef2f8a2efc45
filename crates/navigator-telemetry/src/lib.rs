//! # navigator-telemetry: the in-process telemetry bus
//!
//! Every transition, effect, and broadcast in the runtime emits a
//! [`TelemetryEvent`] through a [`TelemetryBus`].
//! Events are logged via `tracing` and fanned out over a bounded
//! `tokio::sync::broadcast` channel; lagging subscribers drop old events
//! rather than stalling emitters.

mod bus;
mod event;

pub use bus::{EffectKindCounters, TelemetryBus};
pub use event::TelemetryEvent;
