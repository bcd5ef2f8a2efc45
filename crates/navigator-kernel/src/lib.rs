//! # navigator-kernel: the pure Navigator core
//!
//! This crate has no I/O. It defines what an FSM [`Kind`] is, what a live
//! [`Instance`] looks like, and the single pure algorithm ([`navigator::send`])
//! that advances an instance from one state to the next. Everything that
//! touches disk, the network or a clock beyond reading it once belongs to
//! the crates built on top of this one.

mod instance;
mod kind;
mod navigator;
mod registry;

pub use instance::Instance;
pub use kind::{
    Component, DefinitionError, ExternalHandlerFn, ExternalSource, GuardFn, HookFn, Kind,
    KindBuilder, Plugin, PluginHookFn,
};
pub use navigator::{
    can, destinations, handle_external, send, subscribe, unsubscribe, NavigatorEffect,
    TransitionError,
};
pub use registry::{KindRegistry, KindSummary};

#[cfg(test)]
mod tests;
