//! The transition algorithm.
//!
//! `Navigator::send` is the pure heart of the runtime: given a [`Kind`] and
//! an [`Instance`], it either produces a new instance plus a list of
//! [`NavigatorEffect`]s describing what the impure shell (the Manager, in
//! `navigator`) must do next, or leaves the instance untouched and reports
//! why. No file, network or channel I/O happens in this module: it keeps a
//! pure `(State, Command) -> (State, Vec<Effect>)` core separate from the
//! executing runtime.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use navigator_types::{Effect, EventName, FsmData, InstanceId, StateName, TransitionRecord};

use crate::instance::Instance;
use crate::kind::{ExternalSource, Kind};

/// Why a transition was not applied.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("no transition for state {from:?} on event {event:?}")]
    NoTransition { from: String, event: String },

    #[error("guard denied: {name}")]
    GuardDenied { name: String },

    #[error("hook failed: {name}")]
    HookFailed { name: String },
}

/// A side-effecting instruction produced by a successful transition, for
/// the impure shell to carry out.
#[derive(Debug, Clone)]
pub enum NavigatorEffect {
    /// Append `record` to the instance's event log (step 7).
    AppendTransition(TransitionRecord),
    /// Trigger the entry effect tree of the new state, fire-and-forget
    /// (step 8).
    TriggerEntryEffect { state: StateName, effect: Effect },
    /// Notify each subscriber of the state change (step 9).
    NotifySubscribers {
        subscribers: Vec<InstanceId>,
        source: ExternalSource,
        event: EventName,
        from: StateName,
        to: StateName,
        data: FsmData,
    },
}

/// Applies `(event, event_data)` to `instance` under `kind`'s rules.
///
/// On success returns the new instance and the effects the caller must
/// execute. On failure the original `instance` is returned unchanged.
#[allow(clippy::too_many_lines)]
pub fn send(
    kind: &Kind,
    instance: Instance,
    event: EventName,
    event_data: FsmData,
) -> Result<(Instance, Vec<NavigatorEffect>), (TransitionError, Instance)> {
    let started = Instant::now();
    let from = instance.current_state.clone();

    // Step 1: resolve (from, event) -> to.
    let transition = match kind.resolve(&from, &event) {
        Some(t) => t,
        None => {
            return Err((
                TransitionError::NoTransition {
                    from: from.as_str().to_string(),
                    event: event.as_str().to_string(),
                },
                instance,
            ))
        }
    };
    let to = transition.to().clone();

    // Step 2: validators, in declaration order; first error short-circuits.
    for guard in transition.guards() {
        if let Err(_reason) = guard.check(&instance, &event, &event_data) {
            return Err((
                TransitionError::GuardDenied {
                    name: guard.name().to_string(),
                },
                instance,
            ));
        }
    }

    // Step 3: on_exit(from) hooks, in order; any failure aborts.
    let mut working = instance.clone();
    for hook in kind.on_exit_hooks(&from) {
        working = match hook.run(working) {
            Ok(next) => next,
            Err(_) => {
                return Err((
                    TransitionError::HookFailed {
                        name: hook.name().to_string(),
                    },
                    instance,
                ))
            }
        };
    }

    // Step 4: before_transition plugin hooks (observational, cannot veto).
    for plugin in kind.plugins() {
        if let Some(before) = &plugin.before_transition {
            working = before(working);
        }
    }

    // Step 5: set state, merge event data, bump version.
    working.current_state = to.clone();
    working.merge_data(event_data.clone());
    let now = Utc::now();
    working.metadata.record_transition(now);

    // Step 6: on_enter(to) hooks; buffered so failure rolls back entirely
    // to the original, pre-transition instance.
    let mut entered = working;
    for hook in kind.on_enter_hooks(&to) {
        entered = match hook.run(entered) {
            Ok(next) => next,
            Err(_) => {
                return Err((
                    TransitionError::HookFailed {
                        name: hook.name().to_string(),
                    },
                    instance,
                ))
            }
        };
    }

    // after_transition plugin hooks run once the transition has committed.
    let mut committed = entered;
    for plugin in kind.plugins() {
        if let Some(after) = &plugin.after_transition {
            committed = after(committed);
        }
    }

    let duration_us = started.elapsed().as_micros() as u64;
    committed.performance.record(duration_us as f64, now);

    let mut effects = Vec::new();

    // Step 7: transition record (appended by the shell, ordered before
    // subscriber notification per invariant 3).
    effects.push(NavigatorEffect::AppendTransition(TransitionRecord {
        ts: now,
        instance_id: committed.id,
        tenant_id: committed.tenant_id.clone(),
        from: from.clone(),
        to: to.clone(),
        event: event.clone(),
        event_data: event_data.clone(),
        duration_us,
    }));

    // Step 8: trigger the new state's entry effect, fire-and-forget.
    if let Some(effect) = kind.entry_effect(&to) {
        effects.push(NavigatorEffect::TriggerEntryEffect {
            state: to.clone(),
            effect: effect.clone(),
        });
    }

    // Step 9: notify subscribers.
    if !committed.subscribers.is_empty() {
        effects.push(NavigatorEffect::NotifySubscribers {
            subscribers: committed.subscribers.iter().copied().collect(),
            source: ExternalSource {
                kind: kind.name().to_string(),
                instance_id: committed.id,
            },
            event,
            from,
            to,
            data: committed.data.clone(),
        });
    }

    Ok((committed, effects))
}

/// Whether `event` has a declared transition from `instance`'s current
/// state.
pub fn can(kind: &Kind, instance: &Instance, event: &EventName) -> bool {
    kind.can(&instance.current_state, event)
}

/// States reachable from `instance`'s current state.
pub fn destinations(kind: &Kind, instance: &Instance) -> HashSet<StateName> {
    kind.destinations(&instance.current_state)
}

/// Delivers an external/broadcast event via the kind's user-overridable
/// reducer. The handler is assumed total;
/// if it panics the instance is returned unchanged, matching "failures are
/// caught and the instance is returned unchanged".
pub fn handle_external(
    kind: &Kind,
    instance: Instance,
    source: &ExternalSource,
    event_type: &str,
    event_data: &FsmData,
) -> Instance {
    let Some(handler) = kind.external_handler() else {
        return instance;
    };
    let instance_for_panic = instance.clone();
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        handler(&instance, source, event_type, event_data)
    }))
        .unwrap_or(instance_for_panic)
}

/// Adds `other` to `instance`'s subscriber set.
pub fn subscribe(mut instance: Instance, other: InstanceId) -> Instance {
    instance.subscribe(other);
    instance
}

/// Removes `other` from `instance`'s subscriber set.
pub fn unsubscribe(mut instance: Instance, other: InstanceId) -> Instance {
    instance.unsubscribe(other);
    instance
}
