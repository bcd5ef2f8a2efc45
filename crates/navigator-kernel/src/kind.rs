//! FSM kind definitions: states, transitions, guards, hooks, components and
//! plugins.
//!
//! A [`Kind`] is built once via [`KindBuilder`] and is immutable thereafter.
//! Guards and hooks are looked up by symbolic name at build time into a
//! capability table, so lookup at call time is just a `Vec` index, O(1).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use navigator_types::{Effect, EventName, FsmData, StateName};

use crate::instance::Instance;

/// A guard evaluated before a transition is allowed to proceed. Must be
/// pure and total; returning `Err` denies the transition.
pub type GuardFn = Arc<dyn Fn(&Instance, &EventName, &FsmData) -> Result<(), String> + Send + Sync>;

/// A lifecycle hook. Takes ownership of the instance and returns either the
/// (possibly mutated) instance or an error that aborts the transition. Pure:
/// `Hook(I) -> I`, no I/O.
pub type HookFn = Arc<dyn Fn(Instance) -> Result<Instance, String> + Send + Sync>;

/// A plugin observer hook. Cannot veto a transition, only observe/annotate
/// the instance in flight.
pub type PluginHookFn = Arc<dyn Fn(Instance) -> Instance + Send + Sync>;

/// The user-overridable external-event reducer.
/// Must be total; the engine wraps it so a panic is caught and the instance
/// is returned unchanged rather than propagating.
pub type ExternalHandlerFn =
    Arc<dyn Fn(&Instance, &ExternalSource, &str, &FsmData) -> Instance + Send + Sync>;

/// Identifies the originator of an external/broadcast event delivered to
/// `handle_external`.
#[derive(Debug, Clone)]
pub struct ExternalSource {
    pub kind: String,
    pub instance_id: navigator_types::InstanceId,
}

#[derive(Clone)]
struct NamedGuard {
    name: String,
    run: GuardFn,
}

#[derive(Clone)]
struct NamedHook {
    name: String,
    run: HookFn,
}

/// One declared transition: `(from, event, to, guard_refs)`.
#[derive(Clone)]
struct Transition {
    to: StateName,
    guards: Vec<NamedGuard>,
}

/// An error in a kind's definition, detected at build time.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("initial state {0:?} is not a declared state")]
    UnknownInitialState(String),

    #[error("transition ({from:?}, {event:?}) targets undeclared state {to:?}")]
    UnknownTargetState {
        from: String,
        event: String,
        to: String,
    },

    #[error("duplicate transition ({from:?}, {event:?}) declared with two different destinations")]
    DuplicateTransition { from: String, event: String },

    #[error("component {component:?} declares state {state:?} already present in the kind")]
    DuplicateComponentState { component: String, state: String },

    #[error("transition ({from:?}, {event:?}) references unregistered guard {guard:?}")]
    UnknownGuard {
        from: String,
        event: String,
        guard: String,
    },
}

/// A reusable fragment of states, transitions and hooks merged into a kind
/// at definition time.
#[derive(Default)]
pub struct Component {
    name: String,
    states: Vec<StateName>,
    transitions: Vec<(StateName, EventName, StateName, Vec<String>)>,
    on_enter: HashMap<StateName, Vec<NamedHook>>,
    on_exit: HashMap<StateName, Vec<NamedHook>>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn state(mut self, name: impl Into<StateName>) -> Self {
        self.states.push(name.into());
        self
    }

    pub fn transition(
        mut self,
        from: impl Into<StateName>,
        event: impl Into<EventName>,
        to: impl Into<StateName>,
        guard_refs: Vec<String>,
    ) -> Self {
        self.transitions.push((from.into(), event.into(), to.into(), guard_refs));
        self
    }

    pub fn on_enter(mut self, state: impl Into<StateName>, name: impl Into<String>, hook: HookFn) -> Self {
        self.on_enter
            .entry(state.into())
            .or_default()
            .push(NamedHook { name: name.into(), run: hook });
        self
    }

    pub fn on_exit(mut self, state: impl Into<StateName>, name: impl Into<String>, hook: HookFn) -> Self {
        self.on_exit
            .entry(state.into())
            .or_default()
            .push(NamedHook { name: name.into(), run: hook });
        self
    }
}

/// Declaration-order, non-vetoing before/after observer attached to every
/// transition of a kind.
pub struct Plugin {
    pub name: String,
    pub before_transition: Option<PluginHookFn>,
    pub after_transition: Option<PluginHookFn>,
}

/// An immutable, fully-merged and validated FSM kind.
pub struct Kind {
    pub(crate) name: String,
    states: HashSet<StateName>,
    initial_state: StateName,
    transitions: HashMap<(StateName, EventName), Transition>,
    on_enter: HashMap<StateName, Vec<NamedHook>>,
    on_exit: HashMap<StateName, Vec<NamedHook>>,
    entry_effects: HashMap<StateName, Effect>,
    plugins: Vec<Plugin>,
    external_handler: Option<ExternalHandlerFn>,
}

impl Kind {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &StateName {
        &self.initial_state
    }

    pub fn states(&self) -> impl Iterator<Item = &StateName> {
        self.states.iter()
    }

    /// All events declared for the kind, deduplicated.
    pub fn events(&self) -> Vec<EventName> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (from, event) in self.transitions.keys() {
            let _ = from;
            if seen.insert(event.clone()) {
                out.push(event.clone());
            }
        }
        out
    }

    pub(crate) fn resolve(&self, from: &StateName, event: &EventName) -> Option<&Transition> {
        self.transitions.get(&(from.clone(), event.clone()))
    }

    /// Destinations reachable from `from` across all declared events.
    pub fn destinations(&self, from: &StateName) -> HashSet<StateName> {
        self.transitions
            .iter()
            .filter(|((state, _), _)| state == from)
            .map(|(_, t)| t.to.clone())
            .collect()
    }

    pub fn can(&self, from: &StateName, event: &EventName) -> bool {
        self.transitions.contains_key(&(from.clone(), event.clone()))
    }

    pub(crate) fn on_enter_hooks(&self, state: &StateName) -> &[NamedHook] {
        self.on_enter.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn on_exit_hooks(&self, state: &StateName) -> &[NamedHook] {
        self.on_exit.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    pub fn entry_effect(&self, state: &StateName) -> Option<&Effect> {
        self.entry_effects.get(state)
    }

    pub(crate) fn external_handler(&self) -> Option<&ExternalHandlerFn> {
        self.external_handler.as_ref()
    }
}

impl NamedHook {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run(&self, instance: Instance) -> Result<Instance, String> {
        (self.run)(instance)
    }
}

impl Transition {
    pub(crate) fn to(&self) -> &StateName {
        &self.to
    }

    pub(crate) fn guards(&self) -> &[NamedGuard] {
        &self.guards
    }
}

impl NamedGuard {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn check(&self, instance: &Instance, event: &EventName, data: &FsmData) -> Result<(), String> {
        (self.run)(instance, event, data)
    }
}

/// One `(to, guard_refs)` declaration attempt for a `(from, event)` key,
/// kept around until [`KindBuilder::build`] so duplicate destinations can
/// be reported instead of silently overwritten. Guard names are resolved
/// against the registered guard table at `build()` time, once every
/// `guard()` call has been seen, so an unknown name is a definition error
/// rather than a silently empty guard list.
struct TransitionDecl {
    to: StateName,
    guard_refs: Vec<String>,
}

/// Builder for [`Kind`].
pub struct KindBuilder {
    name: String,
    states: HashSet<StateName>,
    initial_state: Option<StateName>,
    transitions: HashMap<(StateName, EventName), Vec<TransitionDecl>>,
    on_enter: HashMap<StateName, Vec<NamedHook>>,
    on_exit: HashMap<StateName, Vec<NamedHook>>,
    entry_effects: HashMap<StateName, Effect>,
    guards: HashMap<String, GuardFn>,
    plugins: Vec<Plugin>,
    external_handler: Option<ExternalHandlerFn>,
}

impl KindBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: HashSet::new(),
            initial_state: None,
            transitions: HashMap::new(),
            on_enter: HashMap::new(),
            on_exit: HashMap::new(),
            entry_effects: HashMap::new(),
            guards: HashMap::new(),
            plugins: Vec::new(),
            external_handler: None,
        }
    }

    pub fn state(mut self, name: impl Into<StateName>) -> Self {
        self.states.insert(name.into());
        self
    }

    pub fn initial_state(mut self, name: impl Into<StateName>) -> Self {
        self.initial_state = Some(name.into());
        self
    }

    /// Registers a guard under `name`, resolvable by transitions via
    /// `guard_refs`.
    pub fn guard(mut self, name: impl Into<String>, guard: GuardFn) -> Self {
        self.guards.insert(name.into(), guard);
        self
    }

    pub fn transition(
        mut self,
        from: impl Into<StateName>,
        event: impl Into<EventName>,
        to: impl Into<StateName>,
        guard_refs: &[&str],
    ) -> Self {
        let from = from.into();
        let event = event.into();
        let to = to.into();
        let guard_refs = guard_refs.iter().map(|name| (*name).to_string()).collect();
        self.transitions
            .entry((from, event))
            .or_default()
            .push(TransitionDecl { to, guard_refs });
        self
    }

    pub fn on_enter(mut self, state: impl Into<StateName>, name: impl Into<String>, hook: HookFn) -> Self {
        self.on_enter
            .entry(state.into())
            .or_default()
            .push(NamedHook { name: name.into(), run: hook });
        self
    }

    pub fn on_exit(mut self, state: impl Into<StateName>, name: impl Into<String>, hook: HookFn) -> Self {
        self.on_exit
            .entry(state.into())
            .or_default()
            .push(NamedHook { name: name.into(), run: hook });
        self
    }

    /// Attaches the effect tree triggered on entry into `state`.
    pub fn entry_effect(mut self, state: impl Into<StateName>, effect: Effect) -> Self {
        self.entry_effects.insert(state.into(), effect);
        self
    }

    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn external_handler(mut self, handler: ExternalHandlerFn) -> Self {
        self.external_handler = Some(handler);
        self
    }

    /// Merges a [`Component`]'s states/transitions/hooks into this builder.
    /// States must be disjoint from what's already declared unless the
    /// caller explicitly calls [`KindBuilder::state`] again afterward to
    /// override.
    pub fn merge_component(mut self, component: Component) -> Result<Self, DefinitionError> {
        for state in &component.states {
            if !self.states.insert(state.clone()) {
                return Err(DefinitionError::DuplicateComponentState {
                    component: component.name.clone(),
                    state: state.as_str().to_string(),
                });
            }
        }
        for (from, event, to, guard_refs) in component.transitions {
            self.transitions
                .entry((from, event))
                .or_default()
                .push(TransitionDecl { to, guard_refs });
        }
        for (state, hooks) in component.on_enter {
            self.on_enter.entry(state).or_default().extend(hooks);
        }
        for (state, hooks) in component.on_exit {
            self.on_exit.entry(state).or_default().extend(hooks);
        }
        Ok(self)
    }

    /// Validates and freezes the definition.
    ///
    /// Multiple `(from, event, ·)` declarations are allowed: the first one
    /// declared wins, but declarations that disagree on the destination
    /// state are a definition-time error.
    pub fn build(self) -> Result<Kind, DefinitionError> {
        let initial_state = self
            .initial_state
            .ok_or_else(|| DefinitionError::UnknownInitialState(String::new()))?;
        if !self.states.contains(&initial_state) {
            return Err(DefinitionError::UnknownInitialState(
                initial_state.as_str().to_string(),
            ));
        }

        let mut transitions = HashMap::with_capacity(self.transitions.len());
        for ((from, event), decls) in self.transitions {
            let first = decls.first().expect("transition entries are never empty");
            if !self.states.contains(&first.to) {
                return Err(DefinitionError::UnknownTargetState {
                    from: from.as_str().to_string(),
                    event: event.as_str().to_string(),
                    to: first.to.as_str().to_string(),
                });
            }
            if decls.iter().any(|d| d.to != first.to) {
                return Err(DefinitionError::DuplicateTransition {
                    from: from.as_str().to_string(),
                    event: event.as_str().to_string(),
                });
            }
            let mut guards = Vec::with_capacity(first.guard_refs.len());
            for name in &first.guard_refs {
                let run = self.guards.get(name.as_str()).ok_or_else(|| DefinitionError::UnknownGuard {
                    from: from.as_str().to_string(),
                    event: event.as_str().to_string(),
                    guard: name.clone(),
                })?;
                guards.push(NamedGuard { name: name.clone(), run: run.clone() });
            }
            transitions.insert((from, event), Transition { to: first.to.clone(), guards });
        }

        Ok(Kind {
            name: self.name,
            states: self.states,
            initial_state,
            transitions,
            on_enter: self.on_enter,
            on_exit: self.on_exit,
            entry_effects: self.entry_effects,
            plugins: self.plugins,
            external_handler: self.external_handler,
        })
    }
}
