//! The static per-process kind registry.
//!
//! Distinct from `navigator-registry`'s *instance* registry (component E):
//! this is the much smaller, rarely-written table of `Kind` definitions
//! (component D) that instances are created against.

use std::collections::HashMap;
use std::sync::Arc;

use navigator_types::KindName;

use crate::kind::Kind;

/// A `{name, states, events}` summary of a registered kind, returned by
/// `available_kinds()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSummary {
    pub name: String,
    pub states: Vec<String>,
    pub events: Vec<String>,
}

/// The process-wide map of registered [`Kind`]s.
#[derive(Default)]
pub struct KindRegistry {
    kinds: HashMap<KindName, Arc<Kind>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `kind`, returning a shared handle to it. Overwrites any
    /// previously-registered kind of the same name — callers are expected
    /// to register every kind once at process start before instances are
    /// created against it.
    pub fn register(&mut self, kind: Kind) -> Arc<Kind> {
        let handle = Arc::new(kind);
        self.kinds.insert(KindName::new(handle.name().to_string()), handle.clone());
        handle
    }

    pub fn get(&self, name: &KindName) -> Option<Arc<Kind>> {
        self.kinds.get(name).cloned()
    }

    pub fn contains(&self, name: &KindName) -> bool {
        self.kinds.contains_key(name)
    }

    /// A `{name, states, events}` summary per registered kind, sorted by name for stable output.
    pub fn available_kinds(&self) -> Vec<KindSummary> {
        let mut summaries: Vec<KindSummary> = self
            .kinds
            .values()
            .map(|kind| KindSummary {
                name: kind.name().to_string(),
                states: kind.states().map(|s| s.as_str().to_string()).collect(),
                events: kind.events().iter().map(|e| e.as_str().to_string()).collect(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use crate::kind::KindBuilder;

    use super::*;

    fn door_kind() -> Kind {
        KindBuilder::new("door")
            .state("open")
            .state("closed")
            .initial_state("closed")
            .transition("closed", "open_door", "open", &[])
            .transition("open", "close_door", "closed", &[])
            .build()
            .unwrap()
    }

    #[test]
    fn register_then_get_returns_the_same_kind() {
        let mut registry = KindRegistry::new();
        registry.register(door_kind());

        let handle = registry.get(&KindName::new("door")).unwrap();
        assert_eq!(handle.name(), "door");
    }

    #[test]
    fn get_unknown_kind_is_none() {
        let registry = KindRegistry::new();
        assert!(registry.get(&KindName::new("missing")).is_none());
    }

    #[test]
    fn available_kinds_summarizes_states_and_events() {
        let mut registry = KindRegistry::new();
        registry.register(door_kind());

        let summaries = registry.available_kinds();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "door");
        assert_eq!(summaries[0].states.len(), 2);
        assert!(summaries[0].events.contains(&"open_door".to_string()));
    }

    #[test]
    fn contains_reflects_registration() {
        let mut registry = KindRegistry::new();
        assert!(!registry.contains(&KindName::new("door")));
        registry.register(door_kind());
        assert!(registry.contains(&KindName::new("door")));
    }
}
