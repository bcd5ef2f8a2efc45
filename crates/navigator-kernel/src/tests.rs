use std::sync::Arc;

use navigator_types::{FsmData, InstanceId, KindName, StateName, TenantId};
use serde_json::json;

use crate::instance::Instance;
use crate::kind::{ExternalSource, KindBuilder, Plugin};
use crate::navigator::{self, NavigatorEffect, TransitionError};

fn new_instance(state: &str) -> Instance {
    Instance::new(
        InstanceId::generate(),
        TenantId::from("acme"),
        KindName::from("door"),
        StateName::from(state),
        FsmData::new(),
    )
}

#[test]
fn duplicate_transition_same_destination_is_allowed() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .transition("open", "close", "closed", &[])
        .build()
        .expect("first-declared-wins, same destination");

    assert!(kind.can(&"open".into(), &"close".into()));
}

#[test]
fn duplicate_transition_different_destination_is_rejected() {
    let err = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .state("locked")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .transition("open", "close", "locked", &[])
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        crate::kind::DefinitionError::DuplicateTransition {.. }
    ));
}

#[test]
fn unknown_initial_state_is_rejected() {
    let err = KindBuilder::new("door")
        .state("open")
        .initial_state("nonexistent")
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        crate::kind::DefinitionError::UnknownInitialState(_)
    ));
}

#[test]
fn unknown_target_state_is_rejected() {
    let err = KindBuilder::new("door")
        .state("open")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        crate::kind::DefinitionError::UnknownTargetState {.. }
    ));
}

#[test]
fn transition_referencing_unregistered_guard_is_rejected() {
    let err = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &["never_registered"])
        .build()
        .unwrap_err();

    assert!(matches!(
        err,
        crate::kind::DefinitionError::UnknownGuard {.. }
    ));
}

#[test]
fn send_reports_no_transition_for_undeclared_event() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .build()
        .unwrap();

    let instance = new_instance("open");
    let instance_id = instance.id;
    let (err, unchanged) = navigator::send(&kind, instance, "lock".into(), FsmData::new())
        .unwrap_err();

    assert!(matches!(err, TransitionError::NoTransition {.. }));
    assert_eq!(unchanged.id, instance_id);
    assert_eq!(unchanged.current_state, StateName::from("open"));
    assert_eq!(unchanged.metadata.version, 0);
}

#[test]
fn send_denies_on_guard_failure_and_leaves_instance_unchanged() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .guard(
            "always_deny",
            Arc::new(|_instance, _event, _data| Err("never".to_string())),
        )
        .transition("open", "close", "closed", &["always_deny"])
        .build()
        .unwrap();

    let instance = new_instance("open");
    let (err, unchanged) = navigator::send(&kind, instance, "close".into(), FsmData::new())
        .unwrap_err();

    assert_eq!(
        err,
        TransitionError::GuardDenied {
            name: "always_deny".to_string()
        }
    );
    assert_eq!(unchanged.current_state, StateName::from("open"));
}

#[test]
fn send_commits_state_merges_data_and_bumps_version() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .build()
        .unwrap();

    let mut instance = new_instance("open");
    instance.data.insert("latch".to_string(), json!("manual"));

    let mut event_data = FsmData::new();
    event_data.insert("closed_by".to_string(), json!("sensor"));

    let (next, effects) = navigator::send(&kind, instance, "close".into(), event_data).unwrap();

    assert_eq!(next.current_state, StateName::from("closed"));
    assert_eq!(next.metadata.version, 1);
    assert_eq!(next.data.get("latch"), Some(&json!("manual")));
    assert_eq!(next.data.get("closed_by"), Some(&json!("sensor")));
    assert_eq!(next.performance.transition_count, 1);

    assert!(matches!(
        effects.first(),
        Some(NavigatorEffect::AppendTransition(_))
    ));
}

#[test]
fn send_rolls_back_and_produces_no_effects_when_on_enter_hook_fails() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .on_enter(
            "closed",
            "reject_entry",
            Arc::new(|_instance| Err("latch jammed".to_string())),
        )
        .build()
        .unwrap();

    let instance = new_instance("open");
    let original_version = instance.metadata.version;
    let (err, unchanged) = navigator::send(&kind, instance, "close".into(), FsmData::new())
        .unwrap_err();

    assert_eq!(
        err,
        TransitionError::HookFailed {
            name: "reject_entry".to_string()
        }
    );
    assert_eq!(unchanged.current_state, StateName::from("open"));
    assert_eq!(unchanged.metadata.version, original_version);
}

#[test]
fn send_runs_on_exit_before_on_enter() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let exit_order = Arc::clone(&order);
    let enter_order = Arc::clone(&order);

    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .on_exit(
            "open",
            "log_exit",
            Arc::new(move |instance| {
                exit_order.lock().unwrap().push("exit");
                Ok(instance)
            }),
        )
        .on_enter(
            "closed",
            "log_enter",
            Arc::new(move |instance| {
                enter_order.lock().unwrap().push("enter");
                Ok(instance)
            }),
        )
        .build()
        .unwrap();

    let instance = new_instance("open");
    navigator::send(&kind, instance, "close".into(), FsmData::new()).unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["exit", "enter"]);
}

#[test]
fn plugin_before_hook_cannot_veto_but_can_annotate() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .plugin(Plugin {
            name: "audit".to_string(),
            before_transition: Some(Arc::new(|mut instance| {
                instance
                    .data
                    .insert("audited".to_string(), json!(true));
                instance
            })),
            after_transition: None,
        })
        .build()
        .unwrap();

    let instance = new_instance("open");
    let (next, _effects) = navigator::send(&kind, instance, "close".into(), FsmData::new()).unwrap();

    assert_eq!(next.data.get("audited"), Some(&json!(true)));
    assert_eq!(next.current_state, StateName::from("closed"));
}

#[test]
fn send_notifies_subscribers_when_present() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .build()
        .unwrap();

    let mut instance = new_instance("open");
    let subscriber = InstanceId::generate();
    instance.subscribe(subscriber);

    let (_next, effects) = navigator::send(&kind, instance, "close".into(), FsmData::new()).unwrap();

    let notified = effects.iter().any(|effect| {
        matches!(
            effect,
            NavigatorEffect::NotifySubscribers { subscribers,.. }
                if subscribers.contains(&subscriber)
        )
    });
    assert!(notified);
}

#[test]
fn can_and_destinations_reflect_declared_transitions() {
    let kind = KindBuilder::new("door")
        .state("open")
        .state("closed")
        .state("locked")
        .initial_state("open")
        .transition("open", "close", "closed", &[])
        .transition("closed", "lock", "locked", &[])
        .build()
        .unwrap();

    let instance = new_instance("open");
    assert!(navigator::can(&kind, &instance, &"close".into()));
    assert!(!navigator::can(&kind, &instance, &"lock".into()));

    let destinations = navigator::destinations(&kind, &instance);
    assert!(destinations.contains(&StateName::from("closed")));
    assert!(!destinations.contains(&StateName::from("locked")));
}

#[test]
fn handle_external_returns_instance_unchanged_when_handler_panics() {
    let kind = KindBuilder::new("door")
        .state("open")
        .initial_state("open")
        .external_handler(Arc::new(|_instance, _source, _event_type, _data| {
            panic!("boom")
        }))
            .build()
            .unwrap();

    let instance = new_instance("open");
    let instance_id = instance.id;
    let source = ExternalSource {
        kind: "door".to_string(),
        instance_id,
    };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        navigator::handle_external(&kind, instance, &source, "ping", &FsmData::new())
    }))
        .expect("handle_external must itself not panic");

    assert_eq!(result.id, instance_id);
    assert_eq!(result.current_state, StateName::from("open"));
}

#[test]
fn subscribe_and_unsubscribe_mutate_subscriber_set() {
    let instance = new_instance("open");
    let other = InstanceId::generate();

    let instance = navigator::subscribe(instance, other);
    assert!(instance.subscribers.contains(&other));

    let instance = navigator::unsubscribe(instance, other);
    assert!(!instance.subscribers.contains(&other));
}
