//! Integration tests for message routing.
//!
//! Covers contract validation at registration, wired fan-out under a
//! mode, the per-message cycle guard, and mode-variant dispatch, all
//! through the public `Router` API.

use patchbay_node::testing::{failing, signal_log, SignalLog};
use patchbay_node::{
    handler, ClassDef, CollectingSink, Handler, NodeClass, NodeConfig, OutputSchema, Pin,
};
use patchbay_runtime::{Delivery, ErrorSink, ModeConfig, Router};
use patchbay_types::ErrorCode;
use serde_json::json;
use std::sync::Arc;

// ============================================================
// Test Fixtures
// ============================================================

/// Handler that records `id:signal`, so cross-instance ordering is
/// visible in one log.
fn trail(log: &SignalLog) -> Handler {
    let log = Arc::clone(log);
    handler(move |scope, payload| {
        log.lock()
            .push((format!("{}:{}", scope.id(), scope.signal()), payload.clone()));
        Ok(())
    })
}

/// Handler that records a fixed tag, for telling base and subclass
/// handlers apart.
fn tagged(log: &SignalLog, tag: &str) -> Handler {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    handler(move |_, payload| {
        log.lock().push((tag.clone(), payload.clone()));
        Ok(())
    })
}

fn names(log: &SignalLog) -> Vec<String> {
    log.lock().iter().map(|(name, _)| name.clone()).collect()
}

/// Emits `forwarded` on every trigger and records how many consumers
/// the emission reached.
fn pulse_class() -> Arc<NodeClass> {
    NodeClass::define(
        ClassDef::named("Pulse")
            .with_output(OutputSchema::new(["forwarded"]))
            .on_input(
                "onTrigger",
                handler(|scope, payload| {
                    let reached = scope.emit("forwarded", payload.clone());
                    scope.set_attribute("reached", json!(reached));
                    Ok(())
                }),
            ),
    )
    .expect("Pulse class")
}

fn meter_class(log: &SignalLog) -> Arc<NodeClass> {
    NodeClass::define(ClassDef::named("Meter").on_input("onForwarded", trail(log)))
        .expect("Meter class")
}

fn start_patch(router: &Router) {
    router.init();
    router.start().expect("start");
}

// ============================================================
// Contract Validation
// ============================================================

#[test]
fn registering_with_unsatisfied_contract_fails() {
    let class = NodeClass::define(
        ClassDef::named("Strict")
            .require(Pin::In, "onFrame")
            .require(Pin::Lifecycle, "onInit"),
    )
    .expect("class builds fine; only registration validates");

    let router = Router::new();
    let err = router.register_class(class).expect_err("contract");

    assert_eq!(err.code(), "ROUTER_UNRESOLVED_CONTRACT");
    assert!(err.to_string().contains("in:onFrame"));
    assert!(err.to_string().contains("lifecycle:onInit"));
    assert_eq!(router.class_count(), 0);
}

#[test]
fn default_handler_satisfies_contract_and_runs() {
    let log = signal_log();
    let base = NodeClass::define(
        ClassDef::named("Strict")
            .require(Pin::In, "onFrame")
            .with_default(Pin::In, "onFrame", tagged(&log, "base")),
    )
    .expect("base");
    let sub = base
        .extend(ClassDef::named("Scoped"))
        .expect("subclass adds nothing");

    let router = Router::new();
    router.register_class(base).expect("base registers");
    router.register_class(sub).expect("subclass inherits the default");

    let id = router
        .create_instance("Scoped", NodeConfig::with_id("s-1"))
        .expect("instance");
    start_patch(&router);

    assert_eq!(router.send_to(&id, "frame", json!({})), Delivery::Delivered);
    assert_eq!(names(&log), ["base"]);
}

#[test]
fn subclass_override_shadows_inherited_default() {
    let log = signal_log();
    let base = NodeClass::define(
        ClassDef::named("Strict")
            .require(Pin::In, "onFrame")
            .with_default(Pin::In, "onFrame", tagged(&log, "base")),
    )
    .expect("base");
    let sub = base
        .extend(ClassDef::named("Scoped").on_input("onFrame", tagged(&log, "sub")))
        .expect("subclass");

    let router = Router::new();
    router.register_class(sub).expect("register");
    let id = router
        .create_instance("Scoped", NodeConfig::with_id("s-1"))
        .expect("instance");
    start_patch(&router);

    router.send_to(&id, "frame", json!({}));
    assert_eq!(names(&log), ["sub"]);
}

// ============================================================
// Instance Registry
// ============================================================

#[test]
fn duplicate_id_rejected_across_classes() {
    let log = signal_log();
    let router = Router::new();
    router.register_class(pulse_class()).expect("Pulse");
    router.register_class(meter_class(&log)).expect("Meter");

    router
        .create_instance("Pulse", NodeConfig::with_id("x-1"))
        .expect("first");
    let err = router
        .create_instance("Meter", NodeConfig::with_id("x-1"))
        .expect_err("ids are router-wide");

    assert_eq!(err.code(), "ROUTER_DUPLICATE_NODE");
    assert_eq!(router.node_count(), 1);
}

// ============================================================
// Wired Fan-Out
// ============================================================

#[test]
fn wired_emission_reaches_consumer_exactly_once() {
    let log = signal_log();
    let router = Router::new();
    router.register_class(pulse_class()).expect("Pulse");
    router.register_class(meter_class(&log)).expect("Meter");

    let pulse = router
        .create_instance("Pulse", NodeConfig::with_id("pulse-1"))
        .expect("pulse-1");
    router
        .create_instance("Meter", NodeConfig::with_id("meter-1"))
        .expect("meter-1");

    router
        .define_mode(
            "live",
            ModeConfig::new()
                .with_node("Pulse")
                .with_node("Meter")
                .wire("Pulse", ["Meter"]),
        )
        .expect("mode");
    router.switch_mode("live").expect("switch");
    start_patch(&router);

    let outcome = router.send_to(&pulse, "trigger", json!({ "level": 7 }));

    assert_eq!(outcome, Delivery::Delivered);
    let entries = log.lock().clone();
    assert_eq!(entries.len(), 1, "exactly one wired delivery");
    assert_eq!(entries[0].0, "meter-1:forwarded");
    assert_eq!(entries[0].1, json!({ "level": 7 }));

    let pulse_node = router.node(&pulse).expect("pulse node");
    assert_eq!(pulse_node.attribute("reached"), Some(json!(1)));
}

#[test]
fn fan_out_walks_instances_in_registration_order() {
    let log = signal_log();
    let router = Router::new();
    router.register_class(pulse_class()).expect("Pulse");
    router.register_class(meter_class(&log)).expect("Meter");

    let pulse = router
        .create_instance("Pulse", NodeConfig::with_id("pulse-1"))
        .expect("pulse-1");
    router
        .create_instance("Meter", NodeConfig::with_id("meter-1"))
        .expect("meter-1");
    router
        .create_instance("Meter", NodeConfig::with_id("meter-2"))
        .expect("meter-2");

    router
        .define_mode("live", ModeConfig::new().wire("Pulse", ["Meter"]))
        .expect("mode");
    router.switch_mode("live").expect("switch");
    start_patch(&router);

    router.send_to(&pulse, "trigger", json!({}));

    assert_eq!(names(&log), ["meter-1:forwarded", "meter-2:forwarded"]);
    let pulse_node = router.node(&pulse).expect("pulse node");
    assert_eq!(pulse_node.attribute("reached"), Some(json!(2)));
}

#[test]
fn unrouted_emissions_reach_nobody() {
    let log = signal_log();
    let router = Router::new();
    router.register_class(pulse_class()).expect("Pulse");
    router.register_class(meter_class(&log)).expect("Meter");

    let pulse = router
        .create_instance("Pulse", NodeConfig::with_id("pulse-1"))
        .expect("pulse-1");
    router
        .create_instance("Meter", NodeConfig::with_id("meter-1"))
        .expect("meter-1");
    start_patch(&router);

    // No mode selected at all.
    router.send_to(&pulse, "trigger", json!({}));
    let pulse_node = router.node(&pulse).expect("pulse node");
    assert_eq!(pulse_node.attribute("reached"), Some(json!(0)));

    // A mode that wires nothing for Pulse.
    router
        .define_mode("idle", ModeConfig::new().with_node("Meter"))
        .expect("mode");
    router.switch_mode("idle").expect("switch");
    router.send_to(&pulse, "trigger", json!({}));
    assert_eq!(pulse_node.attribute("reached"), Some(json!(0)));

    assert!(log.lock().is_empty());
}

#[test]
fn consumer_handler_error_is_caught_and_sunk() {
    let sink = Arc::new(CollectingSink::new());
    let flaky = NodeClass::define(
        ClassDef::named("Meter").on_input("onForwarded", failing("clipped")),
    )
    .expect("Meter");

    let router = Router::new().with_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>);
    router.register_class(pulse_class()).expect("Pulse");
    router.register_class(flaky).expect("Meter");

    let pulse = router
        .create_instance("Pulse", NodeConfig::with_id("pulse-1"))
        .expect("pulse-1");
    router
        .create_instance("Meter", NodeConfig::with_id("meter-1"))
        .expect("meter-1");
    router
        .define_mode("live", ModeConfig::new().wire("Pulse", ["Meter"]))
        .expect("mode");
    router.switch_mode("live").expect("switch");
    start_patch(&router);

    assert_eq!(router.send_to(&pulse, "trigger", json!({})), Delivery::Delivered);

    // The handler ran and failed; the failure went to the sink, not up
    // the dispatch chain.
    let pulse_node = router.node(&pulse).expect("pulse node");
    assert_eq!(pulse_node.attribute("reached"), Some(json!(1)));

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].node.as_str(), "meter-1");
    assert_eq!(reports[0].class, "Meter");
    assert_eq!(reports[0].handler, "onForwarded");
    assert_eq!(reports[0].code, "HANDLER_EXECUTION_FAILED");
    assert!(reports[0].reason.contains("clipped"));
}

// ============================================================
// Cycle Guard
// ============================================================

#[test]
fn self_wired_echo_runs_once_per_message() {
    let class = NodeClass::define(ClassDef::named("Echo").on_input(
        "onPing",
        handler(|scope, payload| {
            let n = scope
                .attribute("count")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            scope.set_attribute("count", json!(n + 1));
            let reached = scope.emit("ping", payload.clone());
            scope.set_attribute("reached", json!(reached));
            Ok(())
        }),
    ))
    .expect("Echo");

    let router = Router::new();
    router.register_class(class).expect("register");
    let echo = router
        .create_instance("Echo", NodeConfig::with_id("echo-1"))
        .expect("echo-1");
    router
        .define_mode("feedback", ModeConfig::new().wire("Echo", ["Echo"]))
        .expect("mode");
    router.switch_mode("feedback").expect("switch");
    start_patch(&router);

    router.send_to(&echo, "ping", json!({}));

    // One directed run plus one wired run; the wired run's re-emission
    // finds the instance already visited and stops. The wired run writes
    // reached=0 first, then the directed run's emit returns 1 over it.
    let node = router.node(&echo).expect("echo node");
    assert_eq!(node.attribute("count"), Some(json!(2)));
    assert_eq!(node.attribute("reached"), Some(json!(1)));

    // A fresh message restarts the cycle budget.
    router.send_to(&echo, "ping", json!({}));
    assert_eq!(node.attribute("count"), Some(json!(4)));
}

#[test]
fn two_instance_ring_terminates() {
    fn ring_class(name: &str, signal: &'static str) -> Arc<NodeClass> {
        NodeClass::define(ClassDef::named(name).on_input(
            "onPass",
            handler(move |scope, payload| {
                let n = scope
                    .attribute("count")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                scope.set_attribute("count", json!(n + 1));
                scope.emit(signal, payload.clone());
                Ok(())
            }),
        ))
        .expect("ring class")
    }

    let router = Router::new();
    router.register_class(ring_class("Left", "pass")).expect("Left");
    router.register_class(ring_class("Right", "pass")).expect("Right");

    let left = router
        .create_instance("Left", NodeConfig::with_id("left-1"))
        .expect("left-1");
    let right = router
        .create_instance("Right", NodeConfig::with_id("right-1"))
        .expect("right-1");

    router
        .define_mode(
            "ring",
            ModeConfig::new()
                .wire("Left", ["Right"])
                .wire("Right", ["Left"]),
        )
        .expect("mode");
    router.switch_mode("ring").expect("switch");
    start_patch(&router);

    router.send_to(&left, "pass", json!({}));

    // left runs directed, then again when the ring comes back around;
    // right runs once; the second lap finds both visited.
    let left_node = router.node(&left).expect("left node");
    let right_node = router.node(&right).expect("right node");
    assert_eq!(left_node.attribute("count"), Some(json!(2)));
    assert_eq!(right_node.attribute("count"), Some(json!(1)));
}

// ============================================================
// Mode-Variant Dispatch
// ============================================================

#[test]
fn mode_variant_handler_wins_while_active() {
    let log = signal_log();
    let class = NodeClass::define(
        ClassDef::named("Gate")
            .on_input("onFire", tagged(&log, "open"))
            .on_input("onNudge", tagged(&log, "nudge"))
            .mode_handler("muted", Pin::In, "onFire", tagged(&log, "muted")),
    )
    .expect("Gate");

    let router = Router::new();
    router.register_class(class).expect("register");
    let gate = router
        .create_instance("Gate", NodeConfig::with_id("gate-1"))
        .expect("gate-1");
    router
        .define_mode("muted", ModeConfig::new().with_node("Gate"))
        .expect("muted");
    router
        .define_mode("open", ModeConfig::new().with_node("Gate"))
        .expect("open");
    start_patch(&router);

    router.switch_mode("muted").expect("switch muted");
    router.send_to(&gate, "fire", json!({}));
    // The muted table lacks onNudge, so that signal falls back to the
    // unmoded handler.
    router.send_to(&gate, "nudge", json!({}));

    router.switch_mode("open").expect("switch open");
    router.send_to(&gate, "fire", json!({}));

    assert_eq!(names(&log), ["muted", "nudge", "open"]);
}

#[test]
fn broadcast_ignores_wiring_and_started_state() {
    let log = signal_log();
    let lifecycle = NodeClass::define(ClassDef::named("Lamp").on_lifecycle("onBlink", trail(&log)))
        .expect("Lamp");

    let router = Router::new();
    router.register_class(lifecycle).expect("register");
    router
        .create_instance("Lamp", NodeConfig::with_id("lamp-1"))
        .expect("lamp-1");
    router
        .create_instance("Lamp", NodeConfig::with_id("lamp-2"))
        .expect("lamp-2");
    start_patch(&router);
    router.stop();

    // Directed messages soft-fail once stopped, broadcasts still land.
    assert_eq!(router.broadcast("blink", json!({})), 2);
    assert_eq!(names(&log), ["lamp-1:blink", "lamp-2:blink"]);
}
