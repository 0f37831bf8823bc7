//! Relay patch walkthrough.
//!
//! Demonstrates:
//! - Class definition with inheritance and default handlers
//! - Mode wiring with attribute overrides
//! - Directed sends, wired fan-out, and `wait_for_signal`
//!
//! ```bash
//! cargo run --example relay
//! ```

use patchbay_node::{handler, ClassDef, NodeClass, NodeConfig, OutputSchema, Pin};
use patchbay_runtime::{ModeConfig, Router, RouterError};
use serde_json::{json, Value};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), RouterError> {
    fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_target(false)
        .init();

    println!("=== Patchbay Relay Example ===\n");

    // A source that forwards whatever value triggers it.
    let pulse = NodeClass::define(
        ClassDef::named("Pulse")
            .with_output(OutputSchema::new(["level"]))
            .on_input(
                "onTrigger",
                handler(|scope, payload| {
                    let reached = scope.emit("level", payload.clone());
                    println!("Pulse fired, reached {} consumer(s)", reached);
                    Ok(())
                }),
            ),
    )?;

    // A relay stage. The base class forwards unchanged by default;
    // Doubler overrides the handler to scale by its gain attribute.
    let stage = NodeClass::define(
        ClassDef::named("Stage")
            .with_output(OutputSchema::new(["level"]))
            .with_default(
                Pin::In,
                "onLevel",
                handler(|scope, payload| {
                    scope.emit("level", payload.clone());
                    Ok(())
                }),
            ),
    )?;
    let doubler = stage.extend(ClassDef::named("Doubler").on_input(
        "onLevel",
        handler(|scope, payload| {
            let gain = scope
                .attribute("gain")
                .and_then(|v| v.as_i64())
                .unwrap_or(1);
            let value = payload.get("value").and_then(Value::as_i64).unwrap_or(0);
            scope.emit("level", json!({ "value": value * gain }));
            Ok(())
        }),
    ))?;

    // A sink that remembers the last level it saw.
    let meter = NodeClass::define(ClassDef::named("Meter").on_input(
        "onLevel",
        handler(|scope, payload| {
            println!("Meter observed {}", payload);
            scope.set_attribute("last", payload.clone());
            Ok(())
        }),
    ))?;

    let router = Router::new();
    router.register_class(pulse)?;
    router.register_class(doubler)?;
    router.register_class(meter)?;

    let pulse_1 = router.create_instance("Pulse", NodeConfig::with_id("pulse-1"))?;
    router.create_instance("Doubler", NodeConfig::with_id("doubler-1"))?;
    let meter_1 = router.create_instance("Meter", NodeConfig::with_id("meter-1"))?;

    // Two wirings over the same instances.
    router.define_mode("direct", ModeConfig::new().wire("Pulse", ["Meter"]))?;
    router.define_mode(
        "boosted",
        ModeConfig::new()
            .wire("Pulse", ["Doubler"])
            .wire("Doubler", ["Meter"])
            .with_attribute("Doubler", "gain", json!(2)),
    )?;

    router.switch_mode("direct")?;
    router.init();
    router.start()?;

    println!("\n--- direct mode ---");
    router.send_to(&pulse_1, "trigger", json!({ "value": 5 }));
    let last = router.node(&meter_1).and_then(|node| node.attribute("last"));
    println!("meter-1 last = {:?}", last);

    println!("\n--- boosted mode ---");
    router.switch_mode("boosted")?;
    router.send_to(&pulse_1, "trigger", json!({ "value": 5 }));
    let last = router.node(&meter_1).and_then(|node| node.attribute("last"));
    println!("meter-1 last = {:?}", last);

    println!("\n--- waiting on a signal ---");
    let (answer, ()) = tokio::join!(
        router.wait_for_signal(&meter_1, "onPing", Duration::from_millis(500)),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            router.send_to(&meter_1, "ping", json!({ "from": "main" }));
        }
    );
    println!("wait_for_signal answered: {:?}", answer?);

    router.stop();
    println!("\n=== Complete ===");
    Ok(())
}
