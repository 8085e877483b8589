//! Scene control over an in-process loopback stream.
//!
//! Demonstrates:
//! - Building a session over a channel transport
//! - Waiting for the stream lifecycle to report connected
//! - Issuing typed commands and awaiting their responses
//! - Receiving the inference completion signal
//! - A request that times out because the remote never answers
//!
//! Usage:
//!   cargo run --example scene_control
//!   cargo run --example scene_control -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use stream_remote::{
    ChannelPeer, ChannelTransport, LifecycleEvent, LifecycleStatus, SceneControl, Session,
};

// ============================================================================
// Constants
// ============================================================================

/// Command the simulated remote ignores.
const SILENT_COMMAND: &str = "set_wind_speed";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    println!("=== Scene Control (loopback) ===\n");

    let (transport, peer) = ChannelTransport::pair();
    let session = Session::builder()
        .request_timeout(Duration::from_secs(2))
        .build(transport)?;
    let control = SceneControl::new(session.clone());

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    control.on_inference_complete(move |payload| {
        let _ = done_tx.send(payload);
    });

    let remote = tokio::spawn(simulate_remote(peer));

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Waiting for stream...");
    session
        .wait_connected(Duration::from_secs(5))
        .await
        .context("stream never connected")?;
    println!("    ✓ Status: {}\n", session.status());

    // ========================================================================
    // Commands
    // ========================================================================

    println!("[2] Selecting car 4...");
    let response = control.select_car(4).await?;
    println!("    ✓ Response: {response}\n");

    println!("[3] Moving slice plane...");
    control.set_slice_state("x").await?;
    control.set_slice_pos(0.25).await?;
    println!("    ✓ Slice at 25%\n");

    println!("[4] Executing Kit command...");
    let mut kwargs = Map::new();
    kwargs.insert("prim_type".into(), json!("Cube"));
    let ok = control
        .command_execute("CreateMeshPrimWithDefaultXform", kwargs)
        .await?;
    println!("    ✓ Executed: {ok}\n");

    // ========================================================================
    // Signals
    // ========================================================================

    println!("[5] Waiting for inference completion...");
    let payload = tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
        .await
        .context("no inference signal")?
        .context("signal handler dropped")?;
    println!("    ✓ Signal: {payload}\n");

    // ========================================================================
    // Timeout
    // ========================================================================

    println!("[6] Issuing a command nobody answers...");
    let pending = session.issue(SILENT_COMMAND, Map::new(), Duration::from_millis(300))?;
    match pending.await {
        Err(e) if e.is_timeout() => println!("    ✓ {e}\n"),
        other => anyhow::bail!("expected timeout, got {other:?}"),
    }

    session.dispose();
    drop(control);
    drop(session);
    remote.await.context("remote task panicked")?;

    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Simulated Remote
// ============================================================================

/// Plays the rendering server: reports the stream lifecycle, answers
/// requests and emits the inference signal after a car switch.
async fn simulate_remote(mut peer: ChannelPeer) {
    let _ = peer.lifecycle(LifecycleEvent::start(LifecycleStatus::InProgress));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = peer.lifecycle(LifecycleEvent::start(LifecycleStatus::Success));

    while let Some(request) = peer.recv().await {
        let command = request.command_name().unwrap_or_default().to_string();

        let response = match command.as_str() {
            SILENT_COMMAND => continue,
            "select_car" => json!({ "ok": true }),
            "command_execute" | "command_undo" => Value::Bool(true),
            _ => Value::Null,
        };

        if peer.respond(&request, response).is_err() {
            break;
        }

        if command == "select_car" {
            let _ = peer.signal("inference_complete", json!("inference_start"));
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "stream_remote=debug"
    } else {
        "stream_remote=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
