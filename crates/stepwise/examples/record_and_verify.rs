//! Record a short idle session, save and reload it, then verify its replay.
//!
//! Demonstrates:
//!   1. Driving a runtime through a `RecordingSession`
//!   2. Offline catch-up after a simulated suspension
//!   3. Gzip save round trip through the migration loader
//!   4. Exporting, encoding, decoding, and verifying a replay
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example record_and_verify

use std::error::Error;

use stepwise::prelude::*;
use stepwise::save::CompressionMethod;
use stepwise_test_utils::{
    build_runtime, collect, default_runtime, fixture_content, purchase, MINE,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ─── Play ───────────────────────────────────────────────────

    let mut session = RecordingSession::start(default_runtime())?;
    session.enqueue(collect(25.0, 0))?;
    session.enqueue(purchase(MINE, 2, 3))?;
    for frame in 0..20 {
        session.tick(16.0 * 3.0)?;
        if frame == 10 {
            session.enqueue(collect(5.0, session.runtime().current_step().0))?;
        }
    }
    // Back from a two-minute suspension.
    let catch_up = session.catch_up(120_000.0)?;
    println!(
        "caught up {} steps in {} batches, gold = {:.1}",
        catch_up.executed_steps,
        catch_up.batches,
        session.runtime().state().gold()
    );

    // ─── Save and reload ────────────────────────────────────────

    let save = serialize_save(session.runtime(), 1_700_000_000_000.0)?;
    let bytes = encode_save(&save, CompressionMethod::Gzip)?;
    let loaded = load_save(
        decode_save(&bytes)?,
        &MigrationRegistry::builtin(),
        &LoadOptions::default(),
    )?;
    let mut restored = build_runtime(RuntimeConfig::default(), fixture_content())?;
    hydrate_save(&loaded.document, &mut restored, &HydrateOptions::default())?;
    println!(
        "save: {} bytes, restored at step {}",
        bytes.len(),
        restored.current_step()
    );

    // ─── Replay ─────────────────────────────────────────────────

    let replay = session.export(&ExportOptions {
        captured_at: 1_700_000_000_000.0,
    })?;
    let text = encode_sim_replay_json_lines(&replay, &Default::default())?;
    let decoded = decode_sim_replay_json_lines(&text, &Default::default())?;
    let outcome = run_sim_replay(fixture_content(), &decoded, build_runtime)?;
    println!(
        "replay verified: {} commands over {} steps, checksum {}",
        outcome.commands, outcome.executed_steps, outcome.checksum
    );
    Ok(())
}
