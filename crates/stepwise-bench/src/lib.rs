//! Benchmark profiles for the Stepwise simulation core.
//!
//! - [`wide_state_value`]: a restricted-JSON document shaped like a large save
//! - [`command_script`]: a deterministic mix of fixture commands
//! - [`recorded_replay`]: a replay of [`command_script`] over many steps

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use stepwise_core::{Command, Step, Value};
use stepwise_replay::{ExportOptions, RecordingSession, ReplayError, SimReplay};
use stepwise_test_utils::{collect, default_runtime, forage, purchase, MINE};

/// An object with `entries` resource-like children, each carrying a few
/// numeric fields and a nested array.
pub fn wide_state_value(entries: usize) -> Value {
    let items = (0..entries).map(|i| {
        let amount = i as f64 * 1.5;
        (
            format!("resource-{i:05}"),
            Value::object([
                ("amount", Value::from(amount)),
                ("capacity", Value::from(1_000_000.0)),
                ("unlocked", Value::from(i % 3 != 0)),
                (
                    "history",
                    Value::Array((0..4).map(|h| Value::from((h * i) as f64)).collect()),
                ),
            ]),
        )
    });
    Value::object(items)
}

/// `count` commands spread over `count / 4` steps: mostly collects, with
/// periodic purchases and forages.
pub fn command_script(count: usize) -> Vec<Command> {
    (0..count)
        .map(|i| {
            let step = (i / 4) as u64;
            match i % 8 {
                3 => purchase(MINE, 1, step),
                5 => forage(step),
                _ => collect(2.0, step),
            }
        })
        .collect()
}

/// Record [`command_script`] of `commands` entries, run to `steps`, and
/// export.
pub fn recorded_replay(commands: usize, steps: u64) -> Result<SimReplay, ReplayError> {
    let mut session = RecordingSession::start(default_runtime())?;
    for command in command_script(commands) {
        session.enqueue(command)?;
    }
    session.run_until(Step(steps))?;
    session.export(&ExportOptions::default())
}
