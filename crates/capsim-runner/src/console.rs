//! Operator console.
//!
//! Line-based commands on stdin for adjusting the simulated waveform and
//! alarm thresholds at runtime, and for persisting them. The console never
//! touches protocol-invariant device state directly; it only reads it for
//! the `status` display.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use capsim_sensor::SensorEngine;
use crossbeam_channel::{Receiver, Sender};

use crate::alarms::AlarmManager;
use crate::config::ConfigStore;
use crate::waveform::SineWaveform;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Show the command summary.
    Help,
    /// Show current waveform, alarm, and device state.
    Status,
    /// Set the waveform amplitude, mmHg.
    Amplitude(f32),
    /// Set the waveform frequency, Hz.
    Frequency(f32),
    /// Set the waveform baseline, mmHg.
    Baseline(f32),
    /// Set the waveform phase, degrees.
    Phase(f32),
    /// Set the high alarm threshold, mmHg.
    AlarmHigh(f32),
    /// Set the low alarm threshold, mmHg.
    AlarmLow(f32),
    /// Enable or disable the high alarm.
    AlarmHighEnabled(bool),
    /// Enable or disable the low alarm.
    AlarmLowEnabled(bool),
    /// Persist the current settings.
    Save,
    /// Reload settings from the store.
    Load,
    /// Delete the persisted settings.
    Clear,
}

/// Parse one console line. Returns `None` for unknown or incomplete input.
pub fn parse_line(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim().to_lowercase();
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let arg = parts.next();

    let float_arg = || arg.and_then(|a| a.parse::<f32>().ok());
    let flag_arg = || arg.and_then(|a| a.parse::<i32>().ok()).map(|v| v != 0);

    match cmd {
        "help" => Some(ConsoleCommand::Help),
        "status" => Some(ConsoleCommand::Status),
        "amp" => float_arg().map(ConsoleCommand::Amplitude),
        "freq" => float_arg().map(ConsoleCommand::Frequency),
        "base" => float_arg().map(ConsoleCommand::Baseline),
        "phase" => float_arg().map(ConsoleCommand::Phase),
        "high" => float_arg().map(ConsoleCommand::AlarmHigh),
        "low" => float_arg().map(ConsoleCommand::AlarmLow),
        "highen" => flag_arg().map(ConsoleCommand::AlarmHighEnabled),
        "lowen" => flag_arg().map(ConsoleCommand::AlarmLowEnabled),
        "save" => Some(ConsoleCommand::Save),
        "load" => Some(ConsoleCommand::Load),
        "clear" => Some(ConsoleCommand::Clear),
        _ => None,
    }
}

/// The command summary shown by `help` and at startup.
pub fn help_text() -> String {
    [
        "=== CapSim Commands ===",
        "Wave: amp/freq/base/phase <value>",
        "Alarm: high/low/highen/lowen <value>",
        "Config: save/load/clear",
        "Info: status/help",
    ]
    .join("\n")
}

/// Render the `status` display.
pub fn status_text(engine: &SensorEngine<SineWaveform, AlarmManager>) -> String {
    let wave = engine.waveform();
    let alarms = engine.alarms();
    let state = engine.state();

    format!(
        "=== Current Settings ===\n\
         Waveform: amp={} freq={} base={} phase={}\n\
         Alarms: high={}{} low={}{}\n\
         Device: {} init={}",
        wave.amplitude(),
        wave.frequency(),
        wave.baseline(),
        wave.phase().to_degrees(),
        alarms.high_threshold(),
        if alarms.is_high_enabled() { " (ON)" } else { " (OFF)" },
        alarms.low_threshold(),
        if alarms.is_low_enabled() { " (ON)" } else { " (OFF)" },
        if state.is_continuous_mode() { "CONTINUOUS" } else { "IDLE" },
        if state.is_initialized() { "YES" } else { "NO" },
    )
}

/// Apply a command to the running emulator, returning the text to print.
pub fn apply(
    command: ConsoleCommand,
    engine: &mut SensorEngine<SineWaveform, AlarmManager>,
    store: &ConfigStore,
) -> String {
    match command {
        ConsoleCommand::Help => help_text(),
        ConsoleCommand::Status => status_text(engine),
        ConsoleCommand::Amplitude(value) => {
            engine.waveform_mut().set_amplitude(value);
            format!("Amplitude: {value}")
        }
        ConsoleCommand::Frequency(value) => {
            engine.waveform_mut().set_frequency(value);
            format!("Frequency: {value}")
        }
        ConsoleCommand::Baseline(value) => {
            engine.waveform_mut().set_baseline(value);
            format!("Baseline: {value}")
        }
        ConsoleCommand::Phase(degrees) => {
            engine.waveform_mut().set_phase(degrees.to_radians());
            format!("Phase: {degrees}")
        }
        ConsoleCommand::AlarmHigh(value) => {
            engine.alarms_mut().set_high_threshold(value);
            format!("High alarm: {value}")
        }
        ConsoleCommand::AlarmLow(value) => {
            engine.alarms_mut().set_low_threshold(value);
            format!("Low alarm: {value}")
        }
        ConsoleCommand::AlarmHighEnabled(enable) => {
            engine.alarms_mut().enable_high(enable);
            format!("High alarm {}", if enable { "enabled" } else { "disabled" })
        }
        ConsoleCommand::AlarmLowEnabled(enable) => {
            engine.alarms_mut().enable_low(enable);
            format!("Low alarm {}", if enable { "enabled" } else { "disabled" })
        }
        ConsoleCommand::Save => {
            let mut config = store.load();
            engine.waveform().store_config(&mut config);
            engine.alarms().store_config(&mut config);
            match store.save(&config) {
                Ok(()) => "Configuration saved".to_string(),
                Err(err) => format!("Save failed: {err}"),
            }
        }
        ConsoleCommand::Load => {
            let config = store.load();
            engine.waveform_mut().apply_config(&config);
            engine.alarms_mut().apply_config(&config);
            status_text(engine)
        }
        ConsoleCommand::Clear => match store.clear() {
            Ok(()) => "Configuration cleared".to_string(),
            Err(err) => format!("Clear failed: {err}"),
        },
    }
}

/// Non-blocking stdin console.
///
/// A helper thread reads lines and feeds a channel the control loop drains
/// once per iteration, so the loop never blocks on the terminal.
pub struct Console {
    lines: Receiver<String>,
}

impl Console {
    /// Spawn the stdin reader thread.
    pub fn spawn(running: Arc<AtomicBool>) -> Self {
        let (sender, lines) = crossbeam_channel::unbounded();
        std::thread::spawn(move || read_stdin(sender, running));
        Console { lines }
    }

    /// Take the next pending line, if any.
    pub fn try_line(&self) -> Option<String> {
        self.lines.try_recv().ok()
    }
}

fn read_stdin(sender: Sender<String>, running: Arc<AtomicBool>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if !running.load(Ordering::Relaxed) {
            return;
        }
        match line {
            Ok(line) if !line.trim().is_empty() => {
                if sender.send(line).is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(_) => return,
        }
    }
}
