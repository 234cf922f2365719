//! The `capsim` binary: a capnography sensor emulator on a TCP port.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use capsim_runner::alarms::AlarmManager;
use capsim_runner::config::ConfigStore;
use capsim_runner::console::{self, Console};
use capsim_runner::serial_link;
use capsim_runner::waveform::SineWaveform;
use capsim_sensor::SensorEngine;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Capnography sensor emulator.
///
/// Answers the sensor's serial protocol on a TCP port so a host monitor can
/// be exercised without hardware.
#[derive(Parser, Debug)]
#[command(name = "capsim", version)]
struct Args {
    /// TCP port exposing the emulated serial port.
    #[arg(long, default_value_t = 5331)]
    port: u16,

    /// Path of the persisted configuration file.
    #[arg(long, default_value = "capsim.json")]
    config: PathBuf,
}

/// Pause per control-loop iteration to avoid busy-waiting; well under the
/// 10 ms waveform cadence.
const MIN_SLEEP: Duration = Duration::from_millis(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let serial = serial_link::start(runtime.handle(), args.port)?;

    let store = ConfigStore::new(&args.config);
    let loaded = store.load();
    let mut waveform = SineWaveform::new();
    waveform.apply_config(&loaded);
    let mut alarms = AlarmManager::new();
    alarms.apply_config(&loaded);
    let mut engine = SensorEngine::new(waveform, alarms);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))?;
    }
    let console = Console::spawn(running.clone());

    println!("=== CapSim CO2 Sensor Emulator ===");
    println!("{}", console::help_text());
    println!("{}", console::status_text(&engine));

    let start = Instant::now();
    while running.load(Ordering::Relaxed) {
        let now_ms = start.elapsed().as_millis() as u64;

        // Drain the transport first so a pending request is answered before
        // the next unsolicited frame goes out.
        while let Some(chunk) = serial.try_recv() {
            for frame in engine.push_bytes(&chunk, now_ms) {
                serial.send(frame.as_bytes());
            }
        }

        if let Some(frame) = engine.tick(now_ms) {
            serial.send(frame.as_bytes());
        }

        while let Some(line) = console.try_line() {
            match console::parse_line(&line) {
                Some(command) => println!("{}", console::apply(command, &mut engine, &store)),
                None => println!("Unknown command. Type 'help'"),
            }
        }

        std::thread::sleep(MIN_SLEEP);
    }

    tracing::info!("shutting down");
    Ok(())
}
