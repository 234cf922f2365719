//! # capsim-runner
//!
//! Hosting for the CapSim sensor emulator: the TCP serial bridge, the
//! simulated waveform and alarm collaborators, the persisted configuration,
//! and the operator console. The `capsim` binary wires these around a
//! [`capsim_sensor::SensorEngine`] in a single-threaded control loop.

pub mod alarms;
pub mod config;
pub mod console;
pub mod serial_link;
pub mod waveform;
