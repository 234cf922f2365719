//! CapSim Host-Link Protocol
//!
//! This crate provides types and utilities for the byte-oriented serial
//! protocol spoken between a capnography (CO2) sensor and its host monitor.
//! The emulator uses it device-side; the decoders for sensor responses let
//! tests and tooling act as the host.
//!
//! # Protocol Overview
//!
//! Every message is a frame:
//!
//! ```text
//! +---------+--------------+-------------+----------+
//! | command | length field | payload ... | checksum |
//! +---------+--------------+-------------+----------+
//! ```
//!
//! - The **command** byte is the only byte with its top bit set; it doubles
//!   as the frame-start marker on the wire.
//! - The **length field** is one plus the payload length, so the total frame
//!   length is the length field plus two.
//! - The **checksum** makes the whole frame sum to zero modulo 128.
//! - Values wider than 7 bits travel as two 7-bit halves, high half first.
//!
//! Traffic is request/response, except that in continuous mode the sensor
//! also emits unsolicited waveform frames on a fixed cadence.
//!
//! # Example
//!
//! ```rust,ignore
//! use capsim_host_protocol::{Command, FrameBuilder, FrameReceiver};
//!
//! // Build a response frame
//! let mut builder = FrameBuilder::command(0x84);
//! builder.push(1);
//! builder.push_u14(760);
//! let frame = builder.finalize()?;
//!
//! // Reassemble and decode an incoming frame
//! let mut receiver = FrameReceiver::new();
//! for byte in incoming {
//!     if let Some(event) = receiver.push_byte(byte, now_ms) {
//!         // dispatch the frame or answer the timeout
//!     }
//! }
//! ```

mod commands;
mod constants;
mod error;
mod frame;
mod receiver;
mod responses;
mod types;

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use receiver::*;
pub use responses::*;
pub use types::*;
