//! Protocol constants
//!
//! These constants define the command codes, NACK codes, settings item
//! codes, and other wire-level values used by the emulated capnography
//! sensor's host-link protocol.

// ============================================================================
// Command Codes
// ============================================================================

// Every command byte has bit 7 set; it is the only frame-start marker on the
// wire, so no other frame byte may ever have its top bit set.

/// Request one waveform frame and enter continuous mode.
pub const CMD_CO2_WAVEFORM: u8 = 0x80;
/// Start a zero (calibration) cycle.
pub const CMD_ZERO: u8 = 0x82;
/// Get or set a settings item (multiplexed by an item sub-byte).
pub const CMD_GET_SET_SETTINGS: u8 = 0x84;
/// Negative acknowledgement (sensor → host only).
pub const CMD_NACK: u8 = 0xC8;
/// Stop continuous waveform streaming.
pub const CMD_STOP_CONTINUOUS: u8 = 0xC9;
/// Query the firmware revision string.
pub const CMD_GET_REVISION: u8 = 0xCA;
/// Query sensor capabilities.
pub const CMD_SENSOR_CAPS: u8 = 0xCB;
/// Reset the no-breath/alarm latch (clears status byte 1).
pub const CMD_RESET_NO_BREATH: u8 = 0xCC;

/// Mask of the frame-start bit carried only by command bytes.
pub const FRAME_START_MASK: u8 = 0x80;

// ============================================================================
// NACK Codes
// ============================================================================

/// Unrecognized command byte.
pub const NACK_INVALID_CMD: u8 = 1;
/// Frame checksum did not verify.
pub const NACK_CHECKSUM: u8 = 2;
/// Inter-byte timeout expired mid-frame.
pub const NACK_TIMEOUT: u8 = 3;

// ============================================================================
// Settings Item Codes (for CMD_GET_SET_SETTINGS)
// ============================================================================

/// Barometric pressure, 14-bit.
pub const ISB_BAROMETRIC_PRESSURE: u8 = 1;
/// Gas temperature, 14-bit.
pub const ISB_GAS_TEMPERATURE: u8 = 4;
/// ETCO2 averaging time period, 8-bit.
pub const ISB_ETCO2_TIME_PERIOD: u8 = 5;
/// No-breath timeout, 8-bit.
pub const ISB_NO_BREATH_TIMEOUT: u8 = 6;
/// CO2 display units, 8-bit.
pub const ISB_CO2_UNITS: u8 = 7;
/// Gas compensations: O2 (8-bit) + balance gas (8-bit) + agent (14-bit).
pub const ISB_GAS_COMPENSATIONS: u8 = 11;
/// Sensor part number string (read-only).
pub const ISB_PART_NUMBER: u8 = 18;
/// Link handshake byte (read-only, always 0x01).
pub const ISB_HANDSHAKE: u8 = 19;
/// Item code echoed back when the requested item is not supported.
pub const ISB_UNKNOWN: u8 = 0;

// ============================================================================
// Derived Parameter (DPI) Codes
// ============================================================================

/// Status snapshot: three status bytes followed by two zero bytes.
pub const DPI_CO2_STATUS: u8 = 1;
/// End-tidal CO2, 14-bit.
pub const DPI_ETCO2: u8 = 2;
/// Respiratory rate, 14-bit.
pub const DPI_RESP_RATE: u8 = 3;
/// Inspired CO2, 14-bit.
pub const DPI_INSP_CO2: u8 = 4;
/// Breath detected marker, no payload.
pub const DPI_BREATH_DETECTED: u8 = 5;

// ============================================================================
// Status Bits
// ============================================================================

/// Status byte 1: CO2 alarm threshold breached.
pub const STATUS1_ALARM: u8 = 0x08;
/// Status byte 2: environmental compensations never set.
pub const STATUS2_COMP_MISSING: u8 = 0x10;
/// Status byte 2: zero calibration in progress.
pub const STATUS2_ZERO_IN_PROGRESS: u8 = 0x0C;

// ============================================================================
// Zero Request Status Codes
// ============================================================================

/// Zero cycle accepted and started.
pub const ZERO_ACCEPTED: u8 = 0;
/// Rejected: compensations have never been configured.
pub const ZERO_NOT_READY: u8 = 1;
/// Rejected: a zero cycle is already running.
pub const ZERO_IN_PROGRESS: u8 = 2;

// ============================================================================
// Fixed Strings
// ============================================================================

/// Firmware revision/build string reported by CMD_GET_REVISION.
pub const REVISION_STRING: &str = "code-capno5-01 01/01/25 12:00:00";
/// Sensor part number reported by settings item 18.
pub const PART_NUMBER: &str = "1028494TL ";

// ============================================================================
// Encoding
// ============================================================================

/// Maximum frame size in bytes; matches the device's frame buffer.
pub const MAX_FRAME_SIZE: usize = 64;
/// Largest value representable in the two-byte 7-bit encoding.
pub const MAX_U14: u16 = 0x3FFF;
/// CO2 samples are scaled by this factor before encoding.
pub const CO2_SCALE: f32 = 100.0;
/// Bias added to scaled CO2 samples so encoded values stay non-negative.
pub const CO2_BIAS: i32 = 1000;

// ============================================================================
// Timing
// ============================================================================

/// Inter-byte gap that aborts an in-progress frame, in milliseconds.
pub const INTER_BYTE_TIMEOUT_MS: u64 = 500;
/// Duration of a zero calibration cycle, in milliseconds.
pub const ZERO_DURATION_MS: u64 = 2000;
/// Interval between unsolicited waveform frames in continuous mode.
pub const WAVEFORM_INTERVAL_MS: u64 = 10;
/// Interval between derived-parameter blocks attached to waveform frames.
pub const PARAM_INTERVAL_MS: u64 = 1000;
