//! Commands received from the host monitor.
//!
//! A command frame is decoded only after its checksum verifies; decoding
//! here is purely structural. An unknown command byte is an error (the
//! sensor answers with a NACK), while a recognized command with missing
//! sub-command bytes is also an error but is dropped without a reply,
//! matching the device's behavior.

use crate::constants::*;
use crate::error::ProtocolError;
use crate::frame::decode_u14;
use crate::types::GasCompensations;

/// Commands the host can send to the sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request one waveform frame and enter continuous mode.
    StartWaveform,

    /// Leave continuous mode.
    StopContinuous,

    /// Query the firmware revision string.
    GetRevision {
        /// Requested format sub-byte, echoed in the response.
        format: u8,
    },

    /// Query sensor capabilities.
    SensorCapabilities {
        /// Capability index.
        sci: u8,
        /// Optional capability sub-selector.
        scb: Option<u8>,
    },

    /// Get or set a settings item.
    Settings(SettingsRequest),

    /// Start a zero calibration cycle.
    Zero,

    /// Reset the no-breath/alarm latch.
    ResetNoBreath,
}

/// The settings item addressed by a get/set settings command.
///
/// A `Some` payload is a write followed by a read-back; `None` is a pure
/// read. Writes shorter than the item's field width are treated as reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsRequest {
    /// Barometric pressure, 14-bit.
    BarometricPressure(Option<u16>),
    /// Gas temperature, 14-bit.
    GasTemperature(Option<u16>),
    /// ETCO2 averaging time period, 8-bit.
    Etco2TimePeriod(Option<u8>),
    /// No-breath timeout, 8-bit.
    NoBreathTimeout(Option<u8>),
    /// CO2 display units, 8-bit.
    Co2Units(Option<u8>),
    /// Gas compensations (O2, balance gas, anesthetic agent).
    GasCompensations(Option<GasCompensations>),
    /// Sensor part number string (read-only).
    PartNumber,
    /// Link handshake byte (read-only).
    Handshake,
    /// An item code the sensor does not support.
    Unknown(u8),
}

impl Command {
    /// The command code for this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::StartWaveform => CMD_CO2_WAVEFORM,
            Command::StopContinuous => CMD_STOP_CONTINUOUS,
            Command::GetRevision { .. } => CMD_GET_REVISION,
            Command::SensorCapabilities { .. } => CMD_SENSOR_CAPS,
            Command::Settings(_) => CMD_GET_SET_SETTINGS,
            Command::Zero => CMD_ZERO,
            Command::ResetNoBreath => CMD_RESET_NO_BREATH,
        }
    }

    /// Decode a checksum-verified frame into a command.
    ///
    /// `frame` is the complete frame, command byte through checksum. The
    /// payload is everything between the length field and the checksum.
    pub fn decode(frame: &[u8]) -> Result<Command, ProtocolError> {
        if frame.len() < 2 {
            return Err(ProtocolError::FrameTooShort {
                expected: 2,
                actual: frame.len(),
            });
        }
        let cmd = frame[0];
        let payload = if frame.len() > 2 {
            &frame[2..frame.len() - 1]
        } else {
            &[][..]
        };

        match cmd {
            CMD_CO2_WAVEFORM => Ok(Command::StartWaveform),

            CMD_STOP_CONTINUOUS => Ok(Command::StopContinuous),

            CMD_GET_REVISION => match payload.first() {
                Some(&format) => Ok(Command::GetRevision { format }),
                None => Err(ProtocolError::MalformedCommand { command: cmd }),
            },

            CMD_SENSOR_CAPS => match *payload {
                [sci] => Ok(Command::SensorCapabilities { sci, scb: None }),
                [sci, scb] => Ok(Command::SensorCapabilities {
                    sci,
                    scb: Some(scb),
                }),
                _ => Err(ProtocolError::MalformedCommand { command: cmd }),
            },

            CMD_GET_SET_SETTINGS => match payload.split_first() {
                Some((&item, data)) => Ok(Command::Settings(decode_settings(item, data))),
                None => Err(ProtocolError::MalformedCommand { command: cmd }),
            },

            CMD_ZERO => Ok(Command::Zero),

            CMD_RESET_NO_BREATH => Ok(Command::ResetNoBreath),

            _ => Err(ProtocolError::UnknownCommand(cmd)),
        }
    }
}

fn decode_settings(item: u8, data: &[u8]) -> SettingsRequest {
    match item {
        ISB_BAROMETRIC_PRESSURE => SettingsRequest::BarometricPressure(decode_u14_write(data)),
        ISB_GAS_TEMPERATURE => SettingsRequest::GasTemperature(decode_u14_write(data)),
        ISB_ETCO2_TIME_PERIOD => SettingsRequest::Etco2TimePeriod(data.first().copied()),
        ISB_NO_BREATH_TIMEOUT => SettingsRequest::NoBreathTimeout(data.first().copied()),
        ISB_CO2_UNITS => SettingsRequest::Co2Units(data.first().copied()),
        ISB_GAS_COMPENSATIONS => SettingsRequest::GasCompensations(match *data {
            [o2, balance_gas, high, low, ..] => Some(GasCompensations {
                o2,
                balance_gas,
                anesthetic_agent: decode_u14(high, low),
            }),
            _ => None,
        }),
        ISB_PART_NUMBER => SettingsRequest::PartNumber,
        ISB_HANDSHAKE => SettingsRequest::Handshake,
        _ => SettingsRequest::Unknown(item),
    }
}

fn decode_u14_write(data: &[u8]) -> Option<u16> {
    match *data {
        [high, low, ..] => Some(decode_u14(high, low)),
        _ => None,
    }
}
