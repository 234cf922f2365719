//! Responses emitted by the sensor, decoded host-side.
//!
//! The emulator only builds these frames; this decoder is the host's view
//! of them, used by integration tests (and any probing tool) to assert on
//! the wire exactly as a real monitor would.

use crate::constants::*;
use crate::error::ProtocolError;
use crate::frame::{checksum, decode_co2_sample, decode_u14};
use crate::types::{DerivedParameterKind, GasCompensations, NackCode, ZeroStatus};

/// Frames the sensor sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A waveform frame: solicited (first frame after start-continuous) or
    /// unsolicited (continuous mode).
    Waveform(WaveformFrame),

    /// Negative acknowledgement.
    Nack(NackCode),

    /// Bare echo acknowledging stop-continuous.
    StopContinuous,

    /// Firmware revision string.
    Revision {
        /// Format sub-byte echoed from the request.
        format: u8,
        /// ASCII revision/build string.
        revision: String,
    },

    /// Sensor capability report.
    SensorCapabilities {
        /// Capability index echoed from the request.
        sci: u8,
        /// Capability value.
        capability: u8,
    },

    /// Settings item read-back.
    Settings(SettingsResponse),

    /// Zero calibration request status.
    Zero(ZeroStatus),

    /// Bare echo acknowledging the alarm latch reset.
    ResetNoBreath,
}

/// Contents of a waveform frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformFrame {
    /// Rolling 7-bit sync counter.
    pub sync: u8,
    /// Raw biased 14-bit CO2 value.
    pub co2_raw: u16,
    /// Derived-parameter block, present on the coarse interval.
    pub dpi: Option<DerivedParameter>,
}

impl WaveformFrame {
    /// The CO2 sample with scale and bias removed.
    pub fn co2(&self) -> f32 {
        decode_co2_sample(self.co2_raw)
    }
}

/// A decoded derived-parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedParameter {
    /// Status snapshot.
    Co2Status {
        /// Transient/alarm status byte.
        status1: u8,
        /// Persistent status byte.
        status2: u8,
        /// Reserved status byte, always zero.
        status3: u8,
    },
    /// End-tidal CO2.
    Etco2(u16),
    /// Respiratory rate.
    RespRate(u16),
    /// Inspired CO2.
    InspCo2(u16),
    /// Breath detected marker.
    BreathDetected,
}

/// Settings item read-back payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsResponse {
    /// Barometric pressure.
    BarometricPressure(u16),
    /// Gas temperature.
    GasTemperature(u16),
    /// ETCO2 averaging time period.
    Etco2TimePeriod(u8),
    /// No-breath timeout.
    NoBreathTimeout(u8),
    /// CO2 display units.
    Co2Units(u8),
    /// Gas compensations.
    GasCompensations(GasCompensations),
    /// Sensor part number string.
    PartNumber(String),
    /// Link handshake byte.
    Handshake(u8),
    /// The requested item is not supported.
    UnknownItem,
}

impl Response {
    /// Decode a complete frame received from the sensor.
    ///
    /// Verifies the length field and the checksum before interpreting the
    /// payload.
    pub fn decode(frame: &[u8]) -> Result<Response, ProtocolError> {
        if frame.len() < 3 {
            return Err(ProtocolError::FrameTooShort {
                expected: 3,
                actual: frame.len(),
            });
        }
        let declared = frame[1] as usize + 2;
        if declared != frame.len() {
            return Err(ProtocolError::LengthMismatch {
                declared,
                actual: frame.len(),
            });
        }
        let residue = checksum(frame);
        if residue != 0 {
            return Err(ProtocolError::ChecksumMismatch(residue));
        }

        let cmd = frame[0];
        let payload = &frame[2..frame.len() - 1];

        match cmd {
            CMD_CO2_WAVEFORM => decode_waveform(payload).map(Response::Waveform),

            CMD_NACK => match payload.first() {
                Some(&code) => Ok(Response::Nack(NackCode::from(code))),
                None => Err(ProtocolError::MalformedResponse { command: cmd }),
            },

            CMD_STOP_CONTINUOUS => Ok(Response::StopContinuous),

            CMD_GET_REVISION => match payload.split_first() {
                Some((&format, text)) => Ok(Response::Revision {
                    format,
                    revision: String::from_utf8(text.to_vec())
                        .map_err(|_| ProtocolError::InvalidUtf8)?,
                }),
                None => Err(ProtocolError::MalformedResponse { command: cmd }),
            },

            CMD_SENSOR_CAPS => match *payload {
                [sci, capability] => Ok(Response::SensorCapabilities { sci, capability }),
                _ => Err(ProtocolError::MalformedResponse { command: cmd }),
            },

            CMD_GET_SET_SETTINGS => decode_settings(payload).map(Response::Settings),

            CMD_ZERO => match payload.first() {
                Some(&status) => Ok(Response::Zero(ZeroStatus::from(status))),
                None => Err(ProtocolError::MalformedResponse { command: cmd }),
            },

            CMD_RESET_NO_BREATH => Ok(Response::ResetNoBreath),

            _ => Err(ProtocolError::UnknownResponse(cmd)),
        }
    }
}

fn decode_waveform(payload: &[u8]) -> Result<WaveformFrame, ProtocolError> {
    let malformed = ProtocolError::MalformedResponse {
        command: CMD_CO2_WAVEFORM,
    };
    let (&sync, rest) = payload.split_first().ok_or(malformed.clone())?;
    let [high, low, rest @ ..] = rest else {
        return Err(malformed);
    };
    let co2_raw = decode_u14(*high, *low);

    let dpi = match rest {
        [] => None,
        [code, data @ ..] => {
            let kind = DerivedParameterKind::from_code(*code).ok_or(malformed.clone())?;
            Some(decode_derived_parameter(kind, data).ok_or(malformed)?)
        }
    };

    Ok(WaveformFrame { sync, co2_raw, dpi })
}

fn decode_derived_parameter(kind: DerivedParameterKind, data: &[u8]) -> Option<DerivedParameter> {
    match kind {
        DerivedParameterKind::Co2Status => match *data {
            [status1, status2, status3, _, _] => Some(DerivedParameter::Co2Status {
                status1,
                status2,
                status3,
            }),
            _ => None,
        },
        DerivedParameterKind::Etco2 => decode_u14_value(data).map(DerivedParameter::Etco2),
        DerivedParameterKind::RespRate => decode_u14_value(data).map(DerivedParameter::RespRate),
        DerivedParameterKind::InspCo2 => decode_u14_value(data).map(DerivedParameter::InspCo2),
        DerivedParameterKind::BreathDetected => Some(DerivedParameter::BreathDetected),
    }
}

fn decode_settings(payload: &[u8]) -> Result<SettingsResponse, ProtocolError> {
    let malformed = ProtocolError::MalformedResponse {
        command: CMD_GET_SET_SETTINGS,
    };
    let (&item, data) = payload.split_first().ok_or(malformed.clone())?;
    match item {
        ISB_UNKNOWN => Ok(SettingsResponse::UnknownItem),
        ISB_BAROMETRIC_PRESSURE => decode_u14_value(data)
            .map(SettingsResponse::BarometricPressure)
            .ok_or(malformed),
        ISB_GAS_TEMPERATURE => decode_u14_value(data)
            .map(SettingsResponse::GasTemperature)
            .ok_or(malformed),
        ISB_ETCO2_TIME_PERIOD => data
            .first()
            .map(|&v| SettingsResponse::Etco2TimePeriod(v))
            .ok_or(malformed),
        ISB_NO_BREATH_TIMEOUT => data
            .first()
            .map(|&v| SettingsResponse::NoBreathTimeout(v))
            .ok_or(malformed),
        ISB_CO2_UNITS => data
            .first()
            .map(|&v| SettingsResponse::Co2Units(v))
            .ok_or(malformed),
        ISB_GAS_COMPENSATIONS => match *data {
            [o2, balance_gas, high, low] => {
                Ok(SettingsResponse::GasCompensations(GasCompensations {
                    o2,
                    balance_gas,
                    anesthetic_agent: decode_u14(high, low),
                }))
            }
            _ => Err(malformed),
        },
        ISB_PART_NUMBER => Ok(SettingsResponse::PartNumber(
            String::from_utf8(data.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?,
        )),
        ISB_HANDSHAKE => data
            .first()
            .map(|&v| SettingsResponse::Handshake(v))
            .ok_or(malformed),
        _ => Err(ProtocolError::MalformedResponse {
            command: CMD_GET_SET_SETTINGS,
        }),
    }
}

fn decode_u14_value(data: &[u8]) -> Option<u16> {
    match *data {
        [high, low] => Some(decode_u14(high, low)),
        _ => None,
    }
}
