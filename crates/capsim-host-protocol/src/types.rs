//! Shared protocol value types.

use crate::constants::*;

// ============================================================================
// NACK Codes
// ============================================================================

/// Reason codes carried by NACK frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackCode {
    /// Command byte not recognized.
    InvalidCommand,
    /// Frame checksum did not verify.
    Checksum,
    /// Inter-byte timeout expired mid-frame.
    Timeout,
    /// Unknown reason code.
    Unknown(u8),
}

impl std::fmt::Display for NackCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NackCode::InvalidCommand => write!(f, "invalid command"),
            NackCode::Checksum => write!(f, "checksum error"),
            NackCode::Timeout => write!(f, "inter-byte timeout"),
            NackCode::Unknown(code) => write!(f, "unknown reason (0x{:02X})", code),
        }
    }
}

impl From<u8> for NackCode {
    fn from(code: u8) -> Self {
        match code {
            NACK_INVALID_CMD => NackCode::InvalidCommand,
            NACK_CHECKSUM => NackCode::Checksum,
            NACK_TIMEOUT => NackCode::Timeout,
            _ => NackCode::Unknown(code),
        }
    }
}

impl From<NackCode> for u8 {
    fn from(code: NackCode) -> Self {
        match code {
            NackCode::InvalidCommand => NACK_INVALID_CMD,
            NackCode::Checksum => NACK_CHECKSUM,
            NackCode::Timeout => NACK_TIMEOUT,
            NackCode::Unknown(code) => code,
        }
    }
}

// ============================================================================
// Zero Request Status
// ============================================================================

/// Application-level status returned by a zero calibration request.
///
/// These are not NACKs: a rejected request still gets a well-formed zero
/// response so the host UI can react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroStatus {
    /// Cycle accepted and started.
    Accepted,
    /// Rejected: compensations have never been configured.
    NotReady,
    /// Rejected: a cycle is already running.
    AlreadyInProgress,
    /// Unknown status code.
    Unknown(u8),
}

impl From<u8> for ZeroStatus {
    fn from(code: u8) -> Self {
        match code {
            ZERO_ACCEPTED => ZeroStatus::Accepted,
            ZERO_NOT_READY => ZeroStatus::NotReady,
            ZERO_IN_PROGRESS => ZeroStatus::AlreadyInProgress,
            _ => ZeroStatus::Unknown(code),
        }
    }
}

impl From<ZeroStatus> for u8 {
    fn from(status: ZeroStatus) -> Self {
        match status {
            ZeroStatus::Accepted => ZERO_ACCEPTED,
            ZeroStatus::NotReady => ZERO_NOT_READY,
            ZeroStatus::AlreadyInProgress => ZERO_IN_PROGRESS,
            ZeroStatus::Unknown(code) => code,
        }
    }
}

// ============================================================================
// Derived Parameters
// ============================================================================

/// Which derived-parameter block a waveform frame carries.
///
/// In continuous mode the sensor rotates through the first four kinds, one
/// step per coarse parameter interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedParameterKind {
    /// Status snapshot: three status bytes plus two zero bytes.
    Co2Status,
    /// End-tidal CO2.
    Etco2,
    /// Respiratory rate.
    RespRate,
    /// Inspired CO2.
    InspCo2,
    /// Breath detected marker.
    BreathDetected,
}

impl DerivedParameterKind {
    /// The wire code for this kind.
    pub fn code(self) -> u8 {
        match self {
            DerivedParameterKind::Co2Status => DPI_CO2_STATUS,
            DerivedParameterKind::Etco2 => DPI_ETCO2,
            DerivedParameterKind::RespRate => DPI_RESP_RATE,
            DerivedParameterKind::InspCo2 => DPI_INSP_CO2,
            DerivedParameterKind::BreathDetected => DPI_BREATH_DETECTED,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            DPI_CO2_STATUS => Some(DerivedParameterKind::Co2Status),
            DPI_ETCO2 => Some(DerivedParameterKind::Etco2),
            DPI_RESP_RATE => Some(DerivedParameterKind::RespRate),
            DPI_INSP_CO2 => Some(DerivedParameterKind::InspCo2),
            DPI_BREATH_DETECTED => Some(DerivedParameterKind::BreathDetected),
            _ => None,
        }
    }

    /// The rotation the sensor cycles through in continuous mode.
    pub const ROTATION: [DerivedParameterKind; 4] = [
        DerivedParameterKind::Co2Status,
        DerivedParameterKind::Etco2,
        DerivedParameterKind::RespRate,
        DerivedParameterKind::InspCo2,
    ];
}

/// Gas compensation values carried by settings item 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasCompensations {
    /// O2 compensation, percent.
    pub o2: u8,
    /// Balance gas selector.
    pub balance_gas: u8,
    /// Anesthetic agent concentration, 14-bit scaled.
    pub anesthetic_agent: u16,
}
