//! Command dispatch.
//!
//! Entry point for complete frames handed over by the frame receiver:
//! validates the checksum, decodes the command, mutates the session state
//! and/or consults the collaborators, and builds the response frame. Every
//! path yields at most one outgoing frame, and none is fatal: a bad frame
//! degrades to a NACK or a silent drop and the engine keeps receiving.

use capsim_host_protocol::{
    checksum, Command, DerivedParameterKind, Frame, FrameBuilder, NackCode, ProtocolError,
    SettingsRequest, ZeroStatus, CMD_CO2_WAVEFORM, CMD_GET_REVISION, CMD_GET_SET_SETTINGS,
    CMD_NACK, CMD_SENSOR_CAPS, CMD_ZERO, ISB_BAROMETRIC_PRESSURE, ISB_CO2_UNITS,
    ISB_ETCO2_TIME_PERIOD, ISB_GAS_COMPENSATIONS, ISB_GAS_TEMPERATURE, ISB_HANDSHAKE,
    ISB_NO_BREATH_TIMEOUT, ISB_PART_NUMBER, ISB_UNKNOWN, PART_NUMBER, REVISION_STRING,
};

use crate::state::SensorState;
use crate::{AlarmEvaluator, WaveformSource};

/// Process one complete received frame.
///
/// Returns the response frame, or `None` when the protocol calls for
/// silence (malformed sub-command bytes) or when building the response
/// failed (logged, never propagated).
pub fn process_frame<W: WaveformSource, A: AlarmEvaluator>(
    state: &mut SensorState,
    waveform: &mut W,
    alarms: &A,
    frame: &[u8],
    now_ms: u64,
) -> Option<Frame> {
    match dispatch(state, waveform, alarms, frame, now_ms) {
        Ok(response) => response,
        Err(err) => {
            log::error!("dropping response frame: {err}");
            None
        }
    }
}

fn dispatch<W: WaveformSource, A: AlarmEvaluator>(
    state: &mut SensorState,
    waveform: &mut W,
    alarms: &A,
    frame: &[u8],
    now_ms: u64,
) -> Result<Option<Frame>, ProtocolError> {
    if frame.len() < 2 {
        return Ok(None);
    }

    let residue = checksum(frame);
    if residue != 0 {
        log::warn!("frame 0x{:02X} failed checksum (residue 0x{residue:02X})", frame[0]);
        return nack(NackCode::Checksum).map(Some);
    }

    let command = match Command::decode(frame) {
        Ok(command) => command,
        Err(ProtocolError::UnknownCommand(code)) => {
            log::warn!("unrecognized command 0x{code:02X}");
            return nack(NackCode::InvalidCommand).map(Some);
        }
        Err(err) => {
            // Recognized command with missing sub-bytes: dropped without a
            // reply, matching the device.
            log::debug!("ignoring malformed frame: {err}");
            return Ok(None);
        }
    };

    log::trace!("dispatching {command:?}");
    match command {
        Command::StartWaveform => {
            state.start_continuous_mode();
            waveform_frame(state, waveform, alarms, None, now_ms).map(Some)
        }

        Command::StopContinuous => {
            state.stop_continuous_mode();
            echo(command.code()).map(Some)
        }

        Command::GetRevision { format } => {
            let mut builder = FrameBuilder::command(CMD_GET_REVISION);
            builder.push(format);
            builder.push_str(REVISION_STRING);
            builder.finalize().map(Some)
        }

        Command::SensorCapabilities { sci, scb } => {
            let capability = if sci <= 1 {
                0x01
            } else {
                scb.unwrap_or(0) & 0x01
            };
            let mut builder = FrameBuilder::command(CMD_SENSOR_CAPS);
            builder.push(sci);
            builder.push(capability);
            builder.finalize().map(Some)
        }

        Command::Settings(request) => handle_settings(state, request).map(Some),

        Command::Zero => {
            let status = if !state.is_compensations_set() {
                ZeroStatus::NotReady
            } else if state.is_zero_in_progress() {
                ZeroStatus::AlreadyInProgress
            } else {
                state.start_zero(now_ms);
                log::info!("zero calibration started");
                ZeroStatus::Accepted
            };
            let mut builder = FrameBuilder::command(CMD_ZERO);
            builder.push(status.into());
            builder.finalize().map(Some)
        }

        Command::ResetNoBreath => {
            state.clear_status_byte1();
            echo(command.code()).map(Some)
        }
    }
}

fn handle_settings(
    state: &mut SensorState,
    request: SettingsRequest,
) -> Result<Frame, ProtocolError> {
    let mut builder = FrameBuilder::command(CMD_GET_SET_SETTINGS);
    match request {
        SettingsRequest::BarometricPressure(write) => {
            if let Some(value) = write {
                state.set_barometric_pressure(value);
            }
            builder.push(ISB_BAROMETRIC_PRESSURE);
            builder.push_u14(state.barometric_pressure());
        }
        SettingsRequest::GasTemperature(write) => {
            if let Some(value) = write {
                state.set_gas_temp(value);
            }
            builder.push(ISB_GAS_TEMPERATURE);
            builder.push_u14(state.gas_temp());
        }
        SettingsRequest::Etco2TimePeriod(write) => {
            if let Some(value) = write {
                state.set_etco2_time_period(value);
            }
            builder.push(ISB_ETCO2_TIME_PERIOD);
            builder.push(state.etco2_time_period());
        }
        SettingsRequest::NoBreathTimeout(write) => {
            if let Some(value) = write {
                state.set_no_breath_timeout(value);
            }
            builder.push(ISB_NO_BREATH_TIMEOUT);
            builder.push(state.no_breath_timeout());
        }
        SettingsRequest::Co2Units(write) => {
            if let Some(value) = write {
                state.set_co2_units(value);
            }
            builder.push(ISB_CO2_UNITS);
            builder.push(state.co2_units());
        }
        SettingsRequest::GasCompensations(write) => {
            if let Some(comp) = write {
                state.set_gas_compensations(comp.o2, comp.balance_gas, comp.anesthetic_agent);
            }
            builder.push(ISB_GAS_COMPENSATIONS);
            builder.push(state.o2_compensation());
            builder.push(state.balance_gas());
            builder.push_u14(state.anesthetic_agent());
        }
        SettingsRequest::PartNumber => {
            builder.push(ISB_PART_NUMBER);
            builder.push_str(PART_NUMBER);
        }
        SettingsRequest::Handshake => {
            builder.push(ISB_HANDSHAKE);
            builder.push(0x01);
        }
        SettingsRequest::Unknown(item) => {
            log::debug!("unsupported settings item {item}");
            builder.push(ISB_UNKNOWN);
        }
    }
    builder.finalize()
}

/// Build a waveform frame: sync counter, CO2 sample with alarm evaluation,
/// and optionally one derived-parameter block.
pub fn waveform_frame<W: WaveformSource, A: AlarmEvaluator>(
    state: &mut SensorState,
    waveform: &mut W,
    alarms: &A,
    dpi: Option<DerivedParameterKind>,
    now_ms: u64,
) -> Result<Frame, ProtocolError> {
    let mut builder = FrameBuilder::command(CMD_CO2_WAVEFORM);
    builder.push(state.take_sync());

    let co2 = waveform.sample(now_ms);
    let alarm = alarms.evaluate(co2);
    state.or_status_byte1(alarm.status_bits);
    builder.push_co2_sample(co2);

    if let Some(kind) = dpi {
        builder.push(kind.code());
        match kind {
            DerivedParameterKind::Co2Status => {
                builder.push(state.status_byte1());
                builder.push(state.status_byte2());
                builder.push(state.status_byte3());
                builder.push(0);
                builder.push(0);
            }
            DerivedParameterKind::Etco2 => builder.push_u14(state.etco2()),
            DerivedParameterKind::RespRate => builder.push_u14(state.resp_rate()),
            DerivedParameterKind::InspCo2 => builder.push_u14(state.insp_co2()),
            DerivedParameterKind::BreathDetected => {}
        }
    }

    builder.finalize()
}

/// Build a NACK frame with the given reason code.
pub fn nack(code: NackCode) -> Result<Frame, ProtocolError> {
    let mut builder = FrameBuilder::command(CMD_NACK);
    builder.push(code.into());
    builder.finalize()
}

/// Build a bare acknowledgement frame echoing the command byte.
fn echo(cmd: u8) -> Result<Frame, ProtocolError> {
    FrameBuilder::command(cmd).finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlarmStatus;
    use capsim_host_protocol::{
        DerivedParameter, Response, SettingsResponse, CMD_RESET_NO_BREATH, CMD_STOP_CONTINUOUS,
        STATUS2_COMP_MISSING,
    };

    struct FixedWaveform(f32);

    impl WaveformSource for FixedWaveform {
        fn sample(&mut self, _now_ms: u64) -> f32 {
            self.0
        }
        fn respiratory_rate(&self) -> u16 {
            15
        }
        fn etco2(&self) -> u16 {
            380
        }
    }

    struct NoAlarms;

    impl AlarmEvaluator for NoAlarms {
        fn evaluate(&self, _co2: f32) -> AlarmStatus {
            AlarmStatus {
                active: false,
                status_bits: 0,
            }
        }
    }

    struct AlwaysAlarm;

    impl AlarmEvaluator for AlwaysAlarm {
        fn evaluate(&self, _co2: f32) -> AlarmStatus {
            AlarmStatus {
                active: true,
                status_bits: 0x08,
            }
        }
    }

    fn request(cmd: u8, payload: &[u8]) -> Vec<u8> {
        let mut builder = FrameBuilder::command(cmd);
        for &byte in payload {
            builder.push(byte);
        }
        builder.finalize().expect("should fit").as_bytes().to_vec()
    }

    fn run(state: &mut SensorState, frame: &[u8]) -> Option<Response> {
        process_frame(state, &mut FixedWaveform(38.0), &NoAlarms, frame, 0)
            .map(|f| Response::decode(f.as_bytes()).expect("response should decode"))
    }

    #[test]
    fn test_checksum_failure_nacks() {
        let mut state = SensorState::new();
        let mut frame = request(CMD_ZERO, &[]);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Nack(NackCode::Checksum))
        );
    }

    #[test]
    fn test_unknown_command_nacks() {
        let mut state = SensorState::new();
        let frame = request(0xC0, &[]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Nack(NackCode::InvalidCommand))
        );
    }

    #[test]
    fn test_short_frame_is_ignored() {
        let mut state = SensorState::new();
        assert_eq!(run(&mut state, &[0x84]), None);
    }

    #[test]
    fn test_malformed_revision_is_ignored() {
        let mut state = SensorState::new();
        let frame = request(CMD_GET_REVISION, &[]);
        assert_eq!(run(&mut state, &frame), None);
    }

    #[test]
    fn test_start_waveform_enters_continuous_and_replies_immediately() {
        let mut state = SensorState::new();
        let frame = request(CMD_CO2_WAVEFORM, &[]);
        let Some(Response::Waveform(wave)) = run(&mut state, &frame) else {
            panic!("expected immediate waveform frame");
        };
        assert!(state.is_continuous_mode());
        assert!(state.is_initialized());
        assert_eq!(wave.sync, 0);
        assert_eq!(wave.dpi, None);
        assert!((wave.co2() - 38.0).abs() < 0.01);
    }

    #[test]
    fn test_stop_continuous_echoes() {
        let mut state = SensorState::new();
        state.start_continuous_mode();
        let frame = request(CMD_STOP_CONTINUOUS, &[]);
        assert_eq!(run(&mut state, &frame), Some(Response::StopContinuous));
        assert!(!state.is_continuous_mode());
    }

    #[test]
    fn test_get_revision() {
        let mut state = SensorState::new();
        let frame = request(CMD_GET_REVISION, &[0x02]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Revision {
                format: 0x02,
                revision: REVISION_STRING.to_string(),
            })
        );
    }

    #[test]
    fn test_sensor_capabilities() {
        let mut state = SensorState::new();
        // sci 0 and 1 always report capable.
        for sci in [0, 1] {
            let frame = request(CMD_SENSOR_CAPS, &[sci]);
            assert_eq!(
                run(&mut state, &frame),
                Some(Response::SensorCapabilities {
                    sci,
                    capability: 1
                })
            );
        }
        // Higher indices take the low bit of the sub-selector.
        let frame = request(CMD_SENSOR_CAPS, &[5, 0x03]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::SensorCapabilities {
                sci: 5,
                capability: 1
            })
        );
        let frame = request(CMD_SENSOR_CAPS, &[5]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::SensorCapabilities {
                sci: 5,
                capability: 0
            })
        );
    }

    #[test]
    fn test_set_pressure_updates_state_and_echoes() {
        let mut state = SensorState::new();
        // Item 1, value bytes 0x02 0x70 -> 2*128 + 112 = 368.
        let frame = request(CMD_GET_SET_SETTINGS, &[1, 0x02, 0x70]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Settings(SettingsResponse::BarometricPressure(
                368
            )))
        );
        assert_eq!(state.barometric_pressure(), 368);
        assert!(state.is_compensations_set());
        assert_eq!(state.status_byte2() & STATUS2_COMP_MISSING, 0);
    }

    #[test]
    fn test_pure_get_leaves_state_untouched() {
        let mut state = SensorState::new();
        let frame = request(CMD_GET_SET_SETTINGS, &[1]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Settings(SettingsResponse::BarometricPressure(
                760
            )))
        );
        assert!(!state.is_compensations_set());
    }

    #[test]
    fn test_gas_temperature_does_not_mark_compensations() {
        let mut state = SensorState::new();
        let frame = request(CMD_GET_SET_SETTINGS, &[4, 0x02, 0x68]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Settings(SettingsResponse::GasTemperature(360)))
        );
        assert!(!state.is_compensations_set());
    }

    #[test]
    fn test_gas_compensations_round_trip() {
        let mut state = SensorState::new();
        let frame = request(CMD_GET_SET_SETTINGS, &[11, 21, 1, 0x02, 0x00]);
        let Some(Response::Settings(SettingsResponse::GasCompensations(comp))) =
            run(&mut state, &frame)
        else {
            panic!("expected gas compensations echo");
        };
        assert_eq!((comp.o2, comp.balance_gas, comp.anesthetic_agent), (21, 1, 256));
        assert!(state.is_compensations_set());
    }

    #[test]
    fn test_part_number_and_handshake_items() {
        let mut state = SensorState::new();
        let frame = request(CMD_GET_SET_SETTINGS, &[18]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Settings(SettingsResponse::PartNumber(
                PART_NUMBER.to_string()
            )))
        );
        let frame = request(CMD_GET_SET_SETTINGS, &[19]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Settings(SettingsResponse::Handshake(0x01)))
        );
    }

    #[test]
    fn test_unknown_settings_item_echoes_item_zero() {
        let mut state = SensorState::new();
        let frame = request(CMD_GET_SET_SETTINGS, &[42, 1, 2, 3]);
        assert_eq!(
            run(&mut state, &frame),
            Some(Response::Settings(SettingsResponse::UnknownItem))
        );
    }

    #[test]
    fn test_zero_gating_sequence() {
        let mut state = SensorState::new();
        let zero = request(CMD_ZERO, &[]);

        // Before any compensation write: application error 1, not a NACK.
        assert_eq!(
            run(&mut state, &zero),
            Some(Response::Zero(ZeroStatus::NotReady))
        );
        assert!(!state.is_zero_in_progress());

        // Configure pressure, then the request is accepted.
        let set = request(CMD_GET_SET_SETTINGS, &[1, 0x05, 0x78]);
        run(&mut state, &set);
        assert_eq!(
            run(&mut state, &zero),
            Some(Response::Zero(ZeroStatus::Accepted))
        );
        assert!(state.is_zero_in_progress());

        // Repeating while running: application error 2.
        assert_eq!(
            run(&mut state, &zero),
            Some(Response::Zero(ZeroStatus::AlreadyInProgress))
        );
    }

    #[test]
    fn test_reset_no_breath_clears_status1() {
        let mut state = SensorState::new();
        state.or_status_byte1(0x09);
        let frame = request(CMD_RESET_NO_BREATH, &[]);
        assert_eq!(run(&mut state, &frame), Some(Response::ResetNoBreath));
        assert_eq!(state.status_byte1(), 0);
    }

    #[test]
    fn test_waveform_frame_with_alarm_and_status_block() {
        let mut state = SensorState::new();
        let frame = waveform_frame(
            &mut state,
            &mut FixedWaveform(60.0),
            &AlwaysAlarm,
            Some(DerivedParameterKind::Co2Status),
            0,
        )
        .expect("should build");

        let Ok(Response::Waveform(wave)) = Response::decode(frame.as_bytes()) else {
            panic!("waveform frame should decode");
        };
        assert_eq!(
            wave.dpi,
            Some(DerivedParameter::Co2Status {
                status1: 0x08,
                status2: STATUS2_COMP_MISSING,
                status3: 0,
            })
        );
        assert_eq!(state.status_byte1(), 0x08);
    }

    #[test]
    fn test_waveform_frame_derived_parameters() {
        let mut state = SensorState::new();
        state.update_parameters(420, 18);

        let frame = waveform_frame(
            &mut state,
            &mut FixedWaveform(38.0),
            &NoAlarms,
            Some(DerivedParameterKind::Etco2),
            0,
        )
        .expect("should build");
        let Ok(Response::Waveform(wave)) = Response::decode(frame.as_bytes()) else {
            panic!("waveform frame should decode");
        };
        assert_eq!(wave.dpi, Some(DerivedParameter::Etco2(420)));

        let frame = waveform_frame(
            &mut state,
            &mut FixedWaveform(38.0),
            &NoAlarms,
            Some(DerivedParameterKind::RespRate),
            0,
        )
        .expect("should build");
        let Ok(Response::Waveform(wave)) = Response::decode(frame.as_bytes()) else {
            panic!("waveform frame should decode");
        };
        assert_eq!(wave.dpi, Some(DerivedParameter::RespRate(18)));
    }

    #[test]
    fn test_every_response_verifies_on_the_wire() {
        let mut state = SensorState::new();
        let frames = [
            request(CMD_CO2_WAVEFORM, &[]),
            request(CMD_STOP_CONTINUOUS, &[]),
            request(CMD_GET_REVISION, &[0]),
            request(CMD_SENSOR_CAPS, &[2, 1]),
            request(CMD_GET_SET_SETTINGS, &[7, 1]),
            request(CMD_ZERO, &[]),
            request(CMD_RESET_NO_BREATH, &[]),
        ];
        for frame in &frames {
            let response =
                process_frame(&mut state, &mut FixedWaveform(0.0), &NoAlarms, frame, 0)
                    .expect("each command should produce a frame");
            assert_eq!(checksum(response.as_bytes()), 0);
            let declared = response.as_bytes()[1] as usize + 2;
            assert_eq!(declared, response.len());
        }
    }
}
