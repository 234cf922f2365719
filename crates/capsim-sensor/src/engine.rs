//! The sensor protocol engine.
//!
//! Ties the frame receiver, the command dispatcher, and the session state
//! together behind two calls the control loop makes: `push_bytes` for
//! whatever arrived on the transport and `tick` for time-driven work
//! (zero auto-completion and unsolicited waveform emission). Everything is
//! single-threaded and clocked by caller-supplied milliseconds, so the whole
//! engine runs deterministically under a simulated clock.

use capsim_host_protocol::{
    DerivedParameterKind, Frame, FrameReceiver, NackCode, ReceiverEvent, PARAM_INTERVAL_MS,
    WAVEFORM_INTERVAL_MS,
};

use crate::dispatch;
use crate::state::SensorState;
use crate::{AlarmEvaluator, WaveformSource};

/// One emulated sensor session.
pub struct SensorEngine<W, A> {
    state: SensorState,
    receiver: FrameReceiver,
    waveform: W,
    alarms: A,
    last_waveform_ms: u64,
    last_param_ms: u64,
    dpi_counter: u8,
}

impl<W: WaveformSource, A: AlarmEvaluator> SensorEngine<W, A> {
    /// Create an engine around the given collaborators.
    pub fn new(waveform: W, alarms: A) -> Self {
        SensorEngine {
            state: SensorState::new(),
            receiver: FrameReceiver::new(),
            waveform,
            alarms,
            last_waveform_ms: 0,
            last_param_ms: 0,
            dpi_counter: 0,
        }
    }

    /// Read access to the session state, for consoles and dashboards.
    pub fn state(&self) -> &SensorState {
        &self.state
    }

    /// The waveform source.
    pub fn waveform(&self) -> &W {
        &self.waveform
    }

    /// Mutable access to the waveform source (operator controls).
    pub fn waveform_mut(&mut self) -> &mut W {
        &mut self.waveform
    }

    /// The alarm evaluator.
    pub fn alarms(&self) -> &A {
        &self.alarms
    }

    /// Mutable access to the alarm evaluator (operator controls).
    pub fn alarms_mut(&mut self) -> &mut A {
        &mut self.alarms
    }

    /// Feed bytes drained from the transport.
    ///
    /// Returns the frames to write back, in order. Each complete frame is
    /// dispatched to completion before the next byte is consumed; an
    /// inter-byte timeout surfaces as a NACK.
    pub fn push_bytes(&mut self, data: &[u8], now_ms: u64) -> Vec<Frame> {
        let mut out = Vec::new();
        for &byte in data {
            if let Some(frame) = self.push_byte(byte, now_ms) {
                out.push(frame);
            }
        }
        out
    }

    /// Feed a single byte from the transport.
    pub fn push_byte(&mut self, byte: u8, now_ms: u64) -> Option<Frame> {
        match self.receiver.push_byte(byte, now_ms)? {
            ReceiverEvent::Frame(frame) => dispatch::process_frame(
                &mut self.state,
                &mut self.waveform,
                &self.alarms,
                &frame,
                now_ms,
            ),
            ReceiverEvent::TimedOut => emit(dispatch::nack(NackCode::Timeout)),
        }
    }

    /// Advance time-driven behavior.
    ///
    /// Completes an elapsed zero cycle, and in continuous mode emits a
    /// waveform frame once per waveform interval, attaching one rotating
    /// derived-parameter block per coarse parameter interval.
    pub fn tick(&mut self, now_ms: u64) -> Option<Frame> {
        self.state.tick_zero(now_ms);

        if !self.state.is_continuous_mode() {
            return None;
        }
        if now_ms.saturating_sub(self.last_waveform_ms) < WAVEFORM_INTERVAL_MS {
            return None;
        }
        self.last_waveform_ms = now_ms;

        let dpi = if now_ms.saturating_sub(self.last_param_ms) >= PARAM_INTERVAL_MS {
            self.last_param_ms = now_ms;
            let kind = DerivedParameterKind::ROTATION[(self.dpi_counter % 4) as usize];
            self.dpi_counter = self.dpi_counter.wrapping_add(1);
            self.state
                .update_parameters(self.waveform.etco2(), self.waveform.respiratory_rate());
            Some(kind)
        } else {
            None
        };

        emit(dispatch::waveform_frame(
            &mut self.state,
            &mut self.waveform,
            &self.alarms,
            dpi,
            now_ms,
        ))
    }
}

fn emit(frame: Result<Frame, capsim_host_protocol::ProtocolError>) -> Option<Frame> {
    match frame {
        Ok(frame) => Some(frame),
        Err(err) => {
            log::error!("dropping outgoing frame: {err}");
            None
        }
    }
}
