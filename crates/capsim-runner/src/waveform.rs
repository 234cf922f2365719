//! Simulated CO2 waveform source.
//!
//! Generates a sine wave standing in for a breathing patient. Parameters
//! are operator-adjustable at runtime; time is injected by the caller so
//! the signal is reproducible under a simulated clock.

use capsim_sensor::WaveformSource;

use crate::config::EmulatorConfig;

/// Sine-wave CO2 signal generator.
#[derive(Debug, Clone)]
pub struct SineWaveform {
    /// Peak excursion above the baseline, mmHg.
    amplitude: f32,
    /// Breath frequency, Hz.
    frequency: f32,
    /// Baseline CO2 level, mmHg.
    baseline: f32,
    /// Phase offset, radians.
    phase: f32,
}

impl Default for SineWaveform {
    fn default() -> Self {
        Self::new()
    }
}

impl SineWaveform {
    /// Create a generator with the default resting-breath parameters.
    pub fn new() -> Self {
        SineWaveform {
            amplitude: 38.0,
            frequency: 0.25,
            baseline: 0.0,
            phase: 0.0,
        }
    }

    /// Set the amplitude, mmHg.
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    /// Set the breath frequency, Hz.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    /// Set the baseline, mmHg.
    pub fn set_baseline(&mut self, baseline: f32) {
        self.baseline = baseline;
    }

    /// Set the phase offset, radians.
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase;
    }

    /// Current amplitude.
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Current frequency.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Current baseline.
    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    /// Current phase offset.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Take the waveform parameters from a loaded configuration.
    pub fn apply_config(&mut self, config: &EmulatorConfig) {
        self.amplitude = config.amplitude;
        self.frequency = config.frequency;
        self.baseline = config.baseline;
        self.phase = config.phase;
    }

    /// Store the waveform parameters into a configuration.
    pub fn store_config(&self, config: &mut EmulatorConfig) {
        config.amplitude = self.amplitude;
        config.frequency = self.frequency;
        config.baseline = self.baseline;
        config.phase = self.phase;
    }
}

impl WaveformSource for SineWaveform {
    fn sample(&mut self, now_ms: u64) -> f32 {
        let t = now_ms as f32 / 1000.0;
        let value =
            self.baseline + self.amplitude * (2.0 * std::f32::consts::PI * self.frequency * t + self.phase).sin();
        value.max(0.0)
    }

    fn respiratory_rate(&self) -> u16 {
        (self.frequency * 60.0) as u16
    }

    fn etco2(&self) -> u16 {
        (self.amplitude * 10.0) as u16
    }
}
