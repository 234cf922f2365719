//! Sensor session state.
//!
//! One instance per emulated sensor, owned by the protocol engine and
//! mutated only through the command dispatcher's entry points. External
//! readers (console, dashboards) get shared references and the read
//! accessors; fields that encode protocol invariants have no public
//! setters outside the dispatcher-facing ones here, so the
//! compensation-tracking status bit can never drift from reality.

use capsim_host_protocol::{STATUS2_COMP_MISSING, STATUS2_ZERO_IN_PROGRESS, ZERO_DURATION_MS};

/// The sensor's authoritative mutable state.
#[derive(Debug, Clone)]
pub struct SensorState {
    continuous_mode: bool,
    initialized: bool,
    sync_counter: u8,

    barometric_pressure: u16,
    o2_compensation: u8,
    balance_gas: u8,
    anesthetic_agent: u16,
    gas_temp: u16,
    etco2_time_period: u8,
    no_breath_timeout: u8,
    co2_units: u8,

    zero_in_progress: bool,
    zero_start_ms: u64,
    compensations_set: bool,
    status_byte1: u8,
    status_byte2: u8,

    etco2: u16,
    resp_rate: u16,
    insp_co2: u16,
}

impl Default for SensorState {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorState {
    /// Create a state with the device's power-on defaults.
    ///
    /// Status byte 2 starts with the compensations-missing bit raised;
    /// it clears the first time pressure or gas compensations are written.
    pub fn new() -> Self {
        SensorState {
            continuous_mode: false,
            initialized: false,
            sync_counter: 0,
            barometric_pressure: 760,
            o2_compensation: 16,
            balance_gas: 0,
            anesthetic_agent: 0,
            gas_temp: 350,
            etco2_time_period: 10,
            no_breath_timeout: 20,
            co2_units: 0,
            zero_in_progress: false,
            zero_start_ms: 0,
            compensations_set: false,
            status_byte1: 0,
            status_byte2: STATUS2_COMP_MISSING,
            etco2: 380,
            resp_rate: 15,
            insp_co2: 0,
        }
    }

    // ========================================================================
    // Continuous mode
    // ========================================================================

    /// Enter continuous mode, marking the session initialized and resetting
    /// the sync counter.
    pub fn start_continuous_mode(&mut self) {
        self.continuous_mode = true;
        self.initialized = true;
        self.sync_counter = 0;
    }

    /// Leave continuous mode.
    pub fn stop_continuous_mode(&mut self) {
        self.continuous_mode = false;
    }

    /// Whether unsolicited waveform streaming is active.
    pub fn is_continuous_mode(&self) -> bool {
        self.continuous_mode
    }

    /// Whether continuous mode has been started at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Return the current sync counter and advance it, wrapping at 128.
    pub fn take_sync(&mut self) -> u8 {
        let value = self.sync_counter;
        self.sync_counter = (self.sync_counter + 1) & 0x7F;
        value
    }

    // ========================================================================
    // Configured parameters
    // ========================================================================

    /// Set the barometric pressure. Marks compensations as configured.
    pub fn set_barometric_pressure(&mut self, value: u16) {
        self.barometric_pressure = value;
        self.mark_compensations_set();
    }

    /// Configured barometric pressure.
    pub fn barometric_pressure(&self) -> u16 {
        self.barometric_pressure
    }

    /// Set the gas temperature.
    pub fn set_gas_temp(&mut self, value: u16) {
        self.gas_temp = value;
    }

    /// Configured gas temperature.
    pub fn gas_temp(&self) -> u16 {
        self.gas_temp
    }

    /// Set the ETCO2 averaging time period.
    pub fn set_etco2_time_period(&mut self, value: u8) {
        self.etco2_time_period = value;
    }

    /// Configured ETCO2 averaging time period.
    pub fn etco2_time_period(&self) -> u8 {
        self.etco2_time_period
    }

    /// Set the no-breath timeout.
    pub fn set_no_breath_timeout(&mut self, value: u8) {
        self.no_breath_timeout = value;
    }

    /// Configured no-breath timeout.
    pub fn no_breath_timeout(&self) -> u8 {
        self.no_breath_timeout
    }

    /// Set the CO2 display units selector.
    pub fn set_co2_units(&mut self, value: u8) {
        self.co2_units = value;
    }

    /// Configured CO2 display units selector.
    pub fn co2_units(&self) -> u8 {
        self.co2_units
    }

    /// Set all gas compensations. Marks compensations as configured.
    pub fn set_gas_compensations(&mut self, o2: u8, balance_gas: u8, anesthetic_agent: u16) {
        self.o2_compensation = o2;
        self.balance_gas = balance_gas;
        self.anesthetic_agent = anesthetic_agent;
        self.mark_compensations_set();
    }

    /// Configured O2 compensation.
    pub fn o2_compensation(&self) -> u8 {
        self.o2_compensation
    }

    /// Configured balance gas selector.
    pub fn balance_gas(&self) -> u8 {
        self.balance_gas
    }

    /// Configured anesthetic agent concentration.
    pub fn anesthetic_agent(&self) -> u16 {
        self.anesthetic_agent
    }

    fn mark_compensations_set(&mut self) {
        self.compensations_set = true;
        self.status_byte2 &= !STATUS2_COMP_MISSING;
    }

    /// Whether pressure or gas compensations have ever been written.
    /// Monotonic: never returns to false.
    pub fn is_compensations_set(&self) -> bool {
        self.compensations_set
    }

    // ========================================================================
    // Zero calibration
    // ========================================================================

    /// Whether a zero request would currently be accepted.
    pub fn can_start_zero(&self) -> bool {
        self.compensations_set && !self.zero_in_progress
    }

    /// Begin a zero cycle at `now_ms`, raising the in-progress status bits.
    ///
    /// Gating (compensations configured, no cycle running) is the calling
    /// command handler's job; this only records the start.
    pub fn start_zero(&mut self, now_ms: u64) {
        self.zero_in_progress = true;
        self.zero_start_ms = now_ms;
        self.status_byte2 |= STATUS2_ZERO_IN_PROGRESS;
    }

    /// Advance the zero cycle against the clock.
    ///
    /// Called once per control-loop iteration; completion is purely
    /// time-driven and independent of frame traffic.
    pub fn tick_zero(&mut self, now_ms: u64) {
        if self.zero_in_progress && now_ms.saturating_sub(self.zero_start_ms) > ZERO_DURATION_MS {
            self.zero_in_progress = false;
            self.status_byte2 &= !STATUS2_ZERO_IN_PROGRESS;
            log::info!("zero calibration complete");
        }
    }

    /// Whether a zero cycle is running.
    pub fn is_zero_in_progress(&self) -> bool {
        self.zero_in_progress
    }

    // ========================================================================
    // Status bytes
    // ========================================================================

    /// Transient/alarm status byte.
    pub fn status_byte1(&self) -> u8 {
        self.status_byte1
    }

    /// Persistent status byte.
    pub fn status_byte2(&self) -> u8 {
        self.status_byte2
    }

    /// Reserved status byte, always zero.
    pub fn status_byte3(&self) -> u8 {
        0
    }

    /// OR alarm bits into status byte 1.
    pub fn or_status_byte1(&mut self, bits: u8) {
        self.status_byte1 |= bits;
    }

    /// Clear status byte 1 (the reset no-breath/alarm latch command).
    pub fn clear_status_byte1(&mut self) {
        self.status_byte1 = 0;
    }

    // ========================================================================
    // Derived parameters
    // ========================================================================

    /// Refresh the reported derived parameters from the waveform source.
    pub fn update_parameters(&mut self, etco2: u16, resp_rate: u16) {
        self.etco2 = etco2;
        self.resp_rate = resp_rate;
    }

    /// Last-reported end-tidal CO2.
    pub fn etco2(&self) -> u16 {
        self.etco2
    }

    /// Last-reported respiratory rate.
    pub fn resp_rate(&self) -> u16 {
        self.resp_rate
    }

    /// Last-reported inspired CO2.
    pub fn insp_co2(&self) -> u16 {
        self.insp_co2
    }
}
