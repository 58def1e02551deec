use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, trace};

use crate::{MAX_TICK_PERIOD, PHASE_TABLE, StepTimer, StepperDirection, StepperError};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequencerConfig {
    /// requested speeds above this preload are clamped to it
    pub max_tick_period: u16,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_tick_period: MAX_TICK_PERIOD,
        }
    }
}

/// Drives four output pins through the phase table, one phase per timer tick.
///
/// [`start_motion`](Self::start_motion), [`is_finished`](Self::is_finished) and
/// [`release`](Self::release) are called from mainline code, [`on_tick`](Self::on_tick) from the
/// timer interrupt. `remaining_steps == 0` means idle with the timer disarmed.
pub struct StepSequencer<PIN, TIMER> {
    pins: [PIN; 4],
    timer: TIMER,
    config: SequencerConfig,
    phase: u8,
    direction: StepperDirection,
    previous_direction: StepperDirection,
    remaining_steps: u16,
    tick_period: u16,
    armed: bool,
}

impl<PIN, TIMER> StepSequencer<PIN, TIMER>
where
    PIN: OutputPin,
    TIMER: StepTimer,
{
    pub fn new(pins: [PIN; 4], timer: TIMER) -> Self {
        Self::with_config(pins, timer, SequencerConfig::default())
    }

    pub fn with_config(pins: [PIN; 4], timer: TIMER, config: SequencerConfig) -> Self {
        Self {
            pins,
            timer,
            config,
            phase: 0,
            direction: StepperDirection::default(),
            previous_direction: StepperDirection::default(),
            remaining_steps: 0,
            tick_period: 0,
            armed: false,
        }
    }

    /// Start a new motion, replacing any motion in progress.
    ///
    /// `target_speed` is a timer preload, clamped to the configured maximum. The phase carries
    /// over from the previous motion. On a direction change it is moved one step in the new
    /// direction before the first tick.
    pub fn start_motion(&mut self, distance: u16, direction: StepperDirection, target_speed: u16) {
        self.previous_direction = self.direction;
        self.remaining_steps = distance;

        self.tick_period = target_speed.min(self.config.max_tick_period);
        self.timer
            .reload(self.tick_period);

        self.direction = direction;
        if self.direction != self.previous_direction {
            self.phase = Self::next_phase(self.phase, direction);
        }

        // armed even for a zero distance, the first tick then disarms
        self.arm();

        debug!(
            "Motion: {} steps, direction: {:?}, tick period: {:#06x}, phase: {}",
            distance, direction, self.tick_period, self.phase
        );
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_steps == 0
    }

    /// De-energize all windings.
    ///
    /// Leaves the remaining steps and the timer alone. Every pin is attempted even if one fails.
    pub fn release(&mut self) -> Result<(), StepperError> {
        let mut result = Ok(());
        for pin in self.pins.iter_mut() {
            if pin.set_low().is_err() {
                result = Err(StepperError::IoError);
            }
        }
        trace!("Windings released");
        result
    }

    /// Timer interrupt service: assert the current phase, advance, and count down.
    ///
    /// A pin failure is reported after the state has advanced, so a motion always completes.
    pub fn on_tick(&mut self) -> Result<(), StepperError> {
        self.timer
            .reload(self.tick_period);

        if self.remaining_steps == 0 {
            // zero-distance motion, nothing to step
            self.disarm();
            return Ok(());
        }

        let applied = self.apply_phase(self.phase);
        self.phase = Self::next_phase(self.phase, self.direction);

        self.remaining_steps -= 1;
        if self.remaining_steps == 0 {
            // pins stay energized at the last phase until `release`
            self.disarm();
        }
        applied
    }

    pub fn current_phase(&self) -> u8 {
        self.phase
    }

    pub fn direction(&self) -> StepperDirection {
        self.direction
    }

    pub fn remaining_steps(&self) -> u16 {
        self.remaining_steps
    }

    pub fn tick_period(&self) -> u16 {
        self.tick_period
    }

    /// Whether the timer interrupt is enabled.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[inline(always)]
    fn next_phase(phase: u8, direction: StepperDirection) -> u8 {
        match direction {
            StepperDirection::Forward => (phase + 1) % 4,
            StepperDirection::Backward => (phase + 3) % 4,
        }
    }

    fn apply_phase(&mut self, phase: u8) -> Result<(), StepperError> {
        let mut result = Ok(());
        for (pin, energized) in self
            .pins
            .iter_mut()
            .zip(PHASE_TABLE[phase as usize])
        {
            if pin
                .set_state(PinState::from(energized))
                .is_err()
            {
                result = Err(StepperError::IoError);
            }
        }
        result
    }

    #[inline(always)]
    fn arm(&mut self) {
        self.timer.arm();
        self.armed = true;
    }

    #[inline(always)]
    fn disarm(&mut self) {
        self.timer.disarm();
        self.armed = false;
    }
}
