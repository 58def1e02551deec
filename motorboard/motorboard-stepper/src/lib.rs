#![cfg_attr(not(test), no_std)]

//! Four-phase stepper motor sequencer driven by a periodic timer interrupt.

pub mod sequencer;

pub use sequencer::{SequencerConfig, StepSequencer};

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperDirection {
    #[default]
    Forward,
    Backward,
}

/// Timer preload giving the fastest allowed step rate.
///
/// The timer counts up from the preload to overflow, so a larger preload means a shorter
/// interval between ticks.
pub const MAX_TICK_PERIOD: u16 = 0xcb00;

/// Pin levels for each phase, two windings energized at a time.
pub const PHASE_TABLE: [[bool; 4]; 4] = [
    [true, false, true, false],
    [true, false, false, true],
    [false, true, false, true],
    [false, true, true, false],
];

/// Reloadable countdown timer whose expiry invokes [`StepSequencer::on_tick`].
pub trait StepTimer {
    /// Set the time until the next expiry.
    fn reload(&mut self, period: u16);

    /// Enable the expiry interrupt.
    fn arm(&mut self);

    /// Disable the expiry interrupt.
    fn disarm(&mut self);
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperError {
    #[error("output pin write failed")]
    IoError,
}
