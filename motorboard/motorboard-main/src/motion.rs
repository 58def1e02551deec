use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::info;
use motorboard_isr::IsrCell;
use motorboard_stepper::{StepSequencer, StepTimer, StepperDirection, StepperError};

#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionError {
    #[error("stepper sequencer not installed")]
    NotInstalled,
    #[error(transparent)]
    Stepper(#[from] StepperError),
}

/// Start a motion and poll until the timer interrupt has completed it.
///
/// Blocks the calling context. Sleeps `poll_interval_us` between polls so the critical section
/// guarding the sequencer is only held briefly.
pub fn move_and_wait<PIN, TIMER, DELAY>(
    stepper: &IsrCell<StepSequencer<PIN, TIMER>>,
    distance: u16,
    direction: StepperDirection,
    target_speed: u16,
    delay: &mut DELAY,
    poll_interval_us: u32,
) -> Result<(), MotionError>
where
    PIN: OutputPin,
    TIMER: StepTimer,
    DELAY: DelayNs,
{
    info!("Move {} steps {:?}", distance, direction);
    stepper
        .with(|sequencer| sequencer.start_motion(distance, direction, target_speed))
        .ok_or(MotionError::NotInstalled)?;

    while !stepper
        .with(|sequencer| sequencer.is_finished())
        .ok_or(MotionError::NotInstalled)?
    {
        delay.delay_us(poll_interval_us);
    }
    Ok(())
}

/// De-energize the windings.
pub fn release<PIN, TIMER>(stepper: &IsrCell<StepSequencer<PIN, TIMER>>) -> Result<(), MotionError>
where
    PIN: OutputPin,
    TIMER: StepTimer,
{
    stepper
        .with(|sequencer| sequencer.release())
        .ok_or(MotionError::NotInstalled)??;
    Ok(())
}
