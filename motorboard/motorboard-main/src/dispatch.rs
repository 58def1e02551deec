use embedded_hal::digital::OutputPin;
use log::warn;
use motorboard_isr::IsrCell;
use motorboard_serial::{InterruptLine, SerialIsr, UartRegisters};
use motorboard_stepper::{StepSequencer, StepTimer};

/// Hardware interrupt flags sampled by the board's interrupt vector.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingInterrupts {
    pub transmit_ready: bool,
    pub receive_ready: bool,
    pub timer_expired: bool,
}

/// Which service routines actually ran.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Serviced {
    pub transmit: bool,
    pub receive: bool,
    pub tick: bool,
}

/// Routes pending hardware conditions to the serial and stepper drivers.
///
/// A source is serviced only when it is both pending and enabled: transmit while armed, ticks
/// while the sequencer's timer is armed. Receive is always enabled.
pub struct InterruptDispatcher<'a, LINE, REGS, PIN, TIMER, const TX: usize, const RX: usize> {
    serial: SerialIsr<'a, LINE, REGS, TX, RX>,
    stepper: &'a IsrCell<StepSequencer<PIN, TIMER>>,
}

impl<'a, LINE, REGS, PIN, TIMER, const TX: usize, const RX: usize> InterruptDispatcher<'a, LINE, REGS, PIN, TIMER, TX, RX>
where
    LINE: InterruptLine,
    REGS: UartRegisters,
    PIN: OutputPin,
    TIMER: StepTimer,
{
    pub fn new(serial: SerialIsr<'a, LINE, REGS, TX, RX>, stepper: &'a IsrCell<StepSequencer<PIN, TIMER>>) -> Self {
        Self {
            serial,
            stepper,
        }
    }

    pub fn service(&mut self, pending: PendingInterrupts) -> Serviced {
        let mut serviced = Serviced::default();

        if pending.transmit_ready && self.serial.transmit_armed() {
            self.serial.on_transmit_ready();
            serviced.transmit = true;
        }

        if pending.receive_ready {
            self.serial.on_receive_ready();
            serviced.receive = true;
        }

        if pending.timer_expired {
            serviced.tick = self
                .stepper
                .with(|sequencer| {
                    if !sequencer.is_armed() {
                        return false;
                    }
                    if let Err(error) = sequencer.on_tick() {
                        warn!("Stepper tick: {}", error);
                    }
                    true
                })
                .unwrap_or(false);
        }

        serviced
    }

    pub fn serial(&self) -> &SerialIsr<'a, LINE, REGS, TX, RX> {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut SerialIsr<'a, LINE, REGS, TX, RX> {
        &mut self.serial
    }
}
