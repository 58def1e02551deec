#![no_std]

pub mod dispatch;
pub mod motion;

pub use dispatch::{InterruptDispatcher, PendingInterrupts, Serviced};
pub use motion::{MotionError, move_and_wait, release};
pub use motorboard_isr::IsrCell;
pub use motorboard_serial as serial;
pub use motorboard_stepper as stepper;
