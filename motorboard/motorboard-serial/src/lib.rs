#![cfg_attr(not(test), no_std)]

//! Interrupt-driven UART buffering.
//!
//! Mainline code queues bytes for transmission and collects received bytes through a
//! [`SerialHandle`]. The UART interrupt handler moves bytes between the hardware registers and
//! the buffers through a [`SerialIsr`]. Both come from [`SerialLink::split`].

mod link;

use motorboard_ringbuf::BufferError;

pub use link::{DefaultSerialLink, SerialHandle, SerialIsr, SerialLink};

pub const TRANSMIT_BUFFER_SIZE: usize = 0x80;
pub const RECEIVE_BUFFER_SIZE: usize = 0x20;

/// Enable bit of the transmit-ready interrupt.
///
/// Mainline code arms it and the interrupt handler disarms it, so both take `&self`.
pub trait InterruptLine {
    fn arm(&self);
    fn disarm(&self);
}

/// Data registers of the UART peripheral, owned by the interrupt handler.
pub trait UartRegisters {
    fn write_transmit(&mut self, byte: u8);
    fn read_receive(&mut self) -> u8;
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    #[error("transmit buffer full")]
    TransmitOverflow,
    #[error("nothing received")]
    ReceiveUnderflow,
}

impl From<BufferError> for SerialError {
    fn from(error: BufferError) -> Self {
        match error {
            BufferError::Overflow => SerialError::TransmitOverflow,
            BufferError::Underflow => SerialError::ReceiveUnderflow,
        }
    }
}
