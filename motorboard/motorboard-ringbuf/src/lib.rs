#![cfg_attr(not(test), no_std)]

//! Fixed-capacity byte ring buffer shared between mainline code and an interrupt handler.
//!
//! One of the `N` slots is always kept free so that `head == tail` unambiguously means empty,
//! which leaves `N - 1` usable slots.

mod buffer;

pub use buffer::{Consumer, Producer, RingBuffer};

#[derive(Debug, PartialEq, Eq, Copy, Clone, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// write attempted against a full buffer, nothing was stored
    #[error("ring buffer overflow")]
    Overflow,
    /// read attempted against an empty buffer, nothing was consumed
    #[error("ring buffer underflow")]
    Underflow,
}
