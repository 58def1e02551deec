use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::warn;
use motorboard_ringbuf::{Consumer, Producer, RingBuffer};

use crate::{InterruptLine, RECEIVE_BUFFER_SIZE, SerialError, TRANSMIT_BUFFER_SIZE, UartRegisters};

pub type DefaultSerialLink<LINE> = SerialLink<LINE, TRANSMIT_BUFFER_SIZE, RECEIVE_BUFFER_SIZE>;

/// Storage for one UART: a transmit buffer, a receive buffer and the transmit-armed condition.
///
/// Meant to live in `static` storage. Call [`SerialLink::split`] once to obtain the mainline and
/// interrupt-side halves.
pub struct SerialLink<LINE, const TX: usize, const RX: usize> {
    line: LINE,
    armed: AtomicBool,
    dropped: AtomicUsize,
    transmit: RingBuffer<TX>,
    receive: RingBuffer<RX>,
}

impl<LINE, const TX: usize, const RX: usize> SerialLink<LINE, TX, RX> {
    pub const fn new(line: LINE) -> Self {
        Self {
            line,
            armed: AtomicBool::new(false),
            dropped: AtomicUsize::new(0),
            transmit: RingBuffer::new(),
            receive: RingBuffer::new(),
        }
    }
}

impl<LINE: InterruptLine, const TX: usize, const RX: usize> SerialLink<LINE, TX, RX> {
    /// Hand out the mainline half and the interrupt half.
    ///
    /// Mainline is the only producer of the transmit buffer and the only consumer of the receive
    /// buffer. The interrupt handler takes the mirror roles.
    pub fn split<REGS: UartRegisters>(
        &mut self,
        registers: REGS,
    ) -> (SerialHandle<'_, LINE, TX, RX>, SerialIsr<'_, LINE, REGS, TX, RX>) {
        let (transmit_producer, transmit_consumer) = self.transmit.split();
        let (receive_producer, receive_consumer) = self.receive.split();

        let handle = SerialHandle {
            transmit: transmit_producer,
            receive: receive_consumer,
            line: &self.line,
            armed: &self.armed,
            dropped: &self.dropped,
        };
        let isr = SerialIsr {
            transmit: transmit_consumer,
            receive: receive_producer,
            registers,
            line: &self.line,
            armed: &self.armed,
            dropped: &self.dropped,
        };
        (handle, isr)
    }
}

/// Mainline half of a [`SerialLink`].
pub struct SerialHandle<'a, LINE, const TX: usize, const RX: usize> {
    transmit: Producer<'a, TX>,
    receive: Consumer<'a, RX>,
    line: &'a LINE,
    armed: &'a AtomicBool,
    dropped: &'a AtomicUsize,
}

impl<LINE: InterruptLine, const TX: usize, const RX: usize> SerialHandle<'_, LINE, TX, RX> {
    /// Queue one byte and arm the transmit interrupt.
    ///
    /// On overflow nothing is queued and nothing is armed.
    pub fn enqueue_byte(&mut self, byte: u8) -> Result<(), SerialError> {
        self.transmit.write(byte)?;
        self.arm();
        Ok(())
    }

    /// Queue a whole message, spinning while the transmit buffer is full.
    ///
    /// Blocks the calling context until every byte has been queued. A byte that fails to queue
    /// is reported through the returned error but does not stop the remaining bytes.
    pub fn enqueue_message(&mut self, message: &[u8]) -> Result<(), SerialError> {
        let mut result = Ok(());
        for &byte in message {
            while self.transmit.is_full() {
                core::hint::spin_loop();
            }
            if let Err(error) = self.enqueue_byte(byte) {
                warn!("serial message byte dropped: {}", error);
                result = Err(error);
            }
        }
        result
    }

    /// Take the oldest received byte. Never blocks.
    pub fn dequeue_byte(&mut self) -> Result<u8, SerialError> {
        Ok(self.receive.read()?)
    }

    /// Bytes still waiting to be sent.
    pub fn transmit_pending(&self) -> usize {
        self.transmit.len()
    }

    /// Bytes received and not yet dequeued.
    pub fn receive_pending(&self) -> usize {
        self.receive.len()
    }

    /// Received bytes lost because the receive buffer was full.
    pub fn dropped_bytes(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn arm(&self) {
        // idempotent, re-arming an armed line is harmless
        self.armed
            .store(true, Ordering::Release);
        self.line.arm();
    }
}

impl<LINE: InterruptLine, const TX: usize, const RX: usize> fmt::Write for SerialHandle<'_, LINE, TX, RX> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.enqueue_message(s.as_bytes())
            .map_err(|_e| fmt::Error)
    }
}

/// Interrupt half of a [`SerialLink`].
///
/// Both service routines are bounded and never block.
pub struct SerialIsr<'a, LINE, REGS, const TX: usize, const RX: usize> {
    transmit: Consumer<'a, TX>,
    receive: Producer<'a, RX>,
    registers: REGS,
    line: &'a LINE,
    armed: &'a AtomicBool,
    dropped: &'a AtomicUsize,
}

impl<LINE, REGS, const TX: usize, const RX: usize> SerialIsr<'_, LINE, REGS, TX, RX>
where
    LINE: InterruptLine,
    REGS: UartRegisters,
{
    /// Service a transmit-ready condition: send exactly one queued byte, or disarm when none is left.
    ///
    /// The handler preempts mainline code and never the reverse, so no byte can be queued between
    /// the empty check and the disarm.
    pub fn on_transmit_ready(&mut self) {
        match self.transmit.read() {
            Ok(byte) => self
                .registers
                .write_transmit(byte),
            Err(_) => {
                self.armed
                    .store(false, Ordering::Release);
                self.line.disarm();
            }
        }
    }

    /// Service a receive-ready condition: move the received byte into the receive buffer.
    ///
    /// The register is always read so the condition clears. When the buffer is full the byte is
    /// dropped, there is no caller to report to.
    pub fn on_receive_ready(&mut self) {
        let byte = self.registers.read_receive();
        if self.receive.write(byte).is_err() {
            // single writer, a plain load/store is enough
            let dropped = self.dropped.load(Ordering::Relaxed);
            self.dropped
                .store(dropped.wrapping_add(1), Ordering::Relaxed);
        }
    }

    pub fn transmit_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn registers(&self) -> &REGS {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut REGS {
        &mut self.registers
    }
}
