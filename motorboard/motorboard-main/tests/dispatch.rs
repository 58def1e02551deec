use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use motorboard_main::serial::{InterruptLine, SerialLink, UartRegisters};
use motorboard_main::stepper::{PHASE_TABLE, StepSequencer, StepTimer, StepperDirection};
use motorboard_main::{
    InterruptDispatcher, IsrCell, MotionError, PendingInterrupts, Serviced, move_and_wait, release,
};
use static_cell::StaticCell;

#[derive(Clone, Default)]
struct MockLine(Arc<AtomicBool>);

impl InterruptLine for MockLine {
    fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockRegisters {
    sent: Vec<u8>,
    incoming: VecDeque<u8>,
}

impl UartRegisters for MockRegisters {
    fn write_transmit(&mut self, byte: u8) {
        self.sent.push(byte);
    }

    fn read_receive(&mut self) -> u8 {
        self.incoming.pop_front().unwrap_or_default()
    }
}

type Levels = Arc<Mutex<[bool; 4]>>;

struct MockPin {
    index: usize,
    levels: Levels,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.lock().unwrap()[self.index] = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.lock().unwrap()[self.index] = true;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockTimer(Arc<AtomicBool>);

impl StepTimer for MockTimer {
    fn reload(&mut self, _period: u16) {}

    fn arm(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn disarm(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct YieldDelay;

impl DelayNs for YieldDelay {
    fn delay_ns(&mut self, _ns: u32) {
        std::thread::yield_now();
    }
}

type Link = SerialLink<MockLine, 16, 8>;
type Sequencer = StepSequencer<MockPin, MockTimer>;

const TICK: PendingInterrupts = PendingInterrupts {
    transmit_ready: false,
    receive_ready: false,
    timer_expired: true,
};

fn sequencer(levels: &Levels, timer: &MockTimer) -> Sequencer {
    let pins = core::array::from_fn(|index| MockPin {
        index,
        levels: levels.clone(),
    });
    StepSequencer::new(pins, timer.clone())
}

fn asserted_row(levels: &Levels) -> Option<usize> {
    let levels = *levels.lock().unwrap();
    PHASE_TABLE
        .iter()
        .position(|row| *row == levels)
}

#[test]
fn tick_after_motion_completes_is_not_delivered() {
    static LINK: StaticCell<Link> = StaticCell::new();
    static STEPPER: IsrCell<Sequencer> = IsrCell::new();

    let levels = Levels::default();
    let timer = MockTimer::default();
    assert!(STEPPER.install(sequencer(&levels, &timer)).is_ok());

    let link = LINK.init(Link::new(MockLine::default()));
    let (_handle, isr) = link.split(MockRegisters::default());
    let mut dispatcher = InterruptDispatcher::new(isr, &STEPPER);

    STEPPER.with(|stepper| stepper.start_motion(4, StepperDirection::Forward, 0x8000));

    let mut rows = Vec::new();
    for _ in 0..4 {
        assert!(dispatcher.service(TICK).tick);
        rows.push(asserted_row(&levels).unwrap());
    }
    assert_eq!(rows, [0, 1, 2, 3]);
    assert!(!timer.0.load(Ordering::SeqCst));

    assert_eq!(dispatcher.service(TICK), Serviced::default());
    assert_eq!(asserted_row(&levels), Some(3));
    assert_eq!(
        STEPPER.with(|stepper| (stepper.current_phase(), stepper.remaining_steps())),
        Some((0, 0))
    );
}

#[test]
fn transmit_is_serviced_only_while_armed() {
    static LINK: StaticCell<Link> = StaticCell::new();
    static STEPPER: IsrCell<Sequencer> = IsrCell::new();

    let line = MockLine::default();
    let link = LINK.init(Link::new(line.clone()));
    let (mut handle, isr) = link.split(MockRegisters::default());
    let mut dispatcher = InterruptDispatcher::new(isr, &STEPPER);
    let transmit = PendingInterrupts {
        transmit_ready: true,
        ..Default::default()
    };

    assert!(!dispatcher.service(transmit).transmit);

    handle.enqueue_byte(b'x').unwrap();
    assert!(line.0.load(Ordering::SeqCst));

    // first service sends the byte, the second finds the buffer empty and disarms
    assert!(dispatcher.service(transmit).transmit);
    assert!(dispatcher.service(transmit).transmit);
    assert!(!line.0.load(Ordering::SeqCst));

    assert!(!dispatcher.service(transmit).transmit);
    assert_eq!(dispatcher.serial().registers().sent, b"x");
}

#[test]
fn receive_is_always_serviced_and_a_missing_stepper_is_skipped() {
    static LINK: StaticCell<Link> = StaticCell::new();
    static STEPPER: IsrCell<Sequencer> = IsrCell::new();

    let registers = MockRegisters {
        incoming: VecDeque::from(b"hi".to_vec()),
        ..Default::default()
    };
    let link = LINK.init(Link::new(MockLine::default()));
    let (mut handle, isr) = link.split(registers);
    let mut dispatcher = InterruptDispatcher::new(isr, &STEPPER);

    let everything = PendingInterrupts {
        transmit_ready: true,
        receive_ready: true,
        timer_expired: true,
    };
    assert_eq!(
        dispatcher.service(everything),
        Serviced {
            transmit: false,
            receive: true,
            tick: false,
        }
    );
    dispatcher.service(PendingInterrupts {
        receive_ready: true,
        ..Default::default()
    });

    assert_eq!(handle.dequeue_byte(), Ok(b'h'));
    assert_eq!(handle.dequeue_byte(), Ok(b'i'));
    assert!(handle.dequeue_byte().is_err());
}

#[test]
fn move_and_wait_returns_once_the_interrupt_finishes_the_motion() {
    static LINK: StaticCell<Link> = StaticCell::new();
    static STEPPER: IsrCell<Sequencer> = IsrCell::new();

    let levels = Levels::default();
    let timer = MockTimer::default();
    assert!(STEPPER.install(sequencer(&levels, &timer)).is_ok());

    let link = LINK.init(Link::new(MockLine::default()));
    let (_handle, isr) = link.split(MockRegisters::default());
    let mut dispatcher = InterruptDispatcher::new(isr, &STEPPER);
    let stop = AtomicBool::new(false);

    let ticks = std::thread::scope(|scope| {
        let interrupt = scope.spawn(|| {
            let mut ticks = 0;
            while !stop.load(Ordering::SeqCst) {
                if dispatcher.service(TICK).tick {
                    ticks += 1;
                }
                std::thread::yield_now();
            }
            ticks
        });

        let result = move_and_wait(&STEPPER, 8, StepperDirection::Forward, 0x8000, &mut YieldDelay, 10);
        stop.store(true, Ordering::SeqCst);
        assert_eq!(result, Ok(()));
        interrupt.join().unwrap()
    });

    assert_eq!(ticks, 8);
    assert_eq!(STEPPER.with(|stepper| stepper.current_phase()), Some(0));
    assert!(asserted_row(&levels).is_some());

    assert_eq!(release(&STEPPER), Ok(()));
    assert_eq!(*levels.lock().unwrap(), [false; 4]);
}

#[test]
fn motion_helpers_need_an_installed_sequencer() {
    static STEPPER: IsrCell<Sequencer> = IsrCell::new();

    assert_eq!(
        move_and_wait(&STEPPER, 1, StepperDirection::Forward, 0x8000, &mut YieldDelay, 10),
        Err(MotionError::NotInstalled)
    );
    assert_eq!(release(&STEPPER), Err(MotionError::NotInstalled));
}
