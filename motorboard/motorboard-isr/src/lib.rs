#![cfg_attr(not(test), no_std)]

//! Static storage for values that are handed from mainline code to an interrupt handler.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, Ordering};

/// A `static`-friendly slot holding one value that both execution contexts may access.
///
/// The value is installed once, usually during startup. Every access then runs inside a
/// critical section, so an interrupt handler and mainline code never observe it at the same time.
/// Access must stay short because interrupts are masked for its duration.
pub struct IsrCell<T> {
    installed: AtomicBool,
    taken: AtomicBool,
    instance: UnsafeCell<MaybeUninit<T>>,
}

impl<T> IsrCell<T> {
    pub const fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
            taken: AtomicBool::new(false),
            instance: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Move `value` into the cell.
    ///
    /// Returns the value back if the cell is already occupied.
    pub fn install(&self, value: T) -> Result<(), T> {
        critical_section::with(|_cs| {
            // no need for CAS because we are in a critical section
            if self
                .installed
                .load(Ordering::Relaxed)
            {
                return Err(value);
            }
            unsafe {
                self.instance
                    .get()
                    .write(MaybeUninit::new(value));
            }
            self.installed
                .store(true, Ordering::Relaxed);
            Ok(())
        })
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Relaxed)
    }

    /// Run `f` with exclusive access to the value, or return `None` if nothing is installed yet.
    ///
    /// # Panics
    ///
    /// If called from inside another `with` on the same cell.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|_cs| {
            if !self
                .installed
                .load(Ordering::Relaxed)
            {
                return None;
            }
            if self.taken.load(Ordering::Relaxed) {
                panic!("isr cell taken reentrantly")
            }
            self.taken
                .store(true, Ordering::Relaxed);

            let instance = unsafe { (*self.instance.get()).assume_init_mut() };
            let result = f(instance);

            self.taken
                .store(false, Ordering::Relaxed);
            Some(result)
        })
    }
}

impl<T> Default for IsrCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for IsrCell<T> {
    fn drop(&mut self) {
        if *self.installed.get_mut() {
            unsafe { self.instance.get_mut().assume_init_drop() }
        }
    }
}

// Safety: the value is only reached through `with`, which holds a critical section and refuses
// re-entrant access, so at most one `&mut T` exists at any time.
unsafe impl<T: Send> Sync for IsrCell<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_yields_none() {
        let cell = IsrCell::<u32>::new();
        assert!(!cell.is_installed());
        assert_eq!(cell.with(|value| *value), None);
    }

    #[test]
    fn installed_value_is_mutable() {
        let cell = IsrCell::new();
        cell.install(41u32).unwrap();
        assert!(cell.is_installed());

        cell.with(|value| *value += 1);
        assert_eq!(cell.with(|value| *value), Some(42));
    }

    #[test]
    fn second_install_is_rejected() {
        let cell = IsrCell::new();
        cell.install(1u8).unwrap();
        assert_eq!(cell.install(2u8), Err(2));
        assert_eq!(cell.with(|value| *value), Some(1));
    }

    #[test]
    #[should_panic(expected = "isr cell taken reentrantly")]
    fn reentrant_access_panics() {
        let cell = IsrCell::new();
        cell.install(0u8).unwrap();
        cell.with(|_outer| {
            cell.with(|_inner| ());
        });
    }

    #[test]
    fn installed_value_is_dropped_with_the_cell() {
        use std::rc::Rc;

        let shared = Rc::new(());
        {
            let cell = IsrCell::new();
            cell.install(Rc::clone(&shared)).unwrap();
            assert_eq!(Rc::strong_count(&shared), 2);
        }
        assert_eq!(Rc::strong_count(&shared), 1);
    }

    #[test]
    fn static_cell_is_shared_between_contexts() {
        static COUNTER: IsrCell<u32> = IsrCell::new();
        COUNTER.install(0).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        COUNTER.with(|count| *count += 1);
                    }
                });
            }
        });

        assert_eq!(COUNTER.with(|count| *count), Some(4000));
    }
}
