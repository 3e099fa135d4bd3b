
use std::sync::{Condvar, Mutex};

///
/// A waitable cell: a value guarded by a mutex, paired with a condition
/// variable so that threads can block until the value matches what they are
/// looking for. Worker and search statuses are signalled through these.
///
#[derive(Debug)]
pub struct Guard<T>
{
    mutex: Mutex<T>,
    latch: Condvar
}

impl<T> Guard<T>
    where T: Copy + PartialEq
{
    ///
    /// Returns the current value.
    ///
    pub fn get (& self) -> T
    {
        * self.mutex.lock().unwrap()
    }

    ///
    /// Creates a new guard holding the given value.
    ///
    pub fn new (value: T) -> Guard<T>
    {
        Guard { mutex: Mutex::new(value), latch: Condvar::new() }
    }

    ///
    /// Stores a new value and wakes all waiters.
    ///
    pub fn set (& self, value: T)
    {
        let mut guard = self.mutex.lock().unwrap();
        (* guard) = value;
        self.latch.notify_all();
    }

    ///
    /// Waits until the value equals the given one.
    ///
    pub fn wait (& self, value: T)
    {
        self.wait_for(|current| * current == value);
    }

    ///
    /// Waits until the value satisfies the given predicate.
    ///
    pub fn wait_for (& self, predicate: impl Fn(& T) -> bool)
    {
        let mut guard = self.mutex.lock().unwrap();
        while ! predicate(& guard)
        {
            guard = self.latch.wait(guard).unwrap();
        }
    }

    ///
    /// Waits until the value differs from the given one.
    ///
    pub fn wait_while (& self, value: T)
    {
        self.wait_for(|current| * current != value);
    }
}
