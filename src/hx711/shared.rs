//! Exclusive access to a load cell from more than one thread.
//!
//! The bit-banged handshake must never interleave with another one on the
//! same lines, so every access holds the cell's own lock. Each cell has a
//! separate lock: a device stuck in WaitReady only blocks callers of that
//! device.

use std::sync::{Mutex, PoisonError};

use crate::{LoadCell, RawRead};

pub struct SharedLoadCell<L> {
    inner: Mutex<L>,
}

impl<L> SharedLoadCell<L> {
    pub const fn new(cell: L) -> Self {
        Self {
            inner: Mutex::new(cell),
        }
    }

    /// Run `f` with exclusive access to the load cell.
    ///
    /// A panic in an earlier holder does not lock the cell out; the next
    /// read starts with WaitReady, which resynchronises with the device.
    pub fn with<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        let mut cell = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut cell)
    }

    pub fn into_inner(self) -> L {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: RawRead> RawRead for &SharedLoadCell<L> {
    type Error = L::Error;

    fn read(&mut self) -> Result<i32, Self::Error> {
        self.with(|cell| cell.read())
    }
}

impl<L: LoadCell> LoadCell for &SharedLoadCell<L> {
    fn read_scaled(&mut self) -> Result<f32, Self::Error> {
        self.with(|cell| cell.read_scaled())
    }

    fn tare(&mut self, num_samples: usize) -> Result<(), Self::Error> {
        self.with(|cell| cell.tare(num_samples))
    }

    fn get_offset(&self) -> i32 {
        self.with(|cell| cell.get_offset())
    }

    fn set_scale(&mut self, scale: f32) {
        self.with(|cell| cell.set_scale(scale))
    }

    fn get_scale(&self) -> f32 {
        self.with(|cell| cell.get_scale())
    }
}
