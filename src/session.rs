//! Tare-then-average weighing session.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::RawRead;

/// Convert a raw count into weight units relative to `tare`.
pub fn weigh(raw: i32, tare: i32, scale_factor: f32) -> f32 {
    (i64::from(raw) - i64::from(tare)) as f32 / scale_factor
}

/// One weighing run: a tare read followed by `sample_count` reads that are
/// averaged into a single weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Session {
    pub sample_count: usize,
    /// ADC counts per weight unit.
    pub scale_factor: f32,
    /// Pause between consecutive reads, giving the device time to settle.
    pub inter_sample_delay_ms: u32,
}

impl Session {
    /// Run the session on `cell`, returning the average weight.
    ///
    /// Arguments are checked before the load cell is touched.
    pub fn run<L, D>(&self, cell: &mut L, delay: &mut D) -> Result<f32>
    where
        L: RawRead,
        Error: From<L::Error>,
        D: DelayNs,
    {
        if self.sample_count == 0 {
            return Err(Error::InvalidArgument("sample count must be at least 1"));
        }
        if self.scale_factor == 0.0 || !self.scale_factor.is_finite() {
            return Err(Error::InvalidArgument("scale factor must be finite and non-zero"));
        }

        let tare = cell.read()?;
        debug!("tare offset {}", tare);

        let mut sum = 0.0f32;
        for i in 0..self.sample_count {
            if i > 0 {
                delay.delay_ms(self.inter_sample_delay_ms);
            }
            let raw = cell.read()?;
            let weight = weigh(raw, tare, self.scale_factor);
            debug!("sample {}: raw={} weight={:.2}", i + 1, raw, weight);
            sum += weight;
        }

        let average = sum / self.sample_count as f32;
        info!("average of {} samples: {:.2}", self.sample_count, average);
        Ok(average)
    }
}
