use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::trace;

use crate::error::{Error, Result};
use crate::{LoadCell, RawRead};

pub mod shared;

pub const HX711_MINIMUM: i32 = -(1 << (24 - 1));
pub const HX711_MAXIMUM: i32 = (1 << (24 - 1)) - 1;
/// Clock high/low hold time. The datasheet asks for at least 0.2 us.
pub const HX711_DELAY_TIME_US: u32 = 1;
/// Back-off between polls of the data line while waiting for a conversion.
pub const HX711_POLL_BACKOFF_US: u32 = 10;

/// Extra clock pulses after the 24 data bits. One pulse keeps the next
/// conversion on channel A at gain 128.
const GAIN_PULSES: u8 = 1;
const SIGN_BIT: u32 = 1 << 23;

/// Flip bit 23 of a 24-bit sample. Applying it twice is the identity.
pub fn flip_sign_bit(value: u32) -> u32 {
    value ^ SIGN_BIT
}

/// Turn the 24-bit twos-complement pattern shifted out by the device into
/// a signed count.
///
/// Flipping the sign bit gives the offset-binary form; removing the offset
/// re-centres it on zero.
pub fn sign_correct(value: u32) -> i32 {
    flip_sign_bit(value & 0x00ff_ffff) as i32 - SIGN_BIT as i32
}

pub struct HX711<SckPin, DTPin, Delay> {
    sck_pin: SckPin,
    dt_pin: DTPin,
    delay: Delay,
    last_reading: i32,
    offset: i32, // tare
    scale: f32,  // counts per unit
    ready_timeout: Option<Duration>,
}

impl<SckPin, DTPin, Delay> HX711<SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin,
    Delay: DelayNs,
{
    /// Take ownership of the pins and drive the clock low.
    pub fn new(mut sck_pin: SckPin, dt_pin: DTPin, delay: Delay) -> Result<Self> {
        sck_pin.set_low().map_err(Error::clock)?;
        Ok(Self {
            sck_pin,
            dt_pin,
            delay,
            last_reading: 0,
            offset: 0,
            scale: 1.0,
            ready_timeout: None,
        })
    }

    /// Bound the wait for the data line. `None` (the default) waits forever.
    pub fn set_ready_timeout(&mut self, timeout: Option<Duration>) {
        self.ready_timeout = timeout;
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout
    }

    /// The device pulls the data line low once a conversion is available.
    pub fn is_ready(&mut self) -> Result<bool> {
        self.dt_pin.is_low().map_err(Error::data)
    }

    /// Get last reading, offset relative to the tare, and scaled.
    pub fn get_last(&self) -> f32 {
        (self.last_reading - self.offset) as f32 / self.scale
    }

    pub fn get_last_raw(&self) -> i32 {
        self.last_reading
    }

    /// Give back the pins and the delay.
    pub fn release(self) -> (SckPin, DTPin, Delay) {
        (self.sck_pin, self.dt_pin, self.delay)
    }

    fn wait_ready(&mut self) -> Result<()> {
        let limit = self.ready_timeout.map(|t| t.as_micros());
        let mut waited_us: u128 = 0;
        while !self.is_ready()? {
            if let Some(limit) = limit {
                if waited_us >= limit {
                    return Err(Error::DeviceNotReady {
                        waited: Duration::from_micros(waited_us as u64),
                    });
                }
            }
            self.delay.delay_us(HX711_POLL_BACKOFF_US);
            waited_us += u128::from(HX711_POLL_BACKOFF_US);
        }
        Ok(())
    }

    fn read_hx711_bit(&mut self) -> Result<bool> {
        self.sck_pin.set_high().map_err(Error::clock)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);

        let bit = self.dt_pin.is_high().map_err(Error::data)?;

        self.sck_pin.set_low().map_err(Error::clock)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);
        Ok(bit)
    }

    fn toggle_sck_bit(&mut self) -> Result<()> {
        self.sck_pin.set_high().map_err(Error::clock)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);
        self.sck_pin.set_low().map_err(Error::clock)?;
        self.delay.delay_us(HX711_DELAY_TIME_US);
        Ok(())
    }
}

impl<SckPin, DTPin, Delay> RawRead for HX711<SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin,
    Delay: DelayNs,
{
    type Error = Error;

    /// Block until a conversion is ready, then shift it out.
    fn read(&mut self) -> Result<i32> {
        self.wait_ready()?;

        let mut value: u32 = 0;
        // bits arrive MSB first
        for _ in 0..24 {
            let bit = self.read_hx711_bit()?;
            value = (value << 1) | bit as u32;
        }
        // select gain for the next conversion
        for _ in 0..GAIN_PULSES {
            self.toggle_sck_bit()?;
        }

        let signed = sign_correct(value);
        trace!("hx711 raw={:#08x} signed={}", value, signed);
        self.last_reading = signed;
        Ok(signed)
    }
}

impl<SckPin, DTPin, Delay> LoadCell for HX711<SckPin, DTPin, Delay>
where
    SckPin: OutputPin,
    DTPin: InputPin,
    Delay: DelayNs,
{
    fn read_scaled(&mut self) -> Result<f32> {
        self.read()?;
        Ok(self.get_last())
    }

    /// Zero the scale on the running average of `num_samples` reads.
    fn tare(&mut self, num_samples: usize) -> Result<()> {
        if num_samples == 0 {
            return Err(Error::InvalidArgument("tare needs at least one sample"));
        }
        let mut average: f32 = 0.0;
        for n in 1..=num_samples {
            let current = self.read()? as f32;
            average += (current - average) / n as f32;
        }
        self.offset = average as i32;
        Ok(())
    }

    fn get_offset(&self) -> i32 {
        self.offset
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn get_scale(&self) -> f32 {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    use embedded_hal_mock::eh1::delay::{NoopDelay, StdSleep};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    /// Clock transactions of one full read: 24 data pulses plus the gain pulse.
    fn clock_pulses(reads: usize) -> Vec<PinTransaction> {
        let mut t = vec![PinTransaction::set(PinState::Low)];
        for _ in 0..reads * 25 {
            t.push(PinTransaction::set(PinState::High));
            t.push(PinTransaction::set(PinState::Low));
        }
        t
    }

    /// Data transactions of one read: the ready poll then the 24 bits of
    /// `raw`, MSB first.
    fn data_bits(raw: u32) -> Vec<PinTransaction> {
        let mut t = vec![PinTransaction::get(PinState::Low)];
        for i in (0..24).rev() {
            let state = if raw >> i & 1 == 1 {
                PinState::High
            } else {
                PinState::Low
            };
            t.push(PinTransaction::get(state));
        }
        t
    }

    #[test]
    fn sign_bit_flip_is_an_involution() {
        for v in (0..0x0100_0000u32).step_by(4093).chain([0, 0x7f_ffff, 0x80_0000, 0xff_ffff]) {
            assert_eq!(flip_sign_bit(flip_sign_bit(v)), v);
        }
    }

    #[test]
    fn negative_patterns_recover_twos_complement() {
        for r in (0x80_0000u32..0x0100_0000).step_by(4099).chain([0xff_ffff]) {
            let expected = ((r << 8) as i32) >> 8;
            assert_eq!(sign_correct(r), expected);
            assert!(sign_correct(r) < 0);
        }
        assert_eq!(sign_correct(0xff_ffff), -1);
        assert_eq!(sign_correct(0x80_0000), HX711_MINIMUM);
    }

    #[test]
    fn positive_patterns_are_unchanged() {
        assert_eq!(sign_correct(0), 0);
        assert_eq!(sign_correct(1234), 1234);
        assert_eq!(sign_correct(0x7f_ffff), HX711_MAXIMUM);
    }

    #[test]
    fn reads_24_bits_msb_first_then_gain_pulse() {
        let raw = 0x12_3456;
        let mut sck = PinMock::new(&clock_pulses(1));
        let mut dt = PinMock::new(&data_bits(raw));

        let mut hx711 = HX711::new(sck.clone(), dt.clone(), NoopDelay::new()).unwrap();
        assert_eq!(hx711.read().unwrap(), 0x12_3456);
        assert_eq!(hx711.get_last_raw(), 0x12_3456);

        sck.done();
        dt.done();
    }

    #[test]
    fn reads_negative_sample() {
        let mut sck = PinMock::new(&clock_pulses(1));
        let mut dt = PinMock::new(&data_bits(0xff_fc18));

        let mut hx711 = HX711::new(sck.clone(), dt.clone(), NoopDelay::new()).unwrap();
        assert_eq!(hx711.read().unwrap(), -1000);

        sck.done();
        dt.done();
    }

    #[test]
    fn waits_until_data_line_goes_low() {
        let mut expected = vec![
            PinTransaction::get(PinState::High),
            PinTransaction::get(PinState::High),
        ];
        expected.extend(data_bits(42));
        let mut sck = PinMock::new(&clock_pulses(1));
        let mut dt = PinMock::new(&expected);

        let mut hx711 = HX711::new(sck.clone(), dt.clone(), NoopDelay::new()).unwrap();
        assert_eq!(hx711.read().unwrap(), 42);

        sck.done();
        dt.done();
    }

    #[test]
    fn ready_timeout_gives_up_without_clocking() {
        // polls at 0, 10, .. 50 us of back-off, the last one exceeds the limit
        let polls: Vec<_> = (0..6).map(|_| PinTransaction::get(PinState::High)).collect();
        let mut sck = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let mut dt = PinMock::new(&polls);

        let mut hx711 = HX711::new(sck.clone(), dt.clone(), NoopDelay::new()).unwrap();
        hx711.set_ready_timeout(Some(Duration::from_micros(50)));
        match hx711.read() {
            Err(Error::DeviceNotReady { waited }) => {
                assert_eq!(waited, Duration::from_micros(50))
            }
            other => panic!("expected DeviceNotReady, got {other:?}"),
        }

        sck.done();
        dt.done();
    }

    #[test]
    fn read_honours_clock_hold_times() {
        let mut sck = PinMock::new(&clock_pulses(1));
        let mut dt = PinMock::new(&data_bits(0x55_aa55));

        let mut hx711 = HX711::new(sck.clone(), dt.clone(), StdSleep::new()).unwrap();
        let start = Instant::now();
        hx711.read().unwrap();
        let elapsed = start.elapsed();

        let minimum = Duration::from_micros(24 * 2 * u64::from(HX711_DELAY_TIME_US));
        assert!(elapsed >= minimum, "read took only {elapsed:?}");

        sck.done();
        dt.done();
    }

    #[test]
    fn tare_and_scale_apply_to_readings() {
        let mut dt_expect = Vec::new();
        for raw in [1000, 1002, 998, 1000, 1212] {
            dt_expect.extend(data_bits(raw));
        }
        let mut sck = PinMock::new(&clock_pulses(5));
        let mut dt = PinMock::new(&dt_expect);

        let mut hx711 = HX711::new(sck.clone(), dt.clone(), NoopDelay::new()).unwrap();
        hx711.tare(4).unwrap();
        assert_eq!(hx711.get_offset(), 1000);

        hx711.set_scale(106.0);
        assert_eq!(hx711.read_scaled().unwrap(), 2.0);

        sck.done();
        dt.done();
    }

    #[test]
    fn tare_rejects_zero_samples() {
        let mut sck = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let mut dt = PinMock::new(&[]);

        let mut hx711 = HX711::new(sck.clone(), dt.clone(), NoopDelay::new()).unwrap();
        assert!(matches!(hx711.tare(0), Err(Error::InvalidArgument(_))));

        sck.done();
        dt.done();
    }
}
