//!Register level access and chip lifecycle for the PCA9685.
use embedded_hal::{delay::DelayNs, i2c::I2c};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::{
    error::DriverError,
    motor::{MotorWiring, Reversal},
    registers::*,
};

pub type Result<T, E> = std::result::Result<T, DriverError<E>>;

const RESET_SETTLE_US: u32 = 10_000;
const SLEEP_SETTLE_US: u32 = 5_000;
const OSCILLATOR_WAKE_US: u32 = 500;

const PWM_FREQ_MIN: f32 = 1.0;
const PWM_FREQ_MAX: f32 = 3500.0;
const DEFAULT_PWM_FREQ: f32 = 50.0;

///How the 16 outputs are driven.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    ///Push-pull outputs (MODE2.OUTDRV set). Power-on default.
    #[default]
    TotemPole,
    ///Open-drain outputs (MODE2.OUTDRV clear).
    OpenDrain,
}

///The on and off ticks of one channel. Either value may carry the 4096 full on/off flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTicks {
    pub on: u16,
    pub off: u16,
}

///Driver for one PCA9685 wired to an H-bridge board with up to four DC motors.
///
/// Every operation is a blocking bus transaction. Nothing about the chip is cached, so reads always
/// reflect the hardware. The pin table is fixed at construction.
pub struct MotorDriver<I2C, D> {
    pub(crate) i2c: I2C,
    pub(crate) delay: D,
    pub(crate) address: u8,
    pub(crate) oscillator_freq: u32,
    pub(crate) wiring: MotorWiring,
    pub(crate) reversal: Reversal,
}

impl<I2C, D> MotorDriver<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    ///Takes ownership of the bus. No bus traffic happens until `begin`.
    pub fn new(
        i2c: I2C,
        delay: D,
        address: u8,
        wiring: MotorWiring,
    ) -> Result<Self, I2C::Error> {
        wiring.validate::<I2C::Error>()?;
        Ok(Self {
            i2c,
            delay,
            address,
            oscillator_freq: DEFAULT_OSCILLATOR_FREQUENCY,
            wiring,
            reversal: Reversal::default(),
        })
    }

    pub fn with_default_address(
        i2c: I2C,
        delay: D,
        wiring: MotorWiring,
    ) -> Result<Self, I2C::Error> {
        Self::new(i2c, delay, DEFAULT_ADDRESS, wiring)
    }

    ///Gives back the bus and the delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn wiring(&self) -> &MotorWiring {
        &self.wiring
    }

    pub fn read8(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buffer = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buffer)?;
        Ok(buffer[0])
    }

    pub fn write8(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        trace!("PCA9685 {:#04x}: write {:#04x} <- {:#04x}", self.address, reg, value);
        self.i2c.write(self.address, &[reg, value])?;
        Ok(())
    }

    ///Brings the chip up: auto-increment, totem pole outputs, reset, then either the external clock
    /// `prescale` (when nonzero) or 50 Hz from the internal oscillator.
    pub fn begin(&mut self, prescale: u8) -> Result<(), I2C::Error> {
        debug!("PCA9685 {:#04x}: begin (prescale {})", self.address, prescale);
        self.write8(Register::Mode1.addr(), MODE1_AI)?;
        self.write8(Register::Mode2.addr(), MODE2_OUTDRV)?;
        self.reset()?;
        if prescale != 0 {
            self.set_ext_clk(prescale)
        } else {
            self.set_pwm_freq(DEFAULT_PWM_FREQ).map(|_| ())
        }
    }

    pub fn reset(&mut self) -> Result<(), I2C::Error> {
        self.write8(Register::Mode1.addr(), MODE1_RESTART)?;
        self.delay.delay_us(RESET_SETTLE_US);
        Ok(())
    }

    pub fn sleep(&mut self) -> Result<(), I2C::Error> {
        let awake = self.read8(Register::Mode1.addr())?;
        self.write8(Register::Mode1.addr(), awake | MODE1_SLEEP)?;
        self.delay.delay_us(SLEEP_SETTLE_US);
        Ok(())
    }

    ///Clears SLEEP, lets the oscillator stabilize, then restarts PWM where it left off.
    pub fn wakeup(&mut self) -> Result<(), I2C::Error> {
        let asleep = self.read8(Register::Mode1.addr())?;
        let awake = asleep & !MODE1_SLEEP & !MODE1_RESTART;
        self.write8(Register::Mode1.addr(), awake)?;
        self.delay.delay_us(OSCILLATOR_WAKE_US);
        self.write8(Register::Mode1.addr(), awake | MODE1_RESTART)
    }

    pub fn is_sleeping(&mut self) -> Result<bool, I2C::Error> {
        Ok(self.read8(Register::Mode1.addr())? & MODE1_SLEEP != 0)
    }

    ///Switches to the EXTCLK pin and writes `prescale` directly.
    ///
    /// EXTCLK is sticky: only a power cycle or software reset returns to the internal oscillator.
    pub fn set_ext_clk(&mut self, prescale: u8) -> Result<(), I2C::Error> {
        if prescale < PRESCALE_MIN {
            return Err(DriverError::range("prescale", prescale));
        }
        let old_mode = self.read8(Register::Mode1.addr())?;
        let asleep = (old_mode & !MODE1_RESTART) | MODE1_SLEEP;
        self.write8(Register::Mode1.addr(), asleep)?;
        //EXTCLK can only be set while asleep, and must be set on its own write
        self.write8(Register::Mode1.addr(), asleep | MODE1_EXTCLK)?;
        self.write_prescale(prescale)?;
        self.delay.delay_us(SLEEP_SETTLE_US);
        let running = ((asleep | MODE1_EXTCLK) & !MODE1_SLEEP) | MODE1_RESTART | MODE1_AI;
        self.write8(Register::Mode1.addr(), running)?;
        debug!("PCA9685 {:#04x}: external clock, prescale {}", self.address, prescale);
        Ok(())
    }

    ///Sets the PWM frame frequency from the internal oscillator and returns the prescale written.
    ///
    /// Frequencies outside what the prescale register can express are clamped, not rejected.
    pub fn set_pwm_freq(&mut self, freq: f32) -> Result<u8, I2C::Error> {
        if !freq.is_finite() || freq <= 0.0 {
            return Err(DriverError::range("pwm frequency", freq));
        }
        let raw = raw_prescale(self.oscillator_freq, freq);
        let prescale = prescale_for(self.oscillator_freq, freq);
        if raw < PRESCALE_MIN as f64 || raw > PRESCALE_MAX as f64 {
            warn!(
                "PCA9685 {:#04x}: pwm frequency {} Hz needs prescale {}, clamped to {}",
                self.address, freq, raw, prescale
            );
        }

        let old_mode = self.read8(Register::Mode1.addr())?;
        let asleep = (old_mode & !MODE1_RESTART) | MODE1_SLEEP;
        self.write8(Register::Mode1.addr(), asleep)?;
        self.write_prescale(prescale)?;
        self.write8(Register::Mode1.addr(), old_mode)?;
        self.delay.delay_us(SLEEP_SETTLE_US);
        self.write8(Register::Mode1.addr(), old_mode | MODE1_RESTART | MODE1_AI)?;
        debug!(
            "PCA9685 {:#04x}: pwm frequency {} Hz, prescale {}",
            self.address, freq, prescale
        );
        Ok(prescale)
    }

    ///Raw prescale write. The chip ignores PRESCALE unless SLEEP is set, so this refuses to write
    /// when it isn't.
    pub fn write_prescale(&mut self, prescale: u8) -> Result<(), I2C::Error> {
        if !self.is_sleeping()? {
            return Err(DriverError::NotAsleep);
        }
        self.write8(Register::Prescale.addr(), prescale)
    }

    pub fn read_prescale(&mut self) -> Result<u8, I2C::Error> {
        self.read8(Register::Prescale.addr())
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), I2C::Error> {
        let old_mode = self.read8(Register::Mode2.addr())?;
        let new_mode = match mode {
            OutputMode::TotemPole => old_mode | MODE2_OUTDRV,
            OutputMode::OpenDrain => old_mode & !MODE2_OUTDRV,
        };
        self.write8(Register::Mode2.addr(), new_mode)
    }

    pub fn set_oscillator_frequency(&mut self, freq: u32) {
        self.oscillator_freq = freq;
    }

    pub fn oscillator_frequency(&self) -> u32 {
        self.oscillator_freq
    }

    ///Writes ON_L, ON_H, OFF_L, OFF_H of `channel` as four separate transactions. A bus failure
    /// part way through leaves the channel half written.
    pub fn set_pwm(&mut self, channel: u8, on: u16, off: u16) -> Result<(), I2C::Error> {
        check_channel::<I2C::Error>(channel)?;
        check_tick::<I2C::Error>("on tick", on)?;
        check_tick::<I2C::Error>("off tick", off)?;
        self.write8(led_on_l(channel), (on & 0xFF) as u8)?;
        self.write8(led_on_h(channel), (on >> 8) as u8)?;
        self.write8(led_off_l(channel), (off & 0xFF) as u8)?;
        self.write8(led_off_h(channel), (off >> 8) as u8)
    }

    ///Reads the OFF_L byte of `channel` only. See `get_channel` for the full tick pair.
    pub fn get_pwm(&mut self, channel: u8) -> Result<u8, I2C::Error> {
        check_channel::<I2C::Error>(channel)?;
        self.read8(led_off_l(channel))
    }

    pub fn get_channel(&mut self, channel: u8) -> Result<ChannelTicks, I2C::Error> {
        check_channel::<I2C::Error>(channel)?;
        let on_l = self.read8(led_on_l(channel))? as u16;
        let on_h = self.read8(led_on_h(channel))? as u16;
        let off_l = self.read8(led_off_l(channel))? as u16;
        let off_h = self.read8(led_off_h(channel))? as u16;
        Ok(ChannelTicks {
            on: (on_h << 8) | on_l,
            off: (off_h << 8) | off_l,
        })
    }

    ///Loads every channel at once through the ALLLED registers.
    pub fn set_all_pwm(&mut self, on: u16, off: u16) -> Result<(), I2C::Error> {
        check_tick::<I2C::Error>("on tick", on)?;
        check_tick::<I2C::Error>("off tick", off)?;
        self.write8(Register::AllLedOnL.addr(), (on & 0xFF) as u8)?;
        self.write8(Register::AllLedOnH.addr(), (on >> 8) as u8)?;
        self.write8(Register::AllLedOffL.addr(), (off & 0xFF) as u8)?;
        self.write8(Register::AllLedOffH.addr(), (off >> 8) as u8)
    }

    ///Sets `channel` to a 0..=4095 level. 0 and 4095 use the full off / full on flags so the output
    /// has no glitch pulse. `val` above 4095 is treated as 4095.
    pub fn set_pin(&mut self, channel: u8, val: u16, invert: bool) -> Result<(), I2C::Error> {
        let (on, off) = pin_ticks(val, invert);
        self.set_pwm(channel, on, off)
    }

    ///Sets a pulse of `us` microseconds at the start of each frame, using the prescale currently in
    /// the chip and the calibrated oscillator frequency.
    pub fn write_microseconds(&mut self, channel: u8, us: u16) -> Result<(), I2C::Error> {
        check_channel::<I2C::Error>(channel)?;
        let prescale = self.read_prescale()? as f64 + 1.0;
        let us_per_tick = 1_000_000.0 * prescale / self.oscillator_freq as f64;
        let ticks = (us as f64 / us_per_tick) as u32;
        if ticks > MAX_TICK as u32 {
            return Err(DriverError::range("pulse width (us)", us));
        }
        trace!("PCA9685 {:#04x}: {}us on channel {} = {} ticks", self.address, us, channel, ticks);
        self.set_pwm(channel, 0, ticks as u16)
    }
}

///`round(osc / (4096 * freq)) - 1` with `freq` limited to 1..3500 Hz and the result clamped to
/// PRESCALE_MIN..=PRESCALE_MAX.
pub fn prescale_for(oscillator_freq: u32, freq: f32) -> u8 {
    raw_prescale(oscillator_freq, freq).clamp(PRESCALE_MIN as f64, PRESCALE_MAX as f64) as u8
}

fn raw_prescale(oscillator_freq: u32, freq: f32) -> f64 {
    let freq = freq.clamp(PWM_FREQ_MIN, PWM_FREQ_MAX) as f64;
    (oscillator_freq as f64 / (FULL_TICK as f64 * freq)).round() - 1.0
}

///PWM frame frequency produced by `prescale`.
pub fn frequency_for(oscillator_freq: u32, prescale: u8) -> f64 {
    oscillator_freq as f64 / (FULL_TICK as f64 * (prescale as f64 + 1.0))
}

fn pin_ticks(val: u16, invert: bool) -> (u16, u16) {
    let val = val.min(MAX_TICK);
    match (invert, val) {
        (false, MAX_TICK) | (true, 0) => (FULL_TICK, 0),
        (false, 0) | (true, MAX_TICK) => (0, FULL_TICK),
        (false, val) => (0, val),
        //inverted duty starting at tick 0, (4096 - val, 4095) would only shift the same duty
        (true, val) => (0, MAX_TICK - val),
    }
}

pub(crate) fn check_channel<E>(channel: u8) -> Result<(), E> {
    if channel < CHANNEL_COUNT {
        Ok(())
    } else {
        Err(DriverError::InvalidChannel(channel))
    }
}

fn check_tick<E>(what: &'static str, tick: u16) -> Result<(), E> {
    if tick <= FULL_TICK {
        Ok(())
    } else {
        Err(DriverError::range(what, tick))
    }
}
