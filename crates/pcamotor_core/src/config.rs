//!Deserializable configuration for one PCA9685 motor board.
use embedded_hal::{delay::DelayNs, i2c::I2c};
use serde::Deserialize;
use tracing::info;

use crate::{
    driver::{MotorDriver, OutputMode},
    error::ConfigError,
    motor::MotorWiring,
    registers::{DEFAULT_ADDRESS, DEFAULT_OSCILLATOR_FREQUENCY, PRESCALE_MIN},
};

//corresponds to 1 pwm chip instance and the h-bridge board behind it
#[derive(Debug, Deserialize, Clone)]
pub struct MotorDriverConfig {
    #[serde(default = "default_address")]
    pub i2c_address: u8,
    #[serde(default = "default_oscillator_frequency")]
    pub oscillator_frequency: u32,
    #[serde(default = "default_pwm_frequency")]
    pub pwm_frequency: f32,
    //when set (3..=255) the chip runs from EXTCLK and pwm_frequency is ignored
    #[serde(default)]
    pub ext_clk_prescale: Option<u8>,
    #[serde(default)]
    pub output_mode: OutputMode,
    pub wiring: MotorWiring,
    #[serde(default)]
    pub reverse: [bool; 4],
    #[serde(default)]
    pub reverse_all: bool,
}

fn default_address() -> u8 {
    DEFAULT_ADDRESS
}

fn default_oscillator_frequency() -> u32 {
    DEFAULT_OSCILLATOR_FREQUENCY
}

fn default_pwm_frequency() -> f32 {
    50.0
}

impl MotorDriverConfig {
    pub fn new(wiring: MotorWiring) -> Self {
        Self {
            i2c_address: default_address(),
            oscillator_frequency: default_oscillator_frequency(),
            pwm_frequency: default_pwm_frequency(),
            ext_clk_prescale: None,
            output_mode: OutputMode::default(),
            wiring,
            reverse: [false; 4],
            reverse_all: false,
        }
    }
}

impl<I2C, D> MotorDriver<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    ///Builds a driver from configuration and brings the chip up: oscillator calibration, clock,
    /// output mode, direction flags, and every motor stopped.
    pub fn build(config: &MotorDriverConfig, i2c: I2C, delay: D) -> Result<Self, ConfigError> {
        let mut driver = MotorDriver::new(i2c, delay, config.i2c_address, config.wiring)?;
        driver.set_oscillator_frequency(config.oscillator_frequency);

        match config.ext_clk_prescale {
            Some(prescale) if prescale < PRESCALE_MIN => {
                return Err(ConfigError::new(format!(
                    "ext_clk_prescale must be at least {}, got {}",
                    PRESCALE_MIN, prescale
                )));
            }
            Some(prescale) => driver.begin(prescale)?,
            None => {
                driver.begin(0)?;
                driver.set_pwm_freq(config.pwm_frequency)?;
            }
        }
        driver.set_output_mode(config.output_mode)?;
        driver.set_motors_reversed(config.reverse);
        driver.set_all_reversed(config.reverse_all);
        driver.stop_all_motors()?;

        info!(
            "PCA9685 motor driver at {:#04x} ready (prescale {}, {:?})",
            config.i2c_address,
            driver.read_prescale()?,
            config.output_mode
        );
        Ok(driver)
    }
}
