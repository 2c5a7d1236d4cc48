//!Raspberry Pi bus provider. A thin wrapper around the rppal library.
//!
//! The `get_bus` and `get_default_bus` functions return an I2C bus that implements the
//! `embedded_hal` traits and can be handed to `pcamotor_core::MotorDriver`.

//internal error type for rpi access
pub mod error;

use error::RpiError;
use tracing::debug;

pub use rppal::hal::Delay;
pub use rppal::i2c::I2c;

//get i2c bus by id
pub fn get_bus(bus: u8) -> Result<I2c, RpiError> {
    let i2c = I2c::with_bus(bus)?;
    debug!("opened i2c bus {} at {} Hz", bus, i2c.clock_speed()?);
    Ok(i2c)
}

//get default i2c bus
pub fn get_default_bus() -> Result<I2c, RpiError> {
    Ok(I2c::new()?)
}

//blocking delay backed by the system clock
pub fn delay() -> Delay {
    Delay::new()
}
