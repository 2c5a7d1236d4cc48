//!Driver for the NXP PCA9685 16 channel, 12 bit PWM chip as used on H-bridge motor boards
//! (L298P, MD01-MD04, PM-R3, DRV8833, TB6612 and friends): up to four DC motors, each on two
//! direction channels and one PWM channel.
//!
//! The driver works over any `embedded_hal` 1.0 I2C bus and delay. All calls block on the bus and
//! nothing is cached.

pub mod config;
pub mod driver;
pub mod error;
pub mod motor;
pub mod registers;

pub use config::MotorDriverConfig;
pub use driver::{ChannelTicks, MotorDriver, OutputMode};
pub use error::{ConfigError, DriverError};
pub use motor::{Motor, MotorPins, MotorWiring};
