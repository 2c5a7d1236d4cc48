//!Error types for the motor driver.
use std::fmt::{self, Debug, Display, Formatter};

///Errors produced by `MotorDriver` operations. `E` is the I2C bus error type.
pub enum DriverError<E> {
    ///The bus transaction failed. Nothing is retried.
    Bus(E),
    ///Channel index outside 0..16.
    InvalidChannel(u8),
    ///A tick, speed, pulse width, frequency or prescale value outside its allowed range.
    InvalidRange { what: &'static str, value: f64 },
    ///A prescale write was attempted while MODE1.SLEEP was clear.
    NotAsleep,
}

impl<E> DriverError<E> {
    pub(crate) fn range(what: &'static str, value: impl Into<f64>) -> Self {
        Self::InvalidRange {
            what,
            value: value.into(),
        }
    }
}

impl<E: embedded_hal::i2c::Error> From<E> for DriverError<E> {
    fn from(err: E) -> Self {
        Self::Bus(err)
    }
}

impl<E: Debug> Debug for DriverError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => f.write_fmt(format_args!("DriverError::Bus({:?})", err)),
            Self::InvalidChannel(ch) => {
                f.write_fmt(format_args!("DriverError::InvalidChannel({})", ch))
            }
            Self::InvalidRange { what, value } => f.write_fmt(format_args!(
                "DriverError::InvalidRange {{ what: {}, value: {} }}",
                what, value
            )),
            Self::NotAsleep => f.write_str("DriverError::NotAsleep"),
        }
    }
}

impl<E: Debug> Display for DriverError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "PCA9685 bus error: {:?}", err),
            Self::InvalidChannel(ch) => write!(f, "PCA9685: channel {} is not in 0..16", ch),
            Self::InvalidRange { what, value } => {
                write!(f, "PCA9685: {} out of range: {}", what, value)
            }
            Self::NotAsleep => write!(f, "PCA9685: prescale can only be written while asleep"),
        }
    }
}

impl<E: Debug> std::error::Error for DriverError<E> {}

impl<E> PartialEq for DriverError<E>
where
    E: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bus(a), Self::Bus(b)) => a == b,
            (Self::InvalidChannel(a), Self::InvalidChannel(b)) => a == b,
            (
                Self::InvalidRange { what: wa, value: va },
                Self::InvalidRange { what: wb, value: vb },
            ) => wa == wb && va == vb,
            (Self::NotAsleep, Self::NotAsleep) => true,
            _ => false,
        }
    }
}

///Error building a driver from configuration.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn from_str(s: &str) -> Self {
        Self {
            message: s.to_string(),
        }
    }

    pub fn new(s: String) -> Self {
        Self { message: s }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<E: Debug> From<DriverError<E>> for ConfigError {
    fn from(err: DriverError<E>) -> ConfigError {
        ConfigError::new(format!("Could not configure PCA9685 motor driver: {}", err))
    }
}
