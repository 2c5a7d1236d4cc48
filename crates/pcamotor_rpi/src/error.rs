use std::fmt::{Debug, Formatter};

use pcamotor_core::ConfigError;

pub struct RpiError {
    pub message: String,
}

impl Debug for RpiError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        fmt.write_str(&self.message)
    }
}

impl From<rppal::i2c::Error> for RpiError {
    fn from(err: rppal::i2c::Error) -> Self {
        Self {
            message: format!("RpiI2cError - Cause: {}", err),
        }
    }
}

impl From<RpiError> for ConfigError {
    fn from(err: RpiError) -> Self {
        ConfigError::new(err.message)
    }
}
